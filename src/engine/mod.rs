//! Движок разбора нажатий и полного обновления экрана.
//!
//! Каждое событие клавиши проходит через `EventRouter::dispatch` в одном потоке,
//! которому принадлежит `EngineState`. Настройки читаются из снимка `ConfigCache`,
//! перерисовка идёт через `RefreshProtocol`, всё видимое пользователю отдаётся
//! трейтам из `host`.

pub mod action_dispatcher;
pub mod chord;
pub mod config_cache;
pub mod host;
pub mod page_turn;
pub mod refresh;
pub mod router;

#[cfg(test)]
pub(crate) mod test_support;

pub use action_dispatcher::ActionDebounceState;
pub use chord::{ChordDetector, ChordState};
pub use config_cache::{ConfigCache, ConfigSnapshot, F1Action, ReloadSource};
pub use host::{ForegroundFeed, SideEffect, SideEffectSink, Surface};
pub use page_turn::{FireDecision, PageTurnCounter, PageTurnCounterState, PageTurnKeys};
pub use refresh::{RefreshPrimitive, RefreshProtocol};
pub use router::{Disposition, EventRouter, RouterConfig};

/// Изменяемое состояние диспетчера. Принадлежит его потоку и никуда не передаётся.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    pub chord: ChordState,
    pub page_turns: PageTurnCounterState,
    pub debounce: ActionDebounceState,
    pub home_down_consumed: bool,
    pub action_down_consumed: bool,
}
