use crate::events::{KeyAction, KeyCode, KeyEvent};
use crate::trace_if_enabled;
use tracing::debug;

pub const DEFAULT_CHORD_WINDOW_MS: u64 = 250;

/// Состояние аккорда из двух клавиш в потоке диспетчера.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChordState {
    pub key_a_ts: Option<u64>,
    pub key_b_ts: Option<u64>,
    pub chord_active: bool,
    pub consumed_a_down: bool,
    pub consumed_b_down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordPhase {
    Idle,
    ArmedKeyA,
    ArmedKeyB,
    ChordActive,
}

impl ChordState {
    pub fn phase(&self) -> ChordPhase {
        if self.chord_active {
            return ChordPhase::ChordActive;
        }
        match (self.key_a_ts, self.key_b_ts) {
            (None, None) => ChordPhase::Idle,
            (Some(_), None) => ChordPhase::ArmedKeyA,
            (None, Some(_)) => ChordPhase::ArmedKeyB,
            // Обе зажаты, но далеко по времени: взведена нажатая позже
            (Some(a), Some(b)) if a >= b => ChordPhase::ArmedKeyA,
            (Some(_), Some(_)) => ChordPhase::ArmedKeyB,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn slots(&mut self, is_a: bool) -> (&mut Option<u64>, &mut bool, Option<u64>) {
        if is_a {
            (&mut self.key_a_ts, &mut self.consumed_a_down, self.key_b_ts)
        } else {
            (&mut self.key_b_ts, &mut self.consumed_b_down, self.key_a_ts)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordOutcome {
    /// Не клавиша аккорда, детектор ничего не делал
    NotChordKey,
    Passed,
    Consumed,
    /// Этот Down завершил аккорд; событие поглощается
    Fired,
}

impl ChordOutcome {
    pub fn claims(self) -> bool {
        matches!(self, ChordOutcome::Consumed | ChordOutcome::Fired)
    }
}

/// Распознаёт две клавиши, нажатые с коротким интервалом.
#[derive(Debug, Clone)]
pub struct ChordDetector {
    key_a: KeyCode,
    key_b: KeyCode,
    window_ms: u64,
}

impl ChordDetector {
    pub fn new(key_a: KeyCode, key_b: KeyCode, window_ms: u64) -> Self {
        Self {
            key_a,
            key_b,
            window_ms,
        }
    }

    pub fn keys(&self) -> (KeyCode, KeyCode) {
        (self.key_a, self.key_b)
    }

    pub fn is_chord_key(&self, code: KeyCode) -> bool {
        code == self.key_a || code == self.key_b
    }

    pub fn on_event(&self, state: &mut ChordState, event: &KeyEvent, enabled: bool) -> ChordOutcome {
        if !enabled {
            if *state != ChordState::default() {
                debug!("Аккорд выключен, сбрасываем состояние");
                state.reset();
            }
            return if self.is_chord_key(event.key_code) {
                ChordOutcome::Passed
            } else {
                ChordOutcome::NotChordKey
            };
        }
        if !self.is_chord_key(event.key_code) {
            return ChordOutcome::NotChordKey;
        }

        let is_a = event.key_code == self.key_a;
        let outcome = match event.action {
            KeyAction::Down => self.on_down(state, is_a, event),
            KeyAction::Up => self.on_up(state, is_a),
        };
        trace_if_enabled!("Аккорд: {} -> {:?}, фаза {:?}", event, outcome, state.phase());
        outcome
    }

    fn on_down(&self, state: &mut ChordState, is_a: bool, event: &KeyEvent) -> ChordOutcome {
        let chord_active = state.chord_active;
        let window_ms = self.window_ms;
        let (own_ts, own_consumed, other_ts) = state.slots(is_a);

        if chord_active {
            own_ts.get_or_insert(event.timestamp_ms);
            *own_consumed = true;
            return ChordOutcome::Consumed;
        }

        // Автоповтор зажатой клавиши её не перевзводит
        if event.repeat && own_ts.is_some() {
            return ChordOutcome::Passed;
        }

        *own_ts = Some(event.timestamp_ms);
        match other_ts {
            Some(other) if event.timestamp_ms.abs_diff(other) <= window_ms => {
                *own_consumed = true;
                state.chord_active = true;
                debug!("Аккорд сработал на {}", event);
                ChordOutcome::Fired
            }
            _ => {
                *own_consumed = false;
                ChordOutcome::Passed
            }
        }
    }

    fn on_up(&self, state: &mut ChordState, is_a: bool) -> ChordOutcome {
        let chord_active = state.chord_active;
        let (own_ts, own_consumed, _) = state.slots(is_a);

        *own_ts = None;
        // Пока аккорд активен, обе клавиши принадлежат ему
        let consume = std::mem::take(own_consumed) || chord_active;

        if state.key_a_ts.is_none() && state.key_b_ts.is_none() {
            state.reset();
        }

        if consume {
            ChordOutcome::Consumed
        } else {
            ChordOutcome::Passed
        }
    }
}
