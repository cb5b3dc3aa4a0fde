use super::config_cache::{ConfigSnapshot, F1Action};
use super::host::{SideEffect, SideEffectSink, Surface};
use super::refresh::RefreshProtocol;
use crate::events::ForegroundContext;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_ACTION_DEBOUNCE_MS: u64 = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionDebounceState {
    pub last_fired_at_ms: Option<u64>,
    /// Одноразовый: следующее короткое нажатие уже использовано аккордом
    pub suppress_next_fire: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Handled,
    NotHandled,
}

/// Короткое нажатие назначенной клавиши превращает в настроенное действие.
pub struct ActionDispatcher {
    debounce_ms: u64,
    excluded_packages: Vec<String>,
    quick_settings_component: String,
    sink: Arc<dyn SideEffectSink>,
    refresh: Arc<RefreshProtocol>,
}

impl ActionDispatcher {
    pub fn new(
        debounce_ms: u64,
        excluded_packages: Vec<String>,
        quick_settings_component: impl Into<String>,
        sink: Arc<dyn SideEffectSink>,
        refresh: Arc<RefreshProtocol>,
    ) -> Self {
        Self {
            debounce_ms,
            excluded_packages,
            quick_settings_component: quick_settings_component.into(),
            sink,
            refresh,
        }
    }

    pub fn arm_skip(&self, state: &mut ActionDebounceState) {
        state.suppress_next_fire = true;
    }

    pub fn is_blocked(&self, foreground: &ForegroundContext) -> bool {
        foreground.is_blocked(&self.excluded_packages)
    }

    pub fn on_short_press(
        &self,
        state: &mut ActionDebounceState,
        now_ms: u64,
        foreground: &ForegroundContext,
        snapshot: &ConfigSnapshot,
    ) -> PressOutcome {
        if std::mem::take(&mut state.suppress_next_fire) {
            debug!("Короткое нажатие уже использовано аккордом");
            return PressOutcome::Handled;
        }

        if self.is_blocked(foreground) {
            debug!("Короткое нажатие оставлено приложению {}", foreground);
            return PressOutcome::NotHandled;
        }

        // Метка раньше прошлой (часы источника сдвинулись назад) считается прошедшим интервалом
        let since_last = state.last_fired_at_ms.and_then(|last| now_ms.checked_sub(last));
        if let Some(elapsed) = since_last.filter(|elapsed| *elapsed < self.debounce_ms) {
            debug!("Дребезг: {} мс с прошлого нажатия", elapsed);
            return PressOutcome::Handled;
        }
        state.last_fired_at_ms = Some(now_ms);

        self.perform(snapshot.f1_action, foreground);
        PressOutcome::Handled
    }

    fn perform(&self, action: F1Action, foreground: &ForegroundContext) {
        let effect = match action {
            F1Action::Back => SideEffect::Back,
            F1Action::Screenshot => SideEffect::Screenshot,
            F1Action::QuickSettings => {
                if foreground.matches_component(&self.quick_settings_component) {
                    debug!("Быстрые настройки уже открыты: {}", foreground.flattened());
                    return;
                }
                SideEffect::Launch(Surface::QuickSettings)
            }
            F1Action::Brightness => SideEffect::Launch(Surface::Brightness),
            F1Action::ManualRefresh => {
                self.refresh.trigger("action key");
                return;
            }
        };

        if let Err(e) = self.sink.emit(&effect) {
            warn!("Действие '{}' не выполнено: {}", effect, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{FakePrimitive, RecordingSink};

    const QS: &str = "refresh-paper/quick-settings";

    struct Fixture {
        dispatcher: ActionDispatcher,
        sink: Arc<RecordingSink>,
        state: ActionDebounceState,
    }

    fn fixture() -> Fixture {
        let sink = RecordingSink::new();
        let (primitive, _) = FakePrimitive::new();
        let refresh = Arc::new(RefreshProtocol::new(Some(Box::new(primitive))));
        Fixture {
            dispatcher: ActionDispatcher::new(
                DEFAULT_ACTION_DEBOUNCE_MS,
                vec!["com.ridi.paper".to_string()],
                QS,
                sink.clone(),
                refresh,
            ),
            sink,
            state: ActionDebounceState::default(),
        }
    }

    fn snapshot(action: F1Action) -> ConfigSnapshot {
        ConfigSnapshot {
            f1_action: action,
            ..ConfigSnapshot::default()
        }
    }

    fn reader() -> ForegroundContext {
        ForegroundContext::new("koreader", "book.epub")
    }

    #[test]
    fn test_debounce_fifty_then_two_hundred() {
        let mut f = fixture();
        let s = snapshot(F1Action::Back);

        assert_eq!(f.dispatcher.on_short_press(&mut f.state, 1_000, &reader(), &s), PressOutcome::Handled);
        assert_eq!(f.dispatcher.on_short_press(&mut f.state, 1_050, &reader(), &s), PressOutcome::Handled);
        assert_eq!(f.sink.count(&SideEffect::Back), 1);

        let mut f = fixture();
        f.dispatcher.on_short_press(&mut f.state, 1_000, &reader(), &s);
        f.dispatcher.on_short_press(&mut f.state, 1_200, &reader(), &s);
        assert_eq!(f.sink.count(&SideEffect::Back), 2);
    }

    #[test]
    fn test_backward_timestamps_do_not_debounce() {
        let mut f = fixture();
        let s = snapshot(F1Action::Back);

        f.dispatcher.on_short_press(&mut f.state, 1_700_000_000_000, &reader(), &s);

        // Час назад по часам источника, нажатия с шагом 10 с
        let earlier = 1_700_000_000_000 - 3_600_000;
        let outcomes: Vec<_> = (0..5)
            .map(|i| f.dispatcher.on_short_press(&mut f.state, earlier + i * 10_000, &reader(), &s))
            .collect();

        assert!(outcomes.iter().all(|o| *o == PressOutcome::Handled));
        assert_eq!(f.sink.count(&SideEffect::Back), 6);
        assert_eq!(f.state.last_fired_at_ms, Some(earlier + 40_000));

        // После сдвига дребезг снова работает
        f.dispatcher.on_short_press(&mut f.state, earlier + 40_050, &reader(), &s);
        assert_eq!(f.sink.count(&SideEffect::Back), 6);
    }

    #[test]
    fn test_skip_flag_is_one_shot() {
        let mut f = fixture();
        let s = snapshot(F1Action::Screenshot);
        f.dispatcher.arm_skip(&mut f.state);

        assert_eq!(f.dispatcher.on_short_press(&mut f.state, 0, &reader(), &s), PressOutcome::Handled);
        assert!(f.sink.effects().is_empty());
        assert!(!f.state.suppress_next_fire);

        f.dispatcher.on_short_press(&mut f.state, 500, &reader(), &s);
        assert_eq!(f.sink.effects(), vec![SideEffect::Screenshot]);
    }

    #[test]
    fn test_blocked_foreground_not_handled() {
        let mut f = fixture();
        let s = snapshot(F1Action::Back);

        let excluded = ForegroundContext::new("com.ridi.paper", "Viewer");
        assert_eq!(f.dispatcher.on_short_press(&mut f.state, 0, &excluded, &s), PressOutcome::NotHandled);
        assert_eq!(
            f.dispatcher.on_short_press(&mut f.state, 500, &ForegroundContext::unresolved(), &s),
            PressOutcome::NotHandled
        );
        assert!(f.sink.effects().is_empty());
        assert_eq!(f.state.last_fired_at_ms, None);
    }

    #[test]
    fn test_quick_settings_not_relaunched_over_itself() {
        let mut f = fixture();
        let s = snapshot(F1Action::QuickSettings);

        let on_top = ForegroundContext::new("refresh-paper", "quick-settings");
        assert_eq!(f.dispatcher.on_short_press(&mut f.state, 0, &on_top, &s), PressOutcome::Handled);
        assert!(f.sink.effects().is_empty());

        f.dispatcher.on_short_press(&mut f.state, 500, &reader(), &s);
        assert_eq!(f.sink.effects(), vec![SideEffect::Launch(Surface::QuickSettings)]);
    }

    #[test]
    fn test_manual_refresh_action_drives_protocol() {
        let sink = RecordingSink::new();
        let (primitive, log) = FakePrimitive::new();
        let refresh = Arc::new(RefreshProtocol::new(Some(Box::new(primitive))));
        refresh.set_surface(4);
        let dispatcher = ActionDispatcher::new(120, vec![], QS, sink.clone(), refresh);
        let mut state = ActionDebounceState::default();

        let outcome = dispatcher.on_short_press(&mut state, 0, &reader(), &snapshot(F1Action::ManualRefresh));
        assert_eq!(outcome, PressOutcome::Handled);
        assert_eq!(log.redraws(), 1);
        assert!(sink.effects().is_empty());
    }
}
