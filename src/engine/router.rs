use super::action_dispatcher::{ActionDispatcher, PressOutcome};
use super::chord::{ChordDetector, ChordOutcome};
use super::config_cache::{ConfigCache, ConfigSnapshot, DEFAULT_HOME_LAUNCHER_COMPONENT};
use super::host::{ForegroundFeed, SideEffect, SideEffectSink, Surface};
use super::page_turn::{FireDecision, PageTurnCounter, PageTurnKeys};
use super::refresh::RefreshProtocol;
use super::EngineState;
use crate::debug_if_enabled;
use crate::events::{ForegroundContext, KeyAction, KeyCode, KeyEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Что платформа должна сделать с событием после диспетчера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Consumed,
    PassThrough,
}

impl Disposition {
    pub fn is_consumed(self) -> bool {
        self == Disposition::Consumed
    }
}

/// Статическая настройка маршрутизатора: какие клавиши что делают и временные окна.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub action_key: KeyCode,
    pub home_key: Option<KeyCode>,
    pub manual_refresh_key: Option<KeyCode>,
    pub page_turn_keys: PageTurnKeys,
    pub chord_keys: (KeyCode, KeyCode),
    pub chord_window_ms: u64,
    pub debounce_ms: u64,
    pub excluded_packages: Vec<String>,
    pub quick_settings_component: String,
}

/// Точка входа для каждого события клавиши. Живёт в потоке диспетчера.
pub struct EventRouter {
    config: Arc<ConfigCache>,
    refresh: Arc<RefreshProtocol>,
    sink: Arc<dyn SideEffectSink>,
    foreground: Arc<dyn ForegroundFeed>,
    chord: ChordDetector,
    page_turns: PageTurnCounter,
    dispatcher: ActionDispatcher,
    action_key: KeyCode,
    home_key: Option<KeyCode>,
    manual_refresh_key: Option<KeyCode>,
    excluded_packages: Vec<String>,
}

impl EventRouter {
    pub fn new(
        config: Arc<ConfigCache>,
        refresh: Arc<RefreshProtocol>,
        sink: Arc<dyn SideEffectSink>,
        foreground: Arc<dyn ForegroundFeed>,
        router_config: RouterConfig,
    ) -> Self {
        let (key_a, key_b) = router_config.chord_keys;
        let dispatcher = ActionDispatcher::new(
            router_config.debounce_ms,
            router_config.excluded_packages.clone(),
            router_config.quick_settings_component,
            sink.clone(),
            refresh.clone(),
        );

        Self {
            config,
            refresh,
            sink,
            foreground,
            chord: ChordDetector::new(key_a, key_b, router_config.chord_window_ms),
            page_turns: PageTurnCounter::new(router_config.page_turn_keys),
            dispatcher,
            action_key: router_config.action_key,
            home_key: router_config.home_key,
            manual_refresh_key: router_config.manual_refresh_key,
            excluded_packages: router_config.excluded_packages,
        }
    }

    pub fn action_key(&self) -> KeyCode {
        self.action_key
    }

    pub fn chord_keys(&self) -> (KeyCode, KeyCode) {
        self.chord.keys()
    }

    pub fn page_turn_keys(&self) -> &[KeyCode] {
        self.page_turns.keys()
    }

    /// Клавиши, на которые маршрутизатор может реагировать; по ним выбирается устройство
    pub fn bound_keys(&self) -> Vec<KeyCode> {
        let (a, b) = self.chord.keys();
        let mut keys = vec![self.action_key, a, b];
        keys.extend(self.home_key);
        keys.extend(self.manual_refresh_key);
        keys.extend_from_slice(self.page_turns.keys());
        keys.sort_by_key(|k| k.value());
        keys.dedup();
        keys
    }

    pub fn dispatch(&self, state: &mut EngineState, event: &KeyEvent) -> Disposition {
        self.config.refresh_if_due(event.timestamp_ms);
        let snapshot = self.config.get();
        let foreground = self.foreground.current();

        if !snapshot.auto_refresh_enabled {
            self.page_turns.reset(&mut state.page_turns);
        }

        let disposition = self.route(state, event, &snapshot, &foreground);
        debug_if_enabled!("{} -> {:?} (передний план {})", event, disposition, foreground);
        disposition
    }

    fn route(
        &self,
        state: &mut EngineState,
        event: &KeyEvent,
        snapshot: &ConfigSnapshot,
        foreground: &ForegroundContext,
    ) -> Disposition {
        let code = event.key_code;

        if self.home_key == Some(code) {
            return self.handle_home(state, event, snapshot);
        }

        let chord = self.chord.on_event(&mut state.chord, event, snapshot.chord_enabled);
        if chord.claims() {
            if chord == ChordOutcome::Fired {
                self.on_chord_fired(state);
            }
            if code == self.action_key && event.action == KeyAction::Up {
                state.action_down_consumed = false;
                if state.debounce.suppress_next_fire {
                    self.dispatcher
                        .on_short_press(&mut state.debounce, event.timestamp_ms, foreground, snapshot);
                }
            }
            return Disposition::Consumed;
        }

        if self.page_turns.is_qualifying(code) && event.is_initial_down() {
            let blocked = foreground.is_blocked(&self.excluded_packages);
            let decision = self.page_turns.on_qualifying_key(
                &mut state.page_turns,
                snapshot.auto_refresh_enabled,
                blocked,
                snapshot.page_turn_threshold,
            );
            if decision == FireDecision::Fire {
                self.refresh.trigger("page turns");
            }
        }

        if self.manual_refresh_key == Some(code) && snapshot.manual_refresh_enabled && event.is_initial_down() {
            self.refresh.trigger("manual refresh key");
        }

        if code == self.action_key {
            return self.handle_action_key(state, event, snapshot, foreground);
        }

        Disposition::PassThrough
    }

    fn on_chord_fired(&self, state: &mut EngineState) {
        let (a, b) = self.chord.keys();
        info!("Аккорд {}+{}: делаем скриншот", a, b);
        // Up назначенной клавиши не должен запустить ещё и её короткое действие
        if self.action_key == a || self.action_key == b {
            self.dispatcher.arm_skip(&mut state.debounce);
        }
        if let Err(e) = self.sink.emit(&SideEffect::Screenshot) {
            warn!("Скриншот не удался: {}", e);
        }
    }

    fn handle_home(&self, state: &mut EngineState, event: &KeyEvent, snapshot: &ConfigSnapshot) -> Disposition {
        match event.action {
            KeyAction::Down if event.repeat => {
                if state.home_down_consumed {
                    Disposition::Consumed
                } else {
                    Disposition::PassThrough
                }
            }
            KeyAction::Down => {
                state.home_down_consumed = self.launch_home(&snapshot.home_launcher_component);
                if state.home_down_consumed {
                    Disposition::Consumed
                } else {
                    Disposition::PassThrough
                }
            }
            KeyAction::Up => {
                if std::mem::take(&mut state.home_down_consumed) {
                    Disposition::Consumed
                } else {
                    Disposition::PassThrough
                }
            }
        }
    }

    fn launch_home(&self, component: &str) -> bool {
        let launch = |component: &str| self.sink.emit(&SideEffect::Launch(Surface::Home(component.to_string())));

        match launch(component) {
            Ok(()) => return true,
            Err(e) => warn!("Не удалось запустить лаунчер {}: {}", component, e),
        }
        if component == DEFAULT_HOME_LAUNCHER_COMPONENT {
            return false;
        }
        match launch(DEFAULT_HOME_LAUNCHER_COMPONENT) {
            Ok(()) => true,
            Err(e) => {
                warn!("Не удалось запустить лаунчер по умолчанию: {}", e);
                false
            }
        }
    }

    fn handle_action_key(
        &self,
        state: &mut EngineState,
        event: &KeyEvent,
        snapshot: &ConfigSnapshot,
        foreground: &ForegroundContext,
    ) -> Disposition {
        match event.action {
            KeyAction::Down => {
                if event.is_initial_down() {
                    state.action_down_consumed =
                        state.debounce.suppress_next_fire || !self.dispatcher.is_blocked(foreground);
                }
                if state.action_down_consumed {
                    Disposition::Consumed
                } else {
                    Disposition::PassThrough
                }
            }
            KeyAction::Up => {
                let down_consumed = std::mem::take(&mut state.action_down_consumed);
                let outcome =
                    self.dispatcher
                        .on_short_press(&mut state.debounce, event.timestamp_ms, foreground, snapshot);
                if outcome == PressOutcome::Handled || down_consumed {
                    if outcome == PressOutcome::NotHandled {
                        debug!("Поглощаем {}, так как его Down был поглощён", event);
                    }
                    Disposition::Consumed
                } else {
                    Disposition::PassThrough
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config_cache::DEFAULT_PULL_INTERVAL_MS;
    use crate::engine::test_support::{FakePrimitive, FixedForeground, PrimitiveLog, RecordingSink};
    use crate::mappings::key_names::code_for_name;
    use crate::settings::{keys, MemorySettingsStore, SettingValue, SettingsStore};
    use smallvec::smallvec;

    fn key(name: &str) -> KeyCode {
        KeyCode(code_for_name(name).unwrap())
    }

    struct Harness {
        router: EventRouter,
        state: EngineState,
        store: Arc<MemorySettingsStore>,
        sink: Arc<RecordingSink>,
        foreground: Arc<FixedForeground>,
        log: PrimitiveLog,
    }

    impl Harness {
        fn new(settings: &[(&str, SettingValue)]) -> Self {
            let store = Arc::new(MemorySettingsStore::new());
            store.disable_subscriptions();
            store.put_all(settings);

            let cache = Arc::new(ConfigCache::new(
                store.clone(),
                keys::F1_PAGE_CHORD_ENABLED,
                DEFAULT_PULL_INTERVAL_MS,
            ));
            let (primitive, log) = FakePrimitive::new();
            let refresh = Arc::new(RefreshProtocol::new(Some(Box::new(primitive))));
            refresh.set_surface(1);
            let sink = RecordingSink::new();
            let foreground = Arc::new(FixedForeground::new(ForegroundContext::new("koreader", "book.epub")));

            let router = EventRouter::new(
                cache,
                refresh,
                sink.clone(),
                foreground.clone(),
                RouterConfig {
                    action_key: key("f1"),
                    home_key: Some(key("home")),
                    manual_refresh_key: Some(key("f4")),
                    page_turn_keys: smallvec![key("pageup"), key("pagedown"), key("volumeup")],
                    chord_keys: (key("f1"), key("pagedown")),
                    chord_window_ms: 250,
                    debounce_ms: 120,
                    excluded_packages: vec!["com.ridi.paper".to_string()],
                    quick_settings_component: "refresh-paper/quick-settings".to_string(),
                },
            );

            Self {
                router,
                state: EngineState::default(),
                store,
                sink,
                foreground,
                log,
            }
        }

        fn send(&mut self, event: KeyEvent) -> Disposition {
            self.router.dispatch(&mut self.state, &event)
        }

        fn tap(&mut self, name: &str, at: u64) -> (Disposition, Disposition) {
            let down = self.send(KeyEvent::down(key(name), at));
            let up = self.send(KeyEvent::up(key(name), at + 30));
            (down, up)
        }
    }

    #[test]
    fn test_fifth_page_turn_refreshes_once() {
        let mut h = Harness::new(&[
            (keys::AUTO_REFRESH_ENABLED, SettingValue::Bool(true)),
            (keys::PAGES_PER_REFRESH, SettingValue::Int(5)),
        ]);

        for i in 0..4 {
            let (down, up) = h.tap("pagedown", i * 1_000);
            assert_eq!((down, up), (Disposition::PassThrough, Disposition::PassThrough));
        }
        assert_eq!(h.log.redraws(), 0);

        h.tap("pageup", 5_000);
        assert_eq!(h.log.redraws(), 1);
        assert_eq!(h.state.page_turns.count, 0);
    }

    #[test]
    fn test_repeats_do_not_count_as_page_turns() {
        let mut h = Harness::new(&[
            (keys::AUTO_REFRESH_ENABLED, SettingValue::Bool(true)),
            (keys::PAGES_PER_REFRESH, SettingValue::Int(2)),
        ]);

        h.send(KeyEvent::down(key("volumeup"), 0));
        for t in 1..10 {
            h.send(KeyEvent::repeat(key("volumeup"), t * 50));
        }
        h.send(KeyEvent::up(key("volumeup"), 600));
        assert_eq!(h.state.page_turns.count, 1);
        assert_eq!(h.log.redraws(), 0);
    }

    #[test]
    fn test_disabling_auto_refresh_resets_count() {
        let mut h = Harness::new(&[
            (keys::AUTO_REFRESH_ENABLED, SettingValue::Bool(true)),
            (keys::PAGES_PER_REFRESH, SettingValue::Int(5)),
        ]);
        h.tap("pagedown", 0);
        h.tap("pagedown", 1_000);
        assert_eq!(h.state.page_turns.count, 2);

        h.store.put(keys::AUTO_REFRESH_ENABLED, SettingValue::Bool(false)).unwrap();
        h.tap("left", 2_000);
        assert_eq!(h.state.page_turns.count, 0);
    }

    #[test]
    fn test_blocked_foreground_resets_count_and_releases_action_key() {
        let mut h = Harness::new(&[
            (keys::AUTO_REFRESH_ENABLED, SettingValue::Bool(true)),
            (keys::PAGES_PER_REFRESH, SettingValue::Int(3)),
        ]);
        h.tap("pagedown", 0);
        h.tap("pagedown", 1_000);

        h.foreground.set(ForegroundContext::new("com.ridi.paper", "Viewer"));
        h.tap("pagedown", 2_000);
        assert_eq!(h.state.page_turns.count, 0);
        assert_eq!(h.log.redraws(), 0);

        let (down, up) = h.tap("f1", 3_000);
        assert_eq!((down, up), (Disposition::PassThrough, Disposition::PassThrough));
        assert!(h.sink.effects().is_empty());
    }

    #[test]
    fn test_chord_takes_one_screenshot_and_skips_short_press() {
        let mut h = Harness::new(&[(keys::F1_PAGE_CHORD_ENABLED, SettingValue::Bool(true))]);

        assert_eq!(h.send(KeyEvent::down(key("f1"), 0)), Disposition::Consumed);
        assert_eq!(h.send(KeyEvent::down(key("pagedown"), 200)), Disposition::Consumed);
        assert_eq!(h.send(KeyEvent::up(key("f1"), 300)), Disposition::Consumed);
        assert_eq!(h.send(KeyEvent::up(key("pagedown"), 320)), Disposition::Consumed);

        assert_eq!(h.sink.effects(), vec![SideEffect::Screenshot]);
        assert!(!h.state.debounce.suppress_next_fire);

        // Следующее нажатие уже обычное короткое
        let (down, up) = h.tap("f1", 600);
        assert_eq!((down, up), (Disposition::Consumed, Disposition::Consumed));
        assert_eq!(h.sink.effects(), vec![SideEffect::Screenshot, SideEffect::Back]);
    }

    #[test]
    fn test_chord_off_means_two_independent_keys() {
        let mut h = Harness::new(&[]);

        h.send(KeyEvent::down(key("f1"), 0));
        assert_eq!(h.send(KeyEvent::down(key("pagedown"), 100)), Disposition::PassThrough);
        h.send(KeyEvent::up(key("pagedown"), 150));
        h.send(KeyEvent::up(key("f1"), 200));

        assert_eq!(h.sink.effects(), vec![SideEffect::Back]);
    }

    #[test]
    fn test_home_launches_configured_component() {
        let mut h = Harness::new(&[(
            keys::HOME_LAUNCHER_COMPONENT,
            SettingValue::Str("koreader/Launcher".to_string()),
        )]);

        let (down, up) = h.tap("home", 0);
        assert_eq!((down, up), (Disposition::Consumed, Disposition::Consumed));
        assert_eq!(
            h.sink.effects(),
            vec![SideEffect::Launch(Surface::Home("koreader/Launcher".to_string()))]
        );
    }

    #[test]
    fn test_home_falls_back_to_default_launcher() {
        let mut h = Harness::new(&[(
            keys::HOME_LAUNCHER_COMPONENT,
            SettingValue::Str("gone/Launcher".to_string()),
        )]);
        h.sink.fail_launch_of("gone/Launcher");

        assert_eq!(h.tap("home", 0), (Disposition::Consumed, Disposition::Consumed));
        assert_eq!(
            h.sink.effects().last(),
            Some(&SideEffect::Launch(Surface::Home(DEFAULT_HOME_LAUNCHER_COMPONENT.to_string())))
        );
    }

    #[test]
    fn test_home_passes_through_when_no_launcher_starts() {
        let mut h = Harness::new(&[]);
        h.sink.fail_launch_of(DEFAULT_HOME_LAUNCHER_COMPONENT);

        assert_eq!(h.tap("home", 0), (Disposition::PassThrough, Disposition::PassThrough));
        assert_eq!(h.sink.effects().len(), 1);
    }

    #[test]
    fn test_manual_refresh_key_needs_toggle() {
        let mut h = Harness::new(&[]);
        assert_eq!(h.tap("f4", 0), (Disposition::PassThrough, Disposition::PassThrough));
        assert_eq!(h.log.redraws(), 0);

        h.store.put(keys::MANUAL_REFRESH_ENABLED, SettingValue::Bool(true)).unwrap();
        assert_eq!(h.tap("f4", 1_000), (Disposition::PassThrough, Disposition::PassThrough));
        assert_eq!(h.log.redraws(), 1);
    }

    #[test]
    fn test_settings_pulled_lazily_on_event_clock() {
        let mut h = Harness::new(&[]);
        h.tap("f1", 0);
        assert_eq!(h.sink.effects(), vec![SideEffect::Back]);

        h.store.put(keys::F1_ACTION, SettingValue::Int(1)).unwrap();
        // Ещё внутри интервала опроса: старый снимок
        h.tap("f1", 150);
        h.tap("f1", 300);
        assert_eq!(h.sink.effects(), vec![SideEffect::Back, SideEffect::Back, SideEffect::Screenshot]);
    }

    #[test]
    fn test_unrelated_keys_pass_through() {
        let mut h = Harness::new(&[]);
        assert_eq!(h.tap("space", 0), (Disposition::PassThrough, Disposition::PassThrough));
        assert!(h.sink.effects().is_empty());
    }

    #[test]
    fn test_bound_keys_are_deduplicated() {
        let h = Harness::new(&[]);
        let bound = h.router.bound_keys();
        assert_eq!(bound.iter().filter(|k| **k == key("f1")).count(), 1);
        assert!(bound.contains(&key("home")));
        assert!(bound.contains(&key("volumeup")));
    }
}
