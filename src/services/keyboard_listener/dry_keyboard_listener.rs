use crate::engine::{EngineState, EventRouter};
use crate::error::Result;
use crate::events::{monotonic_ms, KeyEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

use super::r#trait::KeyboardListenerTrait;

/// Прогоняет через маршрутизатор сценарий нажатий вместо реального устройства.
pub struct DryRunKeyboardListener {
    router: EventRouter,
    state: EngineState,
}

impl DryRunKeyboardListener {
    pub fn new(router: EventRouter) -> Self {
        info!("Инициализация DryRunKeyboardListener");
        Self {
            router,
            state: EngineState::default(),
        }
    }

    /// Смещения и события одного прогона: листание, аккорд, короткое нажатие.
    fn script(&self, start: u64) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        let mut t = start;

        if let Some(&page) = self.router.page_turn_keys().first() {
            for _ in 0..6 {
                events.push(KeyEvent::down(page, t));
                events.push(KeyEvent::up(page, t + 40));
                t += 400;
            }
        }

        let (a, b) = self.router.chord_keys();
        events.push(KeyEvent::down(a, t));
        events.push(KeyEvent::down(b, t + 100));
        events.push(KeyEvent::up(a, t + 200));
        events.push(KeyEvent::up(b, t + 220));
        t += 1_000;

        let action = self.router.action_key();
        events.push(KeyEvent::down(action, t));
        events.push(KeyEvent::up(action, t + 60));

        events
    }

    fn run_impl(mut self, stop: Arc<AtomicBool>) -> Result<()> {
        info!("Dry-run режим - KeyboardListener работает в режиме эмуляции");

        while !stop.load(Ordering::Acquire) {
            let start = monotonic_ms();
            for event in self.script(start) {
                // Выдерживаем паузы сценария, чтобы окна аккорда и дребезга были настоящими
                let wait = event.timestamp_ms.saturating_sub(monotonic_ms());
                thread::sleep(Duration::from_millis(wait));

                let disposition = self.router.dispatch(&mut self.state, &event);
                info!("[DRY RUN] {} -> {:?}", event, disposition);
            }
            thread::sleep(Duration::from_secs(5));
        }
        Ok(())
    }
}

impl KeyboardListenerTrait for DryRunKeyboardListener {
    fn run(self: Box<Self>, stop: Arc<AtomicBool>) -> Result<()> {
        (*self).run_impl(stop)
    }
}
