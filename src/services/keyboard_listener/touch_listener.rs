use crate::engine::{ConfigCache, FireDecision, ForegroundFeed, PageTurnCounter, PageTurnCounterState, RefreshProtocol};
use crate::error::{PaperError, Result};
use crate::events::{monotonic_ms, KeyEvent};
use crate::mappings::key_names::BTN_TOUCH;
use crate::utils::DeviceFinder;
use evdev::{Device, EventType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Полное обновление после каждых N касаний экрана.
pub struct TouchRefresh {
    counter: PageTurnCounter,
    state: PageTurnCounterState,
    config: Arc<ConfigCache>,
    refresh: Arc<RefreshProtocol>,
    foreground: Arc<dyn ForegroundFeed>,
    excluded_packages: Vec<String>,
}

impl TouchRefresh {
    pub fn new(
        config: Arc<ConfigCache>,
        refresh: Arc<RefreshProtocol>,
        foreground: Arc<dyn ForegroundFeed>,
        excluded_packages: Vec<String>,
    ) -> Self {
        Self {
            counter: PageTurnCounter::touch(),
            state: PageTurnCounterState::default(),
            config,
            refresh,
            foreground,
            excluded_packages,
        }
    }

    pub fn count(&self) -> u32 {
        self.state.count
    }

    pub fn on_event(&mut self, event: &KeyEvent) -> FireDecision {
        if !self.counter.is_qualifying(event.key_code) || !event.is_initial_down() {
            return FireDecision::NoFire;
        }

        self.config.refresh_if_due(event.timestamp_ms);
        let snapshot = self.config.get();
        let blocked = self.foreground.current().is_blocked(&self.excluded_packages);

        let decision = self.counter.on_qualifying_key(
            &mut self.state,
            snapshot.touch_counting_enabled(),
            blocked,
            snapshot.page_turn_threshold,
        );
        if decision == FireDecision::Fire {
            self.refresh.trigger("touches");
        }
        decision
    }
}

/// Читает сенсорный экран в отдельном потоке, не захватывая его.
pub struct TouchListener {
    device: Device,
    logic: TouchRefresh,
}

impl TouchListener {
    pub fn new(device_path: &str, logic: TouchRefresh) -> Result<Self> {
        let path = DeviceFinder::find_touch_device(device_path)?;
        let device = Device::open(&path).map_err(|e| {
            PaperError::DeviceNotFound(format!("Не удалось открыть сенсорное устройство {:?}: {}", path, e))
        })?;
        info!("Сенсорное устройство: {} ({:?})", device.name().unwrap_or("Unknown"), path);
        Ok(Self { device, logic })
    }

    pub fn run(mut self, stop: Arc<AtomicBool>) -> Result<()> {
        info!("TouchListener запущен");

        while !stop.load(Ordering::Acquire) {
            let events: Vec<_> = match self.device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) => {
                    error!("Ошибка чтения сенсорных событий: {}", e);
                    if e.raw_os_error() == Some(19) {
                        return Err(PaperError::DeviceNotFound("Сенсорное устройство отключено".to_string()));
                    }
                    thread::sleep(Duration::from_millis(100));
                    continue;
                }
            };

            for event in events {
                if event.event_type() != EventType::KEY || event.code() != BTN_TOUCH {
                    continue;
                }
                if let Some(touch) = KeyEvent::from_evdev(event.code(), event.value(), monotonic_ms()) {
                    if self.logic.on_event(&touch) == FireDecision::Fire {
                        debug!("Порог касаний достигнут");
                    }
                }
            }
        }
        Ok(())
    }
}
