use crate::config::{Config, RunMode};
use crate::engine::{Disposition, EngineState, EventRouter};
use crate::error::{PaperError, Result};
use crate::events::{monotonic_ms, KeyEvent};
use crate::services::VirtualDevice;
use crate::utils::DeviceFinder;
use crate::{debug_if_enabled, trace_if_enabled};
use evdev::{Device, EventType};
use std::io::Error;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::r#trait::KeyboardListenerTrait;

pub struct RealKeyboardListener {
    mode: RunMode,
    router: EventRouter,
    state: EngineState,
    device: Device,
    virtual_device: Arc<VirtualDevice>,
    grabbed: bool,
}

impl RealKeyboardListener {
    pub fn new(
        config: Arc<Config>,
        mode: RunMode,
        router: EventRouter,
        virtual_device: Arc<VirtualDevice>,
    ) -> Result<Self> {
        info!("Инициализация RealKeyboardListener (режим: {})", mode);

        let device_path = DeviceFinder::find_input_device(&config.input.device_path, &router.bound_keys())?;

        let mut device = Device::open(&device_path).map_err(|e| {
            PaperError::DeviceNotFound(format!(
                "Не удалось открыть устройство {:?}: {}",
                device_path, e
            ))
        })?;

        let grabbed = if mode.grabs_device() {
            match device.grab() {
                Ok(_) => {
                    Self::log_grabbed_device(&device);
                    true
                }
                Err(e) => {
                    Self::log_grab_error(&device_path, &e);
                    return Err(PaperError::Permission(format!(
                        "Не удалось захватить устройство эксклюзивно: {}",
                        e
                    )));
                }
            }
        } else {
            info!(
                "Устройство {} читается без захвата, события не подавляются",
                device.name().unwrap_or("Unknown")
            );
            false
        };

        Ok(Self {
            mode,
            router,
            state: EngineState::default(),
            device,
            virtual_device,
            grabbed,
        })
    }

    fn run_impl(mut self, stop: Arc<AtomicBool>) -> Result<()> {
        info!("RealKeyboardListener запущен, начинаем чтение событий");

        while !stop.load(Ordering::Acquire) {
            // fetch_events блокирует до прихода событий
            let events: Vec<_> = match self.device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) => {
                    error!("Ошибка чтения событий: {}", e);
                    if e.raw_os_error() == Some(19) {
                        // ENODEV: устройство отключено
                        return Err(PaperError::DeviceNotFound("Устройство ввода отключено".to_string()));
                    }
                    thread::sleep(Duration::from_millis(100));
                    continue;
                }
            };

            for event in events {
                self.handle_event(event);
            }
        }

        info!("RealKeyboardListener остановлен");
        Ok(())
    }

    fn handle_event(&mut self, event: evdev::InputEvent) {
        if event.event_type() != EventType::KEY {
            trace_if_enabled!("Пропуск не-клавиатурного события: {:?}", event);
            return;
        }

        let Some(key_event) = KeyEvent::from_evdev(event.code(), event.value(), monotonic_ms()) else {
            debug!("Неизвестное значение события: {}", event.value());
            return;
        };

        let disposition = self.router.dispatch(&mut self.state, &key_event);

        if self.grabbed {
            self.forward(&key_event, disposition);
        } else if disposition.is_consumed() {
            debug_if_enabled!("{} обработано, но в режиме {} не подавляется", key_event, self.mode);
        }
    }

    fn forward(&self, key_event: &KeyEvent, disposition: Disposition) {
        let must_forward = match disposition {
            Disposition::PassThrough => true,
            // Up для уже проброшенного Down отправляем всегда, иначе клавиша залипнет
            Disposition::Consumed => {
                !key_event.is_down() && self.virtual_device.is_forwarded_down(key_event.key_code)
            }
        };

        if !must_forward {
            return;
        }

        if let Err(e) = self.virtual_device.emit(key_event) {
            debug!("Не удалось пробросить событие {}: {}", key_event, e);
        }
    }

    fn log_grabbed_device(device: &Device) {
        info!("Устройство: {}", device.name().unwrap_or("Unknown"));
        info!("Физический путь: {:?}", device.physical_path());
        info!("Уникальный ID: {:?}", device.unique_name());
        info!("Устройство захвачено эксклюзивно");
    }

    fn log_grab_error(device_path: &Path, e: &Error) {
        warn!(
            "Не удалось захватить устройство {}: {}",
            device_path.display(),
            e
        );
        warn!("Попробуйте:");
        warn!("1. Убедиться, что устройство не захвачено другим процессом");
        warn!("2. Добавить пользователя в группу input: sudo usermod -a -G input $USER");
        warn!("3. Запустить в режиме observer: refresh-paper run --mode observer");
    }
}

impl KeyboardListenerTrait for RealKeyboardListener {
    fn run(self: Box<Self>, stop: Arc<AtomicBool>) -> Result<()> {
        (*self).run_impl(stop)
    }
}

impl Drop for RealKeyboardListener {
    fn drop(&mut self) {
        if !self.grabbed {
            return;
        }
        info!("Освобождение захваченного устройства");
        if let Err(e) = self.device.ungrab() {
            error!("Не удалось освободить устройство: {}", e);
        }
    }
}
