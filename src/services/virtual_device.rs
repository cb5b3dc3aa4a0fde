use crate::error::{PaperError, Result};
use crate::events::{KeyCode, KeyEvent};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

struct DeviceState {
    device: Option<uinput::Device>,
    /// Клавиши, для которых Down уже ушёл наружу, а Up ещё нет
    pressed: BTreeSet<u16>,
}

/// Виртуальная клавиатура uinput: проброс непоглощённых событий и синтетические нажатия.
pub struct VirtualDevice {
    state: Mutex<DeviceState>,
    device_name: String,
    dry_run: bool,
}

impl VirtualDevice {
    pub fn new(device_name: &str, dry_run: bool) -> Result<Self> {
        info!("Инициализация VirtualDevice '{}' (dry_run: {})", device_name, dry_run);

        let device = if dry_run {
            None
        } else {
            Some(Self::create_virtual_device(device_name)?)
        };

        Ok(Self {
            state: Mutex::new(DeviceState {
                device,
                pressed: BTreeSet::new(),
            }),
            device_name: device_name.to_string(),
            dry_run,
        })
    }

    /// Устройство без uinput: синтетические нажатия возвращают ошибку.
    pub fn unavailable(device_name: &str) -> Self {
        warn!("VirtualDevice '{}' работает без uinput", device_name);
        Self {
            state: Mutex::new(DeviceState {
                device: None,
                pressed: BTreeSet::new(),
            }),
            device_name: device_name.to_string(),
            dry_run: false,
        }
    }

    fn create_virtual_device(device_name: &str) -> Result<uinput::Device> {
        info!("Создание виртуального устройства uinput '{}'", device_name);

        let virtual_device = uinput::default()?
            .name(device_name)?
            .event(uinput::event::Keyboard::All)?
            .create()
            .map_err(|e| {
                PaperError::Internal(format!(
                    "Не удалось создать виртуальное устройство '{}': {}",
                    device_name, e
                ))
            })?;

        info!("Виртуальное устройство '{}' создано успешно", device_name);
        Ok(virtual_device)
    }

    fn write_key(state: &mut DeviceState, code: u16, value: i32) -> Result<()> {
        let Some(device) = state.device.as_mut() else {
            return Err(PaperError::Internal("Виртуальное устройство недоступно".to_string()));
        };

        // Событие клавиши
        device.write(1, i32::from(code), value).map_err(|e| {
            PaperError::Internal(format!("Не удалось отправить событие клавиши {}: {}", code, e))
        })?;

        // Синхронизация
        device
            .write(0, 0, 0)
            .map_err(|e| PaperError::Internal(format!("Не удалось синхронизировать события: {}", e)))?;

        match value {
            0 => {
                state.pressed.remove(&code);
            }
            _ => {
                state.pressed.insert(code);
            }
        }
        Ok(())
    }

    /// Пробрасывает событие наружу как есть.
    pub fn emit(&self, event: &KeyEvent) -> Result<()> {
        if self.dry_run {
            debug!("[DRY RUN] Проброс события: {}", event);
            return Ok(());
        }

        let mut state = self.state.lock();
        Self::write_key(&mut state, event.key_code.value(), event.evdev_value())?;
        debug!("Событие {} проброшено", event);
        Ok(())
    }

    /// Нажатие и отпускание одной клавиши.
    pub fn tap(&self, code: KeyCode) -> Result<()> {
        if self.dry_run {
            info!("[DRY RUN] Нажатие {}", code);
            return Ok(());
        }

        let mut state = self.state.lock();
        Self::write_key(&mut state, code.value(), 1)?;
        Self::write_key(&mut state, code.value(), 0)?;
        debug!("Синтетическое нажатие {} отправлено", code);
        Ok(())
    }

    /// Был ли проброшен Down этой клавиши без парного Up.
    pub fn is_forwarded_down(&self, code: KeyCode) -> bool {
        self.state.lock().pressed.contains(&code.value())
    }

    /// Отпускает всё, что было проброшено нажатым, чтобы клавиши не залипли.
    pub fn release_all_keys(&self) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }

        let mut state = self.state.lock();
        let pressed: Vec<u16> = state.pressed.iter().copied().collect();
        for code in pressed {
            if let Err(e) = Self::write_key(&mut state, code, 0) {
                warn!("Не удалось отпустить клавишу {}: {}", KeyCode(code), e);
            }
        }
        state.pressed.clear();
        Ok(())
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if !self.dry_run {
            info!("Закрытие виртуального устройства '{}'", self.device_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_device_accepts_everything() {
        let device = VirtualDevice::new("test", true).unwrap();
        assert!(device.emit(&KeyEvent::down(KeyCode(59), 0)).is_ok());
        assert!(device.tap(KeyCode(158)).is_ok());
        assert!(device.release_all_keys().is_ok());
        assert!(!device.is_forwarded_down(KeyCode(59)));
    }

    #[test]
    fn test_unavailable_device_rejects_taps() {
        let device = VirtualDevice::unavailable("test");
        assert!(device.tap(KeyCode(158)).is_err());
        assert!(!device.is_forwarded_down(KeyCode(158)));
        assert!(device.release_all_keys().is_ok());
    }
}
