use crate::error::{PaperError, Result};
use crate::events::KeyCode;
use crate::mappings::key_names::BTN_TOUCH;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct DeviceFinder;

impl DeviceFinder {
    /// Найти устройство ввода, на котором есть нужные клавиши
    pub fn find_input_device(device_path: &str, bound_keys: &[KeyCode]) -> Result<PathBuf> {
        if device_path != "auto" {
            return Self::explicit(device_path);
        }

        info!("Начинаем автопоиск устройства с {} нужными клавишами...", bound_keys.len());

        let mut scored: Vec<(PathBuf, usize)> = Self::event_devices()?
            .into_iter()
            .filter_map(|path| {
                let score = Self::score_keys(&path, bound_keys)?;
                Some((path, score))
            })
            .filter(|(_, score)| *score > 0)
            .collect();

        // Больше совпадений лучше; при равенстве меньший номер event
        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        match scored.into_iter().next() {
            Some((path, score)) => {
                info!("Выбрано устройство {:?} ({} из {} клавиш)", path, score, bound_keys.len());
                Ok(path)
            }
            None => PaperError::device_not_found(
                "Не удалось найти устройство с нужными клавишами. \
                 Убедитесь, что пользователь добавлен в группу 'input'",
            ),
        }
    }

    /// Найти сенсорный экран (BTN_TOUCH)
    pub fn find_touch_device(device_path: &str) -> Result<PathBuf> {
        if device_path != "auto" {
            return Self::explicit(device_path);
        }

        for path in Self::event_devices()? {
            let Ok(device) = evdev::Device::open(&path) else {
                continue;
            };
            let has_touch = device
                .supported_keys()
                .is_some_and(|keys| keys.contains(evdev::KeyCode::new(BTN_TOUCH)));
            if has_touch && device.supported_absolute_axes().is_some() {
                info!("Найден сенсорный экран: {:?} ({})", path, device.name().unwrap_or("Unknown"));
                return Ok(path);
            }
        }

        PaperError::device_not_found("Сенсорный экран не найден")
    }

    fn explicit(device_path: &str) -> Result<PathBuf> {
        let path = PathBuf::from(device_path);
        if path.exists() {
            info!("Используется указанное устройство: {:?}", path);
            Ok(path)
        } else {
            PaperError::device_not_found(format!("Указанное устройство не найдено: {:?}", path))
        }
    }

    fn event_devices() -> Result<Vec<PathBuf>> {
        let input_dir = Path::new("/dev/input");

        let entries = fs::read_dir(input_dir)
            .map_err(|e| PaperError::Permission(format!("Нет доступа к /dev/input: {}", e)))?;

        let mut event_devices = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_event = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("event"));
            if is_event && Self::is_device_accessible(&path) {
                event_devices.push(path);
            }
        }

        // Сортируем устройства по номеру
        event_devices.sort_by_key(|p| Self::event_number(p));
        Ok(event_devices)
    }

    fn event_number(path: &Path) -> u32 {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("event"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(u32::MAX)
    }

    /// Сколько из нужных клавиш поддерживает устройство; `None` если его нельзя открыть
    fn score_keys(device_path: &Path, bound_keys: &[KeyCode]) -> Option<usize> {
        let device = match evdev::Device::open(device_path) {
            Ok(device) => device,
            Err(e) => {
                debug!("Не удалось открыть устройство {:?}: {}", device_path, e);
                return None;
            }
        };

        let device_name = device.name().unwrap_or("Unknown").to_lowercase();

        // Исключаем мыши и тачпады по имени устройства
        if device_name.contains("mouse") || device_name.contains("touchpad") || device_name.contains("trackpoint") {
            debug!("Исключаем устройство как мышь/тачпад: {:?} ({})", device_path, device_name);
            return None;
        }

        let score = device.supported_keys().map_or(0, |keys| {
            bound_keys
                .iter()
                .filter(|k| keys.contains(evdev::KeyCode::new(k.value())))
                .count()
        });
        debug!("Устройство {:?} ({}): {} совпадений", device_path, device_name, score);
        Some(score)
    }

    fn is_device_accessible(device_path: &Path) -> bool {
        match fs::File::open(device_path) {
            Ok(_) => true,
            Err(e) => {
                warn!("Устройство {:?} недоступно: {}", device_path, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_input_device_with_specific_path() {
        // Тест с несуществующим путем
        let result = DeviceFinder::find_input_device("/non/existent/path", &[KeyCode(59)]);
        assert!(matches!(result, Err(PaperError::DeviceNotFound(_))));
    }

    #[test]
    fn test_existing_explicit_path_is_used() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert_eq!(DeviceFinder::find_touch_device(path).unwrap(), file.path());
    }

    #[test]
    fn test_event_number_ordering() {
        assert_eq!(DeviceFinder::event_number(Path::new("/dev/input/event12")), 12);
        assert_eq!(DeviceFinder::event_number(Path::new("/dev/input/mice")), u32::MAX);
    }
}
