use crate::error::{ConfigReadError, PaperError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use super::{changed_keys, read_bool, read_int, read_string, SettingValue, SettingsMap, SettingsStore};

/// Настройки, общие через JSON-файл, например
/// `{"rp_auto_refresh_enabled": true, "rp_pages_per_refresh": 5}`.
///
/// Чтения обслуживаются из копии в памяти, которую обновляет `reload()`.
/// Уведомления об изменениях шлёт поток `settings-watch`: он перечитывает файл,
/// как только меняется время модификации или размер.
pub struct JsonFileSettingsStore {
    path: PathBuf,
    values: RwLock<SettingsMap>,
    write_lock: Mutex<()>,
    watch_interval: Duration,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_watch_interval(path, Duration::from_millis(100))
    }

    pub fn with_watch_interval(path: impl Into<PathBuf>, watch_interval: Duration) -> Self {
        Self {
            path: path.into(),
            values: RwLock::new(SettingsMap::new()),
            write_lock: Mutex::new(()),
            watch_interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Отсутствующий файл - пустое хранилище, а не ошибка
    fn read_file(path: &Path) -> std::result::Result<SettingsMap, ConfigReadError> {
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(SettingsMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SettingsMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn file_stamp(path: &Path) -> Option<(SystemTime, u64)> {
        let meta = fs::metadata(path).ok()?;
        Some((meta.modified().ok()?, meta.len()))
    }

    fn write_file(path: &Path, values: &SettingsMap) -> std::io::Result<()> {
        let serialized = serde_json::to_string_pretty(values).map_err(std::io::Error::other)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)
    }

    fn watch_loop(path: PathBuf, watched: Vec<String>, interval: Duration, tx: Sender<String>) {
        let mut stamp = Self::file_stamp(&path);
        let mut last = Self::read_file(&path).unwrap_or_default();

        loop {
            thread::sleep(interval);

            let current_stamp = Self::file_stamp(&path);
            if current_stamp == stamp {
                continue;
            }
            stamp = current_stamp;

            let current = match Self::read_file(&path) {
                Ok(values) => values,
                Err(e) => {
                    // Подписчик перечитает, получит ту же ошибку и выключит триггеры
                    warn!("Файл настроек изменился, но не читается: {}", e);
                    if watched.iter().try_for_each(|k| tx.send(k.clone())).is_err() {
                        break;
                    }
                    continue;
                }
            };

            for key in changed_keys(&last, &current, &watched) {
                debug!("Изменилась настройка: {}", key);
                if tx.send(key).is_err() {
                    debug!("Подписчик настроек пропал, останавливаем наблюдение");
                    return;
                }
            }
            last = current;
        }
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn reload(&self) -> std::result::Result<(), ConfigReadError> {
        let values = Self::read_file(&self.path)?;
        *self.values.write() = values;
        Ok(())
    }

    fn get_bool(&self, key: &str, default: bool) -> std::result::Result<bool, ConfigReadError> {
        read_bool(&self.values.read(), key, default)
    }

    fn get_int(&self, key: &str, default: i64) -> std::result::Result<i64, ConfigReadError> {
        read_int(&self.values.read(), key, default)
    }

    fn get_string(&self, key: &str, default: &str) -> std::result::Result<String, ConfigReadError> {
        read_string(&self.values.read(), key, default)
    }

    fn subscribe(&self, keys: &[&str]) -> std::result::Result<Receiver<String>, ConfigReadError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        if !parent.is_dir() {
            return Err(ConfigReadError::SubscriptionUnavailable(format!(
                "директория {} не существует",
                parent.display()
            )));
        }

        let (tx, rx) = unbounded();
        let path = self.path.clone();
        let watched: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let interval = self.watch_interval;

        thread::Builder::new()
            .name("settings-watch".to_string())
            .spawn(move || Self::watch_loop(path, watched, interval, tx))
            .map_err(|e| ConfigReadError::SubscriptionUnavailable(e.to_string()))?;

        info!("Наблюдаем за файлом настроек {}", self.path.display());
        Ok(rx)
    }

    fn put(&self, key: &str, value: SettingValue) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut values = Self::read_file(&self.path).map_err(|e| PaperError::SettingsWrite {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        values.insert(key.to_string(), value.to_json());

        Self::write_file(&self.path, &values).map_err(|e| PaperError::SettingsWrite {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        *self.values.write() = values;
        Ok(())
    }
}
