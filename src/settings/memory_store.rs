use crate::error::{ConfigReadError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{read_bool, read_int, read_string, SettingValue, SettingsMap, SettingsStore};

struct Subscriber {
    keys: Vec<String>,
    tx: Sender<String>,
}

/// Хранилище настроек в памяти процесса для сухого запуска и тестов.
///
/// Уведомления уходят синхронно из `put`/`put_all`. Можно имитировать ошибки
/// чтения и отсутствие подписки.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: RwLock<SettingsMap>,
    subscribers: Mutex<Vec<Subscriber>>,
    fail_reads: AtomicBool,
    subscriptions_disabled: AtomicBool,
    reloads: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Все следующие чтения падают, пока флаг не снят
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn disable_subscriptions(&self) {
        self.subscriptions_disabled.store(true, Ordering::SeqCst);
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Пишет несколько значений под одной блокировкой; читатель не увидит половину
    pub fn put_all(&self, entries: &[(&str, SettingValue)]) {
        {
            let mut values = self.values.write();
            for (key, value) in entries {
                values.insert(key.to_string(), value.to_json());
            }
        }
        for (key, _) in entries {
            self.notify(key);
        }
    }

    fn notify(&self, key: &str) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            if !sub.keys.iter().any(|k| k == key) {
                return true;
            }
            sub.tx.send(key.to_string()).is_ok()
        });
    }

    fn check_readable(&self) -> std::result::Result<(), ConfigReadError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ConfigReadError::Io(std::io::Error::other(
                "имитация ошибки чтения настроек",
            )));
        }
        Ok(())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn reload(&self) -> std::result::Result<(), ConfigReadError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        self.check_readable()
    }

    fn get_bool(&self, key: &str, default: bool) -> std::result::Result<bool, ConfigReadError> {
        self.check_readable()?;
        read_bool(&self.values.read(), key, default)
    }

    fn get_int(&self, key: &str, default: i64) -> std::result::Result<i64, ConfigReadError> {
        self.check_readable()?;
        read_int(&self.values.read(), key, default)
    }

    fn get_string(&self, key: &str, default: &str) -> std::result::Result<String, ConfigReadError> {
        self.check_readable()?;
        read_string(&self.values.read(), key, default)
    }

    fn subscribe(&self, keys: &[&str]) -> std::result::Result<Receiver<String>, ConfigReadError> {
        if self.subscriptions_disabled.load(Ordering::SeqCst) {
            return Err(ConfigReadError::SubscriptionUnavailable(
                "подписка отключена".to_string(),
            ));
        }
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(Subscriber {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            tx,
        });
        Ok(rx)
    }

    fn put(&self, key: &str, value: SettingValue) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_json());
        self.notify(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::keys;

    #[test]
    fn test_put_notifies_only_matching_subscribers() {
        let store = MemorySettingsStore::new();
        let rx = store.subscribe(&[keys::F1_ACTION]).unwrap();

        store.put(keys::PAGES_PER_REFRESH, SettingValue::Int(2)).unwrap();
        store.put(keys::F1_ACTION, SettingValue::Int(3)).unwrap();

        assert_eq!(rx.try_recv().unwrap(), keys::F1_ACTION);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_simulated_failures() {
        let store = MemorySettingsStore::new();
        store.set_fail_reads(true);
        assert!(store.get_bool(keys::AUTO_REFRESH_ENABLED, false).is_err());
        store.set_fail_reads(false);
        assert!(store.get_bool(keys::AUTO_REFRESH_ENABLED, false).is_ok());

        store.disable_subscriptions();
        assert!(store.subscribe(&[keys::F1_ACTION]).is_err());
    }
}
