use crate::error::ConfigReadError;
use crate::settings::{keys, SettingsStore};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PAGE_TURN_THRESHOLD: u32 = 5;
pub const DEFAULT_PULL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_HOME_LAUNCHER_COMPONENT: &str =
    "cn.modificator.launcher/cn.modificator.launcher.Launcher";

/// Действие короткого нажатия назначенной клавиши.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum F1Action {
    Back,
    Screenshot,
    QuickSettings,
    Brightness,
    ManualRefresh,
}

impl F1Action {
    /// Неизвестные значения превращаются в `Back`
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => F1Action::Screenshot,
            2 => F1Action::QuickSettings,
            3 => F1Action::Brightness,
            4 => F1Action::ManualRefresh,
            _ => F1Action::Back,
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            F1Action::Back => 0,
            F1Action::Screenshot => 1,
            F1Action::QuickSettings => 2,
            F1Action::Brightness => 3,
            F1Action::ManualRefresh => 4,
        }
    }
}

/// Неизменяемый снимок настроек, нужных движку, на момент чтения.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSnapshot {
    pub auto_refresh_enabled: bool,
    pub touch_refresh_enabled: bool,
    pub page_turn_threshold: u32,
    pub manual_refresh_enabled: bool,
    pub chord_enabled: bool,
    pub f1_action: F1Action,
    pub secure_bypass_enabled: bool,
    pub home_launcher_component: String,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            auto_refresh_enabled: false,
            touch_refresh_enabled: false,
            page_turn_threshold: DEFAULT_PAGE_TURN_THRESHOLD,
            manual_refresh_enabled: false,
            chord_enabled: false,
            f1_action: F1Action::Back,
            secure_bypass_enabled: true,
            home_launcher_component: DEFAULT_HOME_LAUNCHER_COMPONENT.to_string(),
        }
    }
}

impl ConfigSnapshot {
    /// Снимок после неудачного чтения: все включатели выключены, остальное
    /// берётся из `self`.
    pub fn fail_closed(&self) -> Self {
        Self {
            auto_refresh_enabled: false,
            touch_refresh_enabled: false,
            manual_refresh_enabled: false,
            chord_enabled: false,
            ..self.clone()
        }
    }

    pub fn touch_counting_enabled(&self) -> bool {
        self.auto_refresh_enabled && self.touch_refresh_enabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSource {
    Init,
    Observer,
    Pull,
}

impl fmt::Display for ReloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReloadSource::Init => "init",
            ReloadSource::Observer => "observer",
            ReloadSource::Pull => "pull",
        };
        write!(f, "{}", name)
    }
}

/// Кэш поверх общего хранилища настроек.
///
/// `get()` никогда не ждёт ввода-вывода. Новый снимок подменяется целиком,
/// поэтому читатель видит либо старый, либо новый, но не смесь.
pub struct ConfigCache {
    store: Arc<dyn SettingsStore>,
    chord_setting: &'static str,
    pull_interval_ms: u64,
    snapshot: RwLock<Arc<ConfigSnapshot>>,
    reload_lock: Mutex<()>,
    has_read: AtomicBool,
    push_active: AtomicBool,
    last_pull_ms: Mutex<Option<u64>>,
}

impl ConfigCache {
    /// `chord_setting` - настройка, которая включает аккорд в этом режиме
    pub fn new(store: Arc<dyn SettingsStore>, chord_setting: &'static str, pull_interval_ms: u64) -> Self {
        Self {
            store,
            chord_setting,
            pull_interval_ms,
            snapshot: RwLock::new(Arc::new(ConfigSnapshot::default())),
            reload_lock: Mutex::new(()),
            has_read: AtomicBool::new(false),
            push_active: AtomicBool::new(false),
            last_pull_ms: Mutex::new(None),
        }
    }

    pub fn get(&self) -> Arc<ConfigSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn is_push_active(&self) -> bool {
        self.push_active.load(Ordering::Acquire)
    }

    pub fn watched_keys(&self) -> Vec<&'static str> {
        vec![
            keys::AUTO_REFRESH_ENABLED,
            keys::TOUCH_REFRESH_ENABLED,
            keys::PAGES_PER_REFRESH,
            keys::MANUAL_REFRESH_ENABLED,
            self.chord_setting,
            keys::F1_ACTION,
            keys::SECURE_BYPASS_ENABLED,
            keys::HOME_LAUNCHER_COMPONENT,
        ]
    }

    fn read_snapshot(&self) -> Result<ConfigSnapshot, ConfigReadError> {
        let store = &self.store;
        store.reload()?;

        let threshold = store
            .get_int(keys::PAGES_PER_REFRESH, i64::from(DEFAULT_PAGE_TURN_THRESHOLD))?
            .clamp(1, i64::from(u32::MAX)) as u32;

        Ok(ConfigSnapshot {
            auto_refresh_enabled: store.get_bool(keys::AUTO_REFRESH_ENABLED, false)?,
            touch_refresh_enabled: store.get_bool(keys::TOUCH_REFRESH_ENABLED, false)?,
            page_turn_threshold: threshold,
            manual_refresh_enabled: store.get_bool(keys::MANUAL_REFRESH_ENABLED, false)?,
            chord_enabled: store.get_bool(self.chord_setting, false)?,
            f1_action: F1Action::from_raw(store.get_int(keys::F1_ACTION, F1Action::Back.raw())?),
            secure_bypass_enabled: store.get_bool(keys::SECURE_BYPASS_ENABLED, true)?,
            home_launcher_component: store
                .get_string(keys::HOME_LAUNCHER_COMPONENT, DEFAULT_HOME_LAUNCHER_COMPONENT)?,
        })
    }

    /// Перечитывает хранилище и публикует новый снимок. Возвращает, удалось ли
    /// чтение; при ошибке публикуется снимок с выключенными триггерами.
    pub fn reload(&self, source: ReloadSource) -> bool {
        let _serialized = self.reload_lock.lock();

        match self.read_snapshot() {
            Ok(snapshot) => {
                debug!(
                    "Настройки перечитаны source={} auto={} threshold={} chord={} action={:?}",
                    source,
                    snapshot.auto_refresh_enabled,
                    snapshot.page_turn_threshold,
                    snapshot.chord_enabled,
                    snapshot.f1_action
                );
                *self.snapshot.write() = Arc::new(snapshot);
                self.has_read.store(true, Ordering::Release);
                true
            }
            Err(e) => {
                let fallback = if self.has_read.load(Ordering::Acquire) {
                    self.get().fail_closed()
                } else {
                    ConfigSnapshot::default()
                };
                error!("Ошибка чтения настроек source={}: {}", source, e);
                *self.snapshot.write() = Arc::new(fallback);
                false
            }
        }
    }

    /// Опрос: перечитывает не чаще раза за интервал и только пока нет подписки.
    /// `now_ms` берётся из монотонных часов событий.
    pub fn refresh_if_due(&self, now_ms: u64) {
        if self.is_push_active() {
            return;
        }

        {
            let mut last = self.last_pull_ms.lock();
            if let Some(prev) = *last {
                if now_ms >= prev && now_ms - prev < self.pull_interval_ms {
                    return;
                }
            }
            *last = Some(now_ms);
        }

        self.reload(ReloadSource::Pull);
    }

    /// Подписывается на хранилище и запускает поток `settings-observer`, который
    /// применяет присланные изменения. false, если подписки нет и остаётся опрос.
    pub fn start_observer(self: &Arc<Self>) -> bool {
        let rx = match self.store.subscribe(&self.watched_keys()) {
            Ok(rx) => rx,
            Err(e) => {
                warn!("Уведомления об изменении настроек недоступны, переходим на опрос: {}", e);
                self.push_active.store(false, Ordering::Release);
                return false;
            }
        };

        self.push_active.store(true, Ordering::Release);
        let cache = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("settings-observer".to_string())
            .spawn(move || {
                while let Ok(key) = rx.recv() {
                    // Пачку уведомлений сводим к одному перечитыванию
                    let extra = rx.try_iter().count();
                    debug!("Изменилась настройка: {} (+{} ещё)", key, extra);
                    cache.reload(ReloadSource::Observer);
                }
                cache.push_active.store(false, Ordering::Release);
                warn!("Подписка на настройки закрыта, переходим на опрос");
            });

        match spawned {
            Ok(_) => {
                info!("Наблюдатель настроек запущен");
                true
            }
            Err(e) => {
                warn!("Не удалось запустить наблюдатель настроек: {}", e);
                self.push_active.store(false, Ordering::Release);
                false
            }
        }
    }
}
