use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::engine::{PageTurnKeys, RouterConfig};
use crate::events::KeyCode;
use crate::mappings::key_names::code_for_name;
use crate::settings::keys;

/// Где сидит демон относительно потока событий.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Только читаем устройство, подавить событие нельзя
    Observer,
    /// Захватываем устройство и переизлучаем непоглощённые события через uinput
    Intercept,
}

impl RunMode {
    /// Настройка, которая включает аккорд скриншота в этом режиме.
    pub fn chord_setting(self) -> &'static str {
        match self {
            RunMode::Observer => keys::F1_PAGE_CHORD_ENABLED,
            RunMode::Intercept => keys::POWER_PAGE_CHORD_ENABLED,
        }
    }

    pub fn default_chord_keys(self) -> [&'static str; 2] {
        match self {
            RunMode::Observer => ["f1", "pagedown"],
            RunMode::Intercept => ["power", "pagedown"],
        }
    }

    pub fn grabs_device(self) -> bool {
        self == RunMode::Intercept
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Observer => write!(f, "observer"),
            RunMode::Intercept => write!(f, "intercept"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub input: InputConfig,
    pub keys: KeysConfig,
    pub timing: TimingConfig,
    pub foreground: ForegroundConfig,
    pub refresh: RefreshConfig,
    pub settings: SettingsConfig,
    pub actions: ActionsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub mode: RunMode,
    /// "auto" или путь к /dev/input/eventN
    pub device_path: String,
    pub touch_device_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeysConfig {
    pub action_key: String,
    pub home_key: Option<String>,
    pub manual_refresh_key: Option<String>,
    pub page_turn_keys: Vec<String>,
    /// Пара клавиш аккорда; без неё берётся пара по умолчанию для режима
    pub chord_keys: Option<[String; 2]>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    pub chord_window_ms: u64,
    pub debounce_ms: u64,
    pub settings_poll_interval_ms: u64,
    pub foreground_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForegroundConfig {
    /// "auto" | "xdotool" | "sway"
    pub detection: String,
    pub excluded_packages: Vec<String>,
    pub quick_settings_component: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub mode_path: Option<PathBuf>,
    pub full_refresh_path: Option<PathBuf>,
    pub surface_id: Option<u32>,
    pub surface_id_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub screenshot_command: String,
    pub quick_settings_command: String,
    pub brightness_command: String,
    /// `{component}` заменяется на компонент лаунчера
    pub home_command: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Observer,
            device_path: "auto".to_string(),
            touch_device_path: None,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            action_key: "f1".to_string(),
            home_key: Some("home".to_string()),
            manual_refresh_key: Some("f4".to_string()),
            page_turn_keys: ["volumeup", "volumedown", "left", "right", "pageup", "pagedown"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            chord_keys: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            chord_window_ms: crate::engine::chord::DEFAULT_CHORD_WINDOW_MS,
            debounce_ms: crate::engine::action_dispatcher::DEFAULT_ACTION_DEBOUNCE_MS,
            settings_poll_interval_ms: crate::engine::config_cache::DEFAULT_PULL_INTERVAL_MS,
            foreground_poll_interval_ms: 500,
        }
    }
}

impl Default for ForegroundConfig {
    fn default() -> Self {
        Self {
            detection: "auto".to_string(),
            excluded_packages: Vec::new(),
            quick_settings_component: "refresh-paper/quick-settings".to_string(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/refresh-paper/settings.json"),
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            screenshot_command: "grim".to_string(),
            quick_settings_command: String::new(),
            brightness_command: String::new(),
            home_command: "gtk-launch {component}".to_string(),
        }
    }
}

fn resolve_key(field: &str, name: &str) -> Result<KeyCode> {
    code_for_name(name)
        .map(KeyCode)
        .with_context(|| format!("Неизвестная клавиша '{}' в keys.{}", name, field))
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("PAPER_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Все имена клавиш должны разрешаться в коды
        for mode in [RunMode::Observer, RunMode::Intercept] {
            self.router_config(mode)?;
        }

        if self.keys.page_turn_keys.is_empty() {
            anyhow::bail!("keys.page_turn_keys не может быть пустым");
        }

        // Валидация интервалов
        if self.timing.chord_window_ms == 0 {
            anyhow::bail!("chord_window_ms должно быть больше 0");
        }
        if self.timing.settings_poll_interval_ms == 0 {
            anyhow::bail!("settings_poll_interval_ms должно быть больше 0");
        }
        if self.timing.foreground_poll_interval_ms < 100 {
            anyhow::bail!("foreground_poll_interval_ms должно быть минимум 100");
        }

        match self.foreground.detection.as_str() {
            "auto" | "xdotool" | "sway" => {}
            other => anyhow::bail!("Неверный режим детекции активного окна: {}", other),
        }

        if !self.foreground.quick_settings_component.contains('/') {
            anyhow::bail!(
                "quick_settings_component должен иметь вид пакет/компонент: {}",
                self.foreground.quick_settings_component
            );
        }

        if self.refresh.surface_id == Some(0) {
            anyhow::bail!("refresh.surface_id должен быть больше 0");
        }

        Ok(())
    }

    pub fn chord_key_names(&self, mode: RunMode) -> [String; 2] {
        match &self.keys.chord_keys {
            Some(pair) => pair.clone(),
            None => mode.default_chord_keys().map(str::to_string),
        }
    }

    /// Разрешает имена клавиш и собирает конфигурацию маршрутизатора.
    pub fn router_config(&self, mode: RunMode) -> Result<RouterConfig> {
        let keys = &self.keys;

        let page_turn_keys = keys
            .page_turn_keys
            .iter()
            .map(|name| resolve_key("page_turn_keys", name))
            .collect::<Result<PageTurnKeys>>()?;

        let [a, b] = self.chord_key_names(mode);
        let chord_keys = (resolve_key("chord_keys", &a)?, resolve_key("chord_keys", &b)?);
        if chord_keys.0 == chord_keys.1 {
            anyhow::bail!("Клавиши аккорда должны различаться: {}", a);
        }

        Ok(RouterConfig {
            action_key: resolve_key("action_key", &keys.action_key)?,
            home_key: keys.home_key.as_deref().map(|n| resolve_key("home_key", n)).transpose()?,
            manual_refresh_key: keys
                .manual_refresh_key
                .as_deref()
                .map(|n| resolve_key("manual_refresh_key", n))
                .transpose()?,
            page_turn_keys,
            chord_keys,
            chord_window_ms: self.timing.chord_window_ms,
            debounce_ms: self.timing.debounce_ms,
            excluded_packages: self.foreground.excluded_packages.clone(),
            quick_settings_component: self.foreground.quick_settings_component.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_chord_keys_follow_mode() {
        let config = Config::default();

        let observer = config.router_config(RunMode::Observer).unwrap();
        assert_eq!(observer.chord_keys, (KeyCode(59), KeyCode(109)));

        let intercept = config.router_config(RunMode::Intercept).unwrap();
        assert_eq!(intercept.chord_keys, (KeyCode(116), KeyCode(109)));
        assert_eq!(intercept.page_turn_keys.len(), 6);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut config = Config::default();
        config.keys.action_key = "hyper".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hyper"));
    }

    #[test]
    fn test_empty_page_keys_rejected() {
        let mut config = Config::default();
        config.keys.page_turn_keys.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.timing.settings_poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[input]
mode = "intercept"

[keys]
page_turn_keys = ["next", "previous"]
chord_keys = ["power", "volumedown"]

[foreground]
excluded_packages = ["com.ridi.paper"]
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.input.mode, RunMode::Intercept);
        assert_eq!(config.timing.chord_window_ms, 250);

        let router = config.router_config(config.input.mode).unwrap();
        assert_eq!(router.chord_keys, (KeyCode(116), KeyCode(114)));
        assert_eq!(router.excluded_packages, vec!["com.ridi.paper".to_string()]);
    }
}
