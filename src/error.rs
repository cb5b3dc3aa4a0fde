use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaperError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка uinput: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("Ошибка хранилища настроек: {0}")]
    Settings(#[from] ConfigReadError),

    #[error("Не удалось сохранить настройку '{key}': {reason}")]
    SettingsWrite { key: String, reason: String },

    #[error("Устройство не найдено: {0}")]
    DeviceNotFound(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl PaperError {
    pub fn device_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(PaperError::DeviceNotFound(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, PaperError>;

/// Ошибка чтения хранилища настроек. Для движка всегда временная:
/// кэш откатывается на безопасный снимок и пишет в лог.
#[derive(Error, Debug)]
pub enum ConfigReadError {
    #[error("файл настроек не читается: {0}")]
    Io(#[from] std::io::Error),

    #[error("файл настроек повреждён: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("настройка '{key}' содержит {found}, ожидался {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("подписка на изменения недоступна: {0}")]
    SubscriptionUnavailable(String),
}

/// Почему не удалось полное обновление экрана.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Примитива перерисовки на этом устройстве нет. Навсегда, до перезапуска.
    #[error("примитив обновления на этом устройстве недоступен")]
    Unsupported,

    #[error("поверхность для перерисовки ещё не определена")]
    NoSurface,

    /// Шаг 1 не удался: ничего не нарисовано, режим не менялся
    #[error("не удалось включить режим обновления: {0}")]
    ModeSwitchFailed(String),

    /// Шаг 2 не удался, режим всё равно восстановлен
    #[error("полная перерисовка не удалась: {0}")]
    RedrawFailed(String),

    #[error("не удалось вернуть режим дисплея: {0}")]
    ModeRestoreFailed(String),
}

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! paper_error {
    (device_not_found, $($arg:tt)*) => {
        $crate::error::PaperError::DeviceNotFound(format!($($arg)*))
    };
    (permission, $($arg:tt)*) => {
        $crate::error::PaperError::Permission(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::PaperError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::PaperError::Internal(format!($($arg)*))
    };
}
