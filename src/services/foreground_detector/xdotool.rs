use crate::error::{PaperError, Result};
use crate::events::ForegroundContext;
use std::process::Command;
use tracing::debug;

/// X11: класс окна как пакет, заголовок как компонент.
pub struct XdotoolDetector;

impl XdotoolDetector {
    pub fn new() -> Self {
        Self
    }

    fn query(arg: &str) -> Result<String> {
        let output = Command::new("xdotool")
            .args(["getactivewindow", arg])
            .output()
            .map_err(|e| {
                debug!("xdotool не найден или не работает: {}", e);
                PaperError::ServiceUnavailable(format!("xdotool не найден: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("xdotool вернул ошибку: {}", stderr);
            return Err(PaperError::ServiceUnavailable(format!("xdotool вернул ошибку: {}", stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn test(&self) -> Result<()> {
        Self::query("getwindowclassname").map(|_| ())
    }

    pub async fn get_foreground(&self) -> Result<ForegroundContext> {
        let class = Self::query("getwindowclassname")?;
        // Заголовок не обязателен: без него окно всё равно опознано по классу
        let title = Self::query("getwindowname").unwrap_or_default();
        debug!("xdotool: класс '{}', заголовок '{}'", class, title);

        Ok(ForegroundContext::new(class, title))
    }
}
