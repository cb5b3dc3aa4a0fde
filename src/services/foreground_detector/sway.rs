use crate::error::{PaperError, Result};
use crate::events::ForegroundContext;
use serde_json::Value;
use std::process::Command;

/// Wayland (sway): `app_id` или X11-класс как пакет, `name` как компонент.
pub struct SwayDetector;

impl SwayDetector {
    pub fn new() -> Self {
        Self
    }

    fn get_tree() -> Result<Value> {
        let output = Command::new("swaymsg")
            .args(["-t", "get_tree", "-r"])
            .output()
            .map_err(|e| PaperError::ServiceUnavailable(format!("swaymsg не найден: {}", e)))?;

        if !output.status.success() {
            return Err(PaperError::ServiceUnavailable("swaymsg вернул ошибку".to_string()));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| PaperError::Internal(format!("Некорректный ответ swaymsg: {}", e)))
    }

    pub async fn test(&self) -> Result<()> {
        Self::get_tree().map(|_| ())
    }

    pub async fn get_foreground(&self) -> Result<ForegroundContext> {
        let tree = Self::get_tree()?;
        focused_in_tree(&tree)
            .ok_or_else(|| PaperError::Internal("Активное окно в Sway не найдено".to_string()))
    }
}

/// Ищет узел с `"focused": true` среди обычных и плавающих узлов.
pub(crate) fn focused_in_tree(node: &Value) -> Option<ForegroundContext> {
    if node.get("focused").and_then(Value::as_bool) == Some(true) {
        let package = node
            .get("app_id")
            .and_then(Value::as_str)
            .or_else(|| node.pointer("/window_properties/class").and_then(Value::as_str))
            .unwrap_or_default();
        let name = node.get("name").and_then(Value::as_str).unwrap_or_default();
        return Some(ForegroundContext::new(package, name));
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(focused_in_tree)
}
