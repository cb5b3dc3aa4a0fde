//! Хранилище настроек ключ-значение, из которого читает движок.
//!
//! Хранилище общее: значения может писать другой процесс (команда `set`,
//! интерфейс настроек), пока демон работает. Движок не читает его напрямую на
//! горячем пути, только через `engine::ConfigCache`.

mod file_store;
pub mod keys;
mod memory_store;

pub use file_store::JsonFileSettingsStore;
pub use memory_store::MemorySettingsStore;

use crate::error::{ConfigReadError, Result};
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type SettingsMap = BTreeMap<String, serde_json::Value>;

/// Значение для `SettingsStore::put`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl SettingValue {
    /// Разбор ввода CLI: `true`/`false`, целые числа, остальное как строка
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "true" => SettingValue::Bool(true),
            "false" => SettingValue::Bool(false),
            other => other
                .parse::<i64>()
                .map(SettingValue::Int)
                .unwrap_or_else(|_| SettingValue::Str(raw.to_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SettingValue::Bool(b) => serde_json::Value::Bool(*b),
            SettingValue::Int(i) => serde_json::Value::from(*i),
            SettingValue::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Int(i) => write!(f, "{}", i),
            SettingValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Внешнее хранилище настроек.
///
/// Чтение возвращает `Err` только при настоящей ошибке; отсутствующий ключ
/// даёт значение по умолчанию. `subscribe` может не работать, тогда вызывающий
/// переходит на опрос.
pub trait SettingsStore: Send + Sync {
    /// Перечитывает носитель, чтобы следующие чтения видели свежие значения
    fn reload(&self) -> std::result::Result<(), ConfigReadError> {
        Ok(())
    }

    fn get_bool(&self, key: &str, default: bool) -> std::result::Result<bool, ConfigReadError>;

    fn get_int(&self, key: &str, default: i64) -> std::result::Result<i64, ConfigReadError>;

    fn get_string(&self, key: &str, default: &str) -> std::result::Result<String, ConfigReadError>;

    /// Присылает имя каждого отслеживаемого ключа, значение которого изменилось
    fn subscribe(&self, keys: &[&str]) -> std::result::Result<Receiver<String>, ConfigReadError>;

    fn put(&self, key: &str, value: SettingValue) -> Result<()>;
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn mismatch(key: &str, expected: &'static str, found: &serde_json::Value) -> ConfigReadError {
    ConfigReadError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: json_kind(found),
    }
}

/// Логические значения могут храниться и как целые 0/1.
pub(crate) fn read_bool(
    map: &SettingsMap,
    key: &str,
    default: bool,
) -> std::result::Result<bool, ConfigReadError> {
    match map.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(serde_json::Value::Number(n)) if n.as_i64().is_some() => Ok(n.as_i64() == Some(1)),
        Some(other) => Err(mismatch(key, "bool", other)),
    }
}

pub(crate) fn read_int(
    map: &SettingsMap,
    key: &str,
    default: i64,
) -> std::result::Result<i64, ConfigReadError> {
    match map.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(value @ serde_json::Value::Number(n)) => {
            n.as_i64().ok_or_else(|| mismatch(key, "integer", value))
        }
        Some(other) => Err(mismatch(key, "integer", other)),
    }
}

/// Пустая строка читается как значение по умолчанию.
pub(crate) fn read_string(
    map: &SettingsMap,
    key: &str,
    default: &str,
) -> std::result::Result<String, ConfigReadError> {
    match map.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default.to_string()),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(default.to_string()),
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(mismatch(key, "string", other)),
    }
}

/// Отслеживаемые ключи, значения которых различаются в двух картах.
pub(crate) fn changed_keys(before: &SettingsMap, after: &SettingsMap, watched: &[String]) -> Vec<String> {
    watched
        .iter()
        .filter(|key| before.get(key.as_str()) != after.get(key.as_str()))
        .cloned()
        .collect()
}
