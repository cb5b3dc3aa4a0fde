use serde::{Deserialize, Serialize};
use std::fmt;

use crate::mappings::key_names;

/// Переход клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAction {
    Down,
    Up,
}

/// Код клавиши (evdev коды)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn name(&self) -> Option<&'static str> {
        key_names::name_for_code(self.0)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "KEY_{}", self.0),
        }
    }
}

/// Одно физическое событие клавиши, живёт один вызов диспетчера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key_code: KeyCode,
    pub action: KeyAction,
    /// Автоповтор ядра; бывает только вместе с `KeyAction::Down`
    pub repeat: bool,
    /// Монотонное время, см. `events::clock`
    pub timestamp_ms: u64,
}

impl KeyEvent {
    pub fn new(key_code: KeyCode, action: KeyAction, timestamp_ms: u64) -> Self {
        Self {
            key_code,
            action,
            repeat: false,
            timestamp_ms,
        }
    }

    pub fn down(key_code: KeyCode, timestamp_ms: u64) -> Self {
        Self::new(key_code, KeyAction::Down, timestamp_ms)
    }

    pub fn up(key_code: KeyCode, timestamp_ms: u64) -> Self {
        Self::new(key_code, KeyAction::Up, timestamp_ms)
    }

    pub fn repeat(key_code: KeyCode, timestamp_ms: u64) -> Self {
        Self {
            repeat: true,
            ..Self::down(key_code, timestamp_ms)
        }
    }

    /// Событие из значения evdev (0 отпускание, 1 нажатие, 2 повтор).
    ///
    /// Метку времени evdev не используем: это CLOCK_REALTIME, и он прыгает назад
    /// при переводе часов. Вызывающий передаёт `monotonic_ms()`.
    pub fn from_evdev(code: u16, value: i32, timestamp_ms: u64) -> Option<Self> {
        let key_code = KeyCode(code);
        match value {
            0 => Some(Self::up(key_code, timestamp_ms)),
            1 => Some(Self::down(key_code, timestamp_ms)),
            2 => Some(Self::repeat(key_code, timestamp_ms)),
            _ => None,
        }
    }

    pub fn is_down(&self) -> bool {
        self.action == KeyAction::Down
    }

    /// Первый Down нажатия, не автоповтор
    pub fn is_initial_down(&self) -> bool {
        self.action == KeyAction::Down && !self.repeat
    }

    /// Значение evdev для повторной отправки через uinput
    pub fn evdev_value(&self) -> i32 {
        match (self.action, self.repeat) {
            (KeyAction::Up, _) => 0,
            (KeyAction::Down, false) => 1,
            (KeyAction::Down, true) => 2,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match (self.action, self.repeat) {
            (KeyAction::Down, true) => "Repeat",
            (KeyAction::Down, false) => "Down",
            (KeyAction::Up, _) => "Up",
        };
        write!(f, "{} {} @{}ms", self.key_code, action, self.timestamp_ms)
    }
}
