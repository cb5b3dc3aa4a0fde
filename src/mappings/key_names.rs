use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Соответствие имён клавиш из конфигурации и кодов evdev.
///
/// Здесь только клавиши, которые реально есть у e-ink читалок: аппаратные
/// кнопки, листание и функциональные клавиши подключённых клавиатур.
static NAME_TO_CODE: &[(&str, u16)] = &[
    // Функциональные клавиши
    ("esc", 1),           // KEY_ESC
    ("enter", 28),        // KEY_ENTER
    ("space", 57),        // KEY_SPACE
    ("f1", 59),           // KEY_F1
    ("f2", 60),           // KEY_F2
    ("f3", 61),           // KEY_F3
    ("f4", 62),           // KEY_F4
    ("f5", 63),           // KEY_F5
    ("f6", 64),           // KEY_F6
    ("f7", 65),           // KEY_F7
    ("f8", 66),           // KEY_F8
    ("f9", 67),           // KEY_F9
    ("f10", 68),          // KEY_F10
    ("f11", 87),          // KEY_F11
    ("f12", 88),          // KEY_F12
    ("printscreen", 99),  // KEY_SYSRQ

    // Навигация
    ("home", 102),     // KEY_HOME
    ("up", 103),       // KEY_UP
    ("pageup", 104),   // KEY_PAGEUP
    ("left", 105),     // KEY_LEFT
    ("right", 106),    // KEY_RIGHT
    ("end", 107),      // KEY_END
    ("down", 108),     // KEY_DOWN
    ("pagedown", 109), // KEY_PAGEDOWN

    // Аппаратные кнопки
    ("mute", 113),            // KEY_MUTE
    ("volumedown", 114),      // KEY_VOLUMEDOWN
    ("volumeup", 115),        // KEY_VOLUMEUP
    ("power", 116),           // KEY_POWER
    ("menu", 139),            // KEY_MENU
    ("back", 158),            // KEY_BACK
    ("homepage", 172),        // KEY_HOMEPAGE
    ("brightnessdown", 224),  // KEY_BRIGHTNESSDOWN
    ("brightnessup", 225),    // KEY_BRIGHTNESSUP
    ("next", 407),            // KEY_NEXT
    ("previous", 412),        // KEY_PREVIOUS

    // Сенсорный экран
    ("touch", 330), // BTN_TOUCH
];

static BY_NAME: Lazy<HashMap<&'static str, u16>> =
    Lazy::new(|| NAME_TO_CODE.iter().copied().collect());

static BY_CODE: Lazy<HashMap<u16, &'static str>> =
    Lazy::new(|| NAME_TO_CODE.iter().map(|&(name, code)| (code, name)).collect());

pub const KEY_BACK: u16 = 158;
pub const BTN_TOUCH: u16 = 330;

/// Код evdev по имени клавиши из конфигурации (регистр не важен)
pub fn code_for_name(name: &str) -> Option<u16> {
    BY_NAME.get(name.trim().to_lowercase().as_str()).copied()
}

pub fn name_for_code(code: u16) -> Option<&'static str> {
    BY_CODE.get(&code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_turn_keys() {
        assert_eq!(code_for_name("pageup"), Some(104));
        assert_eq!(code_for_name("pagedown"), Some(109));
        assert_eq!(code_for_name("volumeup"), Some(115));
        assert_eq!(code_for_name("volumedown"), Some(114));
        assert_eq!(code_for_name("left"), Some(105));
        assert_eq!(code_for_name("right"), Some(106));
    }

    #[test]
    fn test_names_are_case_insensitive() {
        assert_eq!(code_for_name("F1"), Some(59));
        assert_eq!(code_for_name(" Power "), Some(116));
        assert_eq!(code_for_name("nonexistent"), None);
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(name_for_code(158), Some("back"));
        assert_eq!(name_for_code(BTN_TOUCH), Some("touch"));
        assert_eq!(name_for_code(0), None);
    }

    #[test]
    fn test_table_has_no_duplicate_codes() {
        assert_eq!(BY_NAME.len(), NAME_TO_CODE.len());
        assert_eq!(BY_CODE.len(), NAME_TO_CODE.len());
    }
}
