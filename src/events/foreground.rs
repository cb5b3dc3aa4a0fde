use serde::{Deserialize, Serialize};
use std::fmt;

/// Приложение (окно), которое сейчас на переднем плане.
///
/// На Wayland/X11 пакет это класс окна (или `app_id` в sway), компонент это
/// заголовок окна.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForegroundContext {
    pub package_id: String,
    pub component_id: String,
}

impl ForegroundContext {
    pub fn new(package_id: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            component_id: component_id.into(),
        }
    }

    /// О переднем плане пока ничего не известно
    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn is_unresolved(&self) -> bool {
        self.package_id.trim().is_empty()
    }

    /// Проверка исключений: неопознанное окно считается заблокированным
    pub fn is_blocked(&self, excluded_packages: &[String]) -> bool {
        if self.is_unresolved() {
            return true;
        }
        excluded_packages
            .iter()
            .any(|pkg| pkg.eq_ignore_ascii_case(&self.package_id))
    }

    /// `пакет/компонент` в том виде, в каком он хранится в настройках
    pub fn flattened(&self) -> String {
        format!("{}/{}", self.package_id, self.component_id)
    }

    pub fn matches_component(&self, flattened: &str) -> bool {
        match flattened.split_once('/') {
            Some((pkg, component)) => self.package_id == pkg && self.component_id == component,
            None => false,
        }
    }
}

impl fmt::Display for ForegroundContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unresolved() {
            write!(f, "<unresolved>")
        } else if self.component_id.is_empty() {
            write!(f, "{}", self.package_id)
        } else {
            write!(f, "{} ({})", self.package_id, self.component_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_context_is_blocked() {
        let ctx = ForegroundContext::unresolved();
        assert!(ctx.is_unresolved());
        assert!(ctx.is_blocked(&[]));

        let blank = ForegroundContext::new("   ", "Reader");
        assert!(blank.is_blocked(&[]));
    }

    #[test]
    fn test_exclusion_list() {
        let excluded = vec!["com.ridi.paper".to_string()];

        let reader = ForegroundContext::new("com.ridi.paper", "Viewer");
        assert!(reader.is_blocked(&excluded));

        let other = ForegroundContext::new("koreader", "book.epub");
        assert!(!other.is_blocked(&excluded));
    }

    #[test]
    fn test_component_matching() {
        let ctx = ForegroundContext::new("refresh-paper", "quick-settings");
        assert!(ctx.matches_component("refresh-paper/quick-settings"));
        assert!(!ctx.matches_component("refresh-paper/brightness"));
        assert!(!ctx.matches_component("refresh-paper"));
        assert_eq!(ctx.flattened(), "refresh-paper/quick-settings");
    }
}
