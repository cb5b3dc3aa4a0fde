use crate::error::Result;
use crate::events::ForegroundContext;
use std::fmt;
use std::sync::Arc;

/// Экран, который движок может открыть.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Surface {
    QuickSettings,
    Brightness,
    /// Лаунчер в виде `пакет/компонент`
    Home(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Back,
    Screenshot,
    Launch(Surface),
}

impl SideEffect {
    pub fn component(&self) -> Option<&str> {
        match self {
            SideEffect::Launch(Surface::Home(component)) => Some(component),
            _ => None,
        }
    }
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffect::Back => write!(f, "back"),
            SideEffect::Screenshot => write!(f, "screenshot"),
            SideEffect::Launch(Surface::QuickSettings) => write!(f, "launch quick settings"),
            SideEffect::Launch(Surface::Brightness) => write!(f, "launch brightness"),
            SideEffect::Launch(Surface::Home(c)) => write!(f, "launch home {}", c),
        }
    }
}

/// Выполняет видимые пользователю действия, о которых решил движок.
pub trait SideEffectSink: Send + Sync {
    fn emit(&self, effect: &SideEffect) -> Result<()>;
}

/// Последний известный передний план; обновляется вне потока диспетчера.
pub trait ForegroundFeed: Send + Sync {
    fn current(&self) -> Arc<ForegroundContext>;

    /// true, если контекст изменился
    fn update(&self, context: ForegroundContext) -> bool;
}
