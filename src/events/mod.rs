pub mod clock;
pub mod foreground;
pub mod keyboard;

pub use clock::monotonic_ms;
pub use foreground::ForegroundContext;
pub use keyboard::{KeyAction, KeyCode, KeyEvent};
