mod dry_keyboard_listener;
mod keyboard_listener;
mod touch_listener;
mod r#trait;

pub use self::r#trait::{create_keyboard_listener, KeyboardListenerTrait};
pub use self::touch_listener::{TouchListener, TouchRefresh};
