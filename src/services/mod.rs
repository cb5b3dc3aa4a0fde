pub mod foreground_context;
pub mod foreground_detector;
pub mod keyboard_listener;
pub mod refresh_primitive;
pub mod side_effects;
pub mod virtual_device;

pub use foreground_context::SharedForeground;
pub use foreground_detector::create_foreground_detector;
pub use keyboard_listener::{create_keyboard_listener, TouchListener, TouchRefresh};
pub use refresh_primitive::{resolve_primitive, resolve_surface_id};
pub use side_effects::CommandSideEffects;
pub use virtual_device::VirtualDevice;
