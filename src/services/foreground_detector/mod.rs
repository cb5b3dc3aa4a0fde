//! Foreground detector service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for finding out which
//! application is in front and publishing it into a `ForegroundFeed`.
//! They MUST NOT decide whether a key is handled; exclusion checks and all key
//! arbitration live in the engine.

mod dry_run;
mod foreground_detector;
mod sway;
mod xdotool;
mod r#trait;

pub use self::r#trait::{create_foreground_detector, ForegroundDetectorTrait};
