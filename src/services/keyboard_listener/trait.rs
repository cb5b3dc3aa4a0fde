use crate::config::{Config, RunMode};
use crate::engine::EventRouter;
use crate::error::Result;
use crate::services::VirtualDevice;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Trait for keyboard listeners that can run in different modes
pub trait KeyboardListenerTrait: Send {
    /// Run the dispatch loop on the current thread until `stop` is raised
    fn run(self: Box<Self>, stop: Arc<AtomicBool>) -> Result<()>;
}

/// Factory function to create an appropriate keyboard listener based on the dry_run flag
pub fn create_keyboard_listener(
    config: Arc<Config>,
    mode: RunMode,
    router: EventRouter,
    virtual_device: Arc<VirtualDevice>,
    dry_run: bool,
) -> Result<Box<dyn KeyboardListenerTrait>> {
    if dry_run {
        Ok(Box::new(super::dry_keyboard_listener::DryRunKeyboardListener::new(
            router,
        )))
    } else {
        Ok(Box::new(super::keyboard_listener::RealKeyboardListener::new(
            config,
            mode,
            router,
            virtual_device,
        )?))
    }
}
