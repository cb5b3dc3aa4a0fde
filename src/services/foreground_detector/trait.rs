use crate::config::Config;
use crate::engine::ForegroundFeed;
use crate::error::Result;
use std::sync::Arc;

/// Trait for foreground detectors that can run in different modes
#[async_trait::async_trait]
pub trait ForegroundDetectorTrait {
    /// Run the detector, publishing every change into the feed
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate foreground detector based on the dry_run flag
pub fn create_foreground_detector(
    config: Arc<Config>,
    feed: Arc<dyn ForegroundFeed>,
    dry_run: bool,
) -> Result<Box<dyn ForegroundDetectorTrait + Send>> {
    if dry_run {
        Ok(Box::new(super::dry_run::DryRunDetector::new(
            feed,
            config.timing.foreground_poll_interval_ms,
        )))
    } else {
        Ok(Box::new(super::foreground_detector::RealForegroundDetector::new(
            config, feed,
        )?))
    }
}
