use crate::engine::ForegroundFeed;
use crate::error::Result;
use crate::events::ForegroundContext;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::ForegroundDetectorTrait;

/// Циклически подставляет выдуманные окна, включая неопознанное.
pub struct DryRunDetector {
    feed: Arc<dyn ForegroundFeed>,
    period: Duration,
}

impl DryRunDetector {
    pub fn new(feed: Arc<dyn ForegroundFeed>, poll_interval_ms: u64) -> Self {
        // Смена раз в 20 опросов, чтобы успеть понажимать клавиши
        Self {
            feed,
            period: Duration::from_millis(poll_interval_ms.saturating_mul(20).max(1_000)),
        }
    }

    fn fake_windows() -> Vec<ForegroundContext> {
        vec![
            ForegroundContext::new("koreader", "dry_run.epub"),
            ForegroundContext::new("refresh-paper", "quick-settings"),
            ForegroundContext::unresolved(),
        ]
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - ForegroundDetector работает в режиме эмуляции");

        let fake_windows = Self::fake_windows();
        let mut window_index = 0;
        let mut interval = interval(self.period);

        loop {
            interval.tick().await;

            let fake_window = fake_windows[window_index].clone();
            info!("Dry-run: эмулируем смену окна на: {}", fake_window);
            self.feed.update(fake_window);

            window_index = (window_index + 1) % fake_windows.len();
        }
    }
}

#[async_trait::async_trait]
impl ForegroundDetectorTrait for DryRunDetector {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
