use crate::config::Config;
use crate::engine::ForegroundFeed;
use crate::error::{PaperError, Result};
use crate::events::ForegroundContext;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use super::r#trait::ForegroundDetectorTrait;
use super::sway::SwayDetector;
use super::xdotool::XdotoolDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkingMethod {
    Xdotool,
    Sway,
}

pub struct RealForegroundDetector {
    config: Arc<Config>,
    feed: Arc<dyn ForegroundFeed>,
    working_method: Option<WorkingMethod>,

    // Детекторы утилит
    xdotool: XdotoolDetector,
    sway: SwayDetector,
}

impl RealForegroundDetector {
    pub fn new(config: Arc<Config>, feed: Arc<dyn ForegroundFeed>) -> Result<Self> {
        info!("Инициализация RealForegroundDetector (режим: {})", config.foreground.detection);

        let working_method = match config.foreground.detection.as_str() {
            "xdotool" => Some(WorkingMethod::Xdotool),
            "sway" => Some(WorkingMethod::Sway),
            "auto" => None,
            other => {
                return Err(PaperError::Internal(format!(
                    "Неизвестный режим детекции активного окна: {}",
                    other
                )))
            }
        };

        Ok(Self {
            config,
            feed,
            working_method,
            xdotool: XdotoolDetector::new(),
            sway: SwayDetector::new(),
        })
    }

    fn candidates() -> [WorkingMethod; 2] {
        // На Wayland пробуем sway первым
        match std::env::var("XDG_SESSION_TYPE").as_deref() {
            Ok("x11") => [WorkingMethod::Xdotool, WorkingMethod::Sway],
            _ => [WorkingMethod::Sway, WorkingMethod::Xdotool],
        }
    }

    async fn detect_working_method(&self) -> Result<WorkingMethod> {
        info!("Определяем рабочий метод детекции активного окна...");

        for method in Self::candidates() {
            let works = match method {
                WorkingMethod::Xdotool => self.xdotool.test().await.is_ok(),
                WorkingMethod::Sway => self.sway.test().await.is_ok(),
            };
            if works {
                info!("Используем {:?}", method);
                return Ok(method);
            }
        }

        Err(PaperError::ServiceUnavailable(
            "Ни один метод детекции активного окна не работает".to_string(),
        ))
    }

    async fn get_by_method(&self, method: WorkingMethod) -> Result<ForegroundContext> {
        match method {
            WorkingMethod::Xdotool => self.xdotool.get_foreground().await,
            WorkingMethod::Sway => self.sway.get_foreground().await,
        }
    }

    fn publish(&self, context: ForegroundContext) {
        let description = context.to_string();
        if self.feed.update(context) {
            info!("Смена активного окна на: {}", description);
        }
    }

    async fn run_polling(mut self) -> Result<()> {
        let fixed = self.working_method.is_some();
        let mut interval = interval(Duration::from_millis(self.config.timing.foreground_poll_interval_ms));

        loop {
            interval.tick().await;

            let method = match self.working_method {
                Some(method) => method,
                None => match self.detect_working_method().await {
                    Ok(method) => {
                        self.working_method = Some(method);
                        method
                    }
                    Err(e) => {
                        error!("{}. Приостанавливаем детекцию на 10 секунд", e);
                        // Неизвестное окно считается исключённым
                        self.publish(ForegroundContext::unresolved());
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        continue;
                    }
                },
            };

            match self.get_by_method(method).await {
                Ok(context) => self.publish(context),
                Err(e) => {
                    warn!("Метод {:?} не вернул активное окно: {}", method, e);
                    self.publish(ForegroundContext::unresolved());
                    if !fixed {
                        debug!("Переопределяем метод детекции");
                        self.working_method = None;
                    }
                }
            }
        }
    }
}

impl Drop for RealForegroundDetector {
    fn drop(&mut self) {
        info!("RealForegroundDetector завершает работу");
    }
}

#[async_trait::async_trait]
impl ForegroundDetectorTrait for RealForegroundDetector {
    async fn run(self: Box<Self>) -> Result<()> {
        info!("RealForegroundDetector запущен");
        (*self).run_polling().await
    }
}
