//! Подделки, общие для тестов движка и сервисов.

use super::host::{ForegroundFeed, SideEffect, SideEffectSink};
use super::refresh::RefreshPrimitive;
use crate::error::{PaperError, Result};
use crate::events::ForegroundContext;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveCall {
    SetMode(i32),
    FullRefresh(i32),
}

#[derive(Default)]
struct LogInner {
    calls: Vec<PrimitiveCall>,
    failing_modes: HashSet<i32>,
    fail_full_refresh: bool,
    panic_on_full_refresh: bool,
    step_delay: Option<Duration>,
}

/// Журнал вызовов и переключатели отказов для `FakePrimitive`.
#[derive(Clone, Default)]
pub struct PrimitiveLog(Arc<Mutex<LogInner>>);

impl PrimitiveLog {
    pub fn calls(&self) -> Vec<PrimitiveCall> {
        self.0.lock().calls.clone()
    }

    pub fn redraws(&self) -> usize {
        self.0
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, PrimitiveCall::FullRefresh(_)))
            .count()
    }

    pub fn fail_set_mode(&self, mode: i32, fail: bool) {
        let mut inner = self.0.lock();
        if fail {
            inner.failing_modes.insert(mode);
        } else {
            inner.failing_modes.remove(&mode);
        }
    }

    pub fn fail_full_refresh(&self, fail: bool) {
        self.0.lock().fail_full_refresh = fail;
    }

    pub fn panic_on_full_refresh(&self, panic: bool) {
        self.0.lock().panic_on_full_refresh = panic;
    }

    /// Каждый шаг примитива засыпает на `delay`, чтобы параллельные прогоны успели перемешаться.
    pub fn slow_steps(&self, delay: Duration) {
        self.0.lock().step_delay = Some(delay);
    }

    fn pause(&self) {
        let delay = self.0.lock().step_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
    }
}

pub struct FakePrimitive {
    log: PrimitiveLog,
}

impl FakePrimitive {
    pub fn new() -> (Self, PrimitiveLog) {
        let log = PrimitiveLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl RefreshPrimitive for FakePrimitive {
    fn set_mode(&mut self, value: i32) -> io::Result<()> {
        let failing = {
            let mut inner = self.log.0.lock();
            inner.calls.push(PrimitiveCall::SetMode(value));
            inner.failing_modes.contains(&value)
        };
        self.log.pause();
        if failing {
            return Err(io::Error::other("set_mode отклонён"));
        }
        Ok(())
    }

    fn full_refresh(&mut self, surface_id: i32) -> io::Result<()> {
        let (fail, panic) = {
            let mut inner = self.log.0.lock();
            inner.calls.push(PrimitiveCall::FullRefresh(surface_id));
            (inner.fail_full_refresh, inner.panic_on_full_refresh)
        };
        self.log.pause();
        if panic {
            panic!("redraw blew up");
        }
        if fail {
            return Err(io::Error::other("перерисовка отклонена"));
        }
        Ok(())
    }
}

/// Записывает все побочные эффекты; запуск перечисленных компонентов падает.
#[derive(Default)]
pub struct RecordingSink {
    effects: Mutex<Vec<SideEffect>>,
    failing_components: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn effects(&self) -> Vec<SideEffect> {
        self.effects.lock().clone()
    }

    pub fn count(&self, effect: &SideEffect) -> usize {
        self.effects.lock().iter().filter(|e| *e == effect).count()
    }

    pub fn fail_launch_of(&self, component: &str) {
        self.failing_components.lock().insert(component.to_string());
    }
}

impl SideEffectSink for RecordingSink {
    fn emit(&self, effect: &SideEffect) -> Result<()> {
        self.effects.lock().push(effect.clone());
        if let Some(component) = effect.component() {
            if self.failing_components.lock().contains(component) {
                return Err(PaperError::ServiceUnavailable(format!(
                    "не удалось запустить {}",
                    component
                )));
            }
        }
        Ok(())
    }
}

/// Передний план, который тест выставляет напрямую.
pub struct FixedForeground(parking_lot::RwLock<Arc<ForegroundContext>>);

impl FixedForeground {
    pub fn new(context: ForegroundContext) -> Self {
        Self(parking_lot::RwLock::new(Arc::new(context)))
    }

    pub fn set(&self, context: ForegroundContext) {
        self.update(context);
    }
}

impl ForegroundFeed for FixedForeground {
    fn current(&self) -> Arc<ForegroundContext> {
        self.0.read().clone()
    }

    fn update(&self, context: ForegroundContext) -> bool {
        *self.0.write() = Arc::new(context);
        true
    }
}
