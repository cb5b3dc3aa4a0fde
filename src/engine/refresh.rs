use crate::error::RefreshError;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, error, info, warn};

/// Режим обновления дисплея, в котором возможна полная перерисовка панели
pub const REFRESH_MODE: i32 = 2;
/// Значение, возвращающее панель в обычный режим обновления
pub const NEUTRAL_MODE: i32 = -1;

/// Примитив перерисовки конкретной платформы.
pub trait RefreshPrimitive: Send {
    fn set_mode(&mut self, value: i32) -> io::Result<()>;

    fn full_refresh(&mut self, surface_id: i32) -> io::Result<()>;
}

/// Возвращает обычный режим, если уничтожен взведённым, в том числе при панике.
struct ModeGuard<'a> {
    primitive: &'a mut dyn RefreshPrimitive,
    armed: bool,
}

impl ModeGuard<'_> {
    fn restore(&mut self) -> Result<(), RefreshError> {
        self.armed = false;
        self.primitive
            .set_mode(NEUTRAL_MODE)
            .map_err(|e| RefreshError::ModeRestoreFailed(e.to_string()))
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            if let Err(e) = self.primitive.set_mode(NEUTRAL_MODE) {
                error!("Не удалось вернуть режим дисплея при раскрутке стека: {}", e);
            }
        }
    }
}

/// Полное обновление в три шага: включить режим, перерисовать, вернуть режим.
///
/// Примитив находится один раз при старте. Прогоны идут строго по одному:
/// поток клавиш, поток касаний и обработчик сигнала делят один экземпляр.
pub struct RefreshProtocol {
    primitive: Option<Mutex<Box<dyn RefreshPrimitive>>>,
    // 0 - поверхность ещё не известна
    surface_id: AtomicU32,
    unsupported_logged: AtomicBool,
}

impl RefreshProtocol {
    pub fn new(primitive: Option<Box<dyn RefreshPrimitive>>) -> Self {
        Self {
            primitive: primitive.map(Mutex::new),
            surface_id: AtomicU32::new(0),
            unsupported_logged: AtomicBool::new(false),
        }
    }

    pub fn unsupported() -> Self {
        Self::new(None)
    }

    pub fn is_supported(&self) -> bool {
        self.primitive.is_some()
    }

    pub fn set_surface(&self, surface_id: u32) {
        self.surface_id.store(surface_id, Ordering::Release);
    }

    pub fn surface(&self) -> Option<u32> {
        match self.surface_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn refresh_current(&self) -> Result<(), RefreshError> {
        if self.primitive.is_none() {
            return Err(RefreshError::Unsupported);
        }
        let surface = self.surface().ok_or(RefreshError::NoSurface)?;
        self.refresh(surface)
    }

    pub fn refresh(&self, surface_id: u32) -> Result<(), RefreshError> {
        let Some(primitive) = &self.primitive else {
            return Err(RefreshError::Unsupported);
        };
        let surface = i32::try_from(surface_id).map_err(|_| RefreshError::NoSurface)?;

        let mut primitive = primitive.lock();
        primitive
            .set_mode(REFRESH_MODE)
            .map_err(|e| RefreshError::ModeSwitchFailed(e.to_string()))?;

        let mut guard = ModeGuard {
            primitive: &mut **primitive,
            armed: true,
        };
        let redraw = guard
            .primitive
            .full_refresh(surface)
            .map_err(|e| RefreshError::RedrawFailed(e.to_string()));
        let restore = guard.restore();

        match (redraw, restore) {
            (Err(e), Err(restore_err)) => {
                error!("После неудачной перерисовки режим дисплея не восстановлен: {}", restore_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), restore) => restore,
        }
    }

    /// Обновляет текущую поверхность и пишет итог в лог. Об отсутствии примитива
    /// сообщаем один раз за сессию. Возвращает, была ли перерисовка.
    pub fn trigger(&self, reason: &str) -> bool {
        match self.refresh_current() {
            Ok(()) => {
                info!("Полное обновление ({})", reason);
                true
            }
            Err(RefreshError::Unsupported) => {
                if !self.unsupported_logged.swap(true, Ordering::AcqRel) {
                    warn!("Запрошено полное обновление ({}), но примитив обновления недоступен", reason);
                } else {
                    debug!("Обновление пропущено ({}): не поддерживается", reason);
                }
                false
            }
            Err(RefreshError::NoSurface) => {
                warn!("Обновление пропущено ({}): поверхность неизвестна", reason);
                false
            }
            Err(e) => {
                error!("Полное обновление не удалось ({}): {}", reason, e);
                false
            }
        }
    }
}
