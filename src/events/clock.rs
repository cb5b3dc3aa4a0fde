use once_cell::sync::Lazy;
use std::time::Instant;

static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Миллисекунды монотонных часов с момента первого обращения.
///
/// Все временные метки событий берутся отсюда: перевод системного времени
/// (NTP после пробуждения, ручная установка) не сдвигает окна аккорда и дребезга.
pub fn monotonic_ms() -> u64 {
    ORIGIN.elapsed().as_millis() as u64
}
