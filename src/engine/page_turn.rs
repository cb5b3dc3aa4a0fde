use crate::events::KeyCode;
use crate::mappings::key_names::BTN_TOUCH;
use smallvec::SmallVec;

pub type PageTurnKeys = SmallVec<[KeyCode; 8]>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTurnCounterState {
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    Fire,
    NoFire,
}

/// Считает перелистывания и решает, когда пора полное обновление.
#[derive(Debug, Clone)]
pub struct PageTurnCounter {
    keys: PageTurnKeys,
}

impl PageTurnCounter {
    pub fn new(keys: PageTurnKeys) -> Self {
        Self { keys }
    }

    /// Счётчик касаний сенсорного экрана вместо клавиш
    pub fn touch() -> Self {
        Self::new(SmallVec::from_slice(&[KeyCode(BTN_TOUCH)]))
    }

    pub fn keys(&self) -> &[KeyCode] {
        &self.keys
    }

    pub fn is_qualifying(&self, code: KeyCode) -> bool {
        self.keys.contains(&code)
    }

    pub fn on_qualifying_key(
        &self,
        state: &mut PageTurnCounterState,
        enabled: bool,
        blocked: bool,
        threshold: u32,
    ) -> FireDecision {
        if !enabled || blocked {
            state.count = 0;
            return FireDecision::NoFire;
        }

        state.count += 1;
        if state.count >= threshold.max(1) {
            state.count = 0;
            FireDecision::Fire
        } else {
            FireDecision::NoFire
        }
    }

    pub fn reset(&self, state: &mut PageTurnCounterState) {
        state.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn counter() -> PageTurnCounter {
        PageTurnCounter::new(SmallVec::from_slice(&[KeyCode(104), KeyCode(109)]))
    }

    #[test]
    fn test_threshold_five_fires_on_fifth() {
        let c = counter();
        let mut s = PageTurnCounterState::default();

        let decisions: Vec<_> = (0..5).map(|_| c.on_qualifying_key(&mut s, true, false, 5)).collect();
        assert_eq!(&decisions[..4], &[FireDecision::NoFire; 4]);
        assert_eq!(decisions[4], FireDecision::Fire);
        assert_eq!(s.count, 0);
    }

    #[test]
    fn test_blocked_and_disabled_reset() {
        let c = counter();
        let mut s = PageTurnCounterState::default();

        c.on_qualifying_key(&mut s, true, false, 5);
        c.on_qualifying_key(&mut s, true, false, 5);
        assert_eq!(c.on_qualifying_key(&mut s, true, true, 5), FireDecision::NoFire);
        assert_eq!(s.count, 0);

        c.on_qualifying_key(&mut s, true, false, 5);
        assert_eq!(c.on_qualifying_key(&mut s, false, false, 5), FireDecision::NoFire);
        assert_eq!(s.count, 0);
    }

    #[test]
    fn test_qualifying_keys() {
        let c = counter();
        assert!(c.is_qualifying(KeyCode(109)));
        assert!(!c.is_qualifying(KeyCode(59)));
        assert!(PageTurnCounter::touch().is_qualifying(KeyCode(BTN_TOUCH)));
    }

    proptest! {
        #[test]
        fn prop_fires_floor_n_over_t(n in 0u32..200, threshold in 1u32..20) {
            let c = counter();
            let mut s = PageTurnCounterState::default();

            let fires = (0..n)
                .filter(|_| c.on_qualifying_key(&mut s, true, false, threshold) == FireDecision::Fire)
                .count() as u32;

            prop_assert_eq!(fires, n / threshold);
            prop_assert_eq!(s.count, n % threshold);
        }
    }
}
