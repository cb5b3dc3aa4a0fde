//! Имена общих настроек, которые читает движок.

pub const AUTO_REFRESH_ENABLED: &str = "rp_auto_refresh_enabled";
pub const MANUAL_REFRESH_ENABLED: &str = "rp_manual_refresh_enabled";
pub const PAGES_PER_REFRESH: &str = "rp_pages_per_refresh";
pub const TOUCH_REFRESH_ENABLED: &str = "rp_touch_refresh_enabled";
pub const F1_PAGE_CHORD_ENABLED: &str = "rp_f1_page_screenshot_chord_enabled";
pub const POWER_PAGE_CHORD_ENABLED: &str = "rp_power_page_screenshot_chord_enabled";
pub const HOME_LAUNCHER_COMPONENT: &str = "rp_home_launcher_component";
pub const F1_ACTION: &str = "rp_f1_action";
pub const SECURE_BYPASS_ENABLED: &str = "rp_secure_bypass_enabled";

/// Все ключи, которые принимают `set`/`show`
pub const ALL: &[&str] = &[
    AUTO_REFRESH_ENABLED,
    MANUAL_REFRESH_ENABLED,
    PAGES_PER_REFRESH,
    TOUCH_REFRESH_ENABLED,
    F1_PAGE_CHORD_ENABLED,
    POWER_PAGE_CHORD_ENABLED,
    HOME_LAUNCHER_COMPONENT,
    F1_ACTION,
    SECURE_BYPASS_ENABLED,
];
