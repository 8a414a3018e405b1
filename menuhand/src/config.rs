use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Placeholder for the restaurant identifier in URL templates.
pub const RESTAURANT_PLACEHOLDER: &str = "{restaurant}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Portal endpoints, timeouts and browser settings.
///
/// Loaded by the embedding process; the engine takes it as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    pub login_url: String,
    pub restaurant_url_template: String,
    pub menu_url_template: String,
    pub kds_url_template: String,
    pub printers_url_template: String,
    pub default_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub readiness_timeout_ms: u64,
    pub two_factor_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Pause between consecutive entity operations.
    pub action_delay_ms: u64,
    pub viewport: Viewport,
    pub headless: bool,
    pub debug_port: u16,
    pub screenshot_dir: Option<String>,
    /// Target name -> ordered locator strings, replacing the defaults.
    pub locator_overrides: HashMap<String, Vec<String>>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.toasttab.com".to_string(),
            login_url: "https://www.toasttab.com/login".to_string(),
            restaurant_url_template:
                "https://www.toasttab.com/restaurants/admin/home?restaurantGuid={restaurant}"
                    .to_string(),
            menu_url_template:
                "https://www.toasttab.com/restaurants/admin/menus?restaurantGuid={restaurant}"
                    .to_string(),
            kds_url_template:
                "https://www.toasttab.com/restaurants/admin/kitchen/prep-stations?restaurantGuid={restaurant}"
                    .to_string(),
            printers_url_template:
                "https://www.toasttab.com/restaurants/admin/devices/printers?restaurantGuid={restaurant}"
                    .to_string(),
            default_timeout_ms: 10_000,
            navigation_timeout_ms: 30_000,
            readiness_timeout_ms: 8_000,
            two_factor_timeout_ms: 300_000,
            poll_interval_ms: 100,
            action_delay_ms: 250,
            viewport: Viewport::default(),
            headless: true,
            debug_port: 9222,
            screenshot_dir: None,
            locator_overrides: HashMap::new(),
        }
    }
}

impl PortalConfig {
    pub fn restaurant_url(&self, restaurant: &str) -> String {
        self.restaurant_url_template
            .replace(RESTAURANT_PLACEHOLDER, restaurant)
    }

    pub fn menu_url(&self, restaurant: &str) -> String {
        self.menu_url_template.replace(RESTAURANT_PLACEHOLDER, restaurant)
    }

    pub fn kds_url(&self, restaurant: &str) -> String {
        self.kds_url_template.replace(RESTAURANT_PLACEHOLDER, restaurant)
    }

    pub fn printers_url(&self, restaurant: &str) -> String {
        self.printers_url_template
            .replace(RESTAURANT_PLACEHOLDER, restaurant)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn two_factor_timeout(&self) -> Duration {
        Duration::from_millis(self.two_factor_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }
}
