//! The live page port.
//!
//! Everything the engine does to the portal goes through [`Page`]. The trait
//! is deliberately low level and non-waiting: `query` answers "what matches
//! right now", and all waiting, fallback and healing logic lives above it in
//! the resolver.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::AutomationError;
use crate::selector::Selector;

/// Opaque reference to an element on the live page.
///
/// Handles can go stale when the page re-renders; page implementations
/// report that as [`AutomationError::TransientUi`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub id: String,
}

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// The common trait that every browser backend must implement
#[async_trait::async_trait]
pub trait Page: Send + Sync {
    /// Navigate to `url` and wait for the load event, up to `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), AutomationError>;

    async fn current_url(&self) -> Result<String, AutomationError>;

    /// Visible text of the whole document, used for heuristics.
    async fn page_text(&self) -> Result<String, AutomationError>;

    /// Elements currently matching `selector`, in document order. Never waits.
    async fn query(
        &self,
        selector: &Selector,
        visible_only: bool,
    ) -> Result<Vec<ElementHandle>, AutomationError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    /// Replace the value of an input with `text`.
    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<(), AutomationError>;

    /// Press a named key (e.g. "Enter", "Escape") on the focused element.
    async fn press(&self, key: &str) -> Result<(), AutomationError>;

    async fn text_of(&self, element: &ElementHandle) -> Result<String, AutomationError>;

    async fn is_checked(&self, element: &ElementHandle) -> Result<bool, AutomationError>;

    async fn bounding_box(
        &self,
        element: &ElementHandle,
    ) -> Result<Option<BoundingBox>, AutomationError>;

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), AutomationError>;

    async fn mouse_down(&self, x: f64, y: f64) -> Result<(), AutomationError>;

    async fn mouse_up(&self, x: f64, y: f64) -> Result<(), AutomationError>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, AutomationError>;
}
