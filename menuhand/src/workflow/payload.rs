//! Job payloads and their validation.
//!
//! Payloads are checked before any UI work starts. A malformed payload is a
//! hard abort (`Validation`), never a per-item failure.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::errors::AutomationError;
use crate::routing::compile_patterns;

fn default_true() -> bool {
    true
}

fn default_printer_port() -> u16 {
    9100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpec {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierAssignment {
    pub item: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuDeployPayload {
    #[serde(default)]
    pub categories: Vec<CategorySpec>,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
    #[serde(default)]
    pub modifier_groups_by_item: Vec<ModifierAssignment>,
    #[serde(default = "default_true")]
    pub skip_if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub station_type: Option<String>,
    #[serde(default)]
    pub is_expo: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub item_patterns: Vec<String>,
}

impl StationSpec {
    /// Explicit routing entries: categories first, then items.
    pub fn routing_entries(&self) -> impl Iterator<Item = &String> {
        self.categories.iter().chain(self.items.iter())
    }

    pub fn has_routing(&self) -> bool {
        !self.categories.is_empty() || !self.items.is_empty() || !self.item_patterns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdsConfigPayload {
    #[serde(default)]
    pub stations: Vec<StationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub clear_existing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_settings: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default = "default_true")]
    pub skip_if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterSpec {
    pub name: String,
    pub address: String,
    #[serde(default = "default_printer_port")]
    pub port: u16,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub printer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub station_assignment: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterSetupPayload {
    #[serde(default)]
    pub printers: Vec<PrinterSpec>,
    #[serde(default)]
    pub clear_existing: bool,
    #[serde(default)]
    pub test_after_setup: bool,
    /// Named routing switches on the printers page, e.g.
    /// `{"Print expo tickets": true}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_config: Option<BTreeMap<String, bool>>,
    #[serde(default = "default_true")]
    pub skip_if_exists: bool,
}

/// Text form of a display setting value as typed into the portal.
pub fn setting_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn invalid(message: String) -> AutomationError {
    AutomationError::Validation(message)
}

fn check_names<'a>(
    kind: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashSet<String>, AutomationError> {
    let mut seen = HashSet::new();
    for name in names {
        let key = name.trim();
        if key.is_empty() {
            return Err(invalid(format!("A {kind} has an empty name")));
        }
        if !seen.insert(key.to_lowercase()) {
            return Err(invalid(format!("Duplicate {kind} name '{key}'")));
        }
    }
    Ok(seen)
}

impl MenuDeployPayload {
    /// Shape checks only. Categories and items may already exist in the
    /// portal, so references outside this payload are left to the per-entity
    /// lookups at run time.
    pub fn validate(&self) -> Result<(), AutomationError> {
        check_names("category", self.categories.iter().map(|c| c.name.as_str()))?;
        check_names("item", self.items.iter().map(|i| i.name.as_str()))?;

        for item in &self.items {
            if let Some(price) = item.price {
                if !price.is_finite() || price < 0.0 {
                    return Err(invalid(format!("Item '{}' has invalid price {}", item.name, price)));
                }
            }
        }
        for assignment in &self.modifier_groups_by_item {
            if assignment.item.trim().is_empty() {
                return Err(invalid("Modifier groups assigned to an item with an empty name".to_string()));
            }
            check_names("modifier group", assignment.groups.iter().map(String::as_str))?;
        }
        Ok(())
    }

    pub fn modifier_count(&self) -> usize {
        self.modifier_groups_by_item.iter().map(|a| a.groups.len()).sum()
    }
}

impl KdsConfigPayload {
    pub fn validate(&self) -> Result<(), AutomationError> {
        check_names("station", self.stations.iter().map(|s| s.name.as_str()))?;
        for station in &self.stations {
            compile_patterns(&station.item_patterns)?;
            if station.routing_entries().any(|e| e.trim().is_empty()) {
                return Err(invalid(format!(
                    "Station '{}' has an empty routing entry",
                    station.name
                )));
            }
        }
        if let Some(settings) = &self.display_settings {
            if settings.keys().any(|k| k.trim().is_empty()) {
                return Err(invalid("Display setting with an empty name".into()));
            }
        }
        Ok(())
    }
}

impl PrinterSetupPayload {
    pub fn validate(&self) -> Result<(), AutomationError> {
        check_names("printer", self.printers.iter().map(|p| p.name.as_str()))?;
        for printer in &self.printers {
            if printer.address.trim().is_empty() {
                return Err(invalid(format!("Printer '{}' has no address", printer.name)));
            }
            if printer.port == 0 {
                return Err(invalid(format!("Printer '{}' has port 0", printer.name)));
            }
        }
        Ok(())
    }
}
