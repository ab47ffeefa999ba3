//! Pharmacy inventory and the low-stock report returned on upload.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{InventoryItemId, wire};

fn default_unit() -> String {
    InventoryItem::DEFAULT_UNIT.to_owned()
}

/// A stocked medicine (`GET /admin/inventory/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub medicine_name: String,
    pub quantity: i32,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i32>,
    #[serde(
        default,
        deserialize_with = "wire::optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<NaiveDateTime>,
}

impl InventoryItem {
    /// Unit assumed when none is given.
    pub const DEFAULT_UNIT: &'static str = "units";
    /// Restock threshold the backend applies when none is set.
    pub const DEFAULT_THRESHOLD: i32 = 10;

    /// Whether stock is at or below its restock threshold.
    #[must_use]
    pub fn needs_restock(&self) -> bool {
        self.quantity <= self.threshold.unwrap_or(Self::DEFAULT_THRESHOLD)
    }

    /// Client-side listing filter: case-insensitive name substring and exact
    /// (case-insensitive) unit. `None` means "any".
    #[must_use]
    pub fn matches(&self, name: Option<&str>, unit: Option<&str>) -> bool {
        let name_ok = name.is_none_or(|n| {
            self.medicine_name
                .to_lowercase()
                .contains(&n.trim().to_lowercase())
        });
        let unit_ok = unit.is_none_or(|u| self.unit.eq_ignore_ascii_case(u.trim()));
        name_ok && unit_ok
    }
}

/// Body for `POST /admin/inventory/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub medicine_name: String,
    pub quantity: i32,
    pub unit: String,
    pub threshold: i32,
}

impl NewInventoryItem {
    #[must_use]
    pub fn new(medicine_name: impl Into<String>, quantity: i32) -> Self {
        Self {
            medicine_name: medicine_name.into(),
            quantity,
            unit: default_unit(),
            threshold: InventoryItem::DEFAULT_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: i32) -> Self {
        self.threshold = threshold;
        self
    }
}

/// One medicine the pharmacy cannot fully supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub medicine_name: String,
    pub requested: i32,
    pub available: i32,
}

impl LowStockItem {
    /// Units missing to fill the request.
    #[must_use]
    pub const fn shortfall(&self) -> i32 {
        self.requested.saturating_sub(self.available)
    }
}

/// The `detail` of a 422 upload response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LowStockReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub low_stock: Vec<LowStockItem>,
}

impl LowStockReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.low_stock.is_empty()
    }
}

impl std::fmt::Display for LowStockReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message.as_deref().unwrap_or("low stock"))?;
        for item in &self.low_stock {
            write!(
                f,
                "; {} (requested {}, available {})",
                item.medicine_name, item.requested, item.available
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: i32, unit: &str) -> InventoryItem {
        InventoryItem {
            id: InventoryItemId::new(1),
            medicine_name: name.to_owned(),
            quantity,
            unit: unit.to_owned(),
            threshold: None,
            last_updated: None,
        }
    }

    #[test]
    fn test_unit_defaults_when_missing() {
        let json = r#"{"id": 4, "medicine_name": "Amoxicillin", "quantity": 30}"#;
        let parsed: InventoryItem = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.unit, "units");
    }

    #[test]
    fn test_matches_filters_by_name_and_unit() {
        let syrup = item("Cough Syrup", 5, "ml");
        assert!(syrup.matches(Some("syrup"), None));
        assert!(syrup.matches(None, Some("ML")));
        assert!(!syrup.matches(Some("syrup"), Some("tablets")));
        assert!(syrup.matches(None, None));
    }

    #[test]
    fn test_needs_restock_uses_default_threshold() {
        assert!(item("Ibuprofen", 10, "units").needs_restock());
        assert!(!item("Ibuprofen", 11, "units").needs_restock());
    }

    #[test]
    fn test_low_stock_report_display_lists_items() {
        let report = LowStockReport {
            message: Some("Insufficient stock".to_owned()),
            low_stock: vec![LowStockItem {
                medicine_name: "Insulin".to_owned(),
                requested: 4,
                available: 1,
            }],
        };
        assert_eq!(report.low_stock.first().map(LowStockItem::shortfall), Some(3));
        assert_eq!(
            report.to_string(),
            "Insufficient stock; Insulin (requested 4, available 1)"
        );
    }

    #[test]
    fn test_new_item_defaults() {
        let new = NewInventoryItem::new("Cetirizine", 50).with_unit("tablets");
        assert_eq!(new.threshold, 10);
        assert_eq!(new.unit, "tablets");
    }
}
