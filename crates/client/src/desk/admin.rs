//! Admin workspace: inventory management and the dashboard.

use chrono::NaiveDateTime;
use mediplus_core::{
    DoctorVolume, ExpiredPrescription, HighVolumeAlert, InventoryAnalytics, InventoryItem,
    InventoryItemId, NewInventoryItem, OutOfStockEvent, PeakDay, QueueStats, Role,
};
use tracing::{info, instrument};

use super::{DeskError, require_role, required};
use crate::session::SessionContext;

/// Client-side inventory listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryFilter {
    /// Case-insensitive substring of the medicine name.
    pub name: Option<String>,
    /// Unit, compared case-insensitively.
    pub unit: Option<String>,
}

impl InventoryFilter {
    #[must_use]
    pub fn admits(&self, item: &InventoryItem) -> bool {
        item.matches(non_blank(self.name.as_deref()), non_blank(self.unit.as_deref()))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Every alert feed at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alerts {
    pub out_of_stock: Vec<OutOfStockEvent>,
    pub expired: Vec<ExpiredPrescription>,
    pub high_volume: HighVolumeAlert,
}

/// Every analytics series at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsSnapshot {
    pub inventory: Vec<InventoryAnalytics>,
    pub by_doctor: Vec<DoctorVolume>,
    pub peak_days: Vec<PeakDay>,
}

/// Admin view-model.
#[derive(Debug, Clone)]
pub struct AdminDesk {
    session: SessionContext,
}

impl AdminDesk {
    #[must_use]
    pub const fn new(session: SessionContext) -> Self {
        Self { session }
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self))]
    pub async fn inventory(&self, filter: &InventoryFilter) -> Result<Vec<InventoryItem>, DeskError> {
        require_role(&self.session, Role::Admin).await?;
        let items = self.session.api().inventory().list().await?;
        Ok(items.into_iter().filter(|i| filter.admits(i)).collect())
    }

    /// # Errors
    ///
    /// Returns `DeskError::MissingField` for a blank name and
    /// `DeskError::InvalidField` for a negative quantity or threshold.
    #[instrument(skip(self, item), fields(medicine = %item.medicine_name))]
    pub async fn add_item(&self, item: NewInventoryItem) -> Result<InventoryItem, DeskError> {
        let medicine_name = required(&item.medicine_name, "medicine_name")?.to_string();
        let unit = required(&item.unit, "unit")?.to_string();
        non_negative(item.quantity, "quantity")?;
        non_negative(item.threshold, "threshold")?;
        require_role(&self.session, Role::Admin).await?;

        let item = NewInventoryItem {
            medicine_name,
            unit,
            ..item
        };
        let created = self.session.api().inventory().add(&item).await?;
        info!(item_id = %created.id, "inventory item added");
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `DeskError::InvalidField` for a negative quantity.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        id: InventoryItemId,
        quantity: i32,
    ) -> Result<InventoryItem, DeskError> {
        non_negative(quantity, "quantity")?;
        require_role(&self.session, Role::Admin).await?;
        Ok(self
            .session
            .api()
            .inventory()
            .update_quantity(id, quantity)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: InventoryItemId) -> Result<Option<String>, DeskError> {
        require_role(&self.session, Role::Admin).await?;
        Ok(self.session.api().inventory().delete(id).await?)
    }

    /// Bulk import a CSV file.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::InvalidField` for an empty file.
    #[instrument(skip(self, csv))]
    pub async fn import_csv(
        &self,
        file_name: &str,
        csv: Vec<u8>,
    ) -> Result<Option<String>, DeskError> {
        if csv.iter().all(u8::is_ascii_whitespace) {
            return Err(DeskError::InvalidField {
                field: "file",
                reason: "file is empty".to_string(),
            });
        }
        require_role(&self.session, Role::Admin).await?;
        Ok(self
            .session
            .api()
            .inventory()
            .upload_csv(file_name, csv)
            .await?)
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// # Errors
    ///
    /// Returns `DeskError::InvalidField` if `start` is after `end`.
    #[instrument(skip(self))]
    pub async fn queue_stats(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<QueueStats, DeskError> {
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            return Err(DeskError::InvalidField {
                field: "start",
                reason: "start is after end".to_string(),
            });
        }
        require_role(&self.session, Role::Admin).await?;
        Ok(self.session.api().analytics().queue_stats(start, end).await?)
    }

    /// # Errors
    ///
    /// Returns the first failure among the alert feeds.
    #[instrument(skip(self))]
    pub async fn alerts(&self) -> Result<Alerts, DeskError> {
        require_role(&self.session, Role::Admin).await?;
        let analytics = self.session.api().analytics();
        let (out_of_stock, expired, high_volume) = tokio::try_join!(
            analytics.out_of_stock(),
            analytics.expired_prescriptions(),
            analytics.high_volume(),
        )?;
        Ok(Alerts {
            out_of_stock,
            expired,
            high_volume,
        })
    }

    /// # Errors
    ///
    /// Returns the first failure among the analytics series.
    #[instrument(skip(self))]
    pub async fn analytics(&self) -> Result<AnalyticsSnapshot, DeskError> {
        require_role(&self.session, Role::Admin).await?;
        let analytics = self.session.api().analytics();
        let (inventory, by_doctor, peak_days) = tokio::try_join!(
            analytics.inventory(),
            analytics.prescriptions_by_doctor(),
            analytics.peak_day(),
        )?;
        Ok(AnalyticsSnapshot {
            inventory,
            by_doctor,
            peak_days,
        })
    }
}

fn non_negative(value: i32, field: &'static str) -> Result<(), DeskError> {
    if value < 0 {
        return Err(DeskError::InvalidField {
            field,
            reason: format!("must not be negative (got {value})"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::signed_in;

    fn item(name: &str, unit: &str) -> InventoryItem {
        InventoryItem {
            id: InventoryItemId::new(1),
            medicine_name: name.to_string(),
            quantity: 5,
            unit: unit.to_string(),
            threshold: None,
            last_updated: None,
        }
    }

    #[test]
    fn test_filter_by_name_and_unit() {
        let filter = InventoryFilter {
            name: Some("cetam".to_string()),
            unit: Some("Tablets".to_string()),
        };
        assert!(filter.admits(&item("Paracetamol", "tablets")));
        assert!(!filter.admits(&item("Paracetamol", "ml")));
        assert!(!filter.admits(&item("Insulin", "tablets")));
    }

    #[test]
    fn test_blank_filter_admits_everything() {
        let filter = InventoryFilter {
            name: Some("  ".to_string()),
            unit: None,
        };
        assert!(filter.admits(&item("Insulin", "ml")));
        assert!(InventoryFilter::default().admits(&item("Insulin", "ml")));
    }

    #[tokio::test]
    async fn test_add_item_validates_before_request() {
        let desk = AdminDesk::new(signed_in(Role::Admin).await);
        assert!(matches!(
            desk.add_item(NewInventoryItem::new(" ", 3)).await,
            Err(DeskError::MissingField("medicine_name"))
        ));
        assert!(matches!(
            desk.add_item(NewInventoryItem::new("Insulin", -1)).await,
            Err(DeskError::InvalidField {
                field: "quantity",
                ..
            })
        ));
        assert!(matches!(
            desk.update_quantity(InventoryItemId::new(1), -5).await,
            Err(DeskError::InvalidField {
                field: "quantity",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_csv_rejected() {
        let desk = AdminDesk::new(signed_in(Role::Admin).await);
        assert!(matches!(
            desk.import_csv("stock.csv", b"\n \n".to_vec()).await,
            Err(DeskError::InvalidField { field: "file", .. })
        ));
    }

    #[tokio::test]
    async fn test_inverted_window_rejected() {
        let desk = AdminDesk::new(signed_in(Role::Admin).await);
        let day = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).and_then(|d| d.and_hms_opt(9, 0, 0));
        let later = day.map(|d| d + chrono::Duration::hours(2));
        assert!(matches!(
            desk.queue_stats(later, day).await,
            Err(DeskError::InvalidField { field: "start", .. })
        ));
    }

    #[tokio::test]
    async fn test_dashboard_requires_admin() {
        let desk = AdminDesk::new(signed_in(Role::Pharmacist).await);
        assert!(matches!(desk.alerts().await, Err(DeskError::WrongRole { .. })));
        assert!(matches!(
            desk.analytics().await,
            Err(DeskError::WrongRole { .. })
        ));
    }
}
