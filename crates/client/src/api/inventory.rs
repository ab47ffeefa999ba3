//! `/admin/inventory` endpoints.

use mediplus_core::{InventoryItem, InventoryItemId, NewInventoryItem};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::instrument;

use super::pharmacy::Ack;
use super::{ApiClient, ApiError};

#[derive(Serialize)]
struct QuantityUpdate {
    quantity: i32,
}

/// Inventory endpoints (admin only).
#[derive(Debug, Clone, Copy)]
pub struct InventoryApi<'a> {
    client: &'a ApiClient,
}

impl<'a> InventoryApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<InventoryItem>, ApiError> {
        self.client.get("/admin/inventory/", &[]).await
    }

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self), fields(medicine = %item.medicine_name))]
    pub async fn add(&self, item: &NewInventoryItem) -> Result<InventoryItem, ApiError> {
        self.client.post("/admin/inventory/add", item).await
    }

    /// Set the stocked quantity.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown item.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        id: InventoryItemId,
        quantity: i32,
    ) -> Result<InventoryItem, ApiError> {
        let path = ApiClient::id_path("/admin/inventory/update", &id)?;
        self.client.put(&path, &QuantityUpdate { quantity }).await
    }

    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown item.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: InventoryItemId) -> Result<Option<String>, ApiError> {
        let path = ApiClient::id_path("/admin/inventory/delete", &id)?;
        let ack: Ack = self.client.delete(&path).await?;
        Ok(ack.message)
    }

    /// Bulk import from CSV (`medicine_name,quantity,unit`). Existing
    /// medicines have the quantity added to their stock.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self, csv), fields(bytes = csv.len()))]
    pub async fn upload_csv(
        &self,
        file_name: &str,
        csv: Vec<u8>,
    ) -> Result<Option<String>, ApiError> {
        let part = Part::bytes(csv)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let ack: Ack = self
            .client
            .post_multipart("/admin/inventory/upload-csv", Form::new().part("file", part))
            .await?;
        Ok(ack.message)
    }
}
