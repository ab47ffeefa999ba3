//! `/pharmacy` endpoints.

use mediplus_core::{Otp, PharmacyOrder, PickupTicket, PrescriptionId, QueueEntry};
use serde::Deserialize;
use tracing::instrument;

use super::{ApiClient, ApiError};

/// `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Ack {
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
}

/// Pharmacy endpoints.
#[derive(Debug, Clone, Copy)]
pub struct PharmacyApi<'a> {
    client: &'a ApiClient,
}

impl<'a> PharmacyApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Patient sends a prescription to the pharmacy and receives a pickup OTP.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the prescription is not the caller's.
    #[instrument(skip(self), fields(prescription_id = %id))]
    pub async fn send(&self, id: &PrescriptionId) -> Result<PickupTicket, ApiError> {
        let path = ApiClient::id_path("/pharmacy/send", id)?;
        self.client.post_query(&path, &[]).await
    }

    /// Move a pending order to preparing. Returns the backend's message.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self), fields(prescription_id = %id))]
    pub async fn mark_preparing(&self, id: &PrescriptionId) -> Result<Option<String>, ApiError> {
        let path = ApiClient::id_path("/pharmacy/mark-preparing", id)?;
        let ack: Ack = self.client.post_query(&path, &[]).await?;
        Ok(ack.message)
    }

    /// Confirm pickup with the patient's OTP. Returns the backend's message.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for a wrong code or unknown prescription.
    #[instrument(skip(self, otp), fields(prescription_id = %id))]
    pub async fn confirm_pickup(
        &self,
        id: &PrescriptionId,
        otp: &Otp,
    ) -> Result<Option<String>, ApiError> {
        let path = ApiClient::id_path("/pharmacy/confirm-pickup", id)?;
        let ack: Ack = self
            .client
            .post_query(&path, &[("otp_code", otp.as_str())])
            .await?;
        Ok(ack.message)
    }

    /// The pharmacist work queue.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn queue(&self) -> Result<Vec<QueueEntry>, ApiError> {
        self.client.get("/pharmacy/list", &[]).await
    }

    /// All pharmacy orders.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<PharmacyOrder>, ApiError> {
        self.client.get("/pharmacy/orders", &[]).await
    }

    /// Orders still pending, with their OTPs.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn pending(&self) -> Result<Vec<PharmacyOrder>, ApiError> {
        self.client.get_list("/pharmacy/pending", &[]).await
    }
}
