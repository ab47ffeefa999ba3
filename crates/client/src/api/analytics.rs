//! Admin dashboard endpoints: analytics, queue statistics and alerts.

use chrono::NaiveDateTime;
use mediplus_core::{
    DoctorVolume, ExpiredPrescription, HighVolumeAlert, InventoryAnalytics, OutOfStockEvent,
    PeakDay, QueueStats,
};
use tracing::instrument;

use super::{ApiClient, ApiError};

const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Analytics and alert endpoints (admin only).
#[derive(Debug, Clone, Copy)]
pub struct AnalyticsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AnalyticsApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn inventory(&self) -> Result<Vec<InventoryAnalytics>, ApiError> {
        self.client.get("/analytics/inventory", &[]).await
    }

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn prescriptions_by_doctor(&self) -> Result<Vec<DoctorVolume>, ApiError> {
        self.client.get("/analytics/prescriptions-by-doctor", &[]).await
    }

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn peak_day(&self) -> Result<Vec<PeakDay>, ApiError> {
        self.client.get("/analytics/peak-day", &[]).await
    }

    /// Queue statistics over a window. The backend defaults to "today so far"
    /// for whichever bound is omitted.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn queue_stats(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<QueueStats, ApiError> {
        let start = start.map(|t| t.format(QUERY_TIME_FORMAT).to_string());
        let end = end.map(|t| t.format(QUERY_TIME_FORMAT).to_string());
        let mut query = Vec::with_capacity(2);
        if let Some(start) = start.as_deref() {
            query.push(("start_date", start));
        }
        if let Some(end) = end.as_deref() {
            query.push(("end_date", end));
        }
        self.client.get("/dashboard/queue_stats", &query).await
    }

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn out_of_stock(&self) -> Result<Vec<OutOfStockEvent>, ApiError> {
        self.client.get("/alerts/out-of-stock", &[]).await
    }

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn expired_prescriptions(&self) -> Result<Vec<ExpiredPrescription>, ApiError> {
        self.client.get("/alerts/expired-prescriptions", &[]).await
    }

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn high_volume(&self) -> Result<HighVolumeAlert, ApiError> {
        self.client.get("/alerts/high-volume", &[]).await
    }
}
