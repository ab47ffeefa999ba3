//! Admin dashboard payloads: analytics series, queue statistics and alerts.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{FulfillmentStatus, PrescriptionId, wire};

/// A row of `GET /analytics/inventory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAnalytics {
    pub id: i32,
    pub medicine_name: String,
    #[serde(default)]
    pub quantity_used: Option<i32>,
    #[serde(default)]
    pub quantity_remaining: Option<i32>,
    /// Free-text restock note, empty or absent when stock is fine.
    #[serde(default)]
    pub restock_alert: Option<String>,
    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub created_at: Option<NaiveDateTime>,
}

/// Uploads per doctor (`GET /analytics/prescriptions-by-doctor`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorVolume {
    pub doctor_name: String,
    pub total_uploaded: u64,
}

/// Prescriptions per weekday (`GET /analytics/peak-day`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakDay {
    pub day: String,
    pub count: u64,
}

/// Per-status order counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub preparing: u64,
    pub picked_up: u64,
}

impl StatusCounts {
    #[must_use]
    pub const fn get(&self, status: FulfillmentStatus) -> u64 {
        match status {
            FulfillmentStatus::Pending => self.pending,
            FulfillmentStatus::Preparing => self.preparing,
            FulfillmentStatus::PickedUp => self.picked_up,
        }
    }
}

/// `GET /dashboard/queue_stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    #[serde(deserialize_with = "wire::timestamp")]
    pub from: NaiveDateTime,
    #[serde(deserialize_with = "wire::timestamp")]
    pub to: NaiveDateTime,
    pub total_pharmacy_prescriptions: u64,
    pub status_counts: StatusCounts,
    pub current_queue_length: u64,
    /// Mean seconds from order to pickup over the window; 0 when none.
    pub avg_wait_time_sec: f64,
}

/// A medicine that was requested while out of stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStockEvent {
    pub medicine_name: String,
    pub prescription_id: PrescriptionId,
    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub timestamp: Option<NaiveDateTime>,
}

/// An order older than 48 hours that was never picked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredPrescription {
    pub prescription_id: PrescriptionId,
    pub status: FulfillmentStatus,
    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub created_at: Option<NaiveDateTime>,
}

/// `GET /alerts/high-volume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighVolumeAlert {
    pub prescriptions_last_5_min: u64,
    pub threshold_exceeded: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_stats_payload() {
        let json = r#"{
            "from": "2025-04-02T00:00:00",
            "to": "2025-04-02T13:45:10.552201",
            "total_pharmacy_prescriptions": 7,
            "status_counts": {"pending": 3, "preparing": 2, "picked_up": 2},
            "current_queue_length": 5,
            "avg_wait_time_sec": 412.5
        }"#;
        let stats: QueueStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.status_counts.get(FulfillmentStatus::Preparing), 2);
        assert_eq!(stats.current_queue_length, 5);
    }

    #[test]
    fn test_alert_rows_tolerate_blank_timestamps() {
        let json = r#"{"medicine_name": "Insulin", "prescription_id": "rx-9", "timestamp": ""}"#;
        let event: OutOfStockEvent = serde_json::from_str(json).unwrap();
        assert!(event.timestamp.is_none());

        let json = r#"{"prescription_id": "rx-2", "status": "preparing", "created_at": "2025-03-30T08:00:00"}"#;
        let expired: ExpiredPrescription = serde_json::from_str(json).unwrap();
        assert_eq!(expired.status, FulfillmentStatus::Preparing);
    }
}
