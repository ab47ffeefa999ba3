//! Pharmacy queue and order payloads.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{FulfillmentStatus, PharmacyOrderId, PrescriptionId, QueueId, UserId, wire};

/// A medicine line on a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    /// Packing class reported by the backend (`edge` for syrups, injections
    /// and the like, otherwise `regular`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// One row of the pharmacist's work queue (`GET /pharmacy/list`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub queue_id: QueueId,
    pub prescription_id: PrescriptionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_user_id: Option<UserId>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    /// Estimated seconds until the order is ready.
    #[serde(deserialize_with = "wire::seconds")]
    pub est_time: u64,
    #[serde(default)]
    pub status: FulfillmentStatus,
    #[serde(
        default,
        alias = "timestamp",
        deserialize_with = "wire::optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<NaiveDateTime>,
}

/// A pharmacy order record (`GET /pharmacy/orders`, `GET /pharmacy/pending`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacyOrder {
    pub id: PharmacyOrderId,
    pub prescription_id: PrescriptionId,
    pub patient_user_id: UserId,
    /// Present on the pending listing only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_code: Option<String>,
    pub status: FulfillmentStatus,
    #[serde(deserialize_with = "wire::timestamp")]
    pub created_at: NaiveDateTime,
}

/// Response to a patient sending a prescription to the pharmacy.
///
/// The OTP is displayed once and never persisted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupTicket {
    pub message: String,
    pub otp_code: String,
    /// Estimated seconds until pickup, when the backend supplies one.
    #[serde(
        default,
        deserialize_with = "wire::optional_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub est_time: Option<u64>,
}
