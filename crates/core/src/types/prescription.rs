//! Prescription records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{AccountId, FulfillmentStatus, PrescriptionId, UserId, wire};

/// An uploaded prescription as seen by doctors and patients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<AccountId>,
    pub doctor_name: String,
    pub patient_user_id: UserId,
    pub patient_name: String,
    /// Server-side storage path of the uploaded PDF.
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default)]
    pub status: FulfillmentStatus,
    #[serde(deserialize_with = "wire::timestamp")]
    pub created_at: NaiveDateTime,
}

impl Prescription {
    /// File name the backend stored the upload under, without its directory.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.file_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.file_path)
    }

    /// Case-insensitive match against the patient name, as the doctor search does.
    #[must_use]
    pub fn patient_name_contains(&self, needle: &str) -> bool {
        self.patient_name
            .to_lowercase()
            .contains(&needle.trim().to_lowercase())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const UPLOADED: &str = r#"{
        "id": "0f7c2d4e-5b1a-4c3e-9d8f-112233445566",
        "doctor_name": "Dr. Mehta",
        "patient_name": "Asha",
        "patient_user_id": 123,
        "file_path": "uploads/0f7c_rx.pdf",
        "created_at": "2025-04-02T09:15:00.123456"
    }"#;

    #[test]
    fn test_missing_status_defaults_to_pending() {
        let rx: Prescription = serde_json::from_str(UPLOADED).unwrap();
        assert_eq!(rx.status, FulfillmentStatus::Pending);
        assert!(rx.remarks.is_none());
        assert_eq!(rx.patient_user_id, UserId::new(123));
    }

    #[test]
    fn test_file_name_strips_directory() {
        let rx: Prescription = serde_json::from_str(UPLOADED).unwrap();
        assert_eq!(rx.file_name(), "0f7c_rx.pdf");
    }

    #[test]
    fn test_patient_name_contains_ignores_case() {
        let rx: Prescription = serde_json::from_str(UPLOADED).unwrap();
        assert!(rx.patient_name_contains(" ash "));
        assert!(!rx.patient_name_contains("ravi"));
    }
}
