//! Doctor upload, the low-stock branch, search and preview.

#![allow(clippy::unwrap_used)]

use mediplus_client::DeskError;
use mediplus_client::api::PrescriptionFile;
use mediplus_client::desk::{
    DoctorDesk, HoldResolution, PatientDesk, PrescriptionDraft, UploadOutcome,
};
use mediplus_core::{FulfillmentStatus, Role, UploadDecision, UserId};
use mediplus_integration_tests::{FakeBackend, PATIENT_USER_ID};

fn draft(file: &str, remarks: &str) -> PrescriptionDraft {
    PrescriptionDraft {
        patient_name: "Asha Rao".to_string(),
        patient_user_id: Some(UserId::new(PATIENT_USER_ID)),
        remarks: remarks.to_string(),
        file: Some(PrescriptionFile::new("rx.pdf", file.as_bytes().to_vec())),
    }
}

#[tokio::test]
async fn test_upload_creates_pending_prescription() {
    let backend = FakeBackend::start().await.unwrap();
    let desk = DoctorDesk::new(backend.signed_in(Role::Doctor).await.unwrap());

    let outcome = desk
        .upload(draft("%PDF-1.4\nParacetamol 2\n", "Fever"))
        .await
        .unwrap();

    let UploadOutcome::Created(prescription) = outcome else {
        panic!("expected a created prescription, got {outcome:?}");
    };
    assert_eq!(prescription.status, FulfillmentStatus::Pending);
    assert_eq!(prescription.remarks.as_deref(), Some("Fever"));
    assert_eq!(prescription.patient_user_id, UserId::new(PATIENT_USER_ID));
    assert_eq!(prescription.doctor_name, "Dr. Mehta");
    assert_eq!(backend.prescription_count().await, 1);
}

#[tokio::test]
async fn test_low_stock_holds_without_creating() {
    let backend = FakeBackend::start().await.unwrap();
    let desk = DoctorDesk::new(backend.signed_in(Role::Doctor).await.unwrap());

    let outcome = desk
        .upload(draft("Insulin 3\nParacetamol 1\n", "Diabetes"))
        .await
        .unwrap();

    let UploadOutcome::LowStock(hold) = outcome else {
        panic!("expected a low-stock hold, got {outcome:?}");
    };
    assert_eq!(hold.report.low_stock.len(), 1);
    let item = hold.report.low_stock.first().unwrap();
    assert_eq!(item.medicine_name, "Insulin");
    assert_eq!((item.requested, item.available), (3, 1));
    assert_eq!(backend.prescription_count().await, 0);

    // Revising hands the draft back and still creates nothing.
    let resolution = desk.decide(hold, UploadDecision::Revise).await.unwrap();
    let HoldResolution::Revised(draft) = resolution else {
        panic!("expected the draft back");
    };
    assert_eq!(draft.remarks, "Diabetes");
    assert_eq!(backend.prescription_count().await, 0);
}

#[tokio::test]
async fn test_override_creates_despite_low_stock() {
    let backend = FakeBackend::start().await.unwrap();
    let desk = DoctorDesk::new(backend.signed_in(Role::Doctor).await.unwrap());

    let UploadOutcome::LowStock(hold) = desk.upload(draft("Insulin 3\n", "")).await.unwrap() else {
        panic!("expected a low-stock hold");
    };

    let resolution = desk.decide(hold, UploadDecision::Override).await.unwrap();
    let HoldResolution::Created(prescription) = resolution else {
        panic!("expected a created prescription");
    };
    assert_eq!(prescription.status, FulfillmentStatus::Pending);
    assert!(prescription.remarks.is_none());
    assert_eq!(backend.prescription_count().await, 1);
}

#[tokio::test]
async fn test_missing_fields_rejected_before_request() {
    let backend = FakeBackend::start().await.unwrap();
    let desk = DoctorDesk::new(backend.signed_in(Role::Doctor).await.unwrap());

    let mut no_file = draft("", "Fever");
    no_file.file = None;
    assert!(matches!(
        desk.upload(no_file).await,
        Err(DeskError::MissingField("file"))
    ));
    assert_eq!(backend.prescription_count().await, 0);
}

#[tokio::test]
async fn test_unknown_patient_is_rejected_by_backend() {
    let backend = FakeBackend::start().await.unwrap();
    let desk = DoctorDesk::new(backend.signed_in(Role::Doctor).await.unwrap());

    let mut unknown = draft("Paracetamol 1\n", "");
    unknown.patient_user_id = Some(UserId::new(9_999));
    assert!(matches!(
        desk.upload(unknown).await,
        Err(DeskError::Api(mediplus_client::ApiError::NotFound(_)))
    ));
}

#[tokio::test]
async fn test_search_and_preview() {
    let backend = FakeBackend::start().await.unwrap();
    let desk = DoctorDesk::new(backend.signed_in(Role::Doctor).await.unwrap());

    // Nothing uploaded yet.
    assert!(desk.search(Some("asha"), None).await.unwrap().is_empty());

    let body = "%PDF-1.4\nAmoxicillin 10\n";
    let UploadOutcome::Created(created) = desk.upload(draft(body, "Infection")).await.unwrap()
    else {
        panic!("expected a created prescription");
    };

    let by_name = desk.search(Some("  ASHA "), None).await.unwrap();
    assert_eq!(by_name.len(), 1);
    let by_id = desk
        .search(None, Some(UserId::new(PATIENT_USER_ID)))
        .await
        .unwrap();
    assert_eq!(by_id.first().map(|p| &p.id), Some(&created.id));
    assert!(desk.search(Some("nobody"), None).await.unwrap().is_empty());

    let download = desk.preview(&created.id).await.unwrap();
    assert_eq!(download.file_name.as_deref(), Some("rx.pdf"));
    assert_eq!(download.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(download.bytes, body.as_bytes());
}

#[tokio::test]
async fn test_patient_sees_own_prescriptions() {
    let backend = FakeBackend::start().await.unwrap();
    let patient = PatientDesk::new(backend.signed_in(Role::Patient).await.unwrap());
    assert!(patient.prescriptions().await.unwrap().is_empty());

    let doctor = DoctorDesk::new(backend.signed_in(Role::Doctor).await.unwrap());
    doctor
        .upload(draft("Paracetamol 2\n", "Fever"))
        .await
        .unwrap();

    let own = patient.prescriptions().await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own.first().and_then(|p| p.remarks.as_deref()), Some("Fever"));

    let download = patient
        .download(&own.first().unwrap().id)
        .await
        .unwrap();
    assert_eq!(download.file_name.as_deref(), Some("rx.pdf"));
}
