//! Live queue polling against a slow backend.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use mediplus_client::api::PrescriptionFile;
use mediplus_client::desk::{
    DoctorDesk, PatientDesk, PharmacistDesk, PrescriptionDraft, UploadOutcome,
};
use mediplus_core::{FulfillmentStatus, Role, UserId};
use mediplus_integration_tests::{FakeBackend, PATIENT_USER_ID};

async fn queued_order(backend: &FakeBackend) {
    let doctor = DoctorDesk::new(backend.signed_in(Role::Doctor).await.unwrap());
    let draft = PrescriptionDraft {
        patient_name: "Asha Rao".to_string(),
        patient_user_id: Some(UserId::new(PATIENT_USER_ID)),
        remarks: String::new(),
        file: Some(PrescriptionFile::new("rx.txt", b"Paracetamol 1\n".to_vec())),
    };
    let UploadOutcome::Created(p) = doctor.upload(draft).await.unwrap() else {
        panic!("expected a created prescription");
    };
    let patient = PatientDesk::new(backend.signed_in(Role::Patient).await.unwrap());
    patient.send_to_pharmacy(&p.id).await.unwrap();
}

#[tokio::test]
async fn test_slow_backend_never_sees_overlapping_polls() {
    let backend = FakeBackend::start().await.unwrap();
    queued_order(&backend).await;
    backend.set_queue_delay(Duration::from_millis(250)).await;

    let desk = PharmacistDesk::new(backend.signed_in(Role::Pharmacist).await.unwrap());
    let mut subscription = desk.subscribe(Duration::from_millis(100)).await.unwrap();

    for _ in 0..3 {
        let snapshot = tokio::time::timeout(Duration::from_secs(5), subscription.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.entries.len(), 1);
        assert!(snapshot.fetched_at.is_some());
    }

    assert!(backend.queue_requests() >= 3);
    assert_eq!(backend.max_queue_in_flight(), 1);
    assert_eq!(
        desk.known_status(&subscription.latest().entries.first().unwrap().prescription_id),
        Some(FulfillmentStatus::Pending)
    );

    subscription.cancel();
    // Let an abandoned request drain before sampling.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let after_cancel = backend.queue_requests();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(backend.queue_requests(), after_cancel);
}

#[tokio::test]
async fn test_dropping_the_subscription_stops_polling() {
    let backend = FakeBackend::start().await.unwrap();
    let desk = PharmacistDesk::new(backend.signed_in(Role::Pharmacist).await.unwrap());

    let mut subscription = desk.subscribe(Duration::from_millis(50)).await.unwrap();
    let first = tokio::time::timeout(Duration::from_secs(5), subscription.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(first.entries.is_empty());
    assert!(first.polls >= 1);

    drop(subscription);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after_drop = backend.queue_requests();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.queue_requests(), after_drop);
}
