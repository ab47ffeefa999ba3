//! Pharmacist workspace: the live queue, preparing, OTP pickup.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mediplus_core::{
    FulfillmentEvent, FulfillmentStatus, Otp, PharmacyOrder, PrescriptionId, QueueEntry, Role,
    StatusParseError,
};
use tracing::{info, instrument, warn};

use super::{DeskError, require_role};
use crate::api::ApiError;
use crate::poller::{QueueSource, QueueSubscription};
use crate::session::SessionContext;

/// Which queue entries to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(FulfillmentStatus),
}

impl StatusFilter {
    #[must_use]
    pub fn admits(self, status: FulfillmentStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == status,
        }
    }

    /// Keep the entries this filter admits.
    #[must_use]
    pub fn apply(self, entries: Vec<QueueEntry>) -> Vec<QueueEntry> {
        entries
            .into_iter()
            .filter(|e| self.admits(e.status))
            .collect()
    }
}

impl FromStr for StatusFilter {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

type KnownStatuses = Arc<Mutex<HashMap<PrescriptionId, FulfillmentStatus>>>;

/// Pharmacist view-model.
///
/// Remembers the last status it saw for each prescription so that
/// transitions the state machine forbids are refused without a request.
#[derive(Debug, Clone)]
pub struct PharmacistDesk {
    session: SessionContext,
    known: KnownStatuses,
}

impl PharmacistDesk {
    #[must_use]
    pub fn new(session: SessionContext) -> Self {
        Self {
            session,
            known: Arc::default(),
        }
    }

    /// Last status seen for `id`, if any.
    #[must_use]
    pub fn known_status(&self, id: &PrescriptionId) -> Option<FulfillmentStatus> {
        lock(&self.known).get(id).copied()
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// Fetch the queue once.
    ///
    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self))]
    pub async fn queue(&self, filter: StatusFilter) -> Result<Vec<QueueEntry>, DeskError> {
        require_role(&self.session, Role::Pharmacist).await?;
        let entries = self.session.api().pharmacy().queue().await?;
        record(&self.known, &entries);
        Ok(filter.apply(entries))
    }

    /// Start a live queue subscription. Statuses it sees are remembered by
    /// this desk.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::InvalidField` for a zero interval, or `DeskError`
    /// if the signed-in user is not a pharmacist.
    pub async fn subscribe(&self, interval: Duration) -> Result<QueueSubscription, DeskError> {
        if interval.is_zero() {
            return Err(DeskError::InvalidField {
                field: "interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        require_role(&self.session, Role::Pharmacist).await?;
        let source = DeskQueue {
            session: self.session.clone(),
            known: Arc::clone(&self.known),
        };
        Ok(QueueSubscription::spawn(source, interval))
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// `pending → preparing`.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Transition` if the entry is known not to be
    /// pending, or `DeskError::Api` if the backend refuses.
    #[instrument(skip(self), fields(prescription_id = %id))]
    pub async fn mark_preparing(&self, id: &PrescriptionId) -> Result<Option<String>, DeskError> {
        require_role(&self.session, Role::Pharmacist).await?;
        if let Some(status) = self.known_status(id) {
            status.apply(FulfillmentEvent::MarkPreparing)?;
        }

        let message = self.session.api().pharmacy().mark_preparing(id).await?;
        lock(&self.known).insert(id.clone(), FulfillmentStatus::Preparing);
        info!("marked preparing");
        Ok(message)
    }

    /// `preparing → picked_up` with the patient's code.
    ///
    /// A wrong code leaves the known status untouched.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::InvalidOtp` for a malformed or wrong code and
    /// `DeskError::Transition` if the entry is already known to be picked up.
    #[instrument(skip(self, code), fields(prescription_id = %id))]
    pub async fn verify_otp(
        &self,
        id: &PrescriptionId,
        code: &str,
    ) -> Result<Option<String>, DeskError> {
        let otp = Otp::parse(code).map_err(|e| DeskError::InvalidOtp(e.to_string()))?;
        require_role(&self.session, Role::Pharmacist).await?;

        // Only a known pickup is final; any other status may be stale, so the
        // backend decides.
        if self.known_status(id) == Some(FulfillmentStatus::PickedUp) {
            FulfillmentStatus::PickedUp.apply(FulfillmentEvent::ConfirmPickup)?;
        }

        match self.session.api().pharmacy().confirm_pickup(id, &otp).await {
            Ok(message) => {
                lock(&self.known).insert(id.clone(), FulfillmentStatus::PickedUp);
                info!("pickup confirmed");
                Ok(message)
            }
            Err(ApiError::NotFound(message)) => {
                warn!("pickup refused");
                Err(DeskError::InvalidOtp(message))
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<PharmacyOrder>, DeskError> {
        require_role(&self.session, Role::Pharmacist).await?;
        Ok(self.session.api().pharmacy().orders().await?)
    }

    /// Orders awaiting pickup.
    ///
    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self))]
    pub async fn pending(&self) -> Result<Vec<PharmacyOrder>, DeskError> {
        require_role(&self.session, Role::Pharmacist).await?;
        Ok(self.session.api().pharmacy().pending().await?)
    }
}

struct DeskQueue {
    session: SessionContext,
    known: KnownStatuses,
}

impl QueueSource for DeskQueue {
    async fn fetch(&self) -> Result<Vec<QueueEntry>, ApiError> {
        let entries = self.session.api().pharmacy().queue().await?;
        record(&self.known, &entries);
        Ok(entries)
    }
}

fn lock(
    known: &KnownStatuses,
) -> std::sync::MutexGuard<'_, HashMap<PrescriptionId, FulfillmentStatus>> {
    known.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record(known: &KnownStatuses, entries: &[QueueEntry]) {
    let mut known = lock(known);
    for entry in entries {
        known.insert(entry.prescription_id.clone(), entry.status);
    }
}

#[cfg(test)]
mod tests {
    use mediplus_core::{QueueId, TransitionError};

    use super::*;
    use crate::session::tests::signed_in;

    fn entry(id: &str, status: FulfillmentStatus) -> QueueEntry {
        QueueEntry {
            queue_id: QueueId::new(format!("q-{id}")),
            prescription_id: PrescriptionId::new(id),
            patient_user_id: None,
            medicines: Vec::new(),
            est_time: 300,
            status,
            created_at: None,
        }
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("all".parse::<StatusFilter>().ok(), Some(StatusFilter::All));
        assert_eq!(
            "picked-up".parse::<StatusFilter>().ok(),
            Some(StatusFilter::Only(FulfillmentStatus::PickedUp))
        );
        assert!("shipped".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_status_filter_apply() {
        let entries = vec![
            entry("a", FulfillmentStatus::Pending),
            entry("b", FulfillmentStatus::Preparing),
            entry("c", FulfillmentStatus::Pending),
        ];
        let pending = StatusFilter::Only(FulfillmentStatus::Pending).apply(entries.clone());
        assert_eq!(pending.len(), 2);
        assert_eq!(StatusFilter::All.apply(entries).len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_otp_rejected_before_request() {
        let desk = PharmacistDesk::new(signed_in(Role::Pharmacist).await);
        let id = PrescriptionId::new("rx-1");
        assert!(matches!(
            desk.verify_otp(&id, "12ab").await,
            Err(DeskError::InvalidOtp(_))
        ));
        assert!(matches!(
            desk.verify_otp(&id, "  ").await,
            Err(DeskError::InvalidOtp(_))
        ));
    }

    #[tokio::test]
    async fn test_known_pickup_is_refused_locally() {
        let desk = PharmacistDesk::new(signed_in(Role::Pharmacist).await);
        record(&desk.known, &[entry("rx-1", FulfillmentStatus::PickedUp)]);
        let id = PrescriptionId::new("rx-1");

        assert!(matches!(
            desk.verify_otp(&id, "123456").await,
            Err(DeskError::Transition(TransitionError::AlreadyPickedUp))
        ));
        assert!(matches!(
            desk.mark_preparing(&id).await,
            Err(DeskError::Transition(TransitionError::AlreadyPickedUp))
        ));
        assert_eq!(desk.known_status(&id), Some(FulfillmentStatus::PickedUp));
    }

    #[tokio::test]
    async fn test_known_preparing_cannot_be_prepared_again() {
        let desk = PharmacistDesk::new(signed_in(Role::Pharmacist).await);
        record(&desk.known, &[entry("rx-2", FulfillmentStatus::Preparing)]);
        assert!(matches!(
            desk.mark_preparing(&PrescriptionId::new("rx-2")).await,
            Err(DeskError::Transition(TransitionError::NotPending(
                FulfillmentStatus::Preparing
            )))
        ));
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let desk = PharmacistDesk::new(signed_in(Role::Pharmacist).await);
        assert!(matches!(
            desk.subscribe(Duration::ZERO).await,
            Err(DeskError::InvalidField {
                field: "interval",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_queue_requires_pharmacist() {
        let desk = PharmacistDesk::new(signed_in(Role::Admin).await);
        assert!(matches!(
            desk.queue(StatusFilter::All).await,
            Err(DeskError::WrongRole { .. })
        ));
        assert!(matches!(
            desk.subscribe(Duration::from_secs(5)).await,
            Err(DeskError::WrongRole { .. })
        ));
    }
}
