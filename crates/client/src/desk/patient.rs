//! Patient workspace: own prescriptions, send to pharmacy, download, assistant.

use chrono::Utc;
use mediplus_core::{Countdown, PickupTicket, Prescription, PrescriptionId, Role};
use tracing::{info, instrument};

use super::{DeskError, require_role, required};
use crate::api::Download;
use crate::session::SessionContext;

/// What the patient sees after sending a prescription to the pharmacy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupPlan {
    pub ticket: PickupTicket,
    /// Present when the backend estimated a wait.
    pub countdown: Option<Countdown>,
}

/// Patient view-model.
#[derive(Debug, Clone)]
pub struct PatientDesk {
    session: SessionContext,
}

impl PatientDesk {
    #[must_use]
    pub const fn new(session: SessionContext) -> Self {
        Self { session }
    }

    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self))]
    pub async fn prescriptions(&self) -> Result<Vec<Prescription>, DeskError> {
        require_role(&self.session, Role::Patient).await?;
        Ok(self.session.api().prescriptions().list().await?)
    }

    /// Send a prescription to the pharmacy ("buy"). The OTP in the returned
    /// ticket is shown once; it is not stored anywhere.
    ///
    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self), fields(prescription_id = %id))]
    pub async fn send_to_pharmacy(&self, id: &PrescriptionId) -> Result<PickupPlan, DeskError> {
        require_role(&self.session, Role::Patient).await?;
        let ticket = self.session.api().pharmacy().send(id).await?;
        let countdown = ticket
            .est_time
            .map(|secs| Countdown::starting_at(Utc::now(), secs));
        info!(est_time = ?ticket.est_time, "sent to pharmacy");
        Ok(PickupPlan { ticket, countdown })
    }

    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self), fields(prescription_id = %id))]
    pub async fn download(&self, id: &PrescriptionId) -> Result<Download, DeskError> {
        require_role(&self.session, Role::Patient).await?;
        Ok(self.session.api().prescriptions().view(id).await?)
    }

    /// Ask the assistant a question.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::MissingField` for a blank prompt, before any request.
    #[instrument(skip(self, prompt))]
    pub async fn ask(&self, prompt: &str) -> Result<String, DeskError> {
        let prompt = required(prompt, "prompt")?;
        require_role(&self.session, Role::Patient).await?;
        Ok(self.session.api().chatbot().ask(prompt).await?)
    }

    /// Suggested questions for the next doctor visit.
    ///
    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self))]
    pub async fn suggested_questions(&self) -> Result<Vec<String>, DeskError> {
        require_role(&self.session, Role::Patient).await?;
        Ok(self.session.api().chatbot().suggest_questions().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::signed_in;

    #[tokio::test]
    async fn test_blank_prompt_is_rejected_locally() {
        let desk = PatientDesk::new(signed_in(Role::Patient).await);
        assert!(matches!(
            desk.ask("   ").await,
            Err(DeskError::MissingField("prompt"))
        ));
    }

    #[tokio::test]
    async fn test_other_roles_cannot_buy() {
        let desk = PatientDesk::new(signed_in(Role::Doctor).await);
        let id = PrescriptionId::new("rx-1");
        assert!(matches!(
            desk.send_to_pharmacy(&id).await,
            Err(DeskError::WrongRole {
                required: Role::Patient,
                ..
            })
        ));
    }
}
