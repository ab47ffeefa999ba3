//! Role workflows.
//!
//! Each desk is the view-model behind one role's workspace. Desks hold a
//! [`SessionContext`] clone, check the signed-in role and the required
//! fields, then call the gateway. The backend has the last word on every
//! business rule.

mod admin;
mod doctor;
mod patient;
mod pharmacist;

pub use admin::{AdminDesk, Alerts, AnalyticsSnapshot, InventoryFilter};
pub use doctor::{DoctorDesk, HoldResolution, LowStockHold, PrescriptionDraft, UploadOutcome};
pub use patient::{PatientDesk, PickupPlan};
pub use pharmacist::{PharmacistDesk, StatusFilter};

use mediplus_core::{Role, TransitionError, User};
use thiserror::Error;

use crate::api::ApiError;
use crate::session::{SessionContext, SessionError};

/// Workflow errors.
#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("This action requires the {required} role (signed in as {actual})")]
    WrongRole { required: Role, actual: Role },

    #[error("Invalid OTP: {0}")]
    InvalidOtp(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// The signed-in user, if they hold `role`.
async fn require_role(session: &SessionContext, role: Role) -> Result<User, DeskError> {
    let user = session.user().await.ok_or(DeskError::NotAuthenticated)?;
    if user.role != role {
        return Err(DeskError::WrongRole {
            required: role,
            actual: user.role,
        });
    }
    Ok(user)
}

/// Trimmed, non-empty text.
fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, DeskError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DeskError::MissingField(field));
    }
    Ok(value)
}
