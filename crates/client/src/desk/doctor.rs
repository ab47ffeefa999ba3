//! Doctor workspace: upload with the low-stock branch, search, preview.

use mediplus_core::{
    LowStockReport, Prescription, PrescriptionId, Role, UploadDecision, UploadStage, UserId,
};
use tracing::{info, instrument, warn};

use super::{DeskError, require_role, required};
use crate::api::{ApiError, Download, PrescriptionFile, UploadFields};
use crate::session::SessionContext;

/// What the doctor has filled in so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrescriptionDraft {
    pub patient_name: String,
    pub patient_user_id: Option<UserId>,
    pub remarks: String,
    pub file: Option<PrescriptionFile>,
}

impl PrescriptionDraft {
    /// Check required fields and split into the form fields and the file.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::MissingField` for a missing file, patient name or
    /// patient id.
    pub fn validate(&self) -> Result<(UploadFields, &PrescriptionFile), DeskError> {
        let file = self.file.as_ref().ok_or(DeskError::MissingField("file"))?;
        if file.bytes.is_empty() {
            return Err(DeskError::InvalidField {
                field: "file",
                reason: "file is empty".to_string(),
            });
        }
        let patient_name = required(&self.patient_name, "patient_name")?;
        let patient_user_id = self
            .patient_user_id
            .ok_or(DeskError::MissingField("patient_user_id"))?;
        let remarks = self.remarks.trim();

        Ok((
            UploadFields {
                patient_name: patient_name.to_string(),
                patient_user_id,
                remarks: (!remarks.is_empty()).then(|| remarks.to_string()),
            },
            file,
        ))
    }
}

/// An upload the backend refused for low stock. Nothing was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowStockHold {
    pub draft: PrescriptionDraft,
    pub report: LowStockReport,
    stage: UploadStage,
}

impl LowStockHold {
    fn new(draft: PrescriptionDraft, report: LowStockReport) -> Self {
        Self {
            draft,
            report,
            stage: UploadStage::submitted(true),
        }
    }

    /// Go back to editing. No request is made.
    #[must_use]
    pub fn revise(self) -> PrescriptionDraft {
        self.draft
    }
}

/// Result of submitting a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Created(Prescription),
    LowStock(LowStockHold),
}

/// Result of resolving a hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldResolution {
    Revised(PrescriptionDraft),
    Created(Prescription),
}

/// Doctor view-model.
#[derive(Debug, Clone)]
pub struct DoctorDesk {
    session: SessionContext,
}

impl DoctorDesk {
    #[must_use]
    pub const fn new(session: SessionContext) -> Self {
        Self { session }
    }

    /// Submit a draft. A low-stock refusal comes back as a hold, not an error.
    ///
    /// # Errors
    ///
    /// Returns `DeskError` for missing fields, the wrong role, or any other
    /// backend rejection.
    #[instrument(skip(self, draft))]
    pub async fn upload(&self, draft: PrescriptionDraft) -> Result<UploadOutcome, DeskError> {
        require_role(&self.session, Role::Doctor).await?;
        let (fields, file) = draft.validate()?;

        match self.session.api().prescriptions().upload(&fields, file).await {
            Ok(prescription) => {
                info!(prescription_id = %prescription.id, "prescription uploaded");
                Ok(UploadOutcome::Created(prescription))
            }
            Err(ApiError::LowStock(report)) => {
                warn!(items = report.low_stock.len(), "upload held for low stock");
                Ok(UploadOutcome::LowStock(LowStockHold::new(draft, report)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create the held prescription anyway.
    ///
    /// # Errors
    ///
    /// Returns `DeskError` if the override upload is rejected; the hold is
    /// left intact for another attempt.
    #[instrument(skip(self, hold))]
    pub async fn override_upload(&self, hold: &LowStockHold) -> Result<Prescription, DeskError> {
        require_role(&self.session, Role::Doctor).await?;
        hold.stage.decide(UploadDecision::Override)?;
        let (fields, file) = hold.draft.validate()?;

        let prescription = self
            .session
            .api()
            .prescriptions()
            .upload_override(&fields, file)
            .await?;
        info!(prescription_id = %prescription.id, "prescription uploaded over low-stock warning");
        Ok(prescription)
    }

    /// Resolve a hold with the doctor's decision.
    ///
    /// # Errors
    ///
    /// See [`DoctorDesk::override_upload`]. Revising never fails.
    pub async fn decide(
        &self,
        hold: LowStockHold,
        decision: UploadDecision,
    ) -> Result<HoldResolution, DeskError> {
        match decision {
            UploadDecision::Revise => {
                hold.stage.decide(decision)?;
                Ok(HoldResolution::Revised(hold.revise()))
            }
            UploadDecision::Override => self
                .override_upload(&hold)
                .await
                .map(HoldResolution::Created),
        }
    }

    /// Search by patient name and/or user id. Blank names are ignored.
    ///
    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        name: Option<&str>,
        user_id: Option<UserId>,
    ) -> Result<Vec<Prescription>, DeskError> {
        require_role(&self.session, Role::Doctor).await?;
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        Ok(self
            .session
            .api()
            .prescriptions()
            .search(name, user_id)
            .await?)
    }

    /// Fetch the PDF for preview.
    ///
    /// # Errors
    ///
    /// Returns `DeskError` for the wrong role or a backend rejection.
    #[instrument(skip(self), fields(prescription_id = %id))]
    pub async fn preview(&self, id: &PrescriptionId) -> Result<Download, DeskError> {
        require_role(&self.session, Role::Doctor).await?;
        Ok(self.session.api().prescriptions().view(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use mediplus_core::LowStockItem;

    use super::*;
    use crate::session::tests::signed_in;

    fn draft() -> PrescriptionDraft {
        PrescriptionDraft {
            patient_name: " Asha ".to_string(),
            patient_user_id: Some(UserId::new(123)),
            remarks: "Fever".to_string(),
            file: Some(PrescriptionFile::new("rx.pdf", b"%PDF-1.4".to_vec())),
        }
    }

    fn hold() -> LowStockHold {
        LowStockHold::new(
            draft(),
            LowStockReport {
                message: None,
                low_stock: vec![LowStockItem {
                    medicine_name: "Insulin".to_string(),
                    requested: 2,
                    available: 0,
                }],
            },
        )
    }

    #[test]
    fn test_validate_trims_and_maps_fields() {
        let draft = draft();
        let (fields, file) = draft.validate().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(fields.patient_name, "Asha");
        assert_eq!(fields.remarks.as_deref(), Some("Fever"));
        assert_eq!(file.file_name, "rx.pdf");
    }

    #[test]
    fn test_validate_requires_file_and_patient() {
        let mut missing_file = draft();
        missing_file.file = None;
        assert!(matches!(
            missing_file.validate(),
            Err(DeskError::MissingField("file"))
        ));

        let mut missing_id = draft();
        missing_id.patient_user_id = None;
        assert!(matches!(
            missing_id.validate(),
            Err(DeskError::MissingField("patient_user_id"))
        ));

        let mut blank_name = draft();
        blank_name.patient_name = "  ".to_string();
        assert!(matches!(
            blank_name.validate(),
            Err(DeskError::MissingField("patient_name"))
        ));
    }

    #[test]
    fn test_blank_remarks_are_omitted() {
        let mut draft = draft();
        draft.remarks = "   ".to_string();
        let (fields, _) = draft.validate().unwrap_or_else(|e| panic!("{e}"));
        assert!(fields.remarks.is_none());
    }

    #[tokio::test]
    async fn test_revise_returns_draft_without_request() {
        // The offline client would fail any request; revising must not send one.
        let desk = DoctorDesk::new(signed_in(Role::Doctor).await);
        let resolution = desk
            .decide(hold(), UploadDecision::Revise)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(resolution, HoldResolution::Revised(draft()));
    }

    #[tokio::test]
    async fn test_upload_requires_doctor_role() {
        let desk = DoctorDesk::new(signed_in(Role::Patient).await);
        assert!(matches!(
            desk.upload(draft()).await,
            Err(DeskError::WrongRole { .. })
        ));
        assert!(matches!(
            desk.override_upload(&hold()).await,
            Err(DeskError::WrongRole { .. })
        ));
    }
}
