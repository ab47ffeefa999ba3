//! `/prescriptions` endpoints.

use mediplus_core::{Prescription, PrescriptionId, UserId};
use reqwest::multipart::{Form, Part};
use tracing::instrument;

use super::{ApiClient, ApiError, Download};

/// The PDF a doctor uploads.
#[derive(Clone, PartialEq, Eq)]
pub struct PrescriptionFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PrescriptionFile {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for PrescriptionFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrescriptionFile")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Non-file fields of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFields {
    pub patient_name: String,
    pub patient_user_id: UserId,
    pub remarks: Option<String>,
}

/// Prescription endpoints.
#[derive(Debug, Clone, Copy)]
pub struct PrescriptionsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> PrescriptionsApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// The signed-in patient's prescriptions.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection. "None found" is
    /// an empty list.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Prescription>, ApiError> {
        self.client.get_list("/prescriptions/", &[]).await
    }

    /// Doctor search by patient name and/or user id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        name: Option<&str>,
        user_id: Option<UserId>,
    ) -> Result<Vec<Prescription>, ApiError> {
        let user_id = user_id.map(|id| id.to_string());
        let mut query = Vec::with_capacity(2);
        if let Some(name) = name {
            query.push(("name", name));
        }
        if let Some(user_id) = user_id.as_deref() {
            query.push(("user_id", user_id));
        }
        self.client.get("/prescriptions", &query).await
    }

    /// Upload a prescription.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::LowStock` when the pharmacy cannot supply the
    /// medicines; nothing is created in that case.
    #[instrument(skip(self, file), fields(patient_user_id = %fields.patient_user_id))]
    pub async fn upload(
        &self,
        fields: &UploadFields,
        file: &PrescriptionFile,
    ) -> Result<Prescription, ApiError> {
        let form = upload_form(fields, file)?;
        self.client.post_multipart("/prescriptions/", form).await
    }

    /// Upload a prescription despite a low-stock warning.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self, file), fields(patient_user_id = %fields.patient_user_id))]
    pub async fn upload_override(
        &self,
        fields: &UploadFields,
        file: &PrescriptionFile,
    ) -> Result<Prescription, ApiError> {
        let form = upload_form(fields, file)?;
        self.client
            .post_multipart("/prescriptions/override", form)
            .await
    }

    /// Download the prescription PDF.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` when the prescription or its file is gone.
    #[instrument(skip(self), fields(prescription_id = %id))]
    pub async fn view(&self, id: &PrescriptionId) -> Result<Download, ApiError> {
        let path = ApiClient::id_path("/prescriptions/view", id)?;
        self.client.get_bytes(&path).await
    }
}

fn upload_form(fields: &UploadFields, file: &PrescriptionFile) -> Result<Form, ApiError> {
    let part = Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str("application/pdf")?;

    Ok(Form::new()
        .part("file", part)
        .text("patient_name", fields.patient_name.clone())
        .text("patient_user_id", fields.patient_user_id.to_string())
        .text("remarks", fields.remarks.clone().unwrap_or_default()))
}
