//! `mediplus doctor ...`

use std::path::{Path, PathBuf};

use mediplus_client::SessionContext;
use mediplus_client::api::PrescriptionFile;
use mediplus_client::desk::{DoctorDesk, PrescriptionDraft, UploadOutcome};
use mediplus_core::{PrescriptionId, UserId};
use tracing::{info, warn};

use super::{CommandError, download_target, file_name, read_file, write_file};
use crate::output;

pub async fn search(
    session: &SessionContext,
    name: Option<&str>,
    user_id: Option<UserId>,
) -> Result<(), CommandError> {
    let desk = DoctorDesk::new(session.clone());
    let found = desk.search(name, user_id).await?;
    output::prescriptions(&found);
    Ok(())
}

/// Upload a PDF. With `force`, a low-stock hold is overridden immediately.
pub async fn upload(
    session: &SessionContext,
    file: &Path,
    patient_name: String,
    patient_id: UserId,
    remarks: String,
    force: bool,
) -> Result<(), CommandError> {
    let bytes = read_file(file).await?;
    let draft = PrescriptionDraft {
        patient_name,
        patient_user_id: Some(patient_id),
        remarks,
        file: Some(PrescriptionFile::new(file_name(file), bytes)),
    };

    let desk = DoctorDesk::new(session.clone());
    let created = match desk.upload(draft).await? {
        UploadOutcome::Created(prescription) => prescription,
        UploadOutcome::LowStock(hold) => {
            output::low_stock(&hold.report);
            if !force {
                return Err(CommandError::LowStock(hold.report));
            }
            warn!("uploading despite low stock");
            desk.override_upload(&hold).await?
        }
    };

    info!(prescription_id = %created.id, "uploaded");
    output::prescriptions(std::slice::from_ref(&created));
    Ok(())
}

pub async fn view(
    session: &SessionContext,
    id: String,
    out: Option<PathBuf>,
) -> Result<(), CommandError> {
    let desk = DoctorDesk::new(session.clone());
    let id = PrescriptionId::new(id);
    let download = desk.preview(&id).await?;

    let target = download_target(out, download.file_name.as_deref(), id.as_str());
    write_file(&target, &download.bytes).await?;
    output::message(&format!("Saved {}", target.display()));
    Ok(())
}
