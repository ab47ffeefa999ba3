//! `mediplus patient ...`

use std::path::PathBuf;

use futures::StreamExt;
use mediplus_client::SessionContext;
use mediplus_client::desk::PatientDesk;
use mediplus_client::ticker;
use mediplus_core::PrescriptionId;

use super::{CommandError, download_target, write_file};
use crate::output;

pub async fn list(session: &SessionContext) -> Result<(), CommandError> {
    let desk = PatientDesk::new(session.clone());
    output::prescriptions(&desk.prescriptions().await?);
    Ok(())
}

/// Send to the pharmacy; with `wait`, count down until the estimate passes
/// or Ctrl-C.
pub async fn buy(session: &SessionContext, id: String, wait: bool) -> Result<(), CommandError> {
    let desk = PatientDesk::new(session.clone());
    let plan = desk.send_to_pharmacy(&PrescriptionId::new(id)).await?;
    output::pickup(&plan);

    let Some(countdown) = plan.countdown.filter(|_| wait) else {
        return Ok(());
    };

    let mut ticks = std::pin::pin!(ticker::ticks(countdown));
    loop {
        tokio::select! {
            tick = ticks.next() => match tick {
                Some(remaining) => output::countdown(remaining),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                output::message("");
                break;
            }
        }
    }
    Ok(())
}

pub async fn download(
    session: &SessionContext,
    id: String,
    out: Option<PathBuf>,
) -> Result<(), CommandError> {
    let desk = PatientDesk::new(session.clone());
    let id = PrescriptionId::new(id);
    let download = desk.download(&id).await?;

    let target = download_target(out, download.file_name.as_deref(), id.as_str());
    write_file(&target, &download.bytes).await?;
    output::message(&format!("Saved {}", target.display()));
    Ok(())
}

pub async fn ask(session: &SessionContext, prompt: &str) -> Result<(), CommandError> {
    let desk = PatientDesk::new(session.clone());
    output::message(&desk.ask(prompt).await?);
    Ok(())
}

pub async fn suggest(session: &SessionContext) -> Result<(), CommandError> {
    let desk = PatientDesk::new(session.clone());
    output::suggestions(&desk.suggested_questions().await?);
    Ok(())
}
