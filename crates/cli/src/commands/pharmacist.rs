//! `mediplus pharmacist ...`

use std::time::Duration;

use mediplus_client::SessionContext;
use mediplus_client::desk::{PharmacistDesk, StatusFilter};
use mediplus_core::PrescriptionId;
use tracing::warn;

use super::CommandError;
use crate::output;

pub struct QueueOptions {
    pub filter: StatusFilter,
    pub watch: bool,
    pub interval: Duration,
}

/// Print the queue once, or keep refreshing it until Ctrl-C.
pub async fn queue(session: &SessionContext, options: QueueOptions) -> Result<(), CommandError> {
    let desk = PharmacistDesk::new(session.clone());
    if !options.watch {
        output::queue(&desk.queue(options.filter).await?);
        return Ok(());
    }

    let mut subscription = desk.subscribe(options.interval).await?;
    loop {
        tokio::select! {
            snapshot = subscription.changed() => {
                let snapshot = snapshot.map_err(|_| CommandError::SubscriptionClosed)?;
                if let Some(error) = snapshot.error.as_deref() {
                    warn!(%error, "refresh failed; showing last known queue");
                }
                output::message(&format!("-- refresh {} --", snapshot.polls));
                output::queue(&options.filter.apply(snapshot.entries));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    subscription.cancel();
    Ok(())
}

pub async fn prepare(session: &SessionContext, id: String) -> Result<(), CommandError> {
    let desk = PharmacistDesk::new(session.clone());
    let message = desk.mark_preparing(&PrescriptionId::new(id)).await?;
    output::ack(message.as_deref(), "Marked as preparing.");
    Ok(())
}

pub async fn pickup(session: &SessionContext, id: String, otp: &str) -> Result<(), CommandError> {
    let desk = PharmacistDesk::new(session.clone());
    let message = desk.verify_otp(&PrescriptionId::new(id), otp).await?;
    output::ack(message.as_deref(), "Pickup confirmed.");
    Ok(())
}

pub async fn orders(session: &SessionContext) -> Result<(), CommandError> {
    let desk = PharmacistDesk::new(session.clone());
    output::orders(&desk.orders().await?);
    Ok(())
}

pub async fn pending(session: &SessionContext) -> Result<(), CommandError> {
    let desk = PharmacistDesk::new(session.clone());
    output::orders(&desk.pending().await?);
    Ok(())
}
