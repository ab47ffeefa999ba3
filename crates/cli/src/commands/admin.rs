//! `mediplus admin ...`

use std::path::Path;

use chrono::NaiveDateTime;
use mediplus_client::SessionContext;
use mediplus_client::desk::{AdminDesk, InventoryFilter};
use mediplus_core::{InventoryItemId, NewInventoryItem};

use super::{CommandError, file_name, read_file};
use crate::output;

pub async fn inventory(
    session: &SessionContext,
    name: Option<String>,
    unit: Option<String>,
) -> Result<(), CommandError> {
    let desk = AdminDesk::new(session.clone());
    let items = desk.inventory(&InventoryFilter { name, unit }).await?;
    output::inventory(&items);
    Ok(())
}

pub async fn add(
    session: &SessionContext,
    name: String,
    quantity: i32,
    unit: String,
    threshold: i32,
) -> Result<(), CommandError> {
    let desk = AdminDesk::new(session.clone());
    let item = NewInventoryItem::new(name, quantity)
        .with_unit(unit)
        .with_threshold(threshold);
    output::item(&desk.add_item(item).await?);
    Ok(())
}

pub async fn update(
    session: &SessionContext,
    id: InventoryItemId,
    quantity: i32,
) -> Result<(), CommandError> {
    let desk = AdminDesk::new(session.clone());
    output::item(&desk.update_quantity(id, quantity).await?);
    Ok(())
}

pub async fn delete(session: &SessionContext, id: InventoryItemId) -> Result<(), CommandError> {
    let desk = AdminDesk::new(session.clone());
    let message = desk.delete_item(id).await?;
    output::ack(message.as_deref(), "Deleted.");
    Ok(())
}

pub async fn import(session: &SessionContext, file: &Path) -> Result<(), CommandError> {
    let csv = read_file(file).await?;
    let desk = AdminDesk::new(session.clone());
    let message = desk.import_csv(&file_name(file), csv).await?;
    output::ack(message.as_deref(), "Imported.");
    Ok(())
}

pub async fn stats(
    session: &SessionContext,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Result<(), CommandError> {
    let desk = AdminDesk::new(session.clone());
    output::stats(&desk.queue_stats(start, end).await?);
    Ok(())
}

pub async fn alerts(session: &SessionContext) -> Result<(), CommandError> {
    let desk = AdminDesk::new(session.clone());
    output::alerts(&desk.alerts().await?);
    Ok(())
}

pub async fn analytics(session: &SessionContext) -> Result<(), CommandError> {
    let desk = AdminDesk::new(session.clone());
    output::analytics(&desk.analytics().await?);
    Ok(())
}
