//! Terminal rendering. Logs go to stderr; results go to stdout.

#![allow(clippy::print_stdout)]

use std::io::Write;

use mediplus_client::desk::{Alerts, AnalyticsSnapshot, PickupPlan};
use mediplus_client::router::RouteDecision;
use mediplus_core::countdown::format_clock;
use mediplus_core::{
    InventoryItem, LowStockReport, PharmacyOrder, Prescription, QueueEntry, QueueStats, User,
};

pub fn message(text: &str) {
    println!("{text}");
}

pub fn ack(message: Option<&str>, fallback: &str) {
    println!("{}", message.unwrap_or(fallback));
}

pub fn user(user: &User) {
    println!("{} <{}>", user.name, user.email);
    println!("  role:    {}", user.role);
    println!("  user id: {}", user.user_id);
}

pub fn route(path: &str, decision: RouteDecision) {
    match decision {
        RouteDecision::Render(route) => println!("{path} -> render {route}"),
        RouteDecision::Redirect(route) => println!("{path} -> redirect {route}"),
    }
}

pub fn prescriptions(items: &[Prescription]) {
    if items.is_empty() {
        println!("No prescriptions.");
        return;
    }
    for p in items {
        println!(
            "{}  {:<10}  {} (#{})  by {}  {}",
            p.id,
            p.status,
            p.patient_name,
            p.patient_user_id,
            p.doctor_name,
            p.created_at.format("%Y-%m-%d %H:%M"),
        );
        if let Some(remarks) = p.remarks.as_deref() {
            println!("    remarks: {remarks}");
        }
    }
}

pub fn low_stock(report: &LowStockReport) {
    println!("{}", report.message.as_deref().unwrap_or("Some medicines are low on stock"));
    for item in &report.low_stock {
        println!(
            "  {:<24} requested {:>4}  available {:>4}  short {:>4}",
            item.medicine_name,
            item.requested,
            item.available,
            item.shortfall()
        );
    }
}

pub fn pickup(plan: &PickupPlan) {
    println!("{}", plan.ticket.message);
    println!("Pickup OTP: {}", plan.ticket.otp_code);
    if let Some(est) = plan.ticket.est_time {
        println!("Estimated wait: {}", format_clock(est));
    }
}

/// Redraw the countdown in place.
pub fn countdown(remaining: u64) {
    let mut out = std::io::stdout();
    if remaining == 0 {
        writeln!(out, "\rReady for pickup.        ").ok();
    } else {
        write!(out, "\rTime remaining: {}   ", format_clock(remaining)).ok();
    }
    out.flush().ok();
}

pub fn suggestions(questions: &[String]) {
    for (n, q) in questions.iter().enumerate() {
        println!("{}. {q}", n + 1);
    }
}

pub fn queue(entries: &[QueueEntry]) {
    if entries.is_empty() {
        println!("Queue is empty.");
        return;
    }
    for e in entries {
        let medicines = e
            .medicines
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{}  {:<10}  est {}  {}",
            e.prescription_id,
            e.status,
            format_clock(e.est_time),
            medicines
        );
    }
}

pub fn orders(orders: &[PharmacyOrder]) {
    if orders.is_empty() {
        println!("No orders.");
        return;
    }
    for o in orders {
        println!(
            "{}  rx {}  patient #{}  {:<10}  otp {}  {}",
            o.id,
            o.prescription_id,
            o.patient_user_id,
            o.status,
            o.otp_code.as_deref().unwrap_or("-"),
            o.created_at.format("%Y-%m-%d %H:%M"),
        );
    }
}

pub fn inventory(items: &[InventoryItem]) {
    if items.is_empty() {
        println!("No matching inventory.");
        return;
    }
    for i in items {
        let flag = if i.needs_restock() { "  RESTOCK" } else { "" };
        println!(
            "{:>5}  {:<24} {:>6} {}{flag}",
            i.id, i.medicine_name, i.quantity, i.unit
        );
    }
}

pub fn item(item: &InventoryItem) {
    println!(
        "{}: {} {} {}",
        item.id, item.medicine_name, item.quantity, item.unit
    );
}

pub fn stats(stats: &QueueStats) {
    println!(
        "{} .. {}",
        stats.from.format("%Y-%m-%d %H:%M"),
        stats.to.format("%Y-%m-%d %H:%M")
    );
    println!("  sent to pharmacy: {}", stats.total_pharmacy_prescriptions);
    println!("  pending:          {}", stats.status_counts.pending);
    println!("  preparing:        {}", stats.status_counts.preparing);
    println!("  picked up:        {}", stats.status_counts.picked_up);
    println!("  in queue now:     {}", stats.current_queue_length);
    println!("  avg wait:         {:.0}s", stats.avg_wait_time_sec);
}

pub fn alerts(alerts: &Alerts) {
    println!("Out of stock ({}):", alerts.out_of_stock.len());
    for e in &alerts.out_of_stock {
        println!("  {} (rx {})", e.medicine_name, e.prescription_id);
    }
    println!("Expired prescriptions ({}):", alerts.expired.len());
    for e in &alerts.expired {
        println!("  {} {}", e.prescription_id, e.status);
    }
    let volume = &alerts.high_volume;
    println!(
        "Last 5 minutes: {} prescriptions{}",
        volume.prescriptions_last_5_min,
        if volume.threshold_exceeded {
            " (HIGH VOLUME)"
        } else {
            ""
        }
    );
}

pub fn analytics(snapshot: &AnalyticsSnapshot) {
    println!("Inventory usage:");
    for a in &snapshot.inventory {
        println!(
            "  {:<24} used {:>5}  left {:>5}{}",
            a.medicine_name,
            a.quantity_used.unwrap_or_default(),
            a.quantity_remaining.unwrap_or_default(),
            a.restock_alert
                .as_deref()
                .map(|r| format!("  {r}"))
                .unwrap_or_default()
        );
    }
    println!("Prescriptions by doctor:");
    for d in &snapshot.by_doctor {
        println!("  {:<24} {}", d.doctor_name, d.total_uploaded);
    }
    println!("Busiest days:");
    for p in &snapshot.peak_days {
        println!("  {:<12} {}", p.day, p.count);
    }
}
