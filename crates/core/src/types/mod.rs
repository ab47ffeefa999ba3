//! Core types for Mediplus.
//!
//! This module provides type-safe wrappers for common domain concepts and
//! the payload shapes the backend returns.

pub mod analytics;
pub mod email;
pub mod id;
pub mod inventory;
pub mod otp;
pub mod pharmacy;
pub mod prescription;
pub mod role;
pub mod status;
pub mod user;
mod wire;

pub use analytics::*;
pub use email::{Email, EmailError};
pub use id::*;
pub use inventory::{InventoryItem, LowStockItem, LowStockReport, NewInventoryItem};
pub use otp::{Otp, OtpError};
pub use pharmacy::{Medicine, PharmacyOrder, PickupTicket, QueueEntry};
pub use prescription::Prescription;
pub use role::{Role, RoleParseError};
pub use status::{FulfillmentStatus, StatusParseError};
pub use user::User;
