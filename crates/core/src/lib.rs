//! Mediplus Core - Shared types library.
//!
//! This crate provides the types used across all Mediplus client components:
//! - `client` - API gateway, session context, role router and workflow desks
//! - `cli` - Command-line front end
//! - `integration-tests` - Fake backend and end-to-end tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no HTTP
//! clients, no clocks. Anything time-dependent takes `now` as an argument.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, roles, statuses, OTPs and API payloads
//! - [`lifecycle`] - Prescription fulfillment state machine and the upload
//!   low-stock branch
//! - [`countdown`] - Deadline-anchored estimated-wait countdown

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod countdown;
pub mod lifecycle;
pub mod types;

pub use countdown::Countdown;
pub use lifecycle::{FulfillmentEvent, TransitionError, UploadDecision, UploadStage};
pub use types::*;
