//! Mediplus client library.
//!
//! Typed access to the Mediplus prescription-management REST API and the
//! client-side pieces that sit on top of it:
//!
//! - [`api`] - `ApiClient` with per-resource accessors and error mapping
//! - [`session`] - `SessionContext`: login, signup, logout, restore, persisted
//!   to a [`SessionStore`](session::SessionStore)
//! - [`router`] - role → landing view and the protected-route guard
//! - [`desk`] - doctor, patient, pharmacist and admin workflows
//! - [`poller`] - cancellable queue subscription
//! - [`ticker`] - per-second countdown stream for the estimated wait
//! - [`config`] - environment-driven settings
//!
//! The backend is authoritative for every business rule. The client checks
//! required fields and refuses lifecycle steps it already knows are invalid.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod desk;
pub mod poller;
pub mod router;
pub mod session;
pub mod ticker;

pub use api::{ApiClient, ApiError};
pub use config::{ClientConfig, ConfigError, LogFormat};
pub use desk::DeskError;
pub use router::{Route, RouteDecision};
pub use session::{Session, SessionContext, SessionError};
