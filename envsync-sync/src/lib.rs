//! # envsync-sync
//!
//! Mirror, checkout and reconciliation engine.
//!
//! Call [`pipeline::run`] with an [`Operation`] to validate and execute one
//! repository operation under the host-wide lock, or drive a
//! [`Synchronizer`] directly.

pub mod auth;
pub mod branches;
pub mod checkout;
pub mod error;
pub mod lock;
pub mod mirror;
pub mod pipeline;
pub mod reconcile;
pub mod runner;
pub mod writer;

pub use checkout::{CheckoutOutcome, CheckoutReport};
pub use error::SyncError;
pub use mirror::{Mirror, MirrorAction};
pub use pipeline::{Operation, OperationReport};
pub use reconcile::{CleanupFailure, CleanupReport, Synchronizer, UpdateAllReport, UpdateReport};
pub use writer::WriteResult;
