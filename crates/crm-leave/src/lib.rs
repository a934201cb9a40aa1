//! Leave-request workflow for the corporate CRM back-end.
//!
//! The [`workflows::leave`] module holds the approval pipeline together with the balance ledger
//! and calendar projection it keeps consistent. [`access`] supplies the role catalog and the
//! identity/directory seams the workflow consumes.

pub mod access;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
