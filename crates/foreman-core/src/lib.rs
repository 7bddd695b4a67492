//! Foreman Core - Shared definitions for the delegation runtime.
//!
//! This crate provides the value types that flow between the runtime and its
//! external collaborators:
//! - [`WorkerSpec`] - the parsed worker definition a loader produces
//! - [`ToolsetRef`] / [`ToolsetScope`] - named capability references and
//!   their instance lifetimes
//! - [`RunId`] - identity of a single top-level run
//!
//! Definition-file parsing lives outside this workspace; a loader hands the
//! runtime fully-formed [`WorkerSpec`] values and nothing else.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod types;
mod worker;

pub use types::{RunId, ToolsetRef, ToolsetScope, Verbosity};
pub use worker::{SpecError, WorkerApprovalConfig, WorkerSpec};
