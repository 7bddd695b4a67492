//! Foreman Toolset - Capability contract and scoped instance provider.
//!
//! A [`Toolset`] is a named bundle of callable capabilities exposed to a
//! worker's agent turn. This crate defines the invocation contract
//! (`list_tools` / `invoke` / `opinion_on` / `cleanup`), the
//! [`InstanceProvider`] that resolves named references into live instances
//! under a declared [`ToolsetScope`](foreman_core::ToolsetScope), and a
//! small in-memory stateful toolset used to exercise the isolation
//! guarantees.
//!
//! Concrete filesystem/shell capabilities live outside this workspace; only
//! their invocation contract matters here.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod kv;
mod opinion;
mod provider;
mod toolset;

pub use error::{ToolsetError, ToolsetResult};
pub use kv::KvToolset;
pub use opinion::OpinionRules;
pub use provider::{InstanceProvider, Registered, ResolvedToolset, ToolsetFactory};
pub use toolset::{ToolDescriptor, ToolOpinion, Toolset};
