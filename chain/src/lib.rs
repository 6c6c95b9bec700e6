// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    missing_docs,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]

//! # Request / close chains
//!
//! This crate provides the building blocks to establish connections through an ordered list
//! of stages. A connection request enters the first stage of a [`Chain`]; each stage may
//! inspect or augment the request, do some work, abort, and decides when to hand over to the
//! rest of the chain through the [`Next`] it is given. The reply flows back through the same
//! stages in reverse order. Closing a connection follows the same path.
//!
//! ## Stages
//!
//! A stage is anything that implements the [`NetworkService`] trait. The [`stages`] module
//! provides some generic ones. A [`Chain`] is itself a [`NetworkService`], so chains nest: the
//! stages after a nested chain run once the nested chain is exhausted.
//!
//! ```rust
//! use nat_endpoint_chain::stages::{Authorize, Labels};
//! use nat_endpoint_chain::{Chain, ChainError};
//! use std::collections::BTreeMap;
//!
//! fn build() -> Result<Chain, ChainError> {
//!     let labels = BTreeMap::from([("app".to_owned(), "nat".to_owned())]);
//!     Chain::new("server")
//!         .add_stage("authorize", Authorize::allow_all())?
//!         .add_stage("labels", Labels::new(labels))
//! }
//! assert_eq!(build().unwrap().stage_names(), vec!["authorize", "labels"]);
//! ```
//!
//! ## Contexts
//!
//! Every call carries a [`Context`]: a bag of values (peer identity, per-connection metadata)
//! plus an optional deadline and a cancellation token. Stages bound their blocking steps with
//! [`Context::run`]. A stage that must undo work after a failure captures a
//! [`PostponedContext`] before doing anything: it keeps the values but not the cancellation,
//! so that cleanup is not aborted by whatever aborted the request.
//!
//! ## Metadata
//!
//! The [`metadata::MetadataStage`] attaches a [`metadata::ConnectionMetadata`] scope to the
//! context, so that a stage can publish a value for later stages of the same connection.

mod chain;
mod connection;
mod context;
mod errors;
/// Per-connection metadata
pub mod metadata;
mod service;
/// Generic stages
pub mod stages;

#[cfg(any(test, feature = "testing"))]
#[allow(missing_docs, clippy::must_use_candidate)]
pub mod testing;

pub use chain::Chain;
pub use connection::{Connection, ConnectionId, Mechanism, NetworkServiceRequest};
pub use context::{Context, PostponedContext};
pub use errors::ChainError;
pub use service::{NetworkService, Next, close_on_failure};
