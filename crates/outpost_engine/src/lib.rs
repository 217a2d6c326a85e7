//! # Outpost Engine
//!
//! Offline-first synchronization between a [`LocalStore`] and a remote
//! backend.
//!
//! This crate provides:
//! - The sync orchestrator ([`SyncEngine`]) with a single-flight guard
//! - The remote gateway abstraction, an HTTP adapter and a scripted mock
//! - Connectivity monitoring (host-driven or probe-driven)
//! - Manual, reconnect and periodic triggers
//!
//! ## Architecture
//!
//! A cycle pulls every configured reference dataset, replaces the local
//! copies in one transaction, then submits the whole action queue in a
//! single batch and removes exactly the actions the remote confirmed.
//!
//! ## Key Invariants
//!
//! - At most one cycle in flight per engine
//! - An offline attempt touches neither the store nor the remote
//! - A failed pull changes nothing locally
//! - A queued action leaves the queue only when the remote confirms its ID
//! - The remote deduplicates resubmitted action IDs (see [`gateway`])
//!
//! ## Example
//!
//! ```rust
//! use outpost_engine::{ManualConnectivity, MockGateway, SyncConfig, SyncEngine, Trigger};
//! use outpost_store::{DatasetName, LocalStore, Record};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let products = DatasetName::new("products").unwrap();
//! let gateway = MockGateway::shared();
//! gateway.set_dataset(products.clone(), vec![Record::new(1u64, json!({"name": "Widget"}))]);
//!
//! let store = Arc::new(LocalStore::open_in_memory().unwrap());
//! let engine = SyncEngine::new(
//!     SyncConfig::new([products.clone()]),
//!     store.clone(),
//!     gateway,
//!     ManualConnectivity::shared(true),
//! );
//!
//! engine.enqueue("sale", json!({"product": 1, "qty": 2})).unwrap();
//! let outcome = engine.trigger_sync(Trigger::Manual).await;
//!
//! assert!(outcome.is_succeeded());
//! assert_eq!(store.read_all(&products).len(), 1);
//! assert_eq!(store.queue_len(), 0);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod state;

pub mod connectivity;
pub mod gateway;
pub mod http;
pub mod trigger;

pub use config::{RetryConfig, SyncConfig};
pub use connectivity::{
    ConnectivityHandler, ConnectivityMonitor, ManualConnectivity, ProbeConnectivity,
    ReachabilityProbe, SubscriptionId, TcpProbe,
};
pub use engine::SyncEngine;
pub use error::{GatewayError, GatewayResult, SyncError, SyncPhase, SyncResult};
pub use gateway::{MockGateway, RemoteGateway, SubmitOutcome};
pub use http::{HttpClient, HttpGateway, HttpResponse};
pub use state::{ActionFailure, SyncOutcome, SyncState, SyncStats, SyncStatus, SyncSummary};
pub use trigger::{AutoSync, AutoSyncHandle, Trigger};

#[cfg(feature = "reqwest-client")]
pub use http::ReqwestClient;

pub use outpost_store::LocalStore;
