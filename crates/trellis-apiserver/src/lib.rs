// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # trellis-apiserver
//!
//! Ephemeral, in-process control plane for reconciler tests.
//!
//! The control plane is a single tokio task owning an object store with API
//! server semantics: server-assigned identity fields, optimistic concurrency
//! through resource versions, a status subresource, namespace cascade on
//! delete, and watch streams. Extra kinds are served from resource
//! definition files found in [`EnvironmentConfig::crd_directory_paths`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_apiserver::{Environment, EnvironmentConfig, LocalEnvironment, StoreClient};
//!
//! let mut env = LocalEnvironment::new(
//!     EnvironmentConfig::new().with_crd_path("config/crd/bases"),
//! );
//! let config = env.start().await?;
//! let client = StoreClient::new(&config, Arc::new(scheme))?;
//! // ...
//! env.stop().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod definition;
pub mod environment;
pub mod error;
pub mod server;
pub mod store;
pub mod watch;

pub use client::{ClientConfig, StoreClient};
pub use config::EnvironmentConfig;
pub use definition::{CustomResourceDefinition, load_definitions};
pub use environment::{Environment, LocalEnvironment};
pub use error::{EnvError, EnvResult};
pub use server::ServerHandle;
pub use store::ObjectStore;
pub use watch::{WatchEvent, WatchStream};
