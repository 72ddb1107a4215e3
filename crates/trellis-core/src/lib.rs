// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # trellis-core
//!
//! Core contracts for the trellis reconciliation test harness.
//!
//! This crate provides the foundational types shared by the control plane,
//! the reconcilers under test, and the harness driving them:
//!
//! - [`Object`] / [`DynamicObject`] for typed and type-erased resources
//! - [`ObjectKey`] / [`ObjectRef`] for stable object identity
//! - [`Scheme`] for explicit kind registration
//! - [`Client`] / [`ClientExt`] for store access
//! - [`Reconciler`] for the control loop under test
//!
//! ## Example
//!
//! ```rust,ignore
//! use trellis_core::{objects, ClientExt, ConfigMap, ObjectKey, Scheme};
//!
//! let mut scheme = Scheme::new();
//! objects::add_to_scheme(&mut scheme)?;
//!
//! let cm: ConfigMap = client.get_as(&ObjectKey::namespaced("default", "settings")).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod meta;
pub mod object;
pub mod objects;
pub mod reconciler;
pub mod scheme;

pub use client::{Client, ClientExt, OperationResult, SharedClient, create_or_update};
pub use error::{SchemeError, StoreError, StoreResult};
pub use meta::{GroupVersionKind, ObjectMeta, Scope};
pub use object::{AnyObject, DynamicObject, Object, ObjectKey, ObjectRef};
pub use objects::{ConfigMap, DEFAULT_NAMESPACE, Namespace, SYSTEM_NAMESPACE, Secret};
pub use reconciler::{ReconcileResult, Reconciler, Request};
pub use scheme::Scheme;
