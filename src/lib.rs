//! Trellis: Reconciliation Test Harness
//!
//! Runs table-driven cases against a reconciler using one shared, ephemeral
//! control plane per run. Every case seeds its prior state, reconciles a
//! target object one or more times, checks the error, the result and the
//! store, and releases whatever it created.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trellis::prelude::*;
//!
//! // Re-exports from sub-crates for convenience
//! ```

pub use trellis_apiserver as apiserver;
pub use trellis_core as core;
pub use trellis_test as test;

/// Prelude module for common imports.
pub mod prelude {
    pub use trellis_apiserver::{Environment, EnvironmentConfig, LocalEnvironment};
    pub use trellis_core::{
        Client, ClientExt, ConfigMap, Namespace, Object, ObjectMeta, ReconcileResult, Reconciler, Request,
        Scheme, SharedClient, StoreError,
    };
    pub use trellis_test::{
        EnvTest, ExecutionContext, ExpectedError, Fixture, SideEffectError, SuiteReport, TestCase,
        init_tracing, run_env_test,
    };
}
