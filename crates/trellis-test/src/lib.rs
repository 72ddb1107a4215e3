// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # trellis-test
//!
//! Table-driven test harness for reconcilers.
//!
//! This crate provides:
//! - **Env test runner**: one shared control plane per run, cases executed
//!   against it with guaranteed cleanup ([`EnvTest`], [`run_env_test`])
//! - **Test cases**: declarative scenarios with prior state, loop count and
//!   three independent expectations ([`TestCase`])
//! - **Fixtures**: base value plus ordered mutations ([`Fixture`])
//! - **Error expectations**: classification through the source chain
//!   ([`ExpectedError`])
//! - **Reports**: per-case phases, failures and timings ([`SuiteReport`])
//!
//! ## Iron Lotus Framework
//!
//! - **Built-in Quality** (品質の作り込み): every created object is released
//! - **Jidoka** (自働化): a leaked object stops the run
//!
//! ## Example
//!
//! ```rust,ignore
//! use trellis_test::{ExpectedError, TestCase, run_env_test};
//!
//! let cases = vec![
//!     TestCase::new("valid", fixture_guestbook())
//!         .with_side_effects(assert_status_done),
//!     TestCase::new("spec'd to fail", fixture_guestbook_with_foo("fail"))
//!         .with_want_err(ExpectedError::of::<FailSpecError>()),
//! ];
//!
//! run_env_test(add_to_scheme, LocalEnvironment::new(config), GuestbookReconciler::new, cases)
//!     .await?
//!     .into_result()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod case;
pub mod cleanup;
pub mod error;
pub mod expect;
pub mod fixture;
pub mod harness;
pub mod logging;
pub mod report;

pub use case::{ExecutionContext, SideEffect, SideEffectFuture, TestCase};
pub use cleanup::CleanupStack;
pub use error::{HarnessError, HarnessResult, SideEffectError};
pub use expect::{ExpectedError, describe_error, error_matches};
pub use fixture::{Fixture, Mutation, apply, in_namespace, named, with_label};
pub use harness::{EnvTest, run_env_test};
pub use logging::init_tracing;
pub use report::{CasePhase, CaseReport, Failure, SuiteReport};
