//! Case and suite reports.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use trellis_core::ReconcileResult;

use crate::error::{HarnessError, HarnessResult};

/// Stage of one case.
///
/// `Pending → SeedingState → CreatingTarget → Reconciling(i) → Asserting →
/// CleaningUp → Done`. `Failed` is reachable from every stage and still goes
/// through cleanup.
///
/// [`CaseReport::phase`] keeps the furthest stage reached before cleanup, so
/// a failed case shows where it stopped. `CleaningUp` is only logged; the
/// terminal stage is in [`CaseReport::outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CasePhase {
    /// Not started.
    Pending,
    /// Creating prior state.
    SeedingState,
    /// Creating the target object.
    CreatingTarget,
    /// Running the given (1-based) reconcile invocation.
    Reconciling(u32),
    /// Checking error, result and side effects.
    Asserting,
    /// Deleting created objects.
    CleaningUp,
    /// Finished without failures.
    Done,
    /// Finished with at least one failure.
    Failed,
}

impl CasePhase {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for CasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::SeedingState => f.write_str("seeding state"),
            Self::CreatingTarget => f.write_str("creating target"),
            Self::Reconciling(i) => write!(f, "reconciling (iteration {i})"),
            Self::Asserting => f.write_str("asserting"),
            Self::CleaningUp => f.write_str("cleaning up"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Why a case failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Failure {
    /// Prior state or the target could not be created.
    Setup {
        /// Stage that failed.
        phase: CasePhase,
        /// What went wrong.
        message: String,
    },
    /// The last invocation's error did not match the expectation.
    ErrorMismatch {
        /// Error returned, with its source chain.
        got: Option<String>,
        /// Expected error kind.
        want: Option<String>,
    },
    /// The last invocation's result differs from the expectation.
    ResultMismatch {
        /// Result returned.
        got: ReconcileResult,
        /// Result expected.
        want: ReconcileResult,
        /// Field-by-field difference.
        diff: String,
    },
    /// The side-effect assertion returned an error.
    SideEffect(String),
    /// The reconciler or the side-effect assertion panicked.
    Panicked {
        /// Stage during which the panic happened.
        phase: CasePhase,
        /// Panic payload, when it was a string.
        message: String,
    },
}

fn or_nil(value: Option<&String>) -> &str {
    value.map_or("<nil>", String::as_str)
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup { phase, message } => write!(f, "{phase}: {message}"),
            Self::ErrorMismatch { got, want } => {
                write!(f, "gotErr: {}\nwant: {}", or_nil(got.as_ref()), or_nil(want.as_ref()))
            }
            Self::ResultMismatch { got, want, diff } => {
                write!(f, "got: {got:?}\nwant: {want:?}\ndiff: {diff}")
            }
            Self::SideEffect(message) => write!(f, "failed sideeffect: {message}"),
            Self::Panicked { phase, message } => write!(f, "panicked while {phase}: {message}"),
        }
    }
}

/// Outcome of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    /// Case name, after disambiguation.
    pub name: String,
    /// Furthest stage reached before cleanup; never `CleaningUp`.
    pub phase: CasePhase,
    /// `Done` or `Failed`.
    pub outcome: CasePhase,
    /// Every failure recorded, in order.
    pub failures: Vec<Failure>,
    /// Reconcile invocations that completed.
    pub iterations: u32,
    /// Wall time including cleanup.
    pub duration: Duration,
}

impl CaseReport {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: CasePhase::Pending,
            outcome: CasePhase::Pending,
            failures: Vec::new(),
            iterations: 0,
            duration: Duration::ZERO,
        }
    }

    pub(crate) fn enter(&mut self, phase: CasePhase) {
        tracing::debug!(from = %self.phase, to = %phase, "phase");
        self.phase = phase;
    }

    pub(crate) fn fail(&mut self, failure: Failure) {
        tracing::warn!(phase = %self.phase, failure = %failure, "case failed");
        self.failures.push(failure);
    }

    pub(crate) fn finish(&mut self, duration: Duration) {
        self.duration = duration;
        self.outcome = if self.failures.is_empty() {
            CasePhase::Done
        } else {
            CasePhase::Failed
        };
    }

    /// Returns true if the case recorded no failure.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed() { "PASS" } else { "FAIL" };
        write!(f, "--- {status}: {} ({})", self.name, humantime::format_duration(self.duration))?;
        for failure in &self.failures {
            for line in failure.to_string().lines() {
                write!(f, "\n    {line}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    /// One report per case, in run order.
    pub cases: Vec<CaseReport>,
    /// Wall time including environment start and stop.
    pub duration: Duration,
}

impl SuiteReport {
    pub(crate) const fn new(cases: Vec<CaseReport>, duration: Duration) -> Self {
        Self { cases, duration }
    }

    /// Returns true if every case passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }

    /// Iterates over the failed cases.
    pub fn failed_cases(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|case| !case.passed())
    }

    /// Looks up a case by name.
    #[must_use]
    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|case| case.name == name)
    }

    /// Converts failed cases into an error, for use as the last line of a
    /// test function.
    ///
    /// # Errors
    /// Returns [`HarnessError::CasesFailed`] naming every failed case.
    pub fn into_result(self) -> HarnessResult<Self> {
        let failed: Vec<String> = self.failed_cases().map(|case| case.name.clone()).collect();
        if failed.is_empty() {
            Ok(self)
        } else {
            tracing::error!(report = %self, "cases failed");
            Err(HarnessError::CasesFailed { failed })
        }
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for case in &self.cases {
            writeln!(f, "{case}")?;
        }
        let failed = self.failed_cases().count();
        write!(
            f,
            "{}: {} passed, {} failed ({})",
            if failed == 0 { "ok" } else { "FAILED" },
            self.cases.len() - failed,
            failed,
            humantime::format_duration(self.duration)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing(name: &str) -> CaseReport {
        let mut report = CaseReport::new(name);
        report.enter(CasePhase::Asserting);
        report.iterations = 1;
        report.finish(Duration::from_millis(3));
        report
    }

    fn failing(name: &str) -> CaseReport {
        let mut report = CaseReport::new(name);
        report.enter(CasePhase::Asserting);
        report.fail(Failure::SideEffect("want \"bar\", got \"\"".into()));
        report.finish(Duration::from_millis(5));
        report
    }

    #[test]
    fn test_terminal_phases() {
        assert!(CasePhase::Done.is_terminal());
        assert!(CasePhase::Failed.is_terminal());
        assert!(!CasePhase::Reconciling(2).is_terminal());
        assert_eq!(CasePhase::Reconciling(2).to_string(), "reconciling (iteration 2)");
    }

    #[test]
    fn test_finish_sets_outcome() {
        assert_eq!(passing("a").outcome, CasePhase::Done);
        let failed = failing("b");
        assert_eq!(failed.outcome, CasePhase::Failed);
        assert_eq!(failed.phase, CasePhase::Asserting);
    }

    #[test]
    fn test_error_mismatch_display() {
        let failure = Failure::ErrorMismatch {
            got: None,
            want: Some("FailSpecError".into()),
        };
        assert_eq!(failure.to_string(), "gotErr: <nil>\nwant: FailSpecError");
    }

    #[test]
    fn test_suite_into_result() {
        let report = SuiteReport::new(vec![passing("a"), failing("b")], Duration::from_millis(10));
        assert!(!report.passed());
        assert_eq!(report.failed_cases().count(), 1);
        assert!(report.case("a").is_some_and(CaseReport::passed));

        let err = report.into_result().unwrap_err();
        assert!(matches!(&err, HarnessError::CasesFailed { failed } if failed == &vec!["b".to_string()]));

        let ok = SuiteReport::new(vec![passing("a")], Duration::ZERO);
        assert!(ok.into_result().is_ok());
    }

    #[test]
    fn test_suite_display() {
        let report = SuiteReport::new(vec![passing("a"), failing("b")], Duration::from_millis(10));
        let text = report.to_string();
        assert!(text.contains("--- PASS: a (3ms)"));
        assert!(text.contains("--- FAIL: b (5ms)"));
        assert!(text.contains("    failed sideeffect: want \"bar\""));
        assert!(text.ends_with("FAILED: 1 passed, 1 failed (10ms)"));
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(failing("b")).unwrap();
        assert_eq!(json["name"], "b");
        assert_eq!(json["outcome"], "Failed");
    }
}
