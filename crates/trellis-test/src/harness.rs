//! Env test runner.
//!
//! # Toyota Way: Built-in Quality (品質の作り込み)
//! One shared environment per run, one reconciler per run, and for every
//! case: seed, create, reconcile, assert, clean up. Cleanup runs whatever
//! the case did, panics included.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;
use trellis_apiserver::{ClientConfig, Environment, StoreClient};
use trellis_core::{AnyObject, ObjectRef, ReconcileResult, Reconciler, Scheme, SchemeError, SharedClient, StoreResult};

use crate::case::{ExecutionContext, SideEffect, TestCase};
use crate::cleanup::CleanupStack;
use crate::error::{HarnessError, HarnessResult};
use crate::expect::{ExpectedError, describe_error, error_matches};
use crate::report::{CasePhase, CaseReport, Failure, SuiteReport};

/// Runs test cases against one shared environment.
///
/// # Example
///
/// ```rust,ignore
/// let report = EnvTest::new(LocalEnvironment::new(config))
///     .run(guestbook::add_to_scheme, GuestbookReconciler::new, cases)
///     .await?;
/// report.into_result()?;
/// ```
#[derive(Debug)]
pub struct EnvTest<E> {
    environment: E,
    scheme: Scheme,
    concurrency: usize,
}

impl<E: Environment> EnvTest<E> {
    /// Creates a runner that executes cases one after another.
    #[must_use]
    pub fn new(environment: E) -> Self {
        Self {
            environment,
            scheme: Scheme::new(),
            concurrency: 1,
        }
    }

    /// Starts from an already populated scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Runs up to `concurrency` cases at once. Cases run in parallel must
    /// use disjoint objects and namespaces. 0 is treated as 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Registers kinds, starts the environment, runs every case and stops
    /// the environment.
    ///
    /// Case failures are recorded in the returned report; call
    /// [`SuiteReport::into_result`] to turn them into an error.
    ///
    /// # Errors
    /// Returns an error if registration, environment start, client
    /// construction, cleanup of any case, or environment stop fails.
    pub async fn run<R, S, F>(
        mut self,
        add_to_scheme: S,
        new_reconciler: F,
        cases: Vec<TestCase<R>>,
    ) -> HarnessResult<SuiteReport>
    where
        R: Reconciler,
        S: FnOnce(&mut Scheme) -> Result<(), SchemeError>,
        F: FnOnce(SharedClient) -> R,
    {
        let started = Instant::now();
        add_to_scheme(&mut self.scheme).map_err(HarnessError::SchemeRegistration)?;
        let scheme = Arc::new(self.scheme);

        let config = self
            .environment
            .start()
            .await
            .map_err(HarnessError::EnvironmentStart)?;
        tracing::info!(endpoint = %config.endpoint(), cases = cases.len(), "environment started");

        let outcome = run_cases(&config, scheme, new_reconciler, cases, self.concurrency).await;
        let stopped = self.environment.stop().await;

        match (outcome, stopped) {
            (Ok(reports), Ok(())) => {
                let report = SuiteReport::new(reports, started.elapsed());
                tracing::info!(
                    passed = report.passed(),
                    failed = report.failed_cases().count(),
                    "run finished"
                );
                Ok(report)
            }
            (Ok(_), Err(err)) => Err(HarnessError::EnvironmentStop(err)),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(stop_err)) => {
                tracing::error!(error = %stop_err, "stop environment");
                Err(err)
            }
        }
    }
}

/// Runs `cases` against `environment` sequentially.
///
/// # Errors
/// See [`EnvTest::run`].
pub async fn run_env_test<E, R, S, F>(
    add_to_scheme: S,
    environment: E,
    new_reconciler: F,
    cases: Vec<TestCase<R>>,
) -> HarnessResult<SuiteReport>
where
    E: Environment,
    R: Reconciler,
    S: FnOnce(&mut Scheme) -> Result<(), SchemeError>,
    F: FnOnce(SharedClient) -> R,
{
    EnvTest::new(environment)
        .run(add_to_scheme, new_reconciler, cases)
        .await
}

async fn run_cases<R, F>(
    config: &ClientConfig,
    scheme: Arc<Scheme>,
    new_reconciler: F,
    cases: Vec<TestCase<R>>,
    concurrency: usize,
) -> HarnessResult<Vec<CaseReport>>
where
    R: Reconciler,
    F: FnOnce(SharedClient) -> R,
{
    let client: SharedClient =
        Arc::new(StoreClient::new(config, scheme).map_err(HarnessError::ClientConstruction)?);
    let reconciler = Arc::new(new_reconciler(Arc::clone(&client)));
    let cases = disambiguate(cases);

    if concurrency <= 1 {
        let mut reports = Vec::with_capacity(cases.len());
        for case in cases {
            reports.push(run_case(Arc::clone(&client), Arc::clone(&reconciler), case).await?);
        }
        return Ok(reports);
    }

    let total = cases.len();
    let mut pending = cases.into_iter().enumerate();
    let mut running = JoinSet::new();
    let mut reports: Vec<Option<CaseReport>> = (0..total).map(|_| None).collect();
    let mut fatal: Option<HarnessError> = None;

    loop {
        while fatal.is_none() && running.len() < concurrency {
            let Some((index, case)) = pending.next() else {
                break;
            };
            let client = Arc::clone(&client);
            let reconciler = Arc::clone(&reconciler);
            running.spawn(async move { (index, run_case(client, reconciler, case).await) });
        }
        let Some(joined) = running.join_next().await else {
            break;
        };
        let err = match joined {
            Ok((index, Ok(report))) => {
                reports[index] = Some(report);
                continue;
            }
            Ok((_, Err(err))) => err,
            Err(join_error) => HarnessError::Internal(join_error.to_string()),
        };
        if fatal.is_none() {
            tracing::error!(error = %err, "stopping dispatch of remaining cases");
            fatal = Some(err);
        } else {
            tracing::error!(error = %err, "additional fatal error");
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(reports.into_iter().flatten().collect()),
    }
}

/// Suffixes repeated names with `#01`, `#02`, ... so every report is
/// addressable. A suffix already used by another case is skipped.
fn disambiguate<R>(mut cases: Vec<TestCase<R>>) -> Vec<TestCase<R>> {
    let reserved: HashSet<String> = cases.iter().map(|case| case.name.clone()).collect();
    let mut assigned: HashSet<String> = HashSet::with_capacity(cases.len());
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    for case in &mut cases {
        if assigned.insert(case.name.clone()) {
            continue;
        }
        let suffix = next_suffix.entry(case.name.clone()).or_insert(1);
        let renamed = loop {
            let candidate = format!("{}#{:02}", case.name, *suffix);
            *suffix += 1;
            if !reserved.contains(&candidate) && !assigned.contains(&candidate) {
                break candidate;
            }
        };
        tracing::warn!(name = %case.name, renamed = %renamed, "duplicate case name");
        assigned.insert(renamed.clone());
        case.name = renamed;
    }
    cases
}

async fn run_case<R: Reconciler>(
    client: SharedClient,
    reconciler: Arc<R>,
    case: TestCase<R>,
) -> HarnessResult<CaseReport> {
    let span = tracing::info_span!("case", name = %case.name);
    execute_case(client, reconciler, case).instrument(span).await
}

async fn execute_case<R: Reconciler>(
    client: SharedClient,
    reconciler: Arc<R>,
    case: TestCase<R>,
) -> HarnessResult<CaseReport> {
    let started = Instant::now();
    let loops = case.effective_loops();
    let TestCase {
        name,
        object,
        state,
        want,
        want_err,
        want_side_effects,
        ..
    } = case;
    let mut report = CaseReport::new(name.clone());
    let mut cleanup = CleanupStack::new();

    let ready = seed(&client, &state, &object, &mut cleanup, &mut report).await;
    if ready {
        let ctx = ExecutionContext::new(name.clone(), object.object_ref(), Arc::clone(&client));
        let expectations = Expectations {
            loops,
            want,
            want_err,
            side_effect: want_side_effects,
        };
        let (phase_tx, phase_rx) = watch::channel(CasePhase::Reconciling(1));
        let task = tokio::spawn(
            reconcile_and_assert(ctx, reconciler, expectations, phase_tx).in_current_span(),
        );
        match task.await {
            Ok(execution) => {
                report.iterations = execution.iterations;
                report.enter(CasePhase::Asserting);
                for failure in execution.failures {
                    report.fail(failure);
                }
            }
            Err(join_error) => {
                let phase = *phase_rx.borrow();
                report.iterations = match phase {
                    CasePhase::Reconciling(i) => i - 1,
                    _ => loops,
                };
                report.enter(phase);
                report.fail(Failure::Panicked {
                    phase,
                    message: panic_message(join_error),
                });
            }
        }
    }

    tracing::debug!(phase = %CasePhase::CleaningUp, objects = cleanup.len(), "phase");
    let failures = cleanup.drain(client.as_ref()).await;
    report.finish(started.elapsed());
    tracing::info!(passed = report.passed(), duration = ?report.duration, "case finished");

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(HarnessError::Cleanup { case: name, failures })
    }
}

/// Creates prior state then the target, recording each success for
/// cleanup. Returns false once anything fails; nothing after it is created.
async fn seed(
    client: &SharedClient,
    state: &[Arc<dyn AnyObject>],
    target: &Arc<dyn AnyObject>,
    cleanup: &mut CleanupStack,
    report: &mut CaseReport,
) -> bool {
    report.enter(CasePhase::SeedingState);
    for (index, obj) in state.iter().enumerate() {
        match create(client, obj.as_ref()).await {
            Ok(created) => cleanup.push(created),
            Err(err) => {
                report.fail(Failure::Setup {
                    phase: CasePhase::SeedingState,
                    message: format!("create state[{index}] {}: {err}", obj.object_ref()),
                });
                return false;
            }
        }
    }

    report.enter(CasePhase::CreatingTarget);
    match create(client, target.as_ref()).await {
        Ok(created) => {
            cleanup.push(created);
            true
        }
        Err(err) => {
            report.fail(Failure::Setup {
                phase: CasePhase::CreatingTarget,
                message: format!("create obj {}: {err}", target.object_ref()),
            });
            false
        }
    }
}

async fn create(client: &SharedClient, obj: &dyn AnyObject) -> StoreResult<ObjectRef> {
    let mut dynamic = obj.to_dynamic()?;
    dynamic.metadata.clear_server_fields();
    let created = client.create(dynamic).await?;
    tracing::debug!(object = %created.object_ref(), "created");
    Ok(created.object_ref())
}

struct Expectations<R> {
    loops: u32,
    want: ReconcileResult,
    want_err: Option<ExpectedError>,
    side_effect: Option<SideEffect<R>>,
}

struct Execution {
    iterations: u32,
    failures: Vec<Failure>,
}

/// Invokes the reconciler `loops` times, then checks the last outcome:
/// error first (a mismatch ends the checks), then result, then side effects.
async fn reconcile_and_assert<R: Reconciler>(
    ctx: ExecutionContext,
    reconciler: Arc<R>,
    expectations: Expectations<R>,
    phase: watch::Sender<CasePhase>,
) -> Execution {
    let mut failures = Vec::new();
    let mut outcome = Ok(ReconcileResult::default());
    for iteration in 1..=expectations.loops {
        if let Err(err) = &outcome {
            tracing::debug!(iteration = iteration - 1, error = %err, "discarding intermediate error");
        }
        phase.send_replace(CasePhase::Reconciling(iteration));
        tracing::debug!(iteration, request = %ctx.request(), "reconcile");
        outcome = reconciler.reconcile(ctx.request()).await;
    }
    let iterations = expectations.loops;
    phase.send_replace(CasePhase::Asserting);

    let got = outcome.as_ref().map_or_else(|_| ReconcileResult::default(), |result| *result);
    {
        let got_err = outcome.as_ref().err().map(|err| err as &(dyn Error + 'static));
        if !error_matches(got_err, expectations.want_err.as_ref()) {
            failures.push(Failure::ErrorMismatch {
                got: got_err.map(describe_error),
                want: expectations.want_err.as_ref().map(ToString::to_string),
            });
            return Execution { iterations, failures };
        }
    }

    if let Some(diff) = got.diff(&expectations.want) {
        failures.push(Failure::ResultMismatch {
            got,
            want: expectations.want,
            diff,
        });
    }

    if let Some(side_effect) = expectations.side_effect {
        if let Err(err) = side_effect(ctx, reconciler).await {
            failures.push(Failure::SideEffect(err.to_string()));
        }
    }

    Execution { iterations, failures }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
