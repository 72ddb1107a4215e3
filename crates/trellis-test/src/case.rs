//! Declarative test cases.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use trellis_core::{AnyObject, Object, ObjectRef, ReconcileResult, Reconciler, Request, SharedClient};

use crate::error::SideEffectError;
use crate::expect::ExpectedError;

/// Boxed future returned by a side-effect assertion.
pub type SideEffectFuture = Pin<Box<dyn Future<Output = Result<(), SideEffectError>> + Send>>;

/// Assertion over the store after the last reconciliation.
pub type SideEffect<R> = Arc<dyn Fn(ExecutionContext, Arc<R>) -> SideEffectFuture + Send + Sync>;

/// What a side-effect assertion gets to look at.
#[derive(Clone)]
pub struct ExecutionContext {
    name: String,
    request: Request,
    target: ObjectRef,
    client: SharedClient,
}

impl ExecutionContext {
    pub(crate) fn new(name: impl Into<String>, target: ObjectRef, client: SharedClient) -> Self {
        Self {
            name: name.into(),
            request: Request::new(target.key.clone()),
            target,
            client,
        }
    }

    /// Name of the running case.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request the reconciler was invoked with.
    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// Address of the reconciled object.
    #[must_use]
    pub const fn target(&self) -> &ObjectRef {
        &self.target
    }

    /// Client connected to the environment.
    #[must_use]
    pub const fn client(&self) -> &SharedClient {
        &self.client
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("name", &self.name)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// One scenario for a reconciler of type `R`.
pub struct TestCase<R> {
    /// Label used for reporting; unique within a run.
    pub name: String,
    /// Object the reconciler is invoked against.
    pub object: Arc<dyn AnyObject>,
    /// Objects created before the target, in order.
    pub state: Vec<Arc<dyn AnyObject>>,
    /// Number of reconcile invocations; 0 behaves like 1.
    pub loops: u32,
    /// Expected result of the last invocation.
    pub want: ReconcileResult,
    /// Expected error of the last invocation; `None` expects success.
    pub want_err: Option<ExpectedError>,
    /// Assertion over the store after the last invocation.
    pub want_side_effects: Option<SideEffect<R>>,
}

impl<R: Reconciler> TestCase<R> {
    /// Creates a case reconciling `object` once and expecting a done result.
    #[must_use]
    pub fn new(name: impl Into<String>, object: impl Object) -> Self {
        Self {
            name: name.into(),
            object: Arc::new(object),
            state: Vec::new(),
            loops: 1,
            want: ReconcileResult::default(),
            want_err: None,
            want_side_effects: None,
        }
    }

    /// Adds an object to create before the target.
    #[must_use]
    pub fn with_state(mut self, object: impl Object) -> Self {
        self.state.push(Arc::new(object));
        self
    }

    /// Sets the number of reconcile invocations.
    #[must_use]
    pub const fn with_loops(mut self, loops: u32) -> Self {
        self.loops = loops;
        self
    }

    /// Sets the expected result.
    #[must_use]
    pub const fn with_want(mut self, want: ReconcileResult) -> Self {
        self.want = want;
        self
    }

    /// Sets the expected error.
    #[must_use]
    pub fn with_want_err(mut self, want_err: ExpectedError) -> Self {
        self.want_err = Some(want_err);
        self
    }

    /// Sets the side-effect assertion.
    #[must_use]
    pub fn with_side_effects<F, Fut>(mut self, assertion: F) -> Self
    where
        F: Fn(ExecutionContext, Arc<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SideEffectError>> + Send + 'static,
    {
        let side_effect: SideEffect<R> =
            Arc::new(move |ctx: ExecutionContext, reconciler: Arc<R>| -> SideEffectFuture {
                Box::pin(assertion(ctx, reconciler))
            });
        self.want_side_effects = Some(side_effect);
        self
    }

    /// Number of reconcile invocations actually performed.
    #[must_use]
    pub fn effective_loops(&self) -> u32 {
        self.loops.max(1)
    }
}

impl<R> Clone for TestCase<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            object: Arc::clone(&self.object),
            state: self.state.clone(),
            loops: self.loops,
            want: self.want,
            want_err: self.want_err.clone(),
            want_side_effects: self.want_side_effects.clone(),
        }
    }
}

impl<R> fmt::Debug for TestCase<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("object", &self.object.object_ref())
            .field("state", &self.state.iter().map(|o| o.object_ref()).collect::<Vec<_>>())
            .field("loops", &self.loops)
            .field("want", &self.want)
            .field("want_err", &self.want_err)
            .field("want_side_effects", &self.want_side_effects.is_some())
            .finish()
    }
}
