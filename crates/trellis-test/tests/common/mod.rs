//! Shared kinds, reconcilers and environments for the integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use trellis_apiserver::{ClientConfig, EnvError, EnvResult, Environment, EnvironmentConfig, LocalEnvironment};
use trellis_core::{
    ClientExt, ConfigMap, GroupVersionKind, Namespace, Object, ObjectMeta, OperationResult, ReconcileResult,
    Reconciler, Request, Scheme, SchemeError, SharedClient, StoreError, create_or_update, objects,
};
use trellis_test::{ExecutionContext, Fixture, SideEffectError};

// ─── Guestbook kind ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestbookSpec {
    #[serde(default)]
    pub foo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestbookStatus {
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guestbook {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GuestbookSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GuestbookStatus>,
}

impl Object for Guestbook {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("webapp.my.domain", "v1", "Guestbook")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

pub fn add_to_scheme(scheme: &mut Scheme) -> Result<(), SchemeError> {
    objects::add_to_scheme(scheme)?;
    scheme.register::<Guestbook>()
}

pub fn fixture_guestbook() -> Fixture<Guestbook> {
    Fixture::new(Guestbook {
        metadata: ObjectMeta::namespaced("default", "my-guestbook"),
        ..Guestbook::default()
    })
}

pub fn fixture_namespace(name: &str) -> Namespace {
    Namespace::new(name)
}

pub fn crd_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/crds")
}

pub fn guestbook_environment() -> LocalEnvironment {
    LocalEnvironment::new(
        EnvironmentConfig::new()
            .with_crd_path(crd_dir())
            .with_error_if_crd_path_missing(true),
    )
}

// ─── Guestbook reconciler ────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("spec.foo must not be \"fail\"")]
pub struct FailSpecError;

#[derive(Debug, thiserror::Error)]
pub enum GuestbookError {
    #[error("get guestbook: {0}")]
    Store(#[from] StoreError),
    #[error("validate spec: {0}")]
    Validate(#[source] FailSpecError),
}

/// Marks every valid guestbook as done.
pub struct GuestbookReconciler {
    pub client: SharedClient,
}

impl GuestbookReconciler {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reconciler for GuestbookReconciler {
    type Error = GuestbookError;

    async fn reconcile(&self, request: &Request) -> Result<ReconcileResult, GuestbookError> {
        let mut guestbook: Guestbook = self.client.get_as(&request.key).await?;
        if guestbook.spec.foo == "fail" {
            return Err(GuestbookError::Validate(FailSpecError));
        }
        guestbook.status = Some(GuestbookStatus { done: true });
        self.client.update_status_typed(&guestbook).await?;
        Ok(ReconcileResult::done())
    }
}

pub async fn assert_status_done(ctx: ExecutionContext, _r: Arc<GuestbookReconciler>) -> Result<(), SideEffectError> {
    let got: Guestbook = ctx.client().get_as(&ctx.request().key).await?;
    if got.status.as_ref().is_some_and(|s| s.done) {
        Ok(())
    } else {
        Err(SideEffectError::mismatch(format!(
            "status should be done, was {:?}",
            got.status
        )))
    }
}

// ─── ConfigMap reconciler ────────────────────────────────────────────────────

/// Label making [`ConfigMapReconciler`] panic.
pub const PANIC_LABEL: &str = "trellis.dev/panic";

/// Label making [`ConfigMapReconciler`] fail its first attempt per object.
pub const FLAKY_LABEL: &str = "trellis.dev/flaky";

/// Label making [`ConfigMapReconciler`] ask to be requeued.
pub const REQUEUE_LABEL: &str = "trellis.dev/requeue";

#[derive(Debug, thiserror::Error)]
pub enum ConfigMapError {
    #[error("reconcile config map: {0}")]
    Store(#[from] StoreError),
    #[error("attempt {0} failed")]
    Flaky(u32),
}

/// Sets `foo` to `bar` on the config map it is asked about.
pub struct ConfigMapReconciler {
    pub client: SharedClient,
    pub calls: AtomicU32,
    pub outcomes: Mutex<Vec<OperationResult>>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl ConfigMapReconciler {
    pub fn new(client: SharedClient) -> Self {
        Self {
            client,
            calls: AtomicU32::new(0),
            outcomes: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn outcomes(&self) -> Vec<OperationResult> {
        self.outcomes.lock().clone()
    }
}

#[async_trait]
impl Reconciler for ConfigMapReconciler {
    type Error = ConfigMapError;

    async fn reconcile(&self, request: &Request) -> Result<ReconcileResult, ConfigMapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut cm: ConfigMap = self.client.get_as(&request.key).await?;

        if cm.metadata.labels.contains_key(PANIC_LABEL) {
            panic!("reconciler exploded on {request}");
        }
        if cm.metadata.labels.contains_key(FLAKY_LABEL) {
            let attempt = {
                let mut attempts = self.attempts.lock();
                let attempt = attempts.entry(request.to_string()).or_insert(0);
                *attempt += 1;
                *attempt
            };
            if attempt == 1 {
                return Err(ConfigMapError::Flaky(attempt));
            }
        }
        let requeue = cm.metadata.labels.contains_key(REQUEUE_LABEL);

        let outcome = create_or_update(self.client.as_ref(), &mut cm, |cm| {
            cm.data = BTreeMap::from([("foo".to_string(), "bar".to_string())]);
            Ok(())
        })
        .await?;
        self.outcomes.lock().push(outcome);

        if requeue {
            Ok(ReconcileResult::requeue())
        } else {
            Ok(ReconcileResult::done())
        }
    }
}

pub async fn assert_foo_bar(ctx: ExecutionContext, _r: Arc<ConfigMapReconciler>) -> Result<(), SideEffectError> {
    let cm: ConfigMap = ctx.client().get_as(&ctx.request().key).await?;
    match cm.data.get("foo") {
        Some(foo) if foo == "bar" => Ok(()),
        other => Err(SideEffectError::mismatch(format!("want \"bar\", got {other:?}"))),
    }
}

// ─── Environment doubles ─────────────────────────────────────────────────────

/// Local environment that can be reached from inside a running case.
#[derive(Clone)]
pub struct SharedEnvironment(pub Arc<tokio::sync::Mutex<LocalEnvironment>>);

impl SharedEnvironment {
    pub fn new(inner: LocalEnvironment) -> Self {
        Self(Arc::new(tokio::sync::Mutex::new(inner)))
    }

    pub async fn kill(&self) {
        self.0.lock().await.stop().await.unwrap();
    }
}

#[async_trait]
impl Environment for SharedEnvironment {
    async fn start(&mut self) -> EnvResult<ClientConfig> {
        self.0.lock().await.start().await
    }

    async fn stop(&mut self) -> EnvResult<()> {
        self.0.lock().await.stop().await
    }
}

/// Starts normally, then fails to stop.
pub struct FailingStop {
    pub inner: LocalEnvironment,
    pub started: Arc<AtomicU32>,
}

impl FailingStop {
    pub fn new() -> Self {
        Self {
            inner: LocalEnvironment::default(),
            started: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl Environment for FailingStop {
    async fn start(&mut self) -> EnvResult<ClientConfig> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.inner.start().await
    }

    async fn stop(&mut self) -> EnvResult<()> {
        self.inner.stop().await?;
        Err(EnvError::Crashed("control plane left a zombie behind".into()))
    }
}

/// Hands out connection details for a control plane that is already gone.
pub struct DeadOnArrival {
    pub inner: LocalEnvironment,
}

#[async_trait]
impl Environment for DeadOnArrival {
    async fn start(&mut self) -> EnvResult<ClientConfig> {
        let config = self.inner.start().await?;
        self.inner.stop().await?;
        Ok(config)
    }

    async fn stop(&mut self) -> EnvResult<()> {
        self.inner.stop().await
    }
}
