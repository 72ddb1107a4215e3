//! Environment lifecycle.
//!
//! # Toyota Way: Standardized Work (標準作業)
//! Every environment follows the same start/stop contract, so the harness
//! can drive a local control plane or a test double the same way.

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::client::ClientConfig;
use crate::config::EnvironmentConfig;
use crate::definition::load_definitions;
use crate::error::{EnvError, EnvResult};
use crate::server::ServerHandle;
use crate::store::ObjectStore;

/// A control plane that can be started once and stopped once.
#[async_trait]
pub trait Environment: Send {
    /// Brings the control plane up and returns how to reach it.
    ///
    /// # Errors
    /// Returns an error if the control plane cannot be started.
    async fn start(&mut self) -> EnvResult<ClientConfig>;

    /// Tears the control plane down.
    ///
    /// # Errors
    /// Returns an error if the environment is not running or does not stop
    /// cleanly.
    async fn stop(&mut self) -> EnvResult<()>;
}

/// In-process control plane running as a tokio task.
#[derive(Debug)]
pub struct LocalEnvironment {
    config: EnvironmentConfig,
    running: Option<RunningServer>,
}

#[derive(Debug)]
struct RunningServer {
    handle: ServerHandle,
    task: JoinHandle<()>,
    endpoint: String,
}

impl Default for LocalEnvironment {
    fn default() -> Self {
        Self::new(EnvironmentConfig::default())
    }
}

impl LocalEnvironment {
    /// Creates an environment that has not been started.
    #[must_use]
    pub const fn new(config: EnvironmentConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    /// The environment's configuration.
    #[must_use]
    pub const fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Returns true between a successful start and the next stop.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

#[async_trait]
impl Environment for LocalEnvironment {
    async fn start(&mut self) -> EnvResult<ClientConfig> {
        if self.running.is_some() {
            return Err(EnvError::AlreadyRunning);
        }
        self.config.validate()?;

        let definitions = load_definitions(
            &self.config.crd_directory_paths,
            self.config.error_if_crd_path_missing,
        )?;
        let mut store = ObjectStore::new();
        for definition in &definitions {
            store
                .install(definition)
                .map_err(|e| EnvError::definition(format!("<{}>", definition.gvk()), e))?;
        }

        let (handle, task) = ServerHandle::spawn(store, self.config.mailbox_capacity);
        let timeout = self.config.start_timeout;
        match tokio::time::timeout(timeout, handle.ping()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                task.abort();
                return Err(EnvError::Crashed(e.to_string()));
            }
            Err(_) => {
                task.abort();
                return Err(EnvError::StartTimeout(timeout));
            }
        }

        let endpoint = format!("local://{}", uuid::Uuid::new_v4());
        tracing::info!(endpoint = %endpoint, definitions = definitions.len(), "control plane started");
        self.running = Some(RunningServer {
            handle: handle.clone(),
            task,
            endpoint: endpoint.clone(),
        });
        Ok(ClientConfig::new(handle, endpoint))
    }

    async fn stop(&mut self) -> EnvResult<()> {
        let Some(mut running) = self.running.take() else {
            return Err(EnvError::NotRunning);
        };

        let timeout = self.config.stop_timeout;
        let stopped = tokio::time::timeout(timeout, async {
            // The actor may already be gone; joining reports how it ended.
            let _ = running.handle.shutdown().await;
            (&mut running.task).await
        })
        .await;

        match stopped {
            Ok(Ok(())) => {
                tracing::info!(endpoint = %running.endpoint, "control plane stopped");
                Ok(())
            }
            Ok(Err(join_error)) => Err(EnvError::Crashed(join_error.to_string())),
            Err(_) => {
                running.task.abort();
                Err(EnvError::StopTimeout(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use trellis_core::{Client, ClientExt, ConfigMap, Object, Scheme, StoreError, objects};

    use super::*;
    use crate::client::StoreClient;

    fn scheme() -> Arc<Scheme> {
        let mut scheme = Scheme::new();
        objects::add_to_scheme(&mut scheme).unwrap();
        Arc::new(scheme)
    }

    #[tokio::test]
    async fn test_start_stop() {
        let mut env = LocalEnvironment::default();
        let config = env.start().await.unwrap();
        assert!(env.is_running());
        assert!(config.endpoint().starts_with("local://"));

        let client = StoreClient::new(&config, scheme()).unwrap();
        client.create_typed(&ConfigMap::new("default", "cm")).await.unwrap();

        env.stop().await.unwrap();
        assert!(!env.is_running());

        let err = client.list(&ConfigMap::gvk(), None).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let mut env = LocalEnvironment::default();
        env.start().await.unwrap();
        assert!(matches!(env.start().await, Err(EnvError::AlreadyRunning)));
        env.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_not_running() {
        let mut env = LocalEnvironment::default();
        assert!(matches!(env.stop().await, Err(EnvError::NotRunning)));

        env.start().await.unwrap();
        env.stop().await.unwrap();
        assert!(matches!(env.stop().await, Err(EnvError::NotRunning)));
    }

    #[tokio::test]
    async fn test_missing_definition_path_is_fatal_when_configured() {
        let config = EnvironmentConfig::new()
            .with_crd_path("/nonexistent/trellis/crds")
            .with_error_if_crd_path_missing(true);
        let mut env = LocalEnvironment::new(config);
        let err = env.start().await.unwrap_err();
        assert!(matches!(err, EnvError::DefinitionPathMissing(_)));
        assert!(!env.is_running());
    }

    #[tokio::test]
    async fn test_missing_definition_path_skipped_by_default() {
        let config = EnvironmentConfig::new().with_crd_path("/nonexistent/trellis/crds");
        let mut env = LocalEnvironment::new(config);
        env.start().await.unwrap();
        env.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = EnvironmentConfig::new().with_start_timeout(Duration::ZERO);
        let mut env = LocalEnvironment::new(config);
        assert!(matches!(env.start().await, Err(EnvError::Config(_))));
    }
}
