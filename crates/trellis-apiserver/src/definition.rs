//! Custom resource definitions.
//!
//! A definition tells the control plane to serve an additional kind. They
//! are read from the directories listed in
//! [`EnvironmentConfig::crd_directory_paths`](crate::EnvironmentConfig),
//! one definition per `*.json` or `*.toml` file. Other files are ignored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trellis_core::{GroupVersionKind, Scope};

use crate::error::{EnvError, EnvResult};

/// Minimal record describing a served kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceDefinition {
    /// API group, e.g. `webapp.example.com`.
    pub group: String,
    /// Served version, e.g. `v1`.
    pub version: String,
    /// Kind name, e.g. `Guestbook`.
    pub kind: String,
    /// Lowercase plural; derived from the kind when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    /// Scope of the kind.
    #[serde(default)]
    pub scope: Scope,
    /// Whether `status` is a separate subresource.
    #[serde(default)]
    pub status_subresource: bool,
}

impl CustomResourceDefinition {
    /// Creates a namespaced definition without a status subresource.
    #[must_use]
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: None,
            scope: Scope::Namespaced,
            status_subresource: false,
        }
    }

    /// Sets the scope.
    #[must_use]
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Enables the status subresource.
    #[must_use]
    pub const fn with_status_subresource(mut self) -> Self {
        self.status_subresource = true;
        self
    }

    /// The served kind.
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    /// Plural resource name.
    #[must_use]
    pub fn plural(&self) -> String {
        self.plural
            .clone()
            .unwrap_or_else(|| format!("{}s", self.kind.to_lowercase()))
    }

    /// Checks that the definition can be served.
    ///
    /// # Errors
    /// Returns a message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.group.is_empty() {
            return Err("group cannot be empty".to_string());
        }
        if self.version.is_empty() {
            return Err("version cannot be empty".to_string());
        }
        if !self.kind.chars().next().is_some_and(char::is_uppercase) {
            return Err(format!("kind {:?} must start with an uppercase letter", self.kind));
        }
        if !self.kind.chars().all(char::is_alphanumeric) {
            return Err(format!("kind {:?} must be alphanumeric", self.kind));
        }
        Ok(())
    }

    /// Reads a definition from a `.json` or `.toml` file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_path(path: &Path) -> EnvResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let parsed: Result<Self, String> = match extension(path) {
            Some("json") => serde_json::from_str(&content).map_err(|e| e.to_string()),
            Some("toml") => toml::from_str(&content).map_err(|e| e.to_string()),
            _ => Err("unsupported file extension".to_string()),
        };
        let definition = parsed.map_err(|e| EnvError::definition(path, e))?;
        definition
            .validate()
            .map_err(|e| EnvError::definition(path, e))?;
        Ok(definition)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn is_definition_file(path: &Path) -> bool {
    path.is_file() && matches!(extension(path), Some("json" | "toml"))
}

/// Loads every definition found directly inside `paths`, in path order and
/// then file-name order.
///
/// A missing directory is skipped with a warning unless `error_if_missing`
/// is set.
///
/// # Errors
/// Returns an error for a missing directory (when fatal) or an invalid file.
pub fn load_definitions(
    paths: &[PathBuf],
    error_if_missing: bool,
) -> EnvResult<Vec<CustomResourceDefinition>> {
    let mut definitions = Vec::new();
    for dir in paths {
        if !dir.exists() {
            if error_if_missing {
                return Err(EnvError::DefinitionPathMissing(dir.clone()));
            }
            tracing::warn!(path = %dir.display(), "resource definition path does not exist, skipping");
            continue;
        }

        let mut files = if dir.is_file() {
            vec![dir.clone()]
        } else {
            std::fs::read_dir(dir)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<Result<Vec<_>, _>>()?
        };
        files.retain(|p| is_definition_file(p));
        files.sort();

        for file in files {
            let definition = CustomResourceDefinition::from_path(&file)?;
            tracing::debug!(kind = %definition.gvk(), file = %file.display(), "loaded resource definition");
            definitions.push(definition);
        }
    }
    Ok(definitions)
}
