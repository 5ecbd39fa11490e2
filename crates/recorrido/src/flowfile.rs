//! Flow definitions loaded from JSON or YAML files.
//!
//! The on-disk schema mirrors the in-code step model one-to-one, so a
//! flow file is just a named list of [`FlowStep`] definitions. Files are
//! validated on load; a flow that would be rejected in code is rejected
//! here too.

use crate::result::{FlowError, FlowResult};
use crate::runner::Flow;
use crate::step::FlowStep;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported schema version
pub const FLOW_FILE_VERSION: &str = "1";

/// Root of a flow definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowFile {
    /// Schema version (must be "1")
    #[serde(default = "default_version")]
    pub version: String,
    /// Flow name
    pub name: String,
    /// Optional human description
    #[serde(default)]
    pub description: String,
    /// Steps in execution order
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

fn default_version() -> String {
    FLOW_FILE_VERSION.to_string()
}

impl FlowFile {
    /// Parse a flow file from YAML.
    ///
    /// # Errors
    /// Returns YAML or validation errors.
    pub fn from_yaml(source: &str) -> FlowResult<Self> {
        let file: Self = serde_yaml_ng::from_str(source)?;
        file.validate()?;
        Ok(file)
    }

    /// Parse a flow file from JSON.
    ///
    /// # Errors
    /// Returns JSON or validation errors.
    pub fn from_json(source: &str) -> FlowResult<Self> {
        let file: Self = serde_json::from_str(source)?;
        file.validate()?;
        Ok(file)
    }

    /// Load a flow file, picking the format from the extension
    /// (`.yaml`/`.yml` or `.json`).
    ///
    /// # Errors
    /// Returns I/O, parse, or validation errors; unknown extensions are
    /// rejected.
    pub async fn load(path: &Path) -> FlowResult<Self> {
        let source = tokio::fs::read_to_string(path).await?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&source),
            Some("json") => Self::from_json(&source),
            other => Err(FlowError::FlowFile {
                message: format!(
                    "unsupported flow file extension {:?} (expected .yaml, .yml, or .json)",
                    other.unwrap_or("")
                ),
            }),
        }
    }

    /// Check file-level invariants and every step definition.
    ///
    /// # Errors
    /// Returns `FlowError::FlowFile` for schema problems and
    /// `FlowError::InvalidStep` for bad steps.
    pub fn validate(&self) -> FlowResult<()> {
        if self.version != FLOW_FILE_VERSION {
            return Err(FlowError::FlowFile {
                message: format!(
                    "unsupported version '{}' (expected '{FLOW_FILE_VERSION}')",
                    self.version
                ),
            });
        }
        if self.name.trim().is_empty() {
            return Err(FlowError::FlowFile {
                message: "flow name must not be empty".to_string(),
            });
        }
        if self.steps.is_empty() {
            return Err(FlowError::FlowFile {
                message: format!("flow '{}' has no steps", self.name),
            });
        }
        self.clone().into_flow().map(|_| ())
    }

    /// Convert into a runnable [`Flow`].
    ///
    /// # Errors
    /// Returns the first invalid step definition.
    pub fn into_flow(self) -> FlowResult<Flow> {
        let flow = Flow::with_steps(self.name, self.steps);
        flow.validate()?;
        Ok(flow)
    }
}
