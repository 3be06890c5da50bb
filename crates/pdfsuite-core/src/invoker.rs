//! Remote operation collaborator and the payload/response wire types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{InvokeError, RunError};
use crate::operation::OperationKind;

/// Body sent to a remote function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokePayload {
    pub operation: OperationKind,
    /// Storage paths in input order
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// Body returned by a remote function.
///
/// A missing `success` is read as `false`; the functions reply with a bare
/// `{ "error": ... }` when they crash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const DEFAULT_REMOTE_ERROR: &str = "Processing failed without an error message";

impl InvokeResponse {
    pub fn succeeded(url: impl Into<String>) -> Self {
        Self {
            success: true,
            result_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn succeeded_many(urls: Vec<String>) -> Self {
        Self {
            success: true,
            result_url: urls.first().cloned(),
            result_urls: Some(urls),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Turn the response into an artifact, or the run error it implies
    pub fn into_artifact(self) -> Result<ResultArtifact, RunError> {
        if !self.success {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REMOTE_ERROR.to_string());
            return Err(RunError::InvokeFailed(message));
        }

        let mut urls = Vec::new();
        if let Some(url) = self.result_url.filter(|u| !u.is_empty()) {
            urls.push(url);
        }
        for url in self.result_urls.unwrap_or_default() {
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }
        ResultArtifact::new(urls).ok_or(RunError::InvalidResponse)
    }
}

/// Downloadable output of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultArtifact {
    urls: Vec<String>,
}

impl ResultArtifact {
    /// `None` when there is nothing to point at
    pub fn new(urls: Vec<String>) -> Option<Self> {
        if urls.is_empty() {
            None
        } else {
            Some(Self { urls })
        }
    }

    /// Primary reference
    pub fn url(&self) -> &str {
        &self.urls[0]
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

/// How an operation kind maps to a remote function name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionRouting {
    /// One function per kind, e.g. `pdf-merge`
    PerOperation { prefix: String },
    /// A single function that reads the kind from the payload
    Dispatch { function: String },
}

pub const DEFAULT_FUNCTION_PREFIX: &str = "pdf-";
pub const DEFAULT_DISPATCH_FUNCTION: &str = "pdf-bridge";

impl Default for FunctionRouting {
    fn default() -> Self {
        FunctionRouting::PerOperation {
            prefix: DEFAULT_FUNCTION_PREFIX.to_string(),
        }
    }
}

impl FunctionRouting {
    pub fn dispatch() -> Self {
        FunctionRouting::Dispatch {
            function: DEFAULT_DISPATCH_FUNCTION.to_string(),
        }
    }

    pub fn function_name(&self, kind: OperationKind) -> String {
        match self {
            FunctionRouting::PerOperation { prefix } => format!("{}{}", prefix, kind.as_str()),
            FunctionRouting::Dispatch { function } => function.clone(),
        }
    }
}

/// Runs one operation remotely.
///
/// `Ok` carries whatever the function answered, including
/// `{ "success": false }`. `Err` is for transport and decoding problems.
#[async_trait]
pub trait RemoteInvoker: Send + Sync {
    async fn invoke(
        &self,
        kind: OperationKind,
        payload: &InvokePayload,
    ) -> Result<InvokeResponse, InvokeError>;
}
