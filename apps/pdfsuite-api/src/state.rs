//! Shared state for the pdfsuite server

use crate::error::ServerError;
use crate::storage::BlobStore;
use pdfsuite_core::invoker::{DEFAULT_DISPATCH_FUNCTION, DEFAULT_FUNCTION_PREFIX};
use pdfsuite_core::OperationKind;

pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub struct AppState {
    pub store: BlobStore,
    /// Bucket the function endpoints read inputs from and write results to
    pub bucket: String,
    /// Base URL clients reach this server on, without a trailing slash
    pub public_url: String,
    pub function_prefix: String,
    pub dispatch_function: String,
    pub max_body_bytes: usize,
}

/// How a function name maps onto an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionTarget {
    /// `pdf-<kind>`: the route fixes the operation
    Operation(OperationKind),
    /// The dispatch function: the payload names the operation
    Dispatch,
}

impl AppState {
    pub fn new(store: BlobStore, bucket: impl Into<String>, public_url: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            function_prefix: DEFAULT_FUNCTION_PREFIX.to_string(),
            dispatch_function: DEFAULT_DISPATCH_FUNCTION.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_dispatch_function(mut self, name: impl Into<String>) -> Self {
        self.dispatch_function = name.into();
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Functions only see the served bucket, so storage routes refuse any other
    pub fn check_bucket(&self, bucket: &str) -> Result<(), ServerError> {
        if bucket == self.bucket {
            return Ok(());
        }
        Err(ServerError::UnknownBucket {
            bucket: bucket.to_string(),
            served: self.bucket.clone(),
        })
    }

    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/public/{}/{}", self.public_url, bucket, path)
    }

    pub fn function_target(&self, name: &str) -> Option<FunctionTarget> {
        if name == self.dispatch_function {
            return Some(FunctionTarget::Dispatch);
        }
        name.strip_prefix(self.function_prefix.as_str())
            .and_then(|kind| kind.parse().ok())
            .map(FunctionTarget::Operation)
    }
}
