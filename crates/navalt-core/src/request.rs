//! Route request boundary.

use std::time::Duration;

use async_trait::async_trait;

use crate::route::DirectionsResponse;
use crate::route_options::RouteOptions;

/// Outcome of a directions request, classified for retrying.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectionsRequestResult {
    SuccessfulResponse(DirectionsResponse),
    /// Retry after the regular interval
    RetryableError,
    /// Retry after exactly this delay
    RetryableErrorWithDelay(Duration),
    /// Give up until the route changes
    NotRetryableError,
}

/// Something that can fetch routes for a set of options.
///
/// An `Err` is an unexpected failure and is treated as retryable by callers.
#[async_trait]
pub trait RouteRequester: Send + Sync {
    async fn request_routes(&self, options: &RouteOptions)
        -> anyhow::Result<DirectionsRequestResult>;
}
