//! Error types for route options and route conversion.

use thiserror::Error;

/// Errors from parsing or rebuilding route request options.
#[derive(Debug, Error)]
pub enum RouteOptionsError {
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request url {0} is not a directions request")]
    NotDirectionsRequest(String),

    #[error("invalid coordinate '{0}'")]
    InvalidCoordinate(String),

    #[error("invalid value '{value}' for '{param}'")]
    InvalidValue { param: &'static str, value: String },

    #[error("route options have no coordinates")]
    NoCoordinates,

    #[error("no remaining waypoints on route")]
    NoRemainingWaypoints,

    #[error("{remaining} remaining waypoints but only {coordinates} coordinates")]
    InvalidRemainingWaypoints { remaining: usize, coordinates: usize },
}

/// Errors from turning raw engine payloads into navigation routes.
#[derive(Debug, Error)]
pub enum RouteConversionError {
    #[error("invalid directions response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("route index {index} out of range, response has {available} routes")]
    RouteIndexOutOfRange { index: usize, available: usize },

    #[error(transparent)]
    InvalidRouteOptions(#[from] RouteOptionsError),
}

/// Error reported to alternatives observers and refresh callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RouteAlternativesError {
    pub message: String,
}

impl RouteAlternativesError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
