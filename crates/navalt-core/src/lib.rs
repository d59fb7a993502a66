pub mod error;
pub mod fork;
pub mod models;
pub mod request;
pub mod route;
pub mod route_options;

pub use error::{RouteAlternativesError, RouteConversionError, RouteOptionsError};
pub use fork::{alternative_leg_index, alternative_route_progress, translate_progress};
pub use models::{
    AlternativeRouteInfo, AlternativeRouteIntersection, AlternativeRouteMetadata, Bearing,
    Location, LocationMatcherResult, NavigationSessionState, Point, RouteProgress,
    RouteProgressData, RouterOrigin,
};
pub use request::{DirectionsRequestResult, RouteRequester};
pub use route::{
    DirectionsResponse, DirectionsRoute, LegStep, NavigationRoute, RouteLeg, StepGeometry,
};
pub use route_options::{apply_avoid_maneuvers, update_route_options, RouteOptions};
