//! Core data models for route alternatives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::route::NavigationRoute;

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub longitude: f64,
    pub latitude: f64,
}

impl Point {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }
}

/// Heading constraint attached to a request coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bearing {
    /// Heading in degrees clockwise from true north.
    pub angle: f64,
    /// Allowed deviation from `angle`, in degrees.
    pub degrees: f64,
}

impl Bearing {
    pub fn new(angle: f64, degrees: f64) -> Self {
        Self { angle, degrees }
    }
}

/// Where a route was computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterOrigin {
    /// Computed by a directions server
    Offboard,
    /// Computed locally by the on-device router
    #[default]
    Onboard,
    /// Supplied by the host application
    Custom,
}

/// Position along a route, as geometry indices.
///
/// `route_geometry_index` counts points from the start of the whole route,
/// `leg_geometry_index` counts points from the start of `leg_index`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteProgressData {
    pub leg_index: usize,
    pub route_geometry_index: usize,
    pub leg_geometry_index: usize,
}

impl RouteProgressData {
    pub fn new(leg_index: usize, route_geometry_index: usize, leg_geometry_index: usize) -> Self {
        Self {
            leg_index,
            route_geometry_index,
            leg_geometry_index,
        }
    }
}

/// Point where an alternative diverges from (or rejoins) the primary route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlternativeRouteIntersection {
    pub point: Point,
    pub geometry_index_in_route: usize,
    pub geometry_index_in_leg: usize,
    pub leg_index: usize,
}

impl From<&AlternativeRouteIntersection> for RouteProgressData {
    fn from(fork: &AlternativeRouteIntersection) -> Self {
        RouteProgressData::new(
            fork.leg_index,
            fork.geometry_index_in_route,
            fork.geometry_index_in_leg,
        )
    }
}

/// Distance (meters) and duration (seconds) summary of a route section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AlternativeRouteInfo {
    pub distance: f64,
    pub duration: f64,
}

/// Fork data of one alternative route relative to the current primary route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeRouteMetadata {
    pub navigation_route: NavigationRoute,
    pub fork_intersection_of_alternative_route: AlternativeRouteIntersection,
    pub fork_intersection_of_primary_route: AlternativeRouteIntersection,
    pub info_from_fork: AlternativeRouteInfo,
    pub info_from_start_of_primary: AlternativeRouteInfo,
    /// Numeric id assigned by the routing engine
    pub alternative_id: i32,
}

/// Progress of the device along the primary route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteProgress {
    pub navigation_route: NavigationRoute,
    pub progress: RouteProgressData,
    /// Waypoints still ahead, destination included.
    pub remaining_waypoints: usize,
}

/// A map-matched device location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub bearing: Option<f64>,
    /// Speed in meters per second
    #[serde(default)]
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Location {
    pub fn point(&self) -> Point {
        Point::new(self.longitude, self.latitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMatcherResult {
    pub enhanced_location: Location,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationSessionState {
    #[default]
    Idle,
    FreeDrive,
    ActiveGuidance,
}
