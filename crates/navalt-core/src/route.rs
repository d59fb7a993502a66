//! Directions response model and navigation routes built from it.
//!
//! Only the parts of a directions response this crate reads are modelled.
//! Unknown fields are ignored during deserialization.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RouteConversionError;
use crate::models::RouterOrigin;
use crate::route_options::RouteOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionsRoute {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub legs: Vec<RouteLeg>,
    /// Position of this route in its response, set once the route is built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_uuid: Option<String>,
    /// Options of the request that produced this route
    #[serde(skip)]
    pub route_options: Option<RouteOptions>,
}

impl DirectionsRoute {
    /// Number of geometry points of every step, grouped per leg.
    pub fn step_point_counts(&self) -> Vec<Vec<usize>> {
        self.legs
            .iter()
            .map(|leg| leg.steps.iter().map(LegStep::point_count).collect())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub steps: Vec<LegStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegStep {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub geometry: Option<StepGeometry>,
}

impl LegStep {
    pub fn point_count(&self) -> usize {
        self.geometry.as_ref().map_or(0, StepGeometry::point_count)
    }
}

/// Step geometry as returned for `geometries=geojson` or an encoded polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepGeometry {
    Encoded(String),
    GeoJson { coordinates: Vec<[f64; 2]> },
}

impl StepGeometry {
    pub fn point_count(&self) -> usize {
        match self {
            StepGeometry::GeoJson { coordinates } => coordinates.len(),
            // Every point is two varints; a chunk without the 0x20 flag ends one.
            StepGeometry::Encoded(polyline) => {
                let values = polyline
                    .bytes()
                    .filter(|b| (b.wrapping_sub(63) & 0x20) == 0)
                    .count();
                values / 2
            }
        }
    }
}

/// A route with the context needed to navigate, request and compare it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationRoute {
    /// Stable identifier, unique across responses
    pub id: String,
    pub origin: RouterOrigin,
    pub route_options: RouteOptions,
    pub directions_route: DirectionsRoute,
    pub route_index: usize,
    #[serde(default)]
    pub response_uuid: Option<String>,
}

impl NavigationRoute {
    /// Build one navigation route per route of a directions response.
    pub fn from_response(
        response: DirectionsResponse,
        options: RouteOptions,
        origin: RouterOrigin,
    ) -> Vec<NavigationRoute> {
        let response_uuid = response.uuid.filter(|uuid| !uuid.is_empty());
        let id_prefix = response_uuid
            .clone()
            .unwrap_or_else(|| format!("local@{}", Uuid::new_v4()));

        response
            .routes
            .into_iter()
            .enumerate()
            .map(|(index, route)| {
                let id = format!("{}#{}", id_prefix, index);
                Self::assemble(id, route, index, response_uuid.clone(), options.clone(), origin)
            })
            .collect()
    }

    /// Build a single route with a known id out of a raw response body.
    pub fn from_response_json(
        id: impl Into<String>,
        response_json: &str,
        route_index: usize,
        options: RouteOptions,
        origin: RouterOrigin,
    ) -> Result<NavigationRoute, RouteConversionError> {
        let response: DirectionsResponse = serde_json::from_str(response_json)?;
        let available = response.routes.len();
        let route = response
            .routes
            .into_iter()
            .nth(route_index)
            .ok_or(RouteConversionError::RouteIndexOutOfRange {
                index: route_index,
                available,
            })?;
        let response_uuid = response.uuid.filter(|uuid| !uuid.is_empty());
        Ok(Self::assemble(
            id.into(),
            route,
            route_index,
            response_uuid,
            options,
            origin,
        ))
    }

    fn assemble(
        id: String,
        mut route: DirectionsRoute,
        route_index: usize,
        response_uuid: Option<String>,
        options: RouteOptions,
        origin: RouterOrigin,
    ) -> NavigationRoute {
        route.route_index = Some(route_index);
        route.request_uuid = response_uuid.clone();
        route.route_options = Some(options.clone());
        NavigationRoute {
            id,
            origin,
            route_options: options,
            directions_route: route,
            route_index,
            response_uuid,
        }
    }
}
