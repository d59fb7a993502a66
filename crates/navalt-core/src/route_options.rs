//! Directions request options.
//!
//! Options round-trip through request URLs of the form
//! `<base>/directions/v5/<user>/<profile>/<lon,lat;lon,lat...>?<query>`.
//! They can also be rebuilt from the device position so that a request
//! continues the current trip instead of restarting it.

use std::collections::BTreeMap;
use std::iter;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RouteOptionsError;
use crate::models::{Bearing, Location, Point, RouteProgress};

/// Tolerance used for the origin bearing when the request had none.
pub const DEFAULT_REROUTE_BEARING_TOLERANCE: f64 = 90.0;

/// Upper bound for the avoid-maneuver radius, in meters.
pub const MAX_AVOID_MANEUVER_RADIUS: f64 = 1000.0;

const MIN_AVOID_MANEUVER_RADIUS: f64 = 1.0;

/// Query parameters that no longer apply once the trip has started.
const DROPPED_ON_UPDATE: &[&str] = &["arrive_by", "depart_at", "waypoint_indices"];

/// `;`-separated query parameters with one entry per coordinate.
const PER_COORDINATE_PARAMS: &[&str] = &[
    "approaches",
    "radiuses",
    "layers",
    "waypoint_targets",
    "snapping_include_closures",
    "snapping_include_static_closures",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    /// Scheme and host of the directions service, e.g. `https://api.mapbox.com`
    pub base_url: String,
    pub user: String,
    pub profile: String,
    pub coordinates: Vec<Point>,
    #[serde(default)]
    pub bearings: Option<Vec<Option<Bearing>>>,
    #[serde(default)]
    pub waypoint_names: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub avoid_maneuver_radius: Option<f64>,
    #[serde(default)]
    pub alternatives: Option<bool>,
    #[serde(default)]
    pub geometries: Option<String>,
    /// Every other query parameter, kept verbatim
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl RouteOptions {
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        profile: impl Into<String>,
        coordinates: Vec<Point>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            user: user.into(),
            profile: profile.into(),
            coordinates,
            bearings: None,
            waypoint_names: None,
            avoid_maneuver_radius: None,
            alternatives: None,
            geometries: None,
            extra: BTreeMap::new(),
        }
    }

    /// Parse options from a directions request URL.
    ///
    /// Any `access_token` parameter is discarded.
    pub fn from_url(raw: &str) -> Result<Self, RouteOptionsError> {
        let url = Url::parse(raw)?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.collect())
            .unwrap_or_default();

        let start = segments
            .iter()
            .position(|segment| *segment == "directions")
            .ok_or_else(|| RouteOptionsError::NotDirectionsRequest(raw.to_string()))?;
        let request = &segments[start..];
        if request.len() < 5 || request[2].is_empty() || request[3].is_empty() {
            return Err(RouteOptionsError::NotDirectionsRequest(raw.to_string()));
        }

        let mut base_url = url[..url::Position::BeforePath].to_string();
        for prefix in &segments[..start] {
            base_url.push('/');
            base_url.push_str(prefix);
        }

        let coordinates = parse_coordinates(&decode_path_segment(request[4]))?;
        let mut options = RouteOptions::new(base_url, request[2], request[3], coordinates);

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "access_token" => {}
                "bearings" => options.bearings = Some(parse_bearings(&value)?),
                "waypoint_names" => {
                    options.waypoint_names = Some(
                        value
                            .split(';')
                            .map(|name| (!name.is_empty()).then(|| name.to_string()))
                            .collect(),
                    )
                }
                "avoid_maneuver_radius" => {
                    options.avoid_maneuver_radius =
                        Some(parse_value("avoid_maneuver_radius", &value)?)
                }
                "alternatives" => options.alternatives = Some(parse_value("alternatives", &value)?),
                "geometries" => options.geometries = Some(value.into_owned()),
                _ => {
                    options.extra.insert(key.into_owned(), value.into_owned());
                }
            }
        }

        Ok(options)
    }

    /// Serialize the options back into a request URL.
    pub fn to_url(&self, access_token: Option<&str>) -> Result<Url, RouteOptionsError> {
        let coordinates = self
            .coordinates
            .iter()
            .map(|point| format!("{},{}", point.longitude, point.latitude))
            .collect::<Vec<_>>()
            .join(";");
        let mut url = Url::parse(&format!(
            "{}/directions/v5/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.user,
            self.profile,
            coordinates
        ))?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(alternatives) = self.alternatives {
                query.append_pair("alternatives", &alternatives.to_string());
            }
            if let Some(geometries) = &self.geometries {
                query.append_pair("geometries", geometries);
            }
            if let Some(bearings) = &self.bearings {
                let encoded = bearings
                    .iter()
                    .map(|bearing| match bearing {
                        Some(bearing) => format!("{},{}", bearing.angle, bearing.degrees),
                        None => String::new(),
                    })
                    .collect::<Vec<_>>()
                    .join(";");
                query.append_pair("bearings", &encoded);
            }
            if let Some(names) = &self.waypoint_names {
                let encoded = names
                    .iter()
                    .map(|name| name.as_deref().unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(";");
                query.append_pair("waypoint_names", &encoded);
            }
            if let Some(radius) = self.avoid_maneuver_radius {
                query.append_pair("avoid_maneuver_radius", &radius.to_string());
            }
            for (key, value) in &self.extra {
                query.append_pair(key, value);
            }
            if let Some(token) = access_token {
                query.append_pair("access_token", token);
            }
        }

        Ok(url)
    }

    pub fn is_driving_profile(&self) -> bool {
        matches!(self.profile.as_str(), "driving" | "driving-traffic")
    }
}

/// Rebuild request options so the route starts at the current location.
///
/// The origin becomes the device position and the remaining waypoints are
/// kept together with their per-coordinate parameters. The origin bearing
/// becomes the device bearing, with the tolerance of the requested origin
/// bearing or [`DEFAULT_REROUTE_BEARING_TOLERANCE`].
pub fn update_route_options(
    options: &RouteOptions,
    progress: &RouteProgress,
    location: &Location,
) -> Result<RouteOptions, RouteOptionsError> {
    let count = options.coordinates.len();
    if count == 0 {
        return Err(RouteOptionsError::NoCoordinates);
    }
    let remaining = progress.remaining_waypoints;
    if remaining == 0 {
        return Err(RouteOptionsError::NoRemainingWaypoints);
    }
    if remaining >= count {
        return Err(RouteOptionsError::InvalidRemainingWaypoints {
            remaining,
            coordinates: count,
        });
    }
    let next = count - remaining;

    let mut updated = options.clone();
    updated.coordinates = iter::once(location.point())
        .chain(options.coordinates[next..].iter().copied())
        .collect();

    let requested_bearing = |index: usize| {
        options
            .bearings
            .as_ref()
            .and_then(|bearings| bearings.get(index).copied().flatten())
    };
    let tolerance =
        requested_bearing(0).map_or(DEFAULT_REROUTE_BEARING_TOLERANCE, |bearing| bearing.degrees);
    let origin_bearing = location
        .bearing
        .map(|angle| Bearing::new(angle, tolerance));
    updated.bearings = Some(
        iter::once(origin_bearing)
            .chain((next..count).map(requested_bearing))
            .collect(),
    );

    updated.waypoint_names = options.waypoint_names.as_ref().map(|names| {
        iter::once(names.first().cloned().flatten())
            .chain((next..count).map(|index| names.get(index).cloned().flatten()))
            .collect()
    });

    for key in DROPPED_ON_UPDATE {
        updated.extra.remove(*key);
    }
    for key in PER_COORDINATE_PARAMS {
        if let Some(value) = updated.extra.get_mut(*key) {
            let parts: Vec<&str> = value.split(';').collect();
            if parts.len() == count {
                let trimmed = iter::once("")
                    .chain(parts[next..].iter().copied())
                    .collect::<Vec<_>>()
                    .join(";");
                *value = trimmed;
            }
        }
    }

    Ok(updated)
}

/// Set the avoid-maneuver radius from speed and a time window.
///
/// Only driving profiles get a radius. Radii below one meter are dropped and
/// larger ones are capped at [`MAX_AVOID_MANEUVER_RADIUS`].
pub fn apply_avoid_maneuvers(
    mut options: RouteOptions,
    avoid_maneuver_seconds: u32,
    speed: Option<f64>,
) -> RouteOptions {
    if !options.is_driving_profile() {
        return options;
    }
    let radius = speed.unwrap_or(0.0) * f64::from(avoid_maneuver_seconds);
    options.avoid_maneuver_radius = (radius >= MIN_AVOID_MANEUVER_RADIUS)
        .then(|| radius.min(MAX_AVOID_MANEUVER_RADIUS));
    options
}

fn decode_path_segment(segment: &str) -> String {
    segment
        .replace("%3B", ";")
        .replace("%3b", ";")
        .replace("%2C", ",")
        .replace("%2c", ",")
}

fn parse_coordinates(raw: &str) -> Result<Vec<Point>, RouteOptionsError> {
    raw.split(';')
        .map(|pair| {
            let mut parts = pair.split(',');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(lon), Some(lat), None) => {
                    let longitude = lon.trim().parse::<f64>();
                    let latitude = lat.trim().parse::<f64>();
                    match (longitude, latitude) {
                        (Ok(longitude), Ok(latitude)) => Ok(Point::new(longitude, latitude)),
                        _ => Err(RouteOptionsError::InvalidCoordinate(pair.to_string())),
                    }
                }
                _ => Err(RouteOptionsError::InvalidCoordinate(pair.to_string())),
            }
        })
        .collect()
}

fn parse_bearings(raw: &str) -> Result<Vec<Option<Bearing>>, RouteOptionsError> {
    raw.split(';')
        .map(|entry| {
            if entry.is_empty() {
                return Ok(None);
            }
            let (angle, degrees) = entry.split_once(',').ok_or_else(|| {
                RouteOptionsError::InvalidValue {
                    param: "bearings",
                    value: entry.to_string(),
                }
            })?;
            Ok(Some(Bearing::new(
                parse_value("bearings", angle)?,
                parse_value("bearings", degrees)?,
            )))
        })
        .collect()
}

fn parse_value<T: std::str::FromStr>(
    param: &'static str,
    value: &str,
) -> Result<T, RouteOptionsError> {
    value
        .trim()
        .parse()
        .map_err(|_| RouteOptionsError::InvalidValue {
            param,
            value: value.to_string(),
        })
}
