//! Fork progress translation.
//!
//! Maps a position on the primary route to the equivalent position on an
//! alternative route. Before the fork both routes share geometry, so the
//! alternative position is the primary one shifted by the difference of the
//! fork indices. Leg boundaries of the alternative are recovered by walking
//! its step geometry.

use crate::models::{AlternativeRouteIntersection, AlternativeRouteMetadata, RouteProgressData};

/// Progress on the alternative route of `metadata` for the given primary progress.
pub fn alternative_route_progress(
    primary: &RouteProgressData,
    metadata: &AlternativeRouteMetadata,
) -> RouteProgressData {
    let step_point_counts = metadata
        .navigation_route
        .directions_route
        .step_point_counts();
    translate_progress(
        primary,
        &metadata.fork_intersection_of_primary_route,
        &metadata.fork_intersection_of_alternative_route,
        &step_point_counts,
    )
}

/// Leg of the alternative route matching the given primary progress.
pub fn alternative_leg_index(
    primary: &RouteProgressData,
    metadata: &AlternativeRouteMetadata,
) -> usize {
    alternative_route_progress(primary, metadata).leg_index
}

/// Translate primary progress using explicit fork points and the alternative's
/// step point counts (`[leg][step] -> points`).
///
/// Consecutive steps share their boundary point, so a step of `n` points
/// spans `n - 1` geometry indices.
pub fn translate_progress(
    primary: &RouteProgressData,
    primary_fork: &AlternativeRouteIntersection,
    alternative_fork: &AlternativeRouteIntersection,
    step_point_counts: &[Vec<usize>],
) -> RouteProgressData {
    // Fork reached or passed: the device is at the alternative's own fork.
    if primary.route_geometry_index >= primary_fork.geometry_index_in_route {
        return RouteProgressData::from(alternative_fork);
    }

    if primary_fork.geometry_index_in_route == alternative_fork.geometry_index_in_route
        && primary_fork.leg_index == 0
        && alternative_fork.leg_index == 0
    {
        return *primary;
    }

    let index_diff = primary_fork.geometry_index_in_route as i64
        - alternative_fork.geometry_index_in_route as i64;
    let route_index = primary.route_geometry_index as i64 - index_diff;
    if route_index < 0 {
        return RouteProgressData::default();
    }
    let route_index = route_index as usize;

    let mut leg_start = 0;
    for (leg_index, steps) in step_point_counts.iter().enumerate() {
        let leg_length: usize = steps.iter().map(|points| points.saturating_sub(1)).sum();
        let offset = route_index - leg_start;
        let is_last = leg_index + 1 == step_point_counts.len()
            || leg_index >= alternative_fork.leg_index;
        if is_last || offset < leg_length {
            return RouteProgressData::new(leg_index, route_index, offset);
        }
        leg_start += leg_length;
    }

    RouteProgressData::new(0, route_index, route_index)
}
