//! Fork translation scenarios read from JSON.

use anyhow::{bail, Context, Result};
use navalt_core::{translate_progress, AlternativeRouteIntersection, DirectionsRoute, RouteProgressData};
use serde::Deserialize;

/// Primary progress plus both fork points and the alternative's geometry.
///
/// The geometry is either `step_point_counts` (`[leg][step] -> points`) or
/// a full `alternative_route` as returned by the directions service.
#[derive(Debug, Clone, Deserialize)]
pub struct ForkScenario {
    pub primary: RouteProgressData,
    pub primary_fork: AlternativeRouteIntersection,
    pub alternative_fork: AlternativeRouteIntersection,
    #[serde(default)]
    pub step_point_counts: Option<Vec<Vec<usize>>>,
    #[serde(default)]
    pub alternative_route: Option<DirectionsRoute>,
}

impl ForkScenario {
    pub fn from_json(raw: &str) -> Result<Self> {
        let scenario: ForkScenario =
            serde_json::from_str(raw).context("Failed to parse fork scenario")?;
        if scenario.step_point_counts.is_some() && scenario.alternative_route.is_some() {
            bail!("Scenario has both step_point_counts and alternative_route");
        }
        Ok(scenario)
    }

    pub fn step_point_counts(&self) -> Vec<Vec<usize>> {
        match (&self.step_point_counts, &self.alternative_route) {
            (Some(counts), _) => counts.clone(),
            (None, Some(route)) => route.step_point_counts(),
            (None, None) => Vec::new(),
        }
    }

    /// Progress on the alternative matching the primary progress.
    pub fn evaluate(&self) -> RouteProgressData {
        translate_progress(
            &self.primary,
            &self.primary_fork,
            &self.alternative_fork,
            &self.step_point_counts(),
        )
    }
}
