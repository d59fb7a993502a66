//! Cache of the alternatives last broadcast during active guidance.

use std::collections::HashSet;
use std::sync::Mutex;

use navalt_core::{NavigationRoute, NavigationSessionState};

use crate::trip::NavigationSessionStateObserver;

const LOG_TARGET: &str = "RouteAlternativesCacheManager";

#[derive(Debug, Default)]
struct CacheState {
    guidance_active: bool,
    route_ids: HashSet<String>,
}

/// Remembers which alternatives were last offered, but only while in
/// active guidance. Leaving guidance clears it.
#[derive(Debug, Default)]
pub struct RouteAlternativesCacheManager {
    state: Mutex<CacheState>,
}

impl RouteAlternativesCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached set. Ignored outside active guidance.
    pub fn push(&self, routes: &[NavigationRoute]) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.guidance_active {
            tracing::debug!(target: LOG_TARGET, "Not in active guidance, ignoring {} routes", routes.len());
            return;
        }
        state.route_ids = routes.iter().map(|route| route.id.clone()).collect();
    }

    /// Whether every candidate is a cached alternative. Vacuously true for
    /// an empty list.
    pub fn are_alternatives(&self, candidates: &[NavigationRoute]) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        candidates
            .iter()
            .all(|route| state.route_ids.contains(&route.id))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).route_ids.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NavigationSessionStateObserver for RouteAlternativesCacheManager {
    fn on_navigation_session_state_changed(&self, session_state: NavigationSessionState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match session_state {
            NavigationSessionState::ActiveGuidance => state.guidance_active = true,
            NavigationSessionState::Idle | NavigationSessionState::FreeDrive => {
                state.guidance_active = false;
                state.route_ids.clear();
            }
        }
    }
}
