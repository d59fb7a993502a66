//! Trip session: the live source of route progress, location and
//! navigation session state.

use std::sync::{Arc, Mutex};

use navalt_core::{LocationMatcherResult, NavigationSessionState, RouteProgress};
use tokio::sync::watch;

pub trait TripSession: Send + Sync {
    fn route_progress(&self) -> Option<RouteProgress>;
    fn location_matcher_result(&self) -> Option<LocationMatcherResult>;
    fn session_state(&self) -> NavigationSessionState;
}

pub trait NavigationSessionStateObserver: Send + Sync {
    fn on_navigation_session_state_changed(&self, state: NavigationSessionState);
}

/// Trip session backed by watch channels.
///
/// Producers push the latest values, consumers either read them directly or
/// subscribe to changes.
pub struct LiveTripSession {
    progress: watch::Sender<Option<RouteProgress>>,
    location: watch::Sender<Option<LocationMatcherResult>>,
    state: watch::Sender<NavigationSessionState>,
    state_observers: Mutex<Vec<Arc<dyn NavigationSessionStateObserver>>>,
}

impl Default for LiveTripSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveTripSession {
    pub fn new() -> Self {
        Self {
            progress: watch::Sender::new(None),
            location: watch::Sender::new(None),
            state: watch::Sender::new(NavigationSessionState::Idle),
            state_observers: Mutex::new(Vec::new()),
        }
    }

    pub fn update_route_progress(&self, progress: Option<RouteProgress>) {
        self.progress.send_replace(progress);
    }

    pub fn update_location(&self, location: LocationMatcherResult) {
        self.location.send_replace(Some(location));
    }

    /// Change the session state, notifying observers if it differs.
    pub fn set_session_state(&self, state: NavigationSessionState) {
        let previous = self.state.send_replace(state);
        if previous == state {
            return;
        }
        tracing::debug!("Navigation session state changed: {:?} -> {:?}", previous, state);
        let observers = self
            .state_observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for observer in observers {
            observer.on_navigation_session_state_changed(state);
        }
    }

    /// Register for state changes. The observer immediately receives the
    /// current state.
    pub fn register_state_observer(&self, observer: Arc<dyn NavigationSessionStateObserver>) {
        {
            let mut observers = self.state_observers.lock().unwrap_or_else(|e| e.into_inner());
            if observers.iter().any(|existing| Arc::ptr_eq(existing, &observer)) {
                return;
            }
            observers.push(observer.clone());
        }
        observer.on_navigation_session_state_changed(*self.state.borrow());
    }

    pub fn unregister_state_observer(&self, observer: &Arc<dyn NavigationSessionStateObserver>) {
        self.state_observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|existing| !Arc::ptr_eq(existing, observer));
    }

    pub fn subscribe_route_progress(&self) -> watch::Receiver<Option<RouteProgress>> {
        self.progress.subscribe()
    }

    pub fn subscribe_location(&self) -> watch::Receiver<Option<LocationMatcherResult>> {
        self.location.subscribe()
    }
}

impl TripSession for LiveTripSession {
    fn route_progress(&self) -> Option<RouteProgress> {
        self.progress.borrow().clone()
    }

    fn location_matcher_result(&self) -> Option<LocationMatcherResult> {
        self.location.borrow().clone()
    }

    fn session_state(&self) -> NavigationSessionState {
        *self.state.borrow()
    }
}
