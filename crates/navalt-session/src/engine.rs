//! Routing engine boundary.
//!
//! The native engine computes alternatives continuously and pushes them to
//! subscribed observers. [`RoutingEngine`] is the capability set this crate
//! needs from it. [`NativeBridge`] is the production adapter the host feeds
//! with engine callbacks.

use std::sync::{Arc, Mutex};

use navalt_core::{AlternativeRouteInfo, AlternativeRouteIntersection, RouterOrigin};
use serde::{Deserialize, Serialize};

/// A route as held by the engine: the raw response plus request context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeRoute {
    pub route_id: String,
    pub response_json: String,
    pub request_uri: String,
    pub route_index: usize,
    pub router_origin: RouterOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeRouteAlternative {
    pub id: i32,
    pub route: NativeRoute,
    pub alternative_route_fork: AlternativeRouteIntersection,
    pub main_route_fork: AlternativeRouteIntersection,
    pub info_from_fork: AlternativeRouteInfo,
    pub info_from_start: AlternativeRouteInfo,
    pub is_new: bool,
}

/// Change set pushed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeAlternativesUpdate {
    /// Server-computed replacement for an onboard primary route
    #[serde(default)]
    pub online_primary_route: Option<NativeRoute>,
    #[serde(default)]
    pub added: Vec<NativeRouteAlternative>,
    #[serde(default)]
    pub removed: Vec<NativeRouteAlternative>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineAlternativesOptions {
    pub request_interval_seconds: f64,
    pub min_time_before_maneuver_seconds: f64,
}

pub trait NativeAlternativesObserver: Send + Sync {
    fn on_route_alternatives_changed(&self, update: NativeAlternativesUpdate);

    /// The engine failed to compute alternatives.
    fn on_error(&self, message: String);
}

/// Completion of an immediate refresh: the engine's full alternative set or
/// its error message.
pub type RefreshCallback = Box<dyn FnOnce(Result<Vec<NativeRouteAlternative>, String>) + Send>;

pub trait RoutingEngine: Send + Sync {
    fn set_route_alternatives_options(&self, options: EngineAlternativesOptions);
    fn add_observer(&self, observer: Arc<dyn NativeAlternativesObserver>);
    fn remove_observer(&self, observer: &Arc<dyn NativeAlternativesObserver>);
    fn remove_all_observers(&self);
    fn refresh_immediately(&self, callback: RefreshCallback);
}

type Refresher = Box<dyn Fn(RefreshCallback) + Send + Sync>;

/// Adapter between the host's native engine callbacks and [`RoutingEngine`].
///
/// The host calls [`NativeBridge::dispatch`] with every engine update and
/// supplies the function that triggers an engine refresh.
pub struct NativeBridge {
    options: Mutex<Option<EngineAlternativesOptions>>,
    observers: Mutex<Vec<Arc<dyn NativeAlternativesObserver>>>,
    refresher: Refresher,
}

impl NativeBridge {
    pub fn new(refresher: impl Fn(RefreshCallback) + Send + Sync + 'static) -> Self {
        Self {
            options: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
            refresher: Box::new(refresher),
        }
    }

    /// Options last pushed by the controller, for the host to apply.
    pub fn options(&self) -> Option<EngineAlternativesOptions> {
        *self.options.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn observer_count(&self) -> usize {
        self.observers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Forward an engine update to every subscribed observer.
    pub fn dispatch(&self, update: NativeAlternativesUpdate) {
        let observers = self.snapshot();
        tracing::trace!(
            "Dispatching {} added / {} removed alternatives to {} observers",
            update.added.len(),
            update.removed.len(),
            observers.len()
        );
        for observer in observers {
            observer.on_route_alternatives_changed(update.clone());
        }
    }

    /// Forward an engine error to every subscribed observer.
    pub fn dispatch_error(&self, message: &str) {
        for observer in self.snapshot() {
            observer.on_error(message.to_string());
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn NativeAlternativesObserver>> {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl RoutingEngine for NativeBridge {
    fn set_route_alternatives_options(&self, options: EngineAlternativesOptions) {
        *self.options.lock().unwrap_or_else(|e| e.into_inner()) = Some(options);
    }

    fn add_observer(&self, observer: Arc<dyn NativeAlternativesObserver>) {
        let mut observers = self.observers.lock().unwrap_or_else(|e| e.into_inner());
        if !observers.iter().any(|existing| Arc::ptr_eq(existing, &observer)) {
            observers.push(observer);
        }
    }

    fn remove_observer(&self, observer: &Arc<dyn NativeAlternativesObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|existing| !Arc::ptr_eq(existing, observer));
    }

    fn remove_all_observers(&self) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn refresh_immediately(&self, callback: RefreshCallback) {
        (self.refresher)(callback);
    }
}
