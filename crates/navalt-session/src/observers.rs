//! Observer registry for alternatives.
//!
//! Three generations of observers share one subscriber list so there is a
//! single dispatch path. Registration is keyed by `Arc` identity. Dispatch
//! walks a snapshot of the list, so an observer may unregister itself (or
//! others) while being notified.

use std::sync::{Arc, Mutex};

use navalt_core::{
    DirectionsRoute, NavigationRoute, RouteAlternativesError, RouteProgress, RouterOrigin,
};

pub(crate) const LOG_TARGET: &str = "RouteAlternativesController";

/// Legacy observer receiving plain directions routes.
pub trait RouteAlternativesObserver: Send + Sync {
    fn on_route_alternatives(
        &self,
        progress: &RouteProgress,
        alternatives: &[DirectionsRoute],
        origin: RouterOrigin,
    );
}

pub trait NavigationRouteAlternativesObserver: Send + Sync {
    fn on_route_alternatives(
        &self,
        progress: &RouteProgress,
        alternatives: &[NavigationRoute],
        origin: RouterOrigin,
    );

    fn on_route_alternatives_error(&self, error: &RouteAlternativesError);
}

/// Receives server-computed routes produced for an onboard primary route.
pub trait OffboardRoutesObserver: Send + Sync {
    fn on_offboard_routes_available(&self, routes: &[NavigationRoute]);
}

/// Hooks fired when the registry gains its first observer or loses its last.
pub trait FirstAndLastObserverListener: Send + Sync {
    fn on_first_observer(&self);
    fn on_last_observer(&self);
}

/// Any of the supported observer kinds.
#[derive(Clone)]
pub enum AlternativesObserver {
    Legacy(Arc<dyn RouteAlternativesObserver>),
    Navigation(Arc<dyn NavigationRouteAlternativesObserver>),
    Offboard(Arc<dyn OffboardRoutesObserver>),
}

impl AlternativesObserver {
    pub fn legacy<T: RouteAlternativesObserver + 'static>(observer: Arc<T>) -> Self {
        Self::Legacy(observer)
    }

    pub fn navigation<T: NavigationRouteAlternativesObserver + 'static>(observer: Arc<T>) -> Self {
        Self::Navigation(observer)
    }

    pub fn offboard<T: OffboardRoutesObserver + 'static>(observer: Arc<T>) -> Self {
        Self::Offboard(observer)
    }

    fn same_as(&self, other: &AlternativesObserver) -> bool {
        match (self, other) {
            (Self::Legacy(a), Self::Legacy(b)) => Arc::ptr_eq(a, b),
            (Self::Navigation(a), Self::Navigation(b)) => Arc::ptr_eq(a, b),
            (Self::Offboard(a), Self::Offboard(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Default)]
struct Registry {
    observers: Vec<AlternativesObserver>,
    listeners: Vec<Arc<dyn FirstAndLastObserverListener>>,
}

enum Transition {
    None,
    First(Vec<Arc<dyn FirstAndLastObserverListener>>),
    Last(Vec<Arc<dyn FirstAndLastObserverListener>>),
}

impl Transition {
    fn fire(self) {
        match self {
            Transition::None => {}
            Transition::First(listeners) => listeners.iter().for_each(|l| l.on_first_observer()),
            Transition::Last(listeners) => listeners.iter().for_each(|l| l.on_last_observer()),
        }
    }
}

/// Observer hub. First/last hooks run outside the registry lock, so
/// observers can be notified while a hook is running, but hooks never
/// overlap or reorder. A hook must not register or unregister observers.
#[derive(Default)]
pub struct AllAlternativesObserversHolder {
    registry: Mutex<Registry>,
    /// Held from deciding a first/last transition until its hooks return
    transitions: Mutex<()>,
}

impl AllAlternativesObserversHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: AlternativesObserver) {
        let _transitions = self.transitions.lock().unwrap_or_else(|e| e.into_inner());
        let transition = {
            let mut registry = self.lock();
            if registry.observers.iter().any(|o| o.same_as(&observer)) {
                Transition::None
            } else {
                registry.observers.push(observer);
                if registry.observers.len() == 1 {
                    Transition::First(registry.listeners.clone())
                } else {
                    Transition::None
                }
            }
        };
        transition.fire();
    }

    pub fn unregister(&self, observer: &AlternativesObserver) {
        let _transitions = self.transitions.lock().unwrap_or_else(|e| e.into_inner());
        let transition = {
            let mut registry = self.lock();
            let before = registry.observers.len();
            registry.observers.retain(|o| !o.same_as(observer));
            if before > 0 && registry.observers.is_empty() {
                Transition::Last(registry.listeners.clone())
            } else {
                Transition::None
            }
        };
        transition.fire();
    }

    /// Remove every observer.
    pub fn clear(&self) {
        let _transitions = self.transitions.lock().unwrap_or_else(|e| e.into_inner());
        let transition = {
            let mut registry = self.lock();
            if registry.observers.is_empty() {
                Transition::None
            } else {
                registry.observers.clear();
                Transition::Last(registry.listeners.clone())
            }
        };
        transition.fire();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().observers.is_empty()
    }

    pub fn add_first_and_last_observer_listener(
        &self,
        listener: Arc<dyn FirstAndLastObserverListener>,
    ) {
        let mut registry = self.lock();
        if !registry.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            registry.listeners.push(listener);
        }
    }

    pub fn remove_first_and_last_observer_listener(
        &self,
        listener: &Arc<dyn FirstAndLastObserverListener>,
    ) {
        self.lock().listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn on_route_alternatives(
        &self,
        progress: &RouteProgress,
        alternatives: &[NavigationRoute],
        origin: RouterOrigin,
    ) {
        let observers = self.snapshot();
        let mut directions_routes: Option<Vec<DirectionsRoute>> = None;
        for observer in &observers {
            match observer {
                AlternativesObserver::Legacy(legacy) => {
                    let routes = directions_routes.get_or_insert_with(|| {
                        alternatives
                            .iter()
                            .map(|route| route.directions_route.clone())
                            .collect()
                    });
                    legacy.on_route_alternatives(progress, routes, origin);
                }
                AlternativesObserver::Navigation(navigation) => {
                    navigation.on_route_alternatives(progress, alternatives, origin);
                }
                AlternativesObserver::Offboard(_) => {}
            }
        }
    }

    /// Report an error to navigation observers. Always logged.
    pub fn on_route_alternatives_error(&self, error: &RouteAlternativesError) {
        tracing::error!(target: LOG_TARGET, "Error: {}", error.message);
        for observer in &self.snapshot() {
            if let AlternativesObserver::Navigation(navigation) = observer {
                navigation.on_route_alternatives_error(error);
            }
        }
    }

    pub fn on_offboard_routes_available(&self, routes: &[NavigationRoute]) {
        for observer in &self.snapshot() {
            if let AlternativesObserver::Offboard(offboard) = observer {
                offboard.on_offboard_routes_available(routes);
            }
        }
    }

    fn snapshot(&self) -> Vec<AlternativesObserver> {
        self.lock().observers.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}
