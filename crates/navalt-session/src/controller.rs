//! Alternatives controller.
//!
//! Subscribes to the routing engine while anyone observes alternatives,
//! converts engine payloads into navigation routes plus fork metadata and
//! broadcasts them. Engine updates are processed as batches: a newer update
//! cancels the batch still in flight, so observers only ever see the latest
//! set.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use navalt_core::{
    AlternativeRouteMetadata, NavigationRoute, RouteAlternativesError, RouteConversionError,
    RouteOptions, RouteProgress, RouterOrigin,
};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::cache::RouteAlternativesCacheManager;
use crate::engine::{
    EngineAlternativesOptions, NativeAlternativesObserver, NativeAlternativesUpdate, NativeRoute,
    NativeRouteAlternative, RoutingEngine,
};
use crate::observers::{
    AllAlternativesObserversHolder, AlternativesObserver, FirstAndLastObserverListener,
    LOG_TARGET,
};
use crate::trip::TripSession;

pub const ROUTE_PROGRESS_UNAVAILABLE: &str = "Route progress not available, ignoring alternatives update.\nContinuous alternatives are only available in active guidance.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteAlternativesOptions {
    /// How often the engine re-requests alternatives
    pub interval: Duration,
    /// Minimum time to the next maneuver for a fork to be offered
    pub avoid_maneuver_seconds: u32,
}

impl Default for RouteAlternativesOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            avoid_maneuver_seconds: 8,
        }
    }
}

/// Completion of [`RouteAlternativesController::trigger_alternative_request`].
pub trait NavigationRouteAlternativesRequestCallback: Send + Sync {
    fn on_route_alternative_request_finished(
        &self,
        progress: &RouteProgress,
        alternatives: &[NavigationRoute],
        origin: RouterOrigin,
    );

    fn on_route_alternatives_request_error(&self, error: &RouteAlternativesError);
}

/// Result of an on-demand refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativesRefresh {
    pub progress: RouteProgress,
    pub alternatives: Vec<NavigationRoute>,
    pub origin: RouterOrigin,
}

#[derive(Default)]
struct ControllerState {
    /// Alternatives currently held by the engine
    native_alternatives: Vec<NativeRouteAlternative>,
    online_primary: Option<NativeRoute>,
    /// Converted alternatives, replaced as a whole
    alternatives: Arc<Vec<AlternativeRouteMetadata>>,
    last_origin: RouterOrigin,
    batch: Option<CancellationToken>,
}

struct Inner {
    engine: Arc<dyn RoutingEngine>,
    trip_session: Arc<dyn TripSession>,
    cache: Arc<RouteAlternativesCacheManager>,
    observers: AllAlternativesObserversHolder,
    state: Mutex<ControllerState>,
    broadcast_gate: tokio::sync::Mutex<()>,
    paused: AtomicBool,
    runtime: Handle,
}

#[derive(Clone)]
pub struct RouteAlternativesController {
    inner: Arc<Inner>,
}

struct NativeObserver {
    controller: Weak<Inner>,
}

impl NativeAlternativesObserver for NativeObserver {
    fn on_route_alternatives_changed(&self, update: NativeAlternativesUpdate) {
        if let Some(inner) = self.controller.upgrade() {
            inner.on_native_alternatives_updated(update);
        }
    }

    fn on_error(&self, message: String) {
        if let Some(inner) = self.controller.upgrade() {
            inner
                .observers
                .on_route_alternatives_error(&RouteAlternativesError::new(message));
        }
    }
}

/// Keeps exactly one engine subscription while observers exist.
struct EngineSubscription {
    engine: Arc<dyn RoutingEngine>,
    observer: Arc<dyn NativeAlternativesObserver>,
}

impl FirstAndLastObserverListener for EngineSubscription {
    fn on_first_observer(&self) {
        tracing::debug!(target: LOG_TARGET, "First alternatives observer, subscribing to engine");
        self.engine.add_observer(self.observer.clone());
    }

    fn on_last_observer(&self) {
        tracing::debug!(target: LOG_TARGET, "Last alternatives observer gone, unsubscribing from engine");
        self.engine.remove_observer(&self.observer);
    }
}

impl RouteAlternativesController {
    pub fn new(
        options: RouteAlternativesOptions,
        engine: Arc<dyn RoutingEngine>,
        trip_session: Arc<dyn TripSession>,
        cache: Arc<RouteAlternativesCacheManager>,
        runtime: Handle,
    ) -> Self {
        engine.set_route_alternatives_options(EngineAlternativesOptions {
            request_interval_seconds: options.interval.as_secs() as f64,
            min_time_before_maneuver_seconds: f64::from(options.avoid_maneuver_seconds),
        });

        let inner = Arc::new_cyclic(|controller: &Weak<Inner>| {
            let native_observer: Arc<dyn NativeAlternativesObserver> = Arc::new(NativeObserver {
                controller: controller.clone(),
            });
            let observers = AllAlternativesObserversHolder::new();
            observers.add_first_and_last_observer_listener(Arc::new(EngineSubscription {
                engine: engine.clone(),
                observer: native_observer,
            }));
            Inner {
                engine,
                trip_session,
                cache,
                observers,
                state: Mutex::new(ControllerState::default()),
                broadcast_gate: tokio::sync::Mutex::new(()),
                paused: AtomicBool::new(false),
                runtime,
            }
        });

        Self { inner }
    }

    pub fn register(&self, observer: AlternativesObserver) {
        self.inner.observers.register(observer);
    }

    pub fn unregister(&self, observer: &AlternativesObserver) {
        self.inner.observers.unregister(observer);
    }

    /// Drop every observer and every engine subscription.
    pub fn unregister_all(&self) {
        self.inner.observers.clear();
        self.inner.engine.remove_all_observers();
    }

    /// Ignore engine updates until [`resume_updates`](Self::resume_updates).
    pub fn pause_updates(&self) {
        tracing::info!(target: LOG_TARGET, "Pausing alternatives updates");
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume_updates(&self) {
        tracing::info!(target: LOG_TARGET, "Resuming alternatives updates");
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    /// Entry point for engine updates. Normally reached through the engine
    /// subscription.
    pub fn on_native_alternatives_updated(&self, update: NativeAlternativesUpdate) {
        self.inner.on_native_alternatives_updated(update);
    }

    /// Ask the engine for alternatives now and report to `callback`.
    pub fn trigger_alternative_request(
        &self,
        callback: Option<Arc<dyn NavigationRouteAlternativesRequestCallback>>,
    ) {
        self.refresh(move |outcome| {
            let Some(callback) = callback else {
                return;
            };
            match outcome {
                Ok(refresh) => callback.on_route_alternative_request_finished(
                    &refresh.progress,
                    &refresh.alternatives,
                    refresh.origin,
                ),
                Err(error) => callback.on_route_alternatives_request_error(&error),
            }
        });
    }

    /// Async form of [`trigger_alternative_request`](Self::trigger_alternative_request).
    pub async fn request_alternatives(&self) -> Result<AlternativesRefresh, RouteAlternativesError> {
        let (tx, rx) = oneshot::channel();
        self.refresh(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await.unwrap_or_else(|_| {
            Err(RouteAlternativesError::new(
                "Routing engine dropped the alternatives refresh",
            ))
        })
    }

    /// Rebuild the metadata map for newly set routes. Routes without a
    /// matching engine alternative (such as the primary) get no entry, and
    /// an empty list clears the map.
    pub fn process_alternatives_metadata(
        &self,
        routes: &[NavigationRoute],
        native_alternatives: &[NativeRouteAlternative],
    ) {
        let mut state = self.inner.lock_state();
        if let Some(batch) = state.batch.take() {
            batch.cancel();
        }
        if routes.is_empty() {
            state.native_alternatives.clear();
            state.online_primary = None;
            state.alternatives = Arc::new(Vec::new());
            return;
        }

        let mut kept = Vec::new();
        let mut metadata = Vec::new();
        for route in routes {
            if let Some(native) = native_alternatives
                .iter()
                .find(|native| native.route.route_id == route.id)
            {
                metadata.push(metadata_for(route.clone(), native));
                kept.push(native.clone());
            }
        }
        tracing::debug!(target: LOG_TARGET, "Metadata rebuilt for {} of {} routes", metadata.len(), routes.len());
        state.native_alternatives = kept;
        state.alternatives = Arc::new(metadata);
    }

    pub fn get_metadata_for(&self, route: &NavigationRoute) -> Option<AlternativeRouteMetadata> {
        self.inner
            .lock_state()
            .alternatives
            .iter()
            .find(|metadata| metadata.navigation_route.id == route.id)
            .cloned()
    }

    /// Deliver server-computed routes to offboard observers.
    pub fn broadcast_offboard_routes(&self, routes: &[NavigationRoute]) {
        tracing::info!(target: LOG_TARGET, "Broadcasting {} offboard routes", routes.len());
        self.inner.observers.on_offboard_routes_available(routes);
    }

    fn refresh(
        &self,
        on_done: impl FnOnce(Result<AlternativesRefresh, RouteAlternativesError>) + Send + 'static,
    ) {
        let controller = Arc::downgrade(&self.inner);
        self.inner.engine.refresh_immediately(Box::new(move |result| {
            let outcome = match controller.upgrade() {
                Some(inner) => inner.apply_refresh(result),
                None => Err(RouteAlternativesError::new(
                    "Alternatives controller is gone",
                )),
            };
            if let Err(error) = &outcome {
                tracing::error!(target: LOG_TARGET, "Error: {}", error.message);
            }
            on_done(outcome);
        }));
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn on_native_alternatives_updated(self: &Arc<Self>, update: NativeAlternativesUpdate) {
        if self.paused.load(Ordering::SeqCst) {
            tracing::debug!(
                target: LOG_TARGET,
                "Updates paused, ignoring {} added / {} removed alternatives",
                update.added.len(),
                update.removed.len()
            );
            return;
        }

        let token = CancellationToken::new();
        {
            let mut state = self.lock_state();
            let replaced: HashSet<&str> = update
                .removed
                .iter()
                .chain(update.added.iter())
                .map(|alternative| alternative.route.route_id.as_str())
                .collect();
            state
                .native_alternatives
                .retain(|alternative| !replaced.contains(alternative.route.route_id.as_str()));
            state.native_alternatives.extend(update.added.iter().cloned());
            state.online_primary = update.online_primary_route.clone();
            if let Some(last) = update.added.last() {
                state.last_origin = last.route.router_origin;
            }
            if let Some(previous) = state.batch.replace(token.clone()) {
                previous.cancel();
            }
        }

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            inner.process_batch(token).await;
        });
    }

    async fn process_batch(&self, token: CancellationToken) {
        let _gate = self.broadcast_gate.lock().await;
        if token.is_cancelled() {
            tracing::debug!(target: LOG_TARGET, "Alternatives batch superseded");
            return;
        }

        let (natives, online_primary, known) = {
            let state = self.lock_state();
            (
                state.native_alternatives.clone(),
                state.online_primary.clone(),
                state.alternatives.clone(),
            )
        };

        let mut metadata = Vec::with_capacity(natives.len());
        let mut rejected = Vec::new();
        for native in &natives {
            match convert_alternative(native, &known) {
                Ok(converted) => metadata.push(converted),
                Err(e) => rejected.push((native.route.route_id.clone(), e)),
            }
        }
        let mut primary_rejected = false;
        let online_primary = match &online_primary {
            Some(native) => match convert_route(native) {
                Ok(route) => Some(route),
                Err(e) => {
                    rejected.push((native.route_id.clone(), e));
                    primary_rejected = true;
                    None
                }
            },
            None => None,
        };

        let (alternatives, origin) = {
            let mut state = self.lock_state();
            if token.is_cancelled() {
                tracing::debug!(target: LOG_TARGET, "Alternatives batch superseded");
                return;
            }
            // Unreadable routes leave the set so later batches are not blocked by them
            state
                .native_alternatives
                .retain(|native| !rejected.iter().any(|(id, _)| *id == native.route.route_id));
            if primary_rejected {
                state.online_primary = None;
            }
            state.alternatives = Arc::new(metadata);
            state.batch = None;
            (state.alternatives.clone(), state.last_origin)
        };

        for (id, e) in &rejected {
            self.observers.on_route_alternatives_error(&RouteAlternativesError::new(format!(
                "Skipping route {}, engine payload is malformed: {}",
                id, e
            )));
        }
        self.broadcast(&alternatives, online_primary, origin);
    }

    fn broadcast(
        &self,
        alternatives: &[AlternativeRouteMetadata],
        online_primary: Option<NavigationRoute>,
        origin: RouterOrigin,
    ) {
        let Some(progress) = self.trip_session.route_progress() else {
            tracing::warn!(target: LOG_TARGET, "{}", ROUTE_PROGRESS_UNAVAILABLE);
            return;
        };
        let routes = routes_to_broadcast(&progress, online_primary, alternatives);
        tracing::debug!(target: LOG_TARGET, "Broadcasting {} alternatives from {:?}", routes.len(), origin);
        self.cache.push(&routes);
        self.observers.on_route_alternatives(&progress, &routes, origin);
    }

    fn apply_refresh(
        &self,
        result: Result<Vec<NativeRouteAlternative>, String>,
    ) -> Result<AlternativesRefresh, RouteAlternativesError> {
        let natives = result.map_err(RouteAlternativesError::new)?;
        let progress = self
            .trip_session
            .route_progress()
            .ok_or_else(|| RouteAlternativesError::new(ROUTE_PROGRESS_UNAVAILABLE))?;

        let known = self.lock_state().alternatives.clone();
        let metadata = convert_alternatives(&natives, &known).map_err(|e| {
            RouteAlternativesError::new(format!("Failed to read alternatives from engine: {}", e))
        })?;

        let (alternatives, origin) = {
            let mut state = self.lock_state();
            if let Some(batch) = state.batch.take() {
                batch.cancel();
            }
            if let Some(last) = natives.last() {
                state.last_origin = last.route.router_origin;
            }
            state.native_alternatives = natives;
            state.alternatives = Arc::new(metadata);
            (state.alternatives.clone(), state.last_origin)
        };

        let alternatives = routes_to_broadcast(&progress, None, &alternatives);
        self.cache.push(&alternatives);
        Ok(AlternativesRefresh {
            progress,
            alternatives,
            origin,
        })
    }
}

/// Online primary first, then alternatives, never the current primary.
fn routes_to_broadcast(
    progress: &RouteProgress,
    online_primary: Option<NavigationRoute>,
    alternatives: &[AlternativeRouteMetadata],
) -> Vec<NavigationRoute> {
    let primary_id = progress.navigation_route.id.as_str();
    online_primary
        .into_iter()
        .chain(
            alternatives
                .iter()
                .map(|metadata| metadata.navigation_route.clone()),
        )
        .filter(|route| route.id != primary_id)
        .collect()
}

fn convert_alternatives(
    natives: &[NativeRouteAlternative],
    known: &[AlternativeRouteMetadata],
) -> Result<Vec<AlternativeRouteMetadata>, RouteConversionError> {
    natives
        .iter()
        .map(|native| convert_alternative(native, known))
        .collect()
}

/// Convert one engine alternative, reusing the route already built for the
/// same id.
fn convert_alternative(
    native: &NativeRouteAlternative,
    known: &[AlternativeRouteMetadata],
) -> Result<AlternativeRouteMetadata, RouteConversionError> {
    let route = match known
        .iter()
        .find(|metadata| metadata.navigation_route.id == native.route.route_id)
    {
        Some(metadata) => metadata.navigation_route.clone(),
        None => convert_route(&native.route)?,
    };
    Ok(metadata_for(route, native))
}

fn convert_route(native: &NativeRoute) -> Result<NavigationRoute, RouteConversionError> {
    let options = RouteOptions::from_url(&native.request_uri)?;
    NavigationRoute::from_response_json(
        native.route_id.clone(),
        &native.response_json,
        native.route_index,
        options,
        native.router_origin,
    )
}

fn metadata_for(route: NavigationRoute, native: &NativeRouteAlternative) -> AlternativeRouteMetadata {
    AlternativeRouteMetadata {
        navigation_route: route,
        fork_intersection_of_alternative_route: native.alternative_route_fork,
        fork_intersection_of_primary_route: native.main_route_fork,
        info_from_fork: native.info_from_fork,
        info_from_start_of_primary: native.info_from_start,
        alternative_id: native.id,
    }
}
