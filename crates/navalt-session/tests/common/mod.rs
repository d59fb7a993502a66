//! Shared fixtures for session integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use navalt_core::{
    AlternativeRouteInfo, AlternativeRouteIntersection, DirectionsRequestResult, DirectionsResponse,
    DirectionsRoute, Location, LocationMatcherResult, NavigationRoute, Point, RouteAlternativesError,
    RouteOptions, RouteProgress, RouteProgressData, RouteRequester, RouterOrigin,
};
use navalt_session::{
    EngineAlternativesOptions, NativeAlternativesObserver, NativeAlternativesUpdate, NativeRoute,
    NativeRouteAlternative, NavigationRouteAlternativesObserver, OffboardRoutesObserver,
    RefreshCallback, RouteAlternativesObserver, RoutingEngine,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const REQUEST_URI: &str = "https://api.mapbox.com/directions/v5/mapbox/driving-traffic/\
    -122.523,37.975;-122.450,37.900;-122.387,37.809\
    ?alternatives=true&geometries=geojson&bearings=0,45;;";

pub fn request_options() -> RouteOptions {
    RouteOptions::from_url(REQUEST_URI).expect("fixture url")
}

/// Response body with one route per entry of `routes` (`[leg][step] -> points`).
pub fn response_json(uuid: &str, routes: &[Vec<Vec<usize>>]) -> String {
    let routes: Vec<serde_json::Value> = routes
        .iter()
        .map(|legs| {
            let legs: Vec<serde_json::Value> = legs
                .iter()
                .map(|steps| {
                    let steps: Vec<serde_json::Value> = steps
                        .iter()
                        .map(|points| {
                            let coordinates = vec![[-122.4, 37.9]; *points];
                            serde_json::json!({
                                "geometry": { "type": "LineString", "coordinates": coordinates }
                            })
                        })
                        .collect();
                    serde_json::json!({ "distance": 100.0, "duration": 10.0, "steps": steps })
                })
                .collect();
            serde_json::json!({ "distance": 1000.0, "duration": 100.0, "legs": legs })
        })
        .collect();
    serde_json::json!({ "code": "Ok", "uuid": uuid, "routes": routes }).to_string()
}

pub fn native_route(uuid: &str, origin: RouterOrigin) -> NativeRoute {
    NativeRoute {
        route_id: format!("{}#0", uuid),
        response_json: response_json(uuid, &[vec![vec![10, 7], vec![5]]]),
        request_uri: REQUEST_URI.to_string(),
        route_index: 0,
        router_origin: origin,
    }
}

fn fork(leg_index: usize, in_route: usize) -> AlternativeRouteIntersection {
    AlternativeRouteIntersection {
        point: Point::new(-122.45, 37.9),
        geometry_index_in_route: in_route,
        geometry_index_in_leg: in_route,
        leg_index,
    }
}

pub fn native_alternative(id: i32, uuid: &str, origin: RouterOrigin) -> NativeRouteAlternative {
    NativeRouteAlternative {
        id,
        route: native_route(uuid, origin),
        alternative_route_fork: fork(0, 12),
        main_route_fork: fork(0, 15),
        info_from_fork: AlternativeRouteInfo {
            distance: 500.0,
            duration: 50.0,
        },
        info_from_start: AlternativeRouteInfo {
            distance: 1000.0,
            duration: 100.0,
        },
        is_new: true,
    }
}

pub fn added(alternatives: Vec<NativeRouteAlternative>) -> NativeAlternativesUpdate {
    NativeAlternativesUpdate {
        added: alternatives,
        ..Default::default()
    }
}

pub fn navigation_route(id: &str, origin: RouterOrigin) -> NavigationRoute {
    NavigationRoute {
        id: id.to_string(),
        origin,
        route_options: request_options(),
        directions_route: DirectionsRoute::default(),
        route_index: 0,
        response_uuid: None,
    }
}

pub fn route_progress(primary: NavigationRoute, remaining_waypoints: usize) -> RouteProgress {
    RouteProgress {
        navigation_route: primary,
        progress: RouteProgressData::new(0, 3, 3),
        remaining_waypoints,
    }
}

pub fn location(longitude: f64, latitude: f64, bearing: f64, speed: f64) -> LocationMatcherResult {
    LocationMatcherResult {
        enhanced_location: Location {
            longitude,
            latitude,
            bearing: Some(bearing),
            speed: Some(speed),
            timestamp: Utc::now(),
        },
    }
}

/// Routing engine double recording subscriptions.
#[derive(Default)]
pub struct FakeRoutingEngine {
    pub options: Mutex<Vec<EngineAlternativesOptions>>,
    observers: Mutex<Vec<Arc<dyn NativeAlternativesObserver>>>,
    pub add_calls: AtomicUsize,
    pub remove_calls: AtomicUsize,
    pub remove_all_calls: AtomicUsize,
    refresh_result: Mutex<Option<Result<Vec<NativeRouteAlternative>, String>>>,
}

impl FakeRoutingEngine {
    /// Deliver an update the way the engine would.
    pub fn push(&self, update: NativeAlternativesUpdate) {
        let observers = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.on_route_alternatives_changed(update.clone());
        }
    }

    /// Deliver an engine error the way the engine would.
    pub fn push_error(&self, message: &str) {
        let observers = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.on_error(message.to_string());
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    pub fn set_refresh_result(&self, result: Result<Vec<NativeRouteAlternative>, String>) {
        *self.refresh_result.lock().unwrap() = Some(result);
    }

    pub fn adds(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

impl RoutingEngine for FakeRoutingEngine {
    fn set_route_alternatives_options(&self, options: EngineAlternativesOptions) {
        self.options.lock().unwrap().push(options);
    }

    fn add_observer(&self, observer: Arc<dyn NativeAlternativesObserver>) {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.observers.lock().unwrap().push(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn NativeAlternativesObserver>) {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.observers
            .lock()
            .unwrap()
            .retain(|existing| !Arc::ptr_eq(existing, observer));
    }

    fn remove_all_observers(&self) {
        self.remove_all_calls.fetch_add(1, Ordering::SeqCst);
        self.observers.lock().unwrap().clear();
    }

    fn refresh_immediately(&self, callback: RefreshCallback) {
        let result = self
            .refresh_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(Vec::new()));
        callback(result);
    }
}

#[derive(Debug, Clone)]
pub enum Delivery {
    Alternatives {
        progress: RouteProgress,
        routes: Vec<NavigationRoute>,
        origin: RouterOrigin,
    },
    Legacy {
        routes: Vec<DirectionsRoute>,
        origin: RouterOrigin,
    },
    Error(RouteAlternativesError),
    Offboard(Vec<NavigationRoute>),
}

/// Observer forwarding everything it receives to a channel.
pub struct Recorder {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl Recorder {
    pub fn channel() -> (Arc<Recorder>, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Recorder { tx }), rx)
    }
}

impl NavigationRouteAlternativesObserver for Recorder {
    fn on_route_alternatives(
        &self,
        progress: &RouteProgress,
        alternatives: &[NavigationRoute],
        origin: RouterOrigin,
    ) {
        let _ = self.tx.send(Delivery::Alternatives {
            progress: progress.clone(),
            routes: alternatives.to_vec(),
            origin,
        });
    }

    fn on_route_alternatives_error(&self, error: &RouteAlternativesError) {
        let _ = self.tx.send(Delivery::Error(error.clone()));
    }
}

impl RouteAlternativesObserver for Recorder {
    fn on_route_alternatives(
        &self,
        _progress: &RouteProgress,
        alternatives: &[DirectionsRoute],
        origin: RouterOrigin,
    ) {
        let _ = self.tx.send(Delivery::Legacy {
            routes: alternatives.to_vec(),
            origin,
        });
    }
}

impl OffboardRoutesObserver for Recorder {
    fn on_offboard_routes_available(&self, routes: &[NavigationRoute]) {
        let _ = self.tx.send(Delivery::Offboard(routes.to_vec()));
    }
}

pub async fn next_delivery(rx: &mut mpsc::UnboundedReceiver<Delivery>) -> Delivery {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no delivery in time")
        .expect("recorder dropped")
}

/// Let spawned batches run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Scripted route requester. Each call pops the next response; when the
/// script runs out it answers `RetryableError`.
pub struct ScriptedRequester {
    script: Mutex<VecDeque<anyhow::Result<DirectionsRequestResult>>>,
    latency: Duration,
    pub requests: Mutex<Vec<(RouteOptions, Instant)>>,
}

impl ScriptedRequester {
    pub fn new(
        script: Vec<anyhow::Result<DirectionsRequestResult>>,
        latency: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            latency,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> (RouteOptions, Instant) {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl RouteRequester for ScriptedRequester {
    async fn request_routes(
        &self,
        options: &RouteOptions,
    ) -> anyhow::Result<DirectionsRequestResult> {
        self.requests
            .lock()
            .unwrap()
            .push((options.clone(), Instant::now()));
        tokio::time::sleep(self.latency).await;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(DirectionsRequestResult::RetryableError))
    }
}

pub fn online_response(uuid: &str) -> DirectionsRequestResult {
    let response: DirectionsResponse =
        serde_json::from_str(&response_json(uuid, &[vec![vec![4, 6]], vec![vec![3]]]))
            .expect("fixture response");
    DirectionsRequestResult::SuccessfulResponse(response)
}
