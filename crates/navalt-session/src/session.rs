//! Alternatives session: wires the trip session, cache, controller and the
//! online loop together for one navigation session.

use std::sync::Arc;

use navalt_core::{NavigationRoute, RouteRequester};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::cache::RouteAlternativesCacheManager;
use crate::config::Config;
use crate::controller::RouteAlternativesController;
use crate::engine::{NativeRouteAlternative, RoutingEngine};
use crate::loops::online_alternatives_loop::{
    run_online_alternatives_loop, OnlineAlternativesInputs, RoutesEvent,
};
use crate::trip::LiveTripSession;

pub struct AlternativesSession {
    trip: Arc<LiveTripSession>,
    cache: Arc<RouteAlternativesCacheManager>,
    controller: RouteAlternativesController,
    routes_tx: mpsc::UnboundedSender<RoutesEvent>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl AlternativesSession {
    /// Build the session and spawn its background tasks on `runtime`.
    pub fn start(
        config: &Config,
        engine: Arc<dyn RoutingEngine>,
        requester: Arc<dyn RouteRequester>,
        runtime: Handle,
    ) -> Self {
        let trip = Arc::new(LiveTripSession::new());
        let cache = Arc::new(RouteAlternativesCacheManager::new());
        trip.register_state_observer(cache.clone());

        let controller = RouteAlternativesController::new(
            config.alternatives_options(),
            engine,
            trip.clone(),
            cache.clone(),
            runtime.clone(),
        );

        let (routes_tx, routes_rx) = mpsc::unbounded_channel();
        let (online_tx, mut online_rx) = mpsc::unbounded_channel::<Vec<NavigationRoute>>();
        let (shutdown_tx, _) = broadcast::channel(1);

        let inputs = OnlineAlternativesInputs {
            routes: routes_rx,
            route_progress: trip.subscribe_route_progress(),
            location: trip.subscribe_location(),
        };
        let online_loop = runtime.spawn(run_online_alternatives_loop(
            inputs,
            requester,
            config.online_alternatives(),
            online_tx,
            shutdown_tx.subscribe(),
        ));

        let forwarder = {
            let controller = controller.clone();
            let mut shutdown = shutdown_tx.subscribe();
            runtime.spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        routes = online_rx.recv() => match routes {
                            Some(routes) => controller.broadcast_offboard_routes(&routes),
                            None => break,
                        },
                    }
                }
            })
        };

        tracing::info!("Alternatives session started");
        Self {
            trip,
            cache,
            controller,
            routes_tx,
            shutdown_tx,
            tasks: vec![online_loop, forwarder],
        }
    }

    pub fn controller(&self) -> &RouteAlternativesController {
        &self.controller
    }

    pub fn trip_session(&self) -> &Arc<LiveTripSession> {
        &self.trip
    }

    pub fn cache(&self) -> &Arc<RouteAlternativesCacheManager> {
        &self.cache
    }

    /// Commit a new route set, primary first.
    ///
    /// Fork metadata is rebuilt from `native_alternatives` unless the
    /// alternatives are exactly the ones just offered and no fresh engine
    /// data came with them.
    pub fn set_navigation_routes(
        &self,
        routes: Vec<NavigationRoute>,
        native_alternatives: &[NativeRouteAlternative],
    ) {
        self.send_routes_event(RoutesEvent::SetStarted);

        let alternatives = routes.get(1..).unwrap_or_default();
        if !alternatives.is_empty()
            && native_alternatives.is_empty()
            && self.cache.are_alternatives(alternatives)
        {
            tracing::debug!("Committed alternatives already known, keeping metadata");
        } else {
            self.controller
                .process_alternatives_metadata(&routes, native_alternatives);
        }

        self.send_routes_event(RoutesEvent::Committed(routes));
    }

    fn send_routes_event(&self, event: RoutesEvent) {
        if self.routes_tx.send(event).is_err() {
            tracing::warn!("Online alternatives loop is not running");
        }
    }

    /// Stop background tasks and release the engine subscription.
    pub async fn shutdown(self) {
        tracing::info!("Alternatives session shutting down");
        self.controller.unregister_all();
        let _ = self.shutdown_tx.send(());
        drop(self.routes_tx);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!("Alternatives session task failed: {}", e);
            }
        }
    }
}
