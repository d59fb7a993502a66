//! Loop requesting server-computed routes for an onboard primary route.
//!
//! Every committed route set restarts the work: the previous attempt is
//! aborted and its result, if any, is never emitted.

use std::sync::Arc;
use std::time::Duration;

use navalt_core::{
    apply_avoid_maneuvers, update_route_options, DirectionsRequestResult, LocationMatcherResult,
    NavigationRoute, RouteProgress, RouteRequester, RouterOrigin,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;

use crate::retry::RetryLimiter;

const LOG_TARGET: &str = "OnlineRouteAlternativesSwitch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlineAlternativesConfig {
    pub minimum_retry_interval: Duration,
    pub avoid_maneuver_seconds: u32,
}

impl Default for OnlineAlternativesConfig {
    fn default() -> Self {
        Self {
            minimum_retry_interval: Duration::from_secs(1),
            avoid_maneuver_seconds: 3,
        }
    }
}

/// Route lifecycle events, in the order they happened.
#[derive(Debug, Clone)]
pub enum RoutesEvent {
    /// A new route set is being applied; the current one is void.
    SetStarted,
    /// Routes committed to navigation, primary first.
    Committed(Vec<NavigationRoute>),
}

pub struct OnlineAlternativesInputs {
    pub routes: mpsc::UnboundedReceiver<RoutesEvent>,
    pub route_progress: watch::Receiver<Option<RouteProgress>>,
    pub location: watch::Receiver<Option<LocationMatcherResult>>,
}

type Attempt = JoinHandle<Option<Vec<NavigationRoute>>>;

#[derive(Clone)]
struct AttemptContext {
    requester: Arc<dyn RouteRequester>,
    route_progress: watch::Receiver<Option<RouteProgress>>,
    location: watch::Receiver<Option<LocationMatcherResult>>,
    config: OnlineAlternativesConfig,
}

/// Start the online alternatives loop.
pub async fn run_online_alternatives_loop(
    inputs: OnlineAlternativesInputs,
    requester: Arc<dyn RouteRequester>,
    config: OnlineAlternativesConfig,
    output: mpsc::UnboundedSender<Vec<NavigationRoute>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let OnlineAlternativesInputs {
        mut routes,
        route_progress,
        location,
    } = inputs;
    let context = AttemptContext {
        requester,
        route_progress,
        location,
        config,
    };
    let mut primary: Option<NavigationRoute> = None;
    let mut attempt: Option<Attempt> = None;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!(target: LOG_TARGET, "Online alternatives loop shutting down");
                break;
            }
            event = routes.recv() => {
                abort(&mut attempt);
                match event {
                    None => {
                        tracing::info!(target: LOG_TARGET, "Routes channel closed, stopping online alternatives loop");
                        break;
                    }
                    Some(RoutesEvent::SetStarted) => primary = None,
                    Some(RoutesEvent::Committed(committed)) => {
                        primary = onboard_primary(committed);
                        attempt = primary
                            .clone()
                            .map(|route| spawn_attempt(route, context.clone(), None));
                    }
                }
            }
            joined = join(&mut attempt) => {
                attempt = None;
                match joined {
                    Ok(Some(online_routes)) => {
                        if output.send(online_routes).is_err() {
                            tracing::warn!(target: LOG_TARGET, "Online routes receiver dropped");
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) if e.is_panic() => {
                        tracing::error!(target: LOG_TARGET, "Online route attempt failed unexpectedly: {}", e);
                        attempt = primary.clone().map(|route| {
                            spawn_attempt(
                                route,
                                context.clone(),
                                Some(context.config.minimum_retry_interval),
                            )
                        });
                    }
                    Err(_) => {}
                }
            }
        }
    }

    abort(&mut attempt);
}

fn onboard_primary(routes: Vec<NavigationRoute>) -> Option<NavigationRoute> {
    let primary = routes.into_iter().next()?;
    if primary.origin != RouterOrigin::Onboard {
        tracing::debug!(target: LOG_TARGET, "Primary route {} is {:?}, nothing to do", primary.id, primary.origin);
        return None;
    }
    tracing::info!(target: LOG_TARGET, "Current route {} is offline, requesting online routes", primary.id);
    Some(primary)
}

fn abort(attempt: &mut Option<Attempt>) {
    if let Some(handle) = attempt.take() {
        handle.abort();
    }
}

async fn join(attempt: &mut Option<Attempt>) -> Result<Option<Vec<NavigationRoute>>, JoinError> {
    match attempt {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn spawn_attempt(
    primary: NavigationRoute,
    context: AttemptContext,
    initial_delay: Option<Duration>,
) -> Attempt {
    tokio::spawn(async move {
        if let Some(delay) = initial_delay {
            sleep(delay).await;
        }
        request_online_routes(primary, context).await
    })
}

/// Request online routes for `primary` until one of: success, a
/// not-retryable error, or abort by the loop.
async fn request_online_routes(
    primary: NavigationRoute,
    mut context: AttemptContext,
) -> Option<Vec<NavigationRoute>> {
    let mut limiter = RetryLimiter::new(context.config.minimum_retry_interval);

    loop {
        limiter.start_attempt();
        let location = latest(&mut context.location).await?;
        let progress = latest(&mut context.route_progress).await?;

        let location = location.enhanced_location;
        let options = match update_route_options(&primary.route_options, &progress, &location) {
            Ok(options) => apply_avoid_maneuvers(
                options,
                context.config.avoid_maneuver_seconds,
                location.speed,
            ),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, "Error calculating route options for online route, will retry later: {}", e);
                limiter.wait().await;
                continue;
            }
        };

        tracing::info!(target: LOG_TARGET, "Requesting online route for {}", primary.id);
        let result = match context.requester.request_routes(&options).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(target: LOG_TARGET, "Online route request failed: {:#}", e);
                DirectionsRequestResult::RetryableError
            }
        };

        match result {
            DirectionsRequestResult::SuccessfulResponse(response) => {
                let routes = NavigationRoute::from_response(response, options, RouterOrigin::Offboard);
                if routes.is_empty() {
                    tracing::warn!(target: LOG_TARGET, "Directions response has no routes, will retry later");
                    limiter.wait().await;
                    continue;
                }
                tracing::info!(target: LOG_TARGET, "Received {} online routes for {}", routes.len(), primary.id);
                return Some(routes);
            }
            DirectionsRequestResult::RetryableError => {
                tracing::info!(target: LOG_TARGET, "Retryable error, retrying no earlier than {:?} after the last attempt", context.config.minimum_retry_interval);
                limiter.wait().await;
            }
            DirectionsRequestResult::RetryableErrorWithDelay(delay) => {
                tracing::info!(target: LOG_TARGET, "Retryable error, retrying in {:?}", delay);
                limiter.wait_with_override(delay).await;
            }
            DirectionsRequestResult::NotRetryableError => {
                tracing::warn!(target: LOG_TARGET, "Not retryable error, no online route for {}", primary.id);
                return None;
            }
        }
    }
}

/// Latest non-empty value, waiting for one if needed. `None` once the
/// producer is gone without ever providing a value.
async fn latest<T: Clone>(receiver: &mut watch::Receiver<Option<T>>) -> Option<T> {
    receiver
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|value| value.clone())
}
