//! Online alternatives loop tests on a paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use navalt_core::{
    Bearing, DirectionsRequestResult, LocationMatcherResult, NavigationRoute, Point, RouteOptions,
    RouteProgress, RouterOrigin,
};
use navalt_session::{
    run_online_alternatives_loop, OnlineAlternativesConfig, OnlineAlternativesInputs, RoutesEvent,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

struct Pipeline {
    events: mpsc::UnboundedSender<RoutesEvent>,
    progress: watch::Sender<Option<RouteProgress>>,
    location: watch::Sender<Option<LocationMatcherResult>>,
    output: mpsc::UnboundedReceiver<Vec<NavigationRoute>>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl Pipeline {
    fn start(requester: Arc<ScriptedRequester>, config: OnlineAlternativesConfig) -> Self {
        let (events, routes) = mpsc::unbounded_channel();
        let (progress, route_progress) = watch::channel(None);
        let (location, location_rx) = watch::channel(None);
        let (output_tx, output) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let inputs = OnlineAlternativesInputs {
            routes,
            route_progress,
            location: location_rx,
        };
        let task = tokio::spawn(run_online_alternatives_loop(
            inputs,
            requester,
            config,
            output_tx,
            shutdown_rx,
        ));
        Self {
            events,
            progress,
            location,
            output,
            shutdown,
            task,
        }
    }

    fn commit(&self, routes: Vec<NavigationRoute>) {
        self.events.send(RoutesEvent::Committed(routes)).unwrap();
    }

    fn drive_to(&self, primary: &NavigationRoute, remaining_waypoints: usize) {
        self.progress
            .send_replace(Some(route_progress(primary.clone(), remaining_waypoints)));
    }

    fn locate(&self, longitude: f64, latitude: f64, bearing: f64, speed: f64) {
        self.location
            .send_replace(Some(location(longitude, latitude, bearing, speed)));
    }

    async fn next_output(&mut self) -> Vec<NavigationRoute> {
        timeout(Duration::from_secs(600), self.output.recv())
            .await
            .expect("no online routes in time")
            .expect("loop stopped")
    }

    async fn assert_no_output_for(&mut self, duration: Duration) {
        assert!(timeout(duration, self.output.recv()).await.is_err());
    }
}

fn config(minimum_retry_interval: Duration, avoid_maneuver_seconds: u32) -> OnlineAlternativesConfig {
    OnlineAlternativesConfig {
        minimum_retry_interval,
        avoid_maneuver_seconds,
    }
}

fn onboard_primary() -> NavigationRoute {
    navigation_route("offline#0", RouterOrigin::Onboard)
}

fn assert_gap(earlier: Instant, later: Instant, expected: Duration) {
    let gap = later - earlier;
    assert!(
        gap >= expected && gap < expected + Duration::from_millis(1),
        "gap {:?}, expected {:?}",
        gap,
        expected
    );
}

#[tokio::test(start_paused = true)]
async fn test_online_primary_is_ignored() {
    let requester = ScriptedRequester::new(vec![Ok(online_response("online"))], Duration::ZERO);
    let mut pipeline = Pipeline::start(requester.clone(), OnlineAlternativesConfig::default());
    let primary = navigation_route("server#0", RouterOrigin::Offboard);
    pipeline.drive_to(&primary, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary]);

    pipeline.assert_no_output_for(Duration::from_secs(30)).await;
    assert_eq!(requester.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_onboard_primary_gets_online_routes() {
    let requester = ScriptedRequester::new(vec![Ok(online_response("online"))], Duration::ZERO);
    let mut pipeline = Pipeline::start(requester.clone(), config(Duration::from_secs(1), 8));
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary]);
    let routes = pipeline.next_output().await;

    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0].id, "online#0");
    assert!(routes.iter().all(|route| route.origin == RouterOrigin::Offboard));

    let (options, _) = requester.request(0);
    assert_eq!(options.coordinates[0], Point::new(-122.5, 37.96));
    assert_eq!(options.coordinates.len(), 3);
    assert_eq!(options.bearings.as_ref().unwrap()[0], Some(Bearing::new(90.0, 45.0)));
    assert_eq!(options.avoid_maneuver_radius, Some(64.0));
    assert_eq!(routes[0].route_options, options);
}

#[tokio::test(start_paused = true)]
async fn test_second_leg_drops_passed_waypoint() {
    let requester = ScriptedRequester::new(vec![Ok(online_response("online"))], Duration::ZERO);
    let mut pipeline = Pipeline::start(requester.clone(), config(Duration::from_secs(1), 4));
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 1);
    pipeline.locate(-122.44, 37.89, 180.0, 3.0);

    pipeline.commit(vec![primary]);
    pipeline.next_output().await;

    let (options, _) = requester.request(0);
    assert_eq!(
        options.coordinates,
        vec![Point::new(-122.44, 37.89), Point::new(-122.387, 37.809)]
    );
    assert_eq!(options.avoid_maneuver_radius, Some(12.0));
}

#[tokio::test(start_paused = true)]
async fn test_set_started_discards_pending_result() {
    let requester =
        ScriptedRequester::new(vec![Ok(online_response("online"))], Duration::from_secs(1));
    let mut pipeline = Pipeline::start(requester.clone(), OnlineAlternativesConfig::default());
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary]);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(requester.request_count(), 1);

    pipeline.events.send(RoutesEvent::SetStarted).unwrap();
    pipeline.assert_no_output_for(Duration::from_secs(30)).await;
    assert_eq!(requester.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_newest_offline_route_wins() {
    let requester = ScriptedRequester::new(
        vec![Ok(online_response("online-1")), Ok(online_response("online-2"))],
        Duration::from_secs(1),
    );
    let mut pipeline = Pipeline::start(requester.clone(), OnlineAlternativesConfig::default());
    let first = onboard_primary();
    let mut second = navigation_route("offline-2#0", RouterOrigin::Onboard);
    second.route_options = RouteOptions::from_url(
        "https://api.mapbox.com/directions/v5/mapbox/driving-traffic/-122.52,37.97;-122.30,37.70",
    )
    .unwrap();
    pipeline.drive_to(&first, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![first]);
    sleep(Duration::from_millis(500)).await;
    pipeline.drive_to(&second, 1);
    pipeline.commit(vec![second]);

    let routes = pipeline.next_output().await;
    assert_eq!(
        routes[0].route_options.coordinates.last(),
        Some(&Point::new(-122.30, 37.70))
    );
    pipeline.assert_no_output_for(Duration::from_secs(30)).await;
    assert_eq!(requester.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_reads_latest_location() {
    let requester = ScriptedRequester::new(
        vec![
            Ok(DirectionsRequestResult::RetryableError),
            Ok(online_response("online")),
        ],
        Duration::ZERO,
    );
    let mut pipeline = Pipeline::start(requester.clone(), config(Duration::from_secs(1), 3));
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary]);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(requester.request_count(), 1);

    pipeline.locate(-122.48, 37.94, 120.0, 10.0);
    pipeline.next_output().await;

    let (first, first_at) = requester.request(0);
    let (second, second_at) = requester.request(1);
    assert_eq!(first.coordinates[0], Point::new(-122.5, 37.96));
    assert_eq!(second.coordinates[0], Point::new(-122.48, 37.94));
    assert_eq!(second.avoid_maneuver_radius, Some(30.0));
    assert_gap(first_at, second_at, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_interval_measured_from_attempt_start() {
    let requester = ScriptedRequester::new(
        vec![
            Ok(DirectionsRequestResult::RetryableError),
            Ok(online_response("online")),
        ],
        Duration::from_millis(300),
    );
    let mut pipeline = Pipeline::start(requester.clone(), config(Duration::from_secs(1), 3));
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary]);
    pipeline.next_output().await;

    let (_, first_at) = requester.request(0);
    let (_, second_at) = requester.request(1);
    assert_gap(first_at, second_at, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_two_failures_then_success_at_minimum_interval() {
    let requester = ScriptedRequester::new(
        vec![
            Ok(DirectionsRequestResult::RetryableError),
            Ok(DirectionsRequestResult::RetryableError),
            Ok(online_response("online")),
        ],
        Duration::ZERO,
    );
    let mut pipeline = Pipeline::start(requester.clone(), config(Duration::from_millis(100), 3));
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary]);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(requester.request_count(), 1);
    sleep(Duration::from_millis(98)).await;
    assert_eq!(requester.request_count(), 1);

    let routes = pipeline.next_output().await;
    assert_eq!(routes[0].id, "online#0");
    assert_eq!(requester.request_count(), 3);
    let (_, first_at) = requester.request(0);
    let (_, second_at) = requester.request(1);
    let (_, third_at) = requester.request(2);
    assert_gap(first_at, second_at, Duration::from_millis(100));
    assert_gap(second_at, third_at, Duration::from_millis(100));

    pipeline.assert_no_output_for(Duration::from_secs(5)).await;
    assert_eq!(requester.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_requester_failure_is_retried() {
    let requester = ScriptedRequester::new(
        vec![Err(anyhow::anyhow!("connection reset")), Ok(online_response("online"))],
        Duration::ZERO,
    );
    let mut pipeline = Pipeline::start(requester.clone(), OnlineAlternativesConfig::default());
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary]);
    let routes = pipeline.next_output().await;

    assert_eq!(routes[0].id, "online#0");
    assert_eq!(requester.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_not_retryable_error_stops_retries() {
    let requester = ScriptedRequester::new(
        vec![
            Ok(DirectionsRequestResult::NotRetryableError),
            Ok(online_response("online")),
        ],
        Duration::ZERO,
    );
    let mut pipeline = Pipeline::start(requester.clone(), OnlineAlternativesConfig::default());
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary.clone()]);
    pipeline.assert_no_output_for(Duration::from_secs(60)).await;
    assert_eq!(requester.request_count(), 1);

    // A new route set starts over
    pipeline.commit(vec![primary]);
    pipeline.next_output().await;
    assert_eq!(requester.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delay_overrides_retry_interval() {
    let requester = ScriptedRequester::new(
        vec![
            Ok(DirectionsRequestResult::RetryableErrorWithDelay(Duration::from_millis(100))),
            Ok(DirectionsRequestResult::RetryableErrorWithDelay(Duration::from_millis(100))),
            Ok(online_response("online")),
        ],
        Duration::ZERO,
    );
    let mut pipeline = Pipeline::start(requester.clone(), config(Duration::from_secs(1), 3));
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 2);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary]);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(requester.request_count(), 1);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(requester.request_count(), 1);

    pipeline.next_output().await;
    assert_eq!(requester.request_count(), 3);
    let (_, first_at) = requester.request(0);
    let (_, second_at) = requester.request(1);
    let (_, third_at) = requester.request(2);
    assert_gap(first_at, second_at, Duration::from_millis(100));
    assert_gap(second_at, third_at, Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_options_failure_retried_after_interval() {
    let requester = ScriptedRequester::new(vec![Ok(online_response("online"))], Duration::ZERO);
    let mut pipeline = Pipeline::start(requester.clone(), config(Duration::from_secs(1), 3));
    let primary = onboard_primary();
    pipeline.drive_to(&primary, 0);
    pipeline.locate(-122.5, 37.96, 90.0, 8.0);

    pipeline.commit(vec![primary.clone()]);
    pipeline.assert_no_output_for(Duration::from_millis(2500)).await;
    assert_eq!(requester.request_count(), 0);

    pipeline.drive_to(&primary, 2);
    pipeline.next_output().await;
    assert_eq!(requester.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_loop() {
    let requester = ScriptedRequester::new(Vec::new(), Duration::ZERO);
    let pipeline = Pipeline::start(requester, OnlineAlternativesConfig::default());

    pipeline.shutdown.send(()).unwrap();
    timeout(Duration::from_secs(1), pipeline.task)
        .await
        .expect("loop did not stop")
        .unwrap();
}
