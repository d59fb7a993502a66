//! Live alternative routes for an active navigation session.

pub mod cache;
pub mod config;
pub mod controller;
pub mod engine;
pub mod loops;
pub mod observers;
pub mod retry;
pub mod session;
pub mod trip;

pub use cache::RouteAlternativesCacheManager;
pub use config::Config;
pub use controller::{
    AlternativesRefresh, NavigationRouteAlternativesRequestCallback, RouteAlternativesController,
    RouteAlternativesOptions, ROUTE_PROGRESS_UNAVAILABLE,
};
pub use engine::{
    EngineAlternativesOptions, NativeAlternativesObserver, NativeAlternativesUpdate, NativeBridge,
    NativeRoute, NativeRouteAlternative, RefreshCallback, RoutingEngine,
};
pub use loops::online_alternatives_loop::{
    run_online_alternatives_loop, OnlineAlternativesConfig, OnlineAlternativesInputs, RoutesEvent,
};
pub use observers::{
    AllAlternativesObserversHolder, AlternativesObserver, FirstAndLastObserverListener,
    NavigationRouteAlternativesObserver, OffboardRoutesObserver, RouteAlternativesObserver,
};
pub use retry::RetryLimiter;
pub use session::AlternativesSession;
pub use trip::{LiveTripSession, NavigationSessionStateObserver, TripSession};
