//! Navalt CLI - command line tools for route alternatives.
//!
//! Binaries:
//! - translate_progress: fork progress translation for a JSON scenario
//! - online_route: one-shot online route request for an offline route

pub mod scenario;

pub use scenario::ForkScenario;

/// Initialize tracing for a binary, honouring `RUST_LOG`.
pub fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("navalt_session=debug".parse()?)
                .add_directive("navalt_directions=debug".parse()?),
        )
        .init();
    Ok(())
}
