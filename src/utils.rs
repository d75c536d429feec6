use tracing_subscriber::EnvFilter;

/// Initialize a global `tracing` subscriber reading `RUST_LOG`.
///
/// Call once at program start, before the first command run.
pub fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()?;

    Ok(())
}
