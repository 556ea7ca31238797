//! Run command: drive the interception engine against an established tunnel
//!
//! Tunnel establishment (device creation, routing, addresses) belongs to a
//! supervisor; this command receives the already-open device as an
//! inherited file descriptor and only reads and writes it.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use cleannet_core::{Blocklist, Config, Engine, UdpForwarder};

use crate::args::RunArgs;

/// Execute the run command
pub fn execute(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    // CLI flags override the config file
    if let Some(upstream) = args.upstream {
        config.upstream.address = Some(upstream);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.engine.upstream_timeout_ms = timeout_ms;
    }
    if let Some(path) = &args.blocklist {
        config.blocklist.file = Some(path.clone());
    }

    config.validate().context("Invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    runtime.block_on(run_engine(args.tun_fd, config))
}

#[cfg(unix)]
fn tunnel_files(fd: i32) -> Result<(tokio::fs::File, tokio::fs::File)> {
    use std::os::unix::io::FromRawFd;

    // Safety: the supervisor passes ownership of this descriptor to us;
    // nothing else in the process holds it.
    let file = unsafe { std::fs::File::from_raw_fd(fd) };
    let writer = file
        .try_clone()
        .context("Failed to duplicate tunnel descriptor")?;

    Ok((
        tokio::fs::File::from_std(file),
        tokio::fs::File::from_std(writer),
    ))
}

#[cfg(not(unix))]
fn tunnel_files(_fd: i32) -> Result<(tokio::fs::File, tokio::fs::File)> {
    anyhow::bail!("Tunnel descriptor passing is only supported on unix hosts");
}

async fn run_engine(tun_fd: i32, config: Config) -> Result<()> {
    let (reader, writer) = tunnel_files(tun_fd)?;

    let resolver = config.upstream.resolver_addr();
    info!(%resolver, "Using upstream resolver");

    let blocklist = Arc::new(Blocklist::new());
    let forwarder = UdpForwarder::new(resolver, config.engine.upstream_timeout());
    let engine = Engine::new(blocklist.clone(), forwarder, writer, &config.engine);

    // Load patterns after the engine is up; list construction is the slow
    // part and queries can already flow while it runs.
    let mut patterns = config.blocklist.patterns.clone();
    if let Some(path) = &config.blocklist.file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read block list {}", path.display()))?;
        patterns.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }
    blocklist.update(&patterns);
    info!("Filtering with {} patterns", blocklist.len());

    tokio::select! {
        result = engine.run(reader) => {
            result.context("Engine terminated with an error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, stopping engine");
            engine.shutdown();
        }
    }

    let stats = engine.stats();
    info!(
        received = stats.packets_received,
        blocked = stats.queries_blocked,
        forwarded = stats.queries_forwarded,
        dropped = stats.packets_dropped,
        upstream_failures = stats.upstream_failures,
        "Session complete"
    );

    Ok(())
}
