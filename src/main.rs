use anyhow::{Context, Result};
use cellfix::{init_tracing, CellStore, GlmClient, HttpProxySource, Resolver, ResolverConfig};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(
    name = "cellfix",
    about = "Resolve stale cell-tower records against the GLM MMAP upstream"
)]
struct Args {
    /// Path to the sqlite cell store (must already exist).
    store: PathBuf,

    /// Concurrent lookups per batch, and the direct-mode batch size.
    #[arg(long, default_value_t = 16)]
    workers: usize,

    /// Start in proxy mode instead of waiting for a ban signature.
    #[arg(long)]
    proxies: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = ResolverConfig::builder()
        .store_path(&args.store)
        .worker_width(args.workers)
        .start_with_proxies(args.proxies)
        .build()?;

    let mut store = CellStore::open(config.store_path())?;
    let client = GlmClient::new(config.endpoint_url(), config.request_timeout())
        .context("failed to build lookup client")?;
    let provider = HttpProxySource::new(
        config.proxy_fetch_timeout(),
        config.proxy_list_urls().to_vec(),
    )?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received; stopping after the current batch");
                shutdown.cancel();
            }
        });
    }

    let resolver = Resolver::with_cancellation_token(config, client, provider, shutdown);
    resolver.run(&mut store).await?;
    Ok(())
}
