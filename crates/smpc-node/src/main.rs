//! smpc-node: a threshold ECDSA signing node.
//!
//! Usage: `smpc-node [config.toml]`. Without an argument the path comes
//! from `$SMPC_CONFIG`; without either, built-in defaults apply.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use smpc_node::{NodeConfig, Server};
use smpc_protocol::secret_share_from_record;
use smpc_types::ShareRecord;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::load(std::env::args_os().nth(1).map(PathBuf::from))?;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("smpc-node starting");

    // 1. Load the key share
    let record = ShareRecord::load(&config.share.path)
        .with_context(|| format!("loading share {}", config.share.path.display()))?;
    let share = secret_share_from_record(&record)?;
    info!(index = share.index, threshold = share.threshold, total = share.total, "share loaded");

    // 2. Static key
    let static_key = config.identity.static_key()?;

    // 3. Bind
    let server = Server::bind(&config.listen, share, static_key, config.timeouts.clone()).await?;

    // 4. Publish contact info
    if let Some(path) = &config.identity.info_file {
        let info = serde_json::to_vec(server.info())?;
        std::fs::write(path, info)
            .with_context(|| format!("writing info file {}", path.display()))?;
        info!("Node info written to {:?}", path);
    }

    // 5. Serve until HALT or Ctrl-C
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    info!("smpc-node stopped");
    Ok(())
}
