//! Tollgate - cost-governed gateway for metered LLM inference backends.
//!
//! ## Quick Start
//!
//! ```bash
//! # Start with defaults (port 8080, backend at localhost:11434)
//! tollgate
//!
//! # Custom configuration
//! TOLLGATE_BACKEND_URL=http://192.168.1.100:8000 TOLLGATE_PORT=9000 tollgate
//! ```

use tollgate::{run_server, GatewayConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tollgate=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    run_server(GatewayConfig::from_env()).await
}
