#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use multi_model_api::{run_server, telemetry, Config, ConfigOverrides, ModelKind};

/// Serves one local embedding, reranker or language model over HTTP.
#[cfg(feature = "cli")]
#[derive(Debug, Parser)]
#[command(name = "multi-model-api", version, about)]
struct Cli {
    /// Local model directory
    #[arg(long)]
    model_path: Option<String>,

    /// Hub identifier used when the local directory cannot be loaded
    #[arg(long)]
    model_name: Option<String>,

    /// embedding, reranker or llm
    #[arg(long)]
    model_type: Option<ModelKind>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// cpu, cuda or metal
    #[arg(long)]
    device: Option<String>,
}

#[cfg(feature = "cli")]
impl From<Cli> for ConfigOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            model_path: cli.model_path,
            model_name: cli.model_name,
            model_type: cli.model_type,
            host: cli.host,
            port: cli.port,
            device: cli.device,
        }
    }
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // before loading the config so its .env messages are logged
    telemetry::init_tracing();

    let mut cfg = Config::from_env()?;
    cfg.apply_overrides(cli.into());

    run_server(cfg).await
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
