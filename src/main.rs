use anyhow::Result;
use clap::Parser;
use imgwire::Config;
use tracing_subscriber::EnvFilter;

/// http POST :3000/convert format==png < photo.jpg
/// http POST :3000/text text==Hello strokeWidth==2 < photo.jpg
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    imgwire::server::serve(config).await
}
