use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use log::info;
use tokio::net::TcpListener;

use nutriscan::api::{self, AppState};
use nutriscan::capability::CapabilitySet;
use nutriscan::config::ScanConfig;
use nutriscan::enrichment;
use nutriscan::providers;
use nutriscan::resolver::ResolutionCascade;

#[derive(Parser, Debug)]
#[command(author, version, about = "Barcode to nutrition profile scanner", long_about = None)]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, default_value = "8000")]
    port: u16,

    /// Print the detected capability set as JSON and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Arc::new(ScanConfig::from_env());
    let capabilities = CapabilitySet::detect(&config);

    if args.check {
        println!("{}", serde_json::to_string_pretty(&capabilities)?);
        return Ok(());
    }

    let cascade = Arc::new(ResolutionCascade::new(
        providers::build_providers(&config)?,
        enrichment::build_analyzer(&config)?,
    ));

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    println!("{}", "NutriScan API".green().bold());
    println!(
        "providers: {}, enrichment: {}",
        cascade.provider_names().join(" > "),
        cascade.analyzer_name()
    );
    if !capabilities.optical_decoding_available {
        println!("{}", "optical decoding unavailable in this build".yellow());
    }

    let app = api::create_api(AppState {
        config,
        capabilities,
        cascade,
    });

    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);
    println!("listening on {}", addr.to_string().cyan());

    axum::serve(listener, app).await?;
    Ok(())
}
