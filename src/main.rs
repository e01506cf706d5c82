mod config;
mod decoder;
mod dispatch;
mod gateway;
mod models;
mod output;
mod utils;
mod xml;

use log::{error, info};
use std::sync::Arc;

use config::{EagleConfig, Mode, PullKind};
use gateway::GatewayClient;
use models::Reading;
use output::{format_reading, format_summation_with_price, format_usage, LineSink};

async fn run(config: EagleConfig, sink: Arc<LineSink>) -> Result<(), Box<dyn std::error::Error>> {
    match &config.mode {
        Mode::Listen { hostname, port } => {
            info!("Starting gateway upload listener");
            gateway::serve(hostname, *port, config.labels(None), sink).await?;
        }
        Mode::Pull {
            hostname,
            mac,
            kind,
        } => {
            let client = GatewayClient::new(hostname, config.credentials.as_ref())?;
            let labels = config.labels(Some(hostname.as_str()));
            let line = match kind {
                PullKind::Demand => {
                    let demand = client.fetch_demand(mac).await?;
                    format_reading(&labels, &Reading::Demand(demand))
                }
                PullKind::Summation => {
                    // Nothing is written unless both halves arrive
                    let (summation, price) = client.fetch_summation_with_price(mac).await?;
                    format_summation_with_price(&labels, &summation, &price)
                }
            };
            sink.emit(&line)?;
        }
        Mode::Usage { hostname, mac } => {
            let client = GatewayClient::new(hostname, config.credentials.as_ref())?;
            let usage = client.fetch_usage(mac).await?;
            sink.emit(&format_usage(&config.labels(Some(hostname.as_str())), &usage))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match EagleConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });

    let sink = Arc::new(LineSink::stdout());

    // Run the selected mode or wait for shutdown signal
    tokio::select! {
        result = run(config, sink) => {
            if let Err(e) = result {
                error!("Fatal error: {}", e);
                return Err(e);
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
