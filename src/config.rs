use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use crate::models::RecordLabels;

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Turn Rainforest Eagle gateway telemetry into line protocol records",
    long_about = None
)]
pub struct Cli {
    /// Measurement name written at the start of every record
    #[arg(long, env = "EAGLE_MEASUREMENT", default_value = "eagle", global = true)]
    pub measurement: String,

    /// Gateway cloud ID, used as the HTTP basic auth user
    #[arg(long, env = "EAGLE_CLOUD_ID", global = true)]
    pub cloud_id: Option<String>,

    /// Gateway installer code, used as the HTTP basic auth password
    #[arg(long, env = "EAGLE_INSTALL_CODE", hide_env_values = true, global = true)]
    pub install_code: Option<String>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Mode {
    /// Receive readings the gateway uploads over HTTP
    Listen {
        /// Interface to listen on
        #[arg(default_value = "0.0.0.0")]
        hostname: String,
        /// Port to listen on
        #[arg(default_value_t = 8080)]
        port: u16,
    },
    /// Request one reading from the gateway
    Pull {
        /// Hostname or IP of the gateway
        hostname: String,
        /// MAC address of the gateway's ZigBee radio
        mac: String,
        /// Data to fetch
        #[arg(value_enum)]
        kind: PullKind,
    },
    /// Request current demand through the legacy JSON interface
    Usage {
        /// Hostname or IP of the gateway
        hostname: String,
        /// MAC address of the gateway's ZigBee radio
        mac: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PullKind {
    Demand,
    /// Summation combined with the current price
    Summation,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub cloud_id: String,
    pub install_code: String,
}

impl Credentials {
    /// `Authorization` header value
    pub fn basic_auth(&self) -> String {
        let pair = format!("{}:{}", self.cloud_id, self.install_code);
        format!("Basic {}", STANDARD.encode(pair))
    }
}

#[derive(Debug, Clone)]
pub struct EagleConfig {
    pub measurement: String,
    pub credentials: Option<Credentials>,
    pub mode: Mode,
}

impl EagleConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let measurement = cli.measurement.trim().to_string();
        if measurement.is_empty() {
            return Err("Measurement name must not be empty".into());
        }

        let credentials = match (cli.cloud_id, cli.install_code) {
            (Some(cloud_id), Some(install_code)) => Some(Credentials {
                cloud_id,
                install_code,
            }),
            (None, None) => None,
            _ => {
                warn!("Both --cloud-id and --install-code are needed for authentication, ignoring");
                None
            }
        };

        info!("Measurement: {}", measurement);
        Ok(EagleConfig {
            measurement,
            credentials,
            mode: cli.mode,
        })
    }

    pub fn labels(&self, host: Option<&str>) -> RecordLabels {
        RecordLabels {
            measurement: self.measurement.clone(),
            host: host.map(str::to_string),
        }
    }
}
