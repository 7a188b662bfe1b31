use crate::error::{FailureKind, ProbeError};
use crate::model::{Config, OutputConfig, TargetSpec};
use anyhow::anyhow;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Open a verified TLS session, send one byte, print what is already waiting",
    long_about = None
)]
pub struct Cli {
    /// Host to connect to; the certificate must be valid for it
    #[arg(value_name = "HOST")]
    pub host: String,

    /// Port to connect to
    #[arg(value_name = "PORT")]
    pub port: String,

    /// Deadline for resolve, connect and handshake in milliseconds (default: none)
    #[arg(long = "connect-timeout", value_name = "MS")]
    pub connect_timeout_ms: Option<u64>,

    /// Max bytes to capture from the response
    #[arg(long = "max-bytes", default_value_t = 4096)]
    pub max_bytes: usize,

    /// PEM file with extra trust anchors, added to the system store
    #[arg(long = "ca-file", value_name = "FILE")]
    pub ca_file: Option<PathBuf>,

    /// Printed between byte values
    #[arg(long = "separator", default_value = "")]
    pub separator: String,
}

impl Cli {
    pub fn into_config(self) -> Result<Config, ProbeError> {
        let port = parse_port(&self.port)?;

        if self.connect_timeout_ms == Some(0) {
            return Err(ProbeError::Usage(
                "connect timeout must be greater than zero".into(),
            ));
        }

        Ok(Config {
            target: TargetSpec {
                host: self.host,
                port,
            },
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            max_bytes: self.max_bytes.max(1),
            ca_file: self.ca_file,
            output: OutputConfig {
                separator: self.separator,
            },
        })
    }
}

fn parse_port(raw: &str) -> Result<u16, ProbeError> {
    let port: u16 = raw.trim().parse().map_err(|err| {
        ProbeError::runtime(
            FailureKind::InvalidPort,
            anyhow!("cannot parse {raw:?} as a port: {err}"),
        )
    })?;
    if port == 0 {
        return Err(ProbeError::runtime(
            FailureKind::InvalidPort,
            anyhow!("port must be between 1 and 65535"),
        ));
    }
    Ok(port)
}
