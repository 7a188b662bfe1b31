use crate::error::{FailureKind, ProbeError};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target: TargetSpec,
    /// Bounds resolve, connect and handshake together. `None` waits forever.
    pub connect_timeout: Option<Duration>,
    pub max_bytes: usize,
    /// Extra PEM trust anchors on top of the system store.
    pub ca_file: Option<PathBuf>,
    pub output: OutputConfig,
}

impl Config {
    pub fn new(target: TargetSpec) -> Self {
        Self {
            target,
            connect_timeout: None,
            max_bytes: 4096,
            ca_file: None,
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub separator: String,
}

#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub version: String,
    pub cipher: String,
    /// Common name of the peer certificate subject.
    pub peer_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrainStop {
    /// Nothing more was buffered.
    #[default]
    Idle,
    ConnectionClosed,
    SizeLimit,
}

impl fmt::Display for DrainStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainStop::Idle => write!(f, "idle"),
            DrainStop::ConnectionClosed => write!(f, "connection-closed"),
            DrainStop::SizeLimit => write!(f, "size-limit"),
        }
    }
}

#[derive(Debug)]
pub struct ProbeReport {
    pub target: TargetSpec,
    pub peer: SocketAddr,
    pub session: SessionInfo,
    pub bytes: Vec<u8>,
    pub reason: DrainStop,
    /// Set when a read failed mid-drain; `bytes` holds what came before it.
    pub read_error: Option<std::io::Error>,
}

impl ProbeReport {
    pub fn take_read_error(&mut self) -> Option<ProbeError> {
        self.read_error.take().map(|err| {
            ProbeError::runtime(
                FailureKind::Read,
                anyhow::Error::new(err).context("failed to read response"),
            )
        })
    }
}
