pub mod reader;
pub mod tls;

use crate::error::{FailureKind, ProbeError, StageExt};
use crate::model::{Config, ProbeReport, TargetSpec};
use anyhow::{anyhow, Context};
use openssl::ssl::SslConnector;
use reader::AvailableReader;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tokio_openssl::SslStream;
use tracing::{debug, instrument};

/// The single application byte written once the session is up.
pub const MARKER: u8 = 1;

pub struct Prober {
    cfg: Config,
    connector: SslConnector,
}

impl Prober {
    pub fn new(cfg: Config) -> Result<Self, ProbeError> {
        let connector = tls::connector(cfg.ca_file.as_deref()).stage(FailureKind::TlsSetup)?;
        Ok(Self { cfg, connector })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// A read error during the drain does not fail the run; it is left on
    /// the report so the bytes read before it can still be printed.
    #[instrument(skip(self), fields(endpoint = %self.cfg.target))]
    pub async fn run(&self) -> Result<ProbeReport, ProbeError> {
        let (mut stream, peer) = match self.cfg.connect_timeout {
            Some(limit) => timeout(limit, self.establish()).await.map_err(|_| {
                ProbeError::runtime(
                    FailureKind::Timeout,
                    anyhow!(
                        "no TLS session with {} within {} ms",
                        self.cfg.target,
                        limit.as_millis()
                    ),
                )
            })??,
            None => self.establish().await?,
        };

        let session = tls::session_info(&stream);
        debug!(
            %peer,
            version = %session.version,
            cipher = %session.cipher,
            peer_name = session.peer_name.as_deref().unwrap_or("-"),
            "handshake complete"
        );

        stream
            .write_all(&[MARKER])
            .await
            .context("failed to write probe byte")
            .stage(FailureKind::Write)?;
        stream
            .flush()
            .await
            .context("failed to flush probe byte")
            .stage(FailureKind::Write)?;

        let drained = AvailableReader::new(self.cfg.max_bytes)
            .drain(&mut stream)
            .await;
        match &drained.error {
            Some(err) => debug!(bytes = drained.bytes.len(), error = %err, "drain cut short"),
            None => debug!(bytes = drained.bytes.len(), reason = %drained.reason, "drained response"),
        }

        if let Err(err) = stream.shutdown().await {
            debug!(error = %err, "TLS shutdown failed");
        }

        Ok(ProbeReport {
            target: self.cfg.target.clone(),
            peer,
            session,
            bytes: drained.bytes,
            reason: drained.reason,
            read_error: drained.error,
        })
    }

    async fn establish(&self) -> Result<(SslStream<TcpStream>, SocketAddr), ProbeError> {
        let tcp = connect(&self.cfg.target).await?;
        let peer = tcp
            .peer_addr()
            .context("connected socket has no peer address")
            .stage(FailureKind::Connect)?;
        let stream = tls::handshake(&self.connector, &self.cfg.target.host, tcp).await?;
        Ok((stream, peer))
    }
}

async fn connect(spec: &TargetSpec) -> Result<TcpStream, ProbeError> {
    let addrs: Vec<SocketAddr> = lookup_host((spec.host.as_str(), spec.port))
        .await
        .with_context(|| format!("cannot resolve {}", spec.host))
        .stage(FailureKind::Resolve)?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                debug!(%addr, "connected");
                return Ok(stream);
            }
            Err(err) => {
                debug!(%addr, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    let source = match last_err {
        Some(err) => anyhow::Error::new(err).context(format!("cannot connect to {spec}")),
        None => anyhow!("{} resolved to no addresses", spec.host),
    };
    Err(ProbeError::runtime(FailureKind::Connect, source))
}
