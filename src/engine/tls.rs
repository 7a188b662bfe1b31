use crate::error::{FailureKind, ProbeError, StageExt};
use crate::model::SessionInfo;
use anyhow::{anyhow, Context};
use openssl::nid::Nid;
use openssl::ssl::{SslConnector, SslMethod};
use openssl::x509::{X509NameRef, X509VerifyResult};
use std::path::Path;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

/// Builds a verifying connector on top of the system trust store.
pub fn connector(ca_file: Option<&Path>) -> anyhow::Result<SslConnector> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).context("failed to create TLS connector")?;
    if let Some(path) = ca_file {
        builder
            .set_ca_file(path)
            .with_context(|| format!("cannot load CA file {}", path.display()))?;
    }
    Ok(builder.build())
}

/// Runs the client handshake, checking the peer certificate against `host`.
pub async fn handshake(
    connector: &SslConnector,
    host: &str,
    stream: TcpStream,
) -> Result<SslStream<TcpStream>, ProbeError> {
    // `into_ssl` turns on SNI plus hostname (or IP) verification.
    let ssl = connector
        .configure()
        .context("failed to configure TLS connector")
        .stage(FailureKind::TlsSetup)?
        .into_ssl(host)
        .with_context(|| format!("failed to configure TLS for host {host}"))
        .stage(FailureKind::TlsSetup)?;
    let mut tls_stream = SslStream::new(ssl, stream)
        .context("failed to initialize TLS stream")
        .stage(FailureKind::TlsSetup)?;

    if let Err(err) = Pin::new(&mut tls_stream).connect().await {
        let verify = tls_stream.ssl().verify_result();
        let mut source = anyhow!(err);
        if verify.as_raw() != X509VerifyResult::OK.as_raw() {
            source = source.context(format!(
                "certificate verification failed: {}",
                verify.error_string()
            ));
        }
        return Err(ProbeError::runtime(
            FailureKind::Handshake,
            source.context(format!("TLS handshake failed for host {host}")),
        ));
    }

    Ok(tls_stream)
}

pub fn session_info(stream: &SslStream<TcpStream>) -> SessionInfo {
    let ssl = stream.ssl();
    SessionInfo {
        version: ssl.version_str().to_string(),
        cipher: ssl
            .current_cipher()
            .map_or("none", |cipher| cipher.name())
            .to_string(),
        peer_name: ssl
            .peer_certificate()
            .and_then(|cert| common_name(cert.subject_name())),
    }
}

fn common_name(name: &X509NameRef) -> Option<String> {
    let entry = name.entries_by_nid(Nid::COMMONNAME).next()?;
    entry.data().as_utf8().ok().map(|cn| cn.to_string())
}
