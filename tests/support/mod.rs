#![allow(dead_code)]

use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{Ssl, SslAcceptor, SslMethod};
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName, SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509};
use std::io::Write;
use std::net::SocketAddr;
use std::pin::Pin;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_openssl::SslStream;

pub struct Identity {
    pub ca: X509,
    pub cert: X509,
    pub key: PKey<Private>,
}

impl Identity {
    /// Writes the issuing CA to a temp file usable as `--ca-file`.
    pub fn ca_file(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.ca.to_pem().unwrap()).unwrap();
        file.flush().unwrap();
        file
    }
}

fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(cn: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("CN", cn).unwrap();
    builder.build()
}

fn serial(n: u32) -> Asn1Integer {
    BigNum::from_u32(n).unwrap().to_asn1_integer().unwrap()
}

/// Issues a server certificate for the given names from a fresh test CA.
pub fn issue(dns: &[&str], ips: &[&str]) -> Identity {
    let ca_key = ec_key();
    let ca_name = name("tls-ping test CA");
    let mut ca = X509Builder::new().unwrap();
    ca.set_version(2).unwrap();
    ca.set_serial_number(&serial(1)).unwrap();
    ca.set_subject_name(&ca_name).unwrap();
    ca.set_issuer_name(&ca_name).unwrap();
    ca.set_pubkey(&ca_key).unwrap();
    ca.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    ca.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    ca.append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    ca.append_extension(
        KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()
            .unwrap(),
    )
    .unwrap();
    let ski = SubjectKeyIdentifier::new()
        .build(&ca.x509v3_context(None, None))
        .unwrap();
    ca.append_extension(ski).unwrap();
    ca.sign(&ca_key, MessageDigest::sha256()).unwrap();
    let ca = ca.build();

    let key = ec_key();
    let mut leaf = X509Builder::new().unwrap();
    leaf.set_version(2).unwrap();
    leaf.set_serial_number(&serial(2)).unwrap();
    leaf.set_subject_name(&name("tls-ping test server")).unwrap();
    leaf.set_issuer_name(ca.subject_name()).unwrap();
    leaf.set_pubkey(&key).unwrap();
    leaf.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    leaf.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    leaf.append_extension(BasicConstraints::new().build().unwrap()).unwrap();
    leaf.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .build()
            .unwrap(),
    )
    .unwrap();
    leaf.append_extension(ExtendedKeyUsage::new().server_auth().build().unwrap())
        .unwrap();
    let mut san = SubjectAlternativeName::new();
    for d in dns {
        san.dns(d);
    }
    for ip in ips {
        san.ip(ip);
    }
    let san = san.build(&leaf.x509v3_context(Some(&ca), None)).unwrap();
    leaf.append_extension(san).unwrap();
    leaf.sign(&ca_key, MessageDigest::sha256()).unwrap();

    Identity {
        ca,
        cert: leaf.build(),
        key,
    }
}

pub struct TlsServer {
    pub addr: SocketAddr,
    /// Resolves with the first application byte the client sent.
    pub received: oneshot::Receiver<u8>,
}

/// Accepts one TLS client, reads one byte, answers with `reply`, then waits
/// for the client to hang up.
pub async fn spawn_server(identity: &Identity, reply: &'static [u8]) -> TlsServer {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    builder.set_private_key(&identity.key).unwrap();
    builder.set_certificate(&identity.cert).unwrap();
    builder.check_private_key().unwrap();
    let acceptor = builder.build();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let ssl = Ssl::new(acceptor.context()).unwrap();
        let mut stream = SslStream::new(ssl, socket).unwrap();
        if Pin::new(&mut stream).accept().await.is_err() {
            return;
        }
        let mut marker = [0u8; 1];
        if stream.read_exact(&mut marker).await.is_err() {
            return;
        }
        let _ = tx.send(marker[0]);
        let _ = stream.write_all(reply).await;
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    });

    TlsServer { addr, received: rx }
}

/// Accepts one TLS client and writes `greeting` as soon as the handshake is
/// done. The receiver fires once the greeting has left the server.
pub async fn spawn_greeting_server(
    identity: &Identity,
    greeting: &'static [u8],
) -> (SocketAddr, oneshot::Receiver<()>) {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    builder.set_private_key(&identity.key).unwrap();
    builder.set_certificate(&identity.cert).unwrap();
    let acceptor = builder.build();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let ssl = Ssl::new(acceptor.context()).unwrap();
        let mut stream = SslStream::new(ssl, socket).unwrap();
        Pin::new(&mut stream).accept().await.unwrap();
        stream.write_all(greeting).await.unwrap();
        stream.flush().await.unwrap();
        let _ = tx.send(());
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    });

    (addr, rx)
}

/// A peer that accepts TCP and then never says anything.
pub async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    });
    addr
}

/// A local port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
