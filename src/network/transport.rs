//! TCP/TLS transport.
//!
//! Opens the socket for one connection attempt. Every failure is mapped to a
//! [`ConnectError`] so the caller can report the cause and stay disconnected.

use std::io::{self, Cursor};
use std::net::SocketAddr;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls_pemfile::{certs, private_key};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{CryptoProvider, aws_lc_rs};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, info, warn};

use crate::config::{Config, TlsConfig};
use crate::error::ConnectError;

/// A connected socket, plain or TLS.
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Stream {
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Stream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Stream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Stream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Stream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Connect to the configured server, upgrading to TLS when enabled.
///
/// The connect timeout covers resolution, the TCP connect and the TLS
/// handshake together.
pub async fn connect(config: &Config) -> Result<Stream, ConnectError> {
    let host = config.server.host.as_str();
    let port = config.port();
    let addr = format!("{host}:{port}");

    let attempt = async {
        let tcp = connect_tcp(host, port, config.server.local_host.as_deref()).await?;
        if !config.tls.enabled {
            return Ok(Stream::Plain(tcp));
        }
        let tls = upgrade(tcp, host, &config.tls).await?;
        Ok::<_, ConnectError>(Stream::Tls(Box::new(tls)))
    };

    let stream = match tokio::time::timeout(config.timeouts.connect_timeout(), attempt).await {
        Ok(result) => result?,
        Err(_) => return Err(ConnectError::Timeout { addr }),
    };
    info!(%addr, tls = stream.is_tls(), "Connected");
    Ok(stream)
}

async fn connect_tcp(
    host: &str,
    port: u16,
    local_host: Option<&str>,
) -> Result<TcpStream, ConnectError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| ConnectError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    let local_ip = match local_host {
        Some(local) => Some(
            tokio::net::lookup_host((local, 0))
                .await
                .map_err(|source| ConnectError::Resolve {
                    host: local.to_string(),
                    source,
                })?
                .map(|a| a.ip())
                .collect::<Vec<_>>(),
        ),
        None => None,
    };

    let mut last_err = None;
    for addr in addrs {
        debug!(%addr, "Trying address");
        let result = match &local_ip {
            None => TcpStream::connect(addr).await,
            Some(locals) => {
                let Some(bind_ip) = locals.iter().find(|ip| ip.is_ipv4() == addr.is_ipv4())
                else {
                    continue;
                };
                bind_and_connect(SocketAddr::new(*bind_ip, 0), addr).await
            }
        };
        match result {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "Failed to set TCP_NODELAY");
                }
                return Ok(stream);
            }
            Err(e) => last_err = Some((addr, e)),
        }
    }

    Err(match last_err {
        Some((addr, e)) if e.kind() == io::ErrorKind::ConnectionRefused => ConnectError::Refused {
            addr: addr.to_string(),
        },
        Some((_, e)) => ConnectError::Io(e),
        None => ConnectError::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no usable address"),
        },
    })
}

async fn bind_and_connect(local: SocketAddr, remote: SocketAddr) -> io::Result<TcpStream> {
    let socket = if remote.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.bind(local)?;
    socket.connect(remote).await
}

async fn upgrade(
    tcp: TcpStream,
    host: &str,
    tls: &TlsConfig,
) -> Result<TlsStream<TcpStream>, ConnectError> {
    let config = client_config(tls).await?;
    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| ConnectError::Tls(format!("invalid server name {host}: {e}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| ConnectError::Tls(e.to_string()))
}

async fn client_config(tls: &TlsConfig) -> Result<ClientConfig, ConnectError> {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnectError::Tls(e.to_string()))?;

    let builder = if tls.verify {
        builder.with_root_certificates(root_store(tls.ca_path.as_deref()).await?)
    } else {
        warn!("TLS certificate verification is disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureVerifier { provider }))
    };

    match &tls.client_cert {
        Some(path) => {
            let (chain, key) = load_client_cert(path).await?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| ConnectError::Tls(e.to_string()))
        }
        None => Ok(builder.with_no_client_auth()),
    }
}

async fn root_store(ca_path: Option<&Path>) -> Result<RootCertStore, ConnectError> {
    let mut roots = RootCertStore::empty();

    let Some(path) = ca_path else {
        let native = rustls_native_certs::load_native_certs();
        for e in &native.errors {
            warn!(error = %e, "Error loading native certs");
        }
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        debug!(added, ignored, "Loaded native root certificates");
        return Ok(roots);
    };

    let mut files = Vec::new();
    if tokio::fs::metadata(path).await?.is_dir() {
        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
    } else {
        files.push(path.to_path_buf());
    }

    for file in files {
        let data = tokio::fs::read(&file).await?;
        let found: Vec<CertificateDer<'static>> = certs(&mut Cursor::new(&data))
            .filter_map(|r| r.ok())
            .collect();
        let (added, _) = roots.add_parsable_certificates(found);
        debug!(file = %file.display(), added, "Loaded CA certificates");
    }

    if roots.is_empty() {
        return Err(ConnectError::Tls(format!(
            "no CA certificates found in {}",
            path.display()
        )));
    }
    Ok(roots)
}

/// Read a PEM file holding the client certificate chain and its key.
async fn load_client_cert(
    path: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ConnectError> {
    let data = tokio::fs::read(path).await?;
    let chain: Vec<CertificateDer<'static>> = certs(&mut Cursor::new(&data))
        .filter_map(|r| r.ok())
        .collect();
    if chain.is_empty() {
        return Err(ConnectError::Tls(format!(
            "no certificate found in {}",
            path.display()
        )));
    }
    let key = private_key(&mut Cursor::new(&data))?
        .ok_or_else(|| ConnectError::Tls(format!("no private key found in {}", path.display())))?;
    Ok((chain, key))
}

/// Accepts any server certificate. Used when `tls.verify` is off.
#[derive(Debug)]
struct InsecureVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn config_for(port: u16) -> Config {
        let mut config = Config::new("127.0.0.1");
        config.server.port = Some(port);
        config.timeouts.connect = 2;
        config
    }

    #[tokio::test]
    async fn test_plain_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let stream = connect(&config_for(port)).await.unwrap();
        assert!(!stream.is_tls());
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect(&config_for(port)).await.err().unwrap();
        assert_eq!(err.error_code(), "refused");
    }

    #[tokio::test]
    async fn test_missing_client_cert_is_tls_or_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _accept = tokio::spawn(async move { listener.accept().await });

        let mut config = config_for(port);
        config.tls.enabled = true;
        config.tls.client_cert = Some("/nonexistent/client.pem".into());
        let err = connect(&config).await.err().unwrap();
        assert!(matches!(err.error_code(), "io" | "tls"));
    }
}
