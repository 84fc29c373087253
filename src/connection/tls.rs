//! TLS setup for HTTPS nodes, built on the `rustls` + `tokio-rustls` + `webpki-roots` stack.

use std::{
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::TcpStream,
};
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::{
    error::{Error, ErrorKind},
    node::TransportOptions,
};

/// Either a plain TCP stream (for `http://` nodes) or a TLS stream over one (for `https://`
/// nodes). Implements `AsyncRead`/`AsyncWrite` by forwarding to whichever variant is active, so
/// the rest of the connection layer (hyper's handshake) doesn't need to know which it got.
pub(crate) enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Builds a `rustls` client config from the caller-supplied transport options: the platform
/// webpki roots, plus any extra root certs and client identity the caller configured.
pub(crate) fn build_connector(options: &TransportOptions) -> Result<TlsConnector, Error> {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    if let Some(extra) = &options.extra_root_certs_pem {
        let mut reader = io::BufReader::new(&**extra);
        for cert in rustls_pemfile::certs(&mut reader)
            .map_err(|e| Error::new(ErrorKind::Transport { message: e.to_string() }))?
        {
            roots
                .add(&Certificate(cert))
                .map_err(|e| Error::new(ErrorKind::Transport { message: e.to_string() }))?;
        }
    }

    let builder = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots);

    let config = match (&options.client_cert_chain_pem, &options.client_key_pem) {
        (Some(chain_pem), Some(key_pem)) => {
            let mut chain_reader = io::BufReader::new(&**chain_pem);
            let chain = rustls_pemfile::certs(&mut chain_reader)
                .map_err(|e| Error::new(ErrorKind::Transport { message: e.to_string() }))?
                .into_iter()
                .map(Certificate)
                .collect::<Vec<_>>();
            let mut key_reader = io::BufReader::new(&**key_pem);
            let key = rustls_pemfile::pkcs8_private_keys(&mut key_reader)
                .map_err(|e| Error::new(ErrorKind::Transport { message: e.to_string() }))?
                .into_iter()
                .next()
                .map(PrivateKey)
                .ok_or_else(|| {
                    Error::new(ErrorKind::Transport {
                        message: "no private key found in configured client_key_pem".to_string(),
                    })
                })?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| Error::new(ErrorKind::Transport { message: e.to_string() }))?
        }
        _ => builder.with_no_client_auth(),
    };

    Ok(TlsConnector::from(Arc::new(config)))
}
