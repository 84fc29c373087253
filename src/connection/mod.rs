//! HTTP Connection: one persistent multiplexed HTTP/1.1 or HTTPS connection to one node.
//!
//! Built on `hyper`'s low-level client connection primitives rather than a bespoke wire parser —
//! see DESIGN.md for why this dependency exists. `hyper::client::conn` already gives us exactly
//! the connect/submit/feed shape this module needs: `handshake` is `connect`,
//! `SendRequest::send_request` is `submit`, and the response stream is fed as `Event`s, delivered
//! by hyper's own internals instead of by hand-fed bytes.

mod tls;

use bytes::Bytes;
use http::{HeaderMap, Request};
use hyper::{client::conn::SendRequest, Body};
use tokio::{net::TcpStream, sync::mpsc, sync::oneshot};

use crate::{
    command::PreparedRequest,
    error::{Error, ErrorKind},
    node::{NodeAddress, Scheme, TransportOptions},
};

use self::tls::MaybeTlsStream;

/// One incremental event produced while a submitted request's response is assembled.
#[derive(Debug)]
pub(crate) enum Event {
    Status { request_id: u64, code: u16 },
    Headers { request_id: u64, headers: HeaderMap },
    Data { request_id: u64, chunk: Bytes },
    Done { request_id: u64 },
    /// An HTTP-protocol-level error occurred for this request; the connection itself survives.
    HttpError { request_id: u64, message: String },
}

/// A handle to a live connection's background driver task. Resolves when the connection ends,
/// distinguishing a graceful close (`Ok(())`) from a transport error (`Err(..)`) — a node's
/// connection dies when its HTTP transport closes gracefully or on an unrecoverable connect
/// error.
pub(crate) struct ConnectionDriver {
    pub(crate) closed: oneshot::Receiver<std::result::Result<(), Error>>,
}

/// The owned connection resource. The executor owns it exclusively; no other task reads from it.
pub(crate) struct Connection {
    send_request: SendRequest<Body>,
}

impl Connection {
    /// Connects to `node` over plain TCP or TLS depending on its scheme.
    pub(crate) async fn connect(
        node: &NodeAddress,
        transport: &TransportOptions,
    ) -> Result<(Connection, ConnectionDriver), Error> {
        let tcp = TcpStream::connect((node.host.as_str(), node.port))
            .await
            .map_err(|e| Error::new(ErrorKind::Transport { message: e.to_string() }))?;
        tcp.set_nodelay(true).ok();

        let io = match node.scheme {
            Scheme::Http => MaybeTlsStream::Plain(tcp),
            Scheme::Https => {
                let connector = tls::build_connector(transport)?;
                let server_name = rustls::ServerName::try_from(node.host.as_str()).map_err(|_| {
                    Error::new(ErrorKind::Transport {
                        message: format!("invalid DNS name for TLS: {}", node.host),
                    })
                })?;
                let stream = connector.connect(server_name, tcp).await.map_err(|e| {
                    Error::new(ErrorKind::Transport { message: e.to_string() })
                })?;
                MaybeTlsStream::Tls(Box::new(stream))
            }
        };

        let (send_request, conn) = hyper::client::conn::Builder::new()
            .handshake(io)
            .await
            .map_err(|e| Error::new(ErrorKind::Transport { message: e.to_string() }))?;

        let (closed_tx, closed_rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = conn.await.map_err(|e| {
                Error::new(ErrorKind::Transport { message: e.to_string() })
            });
            let _ = closed_tx.send(result);
        });

        Ok((Connection { send_request }, ConnectionDriver { closed: closed_rx }))
    }

    /// Sends one request over this connection and spawns a dedicated reader task that streams the
    /// response and forwards `Event`s to `events`. Returns immediately with the request id once
    /// the request has been handed to hyper; does not wait for a response.
    pub(crate) fn submit(
        &self,
        request_id: u64,
        prepared: &PreparedRequest,
        headers: HeaderMap,
        events: mpsc::UnboundedSender<Event>,
    ) -> Result<(), Error> {
        let mut request_builder = Request::builder()
            .method(prepared.method.clone())
            .uri(prepared.url.clone());
        if let Some(request_headers) = request_builder.headers_mut() {
            *request_headers = headers;
        }
        let body = match &prepared.body {
            Some(value) => Body::from(
                serde_json::to_vec(value)
                    .map_err(|e| Error::new(ErrorKind::Http { message: e.to_string() }))?,
            ),
            None => Body::empty(),
        };
        let request = request_builder
            .body(body)
            .map_err(|e| Error::new(ErrorKind::Http { message: e.to_string() }))?;

        let mut send_request = self.send_request.clone();
        tokio::spawn(async move {
            match send_request.send_request(request).await {
                Ok(response) => {
                    let _ = events.send(Event::Status {
                        request_id,
                        code: response.status().as_u16(),
                    });
                    let _ = events.send(Event::Headers {
                        request_id,
                        headers: response.headers().clone(),
                    });

                    let mut body = response.into_body();
                    loop {
                        match hyper::body::HttpBody::data(&mut body).await {
                            Some(Ok(chunk)) => {
                                let _ = events.send(Event::Data { request_id, chunk });
                            }
                            Some(Err(e)) => {
                                let _ = events.send(Event::HttpError {
                                    request_id,
                                    message: e.to_string(),
                                });
                                break;
                            }
                            None => break,
                        }
                    }
                    let _ = events.send(Event::Done { request_id });
                }
                Err(e) => {
                    let _ = events.send(Event::HttpError {
                        request_id,
                        message: e.to_string(),
                    });
                    let _ = events.send(Event::Done { request_id });
                }
            }
        });

        Ok(())
    }
}
