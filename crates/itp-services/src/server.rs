//! Server side: the accept loop and the per-connection session.
//!
//! Every accepted connection gets its own task and serves exactly one
//! request. Sessions share nothing but the resource root and the
//! [`SequenceClock`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::broadcast;

use itp_core::{read_frame, Action, Request, RequestFrame, Response, ResponseKind};

use crate::clock::SequenceClock;
use crate::resources::ResourceRoot;

/// Largest payload the 32-bit size field can describe.
const MAX_PAYLOAD: u64 = u32::MAX as u64;

/// Accepts connections and spawns one [`ServerSession`] per connection.
pub struct Server {
    listener: TcpListener,
    resources: Arc<ResourceRoot>,
    clock: Arc<SequenceClock>,
    max_name_bytes: usize,
}

impl Server {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        resources: ResourceRoot,
        clock: Arc<SequenceClock>,
        max_name_bytes: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind ITP listener")?;
        Ok(Self {
            listener,
            resources: Arc::new(resources),
            clock,
            max_name_bytes,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        tracing::info!(
            addr = %self.local_addr()?,
            root = %self.resources.path().display(),
            "ITP server listening"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("ITP server shutting down");
                    return Ok(());
                }

                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    tracing::debug!(%peer, "connection accepted");

                    let session = ServerSession::new(
                        stream,
                        peer,
                        self.resources.clone(),
                        self.clock.clone(),
                        self.max_name_bytes,
                    );
                    tokio::spawn(async move {
                        if let Err(e) = session.run().await {
                            tracing::warn!(%peer, error = %e, "session failed, closing without response");
                        }
                    });
                }
            }
        }
    }
}

/// Lifecycle of one inbound exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Receiving,
    Resolving,
    Responding,
    Closed,
}

/// One request/response exchange on an accepted connection.
pub struct ServerSession<S> {
    stream: S,
    peer: SocketAddr,
    resources: Arc<ResourceRoot>,
    clock: Arc<SequenceClock>,
    max_name_bytes: usize,
    payload_limit: u64,
    state: ServerState,
}

impl<S> ServerSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        resources: Arc<ResourceRoot>,
        clock: Arc<SequenceClock>,
        max_name_bytes: usize,
    ) -> Self {
        Self {
            stream,
            peer,
            resources,
            clock,
            max_name_bytes,
            payload_limit: MAX_PAYLOAD,
            state: ServerState::Idle,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    fn enter(&mut self, state: ServerState) {
        tracing::debug!(peer = %self.peer, from = ?self.state, to = ?state, "server session");
        self.state = state;
    }

    /// Serve one request. A malformed request is an error and gets no
    /// response; a missing resource is answered with `NotFound`.
    pub async fn run(mut self) -> Result<ResponseKind> {
        self.enter(ServerState::Receiving);
        let frame = read_frame::<RequestFrame, _>(&mut self.stream, self.max_name_bytes)
            .await
            .context("failed to receive request")?;
        let request = Request::decode(&frame).context("malformed request")?;

        if let Action::Reserved(code) = request.action {
            bail!("unsupported action type {code}");
        }

        self.enter(ServerState::Resolving);
        let payload = match self.resources.load(&request.file_name, request.img_type).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    peer = %self.peer,
                    file = %request.file_name,
                    error = %e,
                    "resource unreadable, answering not found"
                );
                None
            }
        };
        let payload = match payload {
            Some(data) if data.len() as u64 > self.payload_limit => {
                tracing::warn!(
                    peer = %self.peer,
                    file = %request.file_name,
                    size = data.len(),
                    limit = self.payload_limit,
                    "resource too large for the size field, answering not found"
                );
                None
            }
            other => other,
        };

        self.enter(ServerState::Responding);
        let sequence = self.clock.next_sequence();
        let response = match payload {
            Some(data) => Response::found(request.version, sequence, request.time_mark, data),
            None => Response::not_found(request.version, sequence, request.time_mark),
        };
        let bytes = response.encode().context("failed to encode response")?;

        self.stream
            .write_all(&bytes)
            .await
            .context("failed to send response")?;
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(peer = %self.peer, error = %e, "connection close failed");
        }

        tracing::info!(
            peer = %self.peer,
            file = %request.file_name,
            img_type = ?request.img_type,
            kind = ?response.kind,
            sequence,
            size = response.size(),
            tick = self.clock.current_timestamp(),
            "response sent"
        );

        self.enter(ServerState::Closed);
        Ok(response.kind)
    }
}
