//! Client side: one outbound exchange per session.
//!
//! Idle → Connecting → Requesting → AwaitingResponse → Decoding →
//! Persisting → Done, or Failed from any step. The session never retries.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use itp_core::config::ClientConfig;
use itp_core::{
    read_frame, FrameError, ImageType, Request, Response, ResponseFrame, ResponseKind, WireError,
};

use crate::viewer::Viewer;

/// Connection and persistence settings for a client session.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub version: u8,
    pub download_dir: PathBuf,
    pub max_image_bytes: usize,
}

impl From<&ClientConfig> for ClientOptions {
    fn from(c: &ClientConfig) -> Self {
        Self {
            host: c.host.clone(),
            port: c.port,
            version: c.version,
            download_dir: c.download_dir.clone(),
            max_image_bytes: c.max_image_bytes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to receive response: {0}")]
    Frame(#[from] FrameError),

    #[error("invalid packet: {0}")]
    Wire(#[from] WireError),

    #[error("server has no image named {name}")]
    NotFound { name: String },

    #[error("failed to save {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Connecting,
    Requesting,
    AwaitingResponse,
    Decoding,
    Persisting,
    Done,
    Failed,
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Where the image was written.
    pub path: PathBuf,
    pub sequence: u32,
    /// The `time` echoed by the server.
    pub time: u32,
    pub size: usize,
}

pub struct ClientSession {
    options: ClientOptions,
    viewer: Arc<dyn Viewer>,
    state: ClientState,
}

impl ClientSession {
    pub fn new(options: ClientOptions, viewer: Arc<dyn Viewer>) -> Self {
        Self {
            options,
            viewer,
            state: ClientState::Idle,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    fn enter(&mut self, state: ClientState) {
        tracing::debug!(from = ?self.state, to = ?state, "client session");
        self.state = state;
    }

    /// Fetch `file_name` (with extension), stamped with the wall clock.
    pub async fn fetch(&mut self, file_name: &str) -> Result<Fetched, ClientError> {
        self.fetch_with_time_mark(file_name, wall_clock_mark()).await
    }

    /// Fetch `file_name` with an explicit `time_mark`.
    pub async fn fetch_with_time_mark(
        &mut self,
        file_name: &str,
        time_mark: u32,
    ) -> Result<Fetched, ClientError> {
        match self.exchange(file_name, time_mark).await {
            Ok(fetched) => {
                self.enter(ClientState::Done);
                Ok(fetched)
            }
            Err(e) => {
                self.enter(ClientState::Failed);
                Err(e)
            }
        }
    }

    async fn exchange(&mut self, file_name: &str, time_mark: u32) -> Result<Fetched, ClientError> {
        self.enter(ClientState::Connecting);
        let addr = format!("{}:{}", self.options.host, self.options.port);
        let mut stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.clone(),
                source,
            })?;

        self.enter(ClientState::Requesting);
        let (stem, img_type) = split_file_name(file_name);
        let request = Request::query(self.options.version, time_mark, img_type, stem);
        stream.write_all(&request.encode()?).await?;
        tracing::debug!(%addr, file = stem, ?img_type, time_mark, "request sent");

        self.enter(ClientState::AwaitingResponse);
        let frame = read_frame::<ResponseFrame, _>(&mut stream, self.options.max_image_bytes).await?;

        self.enter(ClientState::Decoding);
        let response = Response::decode(&frame)?;
        if response.time != time_mark {
            tracing::warn!(sent = time_mark, echoed = response.time, "server echoed a different time mark");
        }
        if response.kind == ResponseKind::NotFound {
            tracing::info!(file = file_name, sequence = response.sequence, "image not found on server");
            return Err(ClientError::NotFound {
                name: file_name.to_string(),
            });
        }

        self.enter(ClientState::Persisting);
        let path = self.options.download_dir.join(file_name);
        tokio::fs::write(&path, &response.payload)
            .await
            .map_err(|source| ClientError::Persist {
                path: path.clone(),
                source,
            })?;
        tracing::info!(
            path = %path.display(),
            size = response.size(),
            sequence = response.sequence,
            "image saved"
        );

        if let Err(e) = self.viewer.open(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to launch viewer");
        }

        if let Err(e) = stream.shutdown().await {
            tracing::debug!(error = %e, "connection close failed");
        }

        Ok(Fetched {
            path,
            sequence: response.sequence,
            time: response.time,
            size: response.size(),
        })
    }
}

/// Split `photo.png` into `("photo", Png)`. The extension is always
/// stripped; an unrecognised one maps to `Unknown`.
pub fn split_file_name(name: &str) -> (&str, ImageType) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ImageType::from_extension(ext)),
        _ => (name, ImageType::Unknown),
    }
}

/// Milliseconds since the Unix epoch, truncated to 32 bits.
pub fn wall_clock_mark() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}
