use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use itp_services::{ClientOptions, ClientSession, ResourceRoot, SequenceClock, Server, Viewer};

// ── Harness ───────────────────────────────────────────────────────────────────

/// A fresh, empty directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("itp-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A server on 127.0.0.1 with an OS-assigned port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub root: PathBuf,
    pub clock: Arc<SequenceClock>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl TestServer {
    pub async fn start(tag: &str) -> Self {
        let root = temp_dir(&format!("{tag}-root"));
        let clock = Arc::new(SequenceClock::new(Duration::from_millis(10)));
        clock.start();

        let server = Server::bind("127.0.0.1:0", ResourceRoot::new(&root), clock.clone(), 4096)
            .await
            .expect("bind test server");
        let addr = server.local_addr().unwrap();

        let (shutdown, rx) = broadcast::channel(1);
        let task = tokio::spawn(server.run(rx));

        Self {
            addr,
            root,
            clock,
            shutdown,
            task,
        }
    }

    /// Place an image in the resource root, named exactly as given.
    pub fn add_image(&self, stored_name: &str, data: &[u8]) {
        std::fs::write(self.root.join(stored_name), data).unwrap();
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        self.task.await.unwrap().unwrap();
        self.clock.stop();
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// Records every path it is asked to open.
#[derive(Default)]
pub struct RecordingViewer {
    opened: Mutex<Vec<PathBuf>>,
}

impl RecordingViewer {
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl Viewer for RecordingViewer {
    fn open(&self, path: &Path) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// A client session pointed at `server`, saving into `download_dir`.
pub fn client(server: &TestServer, download_dir: &Path) -> (ClientSession, Arc<RecordingViewer>) {
    let viewer = Arc::new(RecordingViewer::default());
    let options = ClientOptions {
        host: server.addr.ip().to_string(),
        port: server.addr.port(),
        version: 7,
        download_dir: download_dir.to_path_buf(),
        max_image_bytes: 64 * 1024 * 1024,
    };
    (ClientSession::new(options, viewer.clone()), viewer)
}

/// Send `packet` and collect everything the server sends before closing.
pub async fn raw_exchange(addr: SocketAddr, packet: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(packet).await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    reply
}
