//! itp-services — the Sequence/clock source, resource lookup, and the
//! client and server sessions built on `itp-core`.

pub mod client;
pub mod clock;
pub mod resources;
pub mod server;
pub mod viewer;

pub use client::{ClientError, ClientOptions, ClientSession, ClientState, Fetched};
pub use clock::SequenceClock;
pub use resources::ResourceRoot;
pub use server::{Server, ServerSession, ServerState};
pub use viewer::{NoViewer, SystemViewer, Viewer};
