//! itp-core — ITP wire format, bit packing, codecs and configuration.
//! All other ITP crates depend on this one.

pub mod bits;
pub mod config;
pub mod frame;
pub mod request;
pub mod response;
pub mod wire;

pub use frame::{read_frame, FrameError, RequestFrame, ResponseFrame};
pub use request::Request;
pub use response::Response;
pub use wire::{Action, ImageType, ResponseKind, WireError, HEADER_LEN};
