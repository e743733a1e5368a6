//! ITP wire format: header layouts, type codes and wire errors.
//!
//! Both headers are exactly 12 bytes. Fields are located by absolute bit
//! offset (see [`crate::bits`]), not by struct layout, so nothing here is
//! `#[repr(C)]`. Changing an offset or width is a breaking protocol change.

use static_assertions::const_assert_eq;

use crate::bits::BitField;

// ── Header sizes ──────────────────────────────────────────────────────────────

/// Size of both the request and the response header, in bytes.
pub const HEADER_LEN: usize = 12;

/// Size of both headers in bits.
pub const HEADER_BITS: usize = HEADER_LEN * 8;

// ── Request layout ────────────────────────────────────────────────────────────

/// Field positions of the request header.
///
/// | field       | offset | width |
/// |-------------|--------|-------|
/// | version     | 0      | 4     |
/// | reserved    | 4      | 26    |
/// | action      | 30     | 2     |
/// | time_mark   | 32     | 32    |
/// | img_type    | 64     | 4     |
/// | name_length | 68     | 28    |
pub mod request_layout {
    use super::BitField;

    pub const VERSION: BitField = BitField::new(0, 4);
    pub const RESERVED: BitField = BitField::new(4, 26);
    pub const ACTION: BitField = BitField::new(30, 2);
    pub const TIME_MARK: BitField = BitField::new(32, 32);
    pub const IMG_TYPE: BitField = BitField::new(64, 4);
    pub const NAME_LENGTH: BitField = BitField::new(68, 28);
}

// The request fields tile the header with no gaps.
const_assert_eq!(request_layout::VERSION.end(), request_layout::RESERVED.offset);
const_assert_eq!(request_layout::RESERVED.end(), request_layout::ACTION.offset);
const_assert_eq!(request_layout::ACTION.end(), request_layout::TIME_MARK.offset);
const_assert_eq!(request_layout::TIME_MARK.end(), request_layout::IMG_TYPE.offset);
const_assert_eq!(request_layout::IMG_TYPE.end(), request_layout::NAME_LENGTH.offset);
const_assert_eq!(request_layout::NAME_LENGTH.end(), HEADER_BITS);

// ── Response layout ───────────────────────────────────────────────────────────

/// Field positions of the response header.
///
/// | field    | offset | width |
/// |----------|--------|-------|
/// | version  | 0      | 4     |
/// | kind     | 4      | 2     |
/// | sequence | 6      | 26    |
/// | time     | 32     | 32    |
/// | size     | 64     | 32    |
pub mod response_layout {
    use super::BitField;

    pub const VERSION: BitField = BitField::new(0, 4);
    pub const KIND: BitField = BitField::new(4, 2);
    pub const SEQUENCE: BitField = BitField::new(6, 26);
    pub const TIME: BitField = BitField::new(32, 32);
    pub const SIZE: BitField = BitField::new(64, 32);
}

const_assert_eq!(response_layout::VERSION.end(), response_layout::KIND.offset);
const_assert_eq!(response_layout::KIND.end(), response_layout::SEQUENCE.offset);
const_assert_eq!(response_layout::SEQUENCE.end(), response_layout::TIME.offset);
const_assert_eq!(response_layout::TIME.end(), response_layout::SIZE.offset);
const_assert_eq!(response_layout::SIZE.end(), HEADER_BITS);

// ── Image type ────────────────────────────────────────────────────────────────

/// Requested image format. A closed set: any code outside it is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ImageType {
    Unknown = 0,
    Png = 1,
    Bmp = 2,
    Tiff = 3,
    Jpeg = 4,
    Gif = 5,
    Raw = 6,
}

impl ImageType {
    pub const ALL: [ImageType; 6] = [
        ImageType::Png,
        ImageType::Bmp,
        ImageType::Tiff,
        ImageType::Jpeg,
        ImageType::Gif,
        ImageType::Raw,
    ];

    /// Never fails: unassigned codes decode as `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Png,
            2 => Self::Bmp,
            3 => Self::Tiff,
            4 => Self::Jpeg,
            5 => Self::Gif,
            6 => Self::Raw,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Map a client-side file extension. Case-insensitive, accepts common aliases.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "bmp" => Self::Bmp,
            "tif" | "tiff" => Self::Tiff,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "raw" => Self::Raw,
            _ => Self::Unknown,
        }
    }

    /// Extension of the resource file on the server, exactly as stored.
    pub fn server_extension(self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            Self::Png => Some("PNG"),
            Self::Bmp => Some("BMP"),
            Self::Tiff => Some("TIFF"),
            Self::Jpeg => Some("JPEG"),
            Self::Gif => Some("GIF"),
            Self::Raw => Some("RAW"),
        }
    }
}

impl From<ImageType> for u8 {
    fn from(t: ImageType) -> u8 {
        t.code()
    }
}

// ── Action ────────────────────────────────────────────────────────────────────

/// Request kind. Only `Query` is defined; the other 2-bit codes are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Query,
    Reserved(u8),
}

impl Action {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Query,
            other => Self::Reserved(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Query => 0,
            Self::Reserved(c) => c,
        }
    }
}

// ── Response kind ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseKind {
    Found = 1,
    NotFound = 2,
}

impl TryFrom<u8> for ResponseKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Found),
            2 => Ok(Self::NotFound),
            other => Err(WireError::UnknownResponseType(other)),
        }
    }
}

impl From<ResponseKind> for u8 {
    fn from(k: ResponseKind) -> u8 {
        k as u8
    }
}

// ── Sequence numbers ──────────────────────────────────────────────────────────

/// Smallest sequence number a server emits.
pub const SEQUENCE_MIN: u32 = 1;

/// Largest sequence number a server emits before wrapping to `SEQUENCE_MIN`.
pub const SEQUENCE_MAX: u32 = 999;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when building or interpreting ITP packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("buffer holds {actual} bytes, packet needs {needed}")]
    Truncated { needed: usize, actual: usize },

    #[error("unknown response type: {0}")]
    UnknownResponseType(u8),

    #[error("file name is not valid UTF-8")]
    InvalidName,

    #[error("{field} value {value} does not fit in {width} bits")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        width: usize,
    },
}

/// Check a caller-supplied value against its field before packing it.
pub(crate) fn check_fits(field: &'static str, slot: BitField, value: u64) -> Result<(), WireError> {
    if slot.fits(value) {
        Ok(())
    } else {
        Err(WireError::FieldOverflow {
            field,
            value,
            width: slot.width,
        })
    }
}

/// Check that `buf` holds the whole packet and return its total length.
pub(crate) fn check_len(buf: &[u8], body_len: usize) -> Result<usize, WireError> {
    let needed = HEADER_LEN + body_len;
    if buf.len() < needed {
        return Err(WireError::Truncated {
            needed,
            actual: buf.len(),
        });
    }
    Ok(needed)
}
