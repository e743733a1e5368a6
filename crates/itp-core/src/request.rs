//! Request codec: 12-byte header followed by the UTF-8 file name.

use bytes::{BufMut, Bytes, BytesMut};

use crate::wire::{
    check_fits, check_len, request_layout as layout, Action, ImageType, WireError, HEADER_LEN,
};

/// A decoded (or to-be-encoded) ITP request.
///
/// `file_name` carries no extension: the server reconstitutes it from
/// `img_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub version: u8,
    pub action: Action,
    pub time_mark: u32,
    pub img_type: ImageType,
    pub file_name: String,
}

impl Request {
    /// A query for `file_name` stamped with `time_mark`.
    pub fn query(version: u8, time_mark: u32, img_type: ImageType, file_name: impl Into<String>) -> Self {
        Self {
            version,
            action: Action::Query,
            time_mark,
            img_type,
            file_name: file_name.into(),
        }
    }

    /// Encode header and file name into one buffer of `12 + name_length` bytes.
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let name = self.file_name.as_bytes();

        check_fits("version", layout::VERSION, u64::from(self.version))?;
        check_fits("action", layout::ACTION, u64::from(self.action.code()))?;
        check_fits("name_length", layout::NAME_LENGTH, name.len() as u64)?;

        let mut header = [0u8; HEADER_LEN];
        layout::VERSION.set(&mut header, u32::from(self.version));
        layout::RESERVED.set(&mut header, 0);
        layout::ACTION.set(&mut header, u32::from(self.action.code()));
        layout::TIME_MARK.set(&mut header, self.time_mark);
        layout::IMG_TYPE.set(&mut header, u32::from(self.img_type.code()));
        layout::NAME_LENGTH.set(&mut header, name.len() as u32);

        tracing::trace!(header = hex::encode(header), "encoded request header");

        let mut buf = BytesMut::with_capacity(HEADER_LEN + name.len());
        buf.put_slice(&header);
        buf.put_slice(name);
        Ok(buf.freeze())
    }

    /// Decode a request. Bytes past `12 + name_length` are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let name_len = declared_name_len(buf)?;
        let total = check_len(buf, name_len)?;

        let name = std::str::from_utf8(&buf[HEADER_LEN..total]).map_err(|_| WireError::InvalidName)?;

        Ok(Self {
            version: layout::VERSION.get(buf) as u8,
            action: Action::from_code(layout::ACTION.get(buf) as u8),
            time_mark: layout::TIME_MARK.get(buf),
            img_type: ImageType::from_code(layout::IMG_TYPE.get(buf) as u8),
            file_name: name.to_owned(),
        })
    }

    /// File name as requested on the server: `<file_name>.<EXT>`.
    pub fn resource_name(&self) -> Option<String> {
        self.img_type
            .server_extension()
            .map(|ext| format!("{}.{}", self.file_name, ext))
    }
}

/// Read `name_length` out of a request header.
pub fn declared_name_len(buf: &[u8]) -> Result<usize, WireError> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::Truncated {
            needed: HEADER_LEN,
            actual: buf.len(),
        });
    }
    Ok(layout::NAME_LENGTH.get(&buf[..HEADER_LEN]) as usize)
}
