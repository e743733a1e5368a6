//! Response codec: 12-byte header followed by `size` bytes of image data.

use bytes::{BufMut, Bytes, BytesMut};

use crate::wire::{
    check_fits, check_len, response_layout as layout, ResponseKind, WireError, HEADER_LEN,
};

/// A decoded (or to-be-encoded) ITP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: u8,
    pub kind: ResponseKind,
    pub sequence: u32,
    /// Echo of the request's `time_mark`.
    pub time: u32,
    /// Image bytes. Always empty for `NotFound`.
    pub payload: Bytes,
}

impl Response {
    pub fn found(version: u8, sequence: u32, time: u32, payload: Bytes) -> Self {
        Self {
            version,
            kind: ResponseKind::Found,
            sequence,
            time,
            payload,
        }
    }

    pub fn not_found(version: u8, sequence: u32, time: u32) -> Self {
        Self {
            version,
            kind: ResponseKind::NotFound,
            sequence,
            time,
            payload: Bytes::new(),
        }
    }

    /// Value of the `size` header field.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Encode header and payload into one buffer of `12 + size` bytes.
    pub fn encode(&self) -> Result<Bytes, WireError> {
        check_fits("version", layout::VERSION, u64::from(self.version))?;
        check_fits("sequence", layout::SEQUENCE, u64::from(self.sequence))?;
        check_fits("size", layout::SIZE, self.payload.len() as u64)?;

        let mut header = [0u8; HEADER_LEN];
        layout::VERSION.set(&mut header, u32::from(self.version));
        layout::KIND.set(&mut header, u32::from(u8::from(self.kind)));
        layout::SEQUENCE.set(&mut header, self.sequence);
        layout::TIME.set(&mut header, self.time);
        layout::SIZE.set(&mut header, self.payload.len() as u32);

        tracing::trace!(header = hex::encode(header), "encoded response header");

        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_slice(&header);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Decode a response. Reads exactly `12 + size` bytes, never more.
    ///
    /// A `NotFound` response yields an empty payload regardless of `size`.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let size = declared_size(buf)?;
        let total = check_len(buf, size)?;
        let kind = ResponseKind::try_from(layout::KIND.get(buf) as u8)?;

        let payload = match kind {
            ResponseKind::Found if size > 0 => Bytes::copy_from_slice(&buf[HEADER_LEN..total]),
            _ => Bytes::new(),
        };

        Ok(Self {
            version: layout::VERSION.get(buf) as u8,
            kind,
            sequence: layout::SEQUENCE.get(buf),
            time: layout::TIME.get(buf),
            payload,
        })
    }
}

/// Read `size` out of a response header.
pub fn declared_size(buf: &[u8]) -> Result<usize, WireError> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::Truncated {
            needed: HEADER_LEN,
            actual: buf.len(),
        });
    }
    Ok(layout::SIZE.get(&buf[..HEADER_LEN]) as usize)
}
