//! Bit-level field packing over a byte buffer.
//!
//! ITP headers place fields at absolute bit offsets with no regard for byte
//! alignment: a 2-bit field can start mid-byte and a 26-bit field can span
//! four bytes. Bits are numbered from the most significant bit of byte 0,
//! and every field is written most-significant bit first.
//!
//! Out-of-range offsets, widths and values are caller bugs and panic. The
//! codecs validate user-supplied values before they reach this module.

/// Widest field the packer supports.
pub const MAX_FIELD_WIDTH: usize = 32;

/// A field position inside a header: absolute bit offset plus bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub offset: usize,
    pub width: usize,
}

impl BitField {
    pub const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    /// First bit past the end of this field.
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }

    /// Largest value representable in this field.
    pub const fn max_value(&self) -> u64 {
        (1u64 << self.width) - 1
    }

    pub const fn fits(&self, value: u64) -> bool {
        value <= self.max_value()
    }

    pub fn set(&self, buf: &mut [u8], value: u32) {
        set_field(buf, value, self.offset, self.width);
    }

    pub fn get(&self, buf: &[u8]) -> u32 {
        get_field(buf, self.offset, self.width)
    }
}

fn check_bounds(buf_len: usize, offset: usize, width: usize) {
    assert!(
        (1..=MAX_FIELD_WIDTH).contains(&width),
        "bit width {width} outside 1..={MAX_FIELD_WIDTH}"
    );
    assert!(
        offset + width <= buf_len * 8,
        "field at bit {offset} width {width} overruns a {buf_len}-byte buffer"
    );
}

/// Write the low `width` bits of `value` at bit `offset`, MSB first.
///
/// Bits outside `[offset, offset + width)` are left untouched.
pub fn set_field(buf: &mut [u8], value: u32, offset: usize, width: usize) {
    check_bounds(buf.len(), offset, width);
    let value = u64::from(value);
    assert!(
        value >> width == 0,
        "value {value} does not fit in {width} bits"
    );

    let mut pos = offset;
    let mut remaining = width;
    while remaining > 0 {
        let byte = pos / 8;
        let bit = pos % 8;
        let take = remaining.min(8 - bit);

        // Top `take` bits of what is left of the value.
        let chunk = ((value >> (remaining - take)) & ((1u64 << take) - 1)) as u8;
        let shift = 8 - bit - take;
        let mask = (((1u16 << take) - 1) as u8) << shift;

        buf[byte] = (buf[byte] & !mask) | (chunk << shift);

        pos += take;
        remaining -= take;
    }
}

/// Read `width` bits starting at bit `offset`, MSB first.
pub fn get_field(buf: &[u8], offset: usize, width: usize) -> u32 {
    check_bounds(buf.len(), offset, width);

    let mut acc = 0u64;
    let mut pos = offset;
    let mut remaining = width;
    while remaining > 0 {
        let byte = pos / 8;
        let bit = pos % 8;
        let take = remaining.min(8 - bit);
        let shift = 8 - bit - take;
        let chunk = (buf[byte] >> shift) & (((1u16 << take) - 1) as u8);

        acc = (acc << take) | u64::from(chunk);

        pos += take;
        remaining -= take;
    }
    acc as u32
}
