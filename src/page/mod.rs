/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use thiserror::Error;

pub mod fixed;
pub mod slotted;

pub use fixed::FixedPage;
pub use slotted::SlottedPage;

/// Utility functions for the ASCII-decimal counters embedded in page
/// headers and slot directories.
///
/// Counters are fixed-width, zero-padded, signed decimals ("0042", "-001").
/// A 4-character counter covers -999..=9999; a 3-character counter covers
/// -99..=999. Values outside the range are stored as '#' fill and reported
/// as an error, which is how a corrupted header surfaces during scans.

/// Read a fixed-width ASCII decimal at the given offset.
pub fn read_ascii_int(bytes: &[u8], offset: usize, width: usize) -> Result<i32, PageError> {
    check_bounds(bytes.len(), offset, width)?;
    let raw = &bytes[offset..offset + width];
    let text = std::str::from_utf8(raw).map_err(|_| PageError::BadCounter { offset })?;
    text.trim()
        .parse::<i32>()
        .map_err(|_| PageError::BadCounter { offset })
}

/// Write a fixed-width ASCII decimal at the given offset. A value that does
/// not fit the width is stored as '#' fill and reported as an error.
pub fn write_ascii_int(
    bytes: &mut [u8],
    offset: usize,
    width: usize,
    value: i32,
) -> Result<(), PageError> {
    check_bounds(bytes.len(), offset, width)?;
    let max = 10i32.pow(width as u32) - 1;
    let min = -(10i32.pow(width as u32 - 1) - 1);
    if value < min || value > max {
        bytes[offset..offset + width].fill(b'#');
        return Err(PageError::CounterOverflow { value, width });
    }
    let text = format!("{value:0width$}");
    bytes[offset..offset + width].copy_from_slice(text.as_bytes());
    Ok(())
}

#[inline]
fn check_bounds(len: usize, offset: usize, width: usize) -> Result<(), PageError> {
    if offset + width > len {
        return Err(PageError::OutOfBounds { offset, len });
    }
    Ok(())
}

/// Custom errors to be used by pages.
#[derive(Debug, Error)]
pub enum PageError {
    /// Access past the end of the page byte array.
    #[error("page access at offset {offset} past page length {len}")]
    OutOfBounds { offset: usize, len: usize },

    /// A counter that does not parse as a decimal (corrupt or '#'-filled).
    #[error("malformed page counter at offset {offset}")]
    BadCounter { offset: usize },

    /// A counter value outside the range its width can encode.
    #[error("value {value} does not fit a {width}-character counter")]
    CounterOverflow { value: i32, width: usize },

    /// An insertion that does not fit the page.
    #[error("page is full")]
    PageFull,

    /// A slot index past the page's slot count.
    #[error("slot {0} out of bounds")]
    SlotOutOfBounds(u32),

    /// A record whose length disagrees with the page header.
    #[error("record is {record} bytes, page stores {page}-byte records")]
    RecordSizeMismatch { record: usize, page: usize },

    /// A free-slot stack with a cycle or an out-of-range link.
    #[error("free-slot stack is corrupt")]
    CorruptFreeStack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_int_round_trip() {
        let mut buf = vec![0u8; 16];
        for value in [-999, -1, 0, 7, 42, 9999] {
            write_ascii_int(&mut buf, 4, 4, value).unwrap();
            assert_eq!(read_ascii_int(&buf, 4, 4).unwrap(), value);
        }
        write_ascii_int(&mut buf, 0, 3, 999).unwrap();
        assert_eq!(read_ascii_int(&buf, 0, 3).unwrap(), 999);
    }

    #[test]
    fn test_ascii_int_overflow_marks_field() {
        let mut buf = vec![0u8; 8];
        assert!(write_ascii_int(&mut buf, 0, 4, 10_000).is_err());
        assert_eq!(&buf[0..4], b"####");
        assert!(read_ascii_int(&buf, 0, 4).is_err());

        assert!(write_ascii_int(&mut buf, 4, 4, -1000).is_err());
        assert_eq!(&buf[4..8], b"####");
    }

    #[test]
    fn test_ascii_int_bounds_checked() {
        let mut buf = vec![0u8; 4];
        assert!(matches!(
            read_ascii_int(&buf, 2, 4),
            Err(PageError::OutOfBounds { .. })
        ));
        assert!(write_ascii_int(&mut buf, 2, 4, 1).is_err());
    }

    #[test]
    fn test_zeroed_bytes_are_invalid() {
        let buf = vec![0u8; 4];
        assert!(matches!(
            read_ascii_int(&buf, 0, 4),
            Err(PageError::BadCounter { .. })
        ));
    }
}
