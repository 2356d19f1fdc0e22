//! Calibration stored in the panel EEPROM
//!
//! The panel exposes its calibration JSON as a byte stream split into
//! 64-byte pages. Page 0 starts with a big-endian `u32` length followed by
//! the first JSON bytes, later pages continue the stream until the declared
//! length is reached.
//!
//! The USB HID transport is not part of this crate. A transport implements
//! `PageSource`; a raw dump of the page payloads is read with
//! `DumpPageSource`.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConvertError, Result};

pub const PAGE_SIZE: usize = 64;
/// Big-endian byte count at the start of page 0
const HEADER_LEN: usize = 4;

/// Anything that can hand out EEPROM pages by number
pub trait PageSource {
    /// Payload of `page`; empty once the device has nothing more
    fn read_page(&mut self, page: u16) -> Result<Vec<u8>>;

    /// Name used in error messages
    fn origin(&self) -> PathBuf {
        PathBuf::from("eeprom")
    }
}

/// Pages taken from a file holding the concatenated page payloads
pub struct DumpPageSource {
    path: PathBuf,
    data: Vec<u8>,
}

impl DumpPageSource {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| ConvertError::unavailable(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }
}

impl PageSource for DumpPageSource {
    fn read_page(&mut self, page: u16) -> Result<Vec<u8>> {
        let start = page as usize * PAGE_SIZE;
        if start >= self.data.len() {
            return Ok(Vec::new());
        }
        let end = (start + PAGE_SIZE).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }

    fn origin(&self) -> PathBuf {
        self.path.clone()
    }
}

/// Reassemble the calibration JSON text from the page stream
pub fn read_calibration_json<S: PageSource>(source: &mut S) -> Result<String> {
    let first = source.read_page(0)?;
    if first.len() < HEADER_LEN {
        return Err(ConvertError::unavailable(
            source.origin(),
            "page 0 is shorter than the length header",
        ));
    }
    let declared = u32::from_be_bytes([first[0], first[1], first[2], first[3]]) as usize;
    debug!("EEPROM declares {} bytes of calibration JSON", declared);

    let mut json = first[HEADER_LEN..].to_vec();
    let mut page: u16 = 1;
    while json.len() < declared {
        let chunk = source.read_page(page)?;
        if chunk.is_empty() {
            return Err(ConvertError::unavailable(
                source.origin(),
                format!(
                    "stream ended after {} of {} bytes (page {})",
                    json.len(),
                    declared,
                    page
                ),
            ));
        }
        json.extend_from_slice(&chunk);
        page = page.checked_add(1).ok_or_else(|| {
            ConvertError::unavailable(source.origin(), "page counter overflow")
        })?;
    }
    json.truncate(declared);

    String::from_utf8(json).map_err(|e| ConvertError::unavailable(source.origin(), e))
}
