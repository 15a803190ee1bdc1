use std::{borrow::Cow, fs, path::Path};

use anyhow::{Context, Result};
use bytes::Bytes;

/// One logical file inside a bundle.
///
/// A record is either a *descriptor* (name and declared size only, used when
/// streaming payloads straight from disk) or *materialized* (it also owns its
/// payload). The size and payload fields are private so materialized records
/// always satisfy `bytes.len() == size` and callers cannot push the two apart.
///
/// Names are raw bytes on the wire and are kept raw here; they are not
/// required to be valid UTF-8 or even path text. [`BundledFile::name_str`]
/// decodes them for display and path use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledFile {
    pub name: Bytes,
    size: u64,
    bytes: Option<Bytes>,
}

impl BundledFile {
    /// A descriptor record: name and declared size, no payload
    pub fn descriptor(name: impl AsRef<[u8]>, size: u64) -> BundledFile {
        BundledFile {
            name: Bytes::copy_from_slice(name.as_ref()),
            size,
            bytes: None,
        }
    }

    /// A materialized record owning its payload; the size is the payload length
    pub fn from_bytes(name: impl AsRef<[u8]>, bytes: impl Into<Bytes>) -> BundledFile {
        let bytes = bytes.into();

        BundledFile {
            name: Bytes::copy_from_slice(name.as_ref()),
            size: bytes.len() as u64,
            bytes: Some(bytes),
        }
    }

    /// A materialized record loaded from a file on disk, named after its path
    pub fn from_disk(path: &Path) -> Result<BundledFile> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read input file: {:?}", path))?;

        Ok(BundledFile::from_bytes(
            path.to_string_lossy().as_bytes(),
            bytes,
        ))
    }

    /// Declared size in bytes; equals the payload length when materialized
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The name decoded for display and path building.
    /// Non-UTF-8 bytes come out as replacement characters.
    pub fn name_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// The payload, present only on materialized records
    pub fn bytes(&self) -> Option<&Bytes> {
        self.bytes.as_ref()
    }

    pub fn is_materialized(&self) -> bool {
        self.bytes.is_some()
    }
}
