use std::mem::size_of;

use anyhow::{ensure, Result};
use nom::{number::complete::le_u64, IResult};

use crate::record::BundledFile;

/// Section sizes recorded at the front of every bundle.
///
/// The three sections (names, sizes, file payloads) follow the header back to
/// back, so their offsets are derived by addition rather than by scanning for
/// markers. There is no magic number or version field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleHeader {
    pub names_section_size: u64,
    pub sizes_section_size: u64,
    pub files_section_size: u64,
}

impl BundleHeader {
    /// Serialized header length in bytes
    pub const SIZE: usize = 3 * size_of::<u64>();

    /// Compute the header for a list of files about to be packed
    pub fn for_files(files: &[BundledFile]) -> BundleHeader {
        let mut header = BundleHeader {
            names_section_size: 0,
            sizes_section_size: 0,
            files_section_size: 0,
        };

        for file in files {
            header.names_section_size += file.name.len() as u64 + 1; // +1 for the NUL terminator
            header.sizes_section_size += size_of::<u64>() as u64;
            header.files_section_size += file.size();
        }

        header
    }

    /// Number of bundled files. The sizes section is one u64 per file.
    pub fn file_count(&self) -> Result<usize> {
        ensure!(
            self.sizes_section_size % size_of::<u64>() as u64 == 0,
            "Corrupt bundle: sizes section length {} is not a multiple of {}",
            self.sizes_section_size,
            size_of::<u64>()
        );

        Ok((self.sizes_section_size / size_of::<u64>() as u64) as usize)
    }

    /// Absolute offset of the names section
    pub fn names_section_offset(&self) -> u64 {
        Self::SIZE as u64
    }

    /// Absolute offset of the file payloads section
    pub fn files_section_offset(&self) -> u64 {
        Self::SIZE as u64 + self.names_section_size + self.sizes_section_size
    }

    /// Total size of the bundle this header describes
    pub fn bundle_size(&self) -> u64 {
        Self::SIZE as u64
            + self.names_section_size
            + self.sizes_section_size
            + self.files_section_size
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];
        buf[..8].copy_from_slice(&self.names_section_size.to_le_bytes());
        buf[8..16].copy_from_slice(&self.sizes_section_size.to_le_bytes());
        buf[16..].copy_from_slice(&self.files_section_size.to_le_bytes());
        buf
    }
}

// Parser for the bundle header
pub fn parse_header(input: &[u8]) -> IResult<&[u8], BundleHeader> {
    let (input, names_section_size) = le_u64(input)?;
    let (input, sizes_section_size) = le_u64(input)?;
    let (input, files_section_size) = le_u64(input)?;

    Ok((
        input,
        BundleHeader {
            names_section_size,
            sizes_section_size,
            files_section_size,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::{parse_header, BundleHeader};
    use crate::record::BundledFile;

    #[test]
    fn test_for_files_arithmetic() {
        let files = [
            BundledFile::from_bytes("x.txt", &b"hi"[..]),
            BundledFile::from_bytes("a/b/c.txt", &b"abc"[..]),
            BundledFile::from_bytes("empty", &b""[..]),
        ];

        let header = BundleHeader::for_files(&files);
        assert_eq!(header.names_section_size, 6 + 10 + 6);
        assert_eq!(header.sizes_section_size, 3 * 8);
        assert_eq!(header.files_section_size, 2 + 3);
        assert_eq!(header.file_count().unwrap(), 3);
        assert_eq!(header.bundle_size(), 24 + 22 + 24 + 5);
        assert_eq!(header.files_section_offset(), 24 + 22 + 24);
    }

    #[test]
    fn test_serialize_parse_round_trip() {
        let header = BundleHeader {
            names_section_size: 2,
            sizes_section_size: 8,
            files_section_size: 0x0123_4567_89ab_cdef,
        };

        let bytes = header.to_bytes();
        assert_eq!(bytes[..8], [2, 0, 0, 0, 0, 0, 0, 0]);

        let (rest, parsed) = parse_header(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_file_count_rejects_unaligned_sizes_section() {
        let header = BundleHeader {
            names_section_size: 0,
            sizes_section_size: 9,
            files_section_size: 0,
        };

        assert!(header.file_count().is_err());
    }
}
