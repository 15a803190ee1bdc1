use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};

use crate::{
    header::BundleHeader,
    record::BundledFile,
    stream::{Sink, Source},
};

/// Exact size in bytes of the bundle `pack` would produce for these files.
/// Callers packing into a caller-owned region pre-size with this.
pub fn packed_size(files: &[BundledFile]) -> u64 {
    BundleHeader::for_files(files).bundle_size()
}

/// Write the files into the sink as a single bundle: header first, then the
/// names, sizes and payload sections, each in input order.
///
/// With `from_memory` set, every record must be materialized; otherwise each
/// record's name is opened as a path on disk and its payload streamed through
/// without buffering. Returns the total number of bytes written. Bytes already
/// committed to the sink are not rolled back on failure.
pub fn pack(sink: &mut Sink, files: &[BundledFile], from_memory: bool) -> Result<u64> {
    let header = BundleHeader::for_files(files);
    sink.write(&header.to_bytes())?;

    for file in files {
        sink.write(&file.name)?;
        sink.write(&[0])?;
    }

    for file in files {
        sink.write(&file.size().to_le_bytes())?;
    }

    for file in files {
        if from_memory {
            let bytes = file
                .bytes()
                .with_context(|| format!("No payload loaded for file: {}", file.name_str()))?;
            sink.write(bytes)?;
        } else {
            let name = file.name_str();
            let path = Path::new(&*name);

            // The declared size already went into the header and the sizes
            // section, so a file that changed on disk since it was listed
            // would corrupt every later section boundary. Fail instead.
            let on_disk = fs::metadata(path)
                .with_context(|| format!("Failed to stat input file: {:?}", path))?
                .len();
            ensure!(
                on_disk == file.size(),
                "Input file changed size since it was listed: {:?} ({} bytes listed, {} on disk)",
                path,
                file.size(),
                on_disk
            );

            let mut source = Source::open(path)?;
            source
                .copy_to(sink, file.size())
                .with_context(|| format!("Failed to copy input file: {:?}", path))?;
        }
    }

    sink.flush()?;
    Ok(sink.total_written())
}

/// Bundle in-memory files into a bundle file on disk.
/// Returns a descriptor for the written artifact.
pub fn pack_to_file(output: &Path, files: &[BundledFile]) -> Result<BundledFile> {
    let mut sink = Sink::create(output)?;
    let total = pack(&mut sink, files, true)?;

    Ok(BundledFile::descriptor(
        output.to_string_lossy().as_bytes(),
        total,
    ))
}

/// Bundle files from disk into a bundle file on disk
pub fn pack_paths_to_file(output: &Path, paths: &[PathBuf]) -> Result<BundledFile> {
    let files = descriptors_from_disk(paths)?;

    let mut sink = Sink::create(output)?;
    let total = pack(&mut sink, &files, false)?;

    Ok(BundledFile::descriptor(
        output.to_string_lossy().as_bytes(),
        total,
    ))
}

/// Bundle in-memory files into an in-memory bundle.
/// Returns a materialized record owning the bundle bytes.
pub fn pack_to_memory(files: &[BundledFile]) -> Result<BundledFile> {
    let mut sink = Sink::growable();
    pack(&mut sink, files, true)?;

    let bytes = sink
        .into_bytes()
        .context("Sink did not produce an in-memory bundle")?;
    Ok(BundledFile::from_bytes("", bytes))
}

/// Bundle files from disk into an in-memory bundle
pub fn pack_paths_to_memory(paths: &[PathBuf]) -> Result<BundledFile> {
    let files = descriptors_from_disk(paths)?;

    let mut sink = Sink::growable();
    pack(&mut sink, &files, false)?;

    let bytes = sink
        .into_bytes()
        .context("Sink did not produce an in-memory bundle")?;
    Ok(BundledFile::from_bytes("", bytes))
}

// Descriptor records for paths on disk, sized from the filesystem
fn descriptors_from_disk(paths: &[PathBuf]) -> Result<Vec<BundledFile>> {
    paths
        .iter()
        .map(|path| {
            let size = fs::metadata(path)
                .with_context(|| format!("Failed to stat input file: {:?}", path))?
                .len();

            Ok(BundledFile::descriptor(
                path.to_string_lossy().as_bytes(),
                size,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{pack, pack_paths_to_file, pack_to_file, pack_to_memory, packed_size};
    use crate::{record::BundledFile, stream::Sink};

    #[test]
    fn test_worked_example_layout() {
        let files = [BundledFile::from_bytes("x.txt", &b"hi"[..])];

        let bundle = pack_to_memory(&files).unwrap();
        assert_eq!(bundle.size(), 40);

        let mut expected = vec![];
        expected.extend_from_slice(&[6, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(&[8, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(b"x.txt\0");
        expected.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(b"hi");

        assert_eq!(bundle.bytes().unwrap().as_ref(), expected.as_slice());
    }

    #[test]
    fn test_empty_list_is_a_bare_header() {
        let bundle = pack_to_memory(&[]).unwrap();

        assert_eq!(bundle.size(), 24);
        assert_eq!(bundle.bytes().unwrap().as_ref(), &[0u8; 24]);
    }

    #[test]
    fn test_packed_size_matches_output() {
        let files = [
            BundledFile::from_bytes("a/b/c.txt", &b"abc"[..]),
            BundledFile::from_bytes("empty", &b""[..]),
            BundledFile::from_bytes("d.bin", vec![7u8; 1000]),
        ];

        let bundle = pack_to_memory(&files).unwrap();
        assert_eq!(bundle.size(), packed_size(&files));
        assert_eq!(bundle.bytes().unwrap().len() as u64, packed_size(&files));
    }

    #[test]
    fn test_packing_twice_is_byte_identical() {
        let files = [
            BundledFile::from_bytes("one", &b"1111"[..]),
            BundledFile::from_bytes("two", &b"22"[..]),
        ];

        let first = pack_to_memory(&files).unwrap();
        let second = pack_to_memory(&files).unwrap();
        assert_eq!(first.bytes().unwrap(), second.bytes().unwrap());
    }

    #[test]
    fn test_names_are_written_as_raw_bytes() {
        let files = [BundledFile::from_bytes(&b"\xff\xfe"[..], &b"hi"[..])];

        let bundle = pack_to_memory(&files).unwrap();
        let bytes = bundle.bytes().unwrap();

        // names_section_size counts the wire bytes, not a decoded form
        assert_eq!(bytes[..8], [3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[24..27], b"\xff\xfe\0");
    }

    #[test]
    fn test_pack_into_presized_region() {
        let files = [BundledFile::from_bytes("x.txt", &b"hi"[..])];

        let mut region = vec![0u8; packed_size(&files) as usize];
        let mut sink = Sink::from_region(&mut region);
        let total = pack(&mut sink, &files, true).unwrap();

        assert_eq!(total, 40);
        assert_eq!(
            region,
            pack_to_memory(&files).unwrap().bytes().unwrap().as_ref()
        );
    }

    #[test]
    fn test_pack_into_undersized_region_fails() {
        let files = [BundledFile::from_bytes("x.txt", &b"hi"[..])];

        let mut region = vec![0u8; packed_size(&files) as usize - 1];
        let mut sink = Sink::from_region(&mut region);
        assert!(pack(&mut sink, &files, true).is_err());
    }

    #[test]
    fn test_descriptor_without_payload_fails_from_memory() {
        let files = [BundledFile::descriptor("x.txt", 2)];

        assert!(pack_to_memory(&files).is_err());
    }

    #[test]
    fn test_pack_from_disk_matches_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        fs::write(&path, b"file contents").unwrap();

        let from_disk = super::pack_paths_to_memory(&[path.clone()]).unwrap();

        let files = [BundledFile::from_bytes(
            path.to_string_lossy().as_bytes(),
            &b"file contents"[..],
        )];
        let from_memory = pack_to_memory(&files).unwrap();

        assert_eq!(from_disk.bytes().unwrap(), from_memory.bytes().unwrap());
    }

    #[test]
    fn test_pack_fails_when_input_shrinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        fs::write(&path, b"full length").unwrap();

        let files = [BundledFile::descriptor(
            path.to_string_lossy().as_bytes(),
            11,
        )];
        fs::write(&path, b"short").unwrap();

        let mut sink = Sink::growable();
        assert!(pack(&mut sink, &files, false).is_err());
    }

    #[test]
    fn test_pack_to_file_returns_artifact_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.bundle");

        let files = [BundledFile::from_bytes("x.txt", &b"hi"[..])];
        let artifact = pack_to_file(&output, &files).unwrap();

        assert_eq!(artifact.name_str(), output.to_string_lossy());
        assert_eq!(artifact.size(), 40);
        assert!(!artifact.is_materialized());
        assert_eq!(fs::read(&output).unwrap().len(), 40);
    }

    #[test]
    fn test_pack_paths_to_file_disk_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.bin");
        fs::write(&input, b"abc").unwrap();
        let output = dir.path().join("out.bundle");

        let artifact = pack_paths_to_file(&output, &[input.clone()]).unwrap();

        let name_len = input.to_string_lossy().len() as u64;
        assert_eq!(artifact.size(), 24 + name_len + 1 + 8 + 3);
        assert_eq!(fs::read(&output).unwrap().len() as u64, artifact.size());
    }
}
