use std::{fs, path::Path};

use anyhow::{anyhow, ensure, Context, Result};
use bytes::Bytes;
use nom::{
    bytes::complete::{tag, take_till},
    multi::count,
    number::complete::le_u64,
    sequence::terminated,
    IResult,
};

use crate::{
    header::{parse_header, BundleHeader},
    record::BundledFile,
    stream::{Sink, Source},
};

// Parser for one NUL-terminated file name. Names are arbitrary bytes on the
// wire; they are carried raw, not decoded.
fn parse_name(input: &[u8]) -> IResult<&[u8], Bytes> {
    let (input, name) = terminated(take_till(|b| b == 0), tag(&[0u8][..]))(input)?;
    Ok((input, Bytes::copy_from_slice(name)))
}

// Parser for the names section
fn parse_names(input: &[u8], file_count: usize) -> IResult<&[u8], Vec<Bytes>> {
    count(parse_name, file_count)(input)
}

// Parser for the sizes section
fn parse_sizes(input: &[u8], file_count: usize) -> IResult<&[u8], Vec<u64>> {
    count(le_u64, file_count)(input)
}

/// Read a bundle's metadata without touching any payload bytes.
///
/// Returns one descriptor per bundled file, in bundle order, and leaves the
/// source positioned at the start of the payloads section. Structural
/// problems (truncated sections, section sizes that disagree with their
/// contents) surface as errors here rather than as silently wrong payloads.
pub fn read_entries(source: &mut Source) -> Result<Vec<BundledFile>> {
    let header_bytes = source
        .read(BundleHeader::SIZE)
        .context("Corrupt bundle: failed to read header")?;
    let (_, header) =
        parse_header(&header_bytes).map_err(|_| anyhow!("Failed to parse bundle header"))?;
    let file_count = header.file_count()?;

    // The names section starts immediately after the header
    source.seek(header.names_section_offset())?;

    let names_bytes = source
        .read(header.names_section_size as usize)
        .context("Corrupt bundle: failed to read names section")?;
    let (rest, names) = parse_names(&names_bytes, file_count)
        .map_err(|_| anyhow!("Corrupt bundle: failed to parse names section"))?;
    ensure!(
        rest.is_empty(),
        "Corrupt bundle: {} unparsed bytes at the end of the names section",
        rest.len()
    );

    let sizes_bytes = source
        .read(header.sizes_section_size as usize)
        .context("Corrupt bundle: failed to read sizes section")?;
    let (_, sizes) = parse_sizes(&sizes_bytes, file_count)
        .map_err(|_| anyhow!("Corrupt bundle: failed to parse sizes section"))?;

    // Sizes come from the wire, so the sum has to be overflow-checked
    let declared_total = sizes
        .iter()
        .try_fold(0u64, |acc, &size| acc.checked_add(size))
        .context("Corrupt bundle: declared sizes overflow a u64")?;
    ensure!(
        declared_total == header.files_section_size,
        "Corrupt bundle: declared sizes sum to {} but the files section is {} bytes",
        declared_total,
        header.files_section_size
    );

    Ok(names
        .into_iter()
        .zip(sizes)
        .map(|(name, size)| BundledFile::descriptor(name, size))
        .collect())
}

/// Extract every file from the bundle, in bundle order.
///
/// With `to_memory` set, each returned record is materialized and
/// `output_dir` is ignored. Otherwise payloads are written to
/// `output_dir`-joined names, recreating intermediate directories first, and
/// the returned records are descriptors.
pub fn unpack(source: &mut Source, output_dir: &Path, to_memory: bool) -> Result<Vec<BundledFile>> {
    let entries = read_entries(source)?;

    if !to_memory {
        create_output_dirs(&entries, output_dir)?;
    }

    entries
        .into_iter()
        .map(|entry| {
            if to_memory {
                let bytes = source.read(entry.size() as usize).with_context(|| {
                    format!(
                        "Corrupt bundle: ends before the payload of: {}",
                        entry.name_str()
                    )
                })?;

                Ok(BundledFile::from_bytes(entry.name, bytes))
            } else {
                let out_path = output_dir.join(&*entry.name_str());

                let mut sink = Sink::create(&out_path)?;
                source.copy_to(&mut sink, entry.size()).with_context(|| {
                    format!(
                        "Corrupt bundle: ends before the payload of: {}",
                        entry.name_str()
                    )
                })?;
                sink.flush()?;

                Ok(entry)
            }
        })
        .collect()
}

/// Unpack a bundle file into memory
pub fn unpack_file(bundle_path: &Path) -> Result<Vec<BundledFile>> {
    let mut source = Source::open(bundle_path)?;
    unpack(&mut source, Path::new(""), true)
}

/// Unpack a bundle file to disk under `output_dir`
pub fn unpack_file_to_dir(bundle_path: &Path, output_dir: &Path) -> Result<Vec<BundledFile>> {
    let mut source = Source::open(bundle_path)?;
    unpack(&mut source, output_dir, false)
}

/// Unpack an in-memory bundle into memory
pub fn unpack_bytes(bundle: &[u8]) -> Result<Vec<BundledFile>> {
    let mut source = Source::from_bytes(bundle);
    unpack(&mut source, Path::new(""), true)
}

/// Unpack an in-memory bundle to disk under `output_dir`
pub fn unpack_bytes_to_dir(bundle: &[u8], output_dir: &Path) -> Result<Vec<BundledFile>> {
    let mut source = Source::from_bytes(bundle);
    unpack(&mut source, output_dir, false)
}

/// Directory part of a bundled name, up to its last path separator
pub(crate) fn parent_of(name: &str) -> Option<&str> {
    name.rfind(['/', '\\']).map(|i| &name[..i])
}

// Bundled names may carry nested paths; recreate the trees before writing
fn create_output_dirs(entries: &[BundledFile], output_dir: &Path) -> Result<()> {
    for entry in entries {
        let name = entry.name_str();
        if let Some(parent) = parent_of(&name) {
            let dir = output_dir.join(parent);
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create output folder: {:?}", dir))?;
        }
    }

    Ok(())
}
