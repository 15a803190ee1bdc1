use std::{fs, path::Path};

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};

use crate::{
    header::BundleHeader,
    record::BundledFile,
    stream::{Sink, Source},
    unpack::read_entries,
    VERBOSE,
};

/// Extract bundled files matching a glob pattern to a folder.
/// Entries that don't match are skipped over with a seek, not read.
pub fn extract_files(bundle_path: &Path, patterns: &[Pattern], output_folder: &Path) -> Result<()> {
    let mut source = Source::open(bundle_path)?;
    let entries = read_entries(&mut source).context("Failed to read bundle metadata")?;

    // The entries carry the exact names and sizes that produced the header,
    // so recomputing it gives us the payload section offsets
    let header = BundleHeader::for_files(&entries);
    let mut offset = header.files_section_offset();

    for entry in &entries {
        let matched = patterns.iter().any(|pattern| {
            pattern.matches_with(
                &entry.name_str(),
                MatchOptions {
                    require_literal_separator: true,
                    ..Default::default()
                },
            )
        });

        if matched {
            match extract_one(&mut source, entry, offset, output_folder) {
                Ok(()) => eprintln!("Extracted file: {}", entry.name_str()),
                Err(e) => {
                    let error_message = if *VERBOSE.get().unwrap_or(&false) {
                        format!("{e:?}")
                    } else {
                        format!("{e}")
                    };
                    eprintln!(
                        "Failed to extract file: {}: {}",
                        entry.name_str(),
                        error_message
                    );
                }
            }
        }

        offset += entry.size();
    }

    Ok(())
}

fn extract_one(
    source: &mut Source,
    entry: &BundledFile,
    offset: u64,
    output_folder: &Path,
) -> Result<()> {
    let out_path = output_folder.join(&*entry.name_str());
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).context("Failed to create folder")?;
    }

    source.seek(offset)?;
    let mut sink = Sink::create(&out_path)?;
    source
        .copy_to(&mut sink, entry.size())
        .context("Bundle ends before this file's payload")?;
    sink.flush()
}
