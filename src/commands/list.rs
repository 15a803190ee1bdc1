use std::{
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};

use crate::{stream::Source, unpack::read_entries};

/// List bundled file sizes and names matching a glob pattern.
/// Only the bundle's metadata sections are read.
pub fn list_files(bundle_path: &Path, patterns: &[Pattern]) -> Result<()> {
    let mut source = Source::open(bundle_path)?;
    let entries = read_entries(&mut source).context("Failed to read bundle metadata")?;

    // Use a buffered writer since we may be dumping a lot of data
    let mut stdout = BufWriter::new(io::stdout().lock());

    entries
        .iter()
        .filter(|entry| {
            patterns.iter().any(|pattern| {
                pattern.matches_with(
                    &entry.name_str(),
                    MatchOptions {
                        require_literal_separator: true,
                        ..Default::default()
                    },
                )
            })
        })
        .try_for_each(|entry| {
            writeln!(stdout, "{}\t{}", entry.size(), entry.name_str())
                .context("Failed to write to stdout")
        })?;

    stdout.flush().context("Failed to flush stdout")
}
