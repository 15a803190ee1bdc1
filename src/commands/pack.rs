use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::pack::pack_paths_to_file;

/// Pack the given input files into a bundle on disk
pub fn pack_files(output: &Path, inputs: &[PathBuf]) -> Result<()> {
    let artifact = pack_paths_to_file(output, inputs)
        .with_context(|| format!("Failed to pack files into: {:?}", output))?;

    for input in inputs {
        eprintln!("Packed file: {}", input.display());
    }
    eprintln!(
        "Wrote bundle: {} ({} bytes)",
        artifact.name_str(),
        artifact.size()
    );

    Ok(())
}
