use anyhow::{Context, Result};
use std::{fs, io::Write, path::Path};
use tempfile::NamedTempFile;

/// Write `contents` to `path` so readers never observe a partial file.
///
/// The document goes to a temporary file in the same directory, which is
/// then renamed over the target.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .context("Failed to write forecast to temporary file")?;
    tmp.write_all(b"\n")
        .context("Failed to write forecast to temporary file")?;
    tmp.as_file()
        .sync_all()
        .context("Failed to flush forecast to disk")?;

    tmp.persist(path)
        .with_context(|| format!("Failed to move forecast into place: {}", path.display()))?;
    Ok(())
}
