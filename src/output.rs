//! Single-value result file.

use std::fs;
use std::io;
use std::path::Path;

use log::debug;

/// Overwrite `path` with `grams` formatted to two decimals.
pub fn write_weight(path: &Path, grams: f32) -> io::Result<()> {
    fs::write(path, format!("{grams:.2}"))?;
    debug!("wrote {:.2} to {}", grams, path.display());
    Ok(())
}
