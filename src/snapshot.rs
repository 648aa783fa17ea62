use std::fs;
use std::path::Path;

use tracing::info;

use crate::listing::Listing;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Write listings as CSV with the store's column names. Parent directories are created.
pub fn write_snapshot(path: &Path, listings: &[Listing]) -> Result<(), SnapshotError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut w = csv::Writer::from_path(path)?;
    for l in listings {
        w.serialize(l)?;
    }
    w.flush()?;
    info!("Wrote {} rows to {}", listings.len(), path.display());
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Vec<Listing>, SnapshotError> {
    let mut r = csv::Reader::from_path(path)?;
    let rows = r.deserialize().collect::<Result<Vec<Listing>, _>>()?;
    info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}
