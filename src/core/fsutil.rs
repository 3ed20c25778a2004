//! Filesystem helpers for crash-safe document writes

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Write data to a file atomically using temp-file-then-rename
///
/// Readers see either the old file or the new one, never a partial write.
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("md.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_data()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
