//! Bundle archiving
//!
//! Builds the final job deliverable: a ZIP of every saved artifact,
//! assembled in memory and stored back as a single blob.

use std::io::{Cursor, Write};

use songdrop_common::{Error, Result};

/// Build a ZIP archive from (entry name, bytes) pairs
pub fn build_zip(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    if entries.is_empty() {
        return Err(Error::Archiving("No artifacts to archive".to_string()));
    }

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in entries {
        writer
            .start_file(name, options)
            .map_err(|e| Error::Archiving(format!("Failed to add {}: {}", name, e)))?;
        writer
            .write_all(bytes)
            .map_err(|e| Error::Archiving(format!("Failed to write {}: {}", name, e)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| Error::Archiving(format!("Failed to finish archive: {}", e)))?;
    Ok(cursor.into_inner())
}
