//! Atomic publication of output files.
//!
//! Output is written to a temporary file created next to the destination and
//! renamed over it only after the writer closure succeeded and the data hit
//! the disk. A failed write removes the temporary file and leaves whatever was
//! at the destination untouched.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};

pub fn publish_atomically<F>(destination: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(directory).map_err(|e| {
        ConversionError::io(
            format!("creating temporary file in {}", directory.display()),
            e,
        )
    })?;
    debug!(temp = %temp.path().display(), "Writing to temporary output");

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(|e| {
            ConversionError::io(format!("flushing output for {}", destination.display()), e)
        })?;
    }

    temp.as_file().sync_all().map_err(|e| {
        ConversionError::io(format!("syncing output for {}", destination.display()), e)
    })?;

    temp.persist(destination).map_err(|e| {
        ConversionError::io(format!("publishing {}", destination.display()), e.error)
    })?;

    debug!(destination = %destination.display(), "Output published");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_publish_writes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.tiff");

        publish_atomically(&dest, |w| {
            w.write_all(b"payload")
                .map_err(|e| ConversionError::io("test write", e))
        })
        .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert_eq!(entries(dir.path()), 1);
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.tiff");

        let result = publish_atomically(&dest, |w| {
            w.write_all(b"half a file").unwrap();
            Err(ConversionError::WriteFailure("encoder gave up".to_string()))
        });

        assert!(matches!(result, Err(ConversionError::WriteFailure(_))));
        assert!(!dest.exists());
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_failed_write_keeps_previous_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.tiff");
        std::fs::write(&dest, b"previous").unwrap();

        let result = publish_atomically(&dest, |_| {
            Err(ConversionError::WriteFailure("nope".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
    }

    #[test]
    fn test_missing_directory_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("no_such_dir").join("out.tiff");

        let result = publish_atomically(&dest, |_| Ok(()));
        assert!(matches!(result, Err(ConversionError::IoFailure { .. })));
    }
}
