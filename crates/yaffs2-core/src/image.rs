/// Read-only access to a flash image file
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use crate::error::RecoveryError;

/// A memory-mapped image, seekable through `Cursor`
pub type ImageSource = Cursor<Mmap>;

/// Open an image file for scanning and positioned reads
pub fn open_image<P: AsRef<Path>>(path: P) -> Result<ImageSource, RecoveryError> {
    let file = File::open(path.as_ref()).map_err(RecoveryError::SourceUnavailable)?;
    let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(RecoveryError::SourceUnavailable)?;

    tracing::debug!("Mapped {} ({} bytes)", path.as_ref().display(), mmap.len());

    Ok(Cursor::new(mmap))
}

/// Size of the image in bytes
pub fn image_len(source: &ImageSource) -> u64 {
    source.get_ref().len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 4224]).unwrap();
        file.flush().unwrap();

        let source = open_image(file.path()).unwrap();
        assert_eq!(image_len(&source), 4224);
    }

    #[test]
    fn test_open_missing_image() {
        let err = open_image("/nonexistent/flash.img").unwrap_err();
        assert!(matches!(err, RecoveryError::SourceUnavailable(_)));
    }
}
