//! Unit geometry and field positions
//!
//! A YAFFS2 image carries no self-description: every field the scanner
//! interprets lives at a fixed offset inside a unit. The default layout is
//! the common 2k-page geometry:
//!
//! - 2048-byte payload (one NAND page)
//! - 64-byte out-of-band area holding the packed tags
//!
//! Other page geometries are handled by loading a different layout, not by
//! changing code.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RecoveryError;

/// Payload size of a 2k-page unit
pub const SIZE_CHUNK: usize = 0x800;
/// Out-of-band area size of a 2k-page unit
pub const SIZE_OOB: usize = 0x40;
/// Total unit size (payload + out-of-band)
pub const SIZE_UNIT: usize = SIZE_CHUNK + SIZE_OOB;

/// Block-position value marking an erased, never-written unit
pub const BLOCK_ERASED: u64 = 0xFFFF_FFFF;

/// All-ones value of a field `len` bytes wide (`len` in `1..=8`)
pub fn erased_value(len: usize) -> u64 {
    u64::MAX >> (64 - 8 * len)
}

/// Name marker of a header whose file has been unlinked
pub const UNLINKED: &[u8] = b"unlinked";
/// Name marker of a header whose file has been deleted
pub const DELETED: &[u8] = b"deleted";

/// Position and width of one field inside a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub offset: usize,
    pub len: usize,
}

impl FieldSpec {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Full description of a unit: sizes plus every interpreted field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLayout {
    /// Bytes of file content per unit
    pub payload_size: usize,
    /// Bytes of out-of-band metadata following the payload
    pub metadata_size: usize,
    pub block_position: FieldSpec,
    pub object_id: FieldSpec,
    pub object_type: FieldSpec,
    pub chunk_id: FieldSpec,
    /// Byte count of a data unit, declared file size of a header unit
    pub size: FieldSpec,
    pub name: FieldSpec,
    pub mtime: FieldSpec,
}

impl Default for UnitLayout {
    fn default() -> Self {
        Self {
            payload_size: SIZE_CHUNK,
            metadata_size: SIZE_OOB,
            block_position: FieldSpec::new(SIZE_CHUNK, 4),
            object_id: FieldSpec::new(SIZE_CHUNK + 0x04, 2),
            object_type: FieldSpec::new(SIZE_CHUNK + 0x07, 1),
            chunk_id: FieldSpec::new(SIZE_CHUNK + 0x08, 4),
            size: FieldSpec::new(SIZE_CHUNK + 0x0C, 4),
            name: FieldSpec::new(0x0A, 255),
            mtime: FieldSpec::new(0x120, 4),
        }
    }
}

impl UnitLayout {
    /// Total bytes occupied by one unit in the image
    pub fn unit_size(&self) -> usize {
        self.payload_size + self.metadata_size
    }

    /// Number of payload units needed to hold `size` bytes
    pub fn chunks_for(&self, size: u64) -> u64 {
        size.div_ceil(self.payload_size as u64)
    }

    /// Load a layout from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RecoveryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RecoveryError::LayoutFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let layout: Self = serde_json::from_str(&text).map_err(|e| RecoveryError::LayoutFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        layout.validate()?;
        Ok(layout)
    }

    /// Reject layouts the codec cannot decode safely
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.payload_size == 0 {
            return Err(RecoveryError::InvalidLayout(
                "payload size must be non-zero".to_string(),
            ));
        }

        let unit_size = self.unit_size();
        let integers = [
            ("block_position", self.block_position),
            ("object_id", self.object_id),
            ("object_type", self.object_type),
            ("chunk_id", self.chunk_id),
            ("size", self.size),
            ("mtime", self.mtime),
        ];

        for (name, field) in integers {
            if field.len == 0 || field.len > 8 {
                return Err(RecoveryError::InvalidLayout(format!(
                    "field {} has width {}, expected 1..=8",
                    name, field.len
                )));
            }
            if field.end() > unit_size {
                return Err(RecoveryError::InvalidLayout(format!(
                    "field {} ends at {}, beyond unit size {}",
                    name,
                    field.end(),
                    unit_size
                )));
            }
        }

        // Index keys are u32 and the type tag is a single byte
        for (name, field, max) in [
            ("block_position", self.block_position, 4),
            ("object_id", self.object_id, 4),
            ("object_type", self.object_type, 1),
        ] {
            if field.len > max {
                return Err(RecoveryError::InvalidLayout(format!(
                    "field {} has width {}, at most {} supported",
                    name, field.len, max
                )));
            }
        }

        if self.name.end() > unit_size {
            return Err(RecoveryError::InvalidLayout(format!(
                "name field ends at {}, beyond unit size {}",
                self.name.end(),
                unit_size
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let layout = UnitLayout::default();
        assert_eq!(layout.unit_size(), 2112);
        assert_eq!(layout.block_position.offset, 0x800);
        assert_eq!(layout.size.offset, 0x80C);
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_chunks_for() {
        let layout = UnitLayout::default();
        assert_eq!(layout.chunks_for(1), 1);
        assert_eq!(layout.chunks_for(2048), 1);
        assert_eq!(layout.chunks_for(2049), 2);
        assert_eq!(layout.chunks_for(2048 * 2 + 1), 3);
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut layout = UnitLayout::default();
        layout.size = FieldSpec::new(SIZE_CHUNK + 0x0C, 9);
        assert!(layout.validate().is_err());

        let mut layout = UnitLayout::default();
        layout.mtime = FieldSpec::new(SIZE_UNIT - 2, 4);
        assert!(layout.validate().is_err());

        let mut layout = UnitLayout::default();
        layout.payload_size = 0;
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_validate_limits_key_and_tag_widths() {
        let mut layout = UnitLayout::default();
        layout.block_position = FieldSpec::new(SIZE_CHUNK, 8);
        assert!(layout.validate().is_err());

        let mut layout = UnitLayout::default();
        layout.object_id = FieldSpec::new(SIZE_CHUNK + 0x04, 5);
        assert!(layout.validate().is_err());

        let mut layout = UnitLayout::default();
        layout.object_type = FieldSpec::new(SIZE_CHUNK + 0x07, 2);
        assert!(layout.validate().is_err());

        let mut layout = UnitLayout::default();
        layout.block_position = FieldSpec::new(SIZE_CHUNK, 2);
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_erased_value_per_width() {
        assert_eq!(erased_value(1), 0xFF);
        assert_eq!(erased_value(2), 0xFFFF);
        assert_eq!(erased_value(4), BLOCK_ERASED);
        assert_eq!(erased_value(8), u64::MAX);
    }

    #[test]
    fn test_layout_from_json_file() {
        let mut layout = UnitLayout::default();
        layout.payload_size = 512;
        layout.metadata_size = 16;
        layout.block_position = FieldSpec::new(512, 4);
        layout.object_id = FieldSpec::new(516, 2);
        layout.object_type = FieldSpec::new(519, 1);
        layout.chunk_id = FieldSpec::new(520, 4);
        layout.size = FieldSpec::new(524, 4);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, serde_json::to_string_pretty(&layout).unwrap()).unwrap();

        let loaded = UnitLayout::from_json_file(&path).unwrap();
        assert_eq!(loaded, layout);
        assert_eq!(loaded.unit_size(), 528);
    }

    #[test]
    fn test_layout_file_missing() {
        let err = UnitLayout::from_json_file("/nonexistent/layout.json").unwrap_err();
        assert!(matches!(err, RecoveryError::LayoutFile { .. }));
    }
}
