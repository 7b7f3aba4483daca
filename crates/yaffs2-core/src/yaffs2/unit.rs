//! Unit codec: decodes the fixed-position fields of one storage unit.
//!
//! Integer fields are little-endian and of arbitrary width (1 to 8 bytes),
//! so decoding goes through `ByteOrder::read_uint` rather than fixed-width
//! readers.

use byteorder::{ByteOrder, LittleEndian};

use super::layout::{erased_value, FieldSpec, UnitLayout, DELETED, UNLINKED};

/// YAFFS2 object type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// One chunk of file content
    Data,
    /// File header: name, size, mtime
    FileHeader,
    Symlink,
    Directory,
    Hardlink,
    Special,
    Unknown(u8),
}

impl ObjectType {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0x00 => ObjectType::Data,
            0x10 => ObjectType::FileHeader,
            0x20 => ObjectType::Symlink,
            0x30 => ObjectType::Directory,
            0x40 => ObjectType::Hardlink,
            0x50 => ObjectType::Special,
            other => ObjectType::Unknown(other),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            ObjectType::Data => 0x00,
            ObjectType::FileHeader => 0x10,
            ObjectType::Symlink => 0x20,
            ObjectType::Directory => 0x30,
            ObjectType::Hardlink => 0x40,
            ObjectType::Special => 0x50,
            ObjectType::Unknown(tag) => *tag,
        }
    }
}

/// Assemble `count` bytes at `offset` as a little-endian unsigned value.
///
/// `count` must be in `1..=8`; layouts are validated before any decoding.
pub fn decode_le(buf: &[u8], offset: usize, count: usize) -> u64 {
    debug_assert!((1..=8).contains(&count));
    LittleEndian::read_uint(&buf[offset..offset + count], count)
}

/// Prefix-compare the name field against a sentinel marker.
///
/// Exactly `marker.len()` bytes are compared; the name field is longer than
/// any marker.
pub fn is_sentinel_name(buf: &[u8], name: FieldSpec, marker: &[u8]) -> bool {
    let len = marker.len().min(name.len);
    len == marker.len() && &buf[name.offset..name.offset + len] == marker
}

/// Borrowed view over one unit buffer
#[derive(Debug, Clone, Copy)]
pub struct Unit<'a> {
    buf: &'a [u8],
    layout: &'a UnitLayout,
}

impl<'a> Unit<'a> {
    /// Wrap a buffer of exactly `layout.unit_size()` bytes
    pub fn new(buf: &'a [u8], layout: &'a UnitLayout) -> Self {
        debug_assert_eq!(buf.len(), layout.unit_size());
        Self { buf, layout }
    }

    fn field(&self, field: FieldSpec) -> u64 {
        decode_le(self.buf, field.offset, field.len)
    }

    pub fn block_position(&self) -> u32 {
        self.field(self.layout.block_position) as u32
    }

    /// False for erased or never-written units
    pub fn is_valid(&self) -> bool {
        let field = self.layout.block_position;
        let position = self.field(field);
        position != 0 && position != erased_value(field.len)
    }

    pub fn object_id(&self) -> u32 {
        self.field(self.layout.object_id) as u32
    }

    pub fn object_type(&self) -> ObjectType {
        ObjectType::from_tag(self.buf[self.layout.object_type.offset])
    }

    pub fn chunk_id(&self) -> u32 {
        self.field(self.layout.chunk_id) as u32
    }

    /// Declared file size for headers, byte count for data units
    pub fn size(&self) -> u64 {
        self.field(self.layout.size)
    }

    /// Modification time as Unix seconds
    pub fn mtime(&self) -> i64 {
        self.field(self.layout.mtime) as i64
    }

    /// Raw name field
    pub fn name_field(&self) -> &'a [u8] {
        let name = self.layout.name;
        &self.buf[name.offset..name.end()]
    }

    /// Stored name up to the first NUL
    pub fn name(&self) -> &'a [u8] {
        let field = self.name_field();
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        &field[..end]
    }

    pub fn is_unlinked(&self) -> bool {
        is_sentinel_name(self.buf, self.layout.name, UNLINKED)
    }

    pub fn is_deleted(&self) -> bool {
        is_sentinel_name(self.buf, self.layout.name, DELETED)
    }

    /// The payload region carried by a data unit, clamped to the payload size
    pub fn payload(&self) -> &'a [u8] {
        let len = (self.size() as usize).min(self.layout.payload_size);
        &self.buf[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaffs2::layout::SIZE_UNIT;

    fn blank_unit() -> Vec<u8> {
        vec![0u8; SIZE_UNIT]
    }

    #[test]
    fn test_decode_le_widths() {
        let buf = [0x78, 0x56, 0x34, 0x12, 0xFF];
        assert_eq!(decode_le(&buf, 0, 1), 0x78);
        assert_eq!(decode_le(&buf, 0, 2), 0x5678);
        assert_eq!(decode_le(&buf, 0, 4), 0x1234_5678);
        assert_eq!(decode_le(&buf, 1, 4), 0xFF12_3456);
    }

    #[test]
    fn test_object_type_tags() {
        assert_eq!(ObjectType::from_tag(0x00), ObjectType::Data);
        assert_eq!(ObjectType::from_tag(0x10), ObjectType::FileHeader);
        assert_eq!(ObjectType::from_tag(0x30), ObjectType::Directory);
        assert_eq!(ObjectType::from_tag(0x77), ObjectType::Unknown(0x77));
        assert_eq!(ObjectType::Special.tag(), 0x50);
    }

    #[test]
    fn test_sentinel_is_prefix_compare() {
        let layout = UnitLayout::default();
        let mut buf = blank_unit();
        buf[0x0A..0x0A + 8].copy_from_slice(b"unlinked");
        assert!(is_sentinel_name(&buf, layout.name, UNLINKED));
        assert!(!is_sentinel_name(&buf, layout.name, DELETED));

        // Anything after the marker does not matter
        buf[0x0A + 8..0x0A + 12].copy_from_slice(b"-old");
        assert!(is_sentinel_name(&buf, layout.name, UNLINKED));

        let mut buf = blank_unit();
        buf[0x0A..0x0A + 6].copy_from_slice(b"delete");
        assert!(!is_sentinel_name(&buf, layout.name, DELETED));
    }

    #[test]
    fn test_unit_fields() {
        let layout = UnitLayout::default();
        let mut buf = blank_unit();
        buf[0x800..0x804].copy_from_slice(&7u32.to_le_bytes());
        buf[0x804..0x806].copy_from_slice(&0x0102u16.to_le_bytes());
        buf[0x807] = 0x10;
        buf[0x808..0x80C].copy_from_slice(&3u32.to_le_bytes());
        buf[0x80C..0x810].copy_from_slice(&4097u32.to_le_bytes());
        buf[0x0A..0x0A + 9].copy_from_slice(b"notes.txt");
        buf[0x120..0x124].copy_from_slice(&1_600_000_000u32.to_le_bytes());

        let unit = Unit::new(&buf, &layout);
        assert!(unit.is_valid());
        assert_eq!(unit.block_position(), 7);
        assert_eq!(unit.object_id(), 0x0102);
        assert_eq!(unit.object_type(), ObjectType::FileHeader);
        assert_eq!(unit.chunk_id(), 3);
        assert_eq!(unit.size(), 4097);
        assert_eq!(unit.name(), b"notes.txt");
        assert_eq!(unit.mtime(), 1_600_000_000);
        assert!(!unit.is_unlinked());
        assert!(!unit.is_deleted());
    }

    #[test]
    fn test_invalid_block_positions() {
        let layout = UnitLayout::default();
        let buf = blank_unit();
        assert!(!Unit::new(&buf, &layout).is_valid());

        let mut buf = blank_unit();
        buf[0x800..0x804].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        assert!(!Unit::new(&buf, &layout).is_valid());
    }

    #[test]
    fn test_erased_marker_follows_field_width() {
        let mut layout = UnitLayout::default();
        layout.payload_size = 512;
        layout.metadata_size = 16;
        layout.block_position = FieldSpec::new(512, 2);
        layout.object_id = FieldSpec::new(514, 2);
        layout.object_type = FieldSpec::new(519, 1);
        layout.chunk_id = FieldSpec::new(520, 4);
        layout.size = FieldSpec::new(524, 4);
        assert!(layout.validate().is_ok());

        let erased = vec![0xFFu8; layout.unit_size()];
        assert!(!Unit::new(&erased, &layout).is_valid());

        let mut written = vec![0xFFu8; layout.unit_size()];
        written[512..514].copy_from_slice(&0x0102u16.to_le_bytes());
        let unit = Unit::new(&written, &layout);
        assert!(unit.is_valid());
        assert_eq!(unit.block_position(), 0x0102);
    }

    #[test]
    fn test_payload_clamped_to_payload_size() {
        let layout = UnitLayout::default();
        let mut buf = blank_unit();
        buf[0x80C..0x810].copy_from_slice(&100u32.to_le_bytes());
        assert_eq!(Unit::new(&buf, &layout).payload().len(), 100);

        buf[0x80C..0x810].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        assert_eq!(Unit::new(&buf, &layout).payload().len(), 2048);
    }
}
