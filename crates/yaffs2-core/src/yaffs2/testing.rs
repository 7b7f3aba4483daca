//! Synthetic image construction for unit tests

use super::layout::{UnitLayout, SIZE_UNIT};
use super::unit::ObjectType;

pub struct ImageBuilder {
    layout: UnitLayout,
    bytes: Vec<u8>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            layout: UnitLayout::default(),
            bytes: Vec::new(),
        }
    }

    fn unit(&mut self, object_id: u32, block: u32, tag: ObjectType, chunk: u32, size: u32) -> usize {
        let start = self.bytes.len();
        self.bytes.resize(start + SIZE_UNIT, 0);
        let l = &self.layout;
        let put = |buf: &mut [u8], offset: usize, len: usize, value: u64| {
            buf[start + offset..start + offset + len].copy_from_slice(&value.to_le_bytes()[..len]);
        };
        put(self.bytes.as_mut_slice(), l.block_position.offset, l.block_position.len, block as u64);
        put(self.bytes.as_mut_slice(), l.object_id.offset, l.object_id.len, object_id as u64);
        put(self.bytes.as_mut_slice(), l.chunk_id.offset, l.chunk_id.len, chunk as u64);
        put(self.bytes.as_mut_slice(), l.size.offset, l.size.len, size as u64);
        self.bytes[start + l.object_type.offset] = tag.tag();
        start
    }

    pub fn header(&mut self, object_id: u32, block: u32, name: &str, size: u32, mtime: u32) -> u64 {
        let start = self.unit(object_id, block, ObjectType::FileHeader, 0, size);
        let name_at = start + self.layout.name.offset;
        self.bytes[name_at..name_at + name.len()].copy_from_slice(name.as_bytes());
        let mtime_at = start + self.layout.mtime.offset;
        self.bytes[mtime_at..mtime_at + 4].copy_from_slice(&mtime.to_le_bytes());
        start as u64
    }

    pub fn data(&mut self, object_id: u32, block: u32, chunk: u32, payload: &[u8]) -> u64 {
        let start = self.unit(object_id, block, ObjectType::Data, chunk, payload.len() as u32);
        self.bytes[start..start + payload.len()].copy_from_slice(payload);
        start as u64
    }

    pub fn directory(&mut self, object_id: u32, block: u32, name: &str) -> u64 {
        let start = self.unit(object_id, block, ObjectType::Directory, 0, 0);
        let name_at = start + self.layout.name.offset;
        self.bytes[name_at..name_at + name.len()].copy_from_slice(name.as_bytes());
        start as u64
    }

    /// Erased flash: all ones
    pub fn erased(&mut self) -> u64 {
        let start = self.bytes.len();
        self.bytes.resize(start + SIZE_UNIT, 0xFF);
        start as u64
    }

    /// Zeroed unit, block position 0
    pub fn blank(&mut self) -> u64 {
        let start = self.bytes.len();
        self.bytes.resize(start + SIZE_UNIT, 0);
        start as u64
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
