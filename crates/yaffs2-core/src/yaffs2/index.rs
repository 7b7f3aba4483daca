//! Index builder
//!
//! One forward pass over the image, one unit at a time. Every valid unit is
//! filed by object id and block position:
//!
//! - file headers (except unlinked/deleted ones) into the header index
//! - data units, unfiltered, into the payload index
//!
//! Offsets inside a bucket are pushed in scan order and so are strictly
//! increasing. Both maps are `BTreeMap`s so the reconstruction pass can walk
//! them newest-first with reverse iteration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use super::layout::UnitLayout;
use super::unit::{ObjectType, Unit};
use crate::error::RecoveryError;

/// Image offsets of units sharing one (object, block position) pair
pub type OffsetList = Vec<u64>;
/// Block position -> offsets
pub type BlockMap = BTreeMap<u32, OffsetList>;
/// Object id -> block map
pub type ObjectMap = BTreeMap<u32, BlockMap>;

/// Counters collected during a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    pub units_scanned: u64,
    /// Units with a zero or erased block position
    pub invalid_units: u64,
    pub headers_indexed: u64,
    /// Headers carrying the `unlinked` or `deleted` marker
    pub headers_excluded: u64,
    pub data_units_indexed: u64,
    /// Directories, symlinks, hardlinks, specials, unknown tags
    pub other_units: u64,
    /// Bytes after the last complete unit
    pub trailing_bytes: u64,
}

impl ScanStatistics {
    pub fn bytes_scanned(&self, unit_size: usize) -> u64 {
        self.units_scanned * unit_size as u64 + self.trailing_bytes
    }
}

/// Header and payload indices of one image
#[derive(Debug, Clone, Default)]
pub struct UnitIndex {
    headers: ObjectMap,
    payload: ObjectMap,
}

impl UnitIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `source` from the start and index every valid unit
    pub fn build<R: Read + Seek>(
        &mut self,
        source: &mut R,
        layout: &UnitLayout,
    ) -> Result<ScanStatistics, RecoveryError> {
        self.build_with_progress(source, layout, 0, |_| {})
    }

    /// Same as [`build`](Self::build), calling `on_progress` every
    /// `interval` units (never when `interval` is 0)
    pub fn build_with_progress<R, F>(
        &mut self,
        source: &mut R,
        layout: &UnitLayout,
        interval: u64,
        mut on_progress: F,
    ) -> Result<ScanStatistics, RecoveryError>
    where
        R: Read + Seek,
        F: FnMut(&ScanStatistics),
    {
        layout.validate()?;
        source
            .seek(SeekFrom::Start(0))
            .map_err(RecoveryError::SourceUnavailable)?;

        let unit_size = layout.unit_size();
        let mut buf = vec![0u8; unit_size];
        let mut stats = ScanStatistics::default();
        let mut offset = 0u64;

        loop {
            let n = read_unit(source, &mut buf).map_err(RecoveryError::SourceUnavailable)?;
            if n < unit_size {
                // Partial trailing unit ends the scan
                stats.trailing_bytes = n as u64;
                break;
            }

            stats.units_scanned += 1;
            self.index_unit(&Unit::new(&buf, layout), offset, &mut stats);
            offset += unit_size as u64;

            if interval > 0 && stats.units_scanned % interval == 0 {
                on_progress(&stats);
            }
        }

        tracing::info!(
            "Index built: {} units, {} headers ({} excluded), {} data units, {} invalid",
            stats.units_scanned,
            stats.headers_indexed,
            stats.headers_excluded,
            stats.data_units_indexed,
            stats.invalid_units
        );
        if stats.trailing_bytes > 0 {
            tracing::debug!("Ignored {} trailing bytes", stats.trailing_bytes);
        }

        Ok(stats)
    }

    fn index_unit(&mut self, unit: &Unit<'_>, offset: u64, stats: &mut ScanStatistics) {
        if !unit.is_valid() {
            stats.invalid_units += 1;
            return;
        }

        let object_id = unit.object_id();
        let block = unit.block_position();

        match unit.object_type() {
            ObjectType::FileHeader => {
                if unit.is_unlinked() || unit.is_deleted() {
                    tracing::trace!("Skipping removed header of object {} at 0x{:x}", object_id, offset);
                    stats.headers_excluded += 1;
                    return;
                }
                tracing::debug!(
                    "Header: object {} block {} at 0x{:x} ({} bytes)",
                    object_id,
                    block,
                    offset,
                    unit.size()
                );
                push_offset(&mut self.headers, object_id, block, offset);
                stats.headers_indexed += 1;
            }
            ObjectType::Data => {
                tracing::trace!(
                    "Data: object {} block {} chunk {} at 0x{:x}",
                    object_id,
                    block,
                    unit.chunk_id(),
                    offset
                );
                push_offset(&mut self.payload, object_id, block, offset);
                stats.data_units_indexed += 1;
            }
            _ => stats.other_units += 1,
        }
    }

    /// Drop both indices so the instance can scan another image
    pub fn clear(&mut self) {
        self.headers.clear();
        self.payload.clear();
    }

    pub fn headers(&self) -> &ObjectMap {
        &self.headers
    }

    pub fn payload(&self) -> &ObjectMap {
        &self.payload
    }

    /// Borrow both indices at once: headers read-only, payload for draining
    pub fn split_mut(&mut self) -> (&ObjectMap, &mut ObjectMap) {
        (&self.headers, &mut self.payload)
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.payload.is_empty()
    }

    /// Data-unit offsets still available for recovery
    pub fn payload_remaining(&self) -> usize {
        count_offsets(&self.payload)
    }

    pub fn header_count(&self) -> usize {
        count_offsets(&self.headers)
    }
}

fn push_offset(map: &mut ObjectMap, object_id: u32, block: u32, offset: u64) {
    map.entry(object_id)
        .or_default()
        .entry(block)
        .or_default()
        .push(offset);
}

fn count_offsets(map: &ObjectMap) -> usize {
    map.values()
        .flat_map(|blocks| blocks.values())
        .map(Vec::len)
        .sum()
}

/// Fill `buf` from `source`, returning fewer bytes only at end of input
fn read_unit<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
