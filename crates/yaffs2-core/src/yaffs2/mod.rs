/// YAFFS2 image structures: unit layout, codec, naming and the unit index
pub mod index;
pub mod layout;
pub mod naming;
pub mod unit;

#[cfg(test)]
pub(crate) mod testing;

pub use index::{BlockMap, ObjectMap, OffsetList, ScanStatistics, UnitIndex};
pub use layout::{FieldSpec, UnitLayout, SIZE_CHUNK, SIZE_OOB, SIZE_UNIT};
pub use naming::{output_name, TimestampZone};
pub use unit::{decode_le, is_sentinel_name, ObjectType, Unit};
