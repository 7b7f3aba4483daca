/// Reconstruction engine: peels payload units off the index, newest first
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use super::report::{FailedRecovery, RecoveredFile, RecoveryReport};
use crate::error::RecoveryError;
use crate::yaffs2::{
    output_name, BlockMap, ObjectMap, ScanStatistics, TimestampZone, Unit, UnitIndex, UnitLayout,
};

/// Recovery engine configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub layout: UnitLayout,
    /// Where recovered files are written
    pub output_dir: PathBuf,
    pub timestamp_zone: TimestampZone,
    /// SHA-256 every written file
    pub compute_digests: bool,
    /// Units between scan progress events, 0 disables them
    pub progress_interval: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            layout: UnitLayout::default(),
            output_dir: PathBuf::from("."),
            timestamp_zone: TimestampZone::Local,
            compute_digests: true,
            progress_interval: 4096,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RecoveryProgress {
    Scanning {
        units_scanned: u64,
        bytes_scanned: u64,
    },
    /// A header occurrence matched an object that has, or had, payload
    HeaderMatched {
        name: String,
        chunks: u64,
        object_id: u32,
    },
    FileWritten {
        name: String,
        bytes_written: u64,
        chunks_recovered: u64,
    },
}

/// Scan-then-recover facade over one image at a time.
///
/// Call [`build`](Self::build) then [`recover`](Self::recover); call
/// [`clear`](Self::clear) before reusing the engine on another image.
pub struct RecoveryEngine<R> {
    config: RecoveryConfig,
    index: UnitIndex,
    source: Option<R>,
    progress_callback: Option<Box<dyn Fn(RecoveryProgress) + Send + Sync>>,
}

impl<R: Read + Seek> RecoveryEngine<R> {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            index: UnitIndex::new(),
            source: None,
            progress_callback: None,
        }
    }

    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(RecoveryProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn index(&self) -> &UnitIndex {
        &self.index
    }

    /// Index every unit of `source`, replacing any previous image
    pub fn build(&mut self, mut source: R) -> Result<ScanStatistics, RecoveryError> {
        self.index.clear();
        self.source = None;

        let unit_size = self.config.layout.unit_size();
        let callback = &self.progress_callback;
        let stats = self.index.build_with_progress(
            &mut source,
            &self.config.layout,
            self.config.progress_interval,
            |stats| {
                if let Some(cb) = callback {
                    cb(RecoveryProgress::Scanning {
                        units_scanned: stats.units_scanned,
                        bytes_scanned: stats.bytes_scanned(unit_size),
                    });
                }
            },
        )?;

        self.source = Some(source);
        Ok(stats)
    }

    /// Write every recoverable header occurrence into the output directory.
    ///
    /// Drains the payload index; a second call only sees what is left.
    pub fn recover(&mut self) -> Result<RecoveryReport, RecoveryError> {
        let source = self.source.as_mut().ok_or(RecoveryError::NotBuilt)?;
        let (headers, payload) = self.index.split_mut();
        let callback = &self.progress_callback;

        reconstruct(headers, payload, source, &self.config, |event| {
            if let Some(cb) = callback {
                cb(event);
            }
        })
    }

    /// Drop the indices and the image handle
    pub fn clear(&mut self) {
        self.index.clear();
        self.source = None;
    }
}

/// A header occurrence that passed the size check
struct Occurrence {
    object_id: u32,
    block_position: u32,
    header_offset: u64,
    name: String,
    path: PathBuf,
    declared_size: u64,
    chunks_required: u64,
}

/// Reverse-chronological reconstruction over a built index.
///
/// Objects are visited by descending id, header buckets and offsets
/// newest first. Each occurrence takes up to `ceil(size / payload)` of its
/// object's remaining payload units; consumed offsets are removed from
/// `payload` for good. The pass stops once the whole payload pool is empty.
pub fn reconstruct<R, F>(
    headers: &ObjectMap,
    payload: &mut ObjectMap,
    source: &mut R,
    config: &RecoveryConfig,
    mut on_progress: F,
) -> Result<RecoveryReport, RecoveryError>
where
    R: Read + Seek,
    F: FnMut(RecoveryProgress),
{
    let layout = &config.layout;
    layout.validate()?;

    let mut report = RecoveryReport::new(config.output_dir.clone());
    let mut buf = vec![0u8; layout.unit_size()];
    // Objects whose payload ran out during this pass
    let mut drained = BTreeSet::new();

    tracing::info!(
        "Recovering {} objects into {}",
        headers.len(),
        config.output_dir.display()
    );

    'objects: for (&object_id, blocks) in headers.iter().rev() {
        for (&block_position, offsets) in blocks.iter().rev() {
            for &header_offset in offsets.iter().rev() {
                if payload.is_empty() {
                    tracing::debug!("Payload pool exhausted, stopping");
                    break 'objects;
                }

                read_unit_at(source, header_offset, &mut buf)?;
                let header = Unit::new(&buf, layout);
                let declared_size = header.size();
                if declared_size == 0 {
                    tracing::trace!("Empty header of object {} at 0x{:x}", object_id, header_offset);
                    report.skipped_empty += 1;
                    continue;
                }

                let chunks_required = layout.chunks_for(declared_size);
                let name = output_name(&header, config.timestamp_zone);

                let Some(pool) = payload.get_mut(&object_id) else {
                    if drained.contains(&object_id) {
                        // Matched an object, nothing left to write
                        on_progress(RecoveryProgress::HeaderMatched {
                            name,
                            chunks: chunks_required,
                            object_id,
                        });
                    }
                    report.skipped_no_payload += 1;
                    continue;
                };

                on_progress(RecoveryProgress::HeaderMatched {
                    name: name.clone(),
                    chunks: chunks_required,
                    object_id,
                });

                let occurrence = Occurrence {
                    object_id,
                    block_position,
                    header_offset,
                    path: config.output_dir.join(&name),
                    name,
                    declared_size,
                    chunks_required,
                };

                match recover_occurrence(source, pool, &occurrence, config, &mut buf) {
                    Ok(file) => {
                        on_progress(RecoveryProgress::FileWritten {
                            name: file.name.clone(),
                            bytes_written: file.bytes_written,
                            chunks_recovered: file.chunks_recovered,
                        });
                        report.record(file);
                    }
                    Err(err) if err.is_local() => {
                        tracing::warn!("{}", err);
                        report.failures.push(FailedRecovery {
                            object_id,
                            header_offset,
                            path: occurrence.path.clone(),
                            error: err.to_string(),
                        });
                    }
                    Err(err) => return Err(err),
                }

                if pool.is_empty() {
                    payload.remove(&object_id);
                    drained.insert(object_id);
                }
            }
        }
    }

    report.finish();
    tracing::info!(
        "Recovery complete: {} files written ({} truncated), {} failed, {} bytes",
        report.files_written(),
        report.truncated_files(),
        report.failures.len(),
        report.total_bytes
    );

    Ok(report)
}

/// Write one occurrence; the output is created before any payload is taken
fn recover_occurrence<R: Read + Seek>(
    source: &mut R,
    pool: &mut BlockMap,
    occurrence: &Occurrence,
    config: &RecoveryConfig,
    buf: &mut [u8],
) -> Result<RecoveredFile, RecoveryError> {
    let output_err = |e| RecoveryError::OutputUnavailable {
        path: occurrence.path.clone(),
        source: e,
    };

    let file = File::create(&occurrence.path).map_err(output_err)?;
    let mut writer = BufWriter::new(file);

    let mut stack = take_payload(pool, occurrence.chunks_required);
    let chunks_recovered = stack.len() as u64;

    let mut hasher = config.compute_digests.then(Sha256::new);
    let mut remaining = occurrence.declared_size;
    let mut bytes_written = 0u64;

    // Popping yields offsets oldest first
    while let Some(offset) = stack.pop() {
        read_unit_at(source, offset, buf)?;
        let chunk = Unit::new(buf, &config.layout).payload();
        let len = (chunk.len() as u64).min(remaining) as usize;

        writer.write_all(&chunk[..len]).map_err(output_err)?;
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk[..len]);
        }
        remaining -= len as u64;
        bytes_written += len as u64;
    }

    writer.flush().map_err(output_err)?;

    tracing::debug!(
        "Wrote {} ({} of {} chunks, {} bytes)",
        occurrence.path.display(),
        chunks_recovered,
        occurrence.chunks_required,
        bytes_written
    );

    Ok(RecoveredFile {
        object_id: occurrence.object_id,
        block_position: occurrence.block_position,
        header_offset: occurrence.header_offset,
        name: occurrence.name.clone(),
        path: occurrence.path.clone(),
        declared_size: occurrence.declared_size,
        chunks_required: occurrence.chunks_required,
        chunks_recovered,
        bytes_written,
        sha256: hasher.map(|h| format!("{:x}", h.finalize())),
    })
}

/// Remove up to `count` offsets from `pool`, newest block and offset first.
///
/// The returned stack holds them newest-first; emptied buckets are dropped.
pub fn take_payload(pool: &mut BlockMap, count: u64) -> Vec<u64> {
    let mut stack = Vec::new();

    while (stack.len() as u64) < count {
        let Some(mut bucket) = pool.last_entry() else {
            break;
        };
        while (stack.len() as u64) < count {
            match bucket.get_mut().pop() {
                Some(offset) => stack.push(offset),
                None => break,
            }
        }
        if bucket.get().is_empty() {
            bucket.remove();
        }
    }

    stack
}

fn read_unit_at<R: Read + Seek>(source: &mut R, offset: u64, buf: &mut [u8]) -> Result<(), RecoveryError> {
    source
        .seek(SeekFrom::Start(offset))
        .and_then(|_| source.read_exact(buf))
        .map_err(RecoveryError::SourceUnavailable)
}
