/// Output naming for recovered header occurrences
///
/// `<stored name> [YYYY-M-D-HH-MM-SS]`, the timestamp being the header's
/// modification time. Two occurrences of one object with the same
/// second-granularity mtime map to the same name.
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::unit::Unit;

/// Zone used to expand modification times
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampZone {
    #[default]
    Local,
    Utc,
}

/// Derive the output file name for a header unit
pub fn output_name(header: &Unit<'_>, zone: TimestampZone) -> String {
    let stored = sanitize_name(header.name());
    let base = if stored.is_empty() {
        format!("object-{}", header.object_id())
    } else {
        stored
    };

    format!("{} [{}]", base, format_mtime(header.mtime(), zone))
}

/// Expand Unix seconds as `Y-M-D-HH-MM-SS` (month and day unpadded)
pub fn format_mtime(secs: i64, zone: TimestampZone) -> String {
    let formatted = match zone {
        TimestampZone::Local => Local.timestamp_opt(secs, 0).earliest().map(|t| stamp(&t)),
        TimestampZone::Utc => DateTime::<Utc>::from_timestamp(secs, 0).map(|t| stamp(&t)),
    };

    // Out-of-range times keep the raw value
    formatted.unwrap_or_else(|| format!("@{}", secs))
}

fn stamp<Tz: TimeZone>(t: &DateTime<Tz>) -> String {
    format!(
        "{}-{}-{}-{:02}-{:02}-{:02}",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

/// Stored names are raw bytes; keep them inside the output directory
fn sanitize_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c => c,
        })
        .collect()
}
