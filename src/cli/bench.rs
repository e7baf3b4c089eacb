//! Scan benchmark
//!
//! Measures cold and warm scans of a path plus the cost of serializing,
//! validating and storing the resulting tree and cache.

use crate::cache::Cache;
use crate::config::SyncSettings;
use crate::error::CliError;
use crate::tree::entry::Entry;
use crate::tree::hasher::Sha1Hasher;
use crate::tree::walker::{self, ScanOptions};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// Timings and sizes collected by [`run_bench`]
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub path: String,
    pub entries: u64,
    pub preserves_executability: bool,
    pub cold_scan: Duration,
    pub warm_scan: Duration,
    pub warm_cache_hits: u64,
    pub snapshot_serialize: Duration,
    pub snapshot_deserialize: Duration,
    pub snapshot_validate: Duration,
    pub snapshot_write: Duration,
    pub snapshot_read: Duration,
    pub snapshot_size: usize,
    pub snapshots_equal: bool,
    pub snapshot_digest: Duration,
    pub cache_serialize: Duration,
    pub cache_deserialize: Duration,
    pub cache_write: Duration,
    pub cache_read: Duration,
    pub cache_size: usize,
}

fn timed<T>(operation: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = operation();
    (value, start.elapsed())
}

fn encode_error(e: bincode::Error) -> CliError {
    CliError::Invalid(format!("serialization failed: {}", e))
}

/// Run the benchmark against `path`
pub fn run_bench(path: &Path, settings: &SyncSettings) -> Result<BenchReport, CliError> {
    let hasher = Sha1Hasher;
    let options: ScanOptions = settings.scan_options()?;
    info!(path = %path.display(), "Analyzing");

    let (cold, cold_scan) = timed(|| walker::scan(path, &hasher, &Cache::new(), &options));
    let cold = cold?;
    let snapshot = cold
        .tree
        .ok_or_else(|| CliError::Invalid(format!("{} does not exist", path.display())))?;

    let (warm, warm_scan) = timed(|| walker::scan(path, &hasher, &cold.cache, &options));
    let warm = warm?;
    if warm.tree.is_none() {
        return Err(CliError::Invalid(
            "target has been deleted since the cold scan".to_string(),
        ));
    }

    let (serialized, snapshot_serialize) = timed(|| bincode::serialize(&snapshot));
    let serialized = serialized.map_err(encode_error)?;
    let (deserialized, snapshot_deserialize) = timed(|| bincode::deserialize::<Entry>(&serialized));
    let deserialized = deserialized.map_err(encode_error)?;
    let (valid, snapshot_validate) = timed(|| deserialized.ensure_valid());
    valid.map_err(|e| CliError::Invalid(format!("deserialized snapshot invalid: {}", e)))?;

    let scratch = tempfile::TempDir::new()?;
    let snapshot_file = scratch.path().join("snapshot");
    let (written, snapshot_write) = timed(|| std::fs::write(&snapshot_file, &serialized));
    written?;
    let (read, snapshot_read) = timed(|| std::fs::read(&snapshot_file));
    read?;
    let (_, snapshot_digest) = timed(|| blake3::hash(&serialized));

    let (serialized_cache, cache_serialize) = timed(|| bincode::serialize(&cold.cache));
    let serialized_cache = serialized_cache.map_err(encode_error)?;
    let (decoded_cache, cache_deserialize) = timed(|| bincode::deserialize::<Cache>(&serialized_cache));
    decoded_cache.map_err(encode_error)?;
    let cache_file = scratch.path().join("cache");
    let (written, cache_write) = timed(|| std::fs::write(&cache_file, &serialized_cache));
    written?;
    let (read, cache_read) = timed(|| std::fs::read(&cache_file));
    read?;

    Ok(BenchReport {
        path: path.display().to_string(),
        entries: snapshot.count(),
        preserves_executability: cold.preserves_executability,
        cold_scan,
        warm_scan,
        warm_cache_hits: warm.statistics.cache_hits,
        snapshot_serialize,
        snapshot_deserialize,
        snapshot_validate,
        snapshot_write,
        snapshot_read,
        snapshot_size: serialized.len(),
        snapshots_equal: deserialized == snapshot,
        snapshot_digest,
        cache_serialize,
        cache_deserialize,
        cache_write,
        cache_read,
        cache_size: serialized_cache.len(),
    })
}

/// Format the report as a two-column table
pub fn format_bench_text(report: &BenchReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Measurement", "Value"]);
    let rows: Vec<(&str, String)> = vec![
        ("Entries", report.entries.to_string()),
        ("Preserves executability", report.preserves_executability.to_string()),
        ("Cold scan", format!("{:?}", report.cold_scan)),
        ("Warm scan", format!("{:?}", report.warm_scan)),
        ("Warm scan cache hits", report.warm_cache_hits.to_string()),
        ("Snapshot serialization", format!("{:?}", report.snapshot_serialize)),
        ("Snapshot deserialization", format!("{:?}", report.snapshot_deserialize)),
        ("Snapshot validation", format!("{:?}", report.snapshot_validate)),
        ("Snapshot write", format!("{:?}", report.snapshot_write)),
        ("Snapshot read", format!("{:?}", report.snapshot_read)),
        ("Snapshot size (bytes)", report.snapshot_size.to_string()),
        ("Snapshots equal", report.snapshots_equal.to_string()),
        ("Snapshot digest", format!("{:?}", report.snapshot_digest)),
        ("Cache serialization", format!("{:?}", report.cache_serialize)),
        ("Cache deserialization", format!("{:?}", report.cache_deserialize)),
        ("Cache write", format!("{:?}", report.cache_write)),
        ("Cache read", format!("{:?}", report.cache_read)),
        ("Cache size (bytes)", report.cache_size.to_string()),
    ];
    for (label, value) in rows {
        table.add_row(vec![label.to_string(), value]);
    }
    format!("Analyzing {}\n{}", report.path, table)
}
