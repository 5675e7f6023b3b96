use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::model::Snapshot;
use super::parse::parse_snapshot;

pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let parsed =
        parse_snapshot(&raw).with_context(|| format!("failed to parse {}", path.display()))?;

    let (snapshot, mut report) = Snapshot::from_parts(parsed.points, parsed.results, parsed.edges);
    report.malformed_entries = parsed.skipped;

    if report.dropped() > 0 {
        warn!(?report, "dropped invalid snapshot entries");
    }
    info!(
        points = snapshot.point_count(),
        results = snapshot.results.len(),
        explicit_edges = snapshot.edges.as_ref().map(Vec::len),
        "loaded snapshot from {}",
        path.display()
    );

    Ok(snapshot)
}
