use std::collections::{HashMap, HashSet};

/// A point as supplied by the caller, before validation.
#[derive(Clone, Debug, PartialEq)]
pub struct PointInput {
    pub id: String,
    pub label: String,
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResultEntry {
    pub id: String,
    pub strength: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EdgeInput {
    pub source_id: String,
    pub target_id: String,
    pub rest_length: Option<f32>,
    pub emphasis: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub id: String,
    pub label: String,
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
}

/// An unordered pair of point indices. `source < target` always holds.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotEdge {
    pub source: usize,
    pub target: usize,
    pub rest_length: Option<f32>,
    pub emphasis: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub non_finite_points: usize,
    pub duplicate_points: usize,
    pub dangling_edges: usize,
    pub duplicate_edges: usize,
    pub unknown_results: usize,
    pub duplicate_results: usize,
    pub malformed_entries: usize,
}

impl SanitizeReport {
    pub fn dropped(&self) -> usize {
        self.non_finite_points
            + self.duplicate_points
            + self.dangling_edges
            + self.duplicate_edges
            + self.unknown_results
            + self.duplicate_results
            + self.malformed_entries
    }
}

/// One validated dataset: unique point ids, edges that only reference known
/// points, and results that are a subset of the points.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub points: Vec<Point>,
    pub results: Vec<ResultEntry>,
    /// `None` when the caller supplied no edges; views then synthesise their own.
    pub edges: Option<Vec<SnapshotEdge>>,
    index_by_id: HashMap<String, usize>,
    strength_by_id: HashMap<String, f32>,
}

impl Snapshot {
    pub fn from_parts(
        points: Vec<PointInput>,
        results: Vec<ResultEntry>,
        edges: Option<Vec<EdgeInput>>,
    ) -> (Self, SanitizeReport) {
        let mut report = SanitizeReport::default();
        let mut index_by_id = HashMap::with_capacity(points.len());
        let mut kept = Vec::with_capacity(points.len());

        for point in points {
            if !point.x.is_finite() || !point.y.is_finite() {
                report.non_finite_points += 1;
                continue;
            }
            if index_by_id.contains_key(&point.id) {
                report.duplicate_points += 1;
                continue;
            }

            index_by_id.insert(point.id.clone(), kept.len());
            kept.push(Point {
                id: point.id,
                label: point.label,
                content: point.content,
                x: point.x,
                y: point.y,
                z: point.z.filter(|z| z.is_finite()),
            });
        }

        let mut strength_by_id = HashMap::with_capacity(results.len());
        let mut ranked = Vec::with_capacity(results.len());
        for result in results {
            if !index_by_id.contains_key(&result.id) {
                report.unknown_results += 1;
                continue;
            }
            if strength_by_id.contains_key(&result.id) {
                report.duplicate_results += 1;
                continue;
            }

            let strength = if result.strength.is_finite() {
                result.strength.clamp(0.0, 1.0)
            } else {
                0.0
            };
            strength_by_id.insert(result.id.clone(), strength);
            ranked.push(ResultEntry {
                id: result.id,
                strength,
            });
        }

        let edges = edges.map(|edges| {
            let mut seen = HashSet::with_capacity(edges.len());
            let mut kept_edges = Vec::with_capacity(edges.len());
            for edge in edges {
                let (Some(&from), Some(&to)) = (
                    index_by_id.get(&edge.source_id),
                    index_by_id.get(&edge.target_id),
                ) else {
                    report.dangling_edges += 1;
                    continue;
                };
                if from == to {
                    report.dangling_edges += 1;
                    continue;
                }

                let (source, target) = (from.min(to), from.max(to));
                if !seen.insert((source, target)) {
                    report.duplicate_edges += 1;
                    continue;
                }

                kept_edges.push(SnapshotEdge {
                    source,
                    target,
                    rest_length: edge
                        .rest_length
                        .filter(|length| length.is_finite() && *length > 0.0),
                    emphasis: edge.emphasis,
                });
            }
            kept_edges
        });

        let snapshot = Self {
            points: kept,
            results: ranked,
            edges,
            index_by_id,
            strength_by_id,
        };
        (snapshot, report)
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    /// Relevance strength if the point is part of the result subset.
    pub fn strength_of(&self, id: &str) -> Option<f32> {
        self.strength_by_id.get(id).copied()
    }

    pub fn is_result(&self, id: &str) -> bool {
        self.strength_by_id.contains_key(id)
    }

    pub fn result_rank(&self, id: &str) -> Option<usize> {
        self.results.iter().position(|result| result.id == id)
    }
}
