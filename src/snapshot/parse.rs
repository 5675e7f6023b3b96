use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;

use super::model::{EdgeInput, PointInput, ResultEntry};

#[derive(Clone, Debug, Deserialize)]
struct RawPoint {
    id: String,
    #[serde(default, alias = "title")]
    label: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    z: Option<f64>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawResult {
    id: String,
    #[serde(default, alias = "relevance_score")]
    strength: Option<f64>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawEdge {
    #[serde(rename = "sourceId", alias = "source")]
    source_id: String,
    #[serde(rename = "targetId", alias = "target")]
    target_id: String,
    #[serde(default, rename = "restLength")]
    rest_length: Option<f64>,
    #[serde(default)]
    emphasis: bool,
}

/// Entries as read from disk, before sanitisation. `skipped` counts array
/// entries that did not even have the right shape.
#[derive(Debug, Default)]
pub(super) struct ParsedSnapshot {
    pub(super) points: Vec<PointInput>,
    pub(super) results: Vec<ResultEntry>,
    pub(super) edges: Option<Vec<EdgeInput>>,
    pub(super) skipped: usize,
}

fn as_coordinate(value: Option<f64>) -> f32 {
    value.map(|value| value as f32).unwrap_or(f32::NAN)
}

fn entries<'a>(object: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a Vec<Value>> {
    object.get(key).and_then(Value::as_array)
}

pub(super) fn parse_snapshot(raw: &str) -> Result<ParsedSnapshot> {
    let parsed: Value = serde_json::from_str(raw).context("snapshot is not valid JSON")?;
    let object = parsed
        .as_object()
        .ok_or_else(|| anyhow!("snapshot must be a JSON object"))?;
    let raw_points = entries(object, "points")
        .ok_or_else(|| anyhow!("snapshot has no `points` array"))?;

    let mut snapshot = ParsedSnapshot::default();

    for value in raw_points {
        match RawPoint::deserialize(value) {
            Ok(point) => snapshot.points.push(PointInput {
                label: point.label.unwrap_or_else(|| point.id.clone()),
                id: point.id,
                content: point.content.unwrap_or_default(),
                x: as_coordinate(point.x),
                y: as_coordinate(point.y),
                z: point.z.map(|z| z as f32),
            }),
            Err(_) => snapshot.skipped += 1,
        }
    }

    if let Some(raw_results) = entries(object, "results") {
        for value in raw_results {
            match RawResult::deserialize(value) {
                Ok(result) => snapshot.results.push(ResultEntry {
                    id: result.id,
                    strength: result.strength.unwrap_or(0.0) as f32,
                }),
                Err(_) => snapshot.skipped += 1,
            }
        }
    }

    if let Some(raw_edges) = entries(object, "edges") {
        let mut edges = Vec::with_capacity(raw_edges.len());
        for value in raw_edges {
            match RawEdge::deserialize(value) {
                Ok(edge) => edges.push(EdgeInput {
                    source_id: edge.source_id,
                    target_id: edge.target_id,
                    rest_length: edge.rest_length.map(|length| length as f32),
                    emphasis: edge.emphasis,
                }),
                Err(_) => snapshot.skipped += 1,
            }
        }
        snapshot.edges = Some(edges);
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points_results_and_edges() {
        let raw = r#"{
            "points": [
                {"id": "doc1", "title": "Document 1", "content": "hello", "x": 1.5, "y": -2, "z": 0.25},
                {"id": "doc2", "label": "Two", "x": 3, "y": 4}
            ],
            "results": [{"id": "doc2", "relevance_score": 0.7}],
            "edges": [{"sourceId": "doc1", "targetId": "doc2", "restLength": 42}]
        }"#;

        let parsed = parse_snapshot(raw).expect("valid snapshot");
        assert_eq!(parsed.points.len(), 2);
        assert_eq!(parsed.points[0].label, "Document 1");
        assert_eq!(parsed.points[0].z, Some(0.25));
        assert_eq!(parsed.points[1].z, None);
        assert_eq!(parsed.results[0].strength, 0.7);
        let edges = parsed.edges.expect("edges present");
        assert_eq!(edges[0].rest_length, Some(42.0));
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let raw = r#"{
            "points": [{"id": "a", "x": 0, "y": 0}, {"label": "no id"}, 17, {"id": "b", "x": null, "y": 1}],
            "results": [{"strength": 0.3}]
        }"#;

        let parsed = parse_snapshot(raw).expect("lenient parse");
        assert_eq!(parsed.points.len(), 2);
        assert!(parsed.points[1].x.is_nan());
        assert!(parsed.edges.is_none());
        assert_eq!(parsed.skipped, 3);
    }

    #[test]
    fn missing_points_array_is_an_error() {
        assert!(parse_snapshot(r#"{"results": []}"#).is_err());
        assert!(parse_snapshot("[1, 2]").is_err());
        assert!(parse_snapshot("not json").is_err());
    }
}
