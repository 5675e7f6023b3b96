use std::collections::HashSet;

use crate::snapshot::Snapshot;

/// A drawn line between two points, by snapshot index.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GraphEdge {
    pub(crate) source: usize,
    pub(crate) target: usize,
    pub(crate) rest_length: Option<f32>,
    pub(crate) emphasis: bool,
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Edges for the force graph: the snapshot's own edges when it has any,
/// otherwise every result linked to every other point. Links between two
/// results are emphasised.
pub(crate) fn graph_edges(snapshot: &Snapshot) -> Vec<GraphEdge> {
    if let Some(edges) = &snapshot.edges {
        return edges
            .iter()
            .map(|edge| GraphEdge {
                source: edge.source,
                target: edge.target,
                rest_length: edge.rest_length,
                emphasis: edge.emphasis,
            })
            .collect();
    }

    let result_indices = snapshot
        .results
        .iter()
        .filter_map(|result| snapshot.index_of(&result.id))
        .collect::<Vec<_>>();
    let is_result = result_indices.iter().copied().collect::<HashSet<_>>();

    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for &result in &result_indices {
        for other in 0..snapshot.point_count() {
            if other == result {
                continue;
            }
            let (source, target) = ordered(result, other);
            if !seen.insert((source, target)) {
                continue;
            }
            edges.push(GraphEdge {
                source,
                target,
                rest_length: None,
                emphasis: is_result.contains(&other),
            });
        }
    }
    edges
}

/// Every pair of results, in rank order.
pub(crate) fn result_connectors(snapshot: &Snapshot) -> Vec<(usize, usize)> {
    let result_indices = snapshot
        .results
        .iter()
        .filter_map(|result| snapshot.index_of(&result.id))
        .collect::<Vec<_>>();

    let mut pairs = Vec::new();
    for (offset, &from) in result_indices.iter().enumerate() {
        for &to in &result_indices[offset + 1..] {
            pairs.push((from, to));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{EdgeInput, PointInput, ResultEntry};

    fn snapshot(ids: &[&str], results: &[&str], edges: Option<Vec<EdgeInput>>) -> Snapshot {
        let points = ids
            .iter()
            .enumerate()
            .map(|(index, id)| PointInput {
                id: (*id).to_owned(),
                label: (*id).to_owned(),
                content: String::new(),
                x: index as f32,
                y: 0.0,
                z: None,
            })
            .collect();
        let results = results
            .iter()
            .map(|id| ResultEntry {
                id: (*id).to_owned(),
                strength: 0.5,
            })
            .collect();
        Snapshot::from_parts(points, results, edges).0
    }

    #[test]
    fn star_links_every_result_to_every_point_once() {
        let snapshot = snapshot(&["a", "b", "c", "d"], &["a", "c"], None);
        let edges = graph_edges(&snapshot);

        // a-b a-c a-d c-b c-d; a-c only once.
        assert_eq!(edges.len(), 5);
        let emphasised = edges.iter().filter(|edge| edge.emphasis).collect::<Vec<_>>();
        assert_eq!(emphasised.len(), 1);
        assert_eq!((emphasised[0].source, emphasised[0].target), (0, 2));
        assert!(edges.iter().all(|edge| edge.source < edge.target));
    }

    #[test]
    fn no_results_means_no_synthesised_edges() {
        let snapshot = snapshot(&["a", "b"], &[], None);
        assert!(graph_edges(&snapshot).is_empty());
        assert!(result_connectors(&snapshot).is_empty());
    }

    #[test]
    fn explicit_edges_replace_the_star() {
        let snapshot = snapshot(
            &["a", "b", "c"],
            &["a"],
            Some(vec![EdgeInput {
                source_id: "c".to_owned(),
                target_id: "b".to_owned(),
                rest_length: Some(40.0),
                emphasis: false,
            }]),
        );
        let edges = graph_edges(&snapshot);
        assert_eq!(
            edges,
            vec![GraphEdge {
                source: 1,
                target: 2,
                rest_length: Some(40.0),
                emphasis: false,
            }]
        );
    }

    #[test]
    fn connectors_cover_all_result_pairs() {
        let snapshot = snapshot(&["a", "b", "c", "d"], &["d", "a", "b"], None);
        assert_eq!(result_connectors(&snapshot), vec![(3, 0), (3, 1), (0, 1)]);
    }
}
