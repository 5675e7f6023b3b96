//! Retained drawing primitives.
//!
//! Primitives are keyed by point id and live in index-stable slots, so a
//! re-sync after a data change updates what already exists instead of
//! rebuilding the scene.

use std::collections::HashMap;

use eframe::egui::Pos2;
use tracing::trace;

pub(crate) mod cloud;
pub(crate) mod style;

use style::{NodeTraits, NodeVisual, VisualScheme, focused_visual, node_visual};

/// One node as handed to [`Scene2d::sync`].
#[derive(Clone, Debug)]
pub(crate) struct NodeSpec<'a> {
    pub(crate) id: &'a str,
    pub(crate) label: &'a str,
    pub(crate) caption: String,
    pub(crate) position: Pos2,
    pub(crate) traits: NodeTraits,
}

#[derive(Clone, Debug)]
pub(crate) struct EdgeSpec<'a> {
    pub(crate) source: &'a str,
    pub(crate) target: &'a str,
    pub(crate) emphasis: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct NodePrimitive {
    pub(crate) id: String,
    pub(crate) label: String,
    /// Text drawn next to the disc.
    pub(crate) caption: String,
    pub(crate) position: Pos2,
    pub(crate) traits: NodeTraits,
    pub(crate) visual: NodeVisual,
    pub(crate) focused: bool,
}

impl NodePrimitive {
    /// The visual to paint right now, focus included.
    pub(crate) fn effective_visual(&self, scheme: VisualScheme) -> NodeVisual {
        if self.focused {
            focused_visual(scheme, self.visual)
        } else {
            self.visual
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EdgePrimitive {
    pub(crate) from: usize,
    pub(crate) to: usize,
    pub(crate) emphasis: bool,
}

pub(crate) struct Scene2d {
    scheme: VisualScheme,
    slots: Vec<Option<NodePrimitive>>,
    free: Vec<usize>,
    slot_by_id: HashMap<String, usize>,
    /// Input order of the last sync mapped to slots.
    order: Vec<usize>,
    edges: Vec<EdgePrimitive>,
    edge_slot: HashMap<(String, String), usize>,
    created: usize,
}

fn edge_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_owned(), b.to_owned())
    } else {
        (b.to_owned(), a.to_owned())
    }
}

impl Scene2d {
    pub(crate) fn new(scheme: VisualScheme) -> Self {
        Self {
            scheme,
            slots: Vec::new(),
            free: Vec::new(),
            slot_by_id: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            edge_slot: HashMap::new(),
            created: 0,
        }
    }

    /// Makes the live primitives match `nodes`. Existing ids keep their slot
    /// and only have changed attributes rewritten; ids no longer present are
    /// released.
    pub(crate) fn sync(&mut self, nodes: &[NodeSpec<'_>]) {
        let mut seen = vec![false; self.slots.len()];
        self.order.clear();

        for spec in nodes {
            let slot = match self.slot_by_id.get(spec.id) {
                Some(&slot) => {
                    if let Some(primitive) = self.slots[slot].as_mut() {
                        if primitive.label != spec.label {
                            primitive.label = spec.label.to_owned();
                        }
                        if primitive.caption != spec.caption {
                            primitive.caption.clone_from(&spec.caption);
                        }
                        primitive.position = spec.position;
                        if primitive.traits != spec.traits {
                            primitive.traits = spec.traits;
                            primitive.visual = node_visual(self.scheme, spec.traits);
                        }
                    }
                    slot
                }
                None => self.create(spec),
            };
            if slot >= seen.len() {
                seen.resize(slot + 1, false);
            }
            seen[slot] = true;
            self.order.push(slot);
        }

        for (slot, kept) in seen.iter().enumerate() {
            if *kept {
                continue;
            }
            if let Some(primitive) = self.slots[slot].take() {
                self.slot_by_id.remove(&primitive.id);
                self.free.push(slot);
            }
        }
        trace!(live = self.order.len(), created = self.created, "scene synced");
    }

    fn create(&mut self, spec: &NodeSpec<'_>) -> usize {
        let primitive = NodePrimitive {
            id: spec.id.to_owned(),
            label: spec.label.to_owned(),
            caption: spec.caption.clone(),
            position: spec.position,
            traits: spec.traits,
            visual: node_visual(self.scheme, spec.traits),
            focused: false,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(primitive);
                slot
            }
            None => {
                self.slots.push(Some(primitive));
                self.slots.len() - 1
            }
        };
        self.slot_by_id.insert(spec.id.to_owned(), slot);
        self.created += 1;
        slot
    }

    /// Edges whose endpoints are not in the scene are skipped.
    pub(crate) fn sync_edges(&mut self, edges: &[EdgeSpec<'_>]) {
        let mut next = Vec::with_capacity(edges.len());
        let mut next_slots = HashMap::with_capacity(edges.len());
        for edge in edges {
            let (Some(&from), Some(&to)) = (
                self.slot_by_id.get(edge.source),
                self.slot_by_id.get(edge.target),
            ) else {
                continue;
            };
            let key = edge_key(edge.source, edge.target);
            if next_slots.contains_key(&key) {
                continue;
            }
            next_slots.insert(key, next.len());
            next.push(EdgePrimitive {
                from,
                to,
                emphasis: edge.emphasis,
            });
        }
        self.edges = next;
        self.edge_slot = next_slots;
    }

    /// Writes positions in the input order of the last sync.
    pub(crate) fn write_positions(&mut self, positions: impl IntoIterator<Item = Pos2>) {
        for (&slot, position) in self.order.iter().zip(positions) {
            if let Some(primitive) = self.slots[slot].as_mut() {
                primitive.position = position;
            }
        }
    }

    /// Updates one node's traits in place, recomputing its visual only on change.
    pub(crate) fn set_traits(&mut self, id: &str, traits: NodeTraits) {
        let scheme = self.scheme;
        if let Some(primitive) = self.get_mut(id)
            && primitive.traits != traits
        {
            primitive.traits = traits;
            primitive.visual = node_visual(scheme, traits);
        }
    }

    pub(crate) fn set_focused(&mut self, id: &str, focused: bool) {
        if let Some(primitive) = self.get_mut(id) {
            primitive.focused = focused;
        }
    }

    pub(crate) fn get(&self, id: &str) -> Option<&NodePrimitive> {
        let slot = *self.slot_by_id.get(id)?;
        self.slots[slot].as_ref()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut NodePrimitive> {
        let slot = *self.slot_by_id.get(id)?;
        self.slots[slot].as_mut()
    }

    pub(crate) fn slot(&self, slot: usize) -> Option<&NodePrimitive> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Live primitives in input order.
    pub(crate) fn nodes(&self) -> impl Iterator<Item = &NodePrimitive> {
        self.order.iter().filter_map(|&slot| self.slots[slot].as_ref())
    }

    pub(crate) fn edges(&self) -> &[EdgePrimitive] {
        &self.edges
    }

    #[cfg(test)]
    pub(crate) fn has_edge(&self, a: &str, b: &str) -> bool {
        self.edge_slot.contains_key(&edge_key(a, b))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    fn created(&self) -> usize {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    fn traits(highlighted: bool) -> NodeTraits {
        NodeTraits {
            pinned: false,
            highlighted,
            strength: 0.5,
        }
    }

    fn spec<'a>(id: &'a str, highlighted: bool) -> NodeSpec<'a> {
        NodeSpec {
            id,
            label: id,
            caption: id.to_owned(),
            position: pos2(0.0, 0.0),
            traits: traits(highlighted),
        }
    }

    #[test]
    fn resync_updates_primitives_in_place() {
        let mut scene = Scene2d::new(VisualScheme::Graph);
        scene.sync(&[spec("a", false), spec("b", true)]);
        assert_eq!(scene.created(), 2);
        let small = scene.get("a").map(|node| node.visual.radius);

        scene.sync(&[spec("a", true), spec("b", true)]);
        assert_eq!(scene.created(), 2);
        assert!(scene.get("a").map(|node| node.visual.radius) > small);
    }

    #[test]
    fn removed_ids_free_their_slot_for_reuse() {
        let mut scene = Scene2d::new(VisualScheme::Scatter);
        scene.sync(&[spec("a", false), spec("b", false), spec("c", false)]);
        scene.sync(&[spec("a", false), spec("c", false)]);
        assert!(scene.get("b").is_none());
        assert_eq!(scene.len(), 2);

        scene.sync(&[spec("a", false), spec("c", false), spec("d", false)]);
        assert_eq!(scene.created(), 4);
        assert_eq!(scene.slots.len(), 3);
        let ids = scene.nodes().map(|node| node.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["a", "c", "d"]);
    }

    #[test]
    fn positions_follow_input_order() {
        let mut scene = Scene2d::new(VisualScheme::Graph);
        scene.sync(&[spec("x", false), spec("y", false)]);
        scene.write_positions([pos2(1.0, 2.0), pos2(3.0, 4.0)]);
        assert_eq!(scene.get("y").map(|node| node.position), Some(pos2(3.0, 4.0)));
    }

    #[test]
    fn edges_are_deduplicated_and_skip_unknown_ids() {
        let mut scene = Scene2d::new(VisualScheme::Graph);
        scene.sync(&[spec("a", true), spec("b", false)]);
        scene.sync_edges(&[
            EdgeSpec {
                source: "a",
                target: "b",
                emphasis: false,
            },
            EdgeSpec {
                source: "b",
                target: "a",
                emphasis: false,
            },
            EdgeSpec {
                source: "a",
                target: "ghost",
                emphasis: true,
            },
        ]);
        assert_eq!(scene.edges().len(), 1);
        assert!(scene.has_edge("b", "a"));
    }

    #[test]
    fn focus_only_touches_the_overlay() {
        let mut scene = Scene2d::new(VisualScheme::Graph);
        scene.sync(&[spec("a", true)]);
        scene.set_focused("a", true);
        let node = scene.get("a").expect("node");
        let focused = node.effective_visual(VisualScheme::Graph);
        assert_eq!(focused.radius, node.visual.radius);
        assert_eq!(focused.label_size, 14.0);

        scene.set_focused("a", false);
        let node = scene.get("a").expect("node");
        assert_eq!(node.effective_visual(VisualScheme::Graph), node.visual);
    }
}
