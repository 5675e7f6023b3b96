use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use eframe::egui::{self, Align2, Color32, FontId, Painter, Pos2, Ui, vec2};
use tracing::{debug, info};

use crate::snapshot::{ResultEntry, Snapshot};

use super::interaction::{FocusChange, FocusTracker, ViewEvent};
use super::physics::SimulationParams;
use super::scene::NodePrimitive;
use super::scene::style::{
    NodeTraits, NodeVisual, VisualScheme, focused_visual, mix_visual, node_visual, with_opacity,
};
use super::sequencer::{SequenceEvent, SequenceOverlay, Sequencer};

mod build;
mod cloud_view;
mod force_view;
mod scatter;

pub(crate) use cloud_view::CloudView;
pub(crate) use force_view::ForceGraphView;
pub(crate) use scatter::ScatterView;

const FOCUS_FADE_SECS: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ViewKind {
    /// Force-directed 2D graph.
    Graph,
    /// Static 2D scatter of the input coordinates.
    Scatter,
    /// Navigable 3D point cloud.
    Cloud,
}

impl ViewKind {
    pub(crate) const ALL: [Self; 3] = [Self::Graph, Self::Scatter, Self::Cloud];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Graph => "Force graph",
            Self::Scatter => "Scatter",
            Self::Cloud => "3D cloud",
        }
    }
}

/// State every view owns: hover focus, the highlight run and the events
/// waiting to be collected by the host.
#[derive(Debug, Default)]
pub(crate) struct ViewContext {
    pub(crate) focus: FocusTracker,
    pub(crate) sequencer: Sequencer,
    pub(crate) overlay: SequenceOverlay,
    events: Vec<ViewEvent>,
}

impl ViewContext {
    pub(crate) fn emit(&mut self, event: ViewEvent) {
        debug!(?event, "view event");
        self.events.push(event);
    }

    pub(crate) fn take_events(&mut self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.events)
    }

    /// Moves hover focus, emitting an event only when it changes.
    pub(crate) fn hover(&mut self, id: Option<&str>) -> Option<FocusChange> {
        let change = self.focus.update(id)?;
        self.emit(ViewEvent::Hover(change.entered.clone()));
        Some(change)
    }

    pub(crate) fn start_sequence(&mut self, results: &[ResultEntry], speed: f32, now: f64) -> bool {
        self.sequencer.start(results, speed, now)
    }

    /// Applies due steps to the overlay. Returns whether anything is still
    /// changing over time.
    pub(crate) fn advance(&mut self, now: f64) -> bool {
        for event in self.sequencer.poll(now) {
            self.overlay.apply(&event, now);
            if event == SequenceEvent::Complete {
                self.emit(ViewEvent::AnimationComplete);
            }
        }
        self.sequencer.is_animating() || self.overlay.has_pending_effects(now)
    }

    pub(crate) fn teardown(&mut self) {
        self.sequencer.cancel();
        self.focus.clear();
    }
}

/// Highlight traits for a point, honouring an active run.
pub(crate) fn point_traits(
    snapshot: &Snapshot,
    overlay: &SequenceOverlay,
    id: &str,
    pinned: bool,
) -> NodeTraits {
    if overlay.is_active() {
        let mark = overlay.mark(id);
        return NodeTraits {
            pinned,
            highlighted: mark.is_some(),
            strength: mark.map(|mark| mark.strength).unwrap_or(0.0),
        };
    }
    let strength = snapshot.strength_of(id);
    NodeTraits {
        pinned,
        highlighted: strength.is_some(),
        strength: strength.unwrap_or(0.0),
    }
}

/// The visual to paint this frame: stored visual, faded focus, and the
/// pulse and colour transition of a highlight step.
pub(crate) fn frame_visual(
    ui: &Ui,
    scheme: VisualScheme,
    primitive: &NodePrimitive,
    overlay: &SequenceOverlay,
    now: f64,
) -> NodeVisual {
    let focus = ui.ctx().animate_bool_with_time(
        egui::Id::new(("node-focus", scheme == VisualScheme::Graph, primitive.id.as_str())),
        primitive.focused,
        FOCUS_FADE_SECS,
    );
    let mut visual = mix_visual(
        primitive.visual,
        focused_visual(scheme, primitive.visual),
        focus,
    );

    if overlay.is_active() && overlay.mark(&primitive.id).is_some() {
        let plain = node_visual(
            scheme,
            NodeTraits {
                highlighted: false,
                ..primitive.traits
            },
        );
        visual = mix_visual(plain, visual, overlay.tint(&primitive.id, now));
        visual.radius *= overlay.pulse_scale(&primitive.id, now);
    }
    visual
}

pub(crate) fn paint_node(
    painter: &Painter,
    center: Pos2,
    visual: &NodeVisual,
    caption: &str,
    zoom: f32,
    searched: bool,
) {
    let radius = visual.radius * zoom;
    painter.circle_filled(center, radius, with_opacity(visual.fill, visual.opacity));
    painter.circle_stroke(
        center,
        radius,
        egui::Stroke::new(visual.stroke_width, with_opacity(visual.stroke, visual.opacity)),
    );
    if searched {
        painter.circle_stroke(
            center,
            radius + 4.0,
            egui::Stroke::new(2.0, super::scene::style::SEARCH_COLOR),
        );
    }

    let font_size = visual.label_size * zoom;
    if visual.show_label && font_size >= 5.0 && !caption.is_empty() {
        painter.text(
            center + vec2(radius + 5.0, 0.0),
            Align2::LEFT_CENTER,
            caption,
            FontId::proportional(font_size),
            visual.label_color,
        );
    }
}

/// Rank labels of the current run, drawn above their points.
pub(crate) fn paint_floating_labels(
    painter: &Painter,
    overlay: &SequenceOverlay,
    now: f64,
    anchor: impl Fn(&str) -> Option<(Pos2, f32)>,
) {
    for (label, fade) in overlay.live_labels(now) {
        let Some((position, radius)) = anchor(&label.id) else {
            continue;
        };
        let text_pos = position - vec2(0.0, radius + 10.0);
        let galley = painter.layout_no_wrap(
            label.text.clone(),
            FontId::proportional(13.0),
            with_opacity(Color32::WHITE, fade),
        );
        let rect = Align2::CENTER_BOTTOM
            .anchor_size(text_pos, galley.size())
            .expand(4.0);
        painter.rect_filled(rect, 4.0, with_opacity(Color32::from_black_alpha(190), fade));
        painter.galley(rect.min + vec2(4.0, 4.0), galley, Color32::WHITE);
    }
}

/// The mounted view. Exactly one exists at a time; switching tears the old
/// one down first.
pub(crate) enum ActiveView {
    Graph(Box<ForceGraphView>),
    Scatter(Box<ScatterView>),
    Cloud(Box<CloudView>),
}

impl ActiveView {
    pub(crate) fn mount(
        kind: ViewKind,
        snapshot: &Arc<Snapshot>,
        params: SimulationParams,
        gl_available: bool,
    ) -> Result<Self> {
        let view = match kind {
            ViewKind::Graph => Self::Graph(Box::new(ForceGraphView::new(Arc::clone(snapshot), params))),
            ViewKind::Scatter => Self::Scatter(Box::new(ScatterView::new(Arc::clone(snapshot)))),
            ViewKind::Cloud => Self::Cloud(Box::new(CloudView::new(snapshot, gl_available)?)),
        };
        info!(view = kind.label(), points = snapshot.point_count(), "view mounted");
        Ok(view)
    }

    pub(crate) fn kind(&self) -> ViewKind {
        match self {
            Self::Graph(_) => ViewKind::Graph,
            Self::Scatter(_) => ViewKind::Scatter,
            Self::Cloud(_) => ViewKind::Cloud,
        }
    }

    pub(crate) fn context(&self) -> &ViewContext {
        match self {
            Self::Graph(view) => view.context(),
            Self::Scatter(view) => view.context(),
            Self::Cloud(view) => view.context(),
        }
    }

    pub(crate) fn context_mut(&mut self) -> &mut ViewContext {
        match self {
            Self::Graph(view) => view.context_mut(),
            Self::Scatter(view) => view.context_mut(),
            Self::Cloud(view) => view.context_mut(),
        }
    }

    pub(crate) fn show(&mut self, ui: &mut Ui, search_matches: &HashSet<String>) {
        match self {
            Self::Graph(view) => view.show(ui, search_matches),
            Self::Scatter(view) => view.show(ui, search_matches),
            Self::Cloud(view) => view.show(ui, search_matches),
        }
    }

    pub(crate) fn teardown(&mut self) {
        if let Self::Cloud(view) = self {
            view.stop_render_loop();
        }
        self.context_mut().teardown();
        debug!(view = self.kind().label(), "view torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PointInput;

    fn snapshot() -> Snapshot {
        let point = |id: &str| PointInput {
            id: id.to_owned(),
            label: id.to_owned(),
            content: String::new(),
            x: 0.0,
            y: 0.0,
            z: None,
        };
        Snapshot::from_parts(
            vec![point("a"), point("b")],
            vec![ResultEntry {
                id: "a".to_owned(),
                strength: 0.8,
            }],
            None,
        )
        .0
    }

    #[test]
    fn hover_emits_only_on_change() {
        let mut context = ViewContext::default();
        assert!(context.hover(Some("a")).is_some());
        assert!(context.hover(Some("a")).is_none());
        assert!(context.hover(None).is_some());
        assert_eq!(
            context.take_events(),
            vec![ViewEvent::Hover(Some("a".to_owned())), ViewEvent::Hover(None)]
        );
        assert!(context.take_events().is_empty());
    }

    #[test]
    fn completion_is_reported_once() {
        let snapshot = snapshot();
        let mut context = ViewContext::default();
        assert!(context.start_sequence(&snapshot.results, 1.0, 0.0));
        assert!(!context.start_sequence(&snapshot.results, 1.0, 0.1));
        assert!(context.advance(0.0));
        context.advance(1.0);
        context.advance(2.0);
        let completions = context
            .take_events()
            .into_iter()
            .filter(|event| *event == ViewEvent::AnimationComplete)
            .count();
        assert_eq!(completions, 1);
    }

    #[test]
    fn teardown_cancels_the_run() {
        let snapshot = snapshot();
        let mut context = ViewContext::default();
        context.start_sequence(&snapshot.results, 1.0, 0.0);
        context.teardown();
        assert!(!context.sequencer.is_animating());
        context.advance(5.0);
        assert!(context.take_events().is_empty());
    }

    #[test]
    fn traits_follow_results_until_a_run_takes_over() {
        let snapshot = snapshot();
        let mut overlay = SequenceOverlay::default();
        assert!(point_traits(&snapshot, &overlay, "a", false).highlighted);
        assert!(!point_traits(&snapshot, &overlay, "b", false).highlighted);

        overlay.apply(&SequenceEvent::Reset { count: 1 }, 0.0);
        assert!(!point_traits(&snapshot, &overlay, "a", false).highlighted);
        overlay.apply(
            &SequenceEvent::Highlight {
                rank: 1,
                id: "b".to_owned(),
                strength: 0.3,
            },
            0.0,
        );
        let traits = point_traits(&snapshot, &overlay, "b", true);
        assert!(traits.highlighted && traits.pinned);
        assert_eq!(traits.strength, 0.3);
    }
}
