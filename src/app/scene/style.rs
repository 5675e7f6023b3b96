use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

pub(crate) const RESULT_COLOR: Color32 = Color32::from_rgb(255, 68, 68);
pub(crate) const DOCUMENT_COLOR: Color32 = Color32::from_rgb(31, 119, 180);
pub(crate) const SEARCH_COLOR: Color32 = Color32::from_rgb(103, 196, 255);
pub(crate) const PINNED_STROKE: Color32 = Color32::from_rgb(245, 206, 93);
pub(crate) const BACKGROUND: Color32 = Color32::from_rgb(19, 23, 29);

/// The inputs every node visual is derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct NodeTraits {
    pub(crate) pinned: bool,
    pub(crate) highlighted: bool,
    pub(crate) strength: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct NodeVisual {
    pub(crate) radius: f32,
    pub(crate) fill: Color32,
    pub(crate) opacity: f32,
    pub(crate) stroke: Color32,
    pub(crate) stroke_width: f32,
    pub(crate) label_size: f32,
    pub(crate) label_color: Color32,
    pub(crate) show_label: bool,
}

/// Size tables for the two 2D views.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VisualScheme {
    /// Force graph: result radius scales with strength, every node is labelled.
    Graph,
    /// Static scatter: small fixed radii, only results are labelled.
    Scatter,
}

pub(crate) fn node_visual(scheme: VisualScheme, traits: NodeTraits) -> NodeVisual {
    let strength = if traits.strength.is_finite() {
        traits.strength.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let (radius, opacity, label_size) = match (scheme, traits.highlighted) {
        (VisualScheme::Graph, true) => (20.0 + strength * 20.0, 1.0, 12.0),
        (VisualScheme::Graph, false) => (8.0, 0.85, 8.0),
        (VisualScheme::Scatter, true) => (10.0, 1.0, 12.0),
        (VisualScheme::Scatter, false) => (5.0, 0.6, 10.0),
    };
    let (fill, label_color) = if traits.highlighted {
        (RESULT_COLOR, Color32::from_gray(240))
    } else {
        (DOCUMENT_COLOR, Color32::from_gray(150))
    };
    let (stroke, stroke_width) = if traits.pinned {
        (PINNED_STROKE, 2.5)
    } else {
        (Color32::WHITE, if scheme == VisualScheme::Graph { 2.0 } else { 1.5 })
    };

    NodeVisual {
        radius,
        fill,
        opacity,
        stroke,
        stroke_width,
        label_size,
        label_color,
        show_label: scheme == VisualScheme::Graph || traits.highlighted,
    }
}

/// The pointer-over variant of a visual.
pub(crate) fn focused_visual(scheme: VisualScheme, base: NodeVisual) -> NodeVisual {
    match scheme {
        VisualScheme::Graph => NodeVisual {
            stroke: Color32::BLACK,
            stroke_width: base.stroke_width + 0.5,
            label_size: 14.0,
            label_color: Color32::WHITE,
            ..base
        },
        VisualScheme::Scatter => NodeVisual {
            radius: base.radius + 2.0,
            opacity: 1.0,
            show_label: true,
            ..base
        },
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolates between two visuals. `t == 0` returns `from` unchanged.
pub(crate) fn mix_visual(from: NodeVisual, to: NodeVisual, t: f32) -> NodeVisual {
    if t <= 0.0 {
        return from;
    }
    if t >= 1.0 {
        return to;
    }
    NodeVisual {
        radius: lerp(from.radius, to.radius, t),
        fill: blend_color(from.fill, to.fill, t),
        opacity: lerp(from.opacity, to.opacity, t),
        stroke: blend_color(from.stroke, to.stroke, t),
        stroke_width: lerp(from.stroke_width, to.stroke_width, t),
        label_size: lerp(from.label_size, to.label_size, t),
        label_color: blend_color(from.label_color, to.label_color, t),
        show_label: from.show_label || to.show_label,
    }
}

pub(crate) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(crate) fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(
        color.r(),
        color.g(),
        color.b(),
        (color.a() as f32 * opacity.clamp(0.0, 1.0)) as u8,
    )
}

/// Scales RGB by `factor`, keeping alpha.
pub(crate) fn shade(color: Color32, factor: f32) -> Color32 {
    let factor = factor.max(0.0);
    let channel = |value: u8| (value as f32 * factor).min(255.0) as u8;
    Color32::from_rgba_unmultiplied(
        channel(color.r()),
        channel(color.g()),
        channel(color.b()),
        color.a(),
    )
}

pub(crate) fn edge_stroke(emphasis: bool, zoom: f32) -> Stroke {
    let width_scale = zoom.sqrt().clamp(0.6, 1.8);
    if emphasis {
        Stroke::new(2.0 * width_scale, with_opacity(RESULT_COLOR, 0.5))
    } else {
        Stroke::new(width_scale, with_opacity(Color32::from_gray(153), 0.2))
    }
}

pub(crate) fn draw_background(painter: &Painter, rect: Rect, origin: Pos2, zoom: f32) {
    painter.rect_filled(rect, 0.0, BACKGROUND);

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(crate) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(position)
}

pub(crate) fn segment_visible(rect: Rect, start: Pos2, end: Pos2) -> bool {
    Rect::from_two_pos(start, end)
        .expand2(Vec2::splat(1.0))
        .intersects(rect)
}
