//! Drawing utilities for the graph view.

use egui::{Color32, Pos2, Rect, Stroke, Vec2};
use nodeview::ConnectionCurve;

/// Draw a background grid.
pub fn draw_grid(painter: &egui::Painter, rect: Rect, color: Color32, spacing: f32) {
    if spacing <= 0.0 {
        return;
    }
    let mut x = rect.min.x;
    while x < rect.max.x {
        painter.line_segment(
            [Pos2::new(x, rect.min.y), Pos2::new(x, rect.max.y)],
            Stroke::new(1.0, color),
        );
        x += spacing;
    }

    let mut y = rect.min.y;
    while y < rect.max.y {
        painter.line_segment(
            [Pos2::new(rect.min.x, y), Pos2::new(rect.max.x, y)],
            Stroke::new(1.0, color),
        );
        y += spacing;
    }
}

/// Draw a connection curve shifted by `offset`, each segment tinted with the
/// gradient colour at its midpoint.
pub fn draw_connection(
    painter: &egui::Painter,
    curve: &ConnectionCurve,
    offset: Vec2,
    width: f32,
    segments: usize,
) {
    let points = curve.sample(segments);
    let count = points.len().saturating_sub(1).max(1) as f32;
    for (i, window) in points.windows(2).enumerate() {
        let t = (i as f32 + 0.5) / count;
        painter.line_segment(
            [window[0] + offset, window[1] + offset],
            Stroke::new(width, curve.color_at(t)),
        );
    }
}
