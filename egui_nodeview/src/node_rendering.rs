//! Node chrome and socket drawing.

use egui::{self, Color32, Pos2, Rect, Shape, Stroke, StrokeKind, Vec2};
use nodeview::{Node, SocketArena};

use crate::theme::GraphViewTheme;

/// Draw the node body, expander triangle, function icon and resize grip.
pub(crate) fn draw_node_chrome(
    painter: &egui::Painter,
    node: &Node,
    theme: &GraphViewTheme,
    offset: Vec2,
    active: bool,
) {
    let rect = node.rect().translate(offset);
    let body = if active {
        theme.node_active_color
    } else {
        theme.node_body_color
    };
    painter.rect_filled(rect, theme.node_rounding, body);
    painter.rect_stroke(
        rect,
        theme.node_rounding,
        Stroke::new(1.0, theme.node_border_color),
        StrokeKind::Inside,
    );

    draw_expander(painter, node.expander_rect().translate(offset), node.is_expanded(), theme.decoration_color);

    let icon_color = if node.is_click_pending() {
        theme.icon_pressed_color
    } else {
        theme.decoration_color
    };
    draw_function_icon(painter, node.icon_rect().translate(offset), icon_color);
    draw_resize_grip(painter, node.resize_handle_rect().translate(offset), theme.decoration_color);
}

fn draw_expander(painter: &egui::Painter, rect: Rect, expanded: bool, color: Color32) {
    let r = rect.shrink(rect.width() * 0.3);
    let points = if expanded {
        vec![r.left_top(), r.right_top(), r.center_bottom()]
    } else {
        vec![r.left_top(), r.right_center(), r.left_bottom()]
    };
    painter.add(Shape::convex_polygon(points, color, Stroke::NONE));
}

fn draw_function_icon(painter: &egui::Painter, rect: Rect, color: Color32) {
    let r = rect.shrink(3.0);
    painter.rect_stroke(r, 2.0, Stroke::new(1.0, color), StrokeKind::Inside);
    painter.circle_filled(r.center(), r.width() * 0.15, color);
}

fn draw_resize_grip(painter: &egui::Painter, rect: Rect, color: Color32) {
    let stroke = Stroke::new(1.0, color);
    let max = rect.max;
    for step in 1..=3 {
        let d = rect.width() * step as f32 / 4.0;
        painter.line_segment([Pos2::new(max.x - d, max.y), Pos2::new(max.x, max.y - d)], stroke);
    }
}

/// Draw every visible socket of `node` as a filled circle on the border.
pub(crate) fn draw_sockets(
    painter: &egui::Painter,
    node: &Node,
    sockets: &SocketArena,
    theme: &GraphViewTheme,
    offset: Vec2,
    hovered: Option<Pos2>,
) {
    for socket in node.sockets().filter_map(|s| sockets.get(s)) {
        if !socket.is_visible() {
            continue;
        }
        let center = socket.position() + offset;
        let hot = hovered.is_some_and(|p| socket.contains(p));
        let radius = if hot { socket.radius() * 1.2 } else { socket.radius() };
        painter.circle(
            center,
            radius,
            socket.color(),
            Stroke::new(1.0, theme.socket_outline_color),
        );
    }
}
