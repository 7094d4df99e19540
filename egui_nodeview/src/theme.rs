//! Theming for the graph view.

use egui::Color32;

/// Drawing colours and sizes. Socket colours come from the model
/// (`nodeview::ViewConfig`), everything else from here.
pub struct GraphViewTheme {
    /// Background color.
    pub background_color: Color32,
    /// Grid line color.
    pub grid_color: Color32,
    /// Grid spacing.
    pub grid_spacing: f32,
    /// Node body color.
    pub node_body_color: Color32,
    /// Node body color while the node is being dragged or resized.
    pub node_active_color: Color32,
    pub node_border_color: Color32,
    /// Corner rounding for nodes.
    pub node_rounding: f32,
    pub label_color: Color32,
    pub label_font_size: f32,
    /// Expander triangle, function icon and resize grip.
    pub decoration_color: Color32,
    /// Function icon while its click timer runs.
    pub icon_pressed_color: Color32,
    pub socket_outline_color: Color32,
    /// Connection stroke width.
    pub link_width: f32,
    /// Line segments per connection curve.
    pub curve_segments: usize,
}

impl Default for GraphViewTheme {
    fn default() -> Self {
        Self {
            background_color: Color32::from_rgb(30, 30, 30),
            grid_color: Color32::from_rgb(40, 40, 40),
            grid_spacing: 50.0,
            node_body_color: Color32::from_rgb(45, 45, 50),
            node_active_color: Color32::from_rgb(55, 55, 65),
            node_border_color: Color32::from_rgb(80, 80, 80),
            node_rounding: 4.0,
            label_color: Color32::from_rgb(200, 200, 200),
            label_font_size: 13.0,
            decoration_color: Color32::from_rgb(150, 150, 150),
            icon_pressed_color: Color32::from_rgb(100, 150, 255),
            socket_outline_color: Color32::from_rgb(20, 20, 20),
            link_width: 2.0,
            curve_segments: 24,
        }
    }
}
