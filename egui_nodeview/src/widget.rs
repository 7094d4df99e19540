//! Main graph view widget.

use std::time::Duration;

use egui::{self, Label, Pos2, Rect, RichText, Sense, UiBuilder};
use nodeview::{GraphView, InteractionMode, NodeId, Widget};

use crate::drawing::{draw_connection, draw_grid};
use crate::interactions;
use crate::node_rendering::{draw_node_chrome, draw_sockets};
use crate::theme::GraphViewTheme;

pub struct GraphViewWidget<'a> {
    view: &'a mut GraphView,
    theme: &'a GraphViewTheme,
}

impl<'a> GraphViewWidget<'a> {
    pub fn new(view: &'a mut GraphView, theme: &'a GraphViewTheme) -> Self {
        Self { view, theme }
    }

    /// Show the view filling the available space. `add_contents` is called
    /// once per visible item or centre widget with a child `Ui` confined to
    /// the rectangle the node allocated for it.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        mut add_contents: impl FnMut(&mut egui::Ui, &Widget),
    ) -> egui::Response {
        let available = ui.available_rect_before_wrap();
        let (response, painter) = ui.allocate_painter(available.size(), Sense::click_and_drag());
        let canvas = response.rect;
        let origin = canvas.min.to_vec2();
        self.view
            .set_allocation(Rect::from_min_size(Pos2::ZERO, canvas.size()));

        let pointer = interactions::read_pointer(ui);
        interactions::handle_pointer(self.view, &pointer, canvas);
        self.view.layout();

        // Background
        painter.rect_filled(canvas, 0.0, self.theme.background_color);
        draw_grid(&painter, canvas, self.theme.grid_color, self.theme.grid_spacing);

        for curve in self.view.connection_curves() {
            draw_connection(&painter, &curve, origin, self.theme.link_width, self.theme.curve_segments);
        }

        let active = active_node(self.view.mode());
        let hovered = pointer.pos.map(|p| p - origin);

        for node in self.view.nodes() {
            draw_node_chrome(&painter, node, self.theme, origin, active == Some(node.id()));

            let label = node.label_rect();
            let text_rect = Rect::from_x_y_ranges(
                node.expander_rect().max.x..=node.icon_rect().min.x.max(node.expander_rect().max.x),
                label.y_range(),
            )
            .translate(origin);
            ui.scope_builder(UiBuilder::new().max_rect(text_rect), |ui| {
                ui.add(
                    Label::new(
                        RichText::new(node.label())
                            .color(self.theme.label_color)
                            .size(self.theme.label_font_size),
                    )
                    .selectable(false)
                    .truncate(),
                );
            });

            let widgets = node
                .center_widget()
                .into_iter()
                .chain(node.items().iter().map(|item| &item.widget));
            for widget in widgets {
                let rect = widget.rect();
                if !widget.is_visible() || !rect.is_positive() {
                    continue;
                }
                let rect = rect.translate(origin);
                ui.scope_builder(UiBuilder::new().max_rect(rect), |ui| {
                    ui.set_clip_rect(rect.intersect(canvas));
                    add_contents(ui, widget);
                });
            }

            draw_sockets(&painter, node, self.view.sockets(), self.theme, origin, hovered);
        }

        if let Some(curve) = self.view.preview_curve() {
            draw_connection(&painter, &curve, origin, self.theme.link_width, self.theme.curve_segments);
        }

        // The click timeout has to expire even without further input.
        if self.view.nodes().iter().any(|n| n.is_click_pending()) {
            ui.ctx()
                .request_repaint_after(Duration::from_secs_f64(self.view.config().click_timeout));
        }

        response
    }
}

fn active_node(mode: &InteractionMode) -> Option<NodeId> {
    match mode {
        InteractionMode::DragNode { node, .. } | InteractionMode::Resize { node, .. } => Some(*node),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui_kittest::Harness;
    use egui_kittest::kittest::Queryable;
    use nodeview::{NodeEvent, SocketMode, SocketRef};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct Fixture {
        view: Rc<RefCell<GraphView>>,
        canvas: Rc<Cell<Rect>>,
        source: SocketRef,
        sink: SocketRef,
        adder: NodeId,
    }

    fn fixture() -> Fixture {
        let mut view = GraphView::new();
        let constant = view.add_node(view.create_node("constant", "Constant"));
        let source = view
            .add_item(constant, Widget::label("value"), SocketMode::Source, 0)
            .unwrap();
        let adder = view.add_node(view.create_node("adder", "Adder"));
        let sink = view.add_item(adder, Widget::label("a"), SocketMode::Sink, 0).unwrap();
        view.node_mut(adder).unwrap().set_position(egui::pos2(250.0, 40.0));
        view.layout();
        Fixture {
            view: Rc::new(RefCell::new(view)),
            canvas: Rc::new(Cell::new(Rect::NOTHING)),
            source,
            sink,
            adder,
        }
    }

    fn harness(fixture: &Fixture) -> Harness<'static> {
        let view = fixture.view.clone();
        let canvas = fixture.canvas.clone();
        let theme = GraphViewTheme::default();
        Harness::builder()
            .with_size(egui::vec2(600.0, 400.0))
            .build_ui(move |ui| {
                let mut view = view.borrow_mut();
                let response = GraphViewWidget::new(&mut view, &theme).show(ui, |ui, widget| {
                    ui.label(widget.name());
                });
                canvas.set(response.rect);
            })
    }

    fn press(harness: &mut Harness<'_>, pos: Pos2, pressed: bool) {
        let input = harness.input_mut();
        input.events.push(egui::Event::PointerMoved(pos));
        input.events.push(egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed,
            modifiers: egui::Modifiers::NONE,
        });
    }

    fn screen_pos(fixture: &Fixture, socket: SocketRef) -> Pos2 {
        let local = fixture.view.borrow().sockets().get(socket).unwrap().position();
        local + fixture.canvas.get().min.to_vec2()
    }

    #[test]
    fn shows_labels_and_item_contents() {
        let fixture = fixture();
        let harness = harness(&fixture);
        assert!(harness.query_by_label("Constant").is_some());
        assert!(harness.query_by_label("Adder").is_some());
        assert!(harness.query_by_label("value").is_some());
        assert!(harness.query_by_label("a").is_some());
    }

    #[test]
    fn collapsed_node_hides_its_items() {
        let fixture = fixture();
        fixture
            .view
            .borrow_mut()
            .node_mut(fixture.adder)
            .unwrap()
            .set_expanded(false);
        let harness = harness(&fixture);
        assert!(harness.query_by_label("Adder").is_some());
        assert!(harness.query_by_label("a").is_none());
        assert!(harness.query_by_label("value").is_some());
    }

    #[test]
    fn pointer_drag_connects_sockets() {
        let fixture = fixture();
        let mut harness = harness(&fixture);
        harness.step();

        let from = screen_pos(&fixture, fixture.source);
        let to = screen_pos(&fixture, fixture.sink);
        press(&mut harness, from, true);
        harness.step();
        assert!(matches!(
            fixture.view.borrow().mode(),
            InteractionMode::DragConnection { .. }
        ));

        harness.input_mut().events.push(egui::Event::PointerMoved(to));
        harness.step();
        press(&mut harness, to, false);
        harness.step();

        let view = fixture.view.borrow();
        assert_eq!(*view.mode(), InteractionMode::None);
        assert_eq!(view.sockets().input(fixture.sink), Some(fixture.source));
        assert_eq!(view.links().len(), 1);
    }

    #[test]
    fn function_icon_click_reaches_node_signal() {
        let fixture = fixture();
        let clicked = Rc::new(Cell::new(0));
        let c = clicked.clone();
        fixture
            .view
            .borrow_mut()
            .node_mut(fixture.adder)
            .unwrap()
            .signal
            .subscribe(move |event| {
                if *event == NodeEvent::FunctionClicked {
                    c.set(c.get() + 1);
                }
            });
        let mut harness = harness(&fixture);
        harness.step();

        let icon = fixture.view.borrow().node(fixture.adder).unwrap().icon_rect().center()
            + fixture.canvas.get().min.to_vec2();
        // press and release inside one frame, well within the click timeout
        press(&mut harness, icon, true);
        press(&mut harness, icon, false);
        harness.step();

        assert_eq!(clicked.get(), 1);
    }
}
