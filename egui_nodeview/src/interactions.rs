//! Pointer handling: turns one frame of egui pointer input into
//! `GraphView::press` / `motion` / `release` calls in canvas-local
//! coordinates.

use egui::{self, Pos2, Rect, Vec2};
use nodeview::{GraphView, InteractionMode};

/// Primary-button pointer input for one frame, in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct PointerFrame {
    pub pressed: Option<Pos2>,
    pub released: Option<Pos2>,
    pub pos: Option<Pos2>,
    pub delta: Vec2,
    pub time: f64,
}

pub(crate) fn read_pointer(ui: &egui::Ui) -> PointerFrame {
    ui.input(|i| {
        let mut frame = PointerFrame {
            pos: i.pointer.interact_pos(),
            delta: i.pointer.delta(),
            time: i.time,
            ..Default::default()
        };
        // Read button events directly so a press and release landing in the
        // same frame are both seen.
        for event in &i.events {
            if let egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed,
                ..
            } = event
            {
                if *pressed {
                    frame.pressed.get_or_insert(*pos);
                } else {
                    frame.released = Some(*pos);
                }
            }
        }
        frame
    })
}

/// Feed `input` to the view. Presses outside `canvas` are ignored; motion
/// and release are always delivered so a drag leaving the canvas still ends.
pub(crate) fn handle_pointer(view: &mut GraphView, input: &PointerFrame, canvas: Rect) {
    let origin = canvas.min.to_vec2();

    if let Some(pos) = input.pressed.filter(|p| canvas.contains(*p)) {
        view.press(pos - origin, input.time);
    }

    if input.delta != Vec2::ZERO && *view.mode() != InteractionMode::None {
        if let Some(pos) = input.pos {
            view.motion(pos - origin);
        }
    }

    if let Some(pos) = input.released {
        view.release(pos - origin, input.time);
    }

    view.poll_timers(input.time);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeview::{SocketMode, Widget};

    fn canvas() -> Rect {
        Rect::from_min_size(Pos2::new(100.0, 50.0), Vec2::new(600.0, 400.0))
    }

    #[test]
    fn press_outside_canvas_is_ignored() {
        let mut view = GraphView::new();
        view.add_node(view.create_node("n", "N"));
        view.layout();
        let input = PointerFrame {
            pressed: Some(Pos2::new(10.0, 10.0)),
            ..Default::default()
        };
        handle_pointer(&mut view, &input, canvas());
        assert_eq!(*view.mode(), InteractionMode::None);
    }

    #[test]
    fn drag_moves_node_in_local_coordinates() {
        let mut view = GraphView::new();
        let id = view.add_node(view.create_node("n", "N"));
        view.add_item(id, Widget::label("x"), SocketMode::Sink, 0);
        view.layout();
        let origin = canvas().min.to_vec2();
        let grab = view.node(id).unwrap().rect().center() + origin;

        let press = PointerFrame {
            pressed: Some(grab),
            pos: Some(grab),
            ..Default::default()
        };
        handle_pointer(&mut view, &press, canvas());
        assert!(matches!(view.mode(), InteractionMode::DragNode { .. }));

        let to = grab + Vec2::new(40.0, 30.0);
        let drag = PointerFrame {
            pos: Some(to),
            delta: Vec2::new(40.0, 30.0),
            ..Default::default()
        };
        handle_pointer(&mut view, &drag, canvas());
        assert_eq!(view.node(id).unwrap().position(), Pos2::new(40.0, 30.0));

        let release = PointerFrame {
            released: Some(to),
            pos: Some(to),
            ..Default::default()
        };
        handle_pointer(&mut view, &release, canvas());
        assert_eq!(*view.mode(), InteractionMode::None);
    }
}
