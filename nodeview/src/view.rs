//! The canvas: owns nodes, sockets and links, and turns pointer input into
//! node drags, resizes and connection drags.

use emath::{Pos2, Rect, Vec2, pos2};
use log::debug;
use uuid::Uuid;

use crate::config::ViewConfig;
use crate::curve::ConnectionCurve;
use crate::drag::DragPayloadCache;
use crate::error::ConnectError;
use crate::node::{Node, NodeEvent, NodeId};
use crate::socket::{Payload, SocketArena, SocketEvent, SocketMode, SocketRef};
use crate::widget::Widget;

/// A drawn connection. Mirrors `sink.input == source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub source: SocketRef,
    pub sink: SocketRef,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum InteractionMode {
    #[default]
    None,
    DragNode {
        node: NodeId,
        /// Pointer offset from the node's top-left corner.
        grab: Vec2,
        press: Pos2,
        moved: bool,
        was_expanded: bool,
    },
    DragConnection {
        anchor: Pos2,
        cursor: Pos2,
        source: SocketRef,
        token: Uuid,
        /// Sink the wire was picked up from, if the drag was redirected.
        redirected_from: Option<SocketRef>,
    },
    Resize {
        node: NodeId,
        start_size: Vec2,
        press: Pos2,
    },
}

pub struct GraphView {
    config: ViewConfig,
    nodes: Vec<Node>,
    sockets: SocketArena,
    links: Vec<Link>,
    mode: InteractionMode,
    drag_cache: DragPayloadCache,
    allocation: Rect,
    next_node_id: u32,
}

impl Default for GraphView {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphView {
    pub fn new() -> Self {
        Self::with_config(ViewConfig::default())
    }

    pub fn with_config(config: ViewConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            sockets: SocketArena::new(),
            links: Vec::new(),
            mode: InteractionMode::None,
            drag_cache: DragPayloadCache::new(),
            allocation: Rect::from_min_size(Pos2::ZERO, Vec2::splat(f32::INFINITY)),
            next_node_id: 0,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn sockets(&self) -> &SocketArena {
        &self.sockets
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    pub fn allocation(&self) -> Rect {
        self.allocation
    }

    pub fn set_allocation(&mut self, rect: Rect) {
        self.allocation = rect;
    }

    pub fn drag_cache(&self) -> &DragPayloadCache {
        &self.drag_cache
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// A node configured like this view, not yet added.
    pub fn create_node(&self, class: &str, label: &str) -> Node {
        Node::with_config(class, label, &self.config)
    }

    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id = self.next_node_id.saturating_add(1);
        node.set_id(id, &mut self.sockets);
        node.layout(&mut self.sockets);
        self.nodes.push(node);
        debug!("Added node {:?}", id);
        id
    }

    /// Destroy a node, tearing down every link to its sockets.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(index) = self.node_index(id) else {
            return false;
        };
        self.cancel_interaction_on(id);
        self.nodes[index].destroy(&mut self.sockets);
        self.dispatch();
        self.nodes.remove(index);
        debug!("Removed node {:?}", id);
        true
    }

    /// Remove every node.
    pub fn clear(&mut self) {
        let ids: Vec<NodeId> = self.nodes.iter().map(|n| n.id()).collect();
        for id in ids {
            self.remove_node(id);
        }
    }

    fn node_index(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id() == id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    /// Nodes in render order, bottom first.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn raise_node(&mut self, id: NodeId) {
        if let Some(index) = self.node_index(id) {
            let node = self.nodes.remove(index);
            self.nodes.push(node);
        }
    }

    /// Topmost node under `pos`.
    pub fn node_at(&self, pos: Pos2) -> Option<NodeId> {
        self.nodes
            .iter()
            .rev()
            .find(|n| n.rect().contains(pos))
            .map(|n| n.id())
    }

    /// Topmost visible socket under `pos`.
    pub fn socket_at(&self, pos: Pos2) -> Option<SocketRef> {
        self.nodes.iter().rev().find_map(|n| {
            n.sockets()
                .find(|s| self.sockets.get(*s).is_some_and(|s| s.contains(pos)))
        })
    }

    pub fn owner_of(&self, socket: SocketRef) -> Option<NodeId> {
        self.sockets.get(socket).map(|s| s.owner())
    }

    /// Borrow a node together with the socket arena.
    pub(crate) fn with_node<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut Node, &mut SocketArena) -> R,
    ) -> Option<R> {
        let index = self.node_index(id)?;
        Some(f(&mut self.nodes[index], &mut self.sockets))
    }

    pub(crate) fn renumber_nodes(&mut self) {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.set_id(NodeId(index as u32), &mut self.sockets);
        }
        self.next_node_id = self.nodes.len() as u32;
    }

    /// Give `node` the id `wanted` if no other node uses it. `None` when
    /// `wanted` leaves no room for a following id.
    pub(crate) fn try_assign_id(&mut self, node: NodeId, wanted: NodeId) -> Option<NodeId> {
        let next = wanted.0.checked_add(1)?;
        if node == wanted || self.node(wanted).is_some() {
            return Some(node);
        }
        let Some(index) = self.node_index(node) else {
            return Some(node);
        };
        self.nodes[index].set_id(wanted, &mut self.sockets);
        self.next_node_id = self.next_node_id.max(next);
        Some(wanted)
    }

    // -----------------------------------------------------------------------
    // Items and sockets
    // -----------------------------------------------------------------------

    pub fn add_item(&mut self, node: NodeId, widget: Widget, mode: SocketMode, key: u32) -> Option<SocketRef> {
        let index = self.node_index(node)?;
        let socket = self.nodes[index].add_item(&mut self.sockets, widget, mode, key);
        self.nodes[index].layout(&mut self.sockets);
        socket
    }

    pub fn remove_item(&mut self, node: NodeId, widget: &Widget) -> bool {
        let Some(index) = self.node_index(node) else {
            return false;
        };
        let removed = self.nodes[index].remove_item(&mut self.sockets, widget);
        self.dispatch();
        if let Some(node) = self.nodes.get_mut(index) {
            node.layout(&mut self.sockets);
        }
        removed
    }

    pub fn connect(&mut self, sink: SocketRef, source: SocketRef) -> Result<(), ConnectError> {
        let result = self.sockets.connect(sink, source);
        self.dispatch();
        result
    }

    pub fn disconnect(&mut self, sink: SocketRef) -> bool {
        let done = self.sockets.disconnect(sink);
        self.dispatch();
        done
    }

    pub fn set_socket_mode(&mut self, socket: SocketRef, mode: SocketMode) {
        self.sockets.set_mode(socket, mode);
        self.dispatch();
        self.relayout_owner(socket);
    }

    pub fn set_socket_key(&mut self, socket: SocketRef, key: u32) {
        self.sockets.set_key(socket, key);
        self.dispatch();
    }

    pub fn write(&mut self, socket: SocketRef, payload: Payload) -> bool {
        let written = self.sockets.write(socket, payload);
        self.dispatch();
        written
    }

    /// Attach a listener to one socket's events.
    pub fn subscribe_socket(
        &mut self,
        socket: SocketRef,
        callback: impl FnMut(&SocketEvent) + 'static,
    ) -> Option<crate::signal::SubscriptionId> {
        self.sockets
            .get_mut(socket)
            .map(|s| s.signal.subscribe(callback))
    }

    fn relayout_owner(&mut self, socket: SocketRef) {
        if let Some(owner) = self.owner_of(socket) {
            if let Some(index) = self.node_index(owner) {
                self.nodes[index].layout(&mut self.sockets);
            }
        }
    }

    /// Re-raise queued socket events on their nodes and keep the link list in
    /// step with them.
    fn dispatch(&mut self) {
        for notification in self.sockets.drain_events() {
            match notification.event {
                SocketEvent::Connected { source, sink } if notification.target == sink => {
                    let link = Link { source, sink };
                    if !self.links.contains(&link) {
                        self.links.push(link);
                    }
                }
                SocketEvent::Disconnected { source, sink } if notification.target == sink => {
                    self.links.retain(|l| !(l.source == source && l.sink == sink));
                }
                SocketEvent::Destroyed { socket } => {
                    self.links.retain(|l| l.source != socket && l.sink != socket);
                }
                _ => {}
            }
            if let Some(node) = self.nodes.iter_mut().find(|n| n.id() == notification.owner) {
                node.signal.emit(&NodeEvent::Socket(notification.event));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    pub fn layout(&mut self) {
        for node in &mut self.nodes {
            node.layout(&mut self.sockets);
        }
    }

    pub fn poll_timers(&mut self, now: f64) {
        for node in &mut self.nodes {
            node.poll_timers(now);
        }
    }

    // -----------------------------------------------------------------------
    // Pointer input
    // -----------------------------------------------------------------------

    pub fn press(&mut self, pos: Pos2, now: f64) {
        if self.mode != InteractionMode::None {
            return;
        }
        if let Some(socket) = self.socket_at(pos) {
            self.begin_connection(socket, pos);
            return;
        }
        let Some(id) = self.node_at(pos) else {
            return;
        };
        let Some(index) = self.node_index(id) else {
            return;
        };
        let node = &mut self.nodes[index];

        if node.resize_handle_rect().contains(pos) {
            debug!("Resizing node {:?}", id);
            self.mode = InteractionMode::Resize {
                node: id,
                start_size: node.rect().size(),
                press: pos,
            };
        } else if node.icon_rect().contains(pos) {
            node.icon_press(now);
        } else {
            debug!("Dragging node {:?}", id);
            self.mode = InteractionMode::DragNode {
                node: id,
                grab: pos - node.position(),
                press: pos,
                moved: false,
                was_expanded: node.is_expanded(),
            };
            node.block_expander();
            self.raise_node(id);
        }
    }

    pub fn motion(&mut self, pos: Pos2) {
        match &mut self.mode {
            InteractionMode::None => {}
            InteractionMode::DragConnection { cursor, .. } => *cursor = pos,
            InteractionMode::DragNode {
                node, grab, press, moved, ..
            } => {
                if pos != *press {
                    *moved = true;
                }
                let (id, grab) = (*node, *grab);
                let bounds = self.allocation;
                let Some(index) = self.node_index(id) else {
                    return;
                };
                let node = &mut self.nodes[index];
                let size = node.rect().size();
                let target = pos - grab;
                let x = target.x.min(bounds.max.x - size.x).max(bounds.min.x);
                let y = target.y.min(bounds.max.y - size.y).max(bounds.min.y);
                node.set_position(pos2(x, y));
                node.layout(&mut self.sockets);
            }
            InteractionMode::Resize {
                node,
                start_size,
                press,
            } => {
                let (id, size) = (*node, *start_size + (pos - *press));
                let Some(index) = self.node_index(id) else {
                    return;
                };
                let node = &mut self.nodes[index];
                node.set_size(size);
                node.layout(&mut self.sockets);
            }
        }
    }

    pub fn release(&mut self, pos: Pos2, now: f64) {
        match std::mem::take(&mut self.mode) {
            InteractionMode::None => {
                let Some(id) = self.node_at(pos) else {
                    return;
                };
                if let Some(node) = self.node_mut(id) {
                    if node.icon_rect().contains(pos) {
                        node.icon_release(now);
                    }
                }
            }
            InteractionMode::DragNode {
                node,
                moved,
                was_expanded,
                ..
            } => {
                let Some(index) = self.node_index(node) else {
                    return;
                };
                let n = &mut self.nodes[index];
                n.unblock_expander();
                if !moved && n.expander_rect().contains(pos) {
                    n.toggle_expander();
                } else if n.is_expanded() != was_expanded {
                    n.set_expanded(was_expanded);
                }
                n.layout(&mut self.sockets);
            }
            InteractionMode::Resize { .. } => {}
            InteractionMode::DragConnection {
                source,
                token,
                redirected_from,
                ..
            } => {
                let target = self
                    .socket_at(pos)
                    .filter(|s| self.sockets.get(*s).is_some_and(|s| s.is_drop_target()));
                match target {
                    Some(sink) => {
                        if let Some(origin) = self.drag_cache.take(&token) {
                            let _ = self.sockets.connect(sink, origin);
                        }
                    }
                    None => {
                        self.drag_cache.take(&token);
                    }
                }
                self.finish_connection(source, redirected_from);
            }
        }
    }

    /// Start a connection drag on `socket`. A connected sink hands the wire
    /// back to its source.
    pub fn begin_connection(&mut self, socket: SocketRef, pos: Pos2) -> bool {
        if self.mode != InteractionMode::None {
            return false;
        }
        let Some(dragged) = self.sockets.drag_begin(socket) else {
            self.dispatch();
            return false;
        };
        let redirected_from = (dragged != socket).then_some(socket);
        let anchor = match redirected_from {
            Some(_) => self.sockets.get(dragged).map(|s| s.position()).unwrap_or(pos),
            None => pos,
        };
        let token = self.drag_cache.insert(dragged);
        self.mode = InteractionMode::DragConnection {
            anchor,
            cursor: pos,
            source: dragged,
            token,
            redirected_from,
        };
        self.dispatch();
        true
    }

    /// Drop the in-flight wire onto `sink`.
    pub fn drop_connection(&mut self, sink: SocketRef) -> Result<(), ConnectError> {
        let InteractionMode::DragConnection {
            source,
            token,
            redirected_from,
            ..
        } = self.mode
        else {
            return Err(ConnectError::StaleSocket);
        };
        let result = match self.drag_cache.take(&token) {
            Some(origin) if self.sockets.get(sink).is_some_and(|s| s.is_drop_target()) => {
                self.sockets.connect(sink, origin)
            }
            Some(_) => Err(self
                .sockets
                .get(sink)
                .map(|s| ConnectError::NotASink(s.mode()))
                .unwrap_or(ConnectError::StaleSocket)),
            None => Err(ConnectError::StaleSocket),
        };
        self.finish_connection(source, redirected_from);
        result
    }

    /// Abandon the in-flight wire. Never connects anything.
    pub fn cancel_connection(&mut self) {
        if let InteractionMode::DragConnection {
            source,
            token,
            redirected_from,
            ..
        } = self.mode
        {
            self.drag_cache.take(&token);
            self.finish_connection(source, redirected_from);
        }
    }

    fn finish_connection(&mut self, source: SocketRef, redirected_from: Option<SocketRef>) {
        self.sockets.drag_end(source);
        if let Some(sink) = redirected_from {
            self.sockets.restore_drop_target(sink);
        }
        self.mode = InteractionMode::None;
        self.dispatch();
    }

    /// Drop any interaction that refers to a node about to go away.
    fn cancel_interaction_on(&mut self, id: NodeId) {
        match self.mode {
            InteractionMode::DragNode { node, .. } | InteractionMode::Resize { node, .. } if node == id => {
                self.mode = InteractionMode::None;
            }
            InteractionMode::DragConnection { source, .. } if self.owner_of(source) == Some(id) => {
                self.cancel_connection();
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Rendering data
    // -----------------------------------------------------------------------

    pub fn connection_curves(&self) -> Vec<ConnectionCurve> {
        self.links
            .iter()
            .filter_map(|link| {
                let source = self.sockets.get(link.source)?;
                let sink = self.sockets.get(link.sink)?;
                Some(ConnectionCurve::new(
                    source.position(),
                    sink.position(),
                    source.color(),
                    sink.color(),
                ))
            })
            .collect()
    }

    /// Curve from the drag anchor to the pointer while a wire is in flight.
    pub fn preview_curve(&self) -> Option<ConnectionCurve> {
        let InteractionMode::DragConnection {
            anchor,
            cursor,
            source,
            ..
        } = self.mode
        else {
            return None;
        };
        let color = self.sockets.get(source).map(|s| s.color())?;
        Some(ConnectionCurve::new(anchor, cursor, color, color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emath::vec2;

    fn two_nodes(view: &mut GraphView) -> (NodeId, SocketRef, NodeId, SocketRef) {
        let a = view.add_node(view.create_node("src", "A"));
        let source = view.add_item(a, Widget::label("out"), SocketMode::Source, 0).unwrap();
        let b = view.add_node(view.create_node("dst", "B"));
        let sink = view.add_item(b, Widget::label("in"), SocketMode::Sink, 0).unwrap();
        view.node_mut(b).unwrap().set_position(pos2(300.0, 0.0));
        view.layout();
        (a, source, b, sink)
    }

    #[test]
    fn links_follow_socket_events() {
        let mut view = GraphView::new();
        let (_, source, _, sink) = two_nodes(&mut view);

        view.connect(sink, source).unwrap();
        assert_eq!(view.links(), &[Link { source, sink }]);
        view.disconnect(sink);
        assert!(view.links().is_empty());
    }

    #[test]
    fn dragging_a_wire_between_sockets_connects() {
        let mut view = GraphView::new();
        let (_, source, _, sink) = two_nodes(&mut view);
        let from = view.sockets().get(source).unwrap().position();
        let to = view.sockets().get(sink).unwrap().position();

        view.press(from, 0.0);
        assert!(matches!(view.mode(), InteractionMode::DragConnection { .. }));
        view.motion(to);
        assert!(view.preview_curve().is_some());
        view.release(to, 0.1);

        assert_eq!(*view.mode(), InteractionMode::None);
        assert!(view.sockets().is_connected(sink, source));
        assert!(view.drag_cache().is_empty());
        assert!(view.preview_curve().is_none());
    }

    #[test]
    fn dropping_on_empty_space_cancels() {
        let mut view = GraphView::new();
        let (_, source, _, sink) = two_nodes(&mut view);
        let from = view.sockets().get(source).unwrap().position();

        view.press(from, 0.0);
        view.release(pos2(1000.0, 1000.0), 0.1);
        assert_eq!(view.sockets().input(sink), None);
        assert!(view.drag_cache().is_empty());
    }

    #[test]
    fn grabbing_connected_sink_picks_up_the_wire() {
        let mut view = GraphView::new();
        let (_, source, _, sink) = two_nodes(&mut view);
        view.connect(sink, source).unwrap();
        let at_sink = view.sockets().get(sink).unwrap().position();

        view.press(at_sink, 0.0);
        assert!(view.links().is_empty());
        match *view.mode() {
            InteractionMode::DragConnection {
                source: dragged,
                redirected_from,
                anchor,
                ..
            } => {
                assert_eq!(dragged, source);
                assert_eq!(redirected_from, Some(sink));
                assert_eq!(anchor, view.sockets().get(source).unwrap().position());
            }
            ref other => panic!("unexpected mode {other:?}"),
        }
        assert!(!view.sockets().get(sink).unwrap().is_drop_target());

        view.release(pos2(1000.0, 1000.0), 0.1);
        assert!(view.sockets().get(sink).unwrap().is_drop_target());
        assert_eq!(view.sockets().input(sink), None);
    }

    #[test]
    fn node_drag_raises_and_clamps() {
        let mut view = GraphView::new();
        view.set_allocation(Rect::from_min_size(Pos2::ZERO, vec2(500.0, 400.0)));
        let (a, _, b, _) = two_nodes(&mut view);
        let rect = view.node(a).unwrap().rect();
        let grab = rect.center();

        view.press(grab, 0.0);
        assert_eq!(view.nodes().last().unwrap().id(), a);
        assert!(view.node(a).unwrap().is_expander_blocked());

        view.motion(grab + vec2(-500.0, -500.0));
        assert_eq!(view.node(a).unwrap().position(), Pos2::ZERO);

        view.motion(grab + vec2(5000.0, 5000.0));
        let size = view.node(a).unwrap().rect().size();
        assert_eq!(view.node(a).unwrap().position(), pos2(500.0 - size.x, 400.0 - size.y));

        view.release(grab, 0.2);
        assert_eq!(*view.mode(), InteractionMode::None);
        assert!(!view.node(a).unwrap().is_expander_blocked());
        assert!(view.node(b).is_some());
    }

    #[test]
    fn click_on_expander_toggles_but_drag_does_not() {
        let mut view = GraphView::new();
        let (a, _, _, _) = two_nodes(&mut view);
        let expander = view.node(a).unwrap().expander_rect().center();

        view.press(expander, 0.0);
        view.release(expander, 0.05);
        assert!(!view.node(a).unwrap().is_expanded());

        let expander = view.node(a).unwrap().expander_rect().center();
        view.press(expander, 1.0);
        view.motion(expander + vec2(30.0, 10.0));
        let moved = view.node(a).unwrap().expander_rect().center();
        view.release(moved, 1.1);
        assert!(!view.node(a).unwrap().is_expanded());
    }

    #[test]
    fn resize_handle_grows_node() {
        let mut view = GraphView::new();
        let (a, _, _, _) = two_nodes(&mut view);
        let before = view.node(a).unwrap().rect();
        let handle = view.node(a).unwrap().resize_handle_rect().center();

        view.press(handle, 0.0);
        assert!(matches!(view.mode(), InteractionMode::Resize { .. }));
        view.motion(handle + vec2(40.0, 25.0));
        view.release(handle + vec2(40.0, 25.0), 0.1);

        let after = view.node(a).unwrap().rect();
        assert_eq!(after.size(), before.size() + vec2(40.0, 25.0));
    }

    #[test]
    fn removing_node_drops_its_links() {
        let mut view = GraphView::new();
        let (a, source, _, sink) = two_nodes(&mut view);
        view.connect(sink, source).unwrap();

        assert!(view.remove_node(a));
        assert!(view.links().is_empty());
        assert_eq!(view.sockets().input(sink), None);
        assert!(!view.remove_node(a));
    }

    #[test]
    fn node_events_bubble_from_sockets() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut view = GraphView::new();
        let (_, source, b, sink) = two_nodes(&mut view);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        view.node_mut(b).unwrap().signal.subscribe(move |e| s.borrow_mut().push(e.clone()));

        view.connect(sink, source).unwrap();
        view.write(source, serde_json::json!("hello"));
        assert_eq!(
            *seen.borrow(),
            vec![
                NodeEvent::Socket(SocketEvent::Connected { source, sink }),
                NodeEvent::Socket(SocketEvent::DataIn {
                    socket: sink,
                    payload: serde_json::json!("hello"),
                }),
            ]
        );
    }

    #[test]
    fn function_icon_click_through_view() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut view = GraphView::new();
        let (a, _, _, _) = two_nodes(&mut view);
        let clicked = Rc::new(Cell::new(false));
        let c = clicked.clone();
        view.node_mut(a).unwrap().signal.subscribe(move |e| {
            if *e == NodeEvent::FunctionClicked {
                c.set(true);
            }
        });
        let icon = view.node(a).unwrap().icon_rect().center();

        view.press(icon, 1.0);
        assert_eq!(*view.mode(), InteractionMode::None);
        view.release(icon, 1.1);
        assert!(clicked.get());
    }
}
