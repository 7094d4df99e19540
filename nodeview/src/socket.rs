//! Sockets and the connection protocol between them.
//!
//! Sockets live in a [`SocketArena`] and refer to each other through
//! [`SocketRef`] handles, so the sink ↔ source cross references never own
//! anything. A sink holds at most one `input`; a source keeps the list of
//! sinks it feeds so that writes and key changes reach them.

use std::collections::VecDeque;

use ecolor::Color32;
use emath::{Pos2, Rect, Vec2};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConnectError;
use crate::node::NodeId;
use crate::signal::Signal;

/// Value carried by [`SocketArena::write`].
pub type Payload = serde_json::Value;

/// Identity of a socket within its node. Allocated sequentially per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SocketId(pub u32);

/// Arena handle. Stale once the socket is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketRef {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketMode {
    #[default]
    Disabled,
    Sink,
    Source,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Connected { source: SocketRef, sink: SocketRef },
    Disconnected { source: SocketRef, sink: SocketRef },
    KeyChanged { socket: SocketRef, key: u32 },
    DataIn { socket: SocketRef, payload: Payload },
    DataOut { socket: SocketRef, payload: Payload },
    Destroyed { socket: SocketRef },
    DragBegin { socket: SocketRef },
    DragEnd { socket: SocketRef },
}

/// An event as delivered to one socket, kept in the arena queue so the owning
/// node can re-raise it after the operation returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub target: SocketRef,
    pub owner: NodeId,
    pub event: SocketEvent,
}

pub struct Socket {
    id: SocketId,
    owner: NodeId,
    mode: SocketMode,
    key: u32,
    radius: f32,
    color: Color32,
    input: Option<SocketRef>,
    feeds: Vec<SocketRef>,
    drag_source: bool,
    drop_target: bool,
    drag_state: DragState,
    visible: bool,
    position: Pos2,
    /// Per-socket listeners. Delivery happens inside the arena operation.
    pub signal: Signal<SocketEvent>,
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("mode", &self.mode)
            .field("key", &self.key)
            .field("input", &self.input)
            .field("feeds", &self.feeds)
            .finish()
    }
}

impl Socket {
    pub fn new(id: SocketId, owner: NodeId, mode: SocketMode, key: u32, radius: f32, color: Color32) -> Self {
        let mut socket = Self {
            id,
            owner,
            mode,
            key,
            radius,
            color,
            input: None,
            feeds: Vec::new(),
            drag_source: false,
            drop_target: false,
            drag_state: DragState::Idle,
            visible: true,
            position: Pos2::ZERO,
            signal: Signal::new(),
        };
        socket.apply_mode(mode);
        socket
    }

    fn apply_mode(&mut self, mode: SocketMode) {
        self.mode = mode;
        match mode {
            SocketMode::Source => {
                self.drag_source = true;
                self.drop_target = false;
                self.visible = true;
            }
            SocketMode::Sink => {
                self.drag_source = self.input.is_some();
                self.drop_target = true;
                self.visible = true;
            }
            SocketMode::Disabled => {
                self.drag_source = false;
                self.drop_target = false;
                self.visible = false;
            }
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: NodeId) {
        self.owner = owner;
    }

    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    pub fn input(&self) -> Option<SocketRef> {
        self.input
    }

    pub fn feeds(&self) -> &[SocketRef] {
        &self.feeds
    }

    pub fn is_drag_source(&self) -> bool {
        self.drag_source
    }

    pub fn is_drop_target(&self) -> bool {
        self.drop_target
    }

    pub fn drag_state(&self) -> DragState {
        self.drag_state
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.0);
    }

    pub fn color(&self) -> Color32 {
        self.color
    }

    /// Centre of the socket in view coordinates, as of the last layout.
    pub fn position(&self) -> Pos2 {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Pos2) {
        self.position = position;
    }

    /// Preferred (minimum, natural) height: one diameter.
    pub fn preferred_height(&self) -> (f32, f32) {
        (self.radius * 2.0, self.radius * 2.0)
    }

    pub fn rect(&self) -> Rect {
        Rect::from_center_size(self.position, Vec2::splat(self.radius * 2.0))
    }

    pub fn contains(&self, pos: Pos2) -> bool {
        self.visible && self.position.distance(pos) <= self.radius
    }
}

struct Slot {
    generation: u32,
    socket: Option<Socket>,
}

/// Owner of every socket in a view.
#[derive(Default)]
pub struct SocketArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    queue: VecDeque<Notification>,
}

impl SocketArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, socket: Socket) -> SocketRef {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.socket = Some(socket);
            SocketRef {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                socket: Some(socket),
            });
            SocketRef {
                index,
                generation: 0,
            }
        }
    }

    pub fn get(&self, socket: SocketRef) -> Option<&Socket> {
        self.slots
            .get(socket.index as usize)
            .filter(|slot| slot.generation == socket.generation)
            .and_then(|slot| slot.socket.as_ref())
    }

    pub fn get_mut(&mut self, socket: SocketRef) -> Option<&mut Socket> {
        self.slots
            .get_mut(socket.index as usize)
            .filter(|slot| slot.generation == socket.generation)
            .and_then(|slot| slot.socket.as_mut())
    }

    pub fn contains(&self, socket: SocketRef) -> bool {
        self.get(socket).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.socket.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (SocketRef, &Socket)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.socket.as_ref().map(|socket| {
                (
                    SocketRef {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    socket,
                )
            })
        })
    }

    pub fn input(&self, sink: SocketRef) -> Option<SocketRef> {
        self.get(sink).and_then(|s| s.input)
    }

    pub fn is_connected(&self, sink: SocketRef, source: SocketRef) -> bool {
        self.input(sink) == Some(source)
    }

    /// Take every queued notification, oldest first.
    pub fn drain_events(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }

    fn notify(&mut self, targets: &[SocketRef], event: SocketEvent) {
        for &target in targets {
            let Some(socket) = self.get_mut(target) else {
                continue;
            };
            socket.signal.emit(&event);
            let owner = socket.owner;
            self.queue.push_back(Notification {
                target,
                owner,
                event: event.clone(),
            });
        }
    }

    /// Link `source` into `sink`, replacing any previous input of the sink.
    pub fn connect(&mut self, sink: SocketRef, source: SocketRef) -> Result<(), ConnectError> {
        let result = self.check_compatible(sink, source);
        if let Err(err) = result {
            warn!("Refusing to connect {:?} -> {:?}: {}", source, sink, err);
            return Err(err);
        }

        self.disconnect(sink);

        if let Some(sink_socket) = self.get_mut(sink) {
            sink_socket.input = Some(source);
            sink_socket.drag_source = true;
        }
        if let Some(source_socket) = self.get_mut(source) {
            source_socket.feeds.push(sink);
        }
        debug!("Connected {:?} -> {:?}", source, sink);
        self.notify(&[sink, source], SocketEvent::Connected { source, sink });
        Ok(())
    }

    fn check_compatible(&self, sink: SocketRef, source: SocketRef) -> Result<(), ConnectError> {
        let source_socket = self.get(source).ok_or(ConnectError::StaleSocket)?;
        let sink_socket = self.get(sink).ok_or(ConnectError::StaleSocket)?;
        if source_socket.mode != SocketMode::Source {
            return Err(ConnectError::NotASource(source_socket.mode));
        }
        if sink_socket.mode != SocketMode::Sink {
            return Err(ConnectError::NotASink(sink_socket.mode));
        }
        if sink_socket.key != 0 && sink_socket.key != source_socket.key {
            return Err(ConnectError::KeyMismatch {
                sink_key: sink_socket.key,
                source_key: source_socket.key,
            });
        }
        Ok(())
    }

    /// Drop the input of `sink`. Returns `false` when there was nothing to drop.
    pub fn disconnect(&mut self, sink: SocketRef) -> bool {
        let Some(sink_socket) = self.get_mut(sink) else {
            return false;
        };
        let Some(source) = sink_socket.input.take() else {
            return false;
        };
        sink_socket.drag_source = false;
        if let Some(source_socket) = self.get_mut(source) {
            source_socket.feeds.retain(|s| *s != sink);
        }
        debug!("Disconnected {:?} -> {:?}", source, sink);
        self.notify(&[sink, source], SocketEvent::Disconnected { source, sink });
        true
    }

    fn disconnect_feeds(&mut self, source: SocketRef) {
        let fed = self.get(source).map(|s| s.feeds.clone()).unwrap_or_default();
        for sink in fed {
            self.disconnect(sink);
        }
    }

    pub fn set_mode(&mut self, socket: SocketRef, mode: SocketMode) {
        if !self.contains(socket) {
            return;
        }
        self.disconnect(socket);
        self.disconnect_feeds(socket);
        if let Some(s) = self.get_mut(socket) {
            debug!("Socket {:?} mode {:?} -> {:?}", socket, s.mode, mode);
            s.apply_mode(mode);
        }
    }

    pub fn set_key(&mut self, socket: SocketRef, key: u32) {
        let Some(input) = self.get(socket).map(|s| s.input) else {
            return;
        };
        if let Some(s) = self.get_mut(socket) {
            s.key = key;
        }
        if let Some(source) = input {
            let source_key = self.get(source).map(|s| s.key);
            if key != 0 && source_key != Some(key) {
                self.disconnect(socket);
            }
        }
        self.notify(&[socket], SocketEvent::KeyChanged { socket, key });

        let fed = self.get(socket).map(|s| s.feeds.clone()).unwrap_or_default();
        for sink in fed {
            let sink_key = self.get(sink).map(|s| s.key).unwrap_or(0);
            if sink_key != 0 && sink_key != key {
                self.disconnect(sink);
            }
        }
    }

    /// Push a value through `socket`. Returns `false` for disabled sockets.
    pub fn write(&mut self, socket: SocketRef, payload: Payload) -> bool {
        let Some(s) = self.get(socket) else {
            return false;
        };
        match s.mode {
            SocketMode::Disabled => false,
            SocketMode::Sink => {
                self.notify(&[socket], SocketEvent::DataIn { socket, payload });
                true
            }
            SocketMode::Source => {
                let fed = s.feeds.clone();
                self.notify(
                    &[socket],
                    SocketEvent::DataOut {
                        socket,
                        payload: payload.clone(),
                    },
                );
                for sink in fed {
                    self.notify(
                        &[sink],
                        SocketEvent::DataIn {
                            socket: sink,
                            payload: payload.clone(),
                        },
                    );
                }
                true
            }
        }
    }

    /// Remove `socket`, tearing down every link that touches it.
    pub fn destroy(&mut self, socket: SocketRef) -> bool {
        if !self.contains(socket) {
            return false;
        }
        self.notify(&[socket], SocketEvent::Destroyed { socket });
        self.disconnect(socket);
        self.disconnect_feeds(socket);

        let slot = &mut self.slots[socket.index as usize];
        slot.socket = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(socket.index);
        true
    }

    /// Start dragging from `socket`. Returns the socket that actually carries
    /// the drag: a connected sink hands the wire back to its source.
    pub fn drag_begin(&mut self, socket: SocketRef) -> Option<SocketRef> {
        let s = self.get(socket)?;
        match s.mode {
            SocketMode::Source if s.drag_source => {
                if let Some(s) = self.get_mut(socket) {
                    s.drag_state = DragState::Dragging;
                }
                self.notify(&[socket], SocketEvent::DragBegin { socket });
                Some(socket)
            }
            SocketMode::Sink if s.drag_source => {
                let source = s.input?;
                self.disconnect(socket);
                if let Some(s) = self.get_mut(socket) {
                    s.drop_target = false;
                }
                debug!("Redirecting drag from {:?} to its source {:?}", socket, source);
                self.drag_begin(source)
            }
            _ => None,
        }
    }

    pub fn drag_end(&mut self, socket: SocketRef) {
        let Some(s) = self.get_mut(socket) else {
            return;
        };
        if s.drag_state == DragState::Idle {
            return;
        }
        s.drag_state = DragState::Idle;
        self.notify(&[socket], SocketEvent::DragEnd { socket });
    }

    /// Give a sink back its drop-target role after a redirected drag.
    pub fn restore_drop_target(&mut self, socket: SocketRef) {
        if let Some(s) = self.get_mut(socket) {
            s.drop_target = s.mode == SocketMode::Sink;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn socket(arena: &mut SocketArena, mode: SocketMode, key: u32) -> SocketRef {
        arena.insert(Socket::new(SocketId(0), NodeId(0), mode, key, 8.0, Color32::WHITE))
    }

    #[test]
    fn connect_follows_mode_and_key_rules() {
        let modes = [SocketMode::Disabled, SocketMode::Sink, SocketMode::Source];
        let keys = [0, 3, 5];
        for sink_mode in modes {
            for source_mode in modes {
                for sink_key in keys {
                    for source_key in keys {
                        let mut arena = SocketArena::new();
                        let sink = socket(&mut arena, sink_mode, sink_key);
                        let source = socket(&mut arena, source_mode, source_key);
                        let expected = source_mode == SocketMode::Source
                            && sink_mode == SocketMode::Sink
                            && (sink_key == 0 || sink_key == source_key);
                        assert_eq!(arena.connect(sink, source).is_ok(), expected);
                        assert_eq!(arena.input(sink).is_some(), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn sink_key_is_the_only_wildcard() {
        let mut arena = SocketArena::new();
        let sink = socket(&mut arena, SocketMode::Sink, 5);
        let source = socket(&mut arena, SocketMode::Source, 0);
        assert_eq!(
            arena.connect(sink, source),
            Err(ConnectError::KeyMismatch { sink_key: 5, source_key: 0 })
        );
        assert_eq!(arena.input(sink), None);
    }

    #[test]
    fn connect_replaces_previous_input_in_order() {
        let mut arena = SocketArena::new();
        let sink = socket(&mut arena, SocketMode::Sink, 0);
        let first = socket(&mut arena, SocketMode::Source, 0);
        let second = socket(&mut arena, SocketMode::Source, 0);
        arena.connect(sink, first).unwrap();
        arena.drain_events();

        arena.connect(sink, second).unwrap();
        let events: Vec<_> = arena
            .drain_events()
            .into_iter()
            .filter(|n| n.target == sink)
            .map(|n| n.event)
            .collect();
        assert_eq!(
            events,
            vec![
                SocketEvent::Disconnected { source: first, sink },
                SocketEvent::Connected { source: second, sink },
            ]
        );
        assert!(arena.get(first).unwrap().feeds().is_empty());
        assert_eq!(arena.get(second).unwrap().feeds(), &[sink]);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut arena = SocketArena::new();
        let sink = socket(&mut arena, SocketMode::Sink, 0);
        let source = socket(&mut arena, SocketMode::Source, 0);
        arena.connect(sink, source).unwrap();
        assert!(arena.get(sink).unwrap().is_drag_source());

        assert!(arena.disconnect(sink));
        assert!(!arena.disconnect(sink));
        assert_eq!(arena.input(sink), None);
        assert!(!arena.get(sink).unwrap().is_drag_source());
    }

    #[test]
    fn key_change_on_sink_revalidates() {
        let mut arena = SocketArena::new();
        let sink = socket(&mut arena, SocketMode::Sink, 0);
        let source = socket(&mut arena, SocketMode::Source, 4);
        arena.connect(sink, source).unwrap();
        arena.drain_events();

        let key_events = |arena: &mut SocketArena| -> Vec<SocketEvent> {
            arena
                .drain_events()
                .into_iter()
                .map(|n| n.event)
                .filter(|e| matches!(e, SocketEvent::KeyChanged { .. }))
                .collect()
        };

        arena.set_key(sink, 4);
        assert!(arena.is_connected(sink, source));
        assert_eq!(key_events(&mut arena), vec![SocketEvent::KeyChanged { socket: sink, key: 4 }]);
        // same key again still notifies
        arena.set_key(sink, 4);
        assert_eq!(key_events(&mut arena), vec![SocketEvent::KeyChanged { socket: sink, key: 4 }]);
        arena.set_key(sink, 0);
        assert!(arena.is_connected(sink, source));
        assert_eq!(key_events(&mut arena), vec![SocketEvent::KeyChanged { socket: sink, key: 0 }]);

        arena.set_key(sink, 9);
        assert_eq!(arena.input(sink), None);
        let events: Vec<SocketEvent> = arena.drain_events().into_iter().map(|n| n.event).collect();
        assert!(events.contains(&SocketEvent::Disconnected { source, sink }));
        assert!(events.contains(&SocketEvent::KeyChanged { socket: sink, key: 9 }));
    }

    #[test]
    fn key_change_on_source_disconnects_picky_sinks() {
        let mut arena = SocketArena::new();
        let picky = socket(&mut arena, SocketMode::Sink, 4);
        let open = socket(&mut arena, SocketMode::Sink, 0);
        let source = socket(&mut arena, SocketMode::Source, 4);
        arena.connect(picky, source).unwrap();
        arena.connect(open, source).unwrap();

        arena.set_key(source, 7);
        assert_eq!(arena.input(picky), None);
        assert!(arena.is_connected(open, source));
    }

    #[test]
    fn mode_change_tears_down_both_sides() {
        let mut arena = SocketArena::new();
        let sink = socket(&mut arena, SocketMode::Sink, 0);
        let source = socket(&mut arena, SocketMode::Source, 0);
        arena.connect(sink, source).unwrap();

        arena.set_mode(source, SocketMode::Sink);
        assert_eq!(arena.input(sink), None);
        let s = arena.get(source).unwrap();
        assert!(s.is_drop_target());
        assert!(!s.is_drag_source());

        arena.set_mode(source, SocketMode::Disabled);
        assert!(!arena.get(source).unwrap().is_visible());
    }

    #[test]
    fn write_reaches_fed_sinks() {
        let mut arena = SocketArena::new();
        let sink = socket(&mut arena, SocketMode::Sink, 0);
        let source = socket(&mut arena, SocketMode::Source, 0);
        let disabled = socket(&mut arena, SocketMode::Disabled, 0);
        arena.connect(sink, source).unwrap();

        let received = Rc::new(RefCell::new(Vec::new()));
        let r = received.clone();
        arena.get_mut(sink).unwrap().signal.subscribe(move |event| {
            if let SocketEvent::DataIn { payload, .. } = event {
                r.borrow_mut().push(payload.clone());
            }
        });

        assert!(arena.write(source, serde_json::json!(42)));
        assert!(!arena.write(disabled, serde_json::json!(1)));
        assert_eq!(*received.borrow(), vec![serde_json::json!(42)]);
    }

    #[test]
    fn destroy_cascades_and_invalidates_handle() {
        let mut arena = SocketArena::new();
        let a = socket(&mut arena, SocketMode::Sink, 0);
        let b = socket(&mut arena, SocketMode::Sink, 0);
        let source = socket(&mut arena, SocketMode::Source, 0);
        arena.connect(a, source).unwrap();
        arena.connect(b, source).unwrap();

        assert!(arena.destroy(source));
        assert!(!arena.destroy(source));
        assert_eq!(arena.input(a), None);
        assert_eq!(arena.input(b), None);

        let reused = socket(&mut arena, SocketMode::Source, 0);
        assert!(arena.get(source).is_none());
        assert!(arena.get(reused).is_some());
    }

    #[test]
    fn dragging_connected_sink_redirects_to_source() {
        let mut arena = SocketArena::new();
        let sink = socket(&mut arena, SocketMode::Sink, 0);
        let source = socket(&mut arena, SocketMode::Source, 0);
        assert_eq!(arena.drag_begin(sink), None);

        arena.connect(sink, source).unwrap();
        assert_eq!(arena.drag_begin(sink), Some(source));
        assert_eq!(arena.input(sink), None);
        assert!(!arena.get(sink).unwrap().is_drop_target());
        assert_eq!(arena.get(source).unwrap().drag_state(), DragState::Dragging);

        arena.drag_end(source);
        arena.restore_drop_target(sink);
        assert!(arena.get(sink).unwrap().is_drop_target());
        assert_eq!(arena.get(source).unwrap().drag_state(), DragState::Idle);
    }
}
