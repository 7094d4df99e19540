//! Nodes: containers pairing content widgets with sockets, and the socket
//! placement around their border.

use std::any::Any;

use ecolor::Color32;
use emath::{Pos2, Rect, Vec2, pos2, vec2};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ViewConfig;
use crate::error::ViewError;
use crate::layout::{distribute, stack_height};
use crate::signal::Signal;
use crate::socket::{Socket, SocketArena, SocketEvent, SocketId, SocketMode, SocketRef};
use crate::timer::ClickTimer;
use crate::widget::Widget;

/// Identity of a node within its view. Reassigned densely on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Padding {
    pub fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

impl Default for Padding {
    fn default() -> Self {
        Self::uniform(0.0)
    }
}

/// Events re-raised at node level so a host only listens per node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    Socket(SocketEvent),
    FunctionClicked,
    ExpandedChanged(bool),
}

/// Node-specific state persisted as an opaque XML fragment.
pub trait CustomState {
    fn export_xml(&self) -> Option<String>;
    fn import_xml(&mut self, fragment: &str) -> Result<(), ViewError>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[derive(Debug, Clone)]
pub struct NodeItem {
    pub widget: Widget,
    pub socket: SocketRef,
}

pub struct Node {
    id: NodeId,
    class: String,
    label: String,
    items: Vec<NodeItem>,
    center: Option<Widget>,
    expanded: bool,
    expander_blocked: bool,
    padding: Padding,
    socket_radius: f32,
    label_height: f32,
    icon_size: f32,
    resize_handle_size: f32,
    click_timeout: f64,
    source_color: Color32,
    sink_color: Color32,
    position: Pos2,
    size: Vec2,
    allocation: Rect,
    next_socket_id: u32,
    click_timer: ClickTimer,
    destroyed: bool,
    custom: Option<Box<dyn CustomState>>,
    pub signal: Signal<NodeEvent>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("label", &self.label)
            .field("items", &self.items.len())
            .field("expanded", &self.expanded)
            .field("position", &self.position)
            .field("size", &self.size)
            .finish()
    }
}

impl Node {
    pub fn new(class: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_config(class, label, &ViewConfig::default())
    }

    pub fn with_config(class: impl Into<String>, label: impl Into<String>, config: &ViewConfig) -> Self {
        Self {
            id: NodeId(0),
            class: class.into(),
            label: label.into(),
            items: Vec::new(),
            center: None,
            expanded: true,
            expander_blocked: false,
            padding: config.padding,
            socket_radius: config.socket_radius,
            label_height: config.label_height,
            icon_size: config.icon_size,
            resize_handle_size: config.resize_handle_size,
            click_timeout: config.click_timeout,
            source_color: config.source_color,
            sink_color: config.sink_color,
            position: Pos2::ZERO,
            size: Vec2::ZERO,
            allocation: Rect::NOTHING,
            next_socket_id: 0,
            click_timer: ClickTimer::default(),
            destroyed: false,
            custom: None,
            signal: Signal::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Renumber the node; sockets and widgets follow.
    pub(crate) fn set_id(&mut self, id: NodeId, sockets: &mut SocketArena) {
        self.id = id;
        for item in &self.items {
            item.widget.set_parent(Some(id));
            if let Some(socket) = sockets.get_mut(item.socket) {
                socket.set_owner(id);
            }
        }
        if let Some(center) = &self.center {
            center.set_parent(Some(id));
        }
    }

    /// Nickname the node class is registered under.
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Add `widget` paired with a new socket. Fails when the widget already
    /// belongs to a node.
    pub fn add_item(
        &mut self,
        sockets: &mut SocketArena,
        widget: Widget,
        mode: SocketMode,
        key: u32,
    ) -> Option<SocketRef> {
        if self.destroyed {
            return None;
        }
        if let Some(parent) = widget.parent() {
            debug!("Widget {:?} already belongs to node {:?}", widget.name(), parent);
            return None;
        }

        let id = SocketId(self.next_socket_id);
        self.next_socket_id += 1;
        let color = match mode {
            SocketMode::Source => self.source_color,
            SocketMode::Sink => self.sink_color,
            SocketMode::Disabled => Color32::GRAY,
        };
        let socket = sockets.insert(Socket::new(id, self.id, mode, key, self.socket_radius, color));

        widget.set_parent(Some(self.id));
        widget.set_visible(self.expanded);
        self.items.push(NodeItem { widget, socket });
        Some(socket)
    }

    /// Detach `widget` and destroy its socket.
    pub fn remove_item(&mut self, sockets: &mut SocketArena, widget: &Widget) -> bool {
        let Some(index) = self.items.iter().position(|i| i.widget.ptr_eq(widget)) else {
            return false;
        };
        let item = self.items.remove(index);
        sockets.destroy(item.socket);
        item.widget.set_parent(None);
        true
    }

    pub fn items(&self) -> &[NodeItem] {
        &self.items
    }

    pub fn item_socket(&self, widget: &Widget) -> Option<SocketRef> {
        self.items
            .iter()
            .find(|i| i.widget.ptr_eq(widget))
            .map(|i| i.socket)
    }

    pub fn sockets(&self) -> impl Iterator<Item = SocketRef> + '_ {
        self.items.iter().map(|i| i.socket)
    }

    fn sockets_with_mode(&self, sockets: &SocketArena, mode: SocketMode) -> Vec<SocketRef> {
        self.sockets()
            .filter(|s| sockets.get(*s).is_some_and(|s| s.mode() == mode))
            .collect()
    }

    pub fn sources(&self, sockets: &SocketArena) -> Vec<SocketRef> {
        self.sockets_with_mode(sockets, SocketMode::Source)
    }

    pub fn sinks(&self, sockets: &SocketArena) -> Vec<SocketRef> {
        self.sockets_with_mode(sockets, SocketMode::Sink)
    }

    /// Find a socket of the given mode by its per-node id.
    pub fn socket_by_id(&self, sockets: &SocketArena, id: SocketId, mode: SocketMode) -> Option<SocketRef> {
        self.sockets().find(|r| {
            sockets
                .get(*r)
                .is_some_and(|s| s.id() == id && s.mode() == mode)
        })
    }

    pub fn center_widget(&self) -> Option<&Widget> {
        self.center.as_ref()
    }

    /// Replace the centre widget. Fails when `widget` belongs to a node.
    pub fn set_center_widget(&mut self, widget: Option<Widget>) -> bool {
        if let Some(w) = &widget {
            if w.parent().is_some() {
                return false;
            }
        }
        if let Some(old) = self.center.take() {
            old.set_parent(None);
        }
        if let Some(w) = &widget {
            w.set_parent(Some(self.id));
            w.set_visible(self.expanded);
        }
        self.center = widget;
        true
    }

    pub fn custom(&self) -> Option<&dyn CustomState> {
        self.custom.as_deref()
    }

    pub fn custom_mut(&mut self) -> Option<&mut (dyn CustomState + 'static)> {
        self.custom.as_deref_mut()
    }

    pub fn set_custom(&mut self, state: Box<dyn CustomState>) {
        self.custom = Some(state);
    }

    // -----------------------------------------------------------------------
    // Expander
    // -----------------------------------------------------------------------

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Show or hide every child widget together.
    pub fn set_expanded(&mut self, expanded: bool) {
        if self.expanded == expanded {
            return;
        }
        self.expanded = expanded;
        for item in &self.items {
            item.widget.set_visible(expanded);
        }
        if let Some(center) = &self.center {
            center.set_visible(expanded);
        }
        self.signal.emit(&NodeEvent::ExpandedChanged(expanded));
    }

    /// Flip the expander unless it is blocked. Returns whether it flipped.
    pub fn toggle_expander(&mut self) -> bool {
        if self.expander_blocked {
            return false;
        }
        self.set_expanded(!self.expanded);
        true
    }

    pub fn block_expander(&mut self) {
        self.expander_blocked = true;
    }

    pub fn unblock_expander(&mut self) {
        self.expander_blocked = false;
    }

    pub fn is_expander_blocked(&self) -> bool {
        self.expander_blocked
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    pub fn position(&self) -> Pos2 {
        self.position
    }

    pub fn set_position(&mut self, position: Pos2) {
        self.position = position;
        self.allocation = Rect::from_min_size(position, self.allocation.size().max(Vec2::ZERO));
    }

    /// Requested size. The allocated size never drops below the preferred size.
    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn set_size(&mut self, size: Vec2) {
        self.size = size.max(Vec2::ZERO);
    }

    /// Rectangle from the last allocation.
    pub fn rect(&self) -> Rect {
        self.allocation
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }

    pub fn set_padding(&mut self, padding: Padding) {
        self.padding = padding;
    }

    pub fn socket_radius(&self) -> f32 {
        self.socket_radius
    }

    pub fn set_socket_radius(&mut self, sockets: &mut SocketArena, radius: f32) {
        self.socket_radius = radius.max(0.0);
        for item in &self.items {
            if let Some(socket) = sockets.get_mut(item.socket) {
                socket.set_radius(self.socket_radius);
            }
        }
    }

    fn content_rect(&self) -> Rect {
        let r = self.socket_radius;
        Rect::from_min_max(
            pos2(
                self.allocation.min.x + self.padding.left + r,
                self.allocation.min.y + self.padding.top + r,
            ),
            pos2(
                self.allocation.max.x - self.padding.right - r,
                self.allocation.max.y - self.padding.bottom - r,
            ),
        )
    }

    /// Label row, including expander and function icon.
    pub fn label_rect(&self) -> Rect {
        let content = self.content_rect();
        Rect::from_min_size(content.min, vec2(content.width(), self.label_height))
    }

    /// Expander hit area at the start of the label row.
    pub fn expander_rect(&self) -> Rect {
        let label = self.label_rect();
        Rect::from_min_size(label.min, Vec2::splat(self.label_height))
    }

    /// Function icon in the top-right corner.
    pub fn icon_rect(&self) -> Rect {
        let max = self.allocation.right_top();
        Rect::from_min_max(pos2(max.x - self.icon_size, max.y), pos2(max.x, max.y + self.icon_size))
    }

    /// Resize handle in the bottom-right corner.
    pub fn resize_handle_rect(&self) -> Rect {
        let max = self.allocation.max;
        Rect::from_min_max(max - Vec2::splat(self.resize_handle_size), max)
    }

    fn visible_sockets<'a>(&'a self, sockets: &'a SocketArena) -> impl Iterator<Item = &'a Socket> + 'a {
        self.items
            .iter()
            .filter_map(|i| sockets.get(i.socket))
            .filter(|s| s.is_visible())
    }

    /// Collapsed stack height: the taller of the two socket columns, never
    /// shorter than the label row.
    fn collapsed_stack_height(&self, sockets: &SocketArena) -> f32 {
        let column = |mode: SocketMode| {
            stack_height(
                self.visible_sockets(sockets)
                    .filter(|s| s.mode() == mode)
                    .map(|s| s.preferred_height().0),
            )
        };
        column(SocketMode::Sink)
            .max(column(SocketMode::Source))
            .max(self.label_height)
    }

    fn row_height(&self, item: &NodeItem, sockets: &SocketArena, natural: bool) -> f32 {
        let request = item.widget.size_request();
        let widget_h = if natural {
            request.natural_height
        } else {
            request.min_height
        };
        let socket_h = sockets
            .get(item.socket)
            .filter(|s| s.is_visible())
            .map(|s| s.preferred_height().0)
            .unwrap_or(0.0);
        widget_h.max(socket_h)
    }

    /// Preferred (minimum, natural) height of the whole node.
    pub fn preferred_height(&self, sockets: &SocketArena) -> (f32, f32) {
        let frame = self.padding.vertical() + self.socket_radius * 2.0;
        if !self.expanded {
            let h = frame + self.collapsed_stack_height(sockets);
            return (h, h);
        }

        let mut min = self.label_height;
        let mut natural = self.label_height;
        if let Some(center) = self.center.as_ref().filter(|c| c.is_visible()) {
            let request = center.size_request();
            min += request.min_height;
            natural += request.natural_height;
        }
        for item in self.items.iter().filter(|i| i.widget.is_visible()) {
            min += self.row_height(item, sockets, false);
            natural += self.row_height(item, sockets, true);
        }
        (frame + min, frame + natural)
    }

    pub fn preferred_width(&self) -> f32 {
        let mut content = self.icon_size + self.label_height * 3.0;
        if self.expanded {
            let widgets = self.items.iter().map(|i| &i.widget).chain(self.center.iter());
            for widget in widgets.filter(|w| w.is_visible()) {
                content = content.max(widget.size_request().min_width);
            }
        }
        content + self.padding.horizontal() + self.socket_radius * 2.0
    }

    /// Lay out the node at its position, using the requested size when it is
    /// larger than the preferred one.
    pub fn layout(&mut self, sockets: &mut SocketArena) {
        let (_, natural_h) = self.preferred_height(sockets);
        let size = vec2(self.size.x.max(self.preferred_width()), self.size.y.max(natural_h));
        self.allocate(sockets, Rect::from_min_size(self.position, size));
    }

    /// Position child widgets and sockets inside `rect`.
    pub fn allocate(&mut self, sockets: &mut SocketArena, rect: Rect) {
        self.position = rect.min;
        self.allocation = rect;
        if self.expanded {
            self.allocate_expanded(sockets);
        } else {
            self.allocate_collapsed(sockets);
        }
    }

    fn allocate_expanded(&mut self, sockets: &mut SocketArena) {
        let content = self.content_rect();
        let mut y = content.min.y + self.label_height;

        if let Some(center) = self.center.as_ref().filter(|c| c.is_visible()) {
            let h = center.size_request().natural_height;
            center.set_rect(Rect::from_min_size(pos2(content.min.x, y), vec2(content.width(), h)));
            y += h;
        }

        for item in &self.items {
            if !item.widget.is_visible() {
                item.widget.set_rect(Rect::NOTHING);
                continue;
            }
            let row_h = self.row_height(item, sockets, true);
            item.widget
                .set_rect(Rect::from_min_size(pos2(content.min.x, y), vec2(content.width(), row_h)));

            if let Some(socket) = sockets.get_mut(item.socket).filter(|s| s.is_visible()) {
                let x = match socket.mode() {
                    SocketMode::Source => self.allocation.max.x,
                    _ => self.allocation.min.x,
                };
                socket.set_position(pos2(x, y + row_h / 2.0));
            }
            y += row_h;
        }
    }

    fn allocate_collapsed(&mut self, sockets: &mut SocketArena) {
        for item in &self.items {
            item.widget.set_rect(Rect::NOTHING);
        }
        if let Some(center) = &self.center {
            center.set_rect(Rect::NOTHING);
        }

        let height = self.collapsed_stack_height(sockets);
        let top = self.content_rect().min.y;

        for (mode, x) in [
            (SocketMode::Sink, self.allocation.min.x),
            (SocketMode::Source, self.allocation.max.x),
        ] {
            let column: Vec<SocketRef> = self
                .items
                .iter()
                .map(|i| i.socket)
                .filter(|r| sockets.get(*r).is_some_and(|s| s.is_visible() && s.mode() == mode))
                .collect();
            for (socket, offset) in column.iter().zip(distribute(column.len(), height)) {
                if let Some(s) = sockets.get_mut(*socket) {
                    s.set_position(pos2(x, top + offset));
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Function icon
    // -----------------------------------------------------------------------

    pub fn icon_press(&mut self, now: f64) {
        if self.destroyed {
            return;
        }
        self.click_timer.start(now, self.click_timeout);
    }

    /// Returns `true` and emits [`NodeEvent::FunctionClicked`] when the
    /// release follows a press within the click timeout.
    pub fn icon_release(&mut self, now: f64) -> bool {
        let clicked = self.click_timer.release(now);
        if clicked && !self.destroyed {
            debug!("Function icon clicked on node {:?}", self.id);
            self.signal.emit(&NodeEvent::FunctionClicked);
            return true;
        }
        false
    }

    pub fn poll_timers(&mut self, now: f64) {
        self.click_timer.poll(now);
    }

    pub fn is_click_pending(&self) -> bool {
        self.click_timer.is_pending()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Destroy every socket and release every widget. Safe to call twice.
    pub fn destroy(&mut self, sockets: &mut SocketArena) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.click_timer.cancel();
        for item in self.items.drain(..) {
            sockets.destroy(item.socket);
            item.widget.set_parent(None);
        }
        if let Some(center) = self.center.take() {
            center.set_parent(None);
        }
    }
}
