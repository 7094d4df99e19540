//! Host content widgets placed inside nodes.

use std::cell::Cell;
use std::rc::Rc;

use emath::Rect;
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// Size a widget asks for when a node lays it out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRequest {
    pub min_width: f32,
    pub min_height: f32,
    pub natural_height: f32,
}

impl SizeRequest {
    pub fn new(min_width: f32, min_height: f32, natural_height: f32) -> Self {
        Self {
            min_width,
            min_height,
            natural_height: natural_height.max(min_height),
        }
    }
}

impl Default for SizeRequest {
    fn default() -> Self {
        Self::new(80.0, 20.0, 20.0)
    }
}

struct WidgetInner {
    name: String,
    size: Cell<SizeRequest>,
    visible: Cell<bool>,
    parent: Cell<Option<NodeId>>,
    rect: Cell<Rect>,
}

/// Shared handle to a content widget. Clones refer to the same widget; a
/// widget belongs to at most one node at a time.
#[derive(Clone)]
pub struct Widget(Rc<WidgetInner>);

impl std::fmt::Debug for Widget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Widget")
            .field("name", &self.0.name)
            .field("parent", &self.0.parent.get())
            .finish()
    }
}

impl Widget {
    pub fn new(name: impl Into<String>, size: SizeRequest) -> Self {
        Self(Rc::new(WidgetInner {
            name: name.into(),
            size: Cell::new(size),
            visible: Cell::new(true),
            parent: Cell::new(None),
            rect: Cell::new(Rect::NOTHING),
        }))
    }

    /// A widget with the default size request.
    pub fn label(name: impl Into<String>) -> Self {
        Self::new(name, SizeRequest::default())
    }

    pub fn name(&self) -> String {
        self.0.name.clone()
    }

    pub fn size_request(&self) -> SizeRequest {
        self.0.size.get()
    }

    pub fn set_size_request(&self, size: SizeRequest) {
        self.0.size.set(size);
    }

    pub fn is_visible(&self) -> bool {
        self.0.visible.get()
    }

    pub fn set_visible(&self, visible: bool) {
        self.0.visible.set(visible);
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.0.parent.get()
    }

    pub(crate) fn set_parent(&self, parent: Option<NodeId>) {
        self.0.parent.set(parent);
    }

    /// Rectangle assigned by the last layout, in view coordinates.
    pub fn rect(&self) -> Rect {
        self.0.rect.get()
    }

    pub(crate) fn set_rect(&self, rect: Rect) {
        self.0.rect.set(rect);
    }

    pub fn ptr_eq(&self, other: &Widget) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
