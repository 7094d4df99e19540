//! egui front end for `nodeview` graphs.
//!
//! [`GraphViewWidget`] draws the nodes, sockets and connection curves of a
//! [`nodeview::GraphView`] and forwards pointer input to it. Item widgets are
//! drawn by the caller through a content closure.

pub mod drawing;
mod interactions;
mod node_rendering;
pub mod theme;
pub mod widget;

pub use theme::GraphViewTheme;
pub use widget::GraphViewWidget;
