//! Model for interactive node-graph editors: sockets, nodes, links and the
//! pointer state machine of the canvas, with XML persistence. Drawing is left
//! to a toolkit crate such as `egui_nodeview`.

pub mod config;
pub mod curve;
pub mod drag;
pub mod error;
pub mod layout;
pub mod node;
pub mod persist;
pub mod registry;
pub mod signal;
pub mod socket;
pub mod timer;
pub mod view;
pub mod widget;

pub use config::ViewConfig;
pub use curve::ConnectionCurve;
pub use error::{ConnectError, ViewError};
pub use node::{CustomState, Node, NodeEvent, NodeId, Padding};
pub use registry::NodeRegistry;
pub use socket::{Payload, SocketArena, SocketEvent, SocketId, SocketMode, SocketRef};
pub use view::{GraphView, InteractionMode, Link};
pub use widget::{SizeRequest, Widget};
