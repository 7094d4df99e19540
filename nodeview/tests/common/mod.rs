#![allow(dead_code)]

use nodeview::{GraphView, NodeId, NodeRegistry, SocketMode, Widget};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Registry with a "constant" (one source) and an "adder" (two sinks, one
/// source) node class.
pub fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register("constant", |view: &mut GraphView| {
        let id = view.add_node(view.create_node("constant", "Constant"));
        view.add_item(id, Widget::label("value"), SocketMode::Source, 0);
        Ok(id)
    });
    registry.register("adder", |view: &mut GraphView| {
        let id = view.add_node(view.create_node("adder", "Adder"));
        view.add_item(id, Widget::label("a"), SocketMode::Sink, 0);
        view.add_item(id, Widget::label("b"), SocketMode::Sink, 0);
        view.add_item(id, Widget::label("sum"), SocketMode::Source, 0);
        Ok(id)
    });
    registry
}

pub fn sources(view: &GraphView, node: NodeId) -> Vec<nodeview::SocketRef> {
    view.node(node).unwrap().sources(view.sockets())
}

pub fn sinks(view: &GraphView, node: NodeId) -> Vec<nodeview::SocketRef> {
    view.node(node).unwrap().sinks(view.sockets())
}
