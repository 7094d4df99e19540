//! Node class registry used to rebuild nodes on load.

use std::collections::HashMap;

use crate::error::ViewError;
use crate::node::NodeId;
use crate::view::GraphView;

type NodeFactory = Box<dyn Fn(&mut GraphView) -> Result<NodeId, ViewError>>;

/// Maps a class nickname to a closure that adds a fresh node of that class
/// (with its items and sockets) to a view.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        nickname: impl Into<String>,
        factory: impl Fn(&mut GraphView) -> Result<NodeId, ViewError> + 'static,
    ) {
        self.factories.insert(nickname.into(), Box::new(factory));
    }

    pub fn contains(&self, nickname: &str) -> bool {
        self.factories.contains_key(nickname)
    }

    pub fn build(&self, nickname: &str, view: &mut GraphView) -> Result<NodeId, ViewError> {
        let factory = self
            .factories
            .get(nickname)
            .ok_or_else(|| ViewError::UnknownClass(nickname.to_string()))?;
        factory(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_class_is_an_error() {
        let registry = NodeRegistry::new();
        let mut view = GraphView::new();
        assert!(matches!(
            registry.build("missing", &mut view),
            Err(ViewError::UnknownClass(name)) if name == "missing"
        ));
    }

    #[test]
    fn build_runs_factory() {
        let mut registry = NodeRegistry::new();
        registry.register("empty", |view| Ok(view.add_node(view.create_node("empty", "Empty"))));
        let mut view = GraphView::new();
        let id = registry.build("empty", &mut view).unwrap();
        assert_eq!(view.node(id).unwrap().class(), "empty");
        assert!(registry.contains("empty"));
    }
}
