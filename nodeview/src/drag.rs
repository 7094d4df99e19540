//! Drag payload cache: maps the token carried by an in-flight drag to the
//! socket it was started from.

use std::collections::HashMap;

use uuid::Uuid;

use crate::socket::SocketRef;

#[derive(Debug, Default)]
pub struct DragPayloadCache {
    entries: HashMap<Uuid, SocketRef>,
}

impl DragPayloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `socket` as the origin of a new drag and return its token.
    pub fn insert(&mut self, socket: SocketRef) -> Uuid {
        let token = Uuid::new_v4();
        self.entries.insert(token, socket);
        token
    }

    /// Consume the entry on drop. Tokens are single-use.
    pub fn take(&mut self, token: &Uuid) -> Option<SocketRef> {
        self.entries.remove(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
