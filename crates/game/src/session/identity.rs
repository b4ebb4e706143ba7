use std::collections::HashMap;

use super::ConnectionId;

/// Supplies display names per connection. Used for labels only.
pub trait PlayerIdentity {
    fn display_name(&self, connection: ConnectionId) -> Option<&str>;

    fn label(&self, connection: ConnectionId) -> String {
        self.display_name(connection)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Player {connection}"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    names: HashMap<ConnectionId, String>,
}

pub const MAX_NAME_LEN: usize = 32;

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a trimmed, length-limited name. Blank names fall back to the default label.
    pub fn register(&mut self, connection: ConnectionId, name: &str) {
        let name: String = name.trim().chars().take(MAX_NAME_LEN).collect();
        if name.is_empty() {
            self.names.remove(&connection);
        } else {
            self.names.insert(connection, name);
        }
    }

    pub fn remove(&mut self, connection: ConnectionId) -> Option<String> {
        self.names.remove(&connection)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl PlayerIdentity for IdentityRegistry {
    fn display_name(&self, connection: ConnectionId) -> Option<&str> {
        self.names.get(&connection).map(String::as_str)
    }
}
