use crate::session::{CharacterId, ConnectionId, SessionTransport};

/// How the local process relates to a character. Resolved once per character and
/// consulted at the top of every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Simulates the character.
    Authority,
    /// Owns the character's input but only renders replicated state.
    OwnerObserver,
    /// Renders replicated state of someone else's character.
    RemoteObserver,
}

impl Role {
    pub fn resolve(
        transport: &dyn SessionTransport,
        character: CharacterId,
        owner: ConnectionId,
    ) -> Self {
        if transport.is_authority_for(character) {
            Role::Authority
        } else if transport.local_connection() == owner {
            Role::OwnerObserver
        } else {
            Role::RemoteObserver
        }
    }

    pub fn is_authority(self) -> bool {
        self == Role::Authority
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Authority => "authority",
            Role::OwnerObserver => "owner",
            Role::RemoteObserver => "observer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
