use std::net::SocketAddr;

use brickface::{CharacterId, ConnectionId};

#[derive(Debug, Clone)]
pub enum ServerEvent {
    ClientConnecting {
        addr: SocketAddr,
        name: String,
    },
    ClientConnected {
        client_id: ConnectionId,
        addr: SocketAddr,
        character_id: CharacterId,
    },
    ClientDisconnected {
        client_id: ConnectionId,
        reason: DisconnectReason,
    },
    ConnectionDenied {
        addr: SocketAddr,
        reason: String,
    },
    MessageRejected {
        client_id: ConnectionId,
        reason: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
    Kicked,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Kicked => "kicked",
        }
    }
}

impl ServerEvent {
    pub fn level(&self) -> log::Level {
        match self {
            ServerEvent::ClientConnecting { .. } | ServerEvent::ClientConnected { .. } => {
                log::Level::Info
            }
            ServerEvent::ClientDisconnected { reason, .. } => match reason {
                DisconnectReason::Graceful => log::Level::Info,
                DisconnectReason::Timeout | DisconnectReason::Kicked => log::Level::Warn,
            },
            ServerEvent::ConnectionDenied { .. } | ServerEvent::MessageRejected { .. } => {
                log::Level::Warn
            }
            ServerEvent::Error { .. } => log::Level::Error,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ServerEvent::ClientConnecting { addr, name } => {
                format!("Connection request from {} ({})", addr, name)
            }
            ServerEvent::ClientConnected {
                client_id,
                addr,
                character_id,
            } => format!(
                "Client {} connected from {} (character {})",
                client_id, addr, character_id
            ),
            ServerEvent::ClientDisconnected { client_id, reason } => {
                format!("Client {} {}", client_id, reason.as_str())
            }
            ServerEvent::ConnectionDenied { addr, reason } => {
                format!("Connection denied to {}: {}", addr, reason)
            }
            ServerEvent::MessageRejected { client_id, reason } => {
                format!("Rejected message from client {}: {}", client_id, reason)
            }
            ServerEvent::Error { message } => message.clone(),
        }
    }

    pub fn log(&self) {
        log::log!(self.level(), "{}", self.describe());
    }
}
