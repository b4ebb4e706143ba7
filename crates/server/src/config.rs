use brickface::{CharacterConfig, PacketLossSimulation};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub max_clients: usize,
    pub timeout_secs: u64,
    pub character: CharacterConfig,
    /// Applied to every connection as it is accepted.
    pub global_packet_loss: Option<PacketLossSimulation>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: brickface::DEFAULT_TICK_RATE,
            max_clients: 32,
            timeout_secs: 10,
            character: CharacterConfig::default(),
            global_packet_loss: None,
        }
    }
}
