use brickface::CharacterConfig;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub tick_rate: u32,
    /// Input frames sent to the authority per second.
    pub input_rate: u32,
    pub connection_timeout_secs: u64,
    pub request_interval_secs: f32,
    pub ping_interval_secs: f32,
    pub character: CharacterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_rate: brickface::DEFAULT_TICK_RATE,
            input_rate: 60,
            connection_timeout_secs: 10,
            request_interval_secs: 1.0,
            ping_interval_secs: 0.25,
            character: CharacterConfig::default(),
        }
    }
}
