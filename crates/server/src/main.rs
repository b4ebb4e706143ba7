mod config;
mod events;
mod server;
mod tui;

use std::io;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use brickface::input::SensorSite;
use brickface::{CharacterConfig, PacketLossSimulation};
use config::ServerConfig;
use server::GameServer;
use tui::TuiState;

#[derive(Parser)]
#[command(name = "brickface-server")]
#[command(about = "Authoritative host for brickface ragdoll characters")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = brickface::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = brickface::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 15.0, help = "Pose snapshots per second")]
    update_rate: f32,

    #[arg(short, long, default_value_t = 32)]
    max_clients: usize,

    #[arg(long, default_value_t = 10, help = "Seconds of silence before a client is dropped")]
    timeout: u64,

    #[arg(long, help = "Probe the floor on the host instead of the owning client")]
    authority_floor_sensor: bool,

    #[arg(long)]
    headless: bool,

    #[arg(long, help = "Enable global packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,
}

impl Args {
    fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    fn server_config(&self) -> Result<ServerConfig> {
        let global_packet_loss = self.simulate_packet_loss.then(|| PacketLossSimulation {
            enabled: true,
            loss_percent: self.loss_percent,
            min_latency_ms: self.min_latency,
            max_latency_ms: self.max_latency,
            jitter_ms: self.jitter,
        });

        let mut character = CharacterConfig::default();
        character.replication.update_rate = self.update_rate;
        if self.authority_floor_sensor {
            character.floor.site = SensorSite::Authority;
        }
        character.validate()?;

        Ok(ServerConfig {
            tick_rate: self.tick_rate,
            max_clients: self.max_clients,
            timeout_secs: self.timeout,
            character,
            global_packet_loss,
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.server_config()?;
    let bind_addr = args.bind_addr();

    let mut server = GameServer::new(&bind_addr, config)?;

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::info!("Server started on {}", server.local_addr());
        server.run();
        log::info!("Server shutting down");
    } else {
        run_with_tui(&mut server)?;
    }

    Ok(())
}

fn run_with_tui(server: &mut GameServer) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = server.running();
    let mut tui_state = TuiState::new();

    tui_state.log_info(format!("Server started on {}", server.local_addr()));

    while running.load(Ordering::SeqCst) {
        server.tick_once();

        for event in server.drain_events() {
            tui_state.log(event.level(), event.describe());
        }

        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && tui_state.handle_key(key.code) {
                    running.store(false, Ordering::SeqCst);
                }
            }
        }

        let stats = server.stats();
        let characters = server.character_infos();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &characters);
        })?;
    }

    server.shutdown_connections();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_a_valid_config() {
        let args = Args::parse_from(["brickface-server"]);
        let config = args.server_config().unwrap();
        assert_eq!(config.tick_rate, brickface::DEFAULT_TICK_RATE);
        assert!(config.global_packet_loss.is_none());
        assert_eq!(config.character.floor.site, SensorSite::Owner);
        assert_eq!(args.bind_addr(), format!("0.0.0.0:{}", brickface::DEFAULT_PORT));
    }

    #[test]
    fn packet_loss_and_sensor_flags() {
        let args = Args::parse_from([
            "brickface-server",
            "--simulate-packet-loss",
            "--loss-percent",
            "5",
            "--authority-floor-sensor",
            "-u",
            "30",
        ]);
        let config = args.server_config().unwrap();
        let sim = config.global_packet_loss.unwrap();
        assert!(sim.enabled);
        assert_eq!(sim.loss_percent, 5.0);
        assert_eq!(config.character.floor.site, SensorSite::Authority);
        assert_eq!(config.character.replication.update_rate, 30.0);
    }

    #[test]
    fn non_positive_update_rate_is_refused() {
        let args = Args::parse_from(["brickface-server", "--update-rate", "0"]);
        assert!(args.server_config().is_err());
    }
}
