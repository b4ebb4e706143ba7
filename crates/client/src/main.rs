mod net;
mod script;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use clap::Parser;

use brickface::{CharacterConfig, ConnectionState, SlotPolicy};
use net::{ClientConfig, NetworkClient};
use script::InputScript;

#[derive(Parser)]
#[command(name = "brickface-client")]
#[command(about = "Headless brickface client driven by an input script")]
struct Args {
    #[arg(
        short,
        long,
        default_value = "127.0.0.1:27015",
        help = "Server address to connect to"
    )]
    server: String,

    #[arg(short, long, default_value = "Player")]
    name: String,

    #[arg(
        long,
        default_value = "idle:1,forward:3,turn-right:1.5,reach:1,forward:2,lower:1,look-up:0.5,back:1",
        help = "Comma separated action[:seconds] steps, looped"
    )]
    script: String,

    #[arg(short, long, help = "Seconds to stay connected; runs until the server leaves if omitted")]
    duration: Option<f32>,

    #[arg(
        long,
        help = "Play snapshots this many seconds behind the newest instead of chasing the latest"
    )]
    buffer_delay: Option<f64>,

    #[arg(short, long, default_value_t = brickface::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(long, default_value_t = 1.0, help = "Seconds between status lines")]
    status_interval: f32,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut script: InputScript = args.script.parse()?;
    let server_addr: SocketAddr = args.server.parse()?;

    let mut character = CharacterConfig::default();
    if let Some(delay) = args.buffer_delay {
        character.replication.slot_policy = SlotPolicy::Buffered { delay };
    }

    let config = ClientConfig {
        tick_rate: args.tick_rate,
        character,
        ..Default::default()
    };

    let mut client = NetworkClient::new(config, &args.name)?;
    client.connect(server_addr)?;

    run(&mut client, &mut script, args.duration, args.status_interval)?;

    client.shutdown();
    log::info!("{}", client.status_line());
    Ok(())
}

fn run(
    client: &mut NetworkClient,
    script: &mut InputScript,
    duration: Option<f32>,
    status_interval: f32,
) -> anyhow::Result<()> {
    let running = client.running();
    let status_interval = Duration::from_secs_f32(status_interval.max(0.1));
    let start = Instant::now();
    let mut last_frame = Instant::now();
    let mut last_status = Instant::now();

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        let delta = (now - last_frame).as_secs_f32();
        last_frame = now;

        client.update(delta, script)?;

        if client.state() == ConnectionState::Disconnected {
            log::info!("Connection closed");
            break;
        }

        if duration.is_some_and(|limit| start.elapsed().as_secs_f32() >= limit) {
            log::info!("Run time elapsed, disconnecting");
            break;
        }

        if client.is_connected() && last_status.elapsed() >= status_interval {
            log::info!("{}", client.status_line());
            last_status = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    Ok(())
}
