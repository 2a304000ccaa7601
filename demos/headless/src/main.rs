//! Headless server or client.
//!
//! ```text
//! headless server [--port 9000]
//! headless client [--host 127.0.0.1] [--port 9000] [--name player]
//! headless --config net.json [--name player]
//! ```
//!
//! The server runs a moving platform; a client joins, enters the match and
//! walks its character back and forth once the match starts.

use std::time::Duration;

use duetnet::prelude::*;
use duetnet::{LogChat, LogHooks};
use duetnet_tick::{TickConfig, TickScheduler};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

struct Args {
    config: NetConfig,
    name: String,
}

fn parse_args() -> Result<Args, String> {
    let mut config = NetConfig::default();
    let mut name = "player".to_string();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "server" => config.role = Role::Server,
            "client" => config.role = Role::Client,
            "--host" => config.host = args.next().ok_or("--host needs a value")?,
            "--port" => {
                let value = args.next().ok_or("--port needs a value")?;
                config.port = value.parse().map_err(|_| format!("bad port: {value}"))?;
            }
            "--name" => name = args.next().ok_or("--name needs a value")?,
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                let json = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {path}: {e}"))?;
                config = NetConfig::from_json(&json).map_err(|e| e.to_string())?;
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Args { config, name })
}

// ---------------------------------------------------------------------------
// Game stand-ins
// ---------------------------------------------------------------------------

/// Moves the platform up and down (server).
fn drive_platform(manager: &mut NetManager, platform: AgentId, elapsed: f32) {
    if let Some(agent) = manager.directory_mut().get_as_mut::<PlatformAgent>(platform) {
        agent.set_position(Vec3::new(4.0, 2.0 + elapsed.sin() * 2.0, 0.0));
    }
}

/// Walks our own character, if we have one (client).
fn drive_character(manager: &mut NetManager, elapsed: f32) {
    let local = manager.local_peer();
    let Some(id) = manager.directory().find_by_owner(local) else {
        return;
    };
    if let Some(character) = manager.directory_mut().get_as_mut::<CharacterAgent>(id) {
        let x = (elapsed * 0.5).sin() * 5.0;
        character.set_position(Vec3::new(x, 0.0, 0.0));
        character.set_rotation_y(if (elapsed * 0.5).cos() >= 0.0 { 90.0 } else { 270.0 });
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "headless run failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), NetError> {
    let role = args.config.role;
    let mut manager = NetManager::builder()
        .config(args.config)
        .chat(LogChat)
        .hooks(LogHooks)
        .start()
        .await?;

    let platform = match role {
        Role::Server => Some(manager.spawn_environment(AgentKind::Platform, Pose::origin())?),
        Role::Client => {
            manager.request_identity(&args.name)?;
            None
        }
    };

    let mut scheduler = TickScheduler::new(TickConfig {
        tick_rate_hz: 60,
        initial_jitter_us: 2_000,
    });
    let mut elapsed = Duration::ZERO;
    let mut entered = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            tick = scheduler.wait_for_tick() => {
                elapsed += tick.dt;
                manager.update(tick.dt);

                match platform {
                    Some(id) => drive_platform(&mut manager, id, elapsed.as_secs_f32()),
                    None => {
                        if !entered && !manager.local_peer().is_unowned() {
                            manager.enter_game()?;
                            entered = true;
                        }
                        drive_character(&mut manager, elapsed.as_secs_f32());
                    }
                }
            }
        }
    }

    manager.shutdown();
    Ok(())
}
