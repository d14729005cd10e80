//! Command-line front end: drive the synthetic contact from stdin.

use std::io::BufRead;
use std::process::ExitCode;

use clap::Parser;
use mtforge::{Orientation, TouchManager, Vec2};

#[derive(Parser)]
#[command(
    name = "mtforge",
    about = "Drive a synthetic touch contact on the system touchscreen",
    after_help = "Commands on stdin: down X Y | move X Y | up | rot N | state | quit"
)]
struct Cli {
    /// Logical screen width in pixels.
    #[arg(long, default_value_t = 1920.0)]
    width: f32,

    /// Logical screen height in pixels.
    #[arg(long, default_value_t = 1080.0)]
    height: f32,

    /// Treat injected positions as physical sensor coordinates, skipping
    /// the rotation remap.
    #[arg(long)]
    physical: bool,

    /// Initial rotation: 0, 1 or 3 select 0, 90 or 270 degrees; anything
    /// else selects 180.
    #[arg(long, default_value_t = 0)]
    rotation: i32,

    /// Print real touches observed on the device.
    #[arg(long)]
    watch: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let mut manager = TouchManager::new();
    if let Err(err) = manager.init(Vec2::new(cli.width, cli.height), cli.physical) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }
    manager.set_orientation(Orientation::from_raw(cli.rotation));
    if cli.watch {
        manager.set_position_callback(|pos| println!("touch {:.1} {:.1}", pos.x, pos.y));
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if !run_command(&manager, line.trim()) {
            break;
        }
    }

    manager.close();
    ExitCode::SUCCESS
}

/// Execute one stdin command. Returns false when the loop should end.
fn run_command(manager: &TouchManager, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some(cmd @ ("down" | "move")) => match parse_position(parts) {
            Some(pos) if cmd == "down" => manager.down(pos),
            Some(pos) => manager.move_to(pos),
            None => eprintln!("usage: {cmd} X Y"),
        },
        Some("up") => manager.up(),
        Some("rot") => match parts.next().and_then(|v| v.parse().ok()) {
            Some(raw) => manager.set_orientation(Orientation::from_raw(raw)),
            None => eprintln!("usage: rot N"),
        },
        Some("state") => {
            let pointer = manager.pointer();
            println!(
                "pointer {} at ({:.1}, {:.1})",
                if pointer.down { "down" } else { "up" },
                pointer.position.x,
                pointer.position.y
            );
        }
        Some("quit") | Some("exit") => return false,
        Some(other) => eprintln!("unknown command: {other}"),
        None => {}
    }
    true
}

fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Option<Vec2> {
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    Some(Vec2::new(x, y))
}
