//! Headless CLI runner: loads a level file, ticks the engine to completion
//! or a tick budget, and prints a colored summary. Grounded on the
//! teacher's `clap::Parser`-derived binaries and `Display`/`colored`
//! terminal output.

use clap::Parser;
use colored::Colorize;
use packetnet::dto::load_level_json;
use packetnet::state::{GameState, Settings};
use packetnet::Engine;

#[derive(Parser, Debug)]
#[command(about = "Run a packet network simulation headlessly")]
struct Cli {
    /// Path to a level JSON file.
    level: std::path::PathBuf,

    /// Fixed tick size in seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Maximum number of ticks to run before giving up.
    #[arg(long, default_value_t = 36_000)]
    max_ticks: u32,

    /// RNG seed for the deterministic run.
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .ok();

    let cli = Cli::parse();
    let text = std::fs::read_to_string(&cli.level)?;
    let level = load_level_json(&text)?;
    let mut state = GameState::new(level, Settings::default());
    let mut engine = Engine::new(cli.seed);
    state.enter_simulation_mode();

    let mut ticks = 0;
    while !state.game_over && !state.level_complete && ticks < cli.max_ticks {
        engine.tick(&mut state, cli.dt);
        ticks += 1;
    }

    println!("{}", "-- simulation summary --".bold());
    println!("ticks run:        {ticks}");
    println!("elapsed time:     {:.2}s", state.temporal_progress);
    println!("delivered:        {}", state.delivered_count.to_string().green());
    println!("lost:             {}", state.lost_packets_count.to_string().red());
    println!("packet loss:      {:.1}%", state.packet_loss_percentage());
    println!("coins:            {}", state.coins);
    println!("remaining wire:   {:.1}px", state.remaining_wire_length);
    if state.game_over {
        println!("result:           {}", state.last_game_over_reason.to_string().red().bold());
    } else if state.level_complete {
        println!("result:           {}", "LEVEL_COMPLETE".green().bold());
    } else {
        println!("result:           {}", "TICK_BUDGET_EXHAUSTED".yellow());
    }
    Ok(())
}
