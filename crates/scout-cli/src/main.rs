//! `scout` – runs the perception steps against simulated modules.
//!
//! ```text
//! scout          run the simulated pick-cavity mission
//! scout schema   print the JSON schema of ~/.scout/config.toml
//! scout help     show usage
//! ```
//!
//! On first run the default configuration is written to
//! `~/.scout/config.toml`.  Ctrl-C aborts the mission.

mod config;
mod mission;

use std::process::ExitCode;

use colored::Colorize;
use scout_middleware::EventBus;
use scout_runtime::{UserData, init_tracing, slots};
use tokio::sync::watch;
use tracing::{error, warn};

fn main() -> ExitCode {
    let _guard = init_tracing("scout");

    let command = std::env::args().nth(1);
    match command.as_deref() {
        None | Some("run") => run(),
        Some("schema") => match config::schema_json() {
            Ok(schema) => {
                println!("{schema}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", "Error".red());
                ExitCode::FAILURE
            }
        },
        Some("help" | "--help" | "-h") => {
            print_usage();
            ExitCode::SUCCESS
        }
        Some(other) => {
            eprintln!("{}: unknown command '{other}'", "Error".red());
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn run() -> ExitCode {
    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {e}", "Error saving config".red()),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (stop_tx, mut stop_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – aborting mission …".yellow().bold());
        stop_tx.send_replace(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let bus = EventBus::default();
        let sim = mission::simulate(&bus, &cfg);
        let sm = match mission::build(&bus, &cfg, &sim) {
            Ok(sm) => sm,
            Err(e) => {
                println!("{}: {e}", "Mission error".red());
                return ExitCode::FAILURE;
            }
        };

        println!();
        println!("  Running mission with {} simulated object(s) …\n", cfg.simulation.objects.len());
        let started = std::time::Instant::now();
        let mut userdata = UserData::new();
        userdata.insert(slots::VS_COUNT, 0u32);

        let result = tokio::select! {
            result = sm.run(&mut userdata) => Some(result),
            // Disabled when no Ctrl-C handler could be installed.
            Ok(_) = stop_rx.wait_for(|stop| *stop) => None,
        };

        match result {
            Some(Ok(outcome)) if outcome == mission::DONE => {
                println!(
                    "\n  {} mission {} in {:.1}s",
                    "✓".green().bold(),
                    outcome.green().bold(),
                    started.elapsed().as_secs_f64()
                );
                print_cavities(&userdata);
                ExitCode::SUCCESS
            }
            Some(Ok(outcome)) => {
                println!("\n  {} mission {}", "✗".red().bold(), outcome.red().bold());
                ExitCode::FAILURE
            }
            Some(Err(e)) => {
                println!("\n  {}: {e}", "Mission error".red());
                ExitCode::FAILURE
            }
            None => {
                println!("  {}", "Mission aborted.".yellow());
                ExitCode::FAILURE
            }
        }
    })
}

fn print_cavities(userdata: &UserData) {
    let Ok(cavities) = userdata.get::<scout_perception::ResultSet>(slots::FOUND_CAVITIES) else {
        return;
    };
    println!("  Cavities:");
    for cavity in cavities {
        let p = cavity.pose.pose.position;
        println!(
            "    • {:<10} error {:.3}  at ({:.2}, {:.2}, {:.2}) in {}",
            cavity.subject.bold(),
            cavity.score,
            p.x,
            p.y,
            p.z,
            cavity.pose.frame_id.dimmed()
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}", "scout".bold().cyan(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Perception acquisition steps – simulated mission");
    println!();
}

fn print_usage() {
    println!("Usage: scout [run | schema | help]");
    println!();
    println!("  run      run the simulated pick-cavity mission (default)");
    println!("  schema   print the JSON schema of ~/.scout/config.toml");
    println!("  help     show this message");
}
