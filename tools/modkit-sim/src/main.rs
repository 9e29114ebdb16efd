// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! modkit host simulator
//!
//! Runs a device configuration against simulated pins on the host. Lines
//! typed on stdin go through the command router, so the console behaves
//! like the device's serial console.
//!
//! # Usage
//!
//! ```bash
//! # Run a configuration (Ctrl+C or `quit` to stop)
//! modkit-sim --config device.json
//!
//! # Run for five seconds with a 5 ms loop tick
//! modkit-sim --config device.json --tick-ms 5 --duration-ms 5000
//!
//! # Generate / check a configuration
//! modkit-sim gen-config --output device.json
//! modkit-sim validate --config device.json
//! ```

mod console;

use clap::{Parser, Subcommand};
use crossbeam::channel::{self, Receiver};
use modkit::{
    Context, DeviceIdentity, ModuleDeclaration, Orchestrator, RandomIdSource, SimulatedHal,
    SystemClock, SystemConfig,
};
use serde_json::json;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// modkit host simulator
#[derive(Parser, Debug)]
#[command(name = "modkit-sim")]
#[command(about = "Run a modkit device configuration against simulated hardware")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Main loop period in milliseconds
    #[arg(long, default_value = "10")]
    tick_ms: u64,

    /// Stop after this many milliseconds (0 = run until Ctrl+C)
    #[arg(long, default_value = "0")]
    duration_ms: u64,

    /// Device id prefix
    #[arg(long, default_value = modkit::identity::DEFAULT_PREFIX)]
    id_prefix: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "device.json")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(cmd) = args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let Some(config_path) = args.config.as_ref() else {
        eprintln!("Missing --config (or use gen-config to create one)");
        std::process::exit(2);
    };
    let config = SystemConfig::from_file(config_path)?;
    run(&args, config)
}

fn run(args: &Args, config: SystemConfig) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let hal = Arc::new(SimulatedHal::new());
    let ctx = Context::new(hal.clone(), Arc::new(SystemClock::new()));
    modkit_modules::register_all(ctx.factory());

    let identity = Arc::new(DeviceIdentity::new(RandomIdSource).with_prefix(args.id_prefix.as_str()));
    console::register(&ctx, &hal, Arc::clone(&identity));

    let mut system = Orchestrator::new(ctx.clone());
    if let Err(e) = system.begin_with(config) {
        tracing::error!(state = %system.state(), "System failed to start: {}", e);
        std::process::exit(1);
    }
    tracing::info!(device = %identity.unique_id(), tick_ms = args.tick_ms, "simulator started");

    println!("modkit simulator v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!("Device:  {}", identity.unique_id());
    println!("Modules: {}", system.module_names().join(", "));
    println!();
    println!("Type '<instance> <command> [args...]', 'sim help', or 'quit'.");
    println!("Press Ctrl+C to stop...");
    println!();

    let lines = spawn_stdin_reader();
    let tick = Duration::from_millis(args.tick_ms.max(1));
    let deadline = (args.duration_ms > 0).then(|| Instant::now() + Duration::from_millis(args.duration_ms));

    let reason = loop {
        if !running.load(Ordering::SeqCst) {
            break "interrupted";
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break "duration elapsed";
        }

        if let Ok(line) = lines.try_recv() {
            let line = line.trim_end_matches('\r');
            if matches!(line, "quit" | "exit") {
                break "quit";
            }
            if !line.is_empty() {
                tracing::debug!(line, "console command");
                println!("{}", ctx.commands().execute(line));
            }
        }

        system.poll();
        std::thread::sleep(tick);
    };
    tracing::info!(reason, "simulator stopping");

    println!("\nShutting down...");
    system.shutdown();
    Ok(())
}

/// Forward stdin lines to the loop without blocking it.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn example_config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.add_module(
        ModuleDeclaration::new("LedModule")
            .named("status_led")
            .with_config(json!({
                "resource": {"type": "gpio", "pin": 13},
                "blink_interval_ms": 500
            })),
    );
    config.add_module(
        ModuleDeclaration::new("ButtonModule")
            .named("user_button")
            .with_config(json!({
                "resource": {"type": "gpio", "pin": 4},
                "long_press_ms": 1000,
                "debounce_ms": 50
            })),
    );
    config
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let content = example_config().to_json_pretty()?;
    std::fs::write(&output, content + "\n")?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match SystemConfig::from_file(&config_path).and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Modules: {}", config.modules.len());
            for (i, decl) in config.modules.iter().enumerate() {
                println!(
                    "  [{}] {} ({})",
                    i,
                    decl.instance_name().unwrap_or("?"),
                    decl.type_name.as_deref().unwrap_or("?")
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}
