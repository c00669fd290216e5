use std::process::ExitCode;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use keystack::build_info;
use keystack::config::AppConfig;
use keystack::health;
use keystack::input::{FrameInput, InputStack, KeyCode, KeyEvent, MemoryStore, SharedStore};

#[derive(Parser)]
#[command(author, version, about = "Inspect and validate stacked input handler profiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config profile to load (defaults to APP_PROFILE, then "release")
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Keep bindings in memory instead of the configured store
    #[arg(long, global = true)]
    in_memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run health checks over the profile's handler stack
    Check {
        /// Print details for passing checks too
        #[arg(short, long)]
        verbose: bool,
    },
    /// List the stack, polled keys and every handler's bindings
    Inspect,
    /// Show which actions would fire if the given keys went down this frame
    Press {
        /// Key names, e.g. Space W LeftShift
        #[arg(required = true)]
        keys: Vec<KeyCode>,
    },
    /// Print build information
    Version,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,keystack=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let load = || -> Result<(AppConfig, InputStack)> {
        let config = match &cli.profile {
            Some(profile) => AppConfig::load(profile),
            None => AppConfig::load_from_env(),
        }
        .context("failed to load configuration")?;

        let store: SharedStore = if cli.in_memory {
            Rc::new(MemoryStore::new())
        } else {
            config.open_store()
        };
        let stack = InputStack::from_config(&config, store);
        Ok((config, stack))
    };

    match &cli.command {
        Commands::Check { verbose } => {
            let (_, stack) = load()?;
            let report = health::run_all_checks(&stack);
            health::print_report(&report, *verbose);
            Ok(ExitCode::from(report.exit_code() as u8))
        }
        Commands::Inspect => {
            let (config, stack) = load()?;
            inspect(&config, &stack);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Press { keys } => {
            let (_, stack) = load()?;
            press(&stack, keys);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => {
            println!("{}", build_info::detailed_info());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn inspect(config: &AppConfig, stack: &InputStack) {
    println!("{} {}", "Profile:".bold(), config.profile);
    println!("{} {:?}", "Cursor:".bold(), stack.cursor());

    println!("\n{}", "Stack (top first)".bold().underline());
    print!("{}", stack.debug_stack());

    println!("\n{}", "Polled keys".bold().underline());
    let keys: Vec<String> = stack.key_codes().iter().map(KeyCode::to_string).collect();
    println!("{}", keys.join(" "));

    for handler in stack.registry().iter() {
        let marker = if stack.contains(handler.name()) {
            "stacked".green()
        } else {
            "idle".dimmed()
        };
        println!("\n{} [{}]", handler.name().bold().underline(), marker);
        for event in KeyEvent::ALL {
            for listener in handler.listeners(event) {
                let key = |k: Option<KeyCode>| k.map_or_else(|| "-".to_string(), |k| k.to_string());
                println!(
                    "  {:<12} {:<16} {} / {}",
                    format!("{event:?}"),
                    listener.name(),
                    key(listener.positive()),
                    key(listener.alternative())
                );
            }
        }
        for axis in handler.axes() {
            println!("  {:<12} {:<16} {}", "Axis", axis.name, axis.source);
        }
    }
}

fn press(stack: &InputStack, keys: &[KeyCode]) {
    let mut input = FrameInput::new();
    for key in keys {
        input.press(*key);
    }

    let mut reached = Vec::new();
    for handler in stack.registry().iter() {
        for listener in handler.listeners(KeyEvent::PressStart) {
            if stack.is_just_pressed(&input, listener) {
                reached.push(format!("{}/{}", handler.name(), listener.name()));
            }
        }
    }

    if reached.is_empty() {
        println!("{}", "No action reached".yellow());
    } else {
        for action in reached {
            println!("{} {}", "✓".green(), action);
        }
    }
}
