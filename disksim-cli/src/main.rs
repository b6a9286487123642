// SPDX-License-Identifier: GPL-3.0-only

//! Command-line front end for the partition simulator
//!
//! Loads a layout, then applies commands from a script file or an interactive
//! prompt. Output goes to stdout, diagnostics to stderr.

mod config;
mod logging;
mod render;
mod script;

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use disksim_core::{DiskManager, layout};

use crate::config::Config;
use crate::script::{Response, parse_line, parse_script, run_step};

#[derive(Parser)]
#[command(name = "disksim")]
#[command(about = "Simulate MBR partition table edits on a virtual disk", long_about = None)]
struct Cli {
    /// Config file (defaults to $DISKSIM_CONFIG or $XDG_CONFIG_HOME/disksim/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Layout name under resources/layouts, or a path to a layout file
    #[arg(long, global = true)]
    layout: Option<String>,

    /// Print one JSON document per result
    #[arg(long, global = true)]
    json: bool,

    /// Raise log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the regions of the loaded layout
    Show,
    /// Print disk totals of the loaded layout
    Summary,
    /// Apply the commands in a script file, one per line
    Run {
        /// Script path, or - for stdin
        script: PathBuf,

        /// Stop at the first rejected command and exit with an error
        #[arg(long)]
        strict: bool,
    },
    /// Read commands interactively
    Shell,
    /// Validate a layout file and print its regions
    CheckLayout {
        /// Path to a layout TOML file
        file: PathBuf,
    },
    /// List the layouts shipped in resources/layouts
    Layouts,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(layout) = &cli.layout {
        config.layout = layout.clone();
    }
    logging::init(config.log_level.raised_by(cli.verbose), config.log_to_disk);

    match cli.command {
        Commands::Show => {
            let manager = open_session(&config)?;
            emit(&Response::Regions(manager.snapshot()), cli.json)?;
        }
        Commands::Summary => {
            let manager = open_session(&config)?;
            emit(&Response::Summary(manager.summary()), cli.json)?;
        }
        Commands::Run { script, strict } => {
            let source = read_script(&script)?;
            let lines = parse_script(&source)?;
            let mut manager = open_session(&config)?;
            let mut rejected = 0usize;

            for line in &lines {
                if !cli.json {
                    println!("> {}", line.text);
                }
                let response = run_step(&mut manager, &line.step);
                emit(&response, cli.json)?;
                if response.is_rejected() {
                    rejected += 1;
                    if strict {
                        bail!("line {}: command rejected", line.number);
                    }
                }
            }
            tracing::info!(commands = lines.len(), rejected, "Script finished");
        }
        Commands::Shell => {
            let mut manager = open_session(&config)?;
            shell(&mut manager, cli.json)?;
        }
        Commands::CheckLayout { file } => {
            let spec = layout::load_path(&file)?;
            let table = spec
                .build()
                .with_context(|| format!("Layout {} is invalid", file.display()))?;
            if let Some(description) = &spec.description
                && !cli.json
            {
                println!("{}: {description}", spec.name);
            }
            emit(&Response::Regions(table.snapshot()), cli.json)?;
        }
        Commands::Layouts => {
            let names = layout::available_layouts();
            if cli.json {
                println!("{}", serde_json::to_string(&names)?);
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }
    }

    Ok(())
}

fn open_session(config: &Config) -> Result<DiskManager> {
    let table = layout::resolve(&config.layout)
        .with_context(|| format!("Failed to load layout '{}'", config.layout))?;
    tracing::debug!(layout = %config.layout, total_mb = table.total_mb(), "Layout loaded");
    Ok(DiskManager::new(table, config.engine))
}

fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        for line in std::io::stdin().lock().lines() {
            source.push_str(&line?);
            source.push('\n');
        }
        return Ok(source);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read script {}", path.display()))
}

fn shell(manager: &mut DiskManager, json: bool) -> Result<()> {
    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();
    let mut stdout = std::io::stdout();

    loop {
        if interactive {
            write!(stdout, "disksim> ")?;
            stdout.flush()?;
        }

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim();
        if matches!(trimmed, "quit" | "exit") {
            break;
        }

        match parse_line(trimmed) {
            Ok(Some(step)) => emit(&run_step(manager, &step), json)?,
            Ok(None) => {}
            Err(e) => eprintln!("error: {e:#}"),
        }
    }
    Ok(())
}

fn emit(response: &Response, json: bool) -> Result<()> {
    if json {
        println!("{}", render::json(response)?);
    } else {
        println!("{}", render::text(response));
    }
    Ok(())
}
