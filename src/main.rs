// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Comparator: AI-assisted electronic component datasheet comparison
//!
//! One-shot comparison, interactive chat, model listing and config management.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use comparator::config::AppConfig;
use comparator::extract::SheetSlot;
use comparator::gemini::GeminiClient;
use comparator::session::Session;
use comparator::tables::{parse_tables, render_table};
use comparator::{ComparatorError, Result};

/// Comparator CLI - compare component datasheets with generative AI
#[derive(Parser, Debug)]
#[command(name = "comparator")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Compare electronic component datasheets with a hosted AI model", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze two spec sheets and print the comparison
    Compare {
        /// First spec sheet (PDF)
        sheet1: PathBuf,

        /// Second spec sheet (PDF)
        sheet2: PathBuf,

        /// Model to use (default from config)
        #[arg(short, long)]
        model: Option<String>,

        /// Export the conversation to this path (.docx or .jsonl)
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Print the parsed comparison table
        #[arg(long)]
        table: bool,
    },

    /// Interactive session: load sheets, analyze, then chat
    Chat {
        /// First spec sheet to load on startup
        #[arg(long)]
        sheet1: Option<PathBuf>,

        /// Second spec sheet to load on startup
        #[arg(long)]
        sheet2: Option<PathBuf>,

        /// Model to select on startup
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the selectable models
    Models,

    /// Show API key and remote model status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Print markdown tables found in a saved response
    Tables {
        /// Response file (`-` for stdin)
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

/// A parsed line of interactive input
#[derive(Debug, PartialEq)]
enum ReplCommand {
    Load(SheetSlot, Option<PathBuf>),
    Model(Option<String>),
    Models,
    Table,
    Export(Option<PathBuf>),
    Clear,
    Help,
    Quit,
    Message(String),
    Unknown(String),
}

const REPL_HELP: &str = "\
Commands:
  /load1 <path>    Load spec sheet 1
  /load2 <path>    Load spec sheet 2
  /model [name]    Show or select the AI model
  /models          List selectable models
  /table           Show the comparison table from the last reply
  /export [path]   Save the conversation (.docx or .jsonl)
  /clear           Reset everything
  /help            Show this help
  /quit            Exit
Anything else is sent to the AI as a chat message.";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("Comparator v1.0.0 - Datasheet comparison");
    }

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Compare { sheet1, sheet2, model, export, table }) => {
            run_compare(config, sheet1, sheet2, model, export, table, &cli.format).await
        }
        Some(Commands::Chat { sheet1, sheet2, model }) => run_chat(config, sheet1, sheet2, model).await,
        Some(Commands::Models) => run_models(&config, &cli.format),
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Tables { file }) => run_tables(&file, &cli.format),
        None => run_chat(config, None, None, None).await,
    }
}

fn new_session(config: AppConfig) -> Result<Session> {
    let client = GeminiClient::new(
        &config.ai_engine.url,
        Duration::from_secs(config.ai_engine.timeout_secs),
    )?;
    Ok(Session::new(config, Arc::new(client)))
}

fn print_unseen(session: &mut Session) {
    for line in session.transcript_mut().take_unseen() {
        println!("{}", line);
    }
}

/// Run one comparison and exit
async fn run_compare(
    config: AppConfig,
    sheet1: PathBuf,
    sheet2: PathBuf,
    model: Option<String>,
    export: Option<PathBuf>,
    table: bool,
    format: &str,
) -> Result<()> {
    if let Some(model) = &model {
        config.check_model(model)?;
    }
    let mut session = new_session(config)?;

    if let Some(model) = model {
        session.select_model(&model).await;
    }
    session.load_sheet(SheetSlot::First, sheet1).await;
    session.load_sheet(SheetSlot::Second, sheet2).await;

    let comparison = if table { session.show_table() } else { None };
    if let Some(path) = export {
        session.download_history(Some(&path));
    }

    if format == "json" {
        let json = serde_json::to_string_pretty(session.transcript().entries())?;
        println!("{}", json);
        return Ok(());
    }

    print_unseen(&mut session);
    if let Some(comparison) = comparison {
        println!();
        println!("{}", render_table(&comparison));
    }

    if session.transcript().last_ai_text().is_none() {
        warn!("No analysis was produced");
    }

    Ok(())
}

fn parse_repl_line(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(ReplCommand::Message(line.to_string()));
    }

    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (line, None),
    };

    let command = match command {
        "/load1" => ReplCommand::Load(SheetSlot::First, arg.map(PathBuf::from)),
        "/load2" => ReplCommand::Load(SheetSlot::Second, arg.map(PathBuf::from)),
        "/model" => ReplCommand::Model(arg.map(String::from)),
        "/models" => ReplCommand::Models,
        "/table" => ReplCommand::Table,
        "/export" => ReplCommand::Export(arg.map(PathBuf::from)),
        "/clear" => ReplCommand::Clear,
        "/help" => ReplCommand::Help,
        "/quit" | "/exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    };
    Some(command)
}

/// Interactive chat loop
async fn run_chat(
    config: AppConfig,
    sheet1: Option<PathBuf>,
    sheet2: Option<PathBuf>,
    model: Option<String>,
) -> Result<()> {
    if let Some(model) = &model {
        config.check_model(model)?;
    }
    let mut session = new_session(config)?;

    if let Some(model) = model {
        session.select_model(&model).await;
    }
    if let Some(path) = sheet1 {
        session.load_sheet(SheetSlot::First, path).await;
    }
    if let Some(path) = sheet2 {
        session.load_sheet(SheetSlot::Second, path).await;
    }

    println!("Type /help for commands.");
    print_unseen(&mut session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = parse_repl_line(&line) else {
            continue;
        };

        match command {
            ReplCommand::Load(slot, Some(path)) => session.load_sheet(slot, path).await,
            ReplCommand::Load(slot, None) => println!("{}", session.sheet_label(slot)),
            ReplCommand::Model(Some(name)) => session.select_model(&name).await,
            ReplCommand::Model(None) => {
                println!(
                    "Selected: {} | Active: {}",
                    session.selected_model(),
                    session.model().unwrap_or("none")
                );
            }
            ReplCommand::Models => print_models(session.config(), Some(session.selected_model())),
            ReplCommand::Table => {
                if let Some(table) = session.show_table() {
                    println!("{}", render_table(&table));
                }
            }
            ReplCommand::Export(path) => {
                session.download_history(path.as_deref());
            }
            ReplCommand::Clear => session.clear_all(),
            ReplCommand::Help => println!("{}", REPL_HELP),
            ReplCommand::Quit => break,
            ReplCommand::Message(text) => session.send_user_query(&text).await,
            ReplCommand::Unknown(command) => println!("Unknown command: {} (try /help)", command),
        }

        print_unseen(&mut session);
    }

    Ok(())
}

fn print_models(config: &AppConfig, selected: Option<&str>) {
    let selected = selected.unwrap_or(config.ai_engine.default_model.as_str());
    for model in &config.ai_engine.models {
        let marker = if model == selected { "→" } else { " " };
        println!("  {} {}", marker, model);
    }
}

/// List the configured model options
fn run_models(config: &AppConfig, format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&config.ai_engine.models)?);
    } else {
        print_models(config, None);
    }
    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("Comparator v1.0.0 Status");
    println!("========================");

    let key_env = &config.ai_engine.api_key_env;
    let Some(api_key) = config.api_key() else {
        println!("API key: {} not set. AI features disabled.", key_env);
        return Ok(());
    };
    println!("API key: configured ({})", key_env);

    let client = GeminiClient::new(&config.ai_engine.url, Duration::from_secs(config.ai_engine.timeout_secs))?;
    match client.health_check(&api_key).await {
        Ok(()) => println!("Gemini API: Reachable"),
        Err(e) => println!("Gemini API: Error - {}", e),
    }

    match client.list_models(&api_key).await {
        Ok(models) => {
            println!("\nRemote models supporting generateContent:");
            for m in &models {
                let marker = if config.ai_engine.models.contains(m) { "✓" } else { " " };
                println!("  {} {}", marker, m);
            }
        }
        Err(e) => println!("  Error listing models: {}", e),
    }

    println!("\nConfiguration:");
    println!("  Default model: {}", config.ai_engine.default_model);
    println!("  Temp images: {}", config.extraction.temp_dir);

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Endpoint: {}", config.ai_engine.url);
            println!("  Default model: {}", config.ai_engine.default_model);
            println!("  Models: {}", config.ai_engine.models.len());
        }
    }

    Ok(())
}

/// Print the tables in a saved response
fn run_tables(file: &Path, format: &str) -> Result<()> {
    let text = if file == Path::new("-") {
        std::io::read_to_string(std::io::stdin())?
    } else if file.exists() {
        std::fs::read_to_string(file)?
    } else {
        return Err(ComparatorError::Config(format!("File not found: {}", file.display())));
    };

    let tables = parse_tables(&text);
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }

    if tables.is_empty() {
        println!("No tables found.");
    }
    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", render_table(table));
    }
    Ok(())
}
