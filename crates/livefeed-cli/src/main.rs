#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use livefeed_core::config;
use output::{OutputMode, render_error, resolve_output_mode};
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "livefeed: live-updating event feed with key-event navigation",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides `--json`, `FORMAT` and the user config).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Initialize a feed",
        long_about = "Create .livefeed/ with a config file and an empty record store.",
        after_help = "EXAMPLES:\n    # Initialize a feed in the current directory\n    livefeed init\n\n    # Serve post 42 with ten entries per page\n    livefeed init --post-id 42 --page-size 10"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Write",
        about = "Publish a new entry",
        long_about = "Append a new entry to the feed.",
        after_help = "EXAMPLES:\n    # Publish an entry now\n    livefeed add \"<p>Kick-off!</p>\"\n\n    # Publish a key event at a given time\n    livefeed add \"<p>Goal!</p>\" --key-event --at 2024-05-01T19:32:00Z"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Write",
        about = "Edit an entry",
        long_about = "Append an update record that replaces the content of a live entry.",
        after_help = "EXAMPLES:\n    # Fix a typo\n    livefeed edit 12 \"<p>Goal! 1-0</p>\"\n\n    # Edit and clear the key-event flag\n    livefeed edit 12 \"<p>Offside.</p>\" --key-event false"
    )]
    Edit(cmd::edit::EditArgs),

    #[command(
        next_help_heading = "Write",
        about = "Delete an entry",
        long_about = "Append a delete record for a live entry.",
        after_help = "EXAMPLES:\n    livefeed delete 12"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Write",
        about = "Flag an entry as a key event",
        long_about = "Set or clear the key-event flag of a live entry, keeping its content.",
        after_help = "EXAMPLES:\n    # Flag\n    livefeed key 12\n\n    # Unflag\n    livefeed key 12 --off"
    )]
    Key(cmd::key::KeyArgs),

    #[command(
        next_help_heading = "Read",
        about = "List entries",
        long_about = "List the current feed (edits applied, deletions removed) or the raw record log.",
        after_help = "EXAMPLES:\n    # Current feed, newest first\n    livefeed list\n\n    # Every record, oldest first\n    livefeed list --raw --order asc\n\n    # Emit machine-readable output\n    livefeed list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        name = "key-events",
        next_help_heading = "Read",
        about = "List key events",
        long_about = "List entries currently flagged as key events, newest first.",
        after_help = "EXAMPLES:\n    livefeed key-events\n    livefeed key-events --limit 5 --json"
    )]
    KeyEvents(cmd::key_events::KeyEventsArgs),

    #[command(
        next_help_heading = "Read",
        about = "List entries in a time range",
        long_about = "List records with start <= timestamp <= end, oldest first; edits whose original is in range are folded into it.",
        after_help = "EXAMPLES:\n    livefeed between 1700000000 1700003600"
    )]
    Between(cmd::between::BetweenArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the most recent record",
        long_about = "Show the most recent record of any kind, including updates and deletes."
    )]
    Latest,

    #[command(
        next_help_heading = "Serve",
        about = "Answer one endpoint request",
        long_about = "Resolve a lazyload or entry path and print the JSON response body.",
        after_help = "EXAMPLES:\n    # First page\n    livefeed get 'lazyload/?index=0'\n\n    # Entries older than a timestamp\n    livefeed get 'lazyload/1700000000/0/?index=0'\n\n    # One entry with its neighbours' timestamps\n    livefeed get 'entry/12?index=1'"
    )]
    Get(cmd::get::GetArgs),

    #[command(
        next_help_heading = "Serve",
        about = "Run the windowed loader against the feed",
        long_about = "Drive the client-side loader in-process: first page, optional key-event jump, then load-more clicks.",
        after_help = "EXAMPLES:\n    # First page only\n    livefeed simulate\n\n    # Jump to key event 12, then load everything\n    livefeed simulate --key-event 12 --all"
    )]
    Simulate(cmd::simulate::SimulateArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LIVEFEED_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "livefeed=debug,info"
        } else {
            "livefeed=info,warn"
        })
    });

    let format = env::var("LIVEFEED_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(command: Commands, output: OutputMode, project_root: &std::path::Path) -> anyhow::Result<()> {
    match command {
        Commands::Init(args) => cmd::init::run_init(&args, output, project_root),
        Commands::Add(args) => cmd::add::run_add(&args, output, project_root),
        Commands::Edit(args) => cmd::edit::run_edit(&args, output, project_root),
        Commands::Delete(args) => cmd::delete::run_delete(&args, output, project_root),
        Commands::Key(args) => cmd::key::run_key(&args, output, project_root),
        Commands::List(args) => cmd::list::run_list(&args, output, project_root),
        Commands::KeyEvents(args) => {
            cmd::key_events::run_key_events(&args, output, project_root)
        }
        Commands::Between(args) => cmd::between::run_between(&args, output, project_root),
        Commands::Latest => cmd::latest::run_latest(output, project_root),
        Commands::Get(args) => cmd::get::run_get(&args, project_root),
        Commands::Simulate(args) => cmd::simulate::run_simulate(&args, output, project_root),
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let cwd = env::current_dir()?;
    let config_root = cmd::find_project_root(&cwd).unwrap_or_else(|| cwd.clone());
    let resolved = config::resolve_config(&config_root, cli.json)
        .map_or_else(|_| "text".to_string(), |effective| effective.resolved_output);
    let output = resolve_output_mode(cli.format, &resolved);

    if let Err(err) = run(cli.command, output, &cwd) {
        tracing::debug!(error = ?err, "command failed");
        if !cli.quiet {
            render_error(output, &cmd::cli_error(&err))?;
        }
        std::process::exit(1);
    }
    Ok(())
}
