use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crossterm::tty::IsTty;
use tracing_subscriber::EnvFilter;
use yansi::Paint;

use tabx::format::Mode;
use tabx::parser;
use tabx::pipeline;
use tabx::settings::{self, Settings};

#[derive(Parser)]
#[command(name = "tabx")]
#[command(
    about = "Slice, group, sort, compute over and re-render tabular text, JSON and YAML read from stdin."
)]
struct Cli {
    /// Settings file with default tokens and aliases
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Delimited text or CSV
    Csv(Tokens),
    /// A JSON document or array of documents
    Jp(Tokens),
    /// One JSON document per line
    Jpl(Tokens),
    /// A YAML document stream
    Yp(Tokens),
}

#[derive(clap::Args)]
struct Tokens {
    /// Pipeline tokens, e.g. row[1:] col[0,2] sort[1]:desc out..table
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    tokens: Vec<String>,
}

impl Command {
    fn split(self) -> (Mode, Vec<String>) {
        match self {
            Command::Csv(t) => (Mode::Csv, t.tokens),
            Command::Jp(t) => (Mode::Json, t.tokens),
            Command::Jpl(t) => (Mode::JsonLines, t.tokens),
            Command::Yp(t) => (Mode::Yaml, t.tokens),
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TABX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let settings = match cli.settings.or_else(settings::default_path) {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };

    let (mode, tokens) = cli.command.split();
    let tokens = settings.expand(mode, &tokens);
    let config = parser::parse_tokens(mode, &tokens).context("invalid arguments")?;

    let stdin = io::stdin();
    if stdin.is_tty() {
        bail!("there is no data to read from STDIN");
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    pipeline::run(&config, stdin.lock(), &mut out)?;
    out.flush().context("failed to write output")?;
    Ok(())
}

fn main() {
    init_logging();
    if !io::stderr().is_tty() {
        yansi::disable();
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
