pub mod commands;
pub mod logging;

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::{CommandResult, EXIT_INPUT};

#[derive(Debug, Parser)]
#[command(
    name = "fairquote",
    about = "FairQuote trade-fair order CLI",
    long_about = "Price jewelry orders, inspect catalog lookups, check EU VAT numbers and ask the order assistant.",
    after_help = "Examples:\n  fairquote quote order.json\n  fairquote resolve \"cuty classic\" --carat 0.20ct\n  fairquote vat DE123456789\n  pbpaste | fairquote extract"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Price an order file (array of lines or {\"lines\": [...]})")]
    Quote { order: PathBuf },
    #[command(about = "Extract and reconcile an assistant reply read from stdin, offline")]
    Extract,
    #[command(about = "Resolve free text to a catalog collection and optional carat tier")]
    Resolve {
        product: String,
        #[arg(long, help = "Carat text to resolve within the collection")]
        carat: Option<String>,
    },
    #[command(about = "Validate an EU VAT number against the VIES registry")]
    Vat { number: String },
    #[command(about = "Run one order-assistant turn against the configured model")]
    Ask {
        text: String,
        #[arg(long, help = "Current order file the assistant may amend")]
        order: Option<PathBuf>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init_from_config();

    let result = match cli.command {
        Command::Quote { order } => commands::quote::run(&order),
        Command::Extract => match read_stdin() {
            Ok(raw) => commands::extract::run(&raw),
            Err(error) => CommandResult::failure(
                "extract",
                "input",
                format!("could not read stdin: {error}"),
                EXIT_INPUT,
            ),
        },
        Command::Resolve { product, carat } => commands::resolve::run(&product, carat.as_deref()),
        Command::Vat { number } => commands::vat::run(&number),
        Command::Ask { text, order } => commands::ask::run(&text, order.as_deref()),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn read_stdin() -> io::Result<String> {
    let mut raw = String::new();
    io::stdin().read_to_string(&mut raw)?;
    Ok(raw)
}
