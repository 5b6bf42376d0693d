pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pidloga",
    about = "Pidloga operator CLI",
    long_about = "Apply migrations, seed the demo catalog, inspect configuration and render stored invoices.",
    after_help = "Examples:\n  pidloga migrate\n  pidloga seed\n  pidloga config\n  pidloga invoice 4/03/2024 --out invoice.pdf"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo flooring catalog; safe to run repeatedly")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Render the invoice of a stored order to a file")]
    Invoice {
        #[arg(help = "Order number as shown to customers, e.g. 4/03/2024")]
        order_number: String,
        #[arg(long, help = "Output path; defaults to the invoice file name in the current directory")]
        out: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Invoice { order_number, out } => {
            commands::invoice::run(&order_number, out.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
