pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cardbot",
    about = "Cardbot operator CLI",
    long_about = "Inspect configuration, run readiness checks, and exercise the assistant from the command line.",
    after_help = "Examples:\n  cardbot doctor --json\n  cardbot config\n  cardbot ask \"I want to pay my bill\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, knowledge base, and LLM credential readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one message through the assistant and print the response envelope")]
    Ask {
        #[arg(help = "Message text to send")]
        text: String,
        #[arg(long, default_value = "cli", help = "User id attached to the request")]
        user_id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Ask { text, user_id } => commands::ask::run(&user_id, &text),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
