mod cli;
mod config;
mod filter;
mod init;
mod logging;
mod output;
mod prompts;
mod redact;
mod user;
mod window;

use crate::cli::{Args, Command};
use crate::config::Config;
use crate::filter::Streams;
use anyhow::Result;
use llm::create_provider;
use std::io::IsTerminal;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::setup_logging(args.verbose);

    if args.command == Some(Command::Init) {
        init::run_init()?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = Config::load();
    config.apply_args(&args);

    let streams = Streams {
        input: &mut tokio::io::stdin(),
        output: &mut tokio::io::stdout(),
        errors: &mut std::io::stderr(),
        input_is_tty: std::io::stdin().is_terminal(),
        output_is_tty: std::io::stdout().is_terminal(),
    };
    let code = filter::run(&args, &config, streams, |config| {
        create_provider(config.provider, config.endpoint(), config.api_key())
    })
    .await?;
    Ok(ExitCode::from(code))
}
