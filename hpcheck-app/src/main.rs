mod app;
mod cli;
mod logging;
mod settings;

use app::App;
use clap::Parser;
use cli::{Cli, Command};
use settings::AppSettings;
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

/// Exit code 0 on pass, 1 on fail.
fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Validate { config } => {
            let settings = AppSettings::load(config.as_deref())?;
            logging::init(cli.log_level.as_deref().unwrap_or(&settings.log_level))?;

            let check = settings.check_config()?;
            println!("{}", serde_json::to_string_pretty(&check)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => {
            let settings = AppSettings::load(args.config.as_deref())?.apply_args(&args);
            logging::init(cli.log_level.as_deref().unwrap_or(&settings.log_level))?;

            let mut app = App::new(&settings, io::stdin().lock(), io::stdout().lock())?;
            let outcome = app.run()?;
            Ok(if outcome.did_pass {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
