mod app;
mod cli;
mod db;
mod error;
mod http;
mod paths;

use std::process::ExitCode;

use clap::Parser;

use crate::error::EngineError;

fn main() -> ExitCode {
    env_logger::init();
    let cli = cli::Cli::parse();
    match app::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Grammar(_)) => 2,
        Some(EngineError::NoMatches(_)) | Some(EngineError::NoMatchesInRange(_)) => 3,
        Some(EngineError::NoProgress { .. }) => 4,
        Some(EngineError::NavigationExhausted(_)) => 5,
        Some(EngineError::RemoteConfig(_)) => 6,
        _ => 1,
    }
}
