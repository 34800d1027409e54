// src/main.rs

use std::process::ExitCode;

use permwatch::{cli, logging, run};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("permwatch: cannot set up logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "permwatch stopped");
            ExitCode::FAILURE
        }
    }
}
