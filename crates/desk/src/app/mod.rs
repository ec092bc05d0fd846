use std::process::ExitCode;

use tracing::error;

mod bootstrap;
mod loop_runner;
mod workbench;

pub(crate) fn run() -> ExitCode {
    match bootstrap::build_app() {
        Ok(app) => loop_runner::run(app),
        Err(err) => {
            error!(error = %err, "config_load_failed");
            ExitCode::FAILURE
        }
    }
}
