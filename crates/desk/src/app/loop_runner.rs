use std::process::ExitCode;

use ark::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::workbench;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let result = run_app(app.config, |world| {
        let bench = workbench::build(world)?;
        info!(
            entity_count = world.entity_count(),
            motion = %bench.motion,
            tray = %bench.tray,
            balls = bench.balls.len(),
            buttons = bench.buttons().len(),
            motion_enabled = bench.law.get(),
            "workbench_ready"
        );
        Ok(())
    });
    if let Err(err) = result {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
