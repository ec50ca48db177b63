use std::process::ExitCode;

use healthchat::cli::run_rebuild;

fn main() -> ExitCode {
    match run_rebuild(std::env::args().skip(1)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("[healthchat:rebuild] fatal: {err}");
            eprintln!("healthchat-rebuild: {err}");
            ExitCode::FAILURE
        }
    }
}
