//! assetpipe - front-end asset build pipeline

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = assetpipe::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
