//! orgtree - Organizational hierarchy builder and query tool

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = orgtree::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
