//! docmodel CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. The response object
//! is already on stdout when an error comes back; the error is repeated on
//! stderr and the process exits non-zero.

use docmodel::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
