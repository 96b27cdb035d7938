//! Kiln CLI - build graph generator
//!
//! Entry point for the kiln command-line application.

use kiln::cli::output::display_error;
use kiln::cli::Cli;

fn main() {
    let cli = Cli::parse_args();
    cli.output_config().init_tracing();

    if let Err(e) = cli.run() {
        display_error(&e);
        std::process::exit(1);
    }
}
