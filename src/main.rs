//! # image-curator CLI
//!
//! Command-line interface for the staged image curation pipeline.
//!
//! ## Usage
//! ```bash
//! image-curator run data/original_raw --output data/final --config curate.yaml
//! image-curator run data/original_raw --config curate.yaml --output-format json --dry-run
//! ```

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
