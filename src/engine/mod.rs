//! Engine: converter, naming, progress, single-file mode and the CLI.

pub mod arg_parser;
pub mod cli;
pub mod converter;
pub mod naming;
pub mod progress;
pub mod single;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use converter::{BalloonRunner, Converter, validate_args};
pub use naming::{construct_output_path, is_collection, is_supported_input, output_extension};
pub use progress::{BarProgress, ProgressSink, estimate_remaining, format_remaining};
pub use single::{convert_file, convert_files};
