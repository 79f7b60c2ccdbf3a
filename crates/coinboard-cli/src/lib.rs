/*
[INPUT]:  Public API exports for coinboard-cli crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod board;
pub mod config;
pub mod interactive;
pub mod render;
pub mod view;

// Re-export main types for convenience
pub use board::{describe_error, export_csv, render_board};
pub use config::BoardConfig;
pub use interactive::run_interactive;
pub use view::{CoinFilter, ViewParams};
