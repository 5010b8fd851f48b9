use std::path::Path;

use fairquote_core::cpq::pricing::calculate_quote;
use fairquote_core::domain::order::OrderLine;
use tracing::info;

use crate::commands::{read_order_file, CommandResult, EXIT_INPUT};

pub fn run(order_path: &Path) -> CommandResult {
    match read_order_file(order_path) {
        Ok(lines) => run_lines(&lines),
        Err(error) => CommandResult::failure("quote", "input", format!("{error:#}"), EXIT_INPUT),
    }
}

pub fn run_lines(lines: &[OrderLine]) -> CommandResult {
    let quote = calculate_quote(lines);
    info!(
        event_name = "cli.quote.calculated",
        lines = lines.len(),
        total = %quote.total,
        warnings = quote.warnings.len(),
        "quote calculated"
    );
    CommandResult::success_with_data("quote", quote.summary(), &quote)
}
