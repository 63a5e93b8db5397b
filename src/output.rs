//! JSON-lines output for command results.

use serde::Serialize;

use zipper_core::result::AppResult;

/// Print one item as a single JSON line on stdout
pub fn print_line<T: Serialize>(item: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string(item)?);
    Ok(())
}

/// Print every item, one JSON line each
pub fn print_lines<T: Serialize>(items: &[T]) -> AppResult<()> {
    for item in items {
        print_line(item)?;
    }
    Ok(())
}
