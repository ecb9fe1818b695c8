//! JSON output for CLI commands

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

/// Write a pretty-printed JSON document to stdout
pub fn write_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write a fatal error to stderr
pub fn write_error(code: &str, message: &str) {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    eprintln!("{}", response);
}
