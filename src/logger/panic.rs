//! Panic reporting
//!
//! A panic escaping the runtime is reported like any other fatal fault: one
//! FATAL LOG line on stdout, secrets masked.

use super::formatter::RedactingFormatter;

/// Serialize `message` as a FATAL LOG protocol line
pub fn fatal_line(formatter: &RedactingFormatter, message: &str) -> serde_json::Result<String> {
    serde_json::to_string(&formatter.fatal(message))
}

/// Replace the process panic hook with one that emits a FATAL LOG line.
///
/// Signals are left alone; SIGINT still terminates the process without output.
pub fn install_panic_hook(formatter: RedactingFormatter) {
    std::panic::set_hook(Box::new(move |info| {
        match fatal_line(&formatter, &info.to_string()) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Could not report panic: {e}"),
        }
    }));
}
