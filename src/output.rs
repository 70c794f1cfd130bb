use std::io::{self, Write};

use crate::app::{ImportSummary, ProgressEvent, ProgressSink};

/// Plain progress lines on stdout for the operator's log.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_summary(summary: &ImportSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "Window: {}", summary.window)?;
        writeln!(
            stdout,
            "Request Time: {:.3}s",
            summary.request_time.as_secs_f64()
        )?;
        writeln!(
            stdout,
            "Fetched {} rows, {} valid, {} previous records removed, {} inserted",
            summary.total_rows,
            summary.valid_records,
            summary.outcome.deleted,
            summary.outcome.inserted
        )?;
        writeln!(stdout, "Total Time: {:.3}s", summary.total_time.as_secs_f64())
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => println!("{} ({:.3}s)", event.message, elapsed.as_secs_f64()),
            None => println!("{}", event.message),
        }
    }
}
