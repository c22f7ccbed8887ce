//! Log lines read from stdin

use monitord_lib::collector::LogSink;
use monitord_lib::models::level;
use std::io::BufRead;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Trace recorded for lines that arrive on stdin
pub const STDIN_TRACE: &str = "stdin";

/// Level name for a raw log line, judged by its leading word
pub fn line_level(line: &str) -> &'static str {
    let head = line
        .trim_start()
        .trim_start_matches('[')
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match head.as_str() {
        "ERROR" | "FATAL" | "PANIC" => level::ERROR,
        "WARN" | "WARNING" => level::WARNING,
        _ => level::LOG,
    }
}

/// Feed every line of `reader` into `sink`; returns the number read
pub fn pump_lines(reader: impl BufRead, sink: &LogSink) -> usize {
    let mut count = 0;
    for line in reader.lines() {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => {
                sink.ingest(line.as_str(), STDIN_TRACE, line_level(&line));
                count += 1;
            }
            Err(e) => {
                warn!(error = %e, "Stopped reading log input");
                break;
            }
        }
    }
    count
}

/// Read stdin on a dedicated thread until EOF
pub fn spawn_stdin_reader(sink: LogSink) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            let count = pump_lines(stdin.lock(), &sink);
            debug!(lines = count, "Log input closed");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitord_lib::collector::CollectorBuffer;
    use std::io::Cursor;

    #[test]
    fn test_line_level() {
        assert_eq!(line_level("ERROR disk full"), level::ERROR);
        assert_eq!(line_level("[warn] slow frame"), level::WARNING);
        assert_eq!(line_level("  Warning: low memory"), level::WARNING);
        assert_eq!(line_level("started worker 3"), level::LOG);
        assert_eq!(line_level(""), level::LOG);
    }

    #[test]
    fn test_pump_lines_skips_blank_lines() {
        let mut buffer = CollectorBuffer::new();
        let sink = buffer.sink();
        sink.set_enabled(true);

        let input = Cursor::new("first\n\nERROR second\n");
        assert_eq!(pump_lines(input, &sink), 2);

        buffer.merge_tick();
        let logs = buffer.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].message, "ERROR second");
        assert_eq!(logs[1].level, level::ERROR);
        assert_eq!(logs[1].trace, STDIN_TRACE);
    }
}
