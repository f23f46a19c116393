use chrono::Local;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Receives every run log line, already timestamped
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Progress log of one run.
///
/// Lines go to the optional callback (the live console) and always to
/// `tracing`.
pub struct RunLogger {
    callback: Option<LogCallback>,
}

impl RunLogger {
    pub fn new(callback: Option<LogCallback>) -> Self {
        Self { callback }
    }

    pub fn silent() -> Self {
        Self { callback: None }
    }

    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);

        if let Some(callback) = &self.callback {
            let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
            callback(&line);
        }
    }
}

/// Install the global subscriber; `RUST_LOG` overrides the `info` default
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_lines_are_timestamped() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let logger = RunLogger::new(Some(Box::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
        })));

        logger.log("Scanning search page 1");

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with('['));
        assert_eq!(&lines[0][10..], " Scanning search page 1");
    }
}
