use chrono::Utc;
use slog::Drain;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

/// Logger writing to the terminal, tagged with `name`. Handy for `MemoryReplSetConfig::info_logger`
/// while debugging a test.
pub fn create_stdout_logger(name: &str) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!("ReplSet" => name.to_string()))
}

/// Logger writing to `{directory}/{name}_{timestamp}.log`. The directory is created if missing.
pub fn create_file_logger(directory: &Path, name: &str) -> io::Result<slog::Logger> {
    fs::create_dir_all(directory)?;

    let now = Utc::now().format("%Y-%m-%dT%H-%M-%SZ");
    let log_path = directory.join(format!("{}_{}.log", name, now));
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let decorator = slog_term::PlainDecorator::new(file);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Ok(slog::Logger::root(drain, slog::o!("ReplSet" => name.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logger_creates_timestamped_file() {
        let directory = std::env::temp_dir().join(format!("memory-replset-log-{}", std::process::id()));

        let logger = create_file_logger(&directory, "unit").unwrap();
        slog::info!(logger, "hello");
        drop(logger);

        let names: Vec<String> = fs::read_dir(&directory)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("unit_"));
        assert!(names[0].ends_with(".log"));

        fs::remove_dir_all(&directory).unwrap();
    }
}
