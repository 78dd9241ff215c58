use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use chrono::Local;

// Global log file path
static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);

// Echo warnings to stderr (CLI --verbose)
static ECHO_WARNINGS: AtomicBool = AtomicBool::new(false);

/// Initialize logger and create session log file under `<data_dir>/logs`
pub fn init_logger(data_dir: &Path) -> std::io::Result<PathBuf> {
    let log_dir = data_dir.join("logs");

    std::fs::create_dir_all(&log_dir)?;

    let session_file = log_dir.join(format!(
        "session-{}.log",
        Local::now().format("%Y%m%d-%H%M%S")
    ));

    if let Ok(mut log_path) = LOG_FILE.lock() {
        *log_path = Some(session_file.clone());
    }

    Ok(session_file)
}

/// Also print warnings to stderr
pub fn set_echo_warnings(enabled: bool) {
    ECHO_WARNINGS.store(enabled, Ordering::Relaxed);
}

/// Log a message to the session file
pub fn log_to_file(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let log_line = format!("[{}] {}\n", timestamp, message);

    let Ok(guard) = LOG_FILE.lock() else {
        return;
    };
    if let Some(path) = guard.as_ref() {
        let _ = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(log_line.as_bytes()));
    }
}

/// Diagnostic warning: always logged, echoed when verbose
pub fn warn(message: &str) {
    log_to_file(&format!("WARN {}", message));
    if ECHO_WARNINGS.load(Ordering::Relaxed) {
        eprintln!("warning: {}", message);
    }
}
