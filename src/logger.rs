use chrono::{DateTime, SecondsFormat, Utc};
use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::config::Config;

static RELAY_LOGGER: Lazy<RelayLogger> = Lazy::new(RelayLogger::new);

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

/// Installs the global logger. Calling it again only swaps the configuration.
pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let level = config.min_level;
    RELAY_LOGGER.update_config(config);

    // set_logger only fails when a logger is already installed
    if log::set_logger(&*RELAY_LOGGER).is_err() && !RELAY_LOGGER.is_installed() {
        return Err("Failed to set logger: another logger is installed".to_string());
    }
    RELAY_LOGGER.mark_installed();

    log::set_max_level(level);
    Ok(())
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Trace => Color::Cyan,
        Level::Debug => Color::Blue,
        Level::Info => Color::Green,
        Level::Warn => Color::Yellow,
        Level::Error => Color::Red,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl LogEntry {
    fn from_record(record: &Record) -> Self {
        Self {
            timestamp: Utc::now(),
            level: record.level().as_str().to_string(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            file: record.file().map(str::to_string),
            line: record.line(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LevelFilter,
    pub show_colors: bool,
    pub show_target: bool,
    pub show_file_location: bool,
    pub output_json: bool,
    pub custom_prefix: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LevelFilter::Info,
            show_colors: true,
            show_target: true,
            show_file_location: false,
            output_json: false,
            custom_prefix: None,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.custom_prefix = Some(prefix.into());
        self
    }

    pub fn production() -> Self {
        Self {
            min_level: LevelFilter::Info,
            show_colors: false,
            output_json: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LevelFilter::Debug,
            show_colors: true,
            show_file_location: true,
            ..Default::default()
        }
    }

    /// `LOG_FORMAT=json` selects the production preset.
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => Self::production(),
            _ => Self::development(),
        }
    }
}

pub struct RelayLogger {
    config: RwLock<LoggerConfig>,
    installed: AtomicBool,
}

impl RelayLogger {
    fn new() -> Self {
        Self {
            config: RwLock::new(LoggerConfig::default()),
            installed: AtomicBool::new(false),
        }
    }

    fn update_config(&self, new_config: LoggerConfig) {
        if let Ok(mut config) = self.config.write() {
            *config = new_config;
        }
    }

    fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    fn mark_installed(&self) {
        self.installed.store(true, Ordering::SeqCst);
    }

    fn format_console(&self, entry: &LogEntry, level: Level, config: &LoggerConfig) -> String {
        let mut output = String::new();

        if let Some(prefix) = &config.custom_prefix {
            output.push_str(&format!("[{}] ", prefix));
        }

        let timestamp = entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let level_str = format!("{:<5}", entry.level);
        if config.show_colors {
            output.push_str(&format!(
                "{} [{}] ",
                timestamp.bright_black(),
                level_str.color(level_color(level)).bold()
            ));
        } else {
            output.push_str(&format!("{} [{}] ", timestamp, level_str));
        }

        if config.show_target {
            if config.show_colors {
                output.push_str(&format!("{}: ", entry.target.bright_blue()));
            } else {
                output.push_str(&format!("{}: ", entry.target));
            }
        }

        output.push_str(&entry.message);

        if config.show_file_location {
            if let (Some(file), Some(line)) = (&entry.file, entry.line) {
                let location = format!(" ({}:{})", file, line);
                if config.show_colors {
                    output.push_str(&location.bright_black().to_string());
                } else {
                    output.push_str(&location);
                }
            }
        }

        output
    }
}

impl log::Log for RelayLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.config
            .read()
            .map(|config| metadata.level() <= config.min_level)
            .unwrap_or(true)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry::from_record(record);

        if let Ok(config) = self.config.read() {
            let line = if config.output_json {
                serde_json::to_string(&entry).unwrap_or_default()
            } else {
                self.format_console(&entry, record.level(), &config)
            };

            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let _ = writeln!(handle, "{}", line);
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Logs how long a scope took when dropped.
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::info!("{} finished in {}ms", self.name, self.elapsed().as_millis());
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

pub fn log_startup_info(app_name: &str, version: &str, config: &Config) {
    log::info!("🚀 Starting {} v{}", app_name, version);
    log::info!("🌐 Listening on http://{}:{}", config.host, config.port);
}

pub fn log_config_info(config: &Config) {
    log::info!("⚙️  Configuration loaded:");
    log::info!("   Gateway prefix: {}", config.gateway_path_prefix);
    log::info!("   Upload limit: {} bytes", config.max_upload_bytes);
    log::info!(
        "   Resize bounds: {}x{}",
        config.resize.max_width,
        config.resize.max_height
    );
    log::info!("   Generation limit: {}", config.generation_limit);
    log::info!(
        "   Gemini API key: {}",
        if config.gemini.api_key.is_some() { "✅" } else { "❌" }
    );
    log::info!(
        "   Gemini timeout: {}s (deadline {}s, {} retries)",
        config.gemini.timeout.as_secs(),
        config.gemini.deadline.as_secs(),
        config.gemini.max_retries
    );
    match (&config.github.owner, &config.github.repo) {
        (Some(owner), Some(repo)) => log::info!("   GitHub repo: {}/{}", owner, repo),
        _ => log::info!("   GitHub repo: ❌ (stars fall back to 0)"),
    }
}
