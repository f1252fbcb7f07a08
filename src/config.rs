use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone)]
pub struct Settings {
    pub ws_url: String,
    pub server_url: String,
    pub toast_ttl: Duration,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            toast_ttl: Duration::from_secs(5),
            log_file: None,
        }
    }
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();
    from_lookup(|key| env::var(key).ok())
}

fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Settings {
    let defaults = Settings::default();
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let ws_url = non_empty("WS_URL").unwrap_or(defaults.ws_url);
    let server_url = non_empty("SERVER_URL").unwrap_or(defaults.server_url);

    let toast_ttl = non_empty("TOAST_SECONDS")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(defaults.toast_ttl);

    let log_file = non_empty("LOG_FILE").map(PathBuf::from);

    Settings {
        ws_url,
        server_url,
        toast_ttl,
        log_file,
    }
}
