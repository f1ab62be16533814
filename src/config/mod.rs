use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8001/api";
const SOCKET_IO_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

#[derive(Debug, Clone)]
pub struct DashConfig {
    /// REST prefix, e.g. `http://localhost:8001/api`.
    pub api_base_url: String,
    /// Real-time channel URL. Derived from `api_base_url` unless overridden.
    pub ws_url: String,
    pub request_timeout_secs: u64,
    /// First reconnect delay of the push channel; doubles per failed attempt.
    pub reconnect_base_delay_ms: u64,

    // Polling
    pub trading_poll_interval_secs: u64,
    pub activity_limit: u32,
    pub signal_fetch_limit: u32,

    // Terminal front-end
    pub select_wallet: Option<String>,
    pub metrics_addr: Option<String>,
    /// Log destination while the full-screen view owns the terminal.
    pub log_file: Option<String>,
}

impl DashConfig {
    /// Config with defaults for everything except the API prefix.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        let ws_url = ws_url_for(&api_base_url);
        Self {
            api_base_url,
            ws_url,
            request_timeout_secs: 30,
            reconnect_base_delay_ms: 2000,
            trading_poll_interval_secs: 10,
            activity_limit: 50,
            signal_fetch_limit: 20,
            select_wallet: None,
            metrics_addr: None,
            log_file: None,
        }
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let api_base_url = env::var("DASH_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            anyhow::bail!("DASH_API_URL must be an http(s) URL, got {api_base_url}");
        }

        let mut config = Self::new(api_base_url);

        if let Ok(ws_url) = env::var("DASH_WS_URL") {
            config.ws_url = ws_url;
        }
        config.request_timeout_secs = env::var("DASH_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()?;
        config.reconnect_base_delay_ms = env::var("DASH_RECONNECT_BASE_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse::<u64>()
            .unwrap_or(2000)
            .max(1);
        config.trading_poll_interval_secs = env::var("DASH_TRADING_POLL_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse::<u64>()
            .unwrap_or(10)
            .max(1);
        config.activity_limit = env::var("DASH_ACTIVITY_LIMIT")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .unwrap_or(50);
        config.select_wallet = env::var("DASH_SELECT_WALLET")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        config.metrics_addr = env::var("DASH_METRICS_ADDR").ok();
        config.log_file = env::var("DASH_LOG_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(config)
    }
}

/// `http://host/api` -> `ws://host/api/socket.io/?EIO=4&transport=websocket`
pub fn ws_url_for(api_base_url: &str) -> String {
    let base = api_base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}{SOCKET_IO_PATH}")
}
