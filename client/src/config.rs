use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ClientConfig {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    pub server: String,

    /// Account to log in as
    #[arg(short = 'i', long, default_value = "1")]
    pub player_id: u64,

    /// Character name used when the account is created
    #[arg(short = 'n', long, default_value = "Avatar")]
    pub name: String,

    /// Milliseconds to wait for a response before re-sending
    #[arg(long, default_value = "500")]
    pub request_timeout_ms: u64,

    /// Re-sends before a request is given up
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Seconds between keep-alive heartbeats
    #[arg(long, default_value = "10")]
    pub heartbeat_secs: u64,

    /// File that receives every combat line
    #[arg(long, default_value = "combat.log")]
    pub combat_log: PathBuf,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:8080".to_string(),
            player_id: 1,
            name: "Avatar".to_string(),
            request_timeout_ms: 500,
            max_retries: 3,
            heartbeat_secs: 10,
            combat_log: PathBuf::from("combat.log"),
        }
    }
}
