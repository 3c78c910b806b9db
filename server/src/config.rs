use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Server settings, parsed from the command line.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Maximum number of concurrent sessions
    #[arg(short, long, default_value = "32")]
    pub max_clients: usize,

    /// Game loop ticks per second
    #[arg(short, long, default_value = "10")]
    pub tick_rate: u32,

    /// Seconds of silence before a session is dropped
    #[arg(long, default_value = "60")]
    pub session_timeout: u64,

    /// Seconds between creature spawn passes
    #[arg(long, default_value = "15")]
    pub spawn_interval: u64,

    /// Upper bound of creatures per spawnable region
    #[arg(long, default_value = "4")]
    pub max_npcs_per_node: usize,

    /// SQLite database holding player records
    #[arg(long, default_value = "GameStates.db3")]
    pub database: PathBuf,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_rate.max(1) as f32)
    }

    /// Game loop ticks between creature spawn passes, at least one.
    pub fn ticks_per_spawn(&self) -> u64 {
        let ticks = self.spawn_interval().as_millis() / self.tick_duration().as_millis().max(1);
        (ticks as u64).max(1)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout)
    }

    pub fn spawn_interval(&self) -> Duration {
        Duration::from_secs(self.spawn_interval.max(1))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_clients: 32,
            tick_rate: 10,
            session_timeout: 60,
            spawn_interval: 15,
            max_npcs_per_node: 4,
            database: PathBuf::from("GameStates.db3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides() {
        let config = ServerConfig::parse_from([
            "server",
            "--port",
            "9000",
            "--tick-rate",
            "20",
            "--database",
            "/tmp/world.db3",
        ]);
        assert_eq!(config.address(), "127.0.0.1:9000");
        assert_eq!(config.tick_duration().as_millis(), 50);
        assert_eq!(config.database, PathBuf::from("/tmp/world.db3"));
        assert_eq!(config.max_npcs_per_node, 4);
    }

    #[test]
    fn test_zero_rates_are_clamped() {
        let config = ServerConfig {
            tick_rate: 0,
            spawn_interval: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.tick_duration(), Duration::from_secs(1));
        assert_eq!(config.spawn_interval(), Duration::from_secs(1));
        assert_eq!(config.ticks_per_spawn(), 1);
    }

    #[test]
    fn test_spawn_passes_follow_the_tick() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_duration().as_millis(), 100);
        assert_eq!(config.ticks_per_spawn(), 150);
    }
}
