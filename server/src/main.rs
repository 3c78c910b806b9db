use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use server::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::parse();

    info!("Starting server on {}", config.address());
    info!("Player store: {}", config.database.display());

    let store = Box::new(SqliteStore::open(&config.database)?);
    let mut server = Server::with_default_world(&config, store).await?;
    let control = server.control();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            let _ = control.send(server::network::ServerMessage::Shutdown);
        }
    });

    server.run().await?;

    Ok(())
}
