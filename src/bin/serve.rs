//! Entry point for the optional HTTP/WebSocket simulation server
//! (spec §6 external interfaces). Set `BIND_ADDR` to override the default
//! `127.0.0.1:8080`.

use packetnet::server::Server;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .ok();
    Server::run().await
}
