use std::net::SocketAddr;

use archihub_server::{AppState, ServerConfig, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let app = build_router(AppState::bootstrap(config));

    tracing::info!("archihub listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
