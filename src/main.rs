use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use neighbourhood_server::config::Config;
use neighbourhood_server::database::DatabaseInfo;
use neighbourhood_server::routes::create_routes;
use neighbourhood_server::state::AppState;
use neighbourhood_server::tasks::purge_sessions;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let db = DatabaseInfo::from_config(&config)
        .connect()
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    let state = AppState::new(db, config.clone());
    purge_sessions::spawn(state.sessions.clone(), config.session_purge_interval());

    let app = create_routes(state);

    let addr = config.bind_addr;
    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
