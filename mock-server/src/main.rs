use mock_server::MockConfig;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let mut config = MockConfig::default();
    if let Ok(prefix) = std::env::var("URL_PREFIX") {
        config.url_prefix = prefix;
    }
    if let Ok(cookie) = std::env::var("SESSION_COOKIE") {
        match cookie.split_once('=') {
            Some((name, value)) => config.session_cookie = Some((name.to_string(), value.to_string())),
            None => tracing::warn!("ignoring SESSION_COOKIE without '=': {cookie:?}"),
        }
    }

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr} under {}", config.url_prefix);
    mock_server::run(listener, config).await
}
