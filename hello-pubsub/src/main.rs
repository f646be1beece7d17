use hello_pubsub::config::Config;
use hello_pubsub::{init_tracing, server, PubsubFunction, TracingSink, ENTRY_POINT};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    init_tracing("hello_pubsub=info", config.log_format);

    // bind to a TCP port and start a loop to continuously accept deliveries
    let listener = TcpListener::bind(config.listener).await?;
    info!(
        "Serving {ENTRY_POINT} on http://{}, undecodable messages: {:?}",
        config.listener, config.decode_policy
    );

    let function = Arc::new(PubsubFunction::new(TracingSink, config.decode_policy));
    server::serve(listener, function).await?;

    Ok(())
}
