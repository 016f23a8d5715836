use picpoll::config::Config;
use picpoll::runtime::init_logging;
use picpoll::start_server;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    init_logging();

    let config = match Config::load() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = ?e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = start_server(config).await {
        tracing::error!(error = ?e, "Server error");
        std::process::exit(1);
    }
}
