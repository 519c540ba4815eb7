use dotenvy::dotenv;
use log::info;
use umeme_payment_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    handle_command_line_args();
    let config = ServerConfig::from_env_or_default();

    info!("🚀️ Starting payment gateway on {}:{}", config.host, config.port);
    if let Err(e) = run_server(config).await {
        eprintln!("Server exited with an error: {e}");
        std::process::exit(1);
    }
    info!("🚀️ Server shut down cleanly. Bye!");
}
