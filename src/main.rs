use e_market::{config::ServerConfig, server::run_server};
use log::*;

#[actix_web::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("🚦️ Cannot start the marketplace: {e}");
            eprintln!("🚦️ Cannot start the marketplace: {e}");
            std::process::exit(1);
        },
    };
    info!("🛒️ Starting e-market on {}:{} ({:?} storage)", config.host, config.port, config.storage);
    match run_server(config).await {
        Ok(_) => info!("Bye!"),
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            std::process::exit(1);
        },
    }
}
