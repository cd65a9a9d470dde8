use medcustody_lib::config::ServerConfig;

#[tokio::main]
async fn main() {
    medcustody_lib::init_tracing();

    if let Err(e) = medcustody_lib::run(ServerConfig::from_env()).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
