use dotenvy::dotenv;
use sales_service::{build_server, build_service, create_pool, run_migrations, Config};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(std::io::Error::other)?;

    let pool = create_pool(&config.database_url, config.db_pool_size)
        .map_err(std::io::Error::other)?;
    run_migrations(&pool);

    let service = build_service(&config, pool).map_err(std::io::Error::other)?;

    log::info!("Starting sales service at http://{}:{}", config.host, config.port);
    log::info!("Customer service: {}", config.clients_service_url);
    log::info!("Inventory service: {}", config.products_service_url);

    build_server(service, &config.host, config.port)?.await
}
