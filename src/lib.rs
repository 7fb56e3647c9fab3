pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::order_service::OrderService;
use errors::AppError;
use infrastructure::http_gateway::HttpGateway;
use infrastructure::order_repo::DieselOrderRepository;

pub use config::Config;
pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// The order service as deployed: Postgres-backed, talking HTTP to the
/// customer and inventory services.
pub type SalesService = OrderService<DieselOrderRepository, HttpGateway>;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::sales::create_sale,
        handlers::sales::list_sales,
        handlers::sales::get_sale,
        handlers::sales::get_sales_by_client,
        handlers::sales::delete_sale,
    ),
    components(schemas(
        handlers::sales::CreateSaleRequest,
        handlers::sales::CreateSaleLineRequest,
        handlers::sales::SaleResponse,
        handlers::sales::SaleLineResponse,
    )),
    tags((name = "sales", description = "Sales orchestrated across the customer and inventory services"))
)]
pub struct ApiDoc;

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

/// Wires the repository and gateway described by `config` into a service.
pub fn build_service(config: &Config, pool: DbPool) -> reqwest::Result<SalesService> {
    let gateway = HttpGateway::new(
        &config.clients_service_url,
        &config.products_service_url,
        config.gateway_timeout,
    )?;
    Ok(OrderService::new(DieselOrderRepository::new(pool), gateway))
}

/// Malformed JSON bodies answer with the failure envelope.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into())
}

/// Path segments that do not parse as their target type, such as a
/// non-numeric id, answer with the failure envelope.
fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into())
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    service: SalesService,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let service = web::Data::new(service);
    let openapi = ApiDoc::openapi();

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(json_config())
            .app_data(path_config())
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .service(
                        web::scope("/sales")
                            .route("", web::post().to(handlers::sales::create_sale))
                            .route("", web::get().to(handlers::sales::list_sales))
                            .route(
                                "/client/{id}",
                                web::get().to(handlers::sales::get_sales_by_client),
                            )
                            .route("/{id}", web::get().to(handlers::sales::get_sale))
                            .route("/{id}", web::delete().to(handlers::sales::delete_sale)),
                    ),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}

#[cfg(test)]
mod tests {
    use actix_web::{test, HttpResponse};
    use serde_json::Value;

    use super::*;

    async fn by_id(path: web::Path<i32>) -> HttpResponse {
        HttpResponse::Ok().body(path.into_inner().to_string())
    }

    #[actix_web::test]
    async fn non_numeric_id_answers_with_failure_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(path_config())
                .route("/sales/{id}", web::get().to(by_id)),
        )
        .await;

        let req = test::TestRequest::get().uri("/sales/abc").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "InvalidRequest");
    }

    #[actix_web::test]
    async fn malformed_json_answers_with_failure_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(json_config())
                .route(
                    "/sales",
                    web::post().to(|_: web::Json<Value>| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/sales")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[::core::prelude::v1::test]
    fn openapi_document_lists_sales_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/api/health",
            "/api/sales",
            "/api/sales/{id}",
            "/api/sales/client/{id}",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing path {} in {:?}",
                expected,
                paths
            );
        }
    }
}
