pub mod http_gateway;
pub mod models;
pub mod order_repo;
