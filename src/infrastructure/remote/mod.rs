pub mod http_gateway;

pub use http_gateway::{HttpSessionGateway, classify_status, custom_action_key};
