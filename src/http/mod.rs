//! HTTP surface of the room server

pub mod routes;

pub use routes::build_router;
