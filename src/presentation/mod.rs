// Presentation layer - HTTP surface
pub mod handlers;
pub mod status_server;
