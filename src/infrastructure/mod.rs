// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod heartbeat;
pub mod influx_cli;
pub mod influx_repository;
pub mod logging;
pub mod solcast;
pub mod sonnen;
pub mod tibber;
