// Domain layer - Core models with no I/O
pub mod battery;
pub mod bucket;
pub mod decision;
pub mod telemetry;
