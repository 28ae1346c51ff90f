// Application layer - Use cases and the ports they depend on
pub mod actuation_loop;
pub mod bucket_admin;
pub mod collector;
pub mod confirm_loop;
pub mod decision_loop;
pub mod provisioning_service;
pub mod telemetry_repository;
