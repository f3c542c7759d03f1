mod routes;
mod server;

pub mod app;
pub mod backend;
pub mod camera;
pub mod config;
pub mod enrollment;
pub mod reconcile;
pub mod report;
pub mod sampler;
pub mod telemetry;

pub use app::start_app;
