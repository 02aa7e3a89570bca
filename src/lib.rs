// Library exports for the CLI and tests
pub mod atomic;
pub mod backup;
pub mod context;
pub mod elevate;
pub mod error;
pub mod identity;
pub mod logging;
pub mod orchestrator;
pub mod paths;
pub mod report;
pub mod stores;
