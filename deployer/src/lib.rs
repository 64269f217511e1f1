pub mod config;
pub mod constants;
pub mod errors;
pub mod linkage;
pub mod orchestrator;
pub mod remote;
pub mod task_definition;

// Re-export commonly used types
pub use config::{Action, ConfigSources, ServiceConfig};
pub use errors::DeployError;
pub use orchestrator::{Outcome, ServiceOrchestrator};
pub use task_definition::{Materializer, TaskSpecification};
