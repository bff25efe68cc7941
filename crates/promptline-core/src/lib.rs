pub mod activation;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod rollout;
pub mod state;
pub mod storage;

pub use errors::{Result, RolloutError};
pub use registry::{AbTestState, PromptRegistry};
