pub mod adapter;
pub mod schema;
pub mod store;

pub use adapter::{ActiveOrPair, OutcomeSource, VersionStore};
pub use store::Store;
