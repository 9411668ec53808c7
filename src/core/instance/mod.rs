pub mod manager;
pub mod model;

pub use manager::InstanceManager;
pub use model::{slugify, InstancePaths, InstanceRecord, ModFile};
