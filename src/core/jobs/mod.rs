pub mod model;
pub mod store;

pub use model::{JobId, JobKind, JobRecord, JobStatus, JobUpdate};
pub use store::{JobHandle, JobStore};
