pub mod judges;
pub mod queues;
pub mod schema;
pub mod statistics;
pub mod store;

pub use queues::SubmissionOutcome;
pub use store::Store;
