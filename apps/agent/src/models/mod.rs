pub mod application;
pub mod job;

pub use application::{ApplicationResult, ApplicationRow, NewApplication};
pub use job::{job_fingerprint, JobRow, JobStatus, NewJob};
