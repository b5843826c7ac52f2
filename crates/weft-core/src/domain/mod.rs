//! Domain model (ids, job status, requests, resolutions).

pub mod ids;
pub mod request;
pub mod resolution;
pub mod status;

pub use ids::JobId;
pub use request::JobRequest;
pub use resolution::Resolution;
pub use status::{JobState, Payload, Status};
