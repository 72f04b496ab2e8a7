pub mod admission;
pub mod payload_limit;
pub mod rate_limit;

pub use admission::{admission_middleware, AdmittedClient};
pub use payload_limit::content_length_precheck;
pub use rate_limit::rate_limit_middleware;
