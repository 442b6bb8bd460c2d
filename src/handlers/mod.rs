mod demo;
mod health;

pub use demo::{echo_env, echo_form, echo_json, fail, greet, trigger_panic};
pub use health::{HealthResponse, health_check};
