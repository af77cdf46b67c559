// The core module contains all business logic.
// Each feature gets its own submodule; remote systems are reached through
// the traits declared here and implemented in infra.

pub mod ai;
pub mod auth;
pub mod extract;
pub mod forms;
pub mod notify;
pub mod pipeline;
pub mod quiz;
