//! Business logic services (use cases).
//!
//! Services orchestrate repository calls and lifecycle rules. They depend on
//! traits (ports) -- never on concrete infrastructure implementations.

pub mod draft;
pub mod lifecycle;
pub mod maintenance;
pub mod notifier;
pub mod sync;
pub mod validation;
