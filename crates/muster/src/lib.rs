//! Fair selection and role assignment engine for scheduled six-player raid
//! sign-ups: open a recruitment, collect applicants with role and content
//! preferences, then close it into a capacity-bounded roster with a
//! historical-fairness lottery and a best-effort role assignment.

pub mod config;
pub mod error;
pub mod recruit;
pub mod telemetry;
