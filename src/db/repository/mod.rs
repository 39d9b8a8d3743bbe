//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table family. All public functions are re-exported here.

mod ambulance;
mod audit;
mod case_query;
mod district;
mod document;
mod enquiry;
mod escalation;
mod hospital;
mod user;

pub use ambulance::*;
pub use audit::*;
pub use case_query::*;
pub use district::*;
pub use document::*;
pub use enquiry::*;
pub use escalation::*;
pub use hospital::*;
pub use user::*;
