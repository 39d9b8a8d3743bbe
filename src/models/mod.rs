pub mod ambulance;
pub mod case_query;
pub mod directory;
pub mod enquiry;
pub mod enums;
pub mod escalation;
pub mod filters;
pub mod user;

pub use ambulance::*;
pub use case_query::*;
pub use directory::*;
pub use enquiry::*;
pub use escalation::*;
pub use filters::*;
pub use user::*;
