//! Enquiry lifecycle services.
//!
//! Every operation takes the caller as an [`Actor`] and a connection, applies
//! the role and visibility rules, and performs its writes in one transaction.

pub mod access;
pub mod enquiries;
pub mod error;
pub mod escalations;
pub mod identity;
pub mod intake;
pub mod lifecycle;
pub mod queries;

pub use access::Actor;
pub use error::WorkflowError;
