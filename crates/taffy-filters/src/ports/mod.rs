//! Ports Layer
//!
//! Traits shared by every filter structure. The filters take pre-hashed
//! values and do no I/O, so there are no driven ports.

pub mod inbound;

pub use inbound::{InsertableFilter, MembershipFilter};
