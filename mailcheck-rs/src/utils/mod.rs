//! Utility modules
//!
//! - [`dns`]: DNS resolver abstraction (trust-dns backed, plus an in-memory mock)
//! - [`email`]: Email address validation and domain extraction

pub mod dns;
pub mod email;

pub use dns::{DnsError, DnsResolver, MockResolver, TrustDnsResolver};
pub use email::{extract_domain, split_email_list, validate_email};
