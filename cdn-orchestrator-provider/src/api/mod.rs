//! Typed endpoints over [`CdnClient`](crate::CdnClient).

mod domain;

pub use domain::{DOMAINS_PATH, MAX_PAGE_SIZE};
