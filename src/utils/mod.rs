//! Shared utilities: IPv4 subnet helpers.

pub mod ip_utils;

pub use ip_utils::{interface_address, mask_to_prefix, subnet_of, wildcard_to_prefix};
