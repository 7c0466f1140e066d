//! Bucket allocation.
//!
//! A bucket is the allocatable view of one credit entry. Debits draw from
//! buckets carried-over first, then oldest first; the remaining amount of a
//! bucket is always derived by replaying the debits attributed to it.

pub mod allocator;
pub mod types;

#[cfg(test)]
mod allocator_props;

pub use allocator::BucketAllocator;
pub use types::{Attribution, Bucket, OVERDRAFT_NOTE};
