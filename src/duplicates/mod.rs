//! Duplicate detection: size bucketing, content hashing, group assembly.

pub mod grouper;
pub mod groups;

pub use grouper::{group_duplicates, GrouperOptions, GrouperStats};
pub use groups::{group_by_size, DuplicateGroup, SizeBucketStats};
