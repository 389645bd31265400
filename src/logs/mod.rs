//! Log merging and presentation.

pub mod merge;
pub mod prefix;

pub use merge::{LogMerger, MergeSource, WrappedLogLine};
pub use prefix::PrefixColors;
