pub mod finding;
pub mod formatter;

pub use finding::{CommentRecord, FindingRecord, SummaryRecord};
pub use formatter::{CommentsOutput, JsonOutput, OutputFormatter};
