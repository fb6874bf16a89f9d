//! Output module for the record stream and crawl reports
//!
//! This module handles:
//! - Writing validated records to the gzip NDJSON stream
//! - Reporting statistics from the index database
//! - Printing the end-of-run summary
//! - Writing per-seed exploration trees

mod sink;
pub mod stats;
mod tree_log;

pub use sink::{SinkError, SinkWriter, OUTPUT_FILE_NAME};
pub use stats::{load_statistics, print_statistics, print_summary, IndexStatistics};
pub use tree_log::{tree_file_name, write_tree_logs, ExplorationTree, TREE_LOG_DIR};
