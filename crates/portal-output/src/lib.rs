//! Output assembly for the portal ETL: intermediate storage with run
//! manifest, ordered merge into the cohort template, portal header
//! construction, final artifact rendering, and data quality checks.

pub mod assemble;
pub mod header;
pub mod merge;
pub mod monitor;
pub mod store;

pub use assemble::{publish_artifact, render_artifact};
pub use header::{HEADER_ROWS, HeaderRow, build_tall_header, to_wide};
pub use merge::merge_intermediates;
pub use monitor::{all_null_columns, check_merged, check_timeline};
pub use store::{IntermediateStore, read_manifest, write_manifest};
