//! Core transforms of the portal ETL: identifier/date normalization,
//! anchor-date resolution, per-descriptor summary processing, and timeline
//! deidentification.

pub mod anchor;
pub mod normalize;
pub mod summary;
pub mod timeline;

pub use anchor::{AnchorRecord, AnchorTable, resolve_anchor_dates};
pub use normalize::{parse_date, zero_pad, zero_pad_mrn};
pub use summary::{SummaryRunContext, process_descriptor};
pub use timeline::{TIMELINE_LEADING_COLUMNS, deidentify_timeline, follow_up_caps};
