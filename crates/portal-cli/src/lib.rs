//! Library components of the portal ETL CLI: logging setup and the run
//! orchestration shared with the integration tests.

pub mod logging;
pub mod pipeline;
