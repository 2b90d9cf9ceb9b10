//! Data model for the clinical genomics portal ETL.
//!
//! Descriptors, manifest entries, the error taxonomy, the per-run report,
//! and MRN redaction for diagnostics. Frame manipulation lives in
//! `portal-core` and `portal-output`.

pub mod descriptor;
pub mod error;
pub mod manifest;
pub mod redact;
pub mod report;

pub use descriptor::{ColumnMetadata, Datatype, Descriptor, Dest, RunLevel, RunMode};
pub use error::{PortalError, Result};
pub use manifest::{Manifest, ManifestEntry};
pub use redact::{REDACTED_VALUE, log_data_enabled, redact_value, set_log_data};
pub use report::{DescriptorOutcome, RunReport, WarningGroup, WarningKind};

/// Width of the portal patient identifier prefix within a sample identifier
/// (`S-#######-T##`: the first nine characters name the patient).
pub const PATIENT_ID_PREFIX_LEN: usize = 9;

/// Marker distinguishing tumor samples inside a sample identifier.
pub const TUMOR_SAMPLE_MARKER: char = 'T';

/// Default zero-pad width for medical record numbers.
pub const MRN_WIDTH: usize = 8;
