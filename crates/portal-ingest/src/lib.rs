//! Ingestion layer for the portal ETL: warehouse gateway, credentials,
//! descriptor YAML loading, templates, and tab-separated frame IO.

pub mod credentials;
pub mod descriptor_loader;
pub mod frame_utils;
pub mod template;
pub mod tsv;
pub mod warehouse;

pub use credentials::Credentials;
pub use descriptor_loader::{LoadedDescriptor, load_descriptor, load_descriptor_dir};
pub use frame_utils::{
    any_to_string, canonical_column_name, column_names, column_opt_strings, column_strings,
    string_column,
};
pub use template::{Template, detect_subject_column, load_template};
pub use tsv::{read_delimited, read_tsv, write_delimited};
pub use warehouse::{LocalWarehouse, TableInfo, Warehouse, WriteOptions};
