//! Run orchestration: wiring the gateway, anchor resolution, descriptor
//! processing, merge, header assembly, and publication into one pass.
//!
//! Stage order for a summary run is fixed: anchors are resolved once,
//! every descriptor is processed independently (failures downgrade to
//! per-descriptor report entries), then merge, header, quality gate, and
//! publication. Manifest order fixes the artifact's column order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info, info_span, warn};

use portal_core::anchor::{AnchorTable, resolve_anchor_dates};
use portal_core::summary::{SummaryRunContext, process_descriptor};
use portal_core::timeline::{deidentify_timeline, follow_up_caps};
use portal_ingest::credentials::Credentials;
use portal_ingest::descriptor_loader::load_descriptor_dir;
use portal_ingest::frame_utils::column_names;
use portal_ingest::template::load_template;
use portal_ingest::tsv::write_delimited;
use portal_ingest::warehouse::{LocalWarehouse, TableInfo, Warehouse, WriteOptions};
use portal_model::{RunLevel, RunMode, RunReport};
use portal_output::assemble::{publish_artifact, render_artifact};
use portal_output::header::build_tall_header;
use portal_output::merge::merge_intermediates;
use portal_output::monitor::{check_merged, check_timeline};
use portal_output::store::IntermediateStore;

/// Inputs of one summary run, already resolved from the command line.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub credentials: PathBuf,
    pub warehouse_root: PathBuf,
    pub descriptor_dir: PathBuf,
    pub anchor_table: String,
    pub template: PathBuf,
    pub level: RunLevel,
    pub mode: RunMode,
    pub cohort: String,
    pub volume_dir: PathBuf,
    pub output_dir: PathBuf,
    pub catalog: String,
    pub schema: String,
}

/// Inputs of one timeline run.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    pub credentials: PathBuf,
    pub warehouse_root: PathBuf,
    pub anchor_table: String,
    pub source_table: String,
    pub follow_up_table: Option<String>,
    pub template: Option<PathBuf>,
    pub cohort: String,
    pub artifact_name: String,
    pub volume_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// What a summary run produced, for the end-of-run summary table.
#[derive(Debug)]
pub struct SummaryRunResult {
    pub cohort: String,
    pub level: RunLevel,
    pub manifest_path: PathBuf,
    pub artifact_path: PathBuf,
    pub volume_path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    /// Reason publication was withheld, when the quality gate tripped.
    pub blocked: Option<String>,
    pub report: RunReport,
}

impl SummaryRunResult {
    /// True when the run must exit non-zero.
    pub fn has_errors(&self) -> bool {
        self.blocked.is_some()
    }
}

/// What a timeline run produced.
#[derive(Debug)]
pub struct TimelineRunResult {
    pub cohort: String,
    pub artifact_path: PathBuf,
    pub volume_path: PathBuf,
    pub rows: usize,
    /// Publication block reason, if the quality gate tripped.
    pub blocked: Option<String>,
    pub report: RunReport,
}

impl TimelineRunResult {
    pub fn has_errors(&self) -> bool {
        self.blocked.is_some()
    }
}

/// Query the anchor source table and resolve it to the anchor index.
pub fn load_anchor_table(
    warehouse: &dyn Warehouse,
    table: &str,
    report: &mut RunReport,
) -> Result<AnchorTable> {
    let sql = format!("SELECT MRN, DATE_TUMOR_SEQUENCING, SAMPLE_ID, DMP_ID FROM {table}");
    let frame = warehouse
        .query(&sql)
        .with_context(|| format!("query anchor table {table}"))?;
    let anchors = resolve_anchor_dates(&frame, report).context("resolve anchor dates")?;
    if anchors.is_empty() {
        bail!("anchor table {table} produced no usable anchor dates");
    }
    Ok(anchors)
}

/// Execute the full summary-assembly pipeline.
pub fn run_summary(config: &SummaryConfig) -> Result<SummaryRunResult> {
    let span = info_span!("summary_run", cohort = %config.cohort, level = %config.level);
    let _guard = span.enter();
    let start = Instant::now();
    let mut report = RunReport::new();

    let credentials = Credentials::load(&config.credentials).context("load credentials")?;
    let warehouse = LocalWarehouse::connect(&credentials, &config.warehouse_root)
        .context("connect warehouse")?;

    let template =
        load_template(&config.template, config.level).context("load cohort template")?;
    info!(
        subjects = template.data.height(),
        subject_column = %template.subject_column,
        "template loaded"
    );

    let anchors = load_anchor_table(&warehouse, &config.anchor_table, &mut report)?;
    info!(anchors = anchors.len(), "anchor index resolved");

    let descriptors =
        load_descriptor_dir(&config.descriptor_dir, &mut report).context("load descriptors")?;
    if descriptors.is_empty() {
        bail!(
            "no descriptor YAML files under {}",
            config.descriptor_dir.display()
        );
    }

    let mut store = IntermediateStore::new(&warehouse, &config.volume_dir);
    let ctx = SummaryRunContext {
        anchors: &anchors,
        template: &template,
        level: config.level,
        mode: config.mode,
    };
    for loaded in &descriptors {
        let summary_id = loaded.descriptor.summary_id.clone();
        match process_descriptor(&warehouse, &loaded.descriptor, &ctx, &mut report) {
            Ok(Some(mut frame)) => {
                let rows = frame.height();
                match store.save(&mut frame, &loaded.descriptor, &loaded.path, config.mode) {
                    Ok(path) => {
                        debug!(summary_id = %summary_id, path = %path.display(), "intermediate persisted");
                        report.record_processed(&summary_id, rows);
                    }
                    Err(error) => {
                        warn!(summary_id = %summary_id, error = %error, "intermediate write failed");
                        report.record_failed(&summary_id, error.to_string());
                    }
                }
            }
            // Level mismatch: already recorded as skipped.
            Ok(None) => {}
            Err(error) => {
                warn!(summary_id = %summary_id, error = %error, "descriptor failed");
                report.record_failed(&summary_id, error.to_string());
            }
        }
    }
    if store.manifest().is_empty() {
        bail!(
            "no descriptors matched level {} under {}",
            config.level,
            config.descriptor_dir.display()
        );
    }

    let run_dir = config.output_dir.join(&config.cohort);
    let manifest_path = run_dir.join(format!("manifest_{}.csv", config.level));
    store
        .finalize_manifest(&manifest_path)
        .context("write manifest")?;

    let mut merged =
        merge_intermediates(store.manifest(), &template, &mut report).context("merge intermediates")?;
    let merged_columns = column_names(&merged);
    let header = build_tall_header(store.manifest(), &merged_columns, config.level, &mut report)
        .context("build header")?;

    let artifact_name = format!("data_clinical_{}.txt", config.level);
    let volume_path = config.volume_dir.join(&config.cohort).join(&artifact_name);
    let artifact_path = run_dir.join(&artifact_name);
    let rows = merged.height();
    let columns = merged.width();

    // Quality gate: an all-null column blocks publication outright.
    let blocked = match check_merged(&merged, &template.subject_column, &mut report) {
        Ok(()) => {
            let artifact = render_artifact(&header, &merged)?;
            publish_artifact(&warehouse, &artifact, &volume_path)?;
            if let Some(parent) = artifact_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            std::fs::write(&artifact_path, &artifact)
                .with_context(|| format!("write {}", artifact_path.display()))?;

            // Register the merged frame as a queryable table for downstream
            // consumers.
            let table = format!("{}_summary_{}", config.cohort, config.level);
            let qualified = format!("{}.{}.{}", config.catalog, config.schema, table);
            let options = WriteOptions {
                table_info: Some(TableInfo {
                    catalog: config.catalog.clone(),
                    schema: config.schema.clone(),
                    table,
                }),
                ..WriteOptions::default()
            };
            warehouse
                .write(&mut merged, &warehouse.table_path(&qualified), &options)
                .context("register merged table")?;
            None
        }
        Err(gate) => {
            error!(error = %gate, "publication blocked");
            Some(gate.to_string())
        }
    };

    info!(
        rows,
        columns,
        descriptors = report.processed_count(),
        skipped = report.skipped_count(),
        failed = report.failed_count(),
        warnings = report.warning_count(),
        duration_ms = start.elapsed().as_millis(),
        "summary run complete"
    );
    Ok(SummaryRunResult {
        cohort: config.cohort.clone(),
        level: config.level,
        manifest_path,
        artifact_path,
        volume_path,
        rows,
        columns,
        blocked,
        report,
    })
}

/// Execute the timeline deidentification pipeline.
pub fn run_timeline(config: &TimelineConfig) -> Result<TimelineRunResult> {
    let span = info_span!("timeline_run", cohort = %config.cohort, table = %config.source_table);
    let _guard = span.enter();
    let start = Instant::now();
    let mut report = RunReport::new();

    let credentials = Credentials::load(&config.credentials).context("load credentials")?;
    let warehouse = LocalWarehouse::connect(&credentials, &config.warehouse_root)
        .context("connect warehouse")?;

    let anchors = load_anchor_table(&warehouse, &config.anchor_table, &mut report)?;
    info!(anchors = anchors.len(), "anchor index resolved");

    let subjects: BTreeSet<String> = match &config.template {
        Some(path) => load_template(path, RunLevel::Patient)
            .context("load cohort template")?
            .subject_set()
            .context("collect template subjects")?,
        None => BTreeSet::new(),
    };

    let caps: BTreeMap<String, i32> = match &config.follow_up_table {
        Some(table) => {
            let frame = warehouse
                .query(&format!("SELECT * FROM {table}"))
                .with_context(|| format!("query follow-up table {table}"))?;
            follow_up_caps(&frame, &anchors, &mut report).context("derive follow-up caps")?
        }
        None => BTreeMap::new(),
    };

    let source = warehouse
        .query(&format!("SELECT * FROM {}", config.source_table))
        .with_context(|| format!("query timeline table {}", config.source_table))?;
    let mut frame = deidentify_timeline(&source, &anchors, &subjects, &caps, &mut report)
        .context("deidentify timeline")?;
    let rows = frame.height();

    let volume_path = config
        .volume_dir
        .join(&config.cohort)
        .join(&config.artifact_name);
    let artifact_path = config
        .output_dir
        .join(&config.cohort)
        .join(&config.artifact_name);
    // Quality gate mirrors the summary run: an all-null column other than
    // STOP_DATE blocks publication.
    let blocked = match check_timeline(&frame, "PATIENT_ID", &mut report) {
        Ok(()) => {
            warehouse
                .write(&mut frame, &volume_path, &WriteOptions::default())
                .context("publish timeline artifact")?;
            write_local_copy(&mut frame, &artifact_path)?;
            None
        }
        Err(error) => {
            warn!(error = %error, "publication blocked");
            Some(error.to_string())
        }
    };

    info!(
        rows,
        warnings = report.warning_count(),
        duration_ms = start.elapsed().as_millis(),
        "timeline run complete"
    );
    Ok(TimelineRunResult {
        cohort: config.cohort.clone(),
        artifact_path,
        volume_path,
        rows,
        blocked,
        report,
    })
}

fn write_local_copy(frame: &mut polars::prelude::DataFrame, path: &Path) -> Result<()> {
    write_delimited(frame, path, b'\t')
        .with_context(|| format!("write local copy {}", path.display()))
}
