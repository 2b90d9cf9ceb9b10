//! Subcommand entry points: map parsed arguments onto pipeline configs.

use anyhow::Result;

use portal_cli::pipeline::{
    SummaryConfig, SummaryRunResult, TimelineConfig, TimelineRunResult, run_summary, run_timeline,
};

use crate::cli::{SummaryArgs, TimelineArgs};

pub fn run_summary_command(args: &SummaryArgs) -> Result<SummaryRunResult> {
    let config = SummaryConfig {
        credentials: args.credentials.clone(),
        warehouse_root: args.warehouse_root.clone(),
        descriptor_dir: args.descriptor_dir.clone(),
        anchor_table: args.anchor_table.clone(),
        template: args.template.clone(),
        level: args.level.into(),
        mode: args.mode.into(),
        cohort: args.cohort.clone(),
        volume_dir: args.volume_dir.clone(),
        output_dir: args.output_dir.clone(),
        catalog: args.catalog.clone(),
        schema: args.schema.clone(),
    };
    run_summary(&config)
}

pub fn run_timeline_command(args: &TimelineArgs) -> Result<TimelineRunResult> {
    let config = TimelineConfig {
        credentials: args.credentials.clone(),
        warehouse_root: args.warehouse_root.clone(),
        anchor_table: args.anchor_table.clone(),
        source_table: args.source_table.clone(),
        follow_up_table: args.follow_up_table.clone(),
        template: args.template.clone(),
        cohort: args.cohort.clone(),
        artifact_name: args.artifact_name.clone(),
        volume_dir: args.volume_dir.clone(),
        output_dir: args.output_dir.clone(),
    };
    run_timeline(&config)
}
