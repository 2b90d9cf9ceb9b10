//! End-of-run console summary tables.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{
    Attribute, Cell, CellAlignment, ColumnConstraint, Color, ContentArrangement, Table, Width,
};

use portal_cli::pipeline::{SummaryRunResult, TimelineRunResult};
use portal_model::{DescriptorOutcome, RunReport};

pub fn print_summary(result: &SummaryRunResult) {
    println!("Cohort: {} ({} level)", result.cohort, result.level);
    println!("Manifest: {}", result.manifest_path.display());
    match &result.blocked {
        Some(reason) => println!("Publication BLOCKED: {reason}"),
        None => {
            println!("Artifact: {}", result.artifact_path.display());
            println!("Published: {}", result.volume_path.display());
        }
    }
    println!(
        "Merged frame: {} subjects x {} columns",
        result.rows, result.columns
    );
    print_descriptor_table(&result.report);
    print_warning_table(&result.report);
}

pub fn print_timeline_summary(result: &TimelineRunResult) {
    println!("Cohort: {}", result.cohort);
    match &result.blocked {
        Some(reason) => println!("Publication BLOCKED: {reason}"),
        None => {
            println!("Artifact: {}", result.artifact_path.display());
            println!("Published: {}", result.volume_path.display());
        }
    }
    println!("Events: {}", result.rows);
    print_warning_table(&result.report);
}

fn print_descriptor_table(report: &RunReport) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Descriptor"),
        header_cell("Outcome"),
        header_cell("Rows"),
        header_cell("Detail"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for (summary_id, outcome) in &report.descriptors {
        let (outcome_cell, rows, detail) = match outcome {
            DescriptorOutcome::Processed { rows } => (
                Cell::new("processed")
                    .fg(Color::Green)
                    .add_attribute(Attribute::Bold),
                Cell::new(rows),
                dim_cell("-"),
            ),
            DescriptorOutcome::Skipped { reason } => (
                dim_cell("skipped"),
                dim_cell("-"),
                Cell::new(reason.clone()),
            ),
            DescriptorOutcome::Failed { error } => (
                Cell::new("failed")
                    .fg(Color::Red)
                    .add_attribute(Attribute::Bold),
                dim_cell("-"),
                Cell::new(error.clone()),
            ),
        };
        table.add_row(vec![
            Cell::new(summary_id.clone())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            outcome_cell,
            rows,
            detail,
        ]);
    }
    println!("{table}");
    println!(
        "Descriptors: {} processed, {} skipped, {} failed",
        report.processed_count(),
        report.skipped_count(),
        report.failed_count()
    );
}

fn print_warning_table(report: &RunReport) {
    if report.warnings().is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Warning"),
        header_cell("Count"),
        header_cell("First occurrence"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (kind, group) in report.warnings() {
        table.add_row(vec![
            Cell::new(kind.as_str())
                .fg(Color::Yellow)
                .add_attribute(Attribute::Bold),
            Cell::new(group.count).fg(Color::Yellow),
            Cell::new(group.first.clone()),
        ]);
    }
    println!();
    println!("Data integrity warnings:");
    println!("{table}");
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
    if table.column_count() >= 3 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(28)),
            ColumnConstraint::LowerBoundary(Width::Fixed(9)),
            ColumnConstraint::UpperBoundary(Width::Percentage(55)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
