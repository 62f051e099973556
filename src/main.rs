use anyhow::Result;
use clap::Parser;
use log::debug;
use std::collections::BTreeMap;

use bp_decoder::config::Args;
use bp_decoder::data_loading::{
    read_export_file, record_type_counts, records_by_type, tabulate_records,
    DIASTOLIC_RECORD_TYPE, SYSTOLIC_RECORD_TYPE,
};
use bp_decoder::labeling::{label_by_datetime_span, label_by_time_of_day};
use bp_decoder::output::{write_label_sidecars, write_labeled_tables, write_qa_summary};
use bp_decoder::preprocessing::parse_time_columns;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    println!("Loading export file: {}", args.export_path.display());
    let records = read_export_file(&args.export_path)?;
    println!("Loaded {} records", records.len());

    let type_counts = record_type_counts(&records);
    debug!("Export contains {} record types", type_counts.len());
    for (record_type, count) in &type_counts {
        debug!("  {}: {}", record_type, count);
    }

    let systolic = records_by_type(&records, SYSTOLIC_RECORD_TYPE);
    let diastolic = records_by_type(&records, DIASTOLIC_RECORD_TYPE);
    println!(
        "Found {} systolic and {} diastolic observations",
        systolic.len(),
        diastolic.len()
    );

    let mut tables = BTreeMap::new();
    tables.insert("Systolic BP".to_string(), tabulate_records(&systolic)?);
    tables.insert("Diastolic BP".to_string(), tabulate_records(&diastolic)?);

    for table in tables.values_mut() {
        parse_time_columns(table)?;
    }

    // Assign each observation to a medication period, then to a time-of-day
    // group. Order matters only for the QA columns, which each labeler
    // derives from its own completed label set.
    let spans = args.medication_spans()?;
    let medications = label_by_datetime_span(&mut tables, &spans, "Medications")?;

    let windows = args.time_of_day_windows()?;
    let groups = label_by_time_of_day(&mut tables, &windows, "Groups")?;

    write_labeled_tables(&args.output_dir, &mut tables)?;
    write_label_sidecars(&args.output_dir, &[&medications, &groups])?;
    write_qa_summary(&args.output_dir, &[&medications, &groups])?;

    println!("All results saved to {}", args.output_dir.display());
    Ok(())
}
