//! Persistence of labeled tables and label metadata.
//!
//! Layout under the output directory:
//!
//! - `tables/<table name>.csv` — one CSV per labeled observation table
//! - `json/<family>.json` — ordered label names per family, for downstream
//!   column selection
//! - `qa_summary.csv` — unassigned-observation counts per table and family

use anyhow::{Context, Result};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::FamilyLabels;

pub fn write_labeled_tables(
    output_dir: &Path,
    tables: &mut BTreeMap<String, DataFrame>,
) -> Result<()> {
    let tables_dir = output_dir.join("tables");
    std::fs::create_dir_all(&tables_dir)?;

    for (name, table) in tables.iter_mut() {
        let path = tables_dir.join(format!("{name}.csv"));
        println!("Writing table to {}", path.display());
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        CsvWriter::new(&mut file).include_header(true).finish(table)?;
    }
    Ok(())
}

pub fn write_label_sidecars(output_dir: &Path, families: &[&FamilyLabels]) -> Result<()> {
    let json_dir = output_dir.join("json");
    std::fs::create_dir_all(&json_dir)?;

    for family in families {
        let path = json_dir.join(format!("{}.json", family.family));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &family.labels)?;
    }
    Ok(())
}

pub fn write_qa_summary(output_dir: &Path, families: &[&FamilyLabels]) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("qa_summary.csv");
    let file =
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(["table", "family", "unassigned"])?;
    for family in families {
        for (table, count) in &family.unassigned {
            writer.write_record([table.as_str(), family.family.as_str(), &count.to_string()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family() -> FamilyLabels {
        FamilyLabels {
            family: "Groups".to_string(),
            labels: vec![
                "Group 1 (Morning)".to_string(),
                "Group 2 (Evening)".to_string(),
            ],
            unassigned: BTreeMap::from([
                ("Systolic BP".to_string(), 0),
                ("Diastolic BP".to_string(), 3),
            ]),
        }
    }

    #[test]
    fn sidecar_preserves_label_order() {
        let dir = std::env::temp_dir().join("bp-decoder-test-sidecar");
        write_label_sidecars(&dir, &[&family()]).unwrap();

        let contents = std::fs::read_to_string(dir.join("json/Groups.json")).unwrap();
        let labels: Vec<String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(labels, family().labels);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn qa_summary_lists_each_table_once_per_family() {
        let dir = std::env::temp_dir().join("bp-decoder-test-qa");
        write_qa_summary(&dir, &[&family()]).unwrap();

        let mut reader = csv::Reader::from_path(dir.join("qa_summary.csv")).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "Diastolic BP");
        assert_eq!(&rows[0][2], "3");
        assert_eq!(&rows[1][0], "Systolic BP");
        assert_eq!(&rows[1][2], "0");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
