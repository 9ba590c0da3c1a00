// 📥 Person Intake - CSV → Person Directory
// Every row goes through legal-id resolution, so re-importing a file
// refreshes names and phones instead of duplicating persons.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::directory::PersonDirectory;

/// One CSV row: `legal_id,name,phone`
#[derive(Debug, Clone, Deserialize)]
pub struct PersonRecord {
    pub legal_id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntakeReport {
    pub created: usize,
    pub refreshed: usize,
    /// (record number, reason), record numbers start at 1
    pub failed: Vec<(usize, String)>,
}

pub fn load_person_csv(csv_path: &Path) -> Result<Vec<PersonRecord>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {:?}", csv_path))?;
    read_person_csv(file)
}

pub fn read_person_csv<R: Read>(reader: R) -> Result<Vec<PersonRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: PersonRecord = result.context("Failed to deserialize person")?;
        records.push(record);
    }

    Ok(records)
}

/// Resolve every record; a bad row is reported and does not stop the rest.
pub fn intake_persons(directory: &PersonDirectory, records: &[PersonRecord]) -> IntakeReport {
    let mut report = IntakeReport::default();

    for (index, record) in records.iter().enumerate() {
        let existed = matches!(directory.find_by_legal_id(&record.legal_id), Ok(Some(_)));

        match directory.resolve_by_legal_id(&record.legal_id, &record.name, record.phone.as_deref()) {
            Ok(_) if existed => report.refreshed += 1,
            Ok(_) => report.created += 1,
            Err(err) => {
                warn!("Skipping record {}: {}", index + 1, err);
                report.failed.push((index + 1, err.to_string()));
            }
        }
    }

    report
}
