/*!
Loading survey responses that are keyed by Open Humans project member IDs.

The input is a CSV file with a header line. One of its columns holds the
8-digit project member ID of the participant who answered. That column is
detected from the first data row and confirmed by a [`ColumnConfirm`]
decision source, which may be an operator at a terminal or a preset answer.

```
use survey_data::{read_survey_data, AcceptColumn, ProjectMemberId};

let csv = "id,response\n12345678,yes\n87654321,no\n";
let dataset = read_survey_data(csv.as_bytes(), &mut AcceptColumn::new("id"))?;

let id = ProjectMemberId::parse("87654321").unwrap();
assert_eq!(dataset.get(&id).and_then(|row| row.get("response")), Some("no"));
# Ok::<(), survey_data::SurveyError>(())
```
*/
mod columns;
mod config;
mod sniffer;

use log::{debug, info};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub use crate::columns::*;
pub use crate::config::*;
pub use crate::sniffer::*;

fn csv_reader(contents: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(contents)
}

/// Loads the survey data from a CSV file.
///
/// See [`read_survey_data`] for the details.
pub fn load_survey_data<C: ColumnConfirm + ?Sized>(
    path: &Path,
    confirm: &mut C,
) -> Result<SurveyDataset, SurveyError> {
    info!("load_survey_data: reading {}", path.display());
    let contents = fs::read(path)?;
    read_survey_data(&contents, confirm)
}

/// Builds the dataset from the content of a CSV file.
///
/// The steps are, in order:
/// - check that the start of the file looks like a header (no question is asked otherwise)
/// - find the ID column, using the decision source
/// - read all the rows. Every row must have a valid ID, or the whole load fails.
///
/// When several rows have the same ID, the last one wins.
pub fn read_survey_data<C: ColumnConfirm + ?Sized>(
    contents: &[u8],
    confirm: &mut C,
) -> Result<SurveyDataset, SurveyError> {
    let text = String::from_utf8_lossy(contents);
    let sample: String = text.chars().take(SNIFF_CHARS).collect();
    if !has_header(&sample) {
        return Err(SurveyError::MissingHeader);
    }

    let id_column = get_id_column(contents, confirm)?;
    let dataset = build_dataset(contents, id_column)?;
    info!(
        "Loaded survey data for {} project members (ID column: {})",
        dataset.len(),
        dataset.id_column()
    );
    Ok(dataset)
}

/// Finds the name of the ID column from the header and the first data row.
pub fn get_id_column<C: ColumnConfirm + ?Sized>(
    contents: &[u8],
    confirm: &mut C,
) -> Result<String, SurveyError> {
    let mut rdr = csv_reader(contents);
    let headers: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();
    let first_row: Vec<String> = match rdr.records().next() {
        Some(r) => r?.iter().map(|s| s.to_string()).collect(),
        None => return Err(SurveyError::NoDataRows),
    };
    debug!("get_id_column: headers: {:?} first row: {:?}", headers, first_row);

    let candidates = id_column_candidates(&headers, &first_row);
    debug!("get_id_column: candidates: {:?}", candidates);
    choose_id_column(&candidates, confirm).map(|c| c.name)
}

fn build_dataset(contents: &[u8], id_column: String) -> Result<SurveyDataset, SurveyError> {
    let mut rdr = csv_reader(contents);
    let headers = rdr.headers()?.clone();
    let mut rows: BTreeMap<ProjectMemberId, SurveyRow> = BTreeMap::new();

    for record_r in rdr.records() {
        let record = record_r?;
        let lineno = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() > headers.len() {
            debug!(
                "build_dataset: line {}: dropping {} values without a column",
                lineno,
                record.len() - headers.len()
            );
        }

        let mut row = SurveyRow::new();
        for (name, value) in headers.iter().zip(record.iter()) {
            row.insert(name, value);
        }

        let id = row.get(&id_column).and_then(ProjectMemberId::parse);
        match id {
            Some(id) => {
                if rows.insert(id.clone(), row).is_some() {
                    debug!("build_dataset: line {}: replacing earlier row for {}", lineno, id);
                }
            }
            None => {
                return Err(SurveyError::MalformedId {
                    lineno,
                    row: row.to_string(),
                });
            }
        }
    }

    Ok(SurveyDataset { id_column, rows })
}
