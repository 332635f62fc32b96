// ********* Input data structures ***********

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// The number of digits in an Open Humans project member ID.
pub const ID_LENGTH: usize = 8;

/// Returns true if the value is exactly eight ASCII digits.
pub fn is_project_member_id(value: &str) -> bool {
    value.len() == ID_LENGTH && value.bytes().all(|b| b.is_ascii_digit())
}

/// An 8-digit Open Humans project member ID.
///
/// The only way to build one is through `parse`, so any value of this type
/// is known to match the identifier pattern.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct ProjectMemberId(String);

impl ProjectMemberId {
    pub fn parse(value: &str) -> Option<ProjectMemberId> {
        if is_project_member_id(value) {
            Some(ProjectMemberId(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ProjectMemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of survey responses: column name to value, in header order.
///
/// Serializes as a flat JSON object whose keys follow the column order of
/// the CSV file.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SurveyRow {
    fields: Vec<(String, String)>,
}

impl SurveyRow {
    pub fn new() -> SurveyRow {
        SurveyRow { fields: Vec::new() }
    }

    /// Sets the value of a column.
    ///
    /// A column that is already present keeps its position and gets the new value.
    pub fn insert(&mut self, column: &str, value: &str) {
        if let Some(field) = self.fields.iter_mut().find(|(name, _)| name == column) {
            field.1 = value.to_string();
        } else {
            self.fields.push((column.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Display for SurveyRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(name, value)| format!("{:?}: {:?}", name, value))
            .collect();
        write!(f, "{{{}}}", fields.join(", "))
    }
}

impl Serialize for SurveyRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in self.fields.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// All the survey rows of a file, keyed by project member ID.
///
/// When several rows share an ID, only the last one is kept.
/// Iteration is in ascending ID order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyDataset {
    pub(crate) id_column: String,
    pub(crate) rows: BTreeMap<ProjectMemberId, SurveyRow>,
}

impl SurveyDataset {
    /// The header name of the column holding the project member IDs.
    pub fn id_column(&self) -> &str {
        self.id_column.as_str()
    }

    pub fn get(&self, id: &ProjectMemberId) -> Option<&SurveyRow> {
        self.rows.get(id)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ProjectMemberId, SurveyRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a> IntoIterator for &'a SurveyDataset {
    type Item = (&'a ProjectMemberId, &'a SurveyRow);
    type IntoIter = btree_map::Iter<'a, ProjectMemberId, SurveyRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// A column whose value in the first data row looks like a project member ID.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnCandidate {
    /// Position of the column, starting at 1.
    pub index: usize,
    pub name: String,
}

/// Errors that stop the survey data from loading.
///
/// None of them leave a partial dataset behind.
#[derive(Debug)]
pub enum SurveyError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingHeader,
    NoDataRows,
    UnknownIdColumn,
    /// The decision source for the ID column failed (typically reading stdin).
    Prompt(std::io::Error),
    /// A data row whose ID cell is missing or not 8 digits.
    /// The line number counts the header as line 1.
    MalformedId { lineno: u64, row: String },
}

impl Error for SurveyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SurveyError::Io(e) | SurveyError::Prompt(e) => Some(e),
            SurveyError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for SurveyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurveyError::Io(e) => write!(f, "Could not read survey data: {}", e),
            SurveyError::Csv(e) => write!(f, "Could not parse survey data: {}", e),
            SurveyError::MissingHeader => write!(f, "CSV data doesn't appear to have a header!"),
            SurveyError::NoDataRows => write!(f, "Survey data has no rows after the header."),
            SurveyError::UnknownIdColumn => {
                write!(f, "Unable to determine column with project member ID.")
            }
            SurveyError::Prompt(e) => write!(f, "Could not confirm the ID column: {}", e),
            SurveyError::MalformedId { lineno, row } => write!(
                f,
                "Row {} (line {}) appears to have malformed project member ID!",
                row, lineno
            ),
        }
    }
}

impl From<std::io::Error> for SurveyError {
    fn from(e: std::io::Error) -> Self {
        SurveyError::Io(e)
    }
}

impl From<csv::Error> for SurveyError {
    fn from(e: csv::Error) -> Self {
        SurveyError::Csv(e)
    }
}
