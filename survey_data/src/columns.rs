// Finding the column that holds the project member IDs.

use log::{debug, info};

use crate::config::*;

/// Lists the columns whose value in the first data row is a project member ID,
/// in column order.
pub fn id_column_candidates(headers: &[String], first_row: &[String]) -> Vec<ColumnCandidate> {
    headers
        .iter()
        .zip(first_row.iter())
        .enumerate()
        .filter(|(_, (_, value))| is_project_member_id(value))
        .map(|(idx, (name, _))| ColumnCandidate {
            index: idx + 1,
            name: name.clone(),
        })
        .collect()
}

/// The source of decisions for picking the ID column among the candidates.
///
/// It is asked about the candidates one at a time, in column order, and is
/// not asked again after it accepts one.
pub trait ColumnConfirm {
    fn confirm(&mut self, candidate: &ColumnCandidate) -> std::io::Result<bool>;
}

/// Accepts the candidate with the given header name, without asking anyone.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AcceptColumn {
    name: String,
}

impl AcceptColumn {
    pub fn new(name: &str) -> AcceptColumn {
        AcceptColumn {
            name: name.to_string(),
        }
    }
}

impl ColumnConfirm for AcceptColumn {
    fn confirm(&mut self, candidate: &ColumnCandidate) -> std::io::Result<bool> {
        Ok(candidate.name == self.name)
    }
}

/// Returns the first candidate accepted by the decision source.
pub fn choose_id_column<C: ColumnConfirm + ?Sized>(
    candidates: &[ColumnCandidate],
    confirm: &mut C,
) -> Result<ColumnCandidate, SurveyError> {
    for candidate in candidates {
        debug!("choose_id_column: asking about {:?}", candidate);
        if confirm.confirm(candidate).map_err(SurveyError::Prompt)? {
            info!(
                "Using column {} ({}) for project member IDs",
                candidate.index, candidate.name
            );
            return Ok(candidate.clone());
        }
    }
    Err(SurveyError::UnknownIdColumn)
}
