// Guessing whether the first line of a CSV sample is a header.

use log::debug;

/// How many characters of the file are inspected to detect a header.
pub const SNIFF_CHARS: usize = 1024;

// Rows after the first one that take part in the vote.
const MAX_ROWS_CHECKED: usize = 21;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum CellType {
    Numeric,
    Length(usize),
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum ColumnState {
    Unknown,
    Typed(CellType),
    Inconsistent,
}

fn looks_numeric(cell: &str) -> bool {
    let s = cell.trim();
    if s.parse::<f64>().is_ok() {
        return true;
    }
    // Imaginary literals such as 2j are numbers too.
    match s.strip_suffix(|c: char| c == 'j' || c == 'J') {
        Some("") => true,
        Some(rest) => rest.parse::<f64>().is_ok(),
        None => false,
    }
}

fn cell_type(cell: &str) -> CellType {
    if looks_numeric(cell) {
        CellType::Numeric
    } else {
        CellType::Length(cell.chars().count())
    }
}

/// Returns true if the first line of the sample looks like a header.
///
/// Every column gets a type from the rows that follow the first one: numeric
/// if all the values are numbers, or a fixed length if all the values have the
/// same number of characters. Columns that mix types are ignored. Each typed
/// column then votes for a header when the first-line cell does not fit that
/// type, and against it otherwise. Columns without any data vote for a header.
///
/// The sample is read as comma-separated values. An empty sample has no header.
pub fn has_header(sample: &str) -> bool {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(sample.as_bytes());
    let mut records = rdr.records();
    let header = match records.next() {
        Some(Ok(r)) => r,
        _ => return false,
    };

    let mut columns: Vec<ColumnState> = vec![ColumnState::Unknown; header.len()];
    for record_r in records.take(MAX_ROWS_CHECKED) {
        let record = match record_r {
            Ok(r) => r,
            Err(e) => {
                debug!("has_header: stopping at unreadable row: {:?}", e);
                break;
            }
        };
        if record.len() != header.len() {
            continue;
        }
        for (state, cell) in columns.iter_mut().zip(record.iter()) {
            let t = cell_type(cell);
            *state = match *state {
                ColumnState::Unknown => ColumnState::Typed(t),
                ColumnState::Typed(prev) if prev == t => ColumnState::Typed(prev),
                _ => ColumnState::Inconsistent,
            };
        }
    }

    let mut votes: i64 = 0;
    for (state, cell) in columns.iter().zip(header.iter()) {
        match state {
            ColumnState::Typed(CellType::Length(len)) => {
                if cell.chars().count() != *len {
                    votes += 1;
                } else {
                    votes -= 1;
                }
            }
            ColumnState::Typed(CellType::Numeric) => {
                if looks_numeric(cell) {
                    votes -= 1;
                } else {
                    votes += 1;
                }
            }
            ColumnState::Unknown => votes += 1,
            ColumnState::Inconsistent => {}
        }
    }
    debug!("has_header: columns: {:?} votes: {}", columns, votes);
    votes > 0
}
