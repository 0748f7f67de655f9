//! Loads an agency's bets from a CSV file.
//!
//! One bet per line, `name,surname,id,birth_date,number`, no header.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use wager_protocol::Bet;

use crate::WagerError;

const FIELDS: usize = 5;

/// Parses bets from `reader`.
///
/// Lines with fewer than five fields are skipped, extra fields are
/// ignored. A line whose fields do not make a valid bet is logged and
/// skipped. Only a read failure is an error.
pub fn parse_bets(reader: impl BufRead) -> Result<Vec<Bet>, WagerError> {
    let mut bets = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < FIELDS {
            if !line.trim().is_empty() {
                tracing::debug!(line = line_no, "skipping short record");
            }
            continue;
        }

        match Bet::parse(fields[0], fields[1], fields[2], fields[3], fields[4])
        {
            Ok(bet) => bets.push(bet),
            Err(e) => tracing::warn!(
                action = "load_bets", result = "fail",
                line = line_no, error = %e, "skipping invalid record"
            ),
        }
    }

    Ok(bets)
}

/// Opens `path` and parses the bets in it.
pub fn load_bets(path: impl AsRef<Path>) -> Result<Vec<Bet>, WagerError> {
    let path = path.as_ref();
    let records = |source: std::io::Error| WagerError::Records {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(records)?;
    let bets = match parse_bets(BufReader::new(file)) {
        Err(WagerError::Io(source)) => return Err(records(source)),
        other => other?,
    };

    tracing::info!(
        action = "load_bets", result = "success",
        path = %path.display(), bets = bets.len(), "bets loaded"
    );
    Ok(bets)
}
