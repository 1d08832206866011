// Where the numbers come from: a comma-separated list, a file with one
// entry per line, or an interactive prompt. Exactly one source is used.

use crate::error::TelegrabError;
use crate::phone::{normalize, InvalidFormat, PhoneNumber};
use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberSource {
    List(String),
    File(PathBuf),
    Interactive,
}

impl NumberSource {
    /// Pick the source by priority: list, then file, then prompt.
    pub fn select(numbers: Option<String>, file: Option<PathBuf>) -> Self {
        match (numbers, file) {
            (Some(list), _) => NumberSource::List(list),
            (None, Some(path)) => NumberSource::File(path),
            (None, None) => NumberSource::Interactive,
        }
    }
}

/// One entry of the operator's input, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEntry {
    Valid(PhoneNumber),
    Invalid(InvalidFormat),
}

/// Split on commas and newlines, skip blank entries and normalize the rest.
/// A number given twice is kept once, at its first position.
pub fn parse_entries(input: &str) -> Vec<InputEntry> {
    let mut seen = HashSet::new();
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .filter_map(|raw| match normalize(raw) {
            Ok(number) if seen.insert(number.clone()) => Some(InputEntry::Valid(number)),
            Ok(number) => {
                debug!(%number, "dropping duplicate number");
                None
            }
            Err(invalid) => Some(InputEntry::Invalid(invalid)),
        })
        .collect()
}

pub fn valid_numbers(entries: &[InputEntry]) -> Vec<PhoneNumber> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            InputEntry::Valid(number) => Some(number.clone()),
            InputEntry::Invalid(_) => None,
        })
        .collect()
}

/// Resolve the entries for a run. `prompt` is only called for the
/// interactive source. Fails when no valid number was supplied.
pub fn resolve<F>(source: &NumberSource, prompt: F) -> Result<Vec<InputEntry>>
where
    F: FnOnce() -> Result<Vec<InputEntry>>,
{
    let entries = match source {
        NumberSource::List(list) => parse_entries(list),
        NumberSource::File(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| TelegrabError::InputFile {
                path: path.clone(),
                source,
            })?;
            parse_entries(&text)
        }
        NumberSource::Interactive => prompt()?,
    };
    if valid_numbers(&entries).is_empty() {
        return Err(TelegrabError::NoNumbers.into());
    }
    Ok(entries)
}
