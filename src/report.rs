// Assembles the final report: one row per input entry, in input order,
// whether the number was probed, rejected up front, or left unprobed when a
// rate limit halted the run or the operator interrupted it.

use crate::controller::{Halt, ProbeOutcome, RunResult};
use crate::input::InputEntry;
use crate::phone::PhoneNumber;
use crate::profile::Profile;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Registered { profile: Profile },
    NotFound,
    InvalidFormat,
    Error { message: String },
    Skipped { reason: String },
}

impl RowStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RowStatus::Registered { .. } => "Registered",
            RowStatus::NotFound => "Not Found",
            RowStatus::InvalidFormat => "Invalid Format",
            RowStatus::Error { .. } => "Error",
            RowStatus::Skipped { .. } => "Skipped",
        }
    }

    pub fn is_finalized(&self) -> bool {
        !matches!(self, RowStatus::Skipped { .. })
    }
}

impl From<ProbeOutcome> for RowStatus {
    fn from(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Registered { profile } => RowStatus::Registered { profile },
            ProbeOutcome::NotFound => RowStatus::NotFound,
            ProbeOutcome::InvalidFormat => RowStatus::InvalidFormat,
            ProbeOutcome::Error { message } => RowStatus::Error { message },
            ProbeOutcome::RateLimited { attempts } => RowStatus::Skipped {
                reason: exhausted_reason(attempts),
            },
        }
    }
}

fn exhausted_reason(attempts: u32) -> String {
    format!("Rate limited after {attempts} attempts")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Canonical digits, or the raw entry when it could not be normalized.
    pub number: String,
    /// Region code such as `GB`, `001` for non-geographic numbers.
    pub region: Option<String>,
    #[serde(flatten)]
    pub status: RowStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    rows: Vec<ReportRow>,
    halted: Option<Halt>,
    interrupted: bool,
}

impl Report {
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Rows that carry a real outcome, i.e. everything but `Skipped`.
    pub fn finalized(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|row| row.status.is_finalized())
    }

    pub fn halted(&self) -> Option<&Halt> {
        self.halted.as_ref()
    }

    /// True when the operator stopped the run with Ctrl-C.
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Merge the controller's result back into input order.
pub fn aggregate(entries: &[InputEntry], run: RunResult) -> Report {
    let mut outcomes: HashMap<PhoneNumber, ProbeOutcome> = run.outcomes.into_iter().collect();
    let rows = entries
        .iter()
        .map(|entry| match entry {
            InputEntry::Invalid(invalid) => ReportRow {
                number: invalid.raw.clone(),
                region: None,
                status: RowStatus::InvalidFormat,
            },
            InputEntry::Valid(number) => {
                let status = match outcomes.remove(number) {
                    Some(outcome) => outcome.into(),
                    None => RowStatus::Skipped {
                        reason: skipped_reason(number, run.halted.as_ref(), run.interrupted),
                    },
                };
                ReportRow {
                    number: number.to_string(),
                    region: number.region(),
                    status,
                }
            }
        })
        .collect();
    Report {
        rows,
        halted: run.halted,
        interrupted: run.interrupted,
    }
}

fn skipped_reason(number: &PhoneNumber, halted: Option<&Halt>, interrupted: bool) -> String {
    match halted {
        Some(halt) if &halt.number == number => exhausted_reason(halt.attempts),
        Some(halt) => format!("Run halted at {} by rate limiting", halt.number),
        None if interrupted => "Run interrupted".to_string(),
        None => "Not probed".to_string(),
    }
}
