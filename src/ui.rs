// UI layer: banner, `dialoguer` prompts, an `indicatif` spinner that follows
// the controller's progress, and the results table.

use crate::controller::{ProbeObserver, ProbeOutcome};
use crate::input::{parse_entries, valid_numbers, InputEntry};
use crate::phone::PhoneNumber;
use crate::report::{Report, ReportRow, RowStatus};
use anyhow::Result;
use crossterm::style::{Color, Stylize};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;
use tabled::builder::Builder;
use tabled::settings::object::{Columns, Segment};
use tabled::settings::{Alignment, Style, Width};

const COLUMNS: [&str; 10] = [
    "PHONE NUMBER",
    "FLAG",
    "STATUS",
    "FIRST NAME",
    "LAST NAME",
    "BIO",
    "USERNAME",
    "USER ID",
    "HUMAN?",
    "LAST SEEN",
];

const NA: &str = "N/A";
const MAX_CELL_WIDTH: usize = 40;

/// Terminal front end. `color` decides whether ANSI styling is emitted.
#[derive(Debug, Clone, Copy)]
pub struct Ui {
    color: bool,
}

impl Ui {
    pub fn new(color: bool) -> Self {
        Ui { color }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn print_banner(&self) {
        let title = format!("telegrab v{}", env!("CARGO_PKG_VERSION"));
        println!("{}", self.paint(&title, Color::Cyan));
        println!("Telegram phone number checker\n");
    }

    /// Ask for numbers until at least one valid number is entered.
    pub fn prompt_numbers(&self) -> Result<Vec<InputEntry>> {
        loop {
            let line: String = Input::new()
                .with_prompt("Enter phone number (or comma-separated numbers)")
                .interact_text()?;
            let entries = parse_entries(&line);
            if !valid_numbers(&entries).is_empty() {
                return Ok(entries);
            }
            println!(
                "{}",
                self.paint(
                    "Error: Please enter valid phone numbers (digits only, minimum 7 digits)",
                    Color::Red
                )
            );
        }
    }

    /// Ask for the login code sent to the operator's account.
    pub fn prompt_code(&self) -> Result<String> {
        eprintln!(
            "{}",
            self.paint("Verification code sent to your Telegram account", Color::Yellow)
        );
        let code: String = Input::new()
            .with_prompt("Enter the verification code")
            .interact_text()?;
        Ok(code)
    }

    pub fn spinner(&self) -> Spinner {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        Spinner { bar, ui: *self }
    }

    pub fn print_report(&self, report: &Report, json: bool) -> Result<()> {
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&JsonOut {
                    ok: true,
                    data: report
                })?
            );
            return Ok(());
        }
        println!("\nResults:");
        println!("{}", self.render_table(report));
        if let Some(halt) = report.halted() {
            let msg = format!(
                "Stopped at {} after {} rate-limited attempts; remaining numbers were skipped.",
                halt.number, halt.attempts
            );
            println!("{}", self.paint(&msg, Color::Yellow));
        } else if report.interrupted() {
            println!(
                "{}",
                self.paint("Interrupted; remaining numbers were skipped.", Color::Yellow)
            );
        }
        Ok(())
    }

    /// Render the report as a table with rounded borders and a line between
    /// rows. The first column is left-aligned, the rest centered.
    pub fn render_table(&self, report: &Report) -> String {
        let mut builder = Builder::default();
        builder.push_record(COLUMNS.iter().map(|&h| {
            if self.color {
                h.bold().to_string()
            } else {
                h.to_string()
            }
        }));
        for row in report.rows() {
            builder.push_record(self.row_cells(row));
        }

        let mut table = builder.build();
        table
            .with(Style::modern_rounded())
            .modify(Segment::all(), Alignment::center())
            .modify(Columns::first(), Alignment::left())
            .modify(Segment::all(), Width::truncate(MAX_CELL_WIDTH).suffix("…"));
        table.to_string()
    }

    fn cell(&self, text: &str, color: Option<Color>) -> String {
        let text = flatten(text);
        match color {
            Some(color) if self.color => text.with(color).to_string(),
            _ => text,
        }
    }

    fn optional(&self, text: Option<&str>) -> String {
        match text.filter(|t| !t.trim().is_empty()) {
            Some(t) => self.cell(t, None),
            None => NA.to_string(),
        }
    }

    fn row_cells(&self, row: &ReportRow) -> Vec<String> {
        let number = self.cell(&row.number, None);
        let flag = row.region.clone().unwrap_or_else(|| "??".to_string());
        let label = row.status.label();
        let na = |count: usize| std::iter::repeat(NA.to_string()).take(count);
        match &row.status {
            RowStatus::Registered { profile } => vec![
                number,
                flag,
                self.cell(label, Some(Color::Green)),
                self.optional(Some(&profile.first_name)),
                self.optional(Some(&profile.last_name)),
                self.optional(profile.bio.as_deref()),
                self.optional(profile.username.as_deref()),
                profile.id.to_string(),
                if profile.is_bot {
                    self.cell("Bot", Some(Color::Red))
                } else {
                    self.cell("Human", Some(Color::Green))
                },
                profile.last_seen.to_string(),
            ],
            RowStatus::Error { message } => {
                let mut cells = vec![number, flag, self.cell(label, Some(Color::Red))];
                cells.extend(na(6));
                cells.push(self.cell(message, Some(Color::Red)));
                cells
            }
            RowStatus::Skipped { reason } => {
                let mut cells = vec![number, flag, self.cell(label, Some(Color::Yellow))];
                cells.extend(na(6));
                cells.push(self.cell(reason, None));
                cells
            }
            RowStatus::NotFound | RowStatus::InvalidFormat => {
                let color = if matches!(row.status, RowStatus::NotFound) {
                    Color::Red
                } else {
                    Color::Yellow
                };
                let mut cells = vec![number, flag, self.cell(label, Some(color))];
                cells.extend(na(7));
                cells
            }
        }
    }
}

#[derive(Serialize)]
struct JsonOut<'a, T: Serialize> {
    ok: bool,
    data: &'a T,
}

/// Collapse line breaks and runs of whitespace so every row stays one line.
fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Spinner that shows which number is being checked. Nothing is drawn
/// until the first probe starts, so sign-in prompts stay undisturbed.
pub struct Spinner {
    bar: ProgressBar,
    ui: Ui,
}

impl Spinner {
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProbeObserver for Spinner {
    fn checking(&self, number: &PhoneNumber, attempt: u32) {
        let msg = if attempt == 0 {
            format!("Checking number {number}...")
        } else {
            format!("Checking number {number} (attempt {})...", attempt + 1)
        };
        self.bar.set_message(msg);
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn backing_off(&self, number: &PhoneNumber, delay: Duration) {
        self.bar.set_message(format!(
            "Rate limited on {number}. Waiting {} seconds...",
            delay.as_secs()
        ));
    }

    fn finished(&self, number: &PhoneNumber, outcome: &ProbeOutcome) {
        if let ProbeOutcome::Error { message } = outcome {
            let line = format!("Error processing {number}: {message}");
            self.bar.println(self.ui.paint(&line, Color::Red));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Halt, RunResult};
    use crate::phone::normalize;
    use crate::profile::{LastSeen, Profile};
    use crate::report::aggregate;
    use unicode_width::UnicodeWidthStr;

    fn sample_report() -> Report {
        let entries = parse_entries("15550000001, 447911123456, 123, 79161234567");
        let profile = Profile {
            id: 4242,
            username: Some("ada".into()),
            first_name: "Ada".into(),
            last_name: String::new(),
            bio: Some("line one\nline two".into()),
            is_bot: false,
            last_seen: LastSeen::Recently,
        };
        aggregate(
            &entries,
            RunResult {
                outcomes: vec![
                    (
                        normalize("15550000001").unwrap(),
                        ProbeOutcome::Registered { profile },
                    ),
                    (normalize("447911123456").unwrap(), ProbeOutcome::NotFound),
                ],
                halted: Some(Halt {
                    number: normalize("79161234567").unwrap(),
                    attempts: 3,
                }),
                interrupted: false,
            },
        )
    }

    #[test]
    fn plain_table_has_one_line_per_row_plus_borders() {
        let table = Ui::new(false).render_table(&sample_report());
        let lines: Vec<&str> = table.lines().collect();
        // top, header, then separator + row for each of the 4 rows, bottom
        assert_eq!(lines.len(), 2 + 4 * 2 + 1);
        assert!(lines[0].starts_with('╭'));
        assert!(lines[1].contains("PHONE NUMBER") && lines[1].contains("LAST SEEN"));
        assert!(lines[3].contains("Registered") && lines[3].contains("line one line two"));
        assert!(lines[3].contains("Human") && lines[3].contains("Last seen recently"));
        assert!(lines[5].contains("Not Found") && lines[5].contains("GB"));
        assert!(lines[7].contains("Invalid Format") && lines[7].contains("??"));
        assert!(lines[9].contains("Skipped") && lines[9].contains("Rate limited after 3 attempts"));
        assert!(!table.contains('\u{1b}'));
    }

    fn widths(table: &str) -> Vec<usize> {
        table.lines().map(UnicodeWidthStr::width).collect()
    }

    #[test]
    fn all_lines_have_equal_width() {
        let table = Ui::new(false).render_table(&sample_report());
        let widths = widths(&table);
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{widths:?}");
    }

    #[test]
    fn wide_characters_keep_columns_aligned() {
        let profile = Profile {
            id: 7,
            username: None,
            first_name: "张伟🙂".into(),
            last_name: "李".into(),
            bio: Some("こんにちは".into()),
            is_bot: false,
            last_seen: LastSeen::Online,
        };
        let report = aggregate(
            &parse_entries("8613800138000"),
            RunResult {
                outcomes: vec![(
                    normalize("8613800138000").unwrap(),
                    ProbeOutcome::Registered { profile },
                )],
                ..RunResult::default()
            },
        );
        let table = Ui::new(false).render_table(&report);
        assert!(table.contains("张伟🙂"));
        let widths = widths(&table);
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{widths:?}");
    }

    #[test]
    fn colored_table_emits_ansi_sequences() {
        let table = Ui::new(true).render_table(&sample_report());
        assert!(table.contains('\u{1b}'));
    }

    #[test]
    fn long_cells_are_truncated() {
        assert!(!Ui::new(false).render_table(&sample_report()).contains('…'));

        let profile = Profile {
            id: 1,
            username: None,
            first_name: "x".repeat(100),
            last_name: String::new(),
            bio: None,
            is_bot: false,
            last_seen: LastSeen::Never,
        };
        let report = aggregate(
            &parse_entries("15550000001"),
            RunResult {
                outcomes: vec![(
                    normalize("15550000001").unwrap(),
                    ProbeOutcome::Registered { profile },
                )],
                ..RunResult::default()
            },
        );
        let table = Ui::new(false).render_table(&report);
        assert!(table.contains('…'));
        assert!(!table.contains(&"x".repeat(MAX_CELL_WIDTH + 1)));
    }
}
