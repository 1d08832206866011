// Library root
// -----------
// telegrab checks whether phone numbers are registered on Telegram by
// importing each one as a transient contact and reading back the profile
// the platform resolves for it. The binary (`main.rs`) wires these modules
// into the CLI.
//
// Module responsibilities:
// - `phone`: normalization of raw input into canonical digits, regions.
// - `input`: picks the number source (list, file, prompt) and parses it.
// - `api`: the gateway client and the `MessagingApi` seam.
// - `session`: authenticated, scoped session; probes with transient
//   contacts that are always deleted again.
// - `controller`: sequential probing with backoff, pacing and the
//   rate-limit halt.
// - `report`: merges outcomes back into input order.
// - `ui`: prompts, spinner and the results table.
pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod phone;
pub mod profile;
pub mod report;
pub mod session;
pub mod ui;
