// One complete check: open the session, probe every valid number, close the
// session, then assemble the report. The session is released before the
// report is handed back, on every path.

use crate::api::MessagingApi;
use crate::controller::{BackoffPolicy, Controller, ProbeObserver, Sleeper, StopFlag};
use crate::error::{Result, TelegrabError};
use crate::input::{valid_numbers, InputEntry};
use crate::report::{aggregate, Report};
use crate::session::Session;
use tracing::info;

/// Everything a run needs besides the API and the numbers.
pub struct RunContext<'a> {
    /// The operator's own phone number, used if sign-in is required.
    pub operator_phone: &'a str,
    pub policy: BackoffPolicy,
    pub sleeper: &'a dyn Sleeper,
    pub observer: &'a dyn ProbeObserver,
    /// Checked between numbers and retries; set by the Ctrl-C handler.
    pub stop: &'a StopFlag,
}

pub fn check_numbers<A, F>(
    api: A,
    entries: &[InputEntry],
    ctx: &RunContext<'_>,
    read_code: F,
) -> Result<Report>
where
    A: MessagingApi,
    F: FnMut() -> anyhow::Result<String>,
{
    let numbers = valid_numbers(entries);
    if numbers.is_empty() {
        return Err(TelegrabError::NoNumbers);
    }

    let run = {
        let session = Session::open(api, ctx.operator_phone, read_code)?;
        info!(count = numbers.len(), "checking numbers");
        let controller = Controller::new(&session, ctx.sleeper, ctx.policy)
            .with_observer(ctx.observer)
            .with_stop(ctx.stop.clone());
        controller.run(&numbers)
    };

    Ok(aggregate(entries, run))
}
