// Probe-and-backoff controller. Numbers are probed one at a time; a rate
// limit is retried with exponential backoff, and a rate limit that outlasts
// the retry budget halts the whole run.

use crate::phone::PhoneNumber;
use crate::profile::Profile;
use crate::session::{ProbeClient, ProbeSignal};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Retry and pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Probe attempts per number, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Fixed pause between two numbers.
    pub pacing: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            pacing: Duration::from_secs(3),
        }
    }
}

impl BackoffPolicy {
    /// `base_delay * 2^attempt`, attempt counted from zero.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// The wait before retrying: the computed backoff, or the server's
    /// required wait when that is longer.
    pub fn retry_delay(&self, attempt: u32, server_wait: Duration) -> Duration {
        self.backoff(attempt).max(server_wait)
    }
}

/// Final result of probing one number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Registered { profile: Profile },
    NotFound,
    InvalidFormat,
    RateLimited { attempts: u32 },
    Error { message: String },
}

/// Where and why a run stopped early.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Halt {
    pub number: PhoneNumber,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    /// Finalized outcomes, in probe order.
    pub outcomes: Vec<(PhoneNumber, ProbeOutcome)>,
    pub halted: Option<Halt>,
    /// Set when the operator stopped the run before every number was probed.
    pub interrupted: bool,
}

/// Shared stop request, set from the Ctrl-C handler. A probe already in
/// flight always completes so its transient contact is cleaned up.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        StopFlag::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread, waking early once `stop` is set.
pub struct ThreadSleeper {
    stop: StopFlag,
}

const SLEEP_SLICE: Duration = Duration::from_millis(100);

impl ThreadSleeper {
    pub fn new(stop: StopFlag) -> Self {
        ThreadSleeper { stop }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.stop.is_stopped() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            std::thread::sleep(left.min(SLEEP_SLICE));
        }
    }
}

/// Progress hooks for a front end. All methods default to doing nothing.
pub trait ProbeObserver {
    fn checking(&self, _number: &PhoneNumber, _attempt: u32) {}
    fn backing_off(&self, _number: &PhoneNumber, _delay: Duration) {}
    fn finished(&self, _number: &PhoneNumber, _outcome: &ProbeOutcome) {}
}

impl ProbeObserver for () {}

#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    waited: Duration,
}

pub struct Controller<'a, C: ProbeClient> {
    client: &'a C,
    sleeper: &'a dyn Sleeper,
    observer: &'a dyn ProbeObserver,
    stop: StopFlag,
    policy: BackoffPolicy,
}

impl<'a, C: ProbeClient> Controller<'a, C> {
    pub fn new(client: &'a C, sleeper: &'a dyn Sleeper, policy: BackoffPolicy) -> Self {
        Controller {
            client,
            sleeper,
            observer: &(),
            stop: StopFlag::new(),
            policy,
        }
    }

    pub fn with_stop(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ProbeObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Probe every number in order. Stops at the first number whose rate
    /// limit survives all retries; numbers after it are never probed. A stop
    /// request ends the run the same way, between probes.
    pub fn run(&self, numbers: &[PhoneNumber]) -> RunResult {
        let mut result = RunResult::default();
        for (index, number) in numbers.iter().enumerate() {
            let Some(outcome) = self.probe_number(number) else {
                warn!(%number, remaining = numbers.len() - index, "run interrupted");
                result.interrupted = true;
                return result;
            };
            self.observer.finished(number, &outcome);

            if let ProbeOutcome::RateLimited { attempts } = outcome {
                warn!(
                    %number,
                    attempts,
                    remaining = numbers.len() - index - 1,
                    "rate limit persisted, halting run"
                );
                result.halted = Some(Halt {
                    number: number.clone(),
                    attempts,
                });
                return result;
            }

            info!(%number, ?outcome, "probe finished");
            result.outcomes.push((number.clone(), outcome));

            if index + 1 < numbers.len() {
                self.sleeper.sleep(self.policy.pacing);
            }
        }
        result
    }

    /// `None` when a stop was requested before the number was finalized.
    fn probe_number(&self, number: &PhoneNumber) -> Option<ProbeOutcome> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut retry = RetryState::default();
        loop {
            if self.stop.is_stopped() {
                return None;
            }
            self.observer.checking(number, retry.attempt);
            match self.client.probe(number) {
                ProbeSignal::Found(user) => {
                    let extended = match self.client.fetch_extended_profile(user.id) {
                        Ok(extended) => Some(extended),
                        Err(e) => {
                            warn!(%number, error = %e, "could not fetch full profile");
                            None
                        }
                    };
                    return Some(ProbeOutcome::Registered {
                        profile: Profile::build(user, extended),
                    });
                }
                ProbeSignal::NotFound => return Some(ProbeOutcome::NotFound),
                ProbeSignal::InvalidNumber => return Some(ProbeOutcome::InvalidFormat),
                ProbeSignal::Failed(message) => {
                    warn!(%number, %message, "probe failed");
                    return Some(ProbeOutcome::Error { message });
                }
                ProbeSignal::RateLimited { wait } => {
                    if retry.attempt + 1 >= max_attempts {
                        debug!(%number, waited = ?retry.waited, "retries exhausted");
                        return Some(ProbeOutcome::RateLimited {
                            attempts: retry.attempt + 1,
                        });
                    }
                    let delay = self.policy.retry_delay(retry.attempt, wait);
                    warn!(%number, delay_secs = delay.as_secs(), "rate limited, backing off");
                    self.observer.backing_off(number, delay);
                    self.sleeper.sleep(delay);
                    retry.attempt += 1;
                    retry.waited += delay;
                }
            }
        }
    }
}
