//! Debounced per-field validation for interactive editors.
//!
//! A session is single-threaded and cooperative. [`request`] schedules a
//! validation for a field `debounce` from now, replacing any validation
//! still pending for that field. Nothing runs until the host calls
//! [`run_due`] (typically from its event loop or timer callback), so tests
//! drive time with a [`ManualClock`] instead of sleeping.
//!
//! Each scheduled run carries a generation number. [`clear`] and
//! [`clear_field`] raise a cutoff instead of cancelling timers, and a run
//! whose generation is below the cutoff (or is no longer the newest for its
//! field) is discarded when it fires. A stale run can therefore never
//! repopulate state that was cleared after it was scheduled.
//!
//! [`request`]: ValidationSession::request
//! [`run_due`]: ValidationSession::run_due
//! [`clear`]: ValidationSession::clear
//! [`clear_field`]: ValidationSession::clear_field

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::settings::EngineSettings;
use crate::types::{ExportReadiness, ValidationIssue};
use crate::validate::{ValidationReport, Validator};

/// Source of "now" for debounce deadlines.
pub trait Clock {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// Wall clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Handle for one scheduled validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTicket {
    pub field: String,
    pub generation: u64,
    pub due: Duration,
}

#[derive(Debug, Clone)]
struct Pending {
    ticket: ValidationTicket,
    value: String,
}

/// Validation state for an editing session.
pub struct ValidationSession<C: Clock = SystemClock> {
    validator: Validator,
    clock: C,
    debounce: Duration,
    next_generation: u64,
    /// Runs scheduled before this generation are stale for every field.
    cleared_before: u64,
    /// Per-field cutoff set by `clear_field`.
    field_cleared_before: HashMap<String, u64>,
    /// Newest generation requested per field.
    latest: HashMap<String, u64>,
    pending: BTreeMap<String, Pending>,
    issues: BTreeMap<String, Vec<ValidationIssue>>,
}

impl ValidationSession<SystemClock> {
    pub fn new(settings: &EngineSettings) -> Self {
        Self::with_clock(settings, SystemClock::default())
    }
}

impl<C: Clock> ValidationSession<C> {
    pub fn with_clock(settings: &EngineSettings, clock: C) -> Self {
        Self {
            validator: Validator::new(settings),
            clock,
            debounce: Duration::from_millis(settings.debounce_ms),
            next_generation: 0,
            cleared_before: 0,
            field_cleared_before: HashMap::new(),
            latest: HashMap::new(),
            pending: BTreeMap::new(),
            issues: BTreeMap::new(),
        }
    }

    /// Swap the validator, e.g. to inject custom heuristics.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    fn next_ticket(&mut self, field: &str, due: Duration) -> ValidationTicket {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.latest.insert(field.to_string(), generation);
        ValidationTicket {
            field: field.to_string(),
            generation,
            due,
        }
    }

    /// Schedule validation of `field`, superseding any pending run for it.
    pub fn request(&mut self, field: &str, value: &str) -> ValidationTicket {
        let due = self.clock.now() + self.debounce;
        let ticket = self.next_ticket(field, due);
        let previous = self.pending.insert(
            field.to_string(),
            Pending {
                ticket: ticket.clone(),
                value: value.to_string(),
            },
        );
        if let Some(previous) = previous {
            debug!(field, generation = previous.ticket.generation, "superseded pending validation");
        }
        ticket
    }

    /// Validate immediately, superseding any pending run for the field.
    pub fn validate_now(&mut self, field: &str, value: &str) -> &[ValidationIssue] {
        let now = self.clock.now();
        let ticket = self.next_ticket(field, now);
        self.pending.remove(field);
        self.apply(&ticket, value);
        self.field_issues(field)
    }

    /// Fire every pending run whose deadline has passed. Returns how many
    /// runs were applied (stale runs are not counted).
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.now();
        let mut due: Vec<Pending> = Vec::new();
        self.pending.retain(|_, pending| {
            if pending.ticket.due <= now {
                due.push(pending.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|p| (p.ticket.due, p.ticket.generation));
        due.iter()
            .filter(|p| self.apply(&p.ticket, &p.value))
            .count()
    }

    /// Fire every pending run regardless of its deadline.
    pub fn flush(&mut self) -> usize {
        let mut all: Vec<Pending> = std::mem::take(&mut self.pending).into_values().collect();
        all.sort_by_key(|p| p.ticket.generation);
        all.iter().filter(|p| self.apply(&p.ticket, &p.value)).count()
    }

    fn is_stale(&self, ticket: &ValidationTicket) -> bool {
        let field_cutoff = self
            .field_cleared_before
            .get(&ticket.field)
            .copied()
            .unwrap_or(0);
        ticket.generation < self.cleared_before.max(field_cutoff)
            || self.latest.get(&ticket.field) != Some(&ticket.generation)
    }

    fn apply(&mut self, ticket: &ValidationTicket, value: &str) -> bool {
        if self.is_stale(ticket) {
            debug!(field = %ticket.field, generation = ticket.generation, "discarding stale validation");
            return false;
        }
        let issues = self.validator.validate_field(&ticket.field, value);
        if issues.is_empty() {
            self.issues.remove(&ticket.field);
        } else {
            self.issues.insert(ticket.field.clone(), issues);
        }
        true
    }

    /// Drop all held issues. Runs already scheduled will be discarded when they fire.
    pub fn clear(&mut self) {
        self.issues.clear();
        self.cleared_before = self.next_generation;
    }

    /// Drop one field's issues. Its scheduled run will be discarded when it fires.
    pub fn clear_field(&mut self, field: &str) {
        self.issues.remove(field);
        self.field_cleared_before
            .insert(field.to_string(), self.next_generation);
    }

    /// Whether a run for `field` is scheduled and will still apply when it
    /// fires. Runs invalidated by a clear do not count.
    pub fn is_pending(&self, field: &str) -> bool {
        self.pending
            .get(field)
            .is_some_and(|pending| !self.is_stale(&pending.ticket))
    }

    pub fn field_issues(&self, field: &str) -> &[ValidationIssue] {
        self.issues.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current state as a report, fields in name order.
    pub fn report(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        for issue in self.issues.values().flatten() {
            report.push(issue.clone());
        }
        report
    }

    pub fn readiness(&self) -> ExportReadiness {
        self.report().readiness()
    }
}
