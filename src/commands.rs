use chrono::{Duration, NaiveDate};
use std::time::Instant;

use crate::date_key;
use crate::models::*;
use crate::notify::Notifier;
use crate::prediction;
use crate::storage::{self, KeyValueStore, StorageError};

/// The live day log and its predictions, owned by the application root.
///
/// Every mutation updates the log in memory, writes it back to the store and
/// recomputes predictions before returning. A failed write is returned to the
/// caller but the in-memory log and predictions are already up to date.
///
/// When the stored document exists but could not be opened, the state is
/// read-only: mutations still apply in memory but are never written over it.
pub struct AppState<S> {
    store: S,
    namespace: String,
    log: DayLog,
    predictions: PredictionMap,
    notifier: Notifier,
    writable: bool,
}

impl<S: KeyValueStore> AppState<S> {
    /// Load the log from `store`. Never fails; unreadable data starts empty.
    pub fn load(store: S, namespace: impl Into<String>, notifier: Notifier) -> Self {
        let namespace = namespace.into();
        let (log, status) = storage::open_log(&store, &namespace);
        let predictions = prediction::predict(&log);
        Self {
            store,
            namespace,
            log,
            predictions,
            notifier,
            writable: status.is_writable(),
        }
    }

    pub fn is_read_only(&self) -> bool {
        !self.writable
    }

    pub fn log(&self) -> &DayLog {
        &self.log
    }

    pub fn predictions(&self) -> &PredictionMap {
        &self.predictions
    }

    /// Notices that are due now.
    pub fn poll_notices(&mut self) -> Vec<String> {
        self.notifier.poll(Instant::now())
    }

    /// All notices, including a debounced one that is not yet due.
    pub fn flush_notices(&mut self) -> Vec<String> {
        self.notifier.flush()
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let saved = if self.writable {
            storage::save_log(&self.store, &self.namespace, &self.log)
        } else {
            Err(StorageError::Locked)
        };
        if let Err(e) = &saved {
            tracing::error!(namespace = %self.namespace, error = %e, "failed to save day log");
        }
        self.recalculate();
        saved
    }

    fn recalculate(&mut self) {
        self.predictions = prediction::predict(&self.log);
        tracing::debug!(
            days = self.log.len(),
            predicted = self.predictions.len(),
            "recalculated predictions"
        );
    }

    /// Flip the period mark on `date`. Unmarking also drops the flow.
    /// Returns whether the day is now a period day.
    pub fn toggle_period(&mut self, date: NaiveDate) -> Result<bool, StorageError> {
        let marked = self.log.upsert(date, |r| {
            r.period = !r.period;
            r.period
        });
        self.notifier.notify(if marked {
            "Period marked"
        } else {
            "Period unmarked"
        });
        self.commit()?;
        Ok(marked)
    }

    pub fn toggle_ovulation(&mut self, date: NaiveDate) -> Result<bool, StorageError> {
        let marked = self.log.upsert(date, |r| {
            r.ovulation = !r.ovulation;
            r.ovulation
        });
        self.notifier.notify(if marked {
            "Ovulation marked"
        } else {
            "Ovulation unmarked"
        });
        self.commit()?;
        Ok(marked)
    }

    /// Set the flow on `date`, marking it a period day. Choosing the level
    /// already set clears it.
    pub fn set_flow(
        &mut self,
        date: NaiveDate,
        level: FlowLevel,
    ) -> Result<Option<FlowLevel>, StorageError> {
        let flow = self.log.upsert(date, |r| {
            if r.flow == Some(level) {
                r.flow = None;
            } else {
                r.period = true;
                r.flow = Some(level);
            }
            r.flow
        });
        let label = flow.map_or("None", FlowLevel::label);
        self.notifier.notify(format!("Flow updated: {label}"));
        self.commit()?;
        Ok(flow)
    }

    /// Set the mood on `date`. Choosing the mood already set clears it.
    pub fn set_mood(&mut self, date: NaiveDate, mood: Mood) -> Result<Option<Mood>, StorageError> {
        let current = self.log.upsert(date, |r| {
            r.mood = if r.mood == Some(mood) { None } else { Some(mood) };
            r.mood
        });
        match current {
            Some(mood) => self.notifier.notify(format!("Mood logged: {}", mood.label())),
            None => self.notifier.notify("Mood cleared"),
        }
        self.commit()?;
        Ok(current)
    }

    /// Replace the notes on `date`. Blank text clears them. The confirmation
    /// is debounced since this is called while the user types.
    pub fn save_notes(&mut self, date: NaiveDate, notes: &str) -> Result<(), StorageError> {
        let trimmed = notes.trim();
        self.log.upsert(date, |r| {
            r.notes = (!trimmed.is_empty()).then(|| trimmed.to_string());
        });
        let message = if trimmed.is_empty() {
            "Notes cleared"
        } else {
            "Notes saved"
        };
        self.notifier.notify_debounced(message, Instant::now());
        self.commit()
    }

    /// Remove everything logged on `date`. Returns whether there was anything.
    pub fn clear_day(&mut self, date: NaiveDate) -> Result<bool, StorageError> {
        let removed = self.log.remove(date).is_some();
        if removed {
            self.notifier.notify("Day data cleared");
        }
        self.commit()?;
        Ok(removed)
    }

    /// Mark `start..=end` as period days, or just `start` when there is no
    /// end or it comes before the start. Returns the number of days marked.
    pub fn log_period_range(
        &mut self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<usize, StorageError> {
        let end = end.filter(|end| *end >= start).unwrap_or(start);
        let mut marked = 0;
        for day in date_key::days_inclusive(start, end) {
            self.log.upsert(day, |r| r.period = true);
            marked += 1;
        }
        self.notifier.notify("Period logged successfully");
        self.commit()?;
        Ok(marked)
    }

    pub fn quick_log_today(&mut self, today: NaiveDate) -> Result<(), StorageError> {
        self.log.upsert(today, |r| r.period = true);
        self.notifier.notify("Today marked as period day");
        self.commit()
    }

    /// Remove the period that begins on `start`, following it for at most
    /// the scan limit. Other data on those days is kept.
    /// Returns how many days were unmarked.
    pub fn delete_period(&mut self, start: NaiveDate) -> Result<u32, StorageError> {
        let mut removed = 0;
        for offset in 0..prediction::MAX_PERIOD_SCAN_DAYS {
            let day = start + Duration::days(i64::from(offset));
            if !self.log.is_period(day) {
                break;
            }
            self.log.upsert(day, |r| r.period = false);
            removed += 1;
        }
        if removed > 0 {
            self.notifier.notify("Period deleted");
        }
        self.commit()?;
        Ok(removed)
    }

    /// Delete the stored log and start over. This is the way out of a
    /// read-only state when the old passphrase is lost.
    pub fn wipe(&mut self) -> Result<(), StorageError> {
        self.store.remove(&self.namespace)?;
        self.log = DayLog::new();
        self.writable = true;
        self.notifier.notify("All data wiped");
        self.recalculate();
        tracing::info!(namespace = %self.namespace, "wiped day log");
        Ok(())
    }

    pub fn stats(&self) -> CycleStats {
        prediction::cycle_stats(&self.log)
    }

    pub fn recent_periods(&self, count: usize) -> Vec<PeriodSummary> {
        prediction::recent_periods(&self.log, count)
    }

    pub fn suggested_next_start(&self, today: NaiveDate) -> NaiveDate {
        prediction::suggested_next_start(&self.log, today)
    }

    pub fn month(&self, year: i32, month: u32, today: NaiveDate) -> Option<MonthData> {
        prediction::month_view(&self.log, &self.predictions, year, month, today)
    }

    pub fn export_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(&self.log)?)
    }
}
