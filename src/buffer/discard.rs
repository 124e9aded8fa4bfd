use crate::domain::LogEvent;
use std::collections::HashMap;

/// Aggregate standing in for the events of one source dropped by backpressure.
#[derive(Debug, Clone)]
pub struct DiscardSummary {
    max_event: LogEvent,
    count: usize,
}

impl DiscardSummary {
    pub fn new(event: LogEvent) -> Self {
        Self {
            max_event: event,
            count: 1,
        }
    }

    /// Count another discarded event, keeping it only if strictly more severe.
    pub fn add(&mut self, event: LogEvent) {
        if event.level() > self.max_event.level() {
            self.max_event = event;
        }
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn representative(&self) -> &LogEvent {
        &self.max_event
    }

    /// Synthetic event written in place of the discarded ones.
    pub fn into_event(self) -> LogEvent {
        let message = format!(
            "Discarded {} messages due to full event buffer including: {}",
            self.count,
            self.max_event.message()
        );
        LogEvent::new(self.max_event.level(), self.max_event.source(), message)
    }
}

/// Per-source discard summaries in order of first discard.
///
/// Keeping first-discard order makes the synthetic events of a drain cycle
/// come out in a stable order instead of hash order.
#[derive(Debug, Default)]
pub struct DiscardLedger {
    summaries: Vec<DiscardSummary>,
    index: HashMap<String, usize>,
}

impl DiscardLedger {
    pub fn record(&mut self, event: LogEvent) {
        match self.index.get(event.source()) {
            Some(&slot) => self.summaries[slot].add(event),
            None => {
                self.index
                    .insert(event.source().to_string(), self.summaries.len());
                self.summaries.push(DiscardSummary::new(event));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Number of distinct sources with a live summary.
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn get(&self, source: &str) -> Option<&DiscardSummary> {
        self.index.get(source).map(|&slot| &self.summaries[slot])
    }

    /// Take every summary, leaving the ledger empty.
    pub fn drain(&mut self) -> Vec<DiscardSummary> {
        self.index.clear();
        std::mem::take(&mut self.summaries)
    }
}
