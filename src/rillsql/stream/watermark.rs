//! Event-time progress tracking.
//!
//! The watermark generator watches every contributing stream's maximum
//! event timestamp and exposes the watermark: the minimum across streams
//! minus the late tolerance, monotonically non-decreasing, advancing only
//! once every stream has reported. From the watermark it derives the window
//! boundaries that are safe to trigger, so out-of-order arrivals within the
//! tolerance still land in the right window.

use crate::rillsql::sql::ast::{WindowKind, WindowSpec};
use std::collections::HashMap;

/// Event-time trigger source for one window operator.
#[derive(Debug)]
pub struct WatermarkGenerator {
    spec: WindowSpec,
    late_tolerance_ms: i64,
    streams: Vec<String>,
    stream_max: HashMap<String, i64>,
    earliest: Option<i64>,
    watermark: i64,
    last_boundary: i64,
}

impl WatermarkGenerator {
    pub fn new(spec: WindowSpec, late_tolerance_ms: i64, streams: Vec<String>) -> Self {
        WatermarkGenerator {
            spec,
            late_tolerance_ms,
            streams,
            stream_max: HashMap::new(),
            earliest: None,
            watermark: i64::MIN,
            last_boundary: i64::MIN,
        }
    }

    /// Record an event timestamp observed on `stream`. Streams outside the
    /// contributing set are ignored.
    pub fn observe(&mut self, stream: &str, ts: i64) {
        if !self.streams.iter().any(|s| s == stream) {
            return;
        }
        let max = self.stream_max.entry(stream.to_string()).or_insert(ts);
        if ts > *max {
            *max = ts;
        }
        self.earliest = Some(self.earliest.map_or(ts, |e| e.min(ts)));
    }

    /// Current watermark, or `None` while some stream has yet to report.
    pub fn watermark(&self) -> Option<i64> {
        if self.watermark == i64::MIN {
            None
        } else {
            Some(self.watermark)
        }
    }

    /// Recompute the watermark. Returns the new value only when it moved
    /// forward; the watermark never regresses.
    pub fn advance(&mut self) -> Option<i64> {
        if self.stream_max.len() < self.streams.len() {
            return None;
        }
        let min = self.stream_max.values().copied().min()?;
        let candidate = min - self.late_tolerance_ms;
        if candidate > self.watermark {
            self.watermark = candidate;
            log::trace!("watermark advanced to {}", candidate);
            Some(candidate)
        } else {
            None
        }
    }

    /// Window-end boundaries now covered by the watermark, in ascending
    /// order, each emitted exactly once. `buffered` holds the event
    /// timestamps currently buffered by the window operator; sliding and
    /// session boundaries derive from them.
    pub fn triggers(&mut self, buffered: &[i64]) -> Vec<i64> {
        if self.watermark == i64::MIN {
            return Vec::new();
        }
        let out = match self.spec.kind {
            WindowKind::Tumbling => self.period_boundaries(self.spec.length_ms),
            WindowKind::Hopping => self.period_boundaries(self.spec.interval()),
            WindowKind::Sliding => {
                let mut ends: Vec<i64> = buffered
                    .iter()
                    .copied()
                    .filter(|ts| *ts > self.last_boundary && *ts <= self.watermark)
                    .collect();
                ends.sort_unstable();
                ends.dedup();
                ends
            }
            WindowKind::Session => {
                // A session ends at last-arrival + gap. The gap shows up
                // either between two adjacent buffered timestamps or past
                // the final one; the watermark passing the end confirms no
                // late arrival can still bridge it.
                let gap = self.spec.interval();
                let mut ts: Vec<i64> = buffered.to_vec();
                ts.sort_unstable();
                ts.dedup();
                let mut ends = Vec::new();
                for pair in ts.windows(2) {
                    if pair[1] - pair[0] > gap {
                        ends.push(pair[0] + gap);
                    }
                }
                if let Some(&last) = ts.last() {
                    ends.push(last + gap);
                }
                ends.retain(|end| *end > self.last_boundary && *end <= self.watermark);
                ends
            }
            WindowKind::None => Vec::new(),
        };
        if let Some(&last) = out.last() {
            self.last_boundary = last;
        }
        out
    }

    /// Multiples of `period` past the last emitted boundary, up to the
    /// watermark.
    fn period_boundaries(&self, period: i64) -> Vec<i64> {
        if period <= 0 {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut next = if self.last_boundary == i64::MIN {
            // First boundary at or after the earliest observed event, so a
            // late start does not replay every period since the epoch.
            let earliest = self.earliest.unwrap_or(0);
            let floor = earliest.div_euclid(period) * period;
            if floor == earliest {
                earliest
            } else {
                floor + period
            }
        } else {
            self.last_boundary + period
        };
        while next <= self.watermark {
            out.push(next);
            next += period;
        }
        out
    }
}
