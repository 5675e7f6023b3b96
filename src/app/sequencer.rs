//! Ranked-result highlight runs.
//!
//! A run walks the result list in order, one step per `1s / speed`. Each step
//! highlights a point, links it to the previous step's point and shows its
//! rank label. Steps are scheduled against the frame clock and emitted by
//! [`Sequencer::poll`]; the renderers only ever see them through a
//! [`SequenceOverlay`].

use std::collections::HashMap;

use tracing::{debug, info};

use crate::snapshot::ResultEntry;
use crate::util::format_strength;

pub(crate) const MIN_SPEED: f32 = 0.5;
pub(crate) const MAX_SPEED: f32 = 2.0;
const BASE_STEP_SECS: f64 = 1.0;
pub(crate) const PULSE_SECS: f64 = 1.0;
pub(crate) const PULSE_PEAK: f32 = 1.5;
pub(crate) const TINT_SECS: f64 = 0.3;
const LABEL_SECS: f64 = 3.0;

pub(crate) fn clamp_speed(speed: f32) -> f32 {
    if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        1.0
    }
}

pub(crate) fn rank_label(rank: usize, strength: f32) -> String {
    format!("#{rank} ({})", format_strength(strength))
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SequenceEvent {
    /// Clears previous highlights; always the first event of a run.
    Reset { count: usize },
    Highlight { rank: usize, id: String, strength: f32 },
    Connector { from: String, to: String },
    Label { rank: usize, id: String, text: String },
    Complete,
}

#[derive(Clone, Debug)]
struct ScheduledEvent {
    due: f64,
    event: SequenceEvent,
}

#[derive(Debug)]
struct Run {
    queue: Vec<ScheduledEvent>,
    next: usize,
    started_at: f64,
}

#[derive(Debug, Default)]
pub(crate) struct Sequencer {
    run: Option<Run>,
}

impl Sequencer {
    pub(crate) fn is_animating(&self) -> bool {
        self.run.is_some()
    }

    /// Schedules a run starting at `now`. The speed is read once; later
    /// slider changes do not affect a run in flight. Returns `false` when a
    /// run is already active or there is nothing to show.
    pub(crate) fn start(&mut self, results: &[ResultEntry], speed: f32, now: f64) -> bool {
        if self.run.is_some() {
            debug!("highlight run already active, ignoring start");
            return false;
        }
        if results.is_empty() {
            debug!("no results to highlight");
            return false;
        }

        let step = BASE_STEP_SECS / f64::from(clamp_speed(speed));
        let mut queue = Vec::with_capacity(results.len() * 3 + 2);
        queue.push(ScheduledEvent {
            due: now,
            event: SequenceEvent::Reset {
                count: results.len(),
            },
        });

        for (index, result) in results.iter().enumerate() {
            let due = now + step * index as f64;
            let rank = index + 1;
            queue.push(ScheduledEvent {
                due,
                event: SequenceEvent::Highlight {
                    rank,
                    id: result.id.clone(),
                    strength: result.strength,
                },
            });
            if let Some(previous) = index.checked_sub(1).map(|prev| &results[prev]) {
                queue.push(ScheduledEvent {
                    due,
                    event: SequenceEvent::Connector {
                        from: previous.id.clone(),
                        to: result.id.clone(),
                    },
                });
            }
            queue.push(ScheduledEvent {
                due,
                event: SequenceEvent::Label {
                    rank,
                    id: result.id.clone(),
                    text: rank_label(rank, result.strength),
                },
            });
        }

        queue.push(ScheduledEvent {
            due: now + step * results.len() as f64,
            event: SequenceEvent::Complete,
        });

        info!(
            results = results.len(),
            step_secs = step,
            "starting highlight run"
        );
        self.run = Some(Run {
            queue,
            next: 0,
            started_at: now,
        });
        true
    }

    /// Every event whose time has come, in schedule order.
    pub(crate) fn poll(&mut self, now: f64) -> Vec<SequenceEvent> {
        let Some(run) = self.run.as_mut() else {
            return Vec::new();
        };

        let mut due = Vec::new();
        while let Some(scheduled) = run.queue.get(run.next) {
            if scheduled.due > now {
                break;
            }
            due.push(scheduled.event.clone());
            run.next += 1;
        }

        if run.next >= run.queue.len() {
            debug!(
                elapsed = now - run.started_at,
                "highlight run finished"
            );
            self.run = None;
        }
        due
    }

    /// Drops every pending step.
    pub(crate) fn cancel(&mut self) {
        if let Some(run) = self.run.take() {
            debug!(
                pending = run.queue.len() - run.next,
                "highlight run cancelled"
            );
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StepMark {
    pub(crate) rank: usize,
    pub(crate) strength: f32,
    pub(crate) started_at: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FloatingLabel {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) shown_at: f64,
}

/// What a run has revealed so far. Inactive overlays change nothing.
#[derive(Clone, Debug, Default)]
pub(crate) struct SequenceOverlay {
    active: bool,
    marks: HashMap<String, StepMark>,
    connectors: Vec<(String, String)>,
    labels: Vec<FloatingLabel>,
}

impl SequenceOverlay {
    pub(crate) fn apply(&mut self, event: &SequenceEvent, now: f64) {
        match event {
            SequenceEvent::Reset { .. } => {
                self.clear();
                self.active = true;
            }
            SequenceEvent::Highlight { rank, id, strength } => {
                self.marks.insert(
                    id.clone(),
                    StepMark {
                        rank: *rank,
                        strength: *strength,
                        started_at: now,
                    },
                );
            }
            SequenceEvent::Connector { from, to } => {
                self.connectors.push((from.clone(), to.clone()));
            }
            SequenceEvent::Label { id, text, .. } => {
                self.labels.push(FloatingLabel {
                    id: id.clone(),
                    text: text.clone(),
                    shown_at: now,
                });
            }
            SequenceEvent::Complete => {}
        }
    }

    pub(crate) fn clear(&mut self) {
        self.active = false;
        self.marks.clear();
        self.connectors.clear();
        self.labels.clear();
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn mark(&self, id: &str) -> Option<&StepMark> {
        self.marks.get(id)
    }

    pub(crate) fn connectors(&self) -> &[(String, String)] {
        &self.connectors
    }

    /// Labels still on screen at `now`, with their fade (1 = fully visible).
    pub(crate) fn live_labels(&self, now: f64) -> impl Iterator<Item = (&FloatingLabel, f32)> {
        self.labels.iter().filter_map(move |label| {
            let age = now - label.shown_at;
            (age < LABEL_SECS).then(|| {
                let fade = ((LABEL_SECS - age) / (LABEL_SECS * 0.3)).clamp(0.0, 1.0);
                (label, fade as f32)
            })
        })
    }

    pub(crate) fn has_pending_effects(&self, now: f64) -> bool {
        self.marks
            .values()
            .any(|mark| now - mark.started_at < PULSE_SECS)
            || self.live_labels(now).next().is_some()
    }

    /// Size multiplier: 1 → 1.5 → 1 over one second from the highlight.
    pub(crate) fn pulse_scale(&self, id: &str, now: f64) -> f32 {
        let Some(mark) = self.marks.get(id) else {
            return 1.0;
        };
        let t = ((now - mark.started_at) / PULSE_SECS).clamp(0.0, 1.0) as f32;
        let rise = if t < 0.5 { t * 2.0 } else { (1.0 - t) * 2.0 };
        1.0 + (PULSE_PEAK - 1.0) * rise
    }

    /// Progress of the highlight colour transition, 0..=1.
    pub(crate) fn tint(&self, id: &str, now: f64) -> f32 {
        self.marks
            .get(id)
            .map(|mark| ((now - mark.started_at) / TINT_SECS).clamp(0.0, 1.0) as f32)
            .unwrap_or(0.0)
    }
}
