//! Interaction tracker
//!
//! Owns the counters, the first-interaction flag and the snapshot baseline for
//! one page. Handlers are invoked by the host one at a time and each runs to
//! completion, so the tracker needs no synchronization.

use crate::baseline::{InteractionCounters, SnapshotBaseline};
use crate::config::TrackerConfig;
use crate::encoder::DataLayerEncoder;
use crate::error::TrackerError;
use crate::schedule::TimerTick;
use crate::sink::EventSink;
use crate::types::{Classification, InteractionEvent, InteractionKind, RETURN_ACTION};
use log::debug;
use uuid::Uuid;

/// Lifecycle of a tracker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No qualifying interaction seen yet
    AwaitingFirstInteraction,
    /// The first-interaction push has been sent; terminal
    SteadyState,
}

pub struct InteractionTracker<S: EventSink> {
    counters: InteractionCounters,
    state: TrackerState,
    previous_record: SnapshotBaseline,
    encoder: DataLayerEncoder,
    sink: S,
    instance_id: Uuid,
}

impl<S: EventSink> InteractionTracker<S> {
    /// Create a tracker emitting under `event_category`
    pub fn new(event_category: impl Into<String>, sink: S) -> Self {
        Self {
            counters: InteractionCounters::default(),
            state: TrackerState::AwaitingFirstInteraction,
            previous_record: SnapshotBaseline::new(),
            encoder: DataLayerEncoder::new(event_category),
            sink,
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn from_config(config: &TrackerConfig, sink: S) -> Self {
        Self::new(config.category(), sink)
    }

    pub fn on_mouse_move(&mut self) -> Result<(), TrackerError> {
        self.count_and_maybe_emit(InteractionKind::MouseMove)
    }

    pub fn on_touch_start(&mut self) -> Result<(), TrackerError> {
        self.count_and_maybe_emit(InteractionKind::TouchStart)
    }

    pub fn on_scroll(&mut self) -> Result<(), TrackerError> {
        self.count_and_maybe_emit(InteractionKind::Scroll)
    }

    pub fn on_click(&mut self) -> Result<(), TrackerError> {
        self.count_and_maybe_emit(InteractionKind::Click)
    }

    /// Count a keydown. Enter always emits `"Return"` and leaves the
    /// first-interaction flag untouched.
    pub fn on_key_down(&mut self, is_enter: bool) -> Result<(), TrackerError> {
        self.counters.increment(InteractionKind::KeyDown);
        if is_enter {
            self.emit(RETURN_ACTION, false)
        } else {
            self.emit_if_first(InteractionKind::KeyDown.action_label())
        }
    }

    /// Route a host event to its handler
    pub fn dispatch(&mut self, event: &InteractionEvent) -> Result<(), TrackerError> {
        match event.kind {
            InteractionKind::MouseMove => self.on_mouse_move(),
            InteractionKind::TouchStart => self.on_touch_start(),
            InteractionKind::Scroll => self.on_scroll(),
            InteractionKind::KeyDown => self.on_key_down(event.is_enter()),
            InteractionKind::Click => self.on_click(),
        }
    }

    /// Timer callback: compare against the last snapshot
    pub fn on_timer(&mut self, tick: &TimerTick) -> Result<(), TrackerError> {
        self.emit(&tick.label, false)
    }

    /// Emit a first-interaction push if none has been sent yet
    pub fn emit_if_first(&mut self, action: &str) -> Result<(), TrackerError> {
        if self.state == TrackerState::AwaitingFirstInteraction {
            self.emit(action, true)?;
            self.state = TrackerState::SteadyState;
        }
        Ok(())
    }

    /// Push one payload, then snapshot the counters.
    ///
    /// A failed push leaves the snapshot untouched.
    pub fn emit(&mut self, action: &str, is_first: bool) -> Result<(), TrackerError> {
        let classification = if is_first {
            Classification::FIRST_PUSH
        } else {
            self.previous_record.classify(&self.counters)
        };

        let payload = self.encoder.encode(action, classification);
        self.sink.push(payload)?;
        debug!(
            "tracker {} pushed {} ({})",
            self.instance_id,
            action,
            classification.as_str()
        );

        self.previous_record.replace(&self.counters);
        Ok(())
    }

    fn count_and_maybe_emit(&mut self, kind: InteractionKind) -> Result<(), TrackerError> {
        self.counters.increment(kind);
        self.emit_if_first(kind.action_label())
    }

    pub fn counters(&self) -> &InteractionCounters {
        &self.counters
    }

    pub fn previous_record(&self) -> &InteractionCounters {
        self.previous_record.record()
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_first_interaction(&self) -> bool {
        self.state == TrackerState::AwaitingFirstInteraction
    }

    pub fn event_category(&self) -> &str {
        self.encoder.event_category()
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Swap the sink for a wrapper around it, keeping all tracker state
    pub fn map_sink<T: EventSink>(self, f: impl FnOnce(S) -> T) -> InteractionTracker<T> {
        InteractionTracker {
            counters: self.counters,
            state: self.state,
            previous_record: self.previous_record,
            encoder: self.encoder,
            sink: f(self.sink),
            instance_id: self.instance_id,
        }
    }
}
