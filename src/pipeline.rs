//! Host scheduler
//!
//! Stands in for the page's event loop: activates a tracker, then dispatches
//! input events and timer ticks strictly one at a time in time order.
//!
//! A failing callback is reported and the loop carries on with the next one,
//! as a browser does with an exception thrown from a listener.

use crate::adapter::{parse_session, to_timeline, Session};
use crate::config::TrackerConfig;
use crate::encoder::DataLayerEncoder;
use crate::error::TrackerError;
use crate::schedule::{TimerSchedule, TimerTick};
use crate::sink::{DataLayer, EventSink, HostQueue};
use crate::tracker::InteractionTracker;
use crate::types::{DataLayerEvent, InteractionEvent};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

/// A payload together with the time it was pushed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    /// Milliseconds since page ready
    pub at_ms: u64,
    pub payload: DataLayerEvent,
}

/// A callback that raised instead of completing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchFailure {
    pub at_ms: u64,
    /// DOM event name or tick label
    pub source: String,
    pub message: String,
}

/// Outcome of replaying one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub activated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub emissions: Vec<Emission>,
    pub failures: Vec<DispatchFailure>,
}

impl ReplayReport {
    fn not_activated() -> Self {
        Self {
            activated: false,
            instance_id: None,
            emissions: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Pushed payloads in queue order
    pub fn payloads(&self) -> Vec<DataLayerEvent> {
        self.emissions.iter().map(|e| e.payload.clone()).collect()
    }
}

/// Sink wrapper that stamps each successful push with the scheduler clock
#[derive(Debug)]
pub struct ClockedSink<S: EventSink> {
    inner: S,
    now_ms: u64,
    pending: Vec<Emission>,
}

impl<S: EventSink> ClockedSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            now_ms: 0,
            pending: Vec::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn set_now(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }
}

impl<S: EventSink> EventSink for ClockedSink<S> {
    fn push(&mut self, event: DataLayerEvent) -> Result<(), TrackerError> {
        self.inner.push(event.clone())?;
        self.pending.push(Emission {
            at_ms: self.now_ms,
            payload: event,
        });
        Ok(())
    }
}

/// What the page offers the tracker at activation
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    /// Whether the DOM helper library is loaded
    pub helper_available: bool,
    /// The queue the page defined, if any
    pub data_layer: Option<DataLayer>,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            helper_available: true,
            data_layer: Some(DataLayer::new()),
        }
    }
}

/// Activate a tracker on page ready.
///
/// Returns `None` with a warning when the DOM helper is missing; the page then
/// runs without tracking.
pub fn activate(
    host: &HostEnvironment,
    config: &TrackerConfig,
) -> Option<InteractionTracker<HostQueue>> {
    if !host.helper_available {
        warn!("DOM helper library is not available; tracker not activated");
        return None;
    }

    let queue = HostQueue::resolve(host.data_layer.clone(), config.queue_policy());
    if queue.queue().is_none() {
        warn!("event queue is not defined; pushes will fail");
    }

    let tracker = InteractionTracker::from_config(config, queue);
    info!(
        "tracker {} activated ({})",
        tracker.instance_id(),
        tracker.event_category()
    );
    Some(tracker)
}

/// Incremental scheduler for a live page
pub struct LiveDriver<S: EventSink> {
    tracker: InteractionTracker<ClockedSink<S>>,
    schedule: TimerSchedule,
    next_tick: usize,
    now_ms: u64,
    failures: Vec<DispatchFailure>,
}

impl<S: EventSink> LiveDriver<S> {
    pub fn new(tracker: InteractionTracker<S>, schedule: TimerSchedule) -> Self {
        Self {
            tracker: tracker.map_sink(ClockedSink::new),
            schedule,
            next_tick: 0,
            now_ms: 0,
            failures: Vec::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Ticks that have not fired yet
    pub fn pending_ticks(&self) -> &[TimerTick] {
        &self.schedule.ticks()[self.next_tick..]
    }

    /// Move the clock forward, firing every tick due at or before `at_ms`
    pub fn advance_to(&mut self, at_ms: u64) -> Result<(), TrackerError> {
        if at_ms < self.now_ms {
            return Err(TrackerError::InvalidEvent(format!(
                "event at {}ms arrived after the clock reached {}ms",
                at_ms, self.now_ms
            )));
        }
        self.fire_due_ticks(at_ms);
        self.now_ms = at_ms;
        Ok(())
    }

    /// Dispatch an input event at `at_ms`; due ticks fire first.
    ///
    /// An event older than the clock is recorded as a failure and skipped.
    pub fn dispatch(&mut self, at_ms: u64, event: &InteractionEvent) {
        if let Err(e) = self.advance_to(at_ms) {
            self.record_failure(at_ms, event.kind.dom_event(), e);
            return;
        }
        self.tracker.sink_mut().set_now(at_ms);
        if let Err(e) = self.tracker.dispatch(event) {
            self.record_failure(at_ms, event.kind.dom_event(), e);
        }
    }

    /// Fire the remaining ticks up to `until_ms`, or all of them
    pub fn finish(&mut self, until_ms: Option<u64>) {
        self.fire_due_ticks(until_ms.unwrap_or(u64::MAX));
    }

    /// Emissions since the last call, in push order
    pub fn take_emissions(&mut self) -> Vec<Emission> {
        std::mem::take(&mut self.tracker.sink_mut().pending)
    }

    /// Failures since the last call
    pub fn take_failures(&mut self) -> Vec<DispatchFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn tracker(&self) -> &InteractionTracker<ClockedSink<S>> {
        &self.tracker
    }

    fn fire_due_ticks(&mut self, horizon_ms: u64) {
        while let Some(tick) = self.schedule.get(self.next_tick) {
            if tick.delay_ms > horizon_ms {
                break;
            }
            let tick = tick.clone();
            self.next_tick += 1;
            self.now_ms = self.now_ms.max(tick.delay_ms);
            self.tracker.sink_mut().set_now(tick.delay_ms);
            if let Err(e) = self.tracker.on_timer(&tick) {
                self.record_failure(tick.delay_ms, &tick.label, e);
            }
        }
    }

    fn record_failure(&mut self, at_ms: u64, source: &str, e: TrackerError) {
        error!("callback {} at {}ms raised: {}", source, at_ms, e);
        self.failures.push(DispatchFailure {
            at_ms,
            source: source.to_string(),
            message: e.to_string(),
        });
    }
}

/// Deterministic replay of recorded sessions
#[derive(Debug, Clone, Default)]
pub struct Replay {
    config: TrackerConfig,
    until_ms: Option<u64>,
}

impl Replay {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            until_ms: None,
        }
    }

    /// Unload the page at `until_ms`: later inputs and ticks never run
    pub fn with_until(mut self, until_ms: u64) -> Self {
        self.until_ms = Some(until_ms);
        self
    }

    pub fn run(&self, session: &Session) -> Result<ReplayReport, TrackerError> {
        let timeline = to_timeline(session)?;
        let schedule = self.config.schedule()?;

        let host = HostEnvironment {
            helper_available: session.helper_available,
            data_layer: session.data_layer_defined.then(DataLayer::new),
        };
        let Some(tracker) = activate(&host, &self.config) else {
            return Ok(ReplayReport::not_activated());
        };
        let instance_id = tracker.instance_id().to_string();

        let mut driver = LiveDriver::new(tracker, schedule);
        for timed in &timeline {
            if self.until_ms.is_some_and(|until| timed.at_ms > until) {
                break;
            }
            driver.dispatch(timed.at_ms, &timed.event);
        }
        driver.finish(self.until_ms);

        Ok(ReplayReport {
            activated: true,
            instance_id: Some(instance_id),
            emissions: driver.take_emissions(),
            failures: driver.take_failures(),
        })
    }
}

/// Replay session JSON and return the pushed payloads as a JSON array (one-shot)
pub fn replay_to_json(session_json: &str, config: &TrackerConfig) -> Result<String, TrackerError> {
    let session = parse_session(session_json)?;
    let report = Replay::new(config.clone()).run(&session)?;
    DataLayerEncoder::encode_to_json(&report.payloads())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Variant;
    use crate::sink::RecordingSink;
    use crate::types::{Classification, InteractionKind};
    use pretty_assertions::assert_eq;

    fn run(variant: Variant, events: Vec<InteractionEvent>) -> ReplayReport {
        Replay::new(TrackerConfig::new(variant))
            .run(&Session::from_events(events))
            .unwrap()
    }

    fn summary(report: &ReplayReport) -> Vec<(u64, String, Classification)> {
        report
            .emissions
            .iter()
            .map(|e| (e.at_ms, e.payload.event_action.clone(), e.payload.event_label))
            .collect()
    }

    #[test]
    fn test_no_interaction_first_tick_inactive() {
        let report = Replay::new(TrackerConfig::default())
            .with_until(5_000)
            .run(&Session::from_events(Vec::new()))
            .unwrap();

        assert_eq!(
            summary(&report),
            vec![(5_000, "5 seconds".to_string(), Classification::Inactive)]
        );
    }

    #[test]
    fn test_single_click_then_idle() {
        let report = run(
            Variant::Classic,
            vec![InteractionEvent::new(InteractionKind::Click, 1_000)],
        );

        let s = summary(&report);
        assert_eq!(s[0], (1_000, "Click".to_string(), Classification::Active));
        assert_eq!(s[1], (5_000, "5 seconds".to_string(), Classification::Inactive));
        assert_eq!(s.len(), 5);
        assert!(s[2..].iter().all(|(_, _, c)| *c == Classification::Inactive));
    }

    #[test]
    fn test_continuous_scroll_until_nineteen_seconds() {
        let events = (0..19_000)
            .step_by(250)
            .map(|t| InteractionEvent::new(InteractionKind::Scroll, t))
            .collect();
        let report = run(Variant::Classic, events);

        assert_eq!(
            summary(&report),
            vec![
                (0, "Scroll".to_string(), Classification::Active),
                (5_000, "5 seconds".to_string(), Classification::Active),
                (19_000, "19 seconds".to_string(), Classification::Active),
                (39_000, "39 seconds".to_string(), Classification::Inactive),
                (67_000, "67 seconds".to_string(), Classification::Inactive),
            ]
        );
    }

    #[test]
    fn test_ticks_fire_regardless_of_activity() {
        let busy: Vec<InteractionEvent> = (0..300_000)
            .step_by(1_000)
            .map(|t| InteractionEvent::new(InteractionKind::MouseMove, t))
            .collect();

        for (variant, expected) in [(Variant::Classic, 4), (Variant::Extended, 7)] {
            let idle = run(variant, Vec::new());
            let active = run(variant, busy.clone());
            let ticks = |r: &ReplayReport| {
                r.emissions
                    .iter()
                    .filter(|e| e.payload.event_action.ends_with("seconds"))
                    .map(|e| e.at_ms)
                    .collect::<Vec<_>>()
            };
            assert_eq!(ticks(&idle), variant.delays_ms().to_vec());
            assert_eq!(ticks(&active), variant.delays_ms().to_vec());
            assert_eq!(ticks(&idle).len(), expected);
        }
    }

    #[test]
    fn test_tick_fires_before_simultaneous_input() {
        let report = run(
            Variant::Classic,
            vec![InteractionEvent::new(InteractionKind::TouchStart, 5_000)],
        );
        let s = summary(&report);
        assert_eq!(s[0], (5_000, "5 seconds".to_string(), Classification::Inactive));
        assert_eq!(s[1], (5_000, "Touch".to_string(), Classification::Active));
        assert_eq!(s[2], (19_000, "19 seconds".to_string(), Classification::Inactive));
    }

    #[test]
    fn test_enter_key_reported_and_compared() {
        let report = run(
            Variant::Classic,
            vec![
                InteractionEvent::key_down(2_000, 13),
                InteractionEvent::key_down(3_000, 65),
            ],
        );
        let s = summary(&report);
        assert_eq!(s[0], (2_000, "Return".to_string(), Classification::Active));
        assert_eq!(s[1], (3_000, "KeyDown".to_string(), Classification::Active));
        assert_eq!(s[2], (5_000, "5 seconds".to_string(), Classification::Inactive));
    }

    #[test]
    fn test_unload_horizon_drops_later_work() {
        let report = Replay::new(TrackerConfig::default())
            .with_until(20_000)
            .run(&Session::from_events(vec![
                InteractionEvent::new(InteractionKind::Click, 10_000),
                InteractionEvent::new(InteractionKind::Click, 30_000),
            ]))
            .unwrap();

        let actions: Vec<String> = summary(&report).into_iter().map(|(_, a, _)| a).collect();
        assert_eq!(actions, vec!["5 seconds", "Click", "19 seconds"]);
    }

    #[test]
    fn test_missing_helper_skips_activation() {
        let mut session = Session::from_events(vec![InteractionEvent::new(
            InteractionKind::Click,
            0,
        )]);
        session.helper_available = false;

        let report = Replay::new(TrackerConfig::default()).run(&session).unwrap();
        assert!(!report.activated);
        assert!(report.emissions.is_empty());
        assert!(report.instance_id.is_none());
    }

    #[test]
    fn test_classic_without_queue_reports_every_callback() {
        let mut session = Session::from_events(vec![InteractionEvent::new(
            InteractionKind::Scroll,
            1_000,
        )]);
        session.data_layer_defined = false;

        let report = Replay::new(TrackerConfig::new(Variant::Classic))
            .run(&session)
            .unwrap();
        assert!(report.activated);
        assert!(report.emissions.is_empty());

        let sources: Vec<&str> = report.failures.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["scroll", "5 seconds", "19 seconds", "39 seconds", "67 seconds"]
        );
    }

    #[test]
    fn test_extended_creates_missing_queue() {
        let mut session = Session::from_events(Vec::new());
        session.data_layer_defined = false;

        let report = Replay::new(TrackerConfig::new(Variant::Extended))
            .run(&session)
            .unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.emissions.len(), 7);
        assert_eq!(
            report.emissions[6].payload.event_category,
            "Firebrand User Events Extended"
        );
    }

    #[test]
    fn test_live_driver_skips_late_event_and_keeps_going() {
        let tracker = InteractionTracker::new("cat", RecordingSink::new());
        let mut driver = LiveDriver::new(tracker, Variant::Classic.schedule());

        let event = InteractionEvent::new(InteractionKind::Click, 0);
        driver.dispatch(6_000, &event);
        assert_eq!(driver.pending_ticks().len(), 3);
        driver.dispatch(1_000, &event);
        driver.dispatch(20_000, &event);

        let failures = driver.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].at_ms, 1_000);
        assert_eq!(failures[0].source, "click");
        assert_eq!(driver.tracker().counters().click_count, 2);

        let emitted: Vec<String> = driver
            .take_emissions()
            .into_iter()
            .map(|e| e.payload.event_action)
            .collect();
        assert_eq!(emitted, vec!["5 seconds", "Click", "19 seconds"]);
        assert!(driver.advance_to(10_000).is_err());
        assert_eq!(driver.tracker().sink().inner().events().len(), 3);
    }

    #[test]
    fn test_replay_to_json() {
        let json = r#"{
            "page_ready_at": "2024-01-15T14:00:00Z",
            "events": [
                { "type": "mousemove", "timestamp": "2024-01-15T14:00:00.500Z" }
            ]
        }"#;

        let output = replay_to_json(json, &TrackerConfig::default()).unwrap();
        let payloads: Vec<DataLayerEvent> = serde_json::from_str(&output).unwrap();
        assert_eq!(payloads.len(), 5);
        assert_eq!(payloads[0].event_action, "MouseMove");
        assert_eq!(payloads[0].event, "GAEvent");
        assert!(payloads[0].non_interaction);
    }
}
