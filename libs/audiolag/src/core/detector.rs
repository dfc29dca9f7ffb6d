// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Edge detector - runs on the GPIO callback thread
//!
//! The detector never touches the measurement series. It decides whether an
//! edge completes the signal in flight and posts the outcome to the
//! sequencer, which owns the series and statistics.

use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::core::{Capture, EdgeEvent, Level, SignalPhase, SignalState, Tick};

/// Why an edge did not produce a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Falling edge; only rising edges end a measurement.
    FallingEdge,
    /// No signal in flight (noise, or a late edge after disarm).
    NotArmed,
    /// The signal in flight was already captured (transistor bounce).
    AlreadyArrived,
}

/// Posted by the detector for every edge it sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorEvent {
    SampleCaptured {
        latency_us: u32,
        start_tick: Tick,
        end_tick: Tick,
    },
    /// The edge ended a signal but the latency was negative (the
    /// measurement straddled a tick wraparound). State stays `OnTheWay`.
    SampleRejected {
        start_tick: Tick,
        end_tick: Tick,
    },
    EdgeIgnored {
        tick: Tick,
        reason: IgnoreReason,
    },
}

/// Latency between two ticks, or `None` if the end precedes the start.
///
/// The ticks are compared as plain integers, not modulo 2^32: a measurement
/// whose end tick wrapped past zero comes out negative and is dropped. This
/// loses at most one sample per 71 minutes of uptime and never produces a
/// corrupt value.
pub fn latency_between(start_tick: Tick, end_tick: Tick) -> Option<u32> {
    let latency = i64::from(end_tick) - i64::from(start_tick);
    u32::try_from(latency).ok()
}

/// Edge-triggered capture bound to the line-in pin.
#[derive(Clone)]
pub struct EdgeDetector {
    state: Arc<SignalState>,
    events: Sender<DetectorEvent>,
}

impl EdgeDetector {
    pub fn new(state: Arc<SignalState>, events: Sender<DetectorEvent>) -> Self {
        Self { state, events }
    }

    /// Handle one edge. Returns the committed latency, if any.
    pub fn on_edge(&self, edge: EdgeEvent) -> Option<u32> {
        let event = self.classify(edge);
        tracing::trace!(pin = edge.pin, tick = edge.tick, ?event, "line-in edge");

        // A closed channel means the run is over; the edge is irrelevant.
        let _ = self.events.send(event);

        match event {
            DetectorEvent::SampleCaptured { latency_us, .. } => Some(latency_us),
            _ => None,
        }
    }

    fn classify(&self, edge: EdgeEvent) -> DetectorEvent {
        if edge.level != Level::High {
            return DetectorEvent::EdgeIgnored {
                tick: edge.tick,
                reason: IgnoreReason::FallingEdge,
            };
        }

        let Some(start_tick) = self.state.armed_start() else {
            let reason = match self.state.phase() {
                SignalPhase::Arrived => IgnoreReason::AlreadyArrived,
                _ => IgnoreReason::NotArmed,
            };
            return DetectorEvent::EdgeIgnored {
                tick: edge.tick,
                reason,
            };
        };

        let Some(latency_us) = latency_between(start_tick, edge.tick) else {
            return DetectorEvent::SampleRejected {
                start_tick,
                end_tick: edge.tick,
            };
        };

        match self.state.try_capture(start_tick) {
            Capture::Captured { start_tick } => DetectorEvent::SampleCaptured {
                latency_us,
                start_tick,
                end_tick: edge.tick,
            },
            Capture::NotArmed(phase) => DetectorEvent::EdgeIgnored {
                tick: edge.tick,
                reason: match phase {
                    SignalPhase::Arrived => IgnoreReason::AlreadyArrived,
                    _ => IgnoreReason::NotArmed,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn detector() -> (
        EdgeDetector,
        Arc<SignalState>,
        crossbeam_channel::Receiver<DetectorEvent>,
    ) {
        let state = Arc::new(SignalState::new());
        let (tx, rx) = unbounded();
        (EdgeDetector::new(Arc::clone(&state), tx), state, rx)
    }

    #[test]
    fn test_latency_between() {
        assert_eq!(latency_between(1_000, 31_000), Some(30_000));
        assert_eq!(latency_between(5, 5), Some(0));
        assert_eq!(latency_between(4_294_967_200, 50), None);
        assert_eq!(latency_between(0, u32::MAX), Some(u32::MAX));
    }

    #[test]
    fn test_capture_while_armed() {
        let (detector, state, rx) = detector();
        state.arm(1_000);

        assert_eq!(detector.on_edge(EdgeEvent::rising(4, 31_000)), Some(30_000));
        assert_eq!(state.phase(), SignalPhase::Arrived);
        assert_eq!(
            rx.try_recv().unwrap(),
            DetectorEvent::SampleCaptured {
                latency_us: 30_000,
                start_tick: 1_000,
                end_tick: 31_000
            }
        );
    }

    #[test]
    fn test_duplicate_edges_commit_once() {
        let (detector, state, rx) = detector();
        state.arm(1_000);

        assert_eq!(detector.on_edge(EdgeEvent::rising(4, 2_000)), Some(1_000));
        assert_eq!(detector.on_edge(EdgeEvent::rising(4, 2_050)), None);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            DetectorEvent::SampleCaptured { latency_us: 1_000, .. }
        ));
        assert_eq!(
            events[1],
            DetectorEvent::EdgeIgnored {
                tick: 2_050,
                reason: IgnoreReason::AlreadyArrived
            }
        );
    }

    #[test]
    fn test_spurious_edge_without_signal() {
        let (detector, state, rx) = detector();

        assert_eq!(detector.on_edge(EdgeEvent::rising(4, 77)), None);
        assert_eq!(state.phase(), SignalPhase::Idle);
        assert_eq!(
            rx.try_recv().unwrap(),
            DetectorEvent::EdgeIgnored {
                tick: 77,
                reason: IgnoreReason::NotArmed
            }
        );
    }

    #[test]
    fn test_wraparound_is_rejected_and_stays_armed() {
        let (detector, state, rx) = detector();
        state.arm(4_294_967_200);

        assert_eq!(detector.on_edge(EdgeEvent::rising(4, 50)), None);
        assert_eq!(state.phase(), SignalPhase::OnTheWay);
        assert_eq!(
            rx.try_recv().unwrap(),
            DetectorEvent::SampleRejected {
                start_tick: 4_294_967_200,
                end_tick: 50
            }
        );
    }

    #[test]
    fn test_falling_edge_ignored() {
        let (detector, state, _rx) = detector();
        state.arm(10);

        let falling = EdgeEvent {
            pin: 4,
            level: Level::Low,
            tick: 20,
        };
        assert_eq!(detector.on_edge(falling), None);
        assert_eq!(state.phase(), SignalPhase::OnTheWay);
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (detector, state, rx) = detector();
        drop(rx);
        state.arm(0);
        assert_eq!(detector.on_edge(EdgeEvent::rising(4, 10)), Some(10));
    }
}
