// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Armed flag and start tick shared between the emitter and the edge detector.
//!
//! Both live in one `AtomicU64` (tick in the high half, phase in the low
//! half) so a capture can compare-and-swap `OnTheWay -> Arrived` and read the
//! start tick it raced against in the same operation. A re-arm landing
//! between "load" and "swap" makes the swap fail instead of pairing an old
//! end tick with a new start tick.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignalPhase {
    /// Nothing in flight. Edges are spurious.
    Idle = 0,
    /// A signal left the rig at `start_tick`; the next valid edge captures it.
    OnTheWay = 1,
    /// The current signal has been captured. Further edges are ignored
    /// until the next arm.
    Arrived = 2,
}

impl SignalPhase {
    fn from_bits(bits: u64) -> Self {
        match bits & PHASE_MASK {
            1 => SignalPhase::OnTheWay,
            2 => SignalPhase::Arrived,
            _ => SignalPhase::Idle,
        }
    }
}

const PHASE_MASK: u64 = 0xFF;

#[inline]
fn pack(start_tick: Tick, phase: SignalPhase) -> u64 {
    (u64::from(start_tick) << 32) | phase as u64
}

#[inline]
fn start_of(word: u64) -> Tick {
    (word >> 32) as Tick
}

/// Result of a capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// The signal armed at `start_tick` is now `Arrived`.
    Captured { start_tick: Tick },
    /// State was not `OnTheWay`.
    NotArmed(SignalPhase),
}

#[derive(Debug)]
pub struct SignalState {
    word: AtomicU64,
}

impl SignalState {
    pub fn new() -> Self {
        Self {
            word: AtomicU64::new(pack(0, SignalPhase::Idle)),
        }
    }

    /// Mark a signal as on the way, emitted at `start_tick`.
    pub fn arm(&self, start_tick: Tick) {
        self.word
            .store(pack(start_tick, SignalPhase::OnTheWay), Ordering::Release);
    }

    /// Back to `Idle`; late edges from a previous signal are then spurious.
    pub fn disarm(&self) {
        self.word.store(pack(0, SignalPhase::Idle), Ordering::Release);
    }

    pub fn phase(&self) -> SignalPhase {
        SignalPhase::from_bits(self.word.load(Ordering::Acquire))
    }

    pub fn start_tick(&self) -> Tick {
        start_of(self.word.load(Ordering::Acquire))
    }

    /// Read the armed start tick without changing state.
    pub fn armed_start(&self) -> Option<Tick> {
        let word = self.word.load(Ordering::Acquire);
        (SignalPhase::from_bits(word) == SignalPhase::OnTheWay).then(|| start_of(word))
    }

    /// Transition `OnTheWay -> Arrived` for the signal armed at `start_tick`.
    ///
    /// Fails if the state moved on (captured by another edge, disarmed, or
    /// re-armed with a different start) since the caller observed it.
    pub fn try_capture(&self, start_tick: Tick) -> Capture {
        let expected = pack(start_tick, SignalPhase::OnTheWay);
        match self.word.compare_exchange(
            expected,
            pack(start_tick, SignalPhase::Arrived),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Capture::Captured { start_tick },
            Err(actual) => Capture::NotArmed(SignalPhase::from_bits(actual)),
        }
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_starts_idle() {
        let state = SignalState::new();
        assert_eq!(state.phase(), SignalPhase::Idle);
        assert_eq!(state.armed_start(), None);
    }

    #[test]
    fn test_arm_then_capture() {
        let state = SignalState::new();
        state.arm(4_294_967_200);
        assert_eq!(state.phase(), SignalPhase::OnTheWay);
        assert_eq!(state.armed_start(), Some(4_294_967_200));

        assert_eq!(
            state.try_capture(4_294_967_200),
            Capture::Captured {
                start_tick: 4_294_967_200
            }
        );
        assert_eq!(state.phase(), SignalPhase::Arrived);
        assert_eq!(state.start_tick(), 4_294_967_200);
    }

    #[test]
    fn test_second_capture_fails() {
        let state = SignalState::new();
        state.arm(100);
        assert!(matches!(state.try_capture(100), Capture::Captured { .. }));
        assert_eq!(
            state.try_capture(100),
            Capture::NotArmed(SignalPhase::Arrived)
        );
    }

    #[test]
    fn test_capture_against_stale_start_fails() {
        let state = SignalState::new();
        state.arm(100);
        state.arm(200);
        assert_eq!(
            state.try_capture(100),
            Capture::NotArmed(SignalPhase::OnTheWay)
        );
        assert!(matches!(state.try_capture(200), Capture::Captured { .. }));
    }

    #[test]
    fn test_disarm_rejects_capture() {
        let state = SignalState::new();
        state.arm(10);
        state.disarm();
        assert_eq!(state.try_capture(10), Capture::NotArmed(SignalPhase::Idle));
    }

    #[test]
    fn test_concurrent_captures_only_one_wins() {
        let state = Arc::new(SignalState::new());
        let wins = Arc::new(AtomicUsize::new(0));
        state.arm(42);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                let wins = Arc::clone(&wins);
                thread::spawn(move || {
                    if let Some(start) = state.armed_start() {
                        if let Capture::Captured { .. } = state.try_capture(start) {
                            wins.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
    }
}
