//! The bounded single-producer/single-consumer frame ring between the
//! transfer loop and the frame consumer.
//!
//! Slots move by value: the producer takes an empty slot out, fills it, and
//! publishes it; the consumer takes it back out in FIFO order and returns it
//! to the free pool. A slot is never visible to both ends at once. Every
//! blocking wait polls the shared abort flag.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::timecode::{TcIndex, Timecode};
use crate::{AbortFlag, Error, Result};

/// Default ring depth per channel.
pub const DEFAULT_RING_SLOTS: usize = 7;

/// How often blocked ring waits re-check the abort flag.
const ABORT_POLL: Duration = Duration::from_millis(10);

/// One host-side frame: video, audio, both ancillary fields, timecodes,
/// and the actual byte counts reported by the last transfer into it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSlot {
    pub video: Vec<u8>,
    pub audio: Vec<u8>,
    pub anc_f1: Vec<u8>,
    pub anc_f2: Vec<u8>,
    pub timecodes: std::collections::BTreeMap<TcIndex, Timecode>,
    pub audio_bytes: usize,
    pub anc_f1_bytes: usize,
    pub anc_f2_bytes: usize,
}

impl FrameSlot {
    /// Allocate a slot with worst-case buffer sizes.
    pub fn with_sizes(video: usize, audio: usize, anc_f1: usize, anc_f2: usize) -> FrameSlot {
        FrameSlot {
            video: vec![0; video],
            audio: vec![0; audio],
            anc_f1: vec![0; anc_f1],
            anc_f2: vec![0; anc_f2],
            ..FrameSlot::default()
        }
    }
}

#[derive(Debug, Default)]
struct RingState {
    free: VecDeque<FrameSlot>,
    filled: VecDeque<FrameSlot>,
}

/// The fixed-capacity SPSC ring.
#[derive(Debug)]
pub struct FrameRing {
    state: Mutex<RingState>,
    space: Condvar,
    data: Condvar,
    abort: Arc<AbortFlag>,
    capacity: usize,
}

impl FrameRing {
    /// Build a ring owning the given slots. Capacity is the slot count.
    pub fn new(slots: Vec<FrameSlot>, abort: Arc<AbortFlag>) -> FrameRing {
        let capacity = slots.len();
        FrameRing {
            state: Mutex::new(RingState { free: slots.into(), filled: VecDeque::new() }),
            space: Condvar::new(),
            data: Condvar::new(),
            abort,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Published frames waiting to be consumed.
    pub fn level(&self) -> usize {
        self.state.lock().unwrap().filled.len()
    }

    /// Take the next write slot, blocking while the ring is full.
    pub fn start_produce(&self) -> Result<FrameSlot> {
        let mut state = self.state.lock().unwrap();
        loop {
            if self.abort.is_raised() {
                return Err(Error::Aborted);
            }
            if let Some(slot) = state.free.pop_front() {
                return Ok(slot);
            }
            let (next, _) = self.space.wait_timeout(state, ABORT_POLL).unwrap();
            state = next;
        }
    }

    /// Publish a filled slot, making it visible to the consumer.
    pub fn end_produce(&self, slot: FrameSlot) {
        let mut state = self.state.lock().unwrap();
        state.filled.push_back(slot);
        drop(state);
        self.data.notify_one();
    }

    /// Take the oldest published slot, blocking while the ring is empty.
    pub fn start_consume(&self) -> Result<FrameSlot> {
        let mut state = self.state.lock().unwrap();
        loop {
            if self.abort.is_raised() {
                return Err(Error::Aborted);
            }
            if let Some(slot) = state.filled.pop_front() {
                return Ok(slot);
            }
            let (next, _) = self.data.wait_timeout(state, ABORT_POLL).unwrap();
            state = next;
        }
    }

    /// Recycle a consumed slot back to the producer.
    pub fn end_consume(&self, slot: FrameSlot) {
        let mut state = self.state.lock().unwrap();
        state.free.push_back(slot);
        drop(state);
        self.space.notify_one();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ring_of(n: usize, abort: &Arc<AbortFlag>) -> FrameRing {
        let slots = (0..n).map(|_| FrameSlot::default()).collect();
        FrameRing::new(slots, abort.clone())
    }

    #[test]
    fn slots_move_fifo() {
        let abort = Arc::new(AbortFlag::new());
        let ring = ring_of(3, &abort);
        for tag in 0..3u8 {
            let mut slot = ring.start_produce().unwrap();
            slot.video = vec![tag];
            ring.end_produce(slot);
        }
        for tag in 0..3u8 {
            let slot = ring.start_consume().unwrap();
            assert_eq!(vec![tag], slot.video);
            ring.end_consume(slot);
        }
    }

    #[test]
    fn abort_unblocks_waits() {
        let abort = Arc::new(AbortFlag::new());
        let ring = Arc::new(ring_of(1, &abort));
        // exhaust the free pool so the producer would block
        let held = ring.start_produce().unwrap();
        let worker = {
            let ring = ring.clone();
            std::thread::spawn(move || ring.start_produce())
        };
        std::thread::sleep(Duration::from_millis(30));
        abort.raise();
        assert_eq!(Err(Error::Aborted), worker.join().unwrap());
        drop(held);
    }

    #[test]
    fn spsc_interleaving_consumes_each_slot_exactly_once() {
        // P4: across a threaded producer/consumer interleaving, every
        // produced sequence number is consumed exactly once, in order.
        const TOTAL: u64 = 500;
        let abort = Arc::new(AbortFlag::new());
        let ring = Arc::new(ring_of(4, &abort));

        let producer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                for seq in 0..TOTAL {
                    let mut slot = ring.start_produce().unwrap();
                    slot.video = seq.to_le_bytes().to_vec();
                    ring.end_produce(slot);
                }
            })
        };
        let consumer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                for _ in 0..TOTAL {
                    let slot = ring.start_consume().unwrap();
                    seen.push(u64::from_le_bytes(slot.video[..8].try_into().unwrap()));
                    ring.end_consume(slot);
                }
                seen
            })
        };

        producer.join().unwrap();
        let seen = consumer.join().unwrap();
        let expected: Vec<u64> = (0..TOTAL).collect();
        assert_eq!(expected, seen);
    }
}
