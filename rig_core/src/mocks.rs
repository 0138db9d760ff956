//! Test and bench doubles for the rig's capability traits, plus a
//! channel-backed serial transport for driving the dispatcher from a host
//! simulator.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;

use rig_traits::{Actuator, Clock, DigitalInput, OutputPin, PixelStrip, Rgb};

use crate::peripherals::Peripherals;

/// Clock whose sleeps advance virtual time instead of blocking, so
/// payload waits, homing seeks, and the sensor test run instantly and
/// deterministically in tests.
#[derive(Debug, Clone)]
pub struct SimClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
        self.origin + off
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// Actuator that reaches its target on the first poll. Physical position
/// is shared so a [`MockEndstop`] can trip at a switch location; commanded
/// speeds are recorded for assertions about the homing profile.
pub struct MockActuator {
    physical: Rc<Cell<i64>>,
    origin: i64,
    target: i64,
    speeds: Rc<RefCell<Vec<u32>>>,
}

impl MockActuator {
    pub fn new() -> Self {
        Self {
            physical: Rc::new(Cell::new(0)),
            origin: 0,
            target: 0,
            speeds: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn physical_position(&self) -> Rc<Cell<i64>> {
        Rc::clone(&self.physical)
    }

    /// Handle that reports commanded speeds after the actuator was moved
    /// into a pipette.
    pub fn speed_log(&self) -> Rc<RefCell<Vec<u32>>> {
        Rc::clone(&self.speeds)
    }
}

impl Default for MockActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl Actuator for MockActuator {
    fn set_max_speed(
        &mut self,
        steps_per_sec: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.speeds.borrow_mut().push(steps_per_sec);
        Ok(())
    }
    fn move_to(&mut self, target: i64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.target = target;
        Ok(())
    }
    fn move_by(&mut self, delta: i64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.target += delta;
        Ok(())
    }
    fn poll(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        self.physical.set(self.origin + self.target);
        Ok(false)
    }
    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.target = self.physical.get() - self.origin;
        Ok(())
    }
    fn set_zero(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.origin = self.physical.get();
        self.target = 0;
        Ok(())
    }
    fn position(&self) -> i64 {
        self.physical.get() - self.origin
    }
}

/// Endstop that trips while the shared physical position is at or past the
/// switch location.
pub struct MockEndstop {
    physical: Rc<Cell<i64>>,
    trip_at: i64,
}

impl MockEndstop {
    pub fn new(physical: Rc<Cell<i64>>, trip_at: i64) -> Self {
        Self { physical, trip_at }
    }
}

impl DigitalInput for MockEndstop {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.physical.get() >= self.trip_at)
    }
}

/// Endstop that never triggers, for exercising the homing timeout.
pub struct StuckEndstop;

impl DigitalInput for StuckEndstop {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(false)
    }
}

/// Input that returns a fixed sequence, then repeats the last value.
pub struct SeqInput {
    seq: VecDeque<bool>,
    last: bool,
}

impl SeqInput {
    pub fn new(seq: impl IntoIterator<Item = bool>) -> Self {
        let seq: VecDeque<bool> = seq.into_iter().collect();
        let last = seq.back().copied().unwrap_or(false);
        Self { seq, last }
    }
}

impl DigitalInput for SeqInput {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(v) = self.seq.pop_front() {
            self.last = v;
            Ok(v)
        } else {
            Ok(self.last)
        }
    }
}

/// Output pin whose read-back can be forced to a stuck level to provoke
/// verification mismatches.
pub struct MockPin {
    level: Rc<Cell<bool>>,
    stuck: Option<bool>,
}

impl MockPin {
    pub fn new() -> Self {
        Self {
            level: Rc::new(Cell::new(false)),
            stuck: None,
        }
    }

    pub fn stuck_at(level: bool) -> Self {
        Self {
            level: Rc::new(Cell::new(level)),
            stuck: Some(level),
        }
    }

    pub fn handle(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.level)
    }
}

impl Default for MockPin {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputPin for MockPin {
    fn set(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.stuck.is_none() {
            self.level.set(on);
        }
        Ok(())
    }
    fn read_back(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.stuck.unwrap_or(self.level.get()))
    }
}

/// In-memory pixel strip; a `dead` index ignores writes so verification
/// paths can be tested.
pub struct MockPixels {
    px: Vec<Rgb>,
    dead: Option<usize>,
}

impl MockPixels {
    pub fn new(len: usize) -> Self {
        Self {
            px: vec![Rgb::OFF; len],
            dead: None,
        }
    }

    pub fn with_dead_pixel(len: usize, dead: usize) -> Self {
        Self {
            px: vec![Rgb::OFF; len],
            dead: Some(dead),
        }
    }
}

impl PixelStrip for MockPixels {
    fn len(&self) -> usize {
        self.px.len()
    }
    fn set_pixel(
        &mut self,
        index: usize,
        color: Rgb,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if Some(index) == self.dead {
            return Ok(());
        }
        if let Some(p) = self.px.get_mut(index) {
            *p = color;
        }
        Ok(())
    }
    fn fill(&mut self, color: Rgb) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for (i, p) in self.px.iter_mut().enumerate() {
            if Some(i) != self.dead {
                *p = color;
            }
        }
        Ok(())
    }
    fn clear(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.fill(Rgb::OFF)
    }
    fn pixel(&self, index: usize) -> Rgb {
        self.px.get(index).copied().unwrap_or(Rgb::OFF)
    }
}

/// A full set of healthy mock peripherals.
pub fn mock_peripherals() -> Peripherals {
    Peripherals {
        ring: Box::new(MockPixels::new(24)),
        dot_a: Box::new(MockPixels::new(1)),
        dot_b: Box::new(MockPixels::new(1)),
        magnet: Box::new(MockPin::new()),
        beam: Box::new(SeqInput::new([false])),
        beam_led: Box::new(MockPin::new()),
    }
}

/// Clonable in-memory write sink, for reading back what the dispatcher
/// emitted after it took ownership of the output half.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Emitted output split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Receiving half of a crossbeam-backed serial link. `read` drains queued
/// chunks, reports `WouldBlock` while senders are alive but idle, and EOF
/// once every sender is dropped, the same contract as a non-blocking
/// serial port.
pub struct ChannelLink {
    rx: xch::Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

/// A host-side sender paired with a [`ChannelLink`].
pub fn channel_link() -> (xch::Sender<Vec<u8>>, ChannelLink) {
    let (tx, rx) = xch::unbounded();
    (
        tx,
        ChannelLink {
            rx,
            pending: VecDeque::new(),
        },
    )
}

impl io::Read for ChannelLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(xch::TryRecvError::Empty) => {
                    return Err(io::Error::from(io::ErrorKind::WouldBlock));
                }
                Err(xch::TryRecvError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        for b in buf.iter_mut().take(n) {
            // n is bounded by pending.len, so pop_front cannot fail here
            *b = self.pending.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}
