// Virtual transport clock with scheduled cues and an optional loop region

pub type EventId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Started,
    Paused,
}

/// A cue reached during `advance`
#[derive(Debug, Clone, PartialEq)]
pub struct Due<E> {
    pub id: EventId,
    /// Timeline position of the cue
    pub time: f64,
    /// Elapsed clock time since start when the cue fired
    pub at: f64,
    pub event: E,
}

#[derive(Debug, Clone)]
struct Scheduled<E> {
    id: EventId,
    time: f64,
    event: E,
}

/// Timeline of cues driven by explicit `advance` calls.
///
/// `position` is the timeline cursor and wraps inside the loop region;
/// `clock` only moves forward.
#[derive(Debug)]
pub struct Transport<E> {
    state: TransportState,
    position: f64,
    clock: f64,
    loop_region: Option<(f64, f64)>,
    events: Vec<Scheduled<E>>,
    next_id: EventId,
}

impl<E: Clone> Default for Transport<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> Transport<E> {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            position: 0.0,
            clock: 0.0,
            loop_region: None,
            events: Vec::new(),
            next_id: 1,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn loop_region(&self) -> Option<(f64, f64)> {
        self.loop_region
    }

    /// Number of cues still on the timeline
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn schedule(&mut self, time: f64, event: E) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        // Same-time cues keep scheduling order
        let index = self.events.partition_point(|e| e.time <= time);
        self.events.insert(index, Scheduled { id, time, event });
        id
    }

    /// Remove one cue. Returns false if it already fired or was removed.
    pub fn clear(&mut self, id: EventId) -> bool {
        match self.events.iter().position(|e| e.id == id) {
            Some(index) => {
                self.events.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every cue
    pub fn cancel(&mut self) {
        self.events.clear();
    }

    /// Loop `[start, end)`. Ignored unless `end > start`.
    pub fn set_loop(&mut self, start: f64, end: f64) {
        if end > start && start >= 0.0 {
            self.loop_region = Some((start, end));
        }
    }

    pub fn clear_loop(&mut self) {
        self.loop_region = None;
    }

    pub fn start(&mut self) {
        self.state = TransportState::Started;
    }

    pub fn pause(&mut self) {
        if self.state == TransportState::Started {
            self.state = TransportState::Paused;
        }
    }

    /// Halt and rewind to zero
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position = 0.0;
        self.clock = 0.0;
    }

    /// Move the clock forward by `dt` seconds and return the cues reached, in
    /// time order. Outside the loop region, cues fire once and are consumed;
    /// cues inside the region stay on the timeline and fire on every pass.
    pub fn advance(&mut self, dt: f64) -> Vec<Due<E>> {
        let mut due = Vec::new();
        if self.state != TransportState::Started || dt <= 0.0 {
            return due;
        }

        let mut remaining = dt;
        loop {
            match self.loop_region {
                Some((start, end)) if self.position < end && self.position + remaining >= end => {
                    let consumed = end - self.position;
                    self.collect(self.position, end, &mut due);
                    self.clock += consumed;
                    remaining -= consumed;
                    self.position = start;
                }
                _ => {
                    let to = self.position + remaining;
                    self.collect(self.position, to, &mut due);
                    self.clock += remaining;
                    self.position = to;
                    break;
                }
            }
        }

        let (region, position) = (self.loop_region, self.position);
        self.events.retain(|e| match region {
            Some((start, end)) => (e.time >= start && e.time < end) || e.time >= position,
            None => e.time >= position,
        });
        due
    }

    /// Cues in `[from, to)`; the window starts at the current clock
    fn collect(&self, from: f64, to: f64, out: &mut Vec<Due<E>>) {
        let first = self.events.partition_point(|e| e.time < from);
        for e in self.events[first..].iter().take_while(|e| e.time < to) {
            out.push(Due {
                id: e.id,
                time: e.time,
                at: self.clock + (e.time - from),
                event: e.event.clone(),
            });
        }
    }
}
