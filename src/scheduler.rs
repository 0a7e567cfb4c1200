//! Deterministic event scheduler driving the peripheral timers.
//!
//! Time is a nanosecond counter owned by the scheduler; peripherals arm
//! one-shot or periodic events against it and the machine facade drains
//! due events in timestamp order. No wall clock is involved.

pub const TICKS_PER_SEC: u64 = 1_000_000_000;

const INACTIVE: u64 = u64::MAX;

/// Every timer-driven peripheral event in the machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
    /// LCD frame: render and re-arm at the frame rate.
    Lcd,
    /// PWM timer expiry, channels 0..=4.
    Pwm(u8),
    /// IIC byte strobe (one-shot, re-armed on interrupt acknowledge).
    Iic,
    /// IIS sample strobe.
    Iis,
}

struct SchedItem {
    event: Event,
    deadline: u64,
    /// 0 for one-shot events.
    period: u64,
}

pub struct Scheduler {
    now: u64,
    items: Vec<SchedItem>,
}

impl Scheduler {
    pub fn new() -> Self {
        let mut items = Vec::new();
        let mut add = |event| {
            items.push(SchedItem {
                event,
                deadline: INACTIVE,
                period: 0,
            })
        };
        add(Event::Lcd);
        for ch in 0..5 {
            add(Event::Pwm(ch));
        }
        add(Event::Iic);
        add(Event::Iis);
        Scheduler { now: 0, items }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    fn item_mut(&mut self, event: Event) -> &mut SchedItem {
        let idx = self
            .items
            .iter()
            .position(|item| item.event == event)
            .unwrap_or(0);
        &mut self.items[idx]
    }

    fn period_from_hz(hz: f64) -> Option<u64> {
        if !hz.is_finite() || hz <= 0.0 {
            return None;
        }
        Some(((TICKS_PER_SEC as f64 / hz).round() as u64).max(1))
    }

    /// Arm `event` to fire every `1/hz` seconds, first firing one period
    /// from now. A non-positive rate cancels instead.
    pub fn schedule_hz(&mut self, event: Event, hz: f64) {
        let now = self.now;
        match Self::period_from_hz(hz) {
            Some(period) => {
                let item = self.item_mut(event);
                item.deadline = now + period;
                item.period = period;
            }
            None => {
                log::warn!("scheduler: bad rate {hz} for {event:?}, cancelling");
                self.cancel(event);
            }
        }
    }

    /// Arm `event` to fire once, `ns` nanoseconds from now.
    pub fn schedule_oneshot_ns(&mut self, event: Event, ns: u64) {
        let now = self.now;
        let item = self.item_mut(event);
        item.deadline = now + ns;
        item.period = 0;
    }

    pub fn cancel(&mut self, event: Event) {
        let item = self.item_mut(event);
        item.deadline = INACTIVE;
        item.period = 0;
    }

    pub fn is_active(&self, event: Event) -> bool {
        self.items
            .iter()
            .any(|item| item.event == event && item.deadline != INACTIVE)
    }

    /// Advance towards `target`. Returns the next event due at or before
    /// `target` (setting `now` to its deadline and re-arming it if
    /// periodic), or `None` once the window is drained, with `now` at
    /// `target`. Ties resolve in registration order.
    pub fn run_until(&mut self, target: u64) -> Option<Event> {
        let mut best: Option<usize> = None;
        for (idx, item) in self.items.iter().enumerate() {
            if item.deadline > target {
                continue;
            }
            match best {
                Some(b) if self.items[b].deadline <= item.deadline => {}
                _ => best = Some(idx),
            }
        }
        match best {
            Some(idx) => {
                let item = &mut self.items[idx];
                self.now = item.deadline;
                if item.period > 0 {
                    item.deadline += item.period;
                } else {
                    item.deadline = INACTIVE;
                }
                Some(item.event)
            }
            None => {
                self.now = target;
                None
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
