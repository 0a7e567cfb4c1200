use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Single-producer / single-consumer ring buffer of stereo i16 frames.
///
/// The IIS unit (producer) feeds an audio callback thread (consumer)
/// without locks. Each frame is packed into one `AtomicU32` slot, so no
/// unsafe cell juggling is needed.
///
/// This queue is *lossy* when full: new pushes are dropped.
#[derive(Clone)]
pub struct SampleProducer {
    inner: Arc<Inner>,
}

#[derive(Clone)]
pub struct SampleConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    // One extra slot so head==tail is unambiguously empty.
    buf: Box<[AtomicU32]>,
    cap: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl Inner {
    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head - tail
        } else {
            (self.cap - tail) + head
        }
    }

    fn capacity_frames(&self) -> usize {
        self.cap.saturating_sub(1)
    }

    #[inline]
    fn next_index(&self, idx: usize) -> usize {
        let next = idx + 1;
        if next == self.cap { 0 } else { next }
    }
}

#[inline]
fn pack(left: i16, right: i16) -> u32 {
    ((left as u16 as u32) << 16) | (right as u16 as u32)
}

#[inline]
fn unpack(word: u32) -> (i16, i16) {
    ((word >> 16) as u16 as i16, word as u16 as i16)
}

pub fn sample_queue(capacity_frames: usize) -> (SampleProducer, SampleConsumer) {
    let cap = capacity_frames.saturating_add(1).max(2);
    let mut v = Vec::with_capacity(cap);
    for _ in 0..cap {
        v.push(AtomicU32::new(0));
    }

    let inner = Arc::new(Inner {
        buf: v.into_boxed_slice(),
        cap,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });

    (
        SampleProducer {
            inner: Arc::clone(&inner),
        },
        SampleConsumer { inner },
    )
}

impl SampleProducer {
    #[inline]
    pub fn push_stereo(&self, left: i16, right: i16) -> bool {
        let head = self.inner.head.load(Ordering::Relaxed);
        let next = self.inner.next_index(head);
        let tail = self.inner.tail.load(Ordering::Acquire);
        if next == tail {
            // Full: drop newest.
            return false;
        }

        self.inner.buf[head].store(pack(left, right), Ordering::Relaxed);
        self.inner.head.store(next, Ordering::Release);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity_frames(&self) -> usize {
        self.inner.capacity_frames()
    }
}

impl SampleConsumer {
    #[inline]
    pub fn pop_stereo(&self) -> Option<(i16, i16)> {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        let head = self.inner.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }

        let frame = self.inner.buf[tail].load(Ordering::Relaxed);
        let next = self.inner.next_index(tail);
        self.inner.tail.store(next, Ordering::Release);
        Some(unpack(frame))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity_frames(&self) -> usize {
        self.inner.capacity_frames()
    }
}
