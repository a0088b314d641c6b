// Bounded history of recent items for status queries.
// Invariants: fixed capacity; once full, each push evicts the oldest item.

#[derive(Debug)]
pub struct History<T> {
    buf: Vec<T>,
    cap: usize,
    head: usize,
}

impl<T: Clone> History<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            cap: cap.max(1),
            head: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.buf.len() < self.cap {
            self.buf.push(item);
        } else {
            self.buf[self.head] = item;
            self.head = (self.head + 1) % self.cap;
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Up to `n` most recent items, oldest first.
    pub fn latest(&self, n: usize) -> Vec<T> {
        let (wrapped, oldest) = self.buf.split_at(self.head);
        let skip = self.buf.len().saturating_sub(n);
        oldest.iter().chain(wrapped).skip(skip).cloned().collect()
    }
}
