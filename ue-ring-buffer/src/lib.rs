//! A fixed-capacity byte ring buffer shared between an interrupt handler and the main loop.
//!
//! The buffer does not own its storage; it borrows a byte slice from the caller. One byte of that
//! slice always stays unused so that "full" and "empty" can be told apart from the two cursors
//! alone.
//!
//! The write cursor belongs to the producer and the read cursor to the consumer. Each side reads
//! its own cursor freely; reading the other side's cursor and publishing a new value of its own
//! happen inside a [`critical_section`]. The bytes themselves are copied outside of any critical
//! section, since producer and consumer never touch the same slot at the same time.


#![cfg_attr(not(test), no_std)]


use core::cell::Cell;
use core::fmt;

use log::{debug, trace};
use vcell::VolatileCell;


pub struct RingBuffer<'s> {
    storage: &'s [Cell<u8>],
    read_pos: VolatileCell<usize>,
    write_pos: VolatileCell<usize>,
}
impl<'s> RingBuffer<'s> {
    /// Creates a ring buffer on top of the given storage.
    ///
    /// The buffer can hold at most `storage.len() - 1` bytes. Storage shorter than two bytes is
    /// accepted, but such a buffer is always full and always empty.
    pub fn new(storage: &'s mut [u8]) -> Self {
        let ring_buffer = Self {
            storage: Cell::from_mut(storage).as_slice_of_cells(),
            read_pos: VolatileCell::new(0),
            write_pos: VolatileCell::new(0),
        };
        ring_buffer.rewind();
        debug!("ring buffer initialized with capacity {}", ring_buffer.capacity());
        ring_buffer
    }

    /// The number of bytes this buffer can hold.
    pub const fn capacity(&self) -> usize {
        self.storage.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        let (read_pos, write_pos) = self.cursors();
        self.distance(read_pos, write_pos)
    }

    pub fn is_empty(&self) -> bool {
        let (read_pos, write_pos) = self.cursors();
        read_pos == write_pos
    }

    pub fn is_full(&self) -> bool {
        let (read_pos, write_pos) = self.cursors();
        self.next_pos(write_pos) == read_pos
    }

    /// Appends a byte. Returns `false` and drops the byte if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        self.push_byte(byte)
    }

    /// Removes the oldest byte. Returns `None` if the buffer is empty.
    pub fn pop(&mut self) -> Option<u8> {
        self.pop_byte()
    }

    /// Empties the buffer, moving both cursors back to the start of the storage.
    pub fn reset(&mut self) {
        self.rewind();
        debug!("ring buffer of capacity {} reset", self.capacity());
    }

    /// Splits the buffer into a producer half and a consumer half.
    ///
    /// The halves may be moved into different execution contexts (e.g. an interrupt handler and
    /// the main loop) and used concurrently. The buffer itself stays borrowed until both halves
    /// are gone.
    pub fn split(&mut self) -> (Producer<'_>, Consumer<'_>) {
        let ring_buffer: &RingBuffer<'_> = self;
        (
            Producer { ring_buffer },
            Consumer { ring_buffer },
        )
    }

    fn rewind(&self) {
        critical_section::with(|_| {
            self.read_pos.set(0);
            self.write_pos.set(0);
        });
    }

    const fn next_pos(&self, pos: usize) -> usize {
        let next = pos + 1;
        // also covers storage of length 0 and 1, where 0 is the only position
        if next >= self.storage.len() {
            0
        } else {
            next
        }
    }

    const fn distance(&self, read_pos: usize, write_pos: usize) -> usize {
        if write_pos >= read_pos {
            write_pos - read_pos
        } else {
            self.storage.len() - read_pos + write_pos
        }
    }

    /// Takes a consistent snapshot of (read_pos, write_pos).
    fn cursors(&self) -> (usize, usize) {
        critical_section::with(|_| (self.read_pos.get(), self.write_pos.get()))
    }

    // Must only ever be called from the one context that owns the write cursor.
    fn push_byte(&self, byte: u8) -> bool {
        // only we write write_pos, so no need to protect reading it
        let write_pos = self.write_pos.get();
        let read_pos = critical_section::with(|_| self.read_pos.get());

        let new_write_pos = self.next_pos(write_pos);
        if new_write_pos == read_pos {
            trace!("ring buffer of capacity {} full; dropping byte", self.capacity());
            return false;
        }

        // the consumer cannot see this slot until write_pos moves past it
        self.storage[write_pos].set(byte);

        critical_section::with(|_| self.write_pos.set(new_write_pos));
        true
    }

    // Must only ever be called from the one context that owns the read cursor.
    fn pop_byte(&self) -> Option<u8> {
        let read_pos = self.read_pos.get();
        let write_pos = critical_section::with(|_| self.write_pos.get());

        if read_pos == write_pos {
            return None;
        }

        // the producer cannot overwrite this slot until read_pos moves past it
        let byte = self.storage[read_pos].get();

        let new_read_pos = self.next_pos(read_pos);
        critical_section::with(|_| self.read_pos.set(new_read_pos));
        Some(byte)
    }

    fn peek_byte(&self) -> Option<u8> {
        let read_pos = self.read_pos.get();
        let write_pos = critical_section::with(|_| self.write_pos.get());

        if read_pos == write_pos {
            None
        } else {
            Some(self.storage[read_pos].get())
        }
    }
}
impl fmt::Debug for RingBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (read_pos, write_pos) = self.cursors();
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.distance(read_pos, write_pos))
            .field("read_pos", &read_pos)
            .field("write_pos", &write_pos)
            .finish()
    }
}

// SAFETY: the storage slice was created from an exclusive borrow, so nothing outside of this
// buffer can alias it; moving the whole buffer to another context moves all access with it.
unsafe impl Send for RingBuffer<'_> {}


/// The writing half of a [`RingBuffer`], obtained from [`RingBuffer::split`].
pub struct Producer<'r> {
    ring_buffer: &'r RingBuffer<'r>,
}
impl Producer<'_> {
    /// Appends a byte. Returns `false` and drops the byte if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        self.ring_buffer.push_byte(byte)
    }

    pub fn is_full(&self) -> bool { self.ring_buffer.is_full() }
    pub fn len(&self) -> usize { self.ring_buffer.len() }
    pub fn capacity(&self) -> usize { self.ring_buffer.capacity() }
}
impl fmt::Debug for Producer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Producer")
            .field(self.ring_buffer)
            .finish()
    }
}

// SAFETY: there is exactly one producer per split buffer, and it only ever writes the write cursor
// and the slot at the write cursor. The consumer only reads these after observing the new write
// cursor inside a critical section.
unsafe impl Send for Producer<'_> {}


/// The reading half of a [`RingBuffer`], obtained from [`RingBuffer::split`].
pub struct Consumer<'r> {
    ring_buffer: &'r RingBuffer<'r>,
}
impl<'r> Consumer<'r> {
    /// Removes the oldest byte. Returns `None` if the buffer is empty.
    pub fn pop(&mut self) -> Option<u8> {
        self.ring_buffer.pop_byte()
    }

    /// Returns the oldest byte without removing it.
    pub fn peek(&self) -> Option<u8> {
        self.ring_buffer.peek_byte()
    }

    /// Pops bytes until the buffer is empty.
    ///
    /// Bytes pushed while the iterator is in use are yielded as well.
    pub fn drain(&mut self) -> Drain<'_, 'r> {
        Drain { consumer: self }
    }

    pub fn is_empty(&self) -> bool { self.ring_buffer.is_empty() }
    pub fn len(&self) -> usize { self.ring_buffer.len() }
    pub fn capacity(&self) -> usize { self.ring_buffer.capacity() }
}
impl fmt::Debug for Consumer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Consumer")
            .field(self.ring_buffer)
            .finish()
    }
}

// SAFETY: there is exactly one consumer per split buffer, and it only ever writes the read cursor.
// It reads the slot at the read cursor, which the producer does not write until it has observed the
// new read cursor inside a critical section.
unsafe impl Send for Consumer<'_> {}


pub struct Drain<'c, 'r> {
    consumer: &'c mut Consumer<'r>,
}
impl Iterator for Drain<'_, '_> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        self.consumer.pop()
    }
}
