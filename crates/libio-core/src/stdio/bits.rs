//! Bit-level cursor layered over the byte buffer.
//!
//! Bits are produced and consumed most-significant-bit first. The cursor
//! holds at most one partial byte; full bytes are exchanged with the byte
//! layer as soon as they complete.
//!
//! The cursor is a tagged state so a pending partial byte cannot be
//! forgotten: the only way to leave the `Reading`/`Writing` states without
//! finishing the byte is [`BitCursor::resolve`], whose result tells the
//! stream whether a zero-padded byte must be committed or bits were
//! dropped.

/// Sub-byte accumulator.
///
/// Invariant: `remaining` and `filled` are in `1..=7`; a cursor with no
/// pending bits is always `Clean`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BitCursor {
    /// No partial byte; byte and bit operations may interleave freely.
    #[default]
    Clean,
    /// `byte` was drawn from the byte layer; its low `remaining` bits have
    /// not been handed out yet.
    Reading { byte: u8, remaining: u8 },
    /// `filled` bits have been written into the high end of `byte`; the
    /// rest are zero.
    Writing { byte: u8, filled: u8 },
}

/// What the stream must do with the partial byte after [`BitCursor::resolve`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingBits {
    /// Nothing was pending.
    None,
    /// A write-side partial byte, already zero-padded, to commit.
    Commit(u8),
    /// A read-side partial byte was dropped; this many bits were unread.
    Discarded(u8),
}

impl BitCursor {
    /// Number of valid pending bits (0 when clean).
    pub fn pending_bits(&self) -> u8 {
        match *self {
            BitCursor::Clean => 0,
            BitCursor::Reading { remaining, .. } => remaining,
            BitCursor::Writing { filled, .. } => filled,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, BitCursor::Clean)
    }

    pub fn is_reading(&self) -> bool {
        matches!(self, BitCursor::Reading { .. })
    }

    pub fn is_writing(&self) -> bool {
        matches!(self, BitCursor::Writing { .. })
    }

    /// Hand out the next buffered read bit, if any.
    pub fn take_bit(&mut self) -> Option<u8> {
        let BitCursor::Reading { byte, remaining } = *self else {
            return None;
        };
        let bit = (byte >> (remaining - 1)) & 1;
        *self = if remaining == 1 {
            BitCursor::Clean
        } else {
            BitCursor::Reading {
                byte,
                remaining: remaining - 1,
            }
        };
        Some(bit)
    }

    /// Start consuming a fresh byte and return its most significant bit.
    ///
    /// The cursor must be clean.
    pub fn load_and_take(&mut self, byte: u8) -> u8 {
        debug_assert!(self.is_clean(), "loading over pending bits");
        *self = BitCursor::Reading { byte, remaining: 8 };
        // A freshly loaded cursor always has a bit to give.
        self.take_bit().unwrap_or(0)
    }

    /// Accept one bit (`true` = 1). Returns the completed byte when this
    /// bit fills it; the cursor is then clean again.
    ///
    /// The cursor must not be in the reading state.
    pub fn push_bit(&mut self, bit: bool) -> Option<u8> {
        debug_assert!(!self.is_reading(), "writing over unread bits");
        let (byte, filled) = match *self {
            BitCursor::Writing { byte, filled } => (byte, filled),
            _ => (0, 0),
        };
        let byte = byte | (u8::from(bit) << (7 - filled));
        let filled = filled + 1;
        if filled == 8 {
            *self = BitCursor::Clean;
            Some(byte)
        } else {
            *self = BitCursor::Writing { byte, filled };
            None
        }
    }

    /// Leave the cursor clean, reporting what happened to the partial byte.
    pub fn resolve(&mut self) -> PendingBits {
        let outcome = match *self {
            BitCursor::Clean => PendingBits::None,
            BitCursor::Reading { remaining, .. } => PendingBits::Discarded(remaining),
            BitCursor::Writing { byte, .. } => PendingBits::Commit(byte),
        };
        *self = BitCursor::Clean;
        outcome
    }
}
