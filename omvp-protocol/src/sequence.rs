//! Sequence Number Handling
//!
//! OMVP stamps every packet with an 8-bit sequence number. Both peers keep a
//! counter that advances once per delivered, non-event packet and wraps
//! from 255 back to 0.

use std::fmt;
use std::ops::{Add, AddAssign};

/// Sequence number with 8-bit wraparound semantics
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct SeqNumber(u8);

impl SeqNumber {
    /// Create a new sequence number
    #[inline]
    pub const fn new(value: u8) -> Self {
        SeqNumber(value)
    }

    /// Get the raw sequence number value
    #[inline]
    pub const fn as_raw(self) -> u8 {
        self.0
    }

    /// Increment the sequence number by 1
    #[inline]
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Get the next sequence number
    #[inline]
    pub fn next(self) -> Self {
        SeqNumber(self.0.wrapping_add(1))
    }

    /// Forward distance from this sequence number to `other`, modulo 256
    #[inline]
    pub fn distance_to(self, other: SeqNumber) -> u8 {
        other.0.wrapping_sub(self.0)
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for SeqNumber {
    fn from(value: u8) -> Self {
        SeqNumber(value)
    }
}

impl From<SeqNumber> for u8 {
    fn from(seq: SeqNumber) -> u8 {
        seq.0
    }
}

impl Add<u8> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u8) -> SeqNumber {
        SeqNumber(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u8> for SeqNumber {
    fn add_assign(&mut self, rhs: u8) {
        self.0 = self.0.wrapping_add(rhs);
    }
}
