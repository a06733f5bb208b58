//! Bit primitives behind descriptor decoding.
//!
//! `gather` and `scatter` walk the mask one set bit at a time, lowest first.
//! They are exact for every input; address decoding depends on it.

/// Packs the bits of `value` found at the set positions of `mask` into the
/// low end of the result, preserving their order.
pub fn gather(value: usize, mut mask: usize) -> usize {
    let mut out = 0;
    let mut bit = 1usize;
    while mask != 0 {
        let lowest = mask & mask.wrapping_neg();
        if value & lowest != 0 { out |= bit; }
        bit <<= 1;
        mask &= mask - 1;
    }
    out
}

/// Spreads the low bits of `value` over the set positions of `mask`.
pub fn scatter(value: usize, mut mask: usize) -> usize {
    let mut out = 0;
    let mut bit = 1usize;
    while mask != 0 {
        let lowest = mask & mask.wrapping_neg();
        if value & bit != 0 { out |= lowest; }
        bit <<= 1;
        mask &= mask - 1;
    }
    out
}

/// Highest set bit of `n`, or 0.
pub fn highest_bit(n: usize) -> usize {
    if n == 0 { 0 } else { 1 << (usize::BITS - 1 - n.leading_zeros()) }
}

/// Sets every bit below the highest set bit of `n`.
pub fn fill_below_highest(n: usize) -> usize {
    if n == 0 { 0 } else { usize::MAX >> n.leading_zeros() }
}
