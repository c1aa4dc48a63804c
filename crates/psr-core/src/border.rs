//! Out-of-range index folding for windowed operators.
//! `pub(crate)` only.

/// Half-sample symmetric reflection: `d c b a | a b c d | d c b a`.
/// Handles offsets more than one period away.
pub(crate) fn reflect(i: isize, n: usize) -> usize {
    debug_assert!(n > 0);
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m < n { m } else { period - 1 - m }) as usize
}

/// Whole-sample symmetric reflection: `d c b | a b c d | c b a`.
pub(crate) fn reflect101(i: isize, n: usize) -> usize {
    debug_assert!(n > 0);
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * n - 2;
    let m = i.rem_euclid(period);
    (if m < n { m } else { period - m }) as usize
}
