//! Least-significant-digit radix sort on `u32` keys.
//!
//! Each pass is a stable counting sort over one 8-bit digit. Passes stop as
//! soon as the remaining digits of the largest key are all zero, so small
//! key ranges (the bucket table is sized to the particle count) need only
//! one or two passes.

const DIGIT_BITS: u32 = 8;
const BUCKETS: usize = 1 << DIGIT_BITS;
const DIGIT_MASK: u32 = (BUCKETS as u32) - 1;

/// Stable sort of `items` ascending by `key`.
///
/// `scratch` is a reusable buffer; its contents on return are unspecified.
pub fn radix_sort_by_key<T, K>(items: &mut Vec<T>, scratch: &mut Vec<T>, key: K)
where
    T: Copy,
    K: Fn(&T) -> u32,
{
    let n = items.len();
    if n < 2 {
        return;
    }
    let max_key = items.iter().map(&key).max().unwrap_or(0);

    scratch.clear();
    scratch.extend_from_slice(items);

    let mut shift = 0u32;
    while shift < u32::BITS && (max_key >> shift) > 0 {
        let mut counts = [0usize; BUCKETS];
        for item in items.iter() {
            counts[((key(item) >> shift) & DIGIT_MASK) as usize] += 1;
        }

        // Exclusive prefix sum: first output slot of each digit value.
        let mut running = 0usize;
        for count in counts.iter_mut() {
            let c = *count;
            *count = running;
            running += c;
        }

        // Forward scatter keeps equal digits in input order (stability).
        for item in items.iter() {
            let digit = ((key(item) >> shift) & DIGIT_MASK) as usize;
            scratch[counts[digit]] = *item;
            counts[digit] += 1;
        }

        std::mem::swap(items, scratch);
        shift += DIGIT_BITS;
    }
}

/// Index of the first entry whose key is smaller than its predecessor's,
/// or `None` when `items` is non-decreasing by `key`.
pub fn first_unsorted<T, K>(items: &[T], key: K) -> Option<usize>
where
    K: Fn(&T) -> u32,
{
    items
        .windows(2)
        .position(|w| key(&w[0]) > key(&w[1]))
        .map(|i| i + 1)
}
