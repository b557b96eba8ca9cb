// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! An ordered set of disjoint, non-touching `u64` ranges.
//!
//! This backs the receiver-side record of packet numbers that have been seen: rather
//! than storing one entry per packet number, runs of consecutive numbers collapse into
//! a single `(low, count)` subrange. The common case is a handful of subranges (most
//! connections see packets mostly in order), so storage lives inline until that stops
//! being true.

use alloc::vec::Vec;
use core::cmp::Ordering;
use smallvec::SmallVec;

/// Subranges are kept inline until a set holds more than this many of them.
const INLINE_LEN: usize = 4;

type Storage = SmallVec<[Subrange; INLINE_LEN]>;

/// A single `[low, low + count)` run of packet numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Subrange {
    low: u64,
    count: u64,
}

impl Subrange {
    #[inline]
    fn high(&self) -> u64 {
        // count is always >= 1 for a live subrange
        self.low + (self.count - 1)
    }

    #[inline]
    fn contains(&self, value: u64) -> bool {
        (self.low..=self.high()).contains(&value)
    }

    /// True if `other` overlaps or is adjacent to `self` such that the two should be
    /// merged into a single subrange.
    #[inline]
    fn touches(&self, low: u64, high: u64) -> bool {
        // use saturating arithmetic so a subrange touching u64::MAX doesn't overflow
        // when computing "one past the end"
        self.low <= high.saturating_add(1) && low <= self.high().saturating_add(1)
    }
}

/// An ordered, non-overlapping, non-touching set of `u64` ranges with a configurable
/// maximum number of subranges.
///
/// When an insertion would exceed the configured limit, the smallest existing
/// subrange is dropped ("aged out") to make room rather than failing the insertion.
#[derive(Clone, Debug)]
pub struct Ranges {
    subranges: Storage,
    max_ranges: usize,
}

impl Default for Ranges {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl Ranges {
    /// Creates an empty set that will hold at most `max_ranges` disjoint subranges
    /// before aging out the smallest one on insert.
    #[inline]
    pub fn new(max_ranges: usize) -> Self {
        Self {
            subranges: SmallVec::new(),
            max_ranges: max_ranges.max(1),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subranges.is_empty()
    }

    /// The number of disjoint subranges currently stored.
    #[inline]
    pub fn interval_len(&self) -> usize {
        self.subranges.len()
    }

    /// The smallest value in the set, if any.
    #[inline]
    pub fn min_value(&self) -> Option<u64> {
        self.subranges.first().map(|s| s.low)
    }

    /// The largest value in the set, if any.
    #[inline]
    pub fn max_value(&self) -> Option<u64> {
        self.subranges.last().map(|s| s.high())
    }

    /// Returns `(count_from_value_to_end_of_subrange, is_last_subrange)` if `value`
    /// is contained in the set.
    #[inline]
    pub fn get(&self, value: u64) -> Option<(u64, bool)> {
        let idx = self.find(value).ok()?;
        let subrange = self.subranges[idx];
        let count = subrange.high() - value + 1;
        let is_last = idx == self.subranges.len() - 1;
        Some((count, is_last))
    }

    #[inline]
    pub fn contains(&self, value: u64) -> bool {
        self.find(value).is_ok()
    }

    /// Inserts a single value. Returns `true` if the set changed.
    #[inline]
    pub fn insert_value(&mut self, value: u64) -> bool {
        self.insert_range(value, 1)
    }

    /// Inserts the half-open range `[low, low + count)`. Returns `true` if the set
    /// changed. A `count` of `0` is a no-op.
    pub fn insert_range(&mut self, low: u64, count: u64) -> bool {
        if count == 0 {
            return false;
        }
        let high = low + (count - 1);

        // find the span of existing subranges that overlap or touch [low, high]
        let mut first_touching = None;
        let mut last_touching = None;
        for (idx, subrange) in self.subranges.iter().enumerate() {
            if subrange.touches(low, high) {
                first_touching.get_or_insert(idx);
                last_touching = Some(idx);
            } else if subrange.low > high.saturating_add(1) {
                break;
            }
        }

        let changed;
        match (first_touching, last_touching) {
            (Some(first), Some(last)) => {
                let merged_low = self.subranges[first].low.min(low);
                let merged_high = self.subranges[last].high().max(high);
                let was_exact = first == last
                    && self.subranges[first].low == merged_low
                    && self.subranges[first].high() == merged_high;
                self.subranges.drain(first..=last);
                self.subranges.insert(
                    first,
                    Subrange {
                        low: merged_low,
                        count: merged_high - merged_low + 1,
                    },
                );
                changed = !was_exact;
            }
            _ => {
                let idx = self
                    .subranges
                    .iter()
                    .position(|s| s.low > low)
                    .unwrap_or(self.subranges.len());
                self.subranges.insert(idx, Subrange { low, count });
                changed = true;
            }
        }

        self.age_out_if_needed();

        changed
    }

    /// Removes the half-open range `[low, low + count)`. Never fails; absent input is
    /// a no-op.
    pub fn remove_range(&mut self, low: u64, count: u64) {
        if count == 0 {
            return;
        }
        let high = low + (count - 1);

        let mut result: Storage = SmallVec::with_capacity(self.subranges.len() + 1);
        for subrange in self.subranges.drain(..) {
            if subrange.high() < low || subrange.low > high {
                // no overlap
                result.push(subrange);
                continue;
            }

            if subrange.low < low {
                // keep the left remainder
                result.push(Subrange {
                    low: subrange.low,
                    count: low - subrange.low,
                });
            }
            if subrange.high() > high {
                // keep the right remainder
                result.push(Subrange {
                    low: high + 1,
                    count: subrange.high() - high,
                });
            }
        }
        self.subranges = result;
    }

    /// Removes all values less than `m`.
    #[inline]
    pub fn set_minimum(&mut self, m: u64) {
        if m == 0 {
            return;
        }
        self.remove_range(0, m);
    }

    /// Merges any adjacent or overlapping pairs left over from prior operations, and
    /// shrinks the backing storage back towards the inline threshold once usage drops
    /// low enough that the extra capacity isn't earning its keep.
    pub fn compact(&mut self) {
        let mut idx = 0;
        while idx + 1 < self.subranges.len() {
            let (left, right) = (self.subranges[idx], self.subranges[idx + 1]);
            if left.touches(right.low, right.high()) {
                let merged = Subrange {
                    low: left.low.min(right.low),
                    count: left.high().max(right.high()) - left.low.min(right.low) + 1,
                };
                self.subranges[idx] = merged;
                self.subranges.remove(idx + 1);
            } else {
                idx += 1;
            }
        }

        let capacity = self.subranges.capacity();
        let used = self.subranges.len();
        if capacity >= 4 * INLINE_LEN && used < capacity / 8 {
            self.shrink(capacity / 2);
        }
    }

    /// Explicitly reallocates the backing storage to `new_cap`. A `new_cap` of
    /// [`INLINE_LEN`] or smaller restores the inline buffer.
    pub fn shrink(&mut self, new_cap: usize) {
        let target = new_cap.max(self.subranges.len());
        let mut replacement: Storage = SmallVec::with_capacity(target);
        replacement.extend(self.subranges.drain(..));
        self.subranges = replacement;
    }

    /// Drops the smallest subrange (ties broken by lowest `low`) if the set is over
    /// its configured limit. The newly inserted subrange is just as eligible as any
    /// other: this only bounds the *number* of subranges retained, not which ones.
    fn age_out_if_needed(&mut self) {
        while self.subranges.len() > self.max_ranges {
            let victim = self
                .subranges
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| match a.count.cmp(&b.count) {
                    Ordering::Equal => a.low.cmp(&b.low),
                    other => other,
                })
                .map(|(idx, _)| idx)
                .expect("subranges is non-empty");
            self.subranges.remove(victim);
        }
    }

    #[inline]
    fn find(&self, value: u64) -> Result<usize, usize> {
        self.subranges
            .binary_search_by(|subrange| {
                if value < subrange.low {
                    Ordering::Greater
                } else if value > subrange.high() {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
    }

    /// Iterates subranges as `(low, high_inclusive)` pairs, newest (largest) first.
    pub fn inclusive_ranges_newest_first(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.subranges
            .iter()
            .rev()
            .map(|s| (s.low, s.high()))
    }

    /// Collects the set's subranges as `(low, high_inclusive)` pairs, ascending.
    pub fn to_vec(&self) -> Vec<(u64, u64)> {
        self.subranges.iter().map(|s| (s.low, s.high())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_split() {
        let mut ranges = Ranges::new(10);
        ranges.insert_range(10, 11); // [10, 20]
        ranges.insert_range(20, 5); // extends to [10, 24]... wait overlapping by one
        assert_eq!(ranges.to_vec(), vec![(10, 24)]);

        let mut ranges = Ranges::new(10);
        ranges.insert_range(10, 11); // [10, 20]
        ranges.insert_range(22, 3); // [22, 24], disjoint (gap at 21)
        assert_eq!(ranges.to_vec(), vec![(10, 20), (22, 24)]);

        ranges.remove_range(12, 3); // remove [12, 14] from [10, 20]
        assert_eq!(ranges.to_vec(), vec![(10, 11), (15, 20), (22, 24)]);

        ranges.set_minimum(15);
        assert_eq!(ranges.to_vec(), vec![(15, 20), (22, 24)]);
    }

    #[test]
    fn eager_merge_of_adjacent_ranges_after_partial_removal() {
        let mut ranges = Ranges::new(10);
        ranges.insert_range(10, 11); // [10, 20]
        ranges.insert_range(20, 5); // touches/overlaps -> [10, 24]
        ranges.remove_range(12, 3); // [12, 14]
        assert_eq!(ranges.to_vec(), vec![(10, 11), (15, 24)]);

        ranges.set_minimum(15);
        assert_eq!(ranges.to_vec(), vec![(15, 24)]);
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let mut ranges = Ranges::new(10);
        assert!(ranges.insert_value(5));
        assert!(!ranges.insert_value(5));
        assert_eq!(ranges.interval_len(), 1);
    }

    #[test]
    fn get_reports_remaining_count_and_last_flag() {
        let mut ranges = Ranges::new(10);
        ranges.insert_range(0, 5); // [0, 4]
        ranges.insert_range(10, 5); // [10, 14]

        let (count, is_last) = ranges.get(2).unwrap();
        assert_eq!(count, 3); // 2,3,4
        assert!(!is_last);

        let (count, is_last) = ranges.get(12).unwrap();
        assert_eq!(count, 3); // 12,13,14
        assert!(is_last);

        assert!(ranges.get(7).is_none());
    }

    #[test]
    fn ages_out_smallest_subrange_when_over_capacity() {
        let mut ranges = Ranges::new(2);
        ranges.insert_range(0, 5); // size 5
        ranges.insert_range(100, 1); // size 1, smallest
        ranges.insert_range(200, 2); // size 2 -> now 3 subranges, over limit of 2

        // the size-1 subrange at 100 should have been aged out
        assert_eq!(ranges.interval_len(), 2);
        assert!(!ranges.contains(100));
        assert!(ranges.contains(0));
        assert!(ranges.contains(200));
    }

    #[test]
    fn remove_absent_range_is_noop() {
        let mut ranges = Ranges::new(10);
        ranges.insert_range(0, 5);
        ranges.remove_range(100, 5);
        assert_eq!(ranges.to_vec(), vec![(0, 4)]);
    }

    #[test]
    fn zero_count_operations_are_noops() {
        let mut ranges = Ranges::new(10);
        assert!(!ranges.insert_range(0, 0));
        ranges.remove_range(0, 0);
        assert!(ranges.is_empty());
    }

    #[test]
    fn compact_merges_and_shrinks() {
        let mut ranges = Ranges::new(usize::MAX);
        for i in 0..64 {
            ranges.insert_value(i * 2);
        }
        ranges.shrink(128);
        assert!(ranges.subranges.capacity() >= 128);

        // remove all but a handful of entries, then compact should shrink storage back
        ranges.remove_range(8, usize::MAX as u64 - 8);
        ranges.compact();
        assert!(ranges.subranges.capacity() < 128);
    }

    #[test]
    fn compaction_invariant_sorted_and_non_touching() {
        let mut ranges = Ranges::new(usize::MAX);
        let inserts = [(5, 3), (20, 2), (0, 2), (8, 2), (22, 1)];
        for (low, count) in inserts {
            ranges.insert_range(low, count);
        }
        let subranges = ranges.to_vec();
        for w in subranges.windows(2) {
            assert!(w[0].1 < w[1].0, "subranges must be sorted and non-touching");
        }
    }
}
