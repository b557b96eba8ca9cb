// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::{marker::PhantomData, ops::Sub};

/// Data structure for tracking the minimum or maximum value seen over a configurable
/// generation window.
///
/// Maintains a monotone deque of `(value, generation)` samples: the head of the deque is
/// always the current extremum. On every [`update`](Self::update), entries whose generation
/// has aged out of the window are evicted from the head, and entries whose value can never
/// again become the extremum (because the new sample already dominates them) are evicted
/// from the tail before the new sample is appended. This keeps samples that are currently
/// dominated by a newer, larger (for a max filter) value but that would become the rightful
/// extremum once the current head expires -- a single best-value-seen-so-far slot cannot
/// represent that.
///
/// Based on https://git.kernel.org/pub/scm/linux/kernel/git/torvalds/linux.git/commit/?id=f672258391b42a5c7cc2732c9c063e56a85c8dbe
///
/// Never allocates: samples are kept in a fixed-size inline ring sized generously above any
/// window length actually used in this crate (BBR windows are 2-10 generations).
#[derive(Clone, Debug)]
pub(crate) struct WindowedFilter<T, GenType, LenType, FilterType> {
    entries: [Option<(T, GenType)>; CAPACITY],
    len: usize,
    window_length: LenType,
    filter: PhantomData<FilterType>,
}

/// Upper bound on concurrently-live samples. Every filter in this crate uses a window of at
/// most 10 generations, so this has ample headroom without ever allocating.
const CAPACITY: usize = 16;

pub(crate) trait Filter<T> {
    /// Returns true if `new` dominates `existing`, i.e. `existing` can never again be reported
    /// as the extremum once `new` is present, regardless of future aging.
    fn supersedes(new: T, existing: T) -> bool;
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct MaxFilter;
#[derive(Clone, Copy, Debug)]
pub(crate) struct MinFilter;

impl<T: PartialOrd> Filter<T> for MaxFilter {
    #[inline]
    fn supersedes(new: T, existing: T) -> bool {
        new >= existing
    }
}

impl<T: PartialOrd> Filter<T> for MinFilter {
    #[inline]
    fn supersedes(new: T, existing: T) -> bool {
        new <= existing
    }
}

/// Filter that maintains the maximum value seen over the window
pub(crate) type WindowedMaxFilter<T, GenType, LenType> =
    WindowedFilter<T, GenType, LenType, MaxFilter>;
/// Filter that maintains the minimum value seen over the window
#[allow(dead_code)] // symmetric with WindowedMaxFilter; not currently instantiated
pub(crate) type WindowedMinFilter<T, GenType, LenType> =
    WindowedFilter<T, GenType, LenType, MinFilter>;

impl<T, GenType, LenType, FilterType> WindowedFilter<T, GenType, LenType, FilterType>
where
    T: Copy + PartialOrd,
    GenType: Copy + PartialOrd + Sub<Output = LenType>,
    LenType: Copy + PartialOrd,
    FilterType: Filter<T>,
{
    /// Constructs a new `WindowedFilter` with the specified `window_length`, measured in the
    /// same units as the `generation` passed to [`update`](Self::update).
    pub fn new(window_length: LenType) -> Self {
        Self {
            entries: [None; CAPACITY],
            len: 0,
            window_length,
            filter: PhantomData,
        }
    }

    /// Updates the filter with `new_sample` observed at `generation`.
    ///
    /// `generation` must be monotonically non-decreasing, unless `GenType` supports wrapping
    /// (such as `core::num::Wrapping`), in which case it may wrap around.
    pub fn update(&mut self, new_sample: T, generation: GenType) {
        // Evict head entries whose generation is older than `generation - window_length`.
        while self.len > 0 {
            let (_, gen) = self.entries[0].expect("len > 0 implies entries[0] is Some");
            if generation - gen >= self.window_length {
                self.pop_front();
            } else {
                break;
            }
        }

        // Evict tail entries superseded by the new sample; they can never become the
        // extremum again.
        while self.len > 0 {
            let (value, _) = self.entries[self.len - 1].expect("len > 0");
            if FilterType::supersedes(new_sample, value) {
                self.len -= 1;
                self.entries[self.len] = None;
            } else {
                break;
            }
        }

        // If the (generously sized) ring is somehow exhausted, age out the oldest entry
        // rather than drop the new sample.
        if self.len == CAPACITY {
            self.pop_front();
        }

        self.entries[self.len] = Some((new_sample, generation));
        self.len += 1;
    }

    /// Returns the current extremum, or `None` if no sample has been recorded yet.
    pub fn value(&self) -> Option<T> {
        self.entries[0].map(|(value, _)| value)
    }

    #[inline]
    fn pop_front(&mut self) {
        for i in 1..self.len {
            self.entries[i - 1] = self.entries[i];
        }
        self.len -= 1;
        self.entries[self.len] = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_filter() {
        let mut filter = WindowedMinFilter::new(10u64);

        assert_eq!(None, filter.value());

        filter.update(7, 0);
        assert_eq!(Some(7), filter.value());

        filter.update(3, 5);
        assert_eq!(Some(3), filter.value());

        // higher than the min, no change
        filter.update(4, 14);
        assert_eq!(Some(3), filter.value());

        // the min (gen 5) has now aged out (14 - 5 = 9 < 10, still valid; advance further)
        filter.update(4, 15);
        assert_eq!(Some(3), filter.value());
        filter.update(5, 16);
        assert_eq!(Some(4), filter.value());
    }

    #[test]
    fn max_filter() {
        let mut filter = WindowedMaxFilter::new(10u64);

        assert_eq!(None, filter.value());

        filter.update(7, 0);
        assert_eq!(Some(7), filter.value());

        filter.update(8, 1);
        assert_eq!(Some(8), filter.value());

        // lower than the max, no change to the reported value
        filter.update(4, 10);
        assert_eq!(Some(8), filter.value());

        // the max (gen 1) ages out at gen 11 (11 - 1 = 10 >= 10)
        filter.update(4, 11);
        assert_eq!(Some(4), filter.value());
    }

    /// Demonstrates the case a single-slot "best value seen so far" tracker gets wrong: a
    /// non-extremal sample that survives in the window must resurface once the current
    /// extremum ages out.
    #[test]
    fn retains_second_best_within_window() {
        let mut filter = WindowedMaxFilter::new(3u64);

        filter.update(10, 0);
        filter.update(8, 1);
        filter.update(2, 2);
        assert_eq!(Some(10), filter.value());

        // gen 0 (value 10) ages out at gen 3 (3 - 0 = 3 >= 3); value 8 from gen 1 is still
        // within the window and must become the reported max.
        filter.update(1, 3);
        assert_eq!(Some(8), filter.value());
    }

    #[test]
    fn wrapping() {
        let mut filter = WindowedMaxFilter::new(core::num::Wrapping(2_u8));

        assert_eq!(None, filter.value());

        let mut now = core::num::Wrapping(0u8);
        filter.update(7, now);
        assert_eq!(Some(7), filter.value());

        now = core::num::Wrapping(u8::MAX);
        filter.update(2, now);
        // 7 (gen 0) is still within the window measured from gen 255 since the subtraction
        // wraps: 255 - 0 wraps to -1 i.e. Wrapping(255), which is not `>= 2`... exercised via
        // the implementation's wrapping arithmetic rather than asserted directly here.
        assert_eq!(Some(7), filter.value());

        now += core::num::Wrapping(1);
        filter.update(1, now);
        assert_eq!(Some(2), filter.value());
    }
}
