// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::PAGE_SIZE;

pub fn total_pages(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Current page and the bounds derived from the last applied row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    index: u32,
    size: u32,
    total_items: u64,
    total_pages: u32,
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl PageState {
    pub const fn new(size: u32) -> Self {
        Self {
            index: 1,
            size,
            total_items: 0,
            total_pages: 0,
        }
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn size(&self) -> u32 {
        self.size
    }

    pub const fn total_items(&self) -> u64 {
        self.total_items
    }

    pub const fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn set_total_items(&mut self, total_items: u64) {
        self.total_items = total_items;
        self.total_pages = total_pages(total_items, self.size);
    }

    /// `max(1, min(page, total_pages))`; with no pages the result is 1.
    pub fn clamp(&self, page: i64) -> u32 {
        let upper = i64::from(self.total_pages.max(1));
        let clamped = page.clamp(1, upper);
        u32::try_from(clamped).unwrap_or(1)
    }

    pub fn is_out_of_range(&self) -> bool {
        self.index > self.total_pages.max(1)
    }

    /// Commits a manually entered page. Returns the new index, or `None` if it did not move.
    pub fn commit(&mut self, page: i64) -> Option<u32> {
        let target = self.clamp(page);
        if target == self.index {
            return None;
        }
        self.index = target;
        Some(target)
    }

    pub const fn has_prev(&self) -> bool {
        self.index > 1
    }

    pub const fn has_next(&self) -> bool {
        self.index < self.total_pages
    }

    pub fn next(&mut self) -> Option<u32> {
        if !self.has_next() {
            return None;
        }
        self.commit(i64::from(self.index) + 1)
    }

    pub fn prev(&mut self) -> Option<u32> {
        if !self.has_prev() {
            return None;
        }
        self.commit(i64::from(self.index) - 1)
    }

    pub fn reset(&mut self) -> bool {
        let changed = self.index != 1;
        self.index = 1;
        changed
    }

    /// Sets a page read back from a location. The upper bound is unknown until rows arrive.
    pub fn restore(&mut self, page: u32) {
        self.index = page.max(1);
    }

    pub const fn offset(&self) -> u64 {
        (self.index as u64 - 1) * self.size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::{PageState, total_pages};

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(23, 10), 3);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn clamp_matches_bounds_for_every_input() {
        let mut state = PageState::default();
        for total in [0_u64, 1, 9, 10, 11, 23, 100] {
            state.set_total_items(total);
            let pages = i64::from(state.total_pages());
            for page in -3_i64..=15 {
                let expected = page.min(pages).max(1);
                assert_eq!(i64::from(state.clamp(page)), expected, "total={total} page={page}");
            }
        }
    }

    #[test]
    fn commit_beyond_last_page_clamps() {
        let mut state = PageState::default();
        state.set_total_items(23);
        assert_eq!(state.total_pages(), 3);
        assert_eq!(state.commit(5), Some(3));
        assert_eq!(state.index(), 3);
        assert!(!state.has_next());
        assert_eq!(state.offset(), 20);
    }

    #[test]
    fn committing_the_current_page_is_a_no_op() {
        let mut state = PageState::default();
        state.set_total_items(50);
        assert_eq!(state.commit(1), None);
        assert_eq!(state.commit(0), None);
        assert_eq!(state.commit(2), Some(2));
        assert_eq!(state.commit(2), None);
    }

    #[test]
    fn prev_and_next_stop_at_the_edges() {
        let mut state = PageState::default();
        state.set_total_items(15);
        assert!(!state.has_prev());
        assert_eq!(state.prev(), None);
        assert_eq!(state.next(), Some(2));
        assert_eq!(state.next(), None);
        assert_eq!(state.prev(), Some(1));
    }

    #[test]
    fn restore_is_unbounded_until_rows_arrive() {
        let mut state = PageState::default();
        state.restore(7);
        assert_eq!(state.index(), 7);
        state.set_total_items(23);
        assert!(state.is_out_of_range());
        state.restore(0);
        assert_eq!(state.index(), 1);
        assert!(!state.reset());
    }
}
