//! Virtual scroll window: which items of a long, partially-loaded list fall
//! inside the viewport.
//!
//! Item heights are measured once and kept as prefix sums, so finding the
//! first visible item is a binary search. When the item at some index
//! changes height (or rows are inserted or removed before it), call
//! [`VirtualWindow::reset_after_index`] and measure again.

use std::cell::Cell;

/// Where [`VirtualWindow::scroll_to_item`] places the target item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    /// Scroll as little as possible to make the item fully visible.
    #[default]
    Auto,
    /// Item at the top of the viewport.
    Start,
    /// Item in the middle of the viewport.
    Center,
    /// Item at the bottom of the viewport.
    End,
}

/// Item indices currently rendered. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
    /// First item rendered, including overscan.
    pub overscan_start: usize,
    /// Last item rendered, including overscan.
    pub overscan_stop: usize,
    /// First item intersecting the viewport.
    pub visible_start: usize,
    /// Last item intersecting the viewport.
    pub visible_stop: usize,
}

/// Scroll position and item geometry for one virtualized view.
#[derive(Debug)]
pub struct VirtualWindow {
    // offsets[i] is the top line of item i; the final entry is the total height.
    offsets: Vec<u32>,
    item_count: usize,
    scroll_offset: u32,
    overscan: usize,
    /// Updated during each `view()` call via interior mutability.
    viewport_height: Cell<u16>,
    last_range: Option<VisibleRange>,
}

impl Default for VirtualWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualWindow {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            item_count: 0,
            scroll_offset: 0,
            overscan: 1,
            viewport_height: Cell::new(10),
            last_range: None,
        }
    }

    /// Extra items reported on each side of the visible ones.
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn viewport_height(&self) -> u16 {
        self.viewport_height.get()
    }

    /// Record the viewport height. Called from `view`.
    pub fn set_viewport_height(&self, height: u16) {
        self.viewport_height.set(height.max(1));
    }

    /// Bring geometry up to date with `count` items. Only items without a
    /// cached position are measured; heights below one line count as one.
    pub fn measure(&mut self, count: usize, height_of: impl Fn(usize) -> u16) {
        let valid = (self.offsets.len() - 1).min(count);
        self.offsets.truncate(valid + 1);
        for index in valid..count {
            let top = self.offsets[index];
            self.offsets
                .push(top.saturating_add(u32::from(height_of(index).max(1))));
        }
        self.item_count = count;
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    /// Forget cached geometry from `index` onwards.
    pub fn reset_after_index(&mut self, index: usize) {
        if index < self.offsets.len() {
            self.offsets.truncate(index + 1);
        }
        self.item_count = self.item_count.min(index);
    }

    /// Total height of all measured items, in lines.
    pub fn total_height(&self) -> u32 {
        self.offsets[self.item_count.min(self.offsets.len() - 1)]
    }

    pub fn item_top(&self, index: usize) -> Option<u32> {
        (index < self.item_count).then(|| self.offsets[index])
    }

    pub fn item_height(&self, index: usize) -> Option<u16> {
        (index < self.item_count).then(|| {
            u16::try_from(self.offsets[index + 1] - self.offsets[index]).unwrap_or(u16::MAX)
        })
    }

    /// Largest scroll offset that still fills the viewport.
    pub fn max_scroll(&self) -> u32 {
        self.total_height()
            .saturating_sub(u32::from(self.viewport_height.get()))
    }

    /// Current scroll offset in lines, clamped to the content.
    pub fn scroll_offset(&self) -> u32 {
        self.scroll_offset.min(self.max_scroll())
    }

    pub fn scroll_to(&mut self, offset: u32) {
        self.scroll_offset = offset.min(self.max_scroll());
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let offset = self.scroll_offset().saturating_add_signed(delta);
        self.scroll_to(offset);
    }

    /// Scroll so the item at `index` is placed according to `align`.
    pub fn scroll_to_item(&mut self, index: usize, align: Align) {
        if self.item_count == 0 {
            return;
        }
        let index = index.min(self.item_count - 1);
        let top = self.offsets[index];
        let bottom = self.offsets[index + 1];
        let viewport = u32::from(self.viewport_height.get());
        let current = self.scroll_offset();

        let start = top;
        let end = bottom.saturating_sub(viewport);
        let offset = match align {
            Align::Start => start,
            Align::End => end,
            Align::Center => (top + bottom).div_ceil(2).saturating_sub(viewport / 2),
            Align::Auto if top < current => start,
            Align::Auto if bottom > current + viewport => end.max(current),
            Align::Auto => current,
        };
        self.scroll_to(offset);
    }

    /// Items intersecting the viewport at the current offset, or `None`
    /// when there are no items.
    pub fn visible_range(&self) -> Option<VisibleRange> {
        if self.item_count == 0 {
            return None;
        }
        let tops = &self.offsets[..self.item_count];
        let offset = self.scroll_offset();
        let bottom = offset + u32::from(self.viewport_height.get());

        let visible_start = tops.partition_point(|&top| top <= offset).saturating_sub(1);
        let visible_stop = tops
            .partition_point(|&top| top < bottom)
            .saturating_sub(1)
            .max(visible_start);

        Some(VisibleRange {
            overscan_start: visible_start.saturating_sub(self.overscan),
            overscan_stop: (visible_stop + self.overscan).min(self.item_count - 1),
            visible_start,
            visible_stop,
        })
    }

    /// Lines of the first visible item hidden above the viewport.
    pub fn first_item_clip(&self) -> u16 {
        self.visible_range().map_or(0, |range| {
            let hidden = self.scroll_offset() - self.offsets[range.visible_start];
            u16::try_from(hidden).unwrap_or(u16::MAX)
        })
    }

    /// Return the visible range if it differs from the one last returned.
    pub fn observe(&mut self) -> Option<VisibleRange> {
        let range = self.visible_range();
        if range == self.last_range {
            return None;
        }
        self.last_range = range;
        range
    }

    /// Scroll position as a fraction in `0.0..=1.0`.
    pub fn scroll_fraction(&self) -> f64 {
        let max = self.max_scroll();
        if max == 0 {
            0.0
        } else {
            f64::from(self.scroll_offset()) / f64::from(max)
        }
    }
}
