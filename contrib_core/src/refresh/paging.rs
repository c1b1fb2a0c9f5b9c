//! Explicit state objects for the two ways adapters walk upstream data:
//! calendar-month windows walked backward from "now", and fixed-size pages.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::fmt;

/// One calendar month, inclusive on both ends.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MonthWindow {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl MonthWindow {
    pub fn containing(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        let next_first = if first.month() == 12 {
            NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
        };
        let last = next_first.and_then(|d| d.pred_opt()).unwrap_or(first);
        Self { first, last }
    }

    pub fn previous(&self) -> Option<Self> {
        self.first.pred_opt().map(Self::containing)
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        day >= self.first && day <= self.last
    }
}

impl fmt::Display for MonthWindow {
    /// Renders as the `<first>..<last>` range used by search qualifiers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.first.format("%Y-%m-%d"),
            self.last.format("%Y-%m-%d")
        )
    }
}

/// Month windows from the month of `now` backward.
///
/// The current month is always yielded. The walk ends once the last day of the next
/// window would fall before the lower bound's day.
#[derive(Debug, Clone)]
pub struct MonthWindows {
    next: Option<MonthWindow>,
    lower: NaiveDate,
}

impl MonthWindows {
    pub fn new(now: DateTime<Utc>, lower_bound: DateTime<Utc>) -> Self {
        Self {
            next: Some(MonthWindow::containing(now.date_naive())),
            lower: lower_bound.date_naive(),
        }
    }
}

impl Iterator for MonthWindows {
    type Item = MonthWindow;

    fn next(&mut self) -> Option<MonthWindow> {
        let current = self.next.take()?;
        self.next = current.previous().filter(|prev| prev.last >= self.lower);
        if self.next.is_none() {
            tracing::debug!(window = %current, "reached lower bound");
        }
        Some(current)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PageState {
    More,
    Exhausted,
}

/// Fixed-size pagination. A short page ends the walk; so does reaching `max_pages`, which
/// means "nothing more in this window" rather than an error.
#[derive(Debug, Clone)]
pub struct PageCursor {
    page_size: usize,
    max_pages: Option<u32>,
    fetched: u32,
    done: bool,
}

impl PageCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            max_pages: None,
            fetched: 0,
            done: false,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Zero-based index of the next page to fetch.
    pub fn page(&self) -> u32 {
        self.fetched
    }

    /// Item offset of the next page to fetch.
    pub fn offset(&self) -> usize {
        self.fetched as usize * self.page_size
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Records a fetched page of `len` items and reports whether to continue.
    pub fn record(&mut self, len: usize) -> PageState {
        self.fetched += 1;
        let capped = self.max_pages.is_some_and(|max| self.fetched >= max);
        if len < self.page_size || capped {
            self.done = true;
            PageState::Exhausted
        } else {
            PageState::More
        }
    }

    /// Ends the walk early, e.g. when an upstream cursor stops moving.
    pub fn finish(&mut self) {
        self.done = true;
    }
}
