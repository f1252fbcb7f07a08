use crate::model::{AlertRecord, AlertStatus};
use crate::ui::core::alerts::AlertStore;

pub const PAGE_SIZE: usize = 9;

/// What the dashboard draws for one store snapshot and page.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertsView {
    pub pending: Vec<AlertRecord>,
    pub completed_page: Vec<AlertRecord>,
    pub total_pages: usize,
}

pub fn total_pages(completed: usize) -> usize {
    completed.div_ceil(PAGE_SIZE).max(1)
}

/// Projects the store for a 1-based `page`.
///
/// The page is not clamped here: a page outside `1..=total_pages` gives an
/// empty slice. Both lists come out in id order.
pub fn project(store: &AlertStore, page: usize) -> AlertsView {
    let pending: Vec<AlertRecord> = store
        .records()
        .filter(|r| r.status == AlertStatus::Pending)
        .cloned()
        .collect();

    let completed: Vec<&AlertRecord> = store
        .records()
        .filter(|r| r.status == AlertStatus::Completed)
        .collect();

    let completed_page: Vec<AlertRecord> = match page.checked_sub(1) {
        Some(index) => completed
            .chunks(PAGE_SIZE)
            .nth(index)
            .map(|chunk| chunk.iter().map(|r| (*r).clone()).collect())
            .unwrap_or_default(),
        None => Vec::new(),
    };

    AlertsView {
        pending,
        completed_page,
        total_pages: total_pages(completed.len()),
    }
}

/// Pulls a page number back into `1..=total_pages`.
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}
