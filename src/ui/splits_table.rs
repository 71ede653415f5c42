use ratatui::{
    style::{Color, Modifier, Style},
    widgets::{Cell, Row},
};

use crate::clock::format_duration;
use crate::split::{self, Split};

pub struct SplitRowData {
    pub title: String,
    /// Time spent on this split alone
    pub segment_ms: Option<u64>,
    /// Cumulative run time when the split was recorded
    pub time_ms: Option<u64>,
    pub is_current: bool,
}

/// Rows for every split in order, with segment times derived from the
/// previous recorded split
pub fn rows_for(splits: &[Split], current_split: usize) -> Vec<SplitRowData> {
    let mut previous = Some(0);
    split::in_order(splits)
        .into_iter()
        .map(|s| {
            let segment_ms = match (s.time_ms, previous) {
                (Some(t), Some(p)) => Some(t.saturating_sub(p)),
                _ => None,
            };
            previous = s.time_ms;
            SplitRowData {
                title: s.title.clone(),
                segment_ms,
                time_ms: s.time_ms,
                is_current: s.order == current_split,
            }
        })
        .collect()
}

/// Pure presenter for a single split row
pub fn present_row(data: &SplitRowData) -> Row<'static> {
    let blank = || "-".to_string();

    let row = Row::new(vec![
        Cell::from(data.title.clone()),
        Cell::from(data.segment_ms.map(format_duration).unwrap_or_else(blank))
            .style(Style::default().fg(Color::Gray)),
        Cell::from(data.time_ms.map(format_duration).unwrap_or_else(blank)).style(
            if data.time_ms.is_some() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().add_modifier(Modifier::DIM)
            },
        ),
    ]);

    if data.is_current {
        row.style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        row
    }
}
