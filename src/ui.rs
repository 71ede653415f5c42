pub mod splits_table;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table, Widget, Wrap},
};

use crate::app::App;
use crate::clock::{format_duration, Clock};
use crate::storage::Store;
use crate::timer::TimerStatus;
use splits_table::{present_row, rows_for};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn status_style(status: TimerStatus) -> Style {
    let color = match status {
        TimerStatus::Initial => Color::Gray,
        TimerStatus::Running => Color::Green,
        TimerStatus::Paused => Color::Yellow,
        TimerStatus::Stopped => Color::Cyan,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

impl<S: Store, C: Clock> Widget for &App<S, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.timer.state();
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // run title
                Constraint::Min(3),    // splits
                Constraint::Length(3), // time
                Constraint::Length(1), // status
                Constraint::Length(2), // legend
            ])
            .split(area);

        Paragraph::new(Span::styled(self.title().to_string(), bold_style))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        if state.splits.is_empty() {
            Paragraph::new("No splits. Add a run with `speedsplits runs add <NAME> <SPLIT>...`")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Gray))
                .wrap(Wrap { trim: true })
                .render(chunks[1], buf);
        } else {
            let rows: Vec<Row> = rows_for(&state.splits, state.current_split)
                .iter()
                .map(present_row)
                .collect();
            let header = Row::new(vec!["Split", "Segment", "Time"]).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
            Table::new(
                rows,
                [
                    Constraint::Min(10),
                    Constraint::Length(12),
                    Constraint::Length(12),
                ],
            )
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Splits"))
            .column_spacing(2)
            .render(chunks[1], buf);
        }

        Paragraph::new(Span::styled(
            format_duration(self.timer.live_time_ms()),
            status_style(state.status),
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP | Borders::BOTTOM))
        .render(chunks[2], buf);

        let status_line = match &self.last_error {
            Some(err) => Line::from(vec![
                Span::styled(state.status.to_string(), status_style(state.status)),
                Span::raw("  "),
                Span::styled(err.clone(), Style::default().fg(Color::Red)),
            ]),
            None => Line::from(Span::styled(
                state.status.to_string(),
                status_style(state.status),
            )),
        };
        Paragraph::new(status_line)
            .alignment(Alignment::Center)
            .render(chunks[3], buf);

        let mut legend: Vec<String> = self
            .timer
            .key_binds()
            .bindings()
            .iter()
            .map(|(bind, _)| format!("({}) {}", bind.code, bind.display_name.to_lowercase()))
            .collect();
        if !self.timer.key_binds().is_bound("KeyQ") {
            legend.push("(q) quit".to_string());
        }

        Paragraph::new(Span::styled(legend.join("  "), dim_style))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[4], buf);
    }
}
