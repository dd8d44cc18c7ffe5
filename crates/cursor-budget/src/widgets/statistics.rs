use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

use crate::AppState;

pub struct StatisticsWidget;

impl StatisticsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let summary = state.get_cost_summary();
        let settings = state.get_settings();
        let range = state.filters.date_range();

        let date_range = match (range.start(), range.end()) {
            (Some(start), Some(end)) => format!("{} to {}", start, end),
            (Some(start), None) => format!("from {}", start),
            (None, Some(end)) => format!("until {}", end),
            (None, None) => "all dates".to_string(),
        };

        let mut stats_text = vec![
            Line::from(vec![
                Span::styled("Data Status: ", Style::default().fg(Color::White)),
                Span::styled(
                    if state.data_loaded {
                        format!("Loaded ({} records)", state.monitor.entry_count())
                    } else if state.is_loading {
                        "Loading...".to_string()
                    } else {
                        "No data".to_string()
                    },
                    Style::default()
                        .fg(if state.data_loaded {
                            Color::Green
                        } else {
                            Color::Red
                        })
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Total Cost: ", Style::default().fg(Color::White)),
                Span::styled(
                    format!("${:.2}", summary.total_cost()),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(" ({} records)", summary.record_count()),
                    Style::default().fg(Color::Gray),
                ),
            ]),
            Line::from(vec![
                Span::styled("On-Demand: ", Style::default().fg(Color::White)),
                Span::styled(
                    format!("${:.2}", summary.on_demand_cost()),
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(" "),
            Line::from(vec![
                Span::styled("Dates: ", Style::default().fg(Color::White)),
                Span::styled(date_range, Style::default().fg(Color::Cyan)),
            ]),
            Line::from(vec![
                Span::styled("Model: ", Style::default().fg(Color::White)),
                Span::styled(
                    state.filters.model().unwrap_or("all").to_string(),
                    Style::default().fg(Color::Cyan),
                ),
            ]),
            Line::from(vec![
                Span::styled("Kind: ", Style::default().fg(Color::White)),
                Span::styled(
                    state.filters.category().unwrap_or("all").to_string(),
                    Style::default().fg(Color::Cyan),
                ),
            ]),
            Line::from(" "),
            Line::from(vec![
                Span::styled("Billing Day: ", Style::default().fg(Color::White)),
                Span::styled(
                    settings.billing_period_day().to_string(),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled("  Limit: ", Style::default().fg(Color::White)),
                Span::styled(
                    match settings.monthly_cost_limit() {
                        Some(limit) => format!("${:.2}", limit),
                        None => "not set".to_string(),
                    },
                    Style::default().fg(Color::Gray),
                ),
            ]),
        ];

        if let Some(error) = &state.error_message {
            stats_text.push(Line::from(vec![
                Span::styled("Error: ", Style::default().fg(Color::Red)),
                Span::styled(
                    error.chars().take(60).collect::<String>()
                        + if error.chars().count() > 60 { "..." } else { "" },
                    Style::default().fg(Color::Red),
                ),
            ]));
        } else {
            stats_text.push(Line::from(vec![
                Span::styled("Last Update: ", Style::default().fg(Color::White)),
                Span::styled(
                    state.last_update.format("%H:%M:%S UTC").to_string(),
                    Style::default().fg(Color::Cyan),
                ),
            ]));
        }

        let stats = Paragraph::new(stats_text)
            .block(Block::bordered().title("Statistics"))
            .alignment(Alignment::Left);

        frame.render_widget(stats, area);
    }
}
