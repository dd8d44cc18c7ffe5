use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Gauge},
    Frame,
};

use crate::AppState;

pub struct ProgressBarsWidget;

impl ProgressBarsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(area);

        let metrics = state.get_metrics();

        let gauges = [
            (
                "Billing Period",
                metrics.monthly_usage(),
                metrics.monthly_limit(),
                metrics.monthly_percentage(),
            ),
            (
                "Work Week",
                metrics.weekly_usage(),
                metrics.weekly_limit(),
                metrics.weekly_percentage(),
            ),
            (
                "Work Day",
                metrics.daily_usage(),
                metrics.daily_limit(),
                metrics.daily_percentage(),
            ),
        ];

        for ((title, usage, limit, percentage), chunk) in gauges.into_iter().zip(chunks.iter()) {
            frame.render_widget(Self::gauge(title, usage, limit, percentage), *chunk);
        }
    }

    fn gauge(title: &str, usage: f64, limit: Option<f64>, percentage: f64) -> Gauge<'_> {
        let label = match limit {
            Some(limit) => format!("${:.2} / ${:.2}", usage, limit),
            None => format!("${:.2} (no limit)", usage),
        };

        Gauge::default()
            .block(Block::bordered().title(title))
            .gauge_style(if percentage > 90.0 {
                Style::default().fg(Color::Red)
            } else if percentage > 70.0 {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Green)
            })
            .percent(percentage.clamp(0.0, 100.0) as u16)
            .label(label)
    }
}
