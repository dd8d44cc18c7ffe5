use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Paragraph},
    Frame,
};

use crate::AppState;

pub struct DailyChartWidget;

impl DailyChartWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let series = state.get_daily_series();

        let Some(last) = series.last() else {
            let empty = Paragraph::new("No usage in the selected range")
                .block(Block::bordered().title("Daily Cost"))
                .style(Style::default().fg(Color::Gray))
                .alignment(Alignment::Center);
            frame.render_widget(empty, area);
            return;
        };

        let title = format!("Daily Cost (cumulative ${:.2})", last.cumulative_cost());

        // Keep the most recent days that fit, three columns per bar.
        let inner_width = usize::from(area.width.saturating_sub(2));
        let visible = (inner_width / 3).max(1);
        let skip = series.len().saturating_sub(visible);

        let bars: Vec<Bar> = series
            .iter()
            .skip(skip)
            .map(|point| {
                Bar::default()
                    .value((point.daily_cost() * 100.0).round() as u64)
                    .text_value(format!("{:.0}", point.daily_cost()))
                    .label(Line::from(point.day().format("%d").to_string()))
            })
            .collect();

        let chart = BarChart::default()
            .block(Block::bordered().title(title))
            .data(BarGroup::default().bars(&bars))
            .bar_width(2)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Green))
            .value_style(Style::default().fg(Color::Black).bg(Color::Green));

        frame.render_widget(chart, area);
    }
}
