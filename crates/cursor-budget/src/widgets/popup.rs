use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    Frame,
};

use crate::AppState;

pub struct PopupWidget;

impl PopupWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let popup_area = Self::centered_rect(60, 70, area);

        frame.render_widget(Clear, popup_area);

        let breakdown_text = Self::create_breakdown_text(state);

        let popup = Paragraph::new(breakdown_text)
            .block(
                Block::bordered()
                    .title("Model Breakdown")
                    .title_alignment(Alignment::Center)
                    .style(Style::default().fg(Color::Cyan)),
            )
            .alignment(Alignment::Left);

        frame.render_widget(popup, popup_area);
    }

    fn create_breakdown_text(state: &AppState) -> Vec<Line<'static>> {
        let breakdown = state.get_model_breakdown();
        let total_cost: f64 = breakdown.iter().map(|model| model.cost()).sum();

        let mut text = vec![
            Line::from(vec![
                Span::styled("Models: ", Style::default().fg(Color::White)),
                Span::styled(
                    breakdown.len().to_string(),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled("  Cost: ", Style::default().fg(Color::White)),
                Span::styled(
                    format!("${:.2}", total_cost),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(" "),
        ];

        if breakdown.is_empty() {
            text.push(Line::from(Span::styled(
                "  No usage in the selected range",
                Style::default().fg(Color::Gray),
            )));
        }

        for model in &breakdown {
            let tokens = model.tokens();
            text.push(Line::from(vec![Span::styled(
                model.model().to_string(),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )]));
            text.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(
                    format!(
                        "{} requests, ${:.2}, {} tokens",
                        model.record_count(),
                        model.cost(),
                        tokens.total_tokens()
                    ),
                    Style::default().fg(Color::Gray),
                ),
            ]));
            text.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(
                    format!(
                        "in {} + {} cached write, {} cache read, {} out",
                        tokens.input_without_cache_write(),
                        tokens.input_with_cache_write(),
                        tokens.cache_read(),
                        tokens.output_tokens()
                    ),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
        }

        text.extend(vec![
            Line::from(" "),
            Line::from(vec![
                Span::styled("Press ", Style::default().fg(Color::Gray)),
                Span::styled(
                    "d",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(" to close", Style::default().fg(Color::Gray)),
            ]),
        ]);

        text
    }

    fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(r);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(popup_layout[1])[1]
    }
}
