use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::AppState;

pub struct ShortcutsWidget;

impl ShortcutsWidget {
    pub fn render(frame: &mut Frame, area: Rect, _state: &AppState) {
        let key_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);
        let text_style = Style::default().fg(Color::Gray);

        let bindings = [
            ("q", " quit  "),
            ("r", " reload  "),
            ("m", " model  "),
            ("k", " kind  "),
            ("c", " reset filters  "),
            ("d", " breakdown"),
        ];

        let spans: Vec<Span> = bindings
            .iter()
            .flat_map(|(key, action)| {
                [
                    Span::styled(*key, key_style),
                    Span::styled(*action, text_style),
                ]
            })
            .collect();

        let shortcuts = Paragraph::new(Line::from(spans)).alignment(Alignment::Center);

        frame.render_widget(shortcuts, area);
    }
}
