use kahani_core::{ChatRole, GenerationPhase};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use crate::app::{App, BackendStatus, InputMode};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status_text, status_color) = match &app.backend_status {
        BackendStatus::Unknown => ("?".to_string(), Color::DarkGray),
        BackendStatus::Checking => ("checking...".to_string(), Color::DarkGray),
        BackendStatus::Ok(value) => {
            let model_loaded = value
                .get("model_loaded")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            if model_loaded {
                ("online".to_string(), Color::Green)
            } else {
                ("model not loaded".to_string(), Color::Yellow)
            }
        }
        BackendStatus::Unreachable(_) => ("unreachable".to_string(), Color::Red),
    };

    let title = Line::from(vec![
        Span::styled(" کہانی ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("Urdu Story Generator ", Style::default().fg(Color::Cyan)),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        Span::styled(app.client.base_url().to_string(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(format!("[{}]", status_text), Style::default().fg(status_color).bold()),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing and dimensions for scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow_output {
        app.scroll_chat_to_bottom();
    }

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(format!(" Story (max length {}) ", app.controller.max_length()));

    let messages = app.controller.messages();
    let in_flight = app.controller.in_flight();

    let chat_text = if messages.is_empty() {
        Text::from(Span::styled(
            "Type the opening of a story and press Enter...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in messages {
            let (label, color) = match msg.role {
                ChatRole::User => ("You:", Color::Cyan),
                ChatRole::Assistant => ("کہانی:", Color::Yellow),
                ChatRole::Error => ("Error:", Color::Red),
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));

            if msg.content.is_empty() && in_flight == Some(&msg.id) {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Generating{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            } else {
                let style = if msg.role == ChatRole::Error {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default()
                };
                for line in msg.content.lines() {
                    lines.push(Line::styled(line.to_string(), style));
                }
            }
            lines.push(Line::default());
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);

    let total_lines = app.total_chat_lines() as usize;
    if total_lines > app.chat_height as usize {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(app.chat_scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let input_border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = if app.controller.is_generating() {
        " Story prefix (generating, Esc to stop) "
    } else {
        " Story prefix (Enter to send) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Get the visible slice of the input
    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    // Use cyan text to match the "You:" style - visible in both light and dark terminals
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<(&str, &str)> = match app.input_mode {
        InputMode::Normal => vec![
            ("i", "type"),
            ("j/k", "scroll"),
            ("+/-", "length"),
            ("Esc", "stop"),
            ("r", "health"),
            ("q", "quit"),
        ],
        InputMode::Editing => vec![
            ("Enter", "send"),
            ("Esc", "done"),
            ("Ctrl-C", "quit"),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let phase = match app.controller.phase() {
        GenerationPhase::Idle => "",
        GenerationPhase::Sending => " sending",
        GenerationPhase::Streaming => " streaming",
        GenerationPhase::Completed => " done",
        GenerationPhase::Failed => " failed",
        GenerationPhase::Cancelled => " stopped",
    };
    spans.push(Span::styled(phase, Style::default().fg(Color::DarkGray)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kahani_core::{BackendClient, ChatController, ChatUpdate};
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_render_shows_streamed_tokens() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (chat_tx, _chat_rx) = mpsc::unbounded_channel();
        let mut app = App::new(
            BackendClient::new("http://localhost:8000"),
            ChatController::default(),
            events_tx,
            chat_tx,
        );
        let id = app.controller.submit("Once").unwrap().message_id;
        app.apply_update(ChatUpdate::Token { id, text: "upon a time".to_string() });

        let mut terminal = Terminal::new(TestBackend::new(60, 16)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("You:"));
        assert!(text.contains("Once"));
        assert!(text.contains("upon a time"));
    }

    #[test]
    fn test_render_empty_state_hint() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (chat_tx, _chat_rx) = mpsc::unbounded_channel();
        let mut app = App::new(
            BackendClient::new("http://localhost:8000"),
            ChatController::default(),
            events_tx,
            chat_tx,
        );

        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(buffer_text(&terminal).contains("Type the opening"));
    }
}
