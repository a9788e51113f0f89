use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::{App, RunState};

const HEADER_LINES: usize = 5;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(f.area())
    } else {
        Layout::default().constraints([Constraint::Percentage(100)]).split(f.area())
    };

    let (banner_label, banner_bg) = match &app.run_state {
        RunState::Idle => ("IDLE (Press S to start)".to_string(), Color::DarkGray),
        RunState::Running => ("RUNNING (Press S to stop)".to_string(), Color::Green),
        RunState::Stopping => ("STOPPING...".to_string(), Color::Yellow),
        RunState::Finished(summary) => (format!("FINISHED: {} (Press S to rerun)", summary), Color::Red),
    };

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = vec![
        Line::from(vec![
            Span::raw(" "),
            key("j"),
            Span::raw("/"),
            key("k"),
            Span::raw(" scroll, "),
            key("l"),
            Span::raw(" logs, "),
            key("q"),
            Span::raw(" quit"),
        ]),
        Line::from(vec![Span::styled(" entry   ", dim), Span::raw(app.entry.as_str())]),
        Line::from(vec![
            Span::styled(" current ", dim),
            Span::styled(app.current.as_deref().unwrap_or("-"), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![Span::styled(" action  ", dim), Span::raw(app.last_action.as_deref().unwrap_or("-"))]),
        Line::from(""),
    ];

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(chunks[0]);

    // Keep the selection visible when the node list overflows
    let room = (left[1].height as usize).saturating_sub(HEADER_LINES + 1).max(1);
    let skip = (app.selected + 1).saturating_sub(room);
    for (i, (name, times)) in app.counters.iter().enumerate().skip(skip).take(room) {
        let marker = if i == app.selected { "> " } else { "  " };
        let is_current = app.current.as_deref() == Some(name.as_str());
        let name_style = if is_current {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::raw(marker),
            Span::styled(format!("{:<28}", name), name_style),
            Span::styled(format!("{:>5}", times), Style::default().fg(Color::Yellow)),
        ]));
    }

    let width = left[0].width as usize;
    let pad = width.saturating_sub(banner_label.chars().count());
    let centered = format!("{}{}{}", " ".repeat(pad / 2), banner_label, " ".repeat(pad - pad / 2));
    let banner = Paragraph::new(Line::from(Span::styled(
        centered,
        Style::default().fg(Color::Black).bg(banner_bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left[0]);

    let nodes = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(nodes, left[1]);

    if app.log_visible && chunks.len() > 1 {
        let visible = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let scroll = app.log_scroll.min(total.saturating_sub(visible));
        let start = total.saturating_sub(visible + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_messages[start..end].iter().map(|m| parse_log_line(m)).collect();

        let logs = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(logs, chunks[1]);
    }

    if let Some(dialog) = &app.confirm {
        dialog.render(f);
    }
}

/// Render a `level\x1ftarget\x1ftimestamp\x1fmessage` line. Anything else is
/// shown verbatim.
pub fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(4, '\x1f').collect();
    let [level, target, timestamp, message] = parts[..] else {
        return Line::from(raw);
    };

    let msg_color = match level {
        "DEBUG" | "TRACE" => Color::DarkGray,
        _ => Color::White,
    };

    let mut spans = vec![Span::styled(timestamp, Style::default().fg(Color::DarkGray)), Span::raw(" ")];
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }
    if !target.is_empty() {
        spans.push(Span::styled(target, Style::default().fg(Color::LightBlue).add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(message, Style::default().fg(msg_color)));
    Line::from(spans)
}
