//! View rendering: header, event log, task panel, footer.
//!
//! Single-line header and footer frame a log-centric layout; the task
//! panel is toggleable. All content comes from [`App`]; nothing here
//! mutates state.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use crate::app::{App, LogKind};
use crate::format::{format_duration, format_eta, format_number};
use crate::theme::Theme;

/// Width of the header's task progress bar, in cells.
const PROGRESS_CELLS: usize = 8;

pub fn render(frame: &mut Frame, app: &App, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app, theme);
    if app.show_tasks {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(40), Constraint::Min(20)])
            .split(chunks[1]);
        render_tasks(frame, body[0], app, theme);
        render_log(frame, body[1], app, theme);
    } else {
        render_log(frame, chunks[1], app, theme);
    }
    render_footer(frame, chunks[2], app, theme);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let (icon, icon_color) = theme.status_indicator(app.status);

    let filled = if app.progress.total > 0 {
        (app.progress.done * PROGRESS_CELLS).div_ceil(app.progress.total)
    } else {
        0
    }
    .min(PROGRESS_CELLS);

    let line = Line::from(vec![
        Span::styled(format!(" {icon} "), Style::default().fg(icon_color)),
        Span::styled(app.status.as_str(), Style::default().fg(theme.text)),
        Span::styled(" │ ", Style::default().fg(theme.border)),
        Span::styled("iter ", Style::default().fg(theme.muted)),
        Span::styled(app.iteration.to_string(), Style::default().fg(theme.text)),
        Span::styled(" │ ", Style::default().fg(theme.border)),
        Span::styled("█".repeat(filled), Style::default().fg(theme.accent)),
        Span::styled(
            "░".repeat(PROGRESS_CELLS - filled),
            Style::default().fg(theme.border),
        ),
        Span::styled(
            format!(" {}/{}", app.progress.done, app.progress.total),
            Style::default().fg(theme.text),
        ),
        Span::styled(" │ ", Style::default().fg(theme.border)),
        Span::styled(format_eta(app.eta_ms()), Style::default().fg(theme.muted)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_log(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    // Show the tail that fits inside the borders.
    let visible = area.height.saturating_sub(2) as usize;
    let skip = app.log.len().saturating_sub(visible);

    let items: Vec<ListItem> = app.log[skip..]
        .iter()
        .map(|line| {
            let style = match line.kind {
                LogKind::Info => Style::default().fg(theme.accent),
                LogKind::Tool => Style::default()
                    .fg(theme.success)
                    .add_modifier(Modifier::BOLD),
                LogKind::Output => Style::default().fg(theme.text),
                LogKind::Error => Style::default().fg(theme.error),
            };
            ListItem::new(Line::from(Span::styled(line.text.clone(), style)))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .title(" planloop "),
    );
    frame.render_widget(list, area);
}

fn render_tasks(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let items: Vec<ListItem> = app
        .tasks
        .iter()
        .map(|task| {
            let (marker, marker_color, title_color) = if task.done {
                ("✓", theme.success, theme.muted)
            } else {
                ("○", theme.muted, theme.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{marker} "), Style::default().fg(marker_color)),
                Span::styled(task.title.clone(), Style::default().fg(title_color)),
            ]))
        })
        .collect();

    let list = List::new(if items.is_empty() {
        vec![ListItem::new(Span::styled(
            "No tasks loaded",
            Style::default().fg(theme.muted),
        ))]
    } else {
        items
    })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .title(" Tasks "),
    );
    frame.render_widget(list, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let hints = Line::from(vec![
        Span::styled(" q", Style::default().fg(theme.accent)),
        Span::styled(" quit  ", Style::default().fg(theme.text)),
        Span::styled("p", Style::default().fg(theme.accent)),
        Span::styled(
            format!(" {}  ", app.action_label()),
            Style::default().fg(theme.text),
        ),
        Span::styled("t", Style::default().fg(theme.accent)),
        Span::styled(" tasks", Style::default().fg(theme.text)),
    ]);

    let stats_text = format!(
        "+{}/-{} · {}c · {} ",
        format_number(app.diff.added),
        format_number(app.diff.removed),
        app.commits,
        format_duration(app.elapsed_ms())
    );
    let stats = Line::from(vec![
        Span::styled(
            format!("+{}", format_number(app.diff.added)),
            Style::default().fg(theme.success),
        ),
        Span::styled("/", Style::default().fg(theme.text)),
        Span::styled(
            format!("-{}", format_number(app.diff.removed)),
            Style::default().fg(theme.error),
        ),
        Span::styled(" · ", Style::default().fg(theme.text)),
        Span::styled(format!("{}c", app.commits), Style::default().fg(theme.accent)),
        Span::styled(" · ", Style::default().fg(theme.text)),
        Span::styled(
            format!("{} ", format_duration(app.elapsed_ms())),
            Style::default().fg(theme.accent),
        ),
    ]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(stats_text.chars().count() as u16),
        ])
        .split(area);
    frame.render_widget(Paragraph::new(hints), chunks[0]);
    frame.render_widget(Paragraph::new(stats), chunks[1]);
}
