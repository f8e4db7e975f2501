use std::ops::Range;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use regex::Regex;
use time::{macros::format_description, OffsetDateTime};

use crate::app::state::{
    AppState, ConfirmOverlay, InputMode, OverlayState, PickerKind, PickerOverlay, PromptOverlay,
};
use crate::config::AppConfig;
use crate::highlight::{build_term_regex, match_ranges, split_runs};
use crate::journaling::Journal;
use crate::store::{Entry, EntryState};
use crate::timeline::{layout, DisplayFlags, QuickKind, Timeline, TimelineId, TimelineState, TitleState};

const MIN_COLUMN_WIDTH: u16 = 28;
const COMPOSE_HEIGHT: u16 = 3;

/// Screen regions for one mounted timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub timeline: TimelineId,
    pub outer: Rect,
    pub body: Rect,
    pub panels: Rect,
    pub compose: Rect,
}

/// Everything above the status bar.
pub fn main_area(size: Rect) -> Rect {
    split_status(size)[0]
}

fn split_status(size: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)])
        .split(size)
}

/// Columns that fit side by side, windowed so the focused one is visible.
pub fn visible_columns(count: usize, focus: usize, width: u16) -> Range<usize> {
    if count == 0 {
        return 0..0;
    }
    let fit = usize::from((width / MIN_COLUMN_WIDTH).max(1)).min(count);
    let focus = focus.min(count - 1);
    let start = focus.saturating_sub(fit - 1).min(count - fit);
    start..start + fit
}

/// Lays out the visible timelines. The body rect is what each timeline
/// measures its viewport against.
pub fn layout_columns(area: Rect, journal: &Journal, focus: usize) -> Vec<ColumnLayout> {
    let ids = journal.timeline_ids();
    let range = visible_columns(ids.len(), focus, area.width);
    let shown = &ids[range];
    if shown.is_empty() {
        return Vec::new();
    }
    let constraints = vec![Constraint::Ratio(1, shown.len() as u32); shown.len()];
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    shown
        .iter()
        .zip(columns.iter())
        .filter_map(|(id, outer)| {
            let timeline = journal.timeline(*id)?;
            let inner = Block::default().borders(Borders::ALL).inner(*outer);
            let panel_rows = panel_rows(timeline);
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Min(1),
                    Constraint::Length(panel_rows),
                    Constraint::Length(COMPOSE_HEIGHT),
                ])
                .split(inner);
            Some(ColumnLayout {
                timeline: *id,
                outer: *outer,
                body: parts[0],
                panels: parts[1],
                compose: parts[2],
            })
        })
        .collect()
}

fn panel_rows(timeline: &Timeline) -> u16 {
    let flags = timeline.shell().flags();
    u16::from(flags.contains(DisplayFlags::HABITS)) + u16::from(flags.contains(DisplayFlags::TODOS))
}

pub fn draw_app(frame: &mut Frame, journal: &Journal, state: &AppState, config: &AppConfig) {
    let regions = split_status(frame.size());

    if let Some((loaded, total)) = journal.boot_progress() {
        draw_boot_screen(frame, regions[0], loaded, total);
    } else if journal.is_empty() {
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled(
                "No timelines",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Press N to add one",
                Style::default().fg(Color::Gray),
            )),
        ])
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(paragraph, regions[0]);
    } else {
        let ids = journal.timeline_ids();
        let focused = state.focused(&ids);
        for column in layout_columns(regions[0], journal, state.focus) {
            if let Some(timeline) = journal.timeline(column.timeline) {
                draw_timeline(frame, &column, timeline, state, focused == Some(column.timeline));
            }
        }
    }

    let status = Paragraph::new(build_status_line(journal, state));
    frame.render_widget(status, regions[1]);

    render_overlay(frame, journal, state, config);
}

fn draw_boot_screen(frame: &mut Frame, area: Rect, loaded: usize, total: usize) {
    let area = centered_rect(50, 20, area);
    let ratio = if total == 0 {
        1.0
    } else {
        loaded as f64 / total as f64
    };
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title("Loading timelines")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .gauge_style(Style::default().fg(Color::Cyan))
        .label(format!("{loaded}/{total}"))
        .ratio(ratio.clamp(0.0, 1.0));
    frame.render_widget(gauge, area);
}

fn draw_timeline(
    frame: &mut Frame,
    column: &ColumnLayout,
    timeline: &Timeline,
    state: &AppState,
    focused: bool,
) {
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let mut block = Block::default()
        .title(title_line(timeline, focused && state.mode == InputMode::Title))
        .borders(Borders::ALL)
        .border_style(border_style);
    let indicator = loading_label(timeline.state())
        .or_else(|| timeline.is_searching().then_some("searching…"));
    if let Some(indicator) = indicator {
        block = block.title_bottom(Line::from(Span::styled(
            indicator,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        )));
    } else if !timeline.anchor().auto_scroll() {
        block = block.title_bottom(Line::from(Span::styled(
            "pinned",
            Style::default().fg(Color::Gray),
        )));
    }
    frame.render_widget(block, column.outer);

    let matcher = if timeline.is_filtered() {
        build_term_regex(timeline.search_term())
    } else {
        None
    };
    let body = body_text(timeline, column.body, matcher.as_ref(), focused);
    frame.render_widget(Paragraph::new(body), column.body);

    if column.panels.height > 0 {
        frame.render_widget(Paragraph::new(panel_lines(timeline)), column.panels);
    }

    let composing = focused && state.mode == InputMode::Compose;
    frame.render_widget(compose_widget(timeline, composing), column.compose);
}

fn title_line(timeline: &Timeline, editing: bool) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut spans = Vec::new();
    match timeline.shell().title_state() {
        TitleState::Editing { draft } => {
            let mut draft = draft.clone();
            if editing {
                draft.push('▌');
            }
            spans.push(Span::styled(
                format!(" ✎ {draft} "),
                bold.fg(Color::Magenta),
            ));
        }
        TitleState::Saving { draft } => {
            spans.push(Span::styled(
                format!(" {draft} (saving…) "),
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ));
        }
        TitleState::Viewing => spans.push(Span::styled(format!(" {} ", timeline.title()), bold)),
    }
    if timeline.is_filtered() {
        spans.push(Span::styled(
            format!("[/{}] ", timeline.search_term()),
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

fn loading_label(state: TimelineState) -> Option<&'static str> {
    match state {
        TimelineState::Idle => None,
        TimelineState::LoadingInitial => Some("loading…"),
        TimelineState::LoadingOlder => Some("loading older…"),
        TimelineState::Refreshing => Some("refreshing…"),
    }
}

/// Builds exactly the rows the layout module measured, then shows the window
/// starting at the anchor's offset.
fn body_text(
    timeline: &Timeline,
    area: Rect,
    matcher: Option<&Regex>,
    focused: bool,
) -> Text<'static> {
    let rendered = timeline.rendered();
    if rendered.is_empty() {
        let message = if timeline.is_filtered() {
            "No entries match."
        } else if timeline.is_loading() {
            "Loading…"
        } else {
            "No entries yet."
        };
        return Text::from(Line::from(Span::styled(
            message,
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )));
    }

    let width = usize::from(area.width);
    let flags = timeline.shell().flags();
    let selected = timeline.selected();
    let mut rows = Vec::with_capacity(layout::content_extent(rendered, width, flags));
    for entry in rendered {
        let is_selected = focused && selected == Some(entry.id);
        if flags.contains(DisplayFlags::TIMESTAMPS) {
            rows.push(meta_line(entry, is_selected, flags));
        }
        let base = entry_style(entry, is_selected);
        // matched on whole lines so a hit cut by wrapping stays marked
        for line in layout::sanitize(entry.display_content()).split('\n') {
            let hits = match_ranges(line, matcher);
            for row in layout::wrap_ranges(line, width) {
                rows.push(highlight_row(line, row, &hits, base));
            }
        }
        rows.push(Line::from(""));
    }

    let offset = timeline.anchor().offset();
    let visible: Vec<Line<'static>> = rows
        .into_iter()
        .skip(offset)
        .take(usize::from(area.height))
        .collect();
    Text::from(visible)
}

fn meta_line(entry: &Entry, selected: bool, flags: DisplayFlags) -> Line<'static> {
    let mut spans = Vec::new();
    let marker = if selected { "▶ " } else { "  " };
    spans.push(Span::styled(marker, Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(
        format_timestamp(entry.timestamp),
        Style::default().fg(Color::Gray),
    ));
    match &entry.state {
        EntryState::Editing { .. } => {
            let label = if entry.state.is_dirty() { " ✎*" } else { " ✎" };
            spans.push(Span::styled(
                label,
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            ));
        }
        EntryState::Saving { .. } => spans.push(Span::styled(
            " saving…",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )),
        EntryState::Viewing => {}
    }
    if entry.highlighted {
        spans.push(Span::styled(" ★", Style::default().fg(Color::Yellow)));
    }
    if selected && flags.contains(DisplayFlags::EDIT_CONTROLS) && entry.state.is_viewing() {
        spans.push(Span::styled(
            "  e edit · d del · h mark",
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn entry_style(entry: &Entry, selected: bool) -> Style {
    let mut style = Style::default();
    if entry.highlighted {
        style = style.fg(Color::Yellow);
    }
    match entry.state {
        EntryState::Editing { .. } => style = style.fg(Color::Magenta),
        EntryState::Saving { .. } => style = style.add_modifier(Modifier::DIM),
        EntryState::Viewing => {}
    }
    if selected {
        style = style.add_modifier(Modifier::BOLD);
    }
    style
}

fn panel_lines(timeline: &Timeline) -> Vec<Line<'static>> {
    let flags = timeline.shell().flags();
    let mut lines = Vec::new();
    for (flag, kind, label) in [
        (DisplayFlags::HABITS, QuickKind::Habit, "Habits"),
        (DisplayFlags::TODOS, QuickKind::Todo, "Todos"),
    ] {
        if !flags.contains(flag) {
            continue;
        }
        let items = timeline.quick(kind).items();
        let listing = if items.is_empty() {
            "none".to_string()
        } else {
            items
                .iter()
                .map(|item| item.text.as_str())
                .collect::<Vec<_>>()
                .join(" · ")
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{label}: "), Style::default().fg(Color::Cyan)),
            Span::raw(listing),
        ]));
    }
    lines
}

fn compose_widget(timeline: &Timeline, active: bool) -> Paragraph<'static> {
    let compose = timeline.compose();
    let mut text = compose
        .text()
        .lines()
        .last()
        .unwrap_or("")
        .to_string();
    if active {
        text.push('▌');
    }
    let (title, style) = if compose.is_submitting() {
        ("Posting…", Style::default().fg(Color::Gray))
    } else if active {
        ("Compose (Enter to post)", Style::default().fg(Color::Cyan))
    } else {
        ("Compose", Style::default())
    };
    let content = if text.is_empty() {
        Line::from(Span::styled(
            "press i to write",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(text)
    };
    Paragraph::new(content).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(style),
    )
}

fn build_status_line(journal: &Journal, state: &AppState) -> Text<'static> {
    let ids = journal.timeline_ids();
    let position = match state.focused(&ids) {
        Some(_) => format!("{}/{}", state.focus + 1, ids.len()),
        None => "0/0".to_string(),
    };
    let mode = match state.mode {
        InputMode::Normal => "Normal",
        InputMode::Compose => "Compose",
        InputMode::EditEntry(_) => "Edit",
        InputMode::Title => "Title",
    };
    let mut spans = vec![
        Span::raw("Timeline: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | Mode: "),
        Span::styled(mode, Style::default().add_modifier(Modifier::BOLD)),
    ];
    let in_flight = journal.pending_calls();
    if in_flight > 0 {
        spans.push(Span::raw(" | In flight: "));
        spans.push(Span::styled(
            in_flight.to_string(),
            Style::default().fg(Color::Yellow),
        ));
    }

    let mut lines = vec![Line::from(spans)];
    let hint = match &state.status_message {
        Some(message) => Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Green),
        )),
        None => Line::from(Span::styled(
            key_hints(state.mode),
            Style::default().fg(Color::Gray),
        )),
    };
    lines.push(hint);
    Text::from(lines)
}

fn key_hints(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Normal => {
            "q quit • Tab switch • j/k select • i write • e edit • / search • m template • b/o habits/todos • N new • X remove"
        }
        InputMode::Compose => "Enter post • Esc leave",
        InputMode::EditEntry(_) => "Enter save • Alt-Enter newline • Esc cancel",
        InputMode::Title => "Enter save title • Esc cancel",
    }
}

fn format_timestamp(dt: OffsetDateTime) -> String {
    dt.format(&format_description!(
        "[year]-[month]-[day] [hour]:[minute]"
    ))
    .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn highlight_row(
    line: &str,
    row: Range<usize>,
    hits: &[Range<usize>],
    base_style: Style,
) -> Line<'static> {
    let highlight_style = Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let spans: Vec<Span<'static>> = split_runs(line, row, hits)
        .into_iter()
        .map(|(run, hit)| {
            let style = if hit { highlight_style } else { base_style };
            Span::styled(run.to_string(), style)
        })
        .collect();
    Line::from(spans)
}

fn render_overlay(frame: &mut Frame, journal: &Journal, state: &AppState, config: &AppConfig) {
    match state.overlay() {
        Some(OverlayState::Prompt(prompt)) => render_prompt(frame, prompt),
        Some(OverlayState::Confirm(confirm)) => render_confirm(frame, confirm),
        Some(OverlayState::Picker(picker)) => {
            let ids = journal.timeline_ids();
            let timeline = state.focused(&ids).and_then(|id| journal.timeline(id));
            render_picker(frame, picker, timeline, config);
        }
        None => {}
    }
}

fn render_prompt(frame: &mut Frame, prompt: &PromptOverlay) {
    let area = centered_rect(60, 25, frame.size());
    frame.render_widget(Clear, area);
    let mut input = prompt.input.clone();
    input.push('▌');
    let label = prompt.purpose.label();
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            label.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(input),
        Line::from(""),
        Line::from(Span::styled(
            "Enter to confirm • Esc to cancel",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .title(label)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_confirm(frame: &mut Frame, confirm: &ConfirmOverlay) {
    let area = centered_rect(60, 25, frame.size());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            confirm.request.message(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "y / Enter to confirm • n / Esc to cancel",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .title("Confirm")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_picker(
    frame: &mut Frame,
    picker: &PickerOverlay,
    timeline: Option<&Timeline>,
    config: &AppConfig,
) {
    let area = centered_rect(50, 50, frame.size());
    frame.render_widget(Clear, area);
    let (title, labels, hint): (String, Vec<String>, &str) = match picker.kind {
        PickerKind::Quick(kind) => {
            let labels = timeline
                .map(|timeline| {
                    timeline
                        .quick(kind)
                        .items()
                        .iter()
                        .map(|item| item.text.clone())
                        .collect()
                })
                .unwrap_or_default();
            (
                format!("{kind}s"),
                labels,
                "Enter log it • a add • x remove • Esc close",
            )
        }
        PickerKind::Template => (
            "Templates".to_string(),
            config
                .templates
                .iter()
                .map(|template| template.name.clone())
                .collect(),
            "Enter insert • Esc close",
        ),
    };
    let items: Vec<ListItem> = if labels.is_empty() {
        vec![ListItem::new(Span::styled(
            "Nothing here yet.",
            Style::default().fg(Color::Gray),
        ))]
    } else {
        labels.into_iter().map(ListItem::new).collect()
    };
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::Gray))))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    let mut list_state = ListState::default();
    list_state.select(Some(picker.selected));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journaling::JournalOptions;
    use crate::store::EntryStore;
    use crate::config::{FailureConfig, LatencyConfig};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use std::time::Duration;

    #[test]
    fn column_window_follows_focus() {
        assert_eq!(visible_columns(0, 0, 120), 0..0);
        assert_eq!(visible_columns(10, 0, 84), 0..3);
        assert_eq!(visible_columns(10, 5, 84), 3..6);
        assert_eq!(visible_columns(10, 9, 84), 7..10);
        assert_eq!(visible_columns(2, 1, 200), 0..2);
        assert_eq!(visible_columns(4, 2, 10), 2..3);
    }

    #[test]
    fn column_body_excludes_chrome() {
        let store = EntryStore::new(&LatencyConfig::default(), &FailureConfig::default());
        let mut journal = Journal::new(JournalOptions::default(), store);
        journal.add_timeline("One");
        let columns = layout_columns(Rect::new(0, 0, 40, 20), &journal, 0);
        assert_eq!(columns.len(), 1);
        let column = columns[0];
        assert_eq!(column.body.width, 38);
        assert_eq!(column.body.height, 20 - 2 - COMPOSE_HEIGHT);
        assert_eq!(column.panels.height, 0);
    }

    #[test]
    fn renders_boot_screen_and_timelines() -> anyhow::Result<()> {
        let store = EntryStore::new(&LatencyConfig::default(), &FailureConfig::default());
        let mut journal = Journal::new(JournalOptions::default(), store);
        let state = AppState::default();
        let config = AppConfig::default();
        journal.boot(1);

        let mut terminal = Terminal::new(TestBackend::new(60, 20))?;
        terminal.draw(|frame| draw_app(frame, &journal, &state, &config))?;
        let screen = format!("{:?}", terminal.backend().buffer());
        assert!(screen.contains("Loading timelines"));

        journal.poll(Duration::from_secs(1));
        terminal.draw(|frame| draw_app(frame, &journal, &state, &config))?;
        let screen = format!("{:?}", terminal.backend().buffer());
        assert!(screen.contains("Timeline 1"));
        Ok(())
    }
}
