use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::journaling::{Journal, JournalEvent};
use crate::store::{EntryId, Operation};
use crate::timeline::{Answer, DisplayFlags, LifecycleError, QuickKind, TimelineId};
use crate::ui;

pub mod state;

pub use state::{
    AppState, DeferredConfirm, InputMode, OverlayState, PendingAction, PickerKind, PromptPurpose,
};

#[derive(Debug, Clone, Copy)]
enum Action {
    Quit,
    NextTimeline,
    PreviousTimeline,
    SelectNext,
    SelectPrevious,
    PageUp,
    PageDown,
    Compose,
    EditEntry,
    DeleteEntry,
    ToggleHighlight,
    StartSearch,
    ClearSearch,
    ToggleDisplay(DisplayFlags),
    RenameTimeline,
    Refresh,
    ToggleAutoScroll,
    OpenPicker(PickerKind),
    NewTimeline,
    RemoveTimeline,
}

pub struct App {
    pub config: Arc<AppConfig>,
    journal: Journal,
    state: AppState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    /// Builds the journal and starts the sequential boot load.
    pub fn new(config: Arc<AppConfig>) -> Self {
        let mut journal = Journal::from_config(&config);
        journal.boot(config.timeline_count);
        let tick_rate = config.tick_rate();
        Self {
            config,
            journal,
            state: AppState::default(),
            should_quit: false,
            tick_rate,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            let size = terminal.size().context("reading terminal size")?;
            self.sync_viewports(size);
            terminal
                .draw(|frame| ui::draw_app(frame, &self.journal, &self.state, &self.config))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // viewports are re-measured before the next draw
                    }
                    _ => {}
                }
            }

            let elapsed = last_tick.elapsed();
            if elapsed >= self.tick_rate {
                self.on_tick(elapsed);
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    /// Hands every visible timeline the body size it will be drawn into.
    fn sync_viewports(&mut self, size: Rect) {
        let area = ui::main_area(size);
        for column in ui::layout_columns(area, &self.journal, self.state.focus) {
            if let Ok(timeline) = self.journal.timeline_mut(column.timeline) {
                timeline.set_viewport(usize::from(column.body.width), usize::from(column.body.height));
            }
        }
    }

    /// Moves simulated time forward and reacts to whatever landed.
    pub fn on_tick(&mut self, elapsed: Duration) {
        for event in self.journal.poll(elapsed) {
            self.handle_journal_event(event);
        }
    }

    fn handle_journal_event(&mut self, event: JournalEvent) {
        match event {
            JournalEvent::BootProgress { .. } => {}
            JournalEvent::Booted { timelines } => {
                self.state.clamp_focus(self.journal.len());
                self.state
                    .set_status_message(Some(format!("Loaded {timelines} timeline(s)")));
            }
            JournalEvent::Completed { timeline, operation } => match operation {
                Operation::SaveEntry => self.state.set_status_message(Some("Entry saved")),
                Operation::SaveTitle => self.state.set_status_message(Some("Title saved")),
                Operation::CreateEntry => self.state.set_status_message(Some("Entry posted")),
                Operation::Search => {
                    if let Some(timeline) = self
                        .journal
                        .timeline(timeline)
                        .filter(|timeline| timeline.is_filtered())
                    {
                        let message = format!(
                            "{} match(es) for \"{}\"; Esc clears",
                            timeline.rendered().len(),
                            timeline.search_term()
                        );
                        self.state.set_status_message(Some(message));
                    }
                }
                Operation::LoadInitial | Operation::LoadOlder => {}
            },
            JournalEvent::Failed { timeline, error } => {
                let title = self
                    .journal
                    .timeline(timeline)
                    .map(|timeline| timeline.title().to_string())
                    .unwrap_or_else(|| timeline.to_string());
                self.state
                    .set_status_message(Some(format!("{title}: {error}")));
            }
            JournalEvent::Dropped { .. } => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if is_quit_chord(&key) {
            self.should_quit = true;
            return;
        }
        if self.state.overlay().is_some() {
            self.handle_overlay_key(key);
            return;
        }
        if self.journal.is_booting() {
            if key.code == KeyCode::Char('q') {
                self.should_quit = true;
            }
            return;
        }
        match self.state.mode {
            InputMode::Compose => self.handle_compose_key(key),
            InputMode::EditEntry(entry) => self.handle_edit_key(entry, key),
            InputMode::Title => self.handle_title_key(key),
            InputMode::Normal => {
                if let Some(action) = map_normal_key(&key) {
                    self.state.clear_status_message();
                    self.handle_action(action);
                }
            }
        }
    }

    fn handle_action(&mut self, action: Action) {
        if let Action::Quit = action {
            self.should_quit = true;
            return;
        }
        if let Action::NewTimeline = action {
            self.state.open_prompt(PromptPurpose::NewTimeline, "");
            return;
        }
        let Some(id) = self.focused_id() else {
            self.state
                .set_status_message(Some("No timeline focused; press N to add one"));
            return;
        };
        match action {
            Action::Quit | Action::NewTimeline => {}
            Action::NextTimeline => self.state.cycle_focus(1, self.journal.len()),
            Action::PreviousTimeline => self.state.cycle_focus(-1, self.journal.len()),
            Action::SelectNext => self.attempt(|journal| journal.move_selection(id, 1).map(|_| ())),
            Action::SelectPrevious => {
                self.attempt(|journal| journal.move_selection(id, -1).map(|_| ()))
            }
            Action::PageUp | Action::PageDown => {
                let page = self
                    .journal
                    .timeline(id)
                    .map(|timeline| (timeline.anchor().viewport() / 2).max(1) as isize)
                    .unwrap_or(1);
                let delta = if let Action::PageUp = action { -page } else { page };
                self.attempt(|journal| journal.scroll(id, delta).map(|_| ()));
            }
            Action::Compose => self.state.set_mode(InputMode::Compose),
            Action::EditEntry => self.begin_edit(id),
            Action::DeleteEntry => self.delete_selected(id),
            Action::ToggleHighlight => self.attempt(|journal| {
                let timeline = journal.timeline_mut(id)?;
                if let Some(entry) = timeline.selected() {
                    timeline.toggle_highlight(entry)?;
                }
                Ok(())
            }),
            Action::StartSearch => {
                let term = self
                    .journal
                    .timeline(id)
                    .map(|timeline| timeline.search_term().to_string())
                    .unwrap_or_default();
                self.state.open_prompt(PromptPurpose::Search, term);
            }
            Action::ClearSearch => {
                if let Ok(timeline) = self.journal.timeline_mut(id) {
                    if timeline.clear_search() {
                        self.state.set_status_message(Some("Filter cleared"));
                    }
                }
            }
            Action::ToggleDisplay(flag) => {
                if let Ok(timeline) = self.journal.timeline_mut(id) {
                    timeline.toggle_display(flag);
                }
            }
            Action::RenameTimeline => {
                if let Ok(timeline) = self.journal.timeline_mut(id) {
                    if timeline.begin_title_edit() {
                        self.state.set_mode(InputMode::Title);
                    } else {
                        self.state
                            .set_status_message(Some("Title is still saving"));
                    }
                }
            }
            Action::Refresh => self.refresh(id),
            Action::ToggleAutoScroll => {
                if let Ok(timeline) = self.journal.timeline_mut(id) {
                    let enabled = !timeline.anchor().auto_scroll();
                    timeline.set_auto_scroll(enabled);
                    let message = if enabled {
                        "Auto-scroll on"
                    } else {
                        "Auto-scroll paused"
                    };
                    self.state.set_status_message(Some(message));
                }
            }
            Action::OpenPicker(kind) => self.state.open_picker(kind),
            Action::RemoveTimeline => {
                let mut deferred = DeferredConfirm::default();
                match self.journal.remove_timeline(id, &mut deferred) {
                    Ok(_) => {
                        if let Some(request) = deferred.take() {
                            self.state.open_confirm(
                                request,
                                PendingAction::RemoveTimeline { timeline: id },
                            );
                        }
                    }
                    Err(err) => self.report(err),
                }
            }
        }
    }

    fn begin_edit(&mut self, id: TimelineId) {
        let result = self.journal.timeline_mut(id).and_then(|timeline| {
            let Some(entry) = timeline.selected() else {
                return Ok(None);
            };
            timeline.begin_edit(entry)?;
            Ok(Some(entry))
        });
        match result {
            Ok(Some(entry)) => self.state.set_mode(InputMode::EditEntry(entry)),
            Ok(None) => self.state.set_status_message(Some("Nothing to edit")),
            Err(err) => self.report(err),
        }
    }

    fn refresh(&mut self, id: TimelineId) {
        let mut deferred = DeferredConfirm::default();
        match self.journal.refresh(id, &mut deferred) {
            Ok(true) => self.state.set_status_message(Some("Refreshing…")),
            Ok(false) => {
                if let Some(request) = deferred.take() {
                    self.state
                        .open_confirm(request, PendingAction::Refresh { timeline: id });
                }
            }
            Err(err) => self.report(err),
        }
    }

    fn delete_selected(&mut self, id: TimelineId) {
        let mut deferred = DeferredConfirm::default();
        let result = self.journal.timeline_mut(id).and_then(|timeline| {
            let Some(entry) = timeline.selected() else {
                return Ok(None);
            };
            timeline.delete_entry(entry, &mut deferred)?;
            Ok(Some(entry))
        });
        match result {
            Ok(Some(entry)) => {
                if let Some(request) = deferred.take() {
                    self.state.open_confirm(
                        request,
                        PendingAction::DeleteEntry {
                            timeline: id,
                            entry,
                        },
                    );
                }
            }
            Ok(None) => self.state.set_status_message(Some("Nothing to delete")),
            Err(err) => self.report(err),
        }
    }

    fn handle_compose_key(&mut self, key: KeyEvent) {
        let Some(id) = self.focused_id() else {
            self.state.set_mode(InputMode::Normal);
            return;
        };
        match key.code {
            KeyCode::Esc => self.state.set_mode(InputMode::Normal),
            KeyCode::Enter => match self.journal.submit_compose(id) {
                Ok(true) => self.state.set_status_message(Some("Posting…")),
                Ok(false) => self.state.set_status_message(Some("Nothing to post")),
                Err(err) => self.report(err),
            },
            KeyCode::Backspace => {
                if let Ok(timeline) = self.journal.timeline_mut(id) {
                    timeline.compose_pop();
                }
            }
            KeyCode::Char(ch) if is_plain(&key) => {
                if let Ok(timeline) = self.journal.timeline_mut(id) {
                    if !timeline.compose_push(ch) {
                        self.state
                            .set_status_message(Some("Wait for the current post to land"));
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, entry: EntryId, key: KeyEvent) {
        let Some(id) = self.focused_id() else {
            self.state.set_mode(InputMode::Normal);
            return;
        };
        match key.code {
            KeyCode::Esc => {
                let mut deferred = DeferredConfirm::default();
                match self
                    .journal
                    .timeline_mut(id)
                    .and_then(|timeline| timeline.cancel_edit(entry, &mut deferred))
                {
                    Ok(true) => self.state.set_mode(InputMode::Normal),
                    Ok(false) => {
                        if let Some(request) = deferred.take() {
                            self.state.open_confirm(
                                request,
                                PendingAction::DiscardDraft {
                                    timeline: id,
                                    entry,
                                },
                            );
                        }
                    }
                    Err(err) => {
                        self.state.set_mode(InputMode::Normal);
                        self.report(err);
                    }
                }
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                self.edit_draft(id, entry, |draft| draft.push('\n'));
            }
            KeyCode::Enter => match self.journal.save_edit(id, entry) {
                Ok(()) => {
                    self.state.set_mode(InputMode::Normal);
                    self.state.set_status_message(Some("Saving…"));
                }
                Err(err) => self.report(err),
            },
            KeyCode::Backspace => self.edit_draft(id, entry, |draft| {
                draft.pop();
            }),
            KeyCode::Char(ch) if is_plain(&key) => {
                self.edit_draft(id, entry, |draft| draft.push(ch));
            }
            _ => {}
        }
    }

    fn edit_draft(&mut self, id: TimelineId, entry: EntryId, change: impl FnOnce(&mut String)) {
        let result = self.journal.timeline_mut(id).and_then(|timeline| {
            let mut draft = timeline
                .entry(entry)
                .and_then(|entry| entry.state.draft())
                .map(str::to_string)
                .ok_or(LifecycleError::NotEditing(entry))?;
            change(&mut draft);
            timeline.change_draft(entry, draft)
        });
        if let Err(err) = result {
            self.state.set_mode(InputMode::Normal);
            self.report(err);
        }
    }

    fn handle_title_key(&mut self, key: KeyEvent) {
        let Some(id) = self.focused_id() else {
            self.state.set_mode(InputMode::Normal);
            return;
        };
        match key.code {
            KeyCode::Esc => {
                if let Ok(timeline) = self.journal.timeline_mut(id) {
                    timeline.cancel_title_edit();
                }
                self.state.set_mode(InputMode::Normal);
            }
            KeyCode::Enter => match self.journal.commit_title(id) {
                Ok(true) => {
                    self.state.set_mode(InputMode::Normal);
                    self.state.set_status_message(Some("Saving title…"));
                }
                Ok(false) => self
                    .state
                    .set_status_message(Some("Title cannot be empty")),
                Err(err) => self.report(err),
            },
            KeyCode::Backspace => self.edit_title(id, |draft| {
                draft.pop();
            }),
            KeyCode::Char(ch) if is_plain(&key) => self.edit_title(id, |draft| draft.push(ch)),
            _ => {}
        }
    }

    fn edit_title(&mut self, id: TimelineId, change: impl FnOnce(&mut String)) {
        if let Ok(timeline) = self.journal.timeline_mut(id) {
            let mut draft = timeline
                .shell()
                .title_draft()
                .unwrap_or_default()
                .to_string();
            change(&mut draft);
            timeline.change_title_draft(draft);
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) {
        match self.state.overlay() {
            Some(OverlayState::Prompt(_)) => self.handle_prompt_key(key),
            Some(OverlayState::Confirm(confirm)) => {
                let action = confirm.action;
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => {
                        self.state.close_overlay();
                        self.apply_confirmed(action);
                    }
                    KeyCode::Char('n') | KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Canceled"));
                    }
                    _ => {}
                }
            }
            Some(OverlayState::Picker(picker)) => {
                let (kind, selected) = (picker.kind, picker.selected);
                self.handle_picker_key(kind, selected, key);
            }
            None => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.state.close_overlay();
            }
            KeyCode::Enter => {
                let Some(OverlayState::Prompt(prompt)) = self.state.overlay.take() else {
                    return;
                };
                self.submit_prompt(prompt.purpose, prompt.input);
            }
            KeyCode::Backspace => {
                if let Some(prompt) = self.state.prompt_mut() {
                    prompt.input.pop();
                }
            }
            KeyCode::Char(ch) if is_plain(&key) => {
                if let Some(prompt) = self.state.prompt_mut() {
                    prompt.input.push(ch);
                }
            }
            _ => {}
        }
    }

    fn submit_prompt(&mut self, purpose: PromptPurpose, input: String) {
        match purpose {
            PromptPurpose::NewTimeline => {
                let title = match input.trim() {
                    "" => format!("Timeline {}", self.journal.len() + 1),
                    title => title.to_string(),
                };
                self.journal.add_timeline(title);
                self.state.focus = self.journal.len().saturating_sub(1);
            }
            PromptPurpose::Search => {
                let Some(id) = self.focused_id() else { return };
                match self.journal.run_search(id, &input) {
                    Ok(true) => self.state.set_status_message(Some("Searching…")),
                    Ok(false) => self.state.set_status_message(Some("Filter cleared")),
                    Err(err) => self.report(err),
                }
            }
            PromptPurpose::QuickItem(kind) => {
                let Some(id) = self.focused_id() else { return };
                if let Ok(timeline) = self.journal.timeline_mut(id) {
                    let added = timeline
                        .quick_mut(kind)
                        .add_via(&mut |_: &str| -> Option<String> { Some(input.clone()) });
                    if !added {
                        self.state
                            .set_status_message(Some(format!("Empty {kind} ignored")));
                    }
                }
                self.state.open_picker(PickerKind::Quick(kind));
            }
        }
    }

    fn handle_picker_key(&mut self, kind: PickerKind, selected: usize, key: KeyEvent) {
        let Some(id) = self.focused_id() else {
            self.state.close_overlay();
            return;
        };
        let len = match kind {
            PickerKind::Quick(quick) => self
                .journal
                .timeline(id)
                .map(|timeline| timeline.quick(quick).len())
                .unwrap_or(0),
            PickerKind::Template => self.config.templates.len(),
        };
        match key.code {
            KeyCode::Esc => self.state.close_overlay(),
            KeyCode::Char('j') | KeyCode::Down => self.state.picker_move(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.state.picker_move(-1, len),
            KeyCode::Char('a') => {
                if let PickerKind::Quick(quick) = kind {
                    self.state.open_prompt(PromptPurpose::QuickItem(quick), "");
                }
            }
            KeyCode::Char('x') => {
                if let PickerKind::Quick(quick) = kind {
                    if let Ok(timeline) = self.journal.timeline_mut(id) {
                        timeline.quick_mut(quick).remove(selected);
                    }
                    self.state.picker_move(0, len.saturating_sub(1));
                }
            }
            KeyCode::Enter if len > 0 => match kind {
                PickerKind::Quick(quick) => self.promote(id, quick, selected),
                PickerKind::Template => self.insert_template(id, selected),
            },
            _ => {}
        }
    }

    fn promote(&mut self, id: TimelineId, kind: QuickKind, index: usize) {
        self.state.close_overlay();
        match self
            .journal
            .timeline_mut(id)
            .and_then(|timeline| timeline.promote_quick_item(kind, index))
        {
            Ok(_) => self.state.set_status_message(Some(format!("Logged {kind}"))),
            Err(err) => self.report(err),
        }
    }

    fn insert_template(&mut self, id: TimelineId, index: usize) {
        let Some(template) = self.config.templates.get(index).cloned() else {
            return;
        };
        self.state.close_overlay();
        let mut deferred = DeferredConfirm::default();
        match self.journal.timeline_mut(id).and_then(|timeline| {
            timeline.insert_template(&template.name, &template.body, &mut deferred)
        }) {
            Ok(true) => self.state.set_mode(InputMode::Compose),
            Ok(false) => match deferred.take() {
                Some(request) => self.state.open_confirm(
                    request,
                    PendingAction::InsertTemplate {
                        timeline: id,
                        template: index,
                    },
                ),
                None => self
                    .state
                    .set_status_message(Some("Wait for the current post to land")),
            },
            Err(err) => self.report(err),
        }
    }

    fn apply_confirmed(&mut self, action: PendingAction) {
        let mut yes = Answer(true);
        match action {
            PendingAction::DeleteEntry { timeline, entry } => {
                match self
                    .journal
                    .timeline_mut(timeline)
                    .and_then(|timeline| timeline.delete_entry(entry, &mut yes))
                {
                    Ok(_) => self.state.set_status_message(Some("Entry deleted")),
                    Err(err) => self.report(err),
                }
            }
            PendingAction::DiscardDraft { timeline, entry } => {
                let result = self
                    .journal
                    .timeline_mut(timeline)
                    .and_then(|timeline| timeline.cancel_edit(entry, &mut yes));
                self.state.set_mode(InputMode::Normal);
                if let Err(err) = result {
                    self.report(err);
                }
            }
            PendingAction::InsertTemplate { timeline, template } => {
                let Some(template) = self.config.templates.get(template).cloned() else {
                    return;
                };
                match self.journal.timeline_mut(timeline).and_then(|timeline| {
                    timeline.insert_template(&template.name, &template.body, &mut yes)
                }) {
                    Ok(true) => self.state.set_mode(InputMode::Compose),
                    Ok(false) => self
                        .state
                        .set_status_message(Some("Wait for the current post to land")),
                    Err(err) => self.report(err),
                }
            }
            PendingAction::Refresh { timeline } => match self.journal.refresh(timeline, &mut yes) {
                Ok(_) => self.state.set_status_message(Some("Refreshing…")),
                Err(err) => self.report(err),
            },
            PendingAction::RemoveTimeline { timeline } => {
                match self.journal.remove_timeline(timeline, &mut yes) {
                    Ok(_) => {
                        self.state.clamp_focus(self.journal.len());
                        self.state.set_mode(InputMode::Normal);
                        self.state.set_status_message(Some("Timeline removed"));
                    }
                    Err(err) => self.report(err),
                }
            }
        }
    }

    fn attempt(&mut self, operation: impl FnOnce(&mut Journal) -> Result<(), LifecycleError>) {
        if let Err(err) = operation(&mut self.journal) {
            self.report(err);
        }
    }

    fn report(&mut self, err: LifecycleError) {
        tracing::debug!(%err, "operation refused");
        self.state.set_status_message(Some(err.to_string()));
    }

    fn focused_id(&self) -> Option<TimelineId> {
        self.state.focused(&self.journal.timeline_ids())
    }
}

fn is_plain(key: &KeyEvent) -> bool {
    !key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

fn is_quit_chord(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn map_normal_key(key: &KeyEvent) -> Option<Action> {
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    let action = match key.code {
        KeyCode::Char('r') if control => Action::Refresh,
        _ if !is_plain(key) => return None,
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Tab => Action::NextTimeline,
        KeyCode::BackTab => Action::PreviousTimeline,
        KeyCode::Char('j') | KeyCode::Down => Action::SelectNext,
        KeyCode::Char('k') | KeyCode::Up => Action::SelectPrevious,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Char('i') => Action::Compose,
        KeyCode::Char('e') | KeyCode::Enter => Action::EditEntry,
        KeyCode::Char('d') => Action::DeleteEntry,
        KeyCode::Char('h') => Action::ToggleHighlight,
        KeyCode::Char('/') => Action::StartSearch,
        KeyCode::Esc => Action::ClearSearch,
        KeyCode::Char('t') => Action::ToggleDisplay(DisplayFlags::TIMESTAMPS),
        KeyCode::Char('E') => Action::ToggleDisplay(DisplayFlags::EDIT_CONTROLS),
        KeyCode::Char('H') => Action::ToggleDisplay(DisplayFlags::HABITS),
        KeyCode::Char('O') => Action::ToggleDisplay(DisplayFlags::TODOS),
        KeyCode::Char('r') => Action::RenameTimeline,
        KeyCode::Char('p') => Action::ToggleAutoScroll,
        KeyCode::Char('b') => Action::OpenPicker(PickerKind::Quick(QuickKind::Habit)),
        KeyCode::Char('o') => Action::OpenPicker(PickerKind::Quick(QuickKind::Todo)),
        KeyCode::Char('m') => Action::OpenPicker(PickerKind::Template),
        KeyCode::Char('N') => Action::NewTimeline,
        KeyCode::Char('X') => Action::RemoveTimeline,
        _ => return None,
    };
    Some(action)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::ConfirmRequest;
    use assert_matches::assert_matches;

    const LOAD: Duration = Duration::from_millis(1000);
    const WRITE: Duration = Duration::from_millis(500);

    fn booted_app() -> App {
        let config = AppConfig {
            timeline_count: 2,
            ..AppConfig::default()
        };
        let mut app = App::new(Arc::new(config));
        app.on_tick(LOAD);
        app.on_tick(LOAD);
        assert!(!app.journal().is_booting());
        app
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn focused(app: &App) -> &crate::timeline::Timeline {
        let ids = app.journal().timeline_ids();
        let id = app.state().focused(&ids).expect("focused timeline");
        app.journal().timeline(id).expect("timeline")
    }

    #[test]
    fn keys_are_ignored_while_booting_except_quit() {
        let mut app = App::new(Arc::new(AppConfig::default()));
        press(&mut app, KeyCode::Char('i'));
        assert_eq!(app.state().mode, InputMode::Normal);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit());
    }

    #[test]
    fn compose_posts_after_write_latency() {
        let mut app = booted_app();
        press(&mut app, KeyCode::Char('i'));
        type_text(&mut app, "Hello there");
        press(&mut app, KeyCode::Enter);
        assert_eq!(focused(&app).live().len(), 20);
        app.on_tick(WRITE);
        let timeline = focused(&app);
        assert_eq!(timeline.live().len(), 21);
        assert_eq!(
            timeline.live().last().map(|entry| entry.content.as_str()),
            Some("Hello there")
        );
        assert!(timeline.compose().is_empty());
    }

    #[test]
    fn delete_waits_for_confirmation() {
        let mut app = booted_app();
        let target = focused(&app).selected().expect("selection");
        press(&mut app, KeyCode::Char('d'));
        assert_matches!(
            app.state().overlay(),
            Some(OverlayState::Confirm(confirm))
                if matches!(confirm.request, ConfirmRequest::DeleteEntry { .. })
        );
        press(&mut app, KeyCode::Char('n'));
        assert!(focused(&app).entry(target).is_some());

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(focused(&app).entry(target).is_none());
        assert_eq!(focused(&app).live().len(), 19);
    }

    #[test]
    fn dirty_edit_escape_asks_before_discarding() {
        let mut app = booted_app();
        let target = focused(&app).selected().expect("selection");
        let original = focused(&app).entry(target).map(|entry| entry.content.clone());
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.state().mode, InputMode::EditEntry(target));
        type_text(&mut app, "!!");
        press(&mut app, KeyCode::Esc);
        assert_matches!(app.state().overlay(), Some(OverlayState::Confirm(_)));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state().mode, InputMode::Normal);
        let entry = focused(&app).entry(target).expect("entry");
        assert_eq!(Some(entry.content.clone()), original);
        assert!(entry.state.is_viewing());
    }

    #[test]
    fn edit_saves_through_store() {
        let mut app = booted_app();
        let target = focused(&app).selected().expect("selection");
        press(&mut app, KeyCode::Char('e'));
        type_text(&mut app, " (revised)");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state().mode, InputMode::Normal);
        app.on_tick(WRITE);
        let entry = focused(&app).entry(target).expect("entry");
        assert!(entry.content.ends_with("(revised)"));
        assert_eq!(app.state().status_message.as_deref(), Some("Entry saved"));
    }

    #[test]
    fn search_filter_blocks_mutations_until_cleared() {
        let mut app = booted_app();
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "entry");
        press(&mut app, KeyCode::Enter);
        assert!(focused(&app).is_searching());
        assert!(!focused(&app).is_filtered());
        app.on_tick(LOAD);
        assert!(focused(&app).is_filtered());
        assert_eq!(
            app.state().status_message.as_deref(),
            Some("20 match(es) for \"entry\"; Esc clears")
        );

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(
            app.state().status_message.as_deref(),
            Some("clear the search filter first")
        );
        press(&mut app, KeyCode::Esc);
        assert!(!focused(&app).is_filtered());
    }

    #[test]
    fn refresh_after_failed_save_asks_before_dropping_draft() {
        let mut app = booted_app();
        let target = focused(&app).selected().expect("selection");
        app.journal.store_mut().fail_next();
        press(&mut app, KeyCode::Char('e'));
        type_text(&mut app, "!!");
        press(&mut app, KeyCode::Enter);
        app.on_tick(WRITE);
        assert_eq!(app.state().mode, InputMode::Normal);
        assert!(focused(&app).entry(target).map(|e| e.state.is_dirty()).unwrap_or(false));

        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        app.handle_key(ctrl_r);
        assert_matches!(
            app.state().overlay(),
            Some(OverlayState::Confirm(confirm))
                if confirm.request == ConfirmRequest::DiscardDrafts { count: 1 }
        );
        press(&mut app, KeyCode::Char('n'));
        assert!(!focused(&app).is_loading());
        assert!(focused(&app).entry(target).is_some());

        app.handle_key(ctrl_r);
        press(&mut app, KeyCode::Char('y'));
        assert!(focused(&app).is_loading());
        app.on_tick(LOAD);
        assert!(focused(&app).entry(target).is_none());
        assert_eq!(focused(&app).live().len(), 20);
    }

    #[test]
    fn new_timeline_prompt_mounts_and_focuses() {
        let mut app = booted_app();
        press(&mut app, KeyCode::Char('N'));
        type_text(&mut app, "Garden");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.journal().len(), 3);
        assert_eq!(focused(&app).title(), "Garden");
        assert!(focused(&app).is_loading());
        app.on_tick(LOAD);
        assert_eq!(focused(&app).live().len(), 20);
    }

    #[test]
    fn removing_timeline_requires_confirmation() {
        let mut app = booted_app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('X'));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.journal().len(), 2);
        press(&mut app, KeyCode::Char('X'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.journal().len(), 1);
        assert_eq!(app.state().focus, 0);
    }

    #[test]
    fn habit_picker_logs_entry_immediately() {
        let mut app = booted_app();
        press(&mut app, KeyCode::Char('b'));
        press(&mut app, KeyCode::Enter);
        let timeline = focused(&app);
        assert_eq!(timeline.live().len(), 21);
        assert_eq!(
            timeline.live().last().map(|entry| entry.content.as_str()),
            Some("Read book")
        );
        assert_eq!(timeline.quick(QuickKind::Habit).len(), 3);
    }

    #[test]
    fn template_over_draft_needs_confirmation() {
        let mut app = booted_app();
        press(&mut app, KeyCode::Char('i'));
        type_text(&mut app, "draft");
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Enter);
        assert_matches!(app.state().overlay(), Some(OverlayState::Confirm(_)));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.state().mode, InputMode::Compose);
        assert!(focused(&app).compose().text().starts_with("Went well:"));
    }
}
