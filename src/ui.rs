use std::cell::Cell;
use std::collections::HashSet;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction as LayoutDirection, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use tracing::{debug, info};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::comments::{self, CommentRow, CommentSort};
use crate::gesture::{self, PullToRefresh};
use crate::markup;
use crate::model::Post;
use crate::navigation::{Direction, NavOutcome};
use crate::scroll::MountAction;
use crate::session::{BrowseSession, SessionEvent};
use crate::store::{CommentState, PostLookup, StoreEvent};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const COMMENT_DEPTH_COLORS: [Color; 6] = [
    Color::Rgb(250, 179, 135),
    Color::Rgb(166, 227, 161),
    Color::Rgb(203, 166, 247),
    Color::Rgb(245, 194, 231),
    Color::Rgb(137, 220, 235),
    Color::Rgb(249, 226, 175),
];
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TICK_RATE: Duration = Duration::from_millis(120);
const PREVIEW_CHARS: usize = 120;

fn comment_depth_color(depth: usize) -> Color {
    COMMENT_DEPTH_COLORS[depth % COMMENT_DEPTH_COLORS.len()]
}

pub struct Options {
    pub session: BrowseSession,
    pub comment_sort: CommentSort,
    pub open_item: Option<String>,
    pub status_message: String,
}

enum Screen {
    List,
    Detail(DetailState),
}

struct DetailState {
    id: String,
    selected: usize,
    offset: Cell<usize>,
    fit: Cell<usize>,
    collapsed: HashSet<String>,
}

impl DetailState {
    fn new(id: String) -> Self {
        Self {
            id,
            selected: 0,
            offset: Cell::new(0),
            fit: Cell::new(1),
            collapsed: HashSet::new(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search { buffer: String },
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= TICK_RATE {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Model {
    session: BrowseSession,
    screen: Screen,
    input: InputMode,
    comment_sort: CommentSort,
    selected_post: usize,
    list_offset: Cell<usize>,
    list_fit: Cell<usize>,
    screen_width: Cell<u16>,
    status_message: String,
    spinner: Spinner,
    pull: PullToRefresh,
    swipe_origin: Option<u16>,
    needs_redraw: bool,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let mut model = Self {
            session: options.session,
            screen: Screen::List,
            input: InputMode::Normal,
            comment_sort: options.comment_sort,
            selected_post: 0,
            list_offset: Cell::new(0),
            list_fit: Cell::new(1),
            screen_width: Cell::new(0),
            status_message: options.status_message,
            spinner: Spinner::new(),
            pull: PullToRefresh::default(),
            swipe_origin: None,
            needs_redraw: true,
        };

        match options.open_item {
            Some(id) => {
                model.session.open_direct(&id);
                model.screen = Screen::Detail(DetailState::new(id));
            }
            None => {
                model.session.mount_list();
            }
        }
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            self.sync_session();

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
                self.after_paint();
            }

            let timeout = TICK_RATE
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key.code) {
                            break;
                        }
                        self.mark_dirty();
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= TICK_RATE {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.session.store().is_loading() || self.session.navigator().is_extending()
    }

    fn sync_session(&mut self) {
        let events = self.session.update(Instant::now());
        if !events.is_empty() {
            self.handle_session_events(events);
            self.mark_dirty();
        }
        if matches!(self.screen, Screen::List)
            && gesture::near_bottom(
                self.list_offset.get(),
                self.list_fit.get(),
                self.session.store().posts().len(),
            )
            && self.session.store_mut().load_more().is_some()
        {
            self.mark_dirty();
        }
    }

    fn after_paint(&mut self) {
        if let Some(offset) = self.session.after_paint() {
            let len = self.session.store().posts().len();
            self.selected_post = (offset as usize).min(len.saturating_sub(1));
            self.list_offset
                .set(self.selected_post.saturating_sub(self.list_fit.get() / 2));
            debug!(offset, "list scroll restored");
            self.mark_dirty();
        }
        if self.session.scroll().is_restoring() {
            self.mark_dirty();
        }
    }

    fn handle_session_events(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match event {
                SessionEvent::Store(StoreEvent::PageLoaded { page, added, .. }) => {
                    let len = self.session.store().posts().len();
                    self.selected_post = self.selected_post.min(len.saturating_sub(1));
                    if page == 0 {
                        self.status_message = format!("Loaded {len} posts.");
                    } else if added > 0 {
                        self.status_message = format!("Loaded {added} more posts.");
                    }
                }
                SessionEvent::Store(StoreEvent::PageFailed { .. }) => {
                    if let Some(err) = self.session.store().error() {
                        self.status_message = err.to_string();
                    }
                }
                SessionEvent::Store(_) => {}
                SessionEvent::Navigation(outcome) => self.apply_navigation(outcome),
            }
        }
    }

    fn apply_navigation(&mut self, outcome: NavOutcome) {
        match outcome {
            NavOutcome::Resolved(id) => {
                self.pull.cancel();
                if let Some(index) = self.session.store().index_of(&id) {
                    self.selected_post = index;
                }
                self.screen = Screen::Detail(DetailState::new(id));
                self.status_message.clear();
            }
            NavOutcome::Extending => {
                self.status_message = "Loading more posts…".to_string();
            }
            NavOutcome::Exhausted => {
                self.status_message = "No more posts in that direction.".to_string();
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> bool {
        if let InputMode::Search { .. } = self.input {
            self.handle_search_key(code);
            return false;
        }
        match self.screen {
            Screen::List => self.handle_list_key(code),
            Screen::Detail(_) => {
                self.handle_detail_key(code);
                false
            }
        }
    }

    fn handle_search_key(&mut self, code: KeyCode) {
        let InputMode::Search { buffer } = &mut self.input else {
            return;
        };
        match code {
            KeyCode::Enter | KeyCode::Esc => {
                self.input = InputMode::Normal;
                return;
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(ch) => buffer.push(ch),
            _ => return,
        }
        let query = buffer.clone();
        if self.session.store_mut().set_query(&query, Instant::now()) {
            self.reset_list_position();
        }
    }

    fn handle_list_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(self.list_fit.get().max(1) as isize),
            KeyCode::PageUp => self.move_selection(-(self.list_fit.get().max(1) as isize)),
            KeyCode::Char('g') | KeyCode::Home => self.move_selection(isize::MIN / 2),
            KeyCode::Char('G') | KeyCode::End => self.move_selection(isize::MAX / 2),
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => self.open_selected(),
            KeyCode::Char('/') => {
                self.input = InputMode::Search {
                    buffer: self.session.store().query().to_string(),
                };
            }
            KeyCode::Char('t') => {
                let next = self.session.store().time_range().next();
                if self.session.store_mut().set_time_range(next, Instant::now()) {
                    self.status_message = format!("Showing {}.", next.display_name());
                    self.reset_list_position();
                }
            }
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('o') => {
                if let Some(post) = self.session.store().posts().get(self.selected_post) {
                    let url = post.link();
                    self.open_in_browser(&url);
                }
            }
            KeyCode::Char('x') => self.session.store_mut().dismiss_error(),
            _ => {}
        }
        false
    }

    fn handle_detail_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('h') | KeyCode::Backspace => {
                self.back_to_list()
            }
            KeyCode::Char('n') | KeyCode::Right => self.navigate(Direction::Next),
            KeyCode::Char('p') | KeyCode::Left => self.navigate(Direction::Prev),
            KeyCode::Char('j') | KeyCode::Down => self.move_comment(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_comment(-1),
            KeyCode::Char('c') | KeyCode::Char(' ') => self.toggle_collapse(),
            KeyCode::Char('s') => {
                self.comment_sort = self.comment_sort.cycle();
                self.status_message =
                    format!("Comments sorted by {}.", self.comment_sort.display_name());
            }
            KeyCode::Char('o') => {
                if let Some(post) = self.detail_post() {
                    self.open_in_browser(&post.link());
                }
            }
            KeyCode::Char('O') => {
                if let Some(post) = self.detail_post() {
                    self.open_in_browser(&post.hn_url());
                }
            }
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.swipe_origin = Some(mouse.column);
                if matches!(self.screen, Screen::List) {
                    self.pull.press(mouse.row);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let origin = self.swipe_origin.take();
                match self.screen {
                    Screen::Detail(_) => {
                        let swipe = origin.and_then(|start| {
                            gesture::classify_swipe(
                                start,
                                mouse.column,
                                self.screen_width.get(),
                                gesture::MIN_SWIPE_COLUMNS,
                            )
                        });
                        if let Some(direction) = swipe {
                            self.navigate(direction);
                        }
                    }
                    Screen::List => {
                        let at_top = self.list_offset.get() == 0;
                        let loading = self.session.store().is_loading();
                        if self.pull.release(mouse.row, at_top, loading) {
                            self.refresh();
                        }
                    }
                }
            }
            MouseEventKind::Drag(MouseButton::Left) if self.pull.is_tracking() => {}
            MouseEventKind::ScrollDown => match self.screen {
                Screen::List => self.move_selection(1),
                Screen::Detail(_) => self.move_comment(1),
            },
            MouseEventKind::ScrollUp => match self.screen {
                Screen::List => self.move_selection(-1),
                Screen::Detail(_) => self.move_comment(-1),
            },
            _ => return,
        }
        self.mark_dirty();
    }

    fn refresh(&mut self) {
        if self.session.store_mut().refresh().request().is_some() {
            self.status_message = "Refreshing…".to_string();
            self.reset_list_position();
        }
    }

    fn reset_list_position(&mut self) {
        self.selected_post = 0;
        self.list_offset.set(0);
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.session.store().posts().len();
        if len == 0 {
            return;
        }
        let target = (self.selected_post as isize).saturating_add(delta);
        self.selected_post = target.clamp(0, len as isize - 1) as usize;
        let fit = self.list_fit.get().max(1);
        let offset = self.list_offset.get();
        if self.selected_post < offset {
            self.list_offset.set(self.selected_post);
        } else if self.selected_post >= offset + fit {
            self.list_offset.set(self.selected_post + 1 - fit);
        }
    }

    fn open_selected(&mut self) {
        let Some(post) = self.session.store().posts().get(self.selected_post) else {
            return;
        };
        let id = post.id.clone();
        info!(id = %id, "opening post");
        self.pull.cancel();
        self.session.open_post(&id, self.selected_post as u32);
        self.screen = Screen::Detail(DetailState::new(id));
        self.status_message.clear();
    }

    fn back_to_list(&mut self) {
        self.screen = Screen::List;
        self.reset_list_position();
        match self.session.return_to_list() {
            MountAction::Reuse => self.status_message.clear(),
            MountAction::Fetch => self.status_message = "Loading posts…".to_string(),
        }
    }

    fn navigate(&mut self, direction: Direction) {
        let Screen::Detail(detail) = &self.screen else {
            return;
        };
        let current = detail.id.clone();
        let outcome = self.session.navigate(&current, direction);
        self.apply_navigation(outcome);
    }

    fn detail_post(&self) -> Option<Post> {
        let Screen::Detail(detail) = &self.screen else {
            return None;
        };
        let store = self.session.store();
        if let Some(post) = store.post(&detail.id) {
            return Some(post.clone());
        }
        match store.post_lookup(&detail.id) {
            Some(PostLookup::Found(post)) => Some(post.clone()),
            _ => None,
        }
    }

    fn comment_row_ids(&self) -> Vec<String> {
        let Screen::Detail(detail) = &self.screen else {
            return Vec::new();
        };
        match self.session.store().comments_for(&detail.id) {
            CommentState::Loaded(list) => {
                comments::flatten(list, self.comment_sort, &detail.collapsed)
                    .into_iter()
                    .map(|row| row.comment.id.clone())
                    .collect()
            }
            CommentState::NotLoaded => Vec::new(),
        }
    }

    fn move_comment(&mut self, delta: isize) {
        let total = self.comment_row_ids().len();
        let Screen::Detail(detail) = &mut self.screen else {
            return;
        };
        if total == 0 {
            return;
        }
        let target = (detail.selected as isize).saturating_add(delta);
        detail.selected = target.clamp(0, total as isize - 1) as usize;
        let fit = detail.fit.get().max(1);
        let offset = detail.offset.get();
        if detail.selected < offset {
            detail.offset.set(detail.selected);
        } else if detail.selected >= offset + fit {
            detail.offset.set(detail.selected + 1 - fit);
        }
    }

    fn toggle_collapse(&mut self) {
        let rows = self.comment_row_ids();
        let Screen::Detail(detail) = &mut self.screen else {
            return;
        };
        let Some(id) = rows.get(detail.selected) else {
            return;
        };
        if !detail.collapsed.remove(id) {
            detail.collapsed.insert(id.clone());
        }
    }

    fn open_in_browser(&mut self, url: &str) {
        match webbrowser::open(url) {
            Ok(_) => self.status_message = format!("Opened {url} in your browser."),
            Err(err) => self.status_message = format!("Failed to open {url}: {err}"),
        }
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let full = frame.size();
        self.screen_width.set(full.width);
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(LayoutDirection::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status = Paragraph::new(self.status_text()).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status, layout[0]);

        match &self.screen {
            Screen::List => self.draw_list(frame, layout[1]),
            Screen::Detail(detail) => self.draw_detail(frame, layout[1], detail),
        }

        self.draw_footer(frame, layout[2]);
    }

    fn status_text(&self) -> String {
        let store = self.session.store();
        let mut parts = vec![format!("HN · {}", store.time_range().display_name())];
        match &self.input {
            InputMode::Search { buffer } => parts.push(format!("search: {buffer}▏")),
            InputMode::Normal if !store.query().is_empty() => {
                parts.push(format!("\"{}\"", store.query()))
            }
            InputMode::Normal => {}
        }
        if !self.status_message.is_empty() {
            parts.push(self.status_message.clone());
        }
        let text = parts.join(" · ");
        if self.is_loading() {
            format!("{} {}", self.spinner.frame(), text)
        } else {
            text
        }
    }

    fn draw_footer(&self, frame: &mut Frame<'_>, area: Rect) {
        if let Some(err) = self.session.store().error() {
            let line = Paragraph::new(format!("{err} · x to dismiss"))
                .style(Style::default().fg(COLOR_ERROR).bg(COLOR_PANEL_BG));
            frame.render_widget(line, area);
            return;
        }
        let hints = match (&self.screen, &self.input) {
            (_, InputMode::Search { .. }) => "type to search · Enter/Esc: done",
            (Screen::List, _) if self.pull.is_tracking() && self.list_offset.get() == 0 => {
                "pull down and release to refresh"
            }
            (Screen::List, _) => {
                "j/k: move · Enter: open · /: search · t: time range · r: refresh · o: open link · q: quit"
            }
            (Screen::Detail(_), _) => {
                "Esc: back · n/p: next/prev post · j/k: comments · c: collapse · s: sort · o/O: open"
            }
        };
        let footer = Paragraph::new(hints)
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center);
        frame.render_widget(footer, area);
    }

    fn draw_list(&self, frame: &mut Frame<'_>, area: Rect) {
        let store = self.session.store();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
            .title(format!(" {} ", store.time_range().display_name()))
            .style(Style::default().bg(COLOR_PANEL_BG));
        let inner = block.inner(area);
        let width = inner.width as usize;
        let posts = store.posts();

        if posts.is_empty() {
            let message = if store.is_loading() {
                format!("{} Loading posts…", self.spinner.frame())
            } else if store.error().is_some() {
                "Could not load posts. Press r to retry.".to_string()
            } else {
                "No posts match this search.".to_string()
            };
            let paragraph = Paragraph::new(message)
                .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        let now = Utc::now();
        let available = inner.height as usize;
        let offset = self.list_offset.get().min(posts.len().saturating_sub(1));
        let mut used = 0usize;
        let mut fit = 0usize;
        let mut items = Vec::new();
        for (index, post) in posts.iter().enumerate().skip(offset) {
            let selected = index == self.selected_post;
            let preview = match store.comments_for(&post.id) {
                CommentState::Loaded(list) => comments::top_comment(list).map(|top| {
                    let body = markup::to_plain(&top.text).text.replace('\n', " ");
                    format!("{}: {}", display_author(&top.author), truncate(&body, PREVIEW_CHARS))
                }),
                CommentState::NotLoaded => None,
            };
            let mut lines = post_lines(index, post, preview.as_deref(), width, selected, now);
            if used > 0 && used + lines.len() > available {
                break;
            }
            used += lines.len();
            fit += 1;
            pad_lines_to_width(&mut lines, inner.width);
            items.push(ListItem::new(lines));
        }

        if store.is_loading() && offset + fit >= posts.len() && used < available {
            items.push(ListItem::new(Line::from(Span::styled(
                format!("{} Loading more…", self.spinner.frame()),
                Style::default().fg(COLOR_ACCENT),
            ))));
        }
        self.list_fit.set(fit.max(1));

        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_detail(&self, frame: &mut Frame<'_>, area: Rect, detail: &DetailState) {
        let store = self.session.store();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
            .style(Style::default().bg(COLOR_PANEL_BG));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let post = match self.detail_post() {
            Some(post) => post,
            None => {
                let message = match store.post_lookup(&detail.id) {
                    Some(PostLookup::NotFound) => {
                        format!("Post {} not found. Press Esc to go back.", detail.id)
                    }
                    _ => format!("{} Loading post {}…", self.spinner.frame(), detail.id),
                };
                let paragraph =
                    Paragraph::new(message).style(Style::default().fg(COLOR_TEXT_SECONDARY));
                frame.render_widget(paragraph, inner);
                return;
            }
        };

        let width = inner.width as usize;
        let mut header = self.detail_header(&post, width);
        let header_height = (header.len() as u16).min(inner.height / 2).max(1);
        pad_lines_to_width(&mut header, inner.width);

        let chunks = Layout::default()
            .direction(LayoutDirection::Vertical)
            .constraints([Constraint::Length(header_height), Constraint::Min(0)])
            .split(inner);
        frame.render_widget(Paragraph::new(Text::from(header)), chunks[0]);

        let items = match store.comments_for(&detail.id) {
            CommentState::NotLoaded => vec![ListItem::new(Line::from(Span::styled(
                format!("{} Loading comments…", self.spinner.frame()),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )))],
            CommentState::Loaded([]) => vec![ListItem::new(Line::from(Span::styled(
                "No comments yet.",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )))],
            CommentState::Loaded(list) => {
                let rows = comments::flatten(list, self.comment_sort, &detail.collapsed);
                self.comment_items(&rows, detail, chunks[1])
            }
        };
        frame.render_widget(List::new(items), chunks[1]);
    }

    fn detail_header(&self, post: &Post, width: usize) -> Vec<Line<'static>> {
        let now = Utc::now();
        let title_style = Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD);
        let meta_style = Style::default().fg(COLOR_TEXT_SECONDARY);
        let mut lines = wrap_plain(&post.title, width, title_style);
        lines.push(Line::from(Span::styled(
            format!(
                "▲ {} · {} · {} · {} comments",
                post.points,
                display_author(&post.author),
                age_label(post.created_at, now),
                post.num_comments
            ),
            meta_style,
        )));
        lines.push(Line::from(Span::styled(
            post.link(),
            Style::default().fg(COLOR_ACCENT),
        )));

        if let Some(text) = post.text.as_deref() {
            let rendered = markup::to_plain(text);
            if !rendered.text.is_empty() {
                lines.push(Line::default());
                for raw in rendered.text.lines() {
                    lines.extend(wrap_plain(raw, width, Style::default().fg(COLOR_TEXT_PRIMARY)));
                }
            }
            for (index, link) in rendered.links.iter().enumerate() {
                lines.extend(wrap_plain(
                    &format!("[{}] {link}", index + 1),
                    width,
                    Style::default().fg(COLOR_ACCENT),
                ));
            }
        }

        let mut nav = vec![format!("sorted by {}", self.comment_sort.display_name())];
        if self.session.has_prev(&post.id) {
            nav.push("◀ p".to_string());
        }
        if self.session.has_next(&post.id) {
            nav.push("n ▶".to_string());
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            nav.join(" · "),
            Style::default().fg(COLOR_SUCCESS),
        )));
        lines
    }

    fn comment_items(
        &self,
        rows: &[CommentRow<'_>],
        detail: &DetailState,
        area: Rect,
    ) -> Vec<ListItem<'static>> {
        let now = Utc::now();
        let width = area.width as usize;
        let available = area.height as usize;
        let offset = detail.offset.get().min(rows.len().saturating_sub(1));
        let mut used = 0usize;
        let mut fit = 0usize;
        let mut items = Vec::new();

        for (index, row) in rows.iter().enumerate().skip(offset) {
            let selected = index == detail.selected;
            let background = if selected {
                COLOR_PANEL_SELECTED_BG
            } else {
                COLOR_PANEL_BG
            };
            let meta_style = Style::default()
                .fg(comment_depth_color(row.depth))
                .bg(background)
                .add_modifier(Modifier::BOLD);
            let body_style = Style::default().fg(COLOR_TEXT_PRIMARY).bg(background);
            let mut lines = comment_lines(row, width, meta_style, body_style, now);
            if used > 0 && used + lines.len() > available {
                break;
            }
            used += lines.len() + 1;
            fit += 1;
            lines.push(Line::from(Span::styled(String::new(), body_style)));
            pad_lines_to_width(&mut lines, area.width);
            items.push(ListItem::new(lines));
        }
        detail.fit.set(fit.max(1));
        items
    }
}

fn display_author(author: &str) -> &str {
    if author.trim().is_empty() {
        "[deleted]"
    } else {
        author
    }
}

fn post_lines(
    index: usize,
    post: &Post,
    preview: Option<&str>,
    width: usize,
    selected: bool,
    now: DateTime<Utc>,
) -> Vec<Line<'static>> {
    let background = if selected {
        COLOR_PANEL_SELECTED_BG
    } else {
        COLOR_PANEL_BG
    };
    let title_style = Style::default()
        .fg(COLOR_TEXT_PRIMARY)
        .bg(background)
        .add_modifier(Modifier::BOLD);
    let meta_style = Style::default().fg(COLOR_TEXT_SECONDARY).bg(background);

    let number = format!("{:>3}. ", index + 1);
    let indent = " ".repeat(number.len());
    let mut title = vec![Span::styled(number, title_style)];
    title.push(Span::styled(
        truncate(&post.title, width.saturating_sub(indent.len() + 20)),
        title_style,
    ));
    if let Some(domain) = post.domain() {
        title.push(Span::styled(format!(" ({domain})"), meta_style));
    }

    let mut lines = vec![
        Line::from(title),
        Line::from(Span::styled(
            format!(
                "{indent}▲ {} · {} · {} · {} comments",
                post.points,
                display_author(&post.author),
                age_label(post.created_at, now),
                post.num_comments
            ),
            meta_style,
        )),
    ];
    if let Some(preview) = preview {
        let preview_style = Style::default()
            .fg(COLOR_ACCENT)
            .bg(background)
            .add_modifier(Modifier::ITALIC);
        lines.push(Line::from(Span::styled(
            format!("{indent}↳ {}", truncate(preview, width.saturating_sub(indent.len() + 2))),
            preview_style,
        )));
    }
    lines.push(Line::from(Span::styled(String::new(), meta_style)));
    lines
}

fn comment_lines(
    row: &CommentRow<'_>,
    width: usize,
    meta_style: Style,
    body_style: Style,
    now: DateTime<Utc>,
) -> Vec<Line<'static>> {
    let indent = "  ".repeat(row.depth);
    let indicator = if row.collapsed { "[+]" } else { "[-]" };
    let comment = row.comment;

    let mut header = format!(
        "{indicator} {} · {}",
        display_author(&comment.author),
        age_label(comment.created_at, now)
    );
    if row.replies > 0 {
        let suffix = if row.replies == 1 { "reply" } else { "replies" };
        header.push_str(&format!(" · {} {suffix}", row.replies));
    }
    let rest = format!("{indent}    ");
    let mut lines = wrap_with_prefixes(&header, width, &indent, &rest, meta_style);
    if row.collapsed {
        return lines;
    }

    let body = if comment.is_deleted() {
        markup::Rendered {
            text: "[deleted]".to_string(),
            links: Vec::new(),
        }
    } else {
        markup::to_plain(&comment.text)
    };
    for raw in body.text.lines() {
        if raw.trim().is_empty() {
            lines.push(Line::from(Span::styled(String::new(), body_style)));
            continue;
        }
        lines.extend(wrap_with_prefixes(raw.trim(), width, &rest, &rest, body_style));
    }
    let link_style = body_style.fg(COLOR_ACCENT);
    for link in &body.links {
        lines.extend(wrap_with_prefixes(&format!("↗ {link}"), width, &rest, &rest, link_style));
    }
    lines
}

/// Short relative age such as `5m`, `3h` or `2y`.
fn age_label(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        86_400..=2_591_999 => format!("{}d ago", secs / 86_400),
        2_592_000..=31_535_999 => format!("{}mo ago", secs / 2_592_000),
        _ => format!("{}y ago", secs / 31_536_000),
    }
}

fn truncate(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn wrap_with_prefixes(
    text: &str,
    width: usize,
    first_prefix: &str,
    rest_prefix: &str,
    style: Style,
) -> Vec<Line<'static>> {
    if width == 0 || text.trim().is_empty() {
        return vec![Line::from(Span::styled(format!("{first_prefix}{text}"), style))];
    }
    let min_width = first_prefix
        .chars()
        .count()
        .max(rest_prefix.chars().count())
        .saturating_add(1);
    let options = WrapOptions::new(width.max(min_width))
        .break_words(true)
        .initial_indent(first_prefix)
        .subsequent_indent(rest_prefix);

    wrap(text, options)
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefixes(text, width, "", "", style)
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    for line in lines {
        let current: usize = line
            .spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum();
        if current >= width {
            continue;
        }
        let style = line.spans.last().map(|span| span.style).unwrap_or_default();
        line.spans.push(Span::styled(" ".repeat(width - current), style));
    }
}
