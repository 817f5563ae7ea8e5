use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use tracing::{debug, warn};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::analysis::{PostId, Sentiment, TreeNode, TreeResult};
use crate::data::TreeSource;
use crate::embed::{self, EmbedState, EMBED_FAILED_PLACEHOLDER};
use crate::example::ExampleKey;
use crate::fetch::{FetchKey, FetchState};
use crate::inspect::{format_strength, DetailField};
use crate::page::{self, PageController, PageView};
use crate::tree::{EdgeClass, NodeColor, TreeRow};
use crate::validate::{ValidationError, EXAMPLE_URL};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const COLOR_NEUTRAL: Color = Color::Rgb(147, 153, 178);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const INPUT_PLACEHOLDER: &str = "Insert your Tweet URL here...";
const HOME_BLURB: &str = "Input a Tweet URL above to see how other users are interacting with a Tweet both directly and indirectly! Are people supporting the tweet? Are they attacking it? What is the sentiment towards the tweet? Who is winning the argument?";
const DETAIL_SCROLL_STEP: u16 = 3;

fn node_color(color: NodeColor) -> Color {
    match color {
        NodeColor::Green => COLOR_SUCCESS,
        NodeColor::Red => COLOR_ERROR,
        NodeColor::Grey => COLOR_NEUTRAL,
    }
}

fn edge_color(edge: EdgeClass) -> Color {
    match edge {
        EdgeClass::Attack => COLOR_ERROR,
        EdgeClass::Support => COLOR_SUCCESS,
        EdgeClass::Neutral => COLOR_NEUTRAL,
    }
}

fn edge_marker(edge: EdgeClass) -> &'static str {
    match edge {
        EdgeClass::Attack => "✗ ",
        EdgeClass::Support => "✓ ",
        EdgeClass::Neutral => "· ",
    }
}

fn sentiment_color(sentiment: Sentiment) -> Color {
    node_color(crate::tree::color_for(sentiment))
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
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
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

#[derive(Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Analysis,
}

/// The URL input on the home screen. Errors are computed on every edit but
/// only shown once the user has typed something.
#[derive(Default)]
struct HomeForm {
    input: String,
    error: Option<ValidationError>,
    touched: bool,
}

impl HomeForm {
    fn revalidate(&mut self) {
        self.error = page::submit(&self.input).err();
    }

    fn insert_char(&mut self, ch: char) {
        self.input.push(ch);
        self.touched = true;
        self.revalidate();
    }

    fn backspace(&mut self) {
        self.input.pop();
        self.touched = true;
        self.revalidate();
    }

    fn clear(&mut self) {
        self.input.clear();
        self.error = None;
        self.touched = false;
    }

    fn visible_error(&self) -> Option<ValidationError> {
        if self.touched {
            self.error
        } else {
            None
        }
    }

    fn is_valid(&self) -> bool {
        !self.input.trim().is_empty() && self.error.is_none()
    }
}

pub struct Options {
    pub source: Arc<dyn TreeSource>,
    pub embeds: embed::Loader,
    pub route: Option<String>,
    pub status_message: String,
}

pub struct Model {
    screen: Screen,
    home: HomeForm,
    page: PageController,
    embeds: embed::Loader,
    tree_state: ListState,
    selected_row: usize,
    detail_scroll: u16,
    status_message: String,
    spinner: Spinner,
    fetch_started: Option<Instant>,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let mut model = Self {
            screen: Screen::Home,
            home: HomeForm::default(),
            page: PageController::new(opts.source),
            embeds: opts.embeds,
            tree_state: ListState::default(),
            selected_row: 0,
            detail_scroll: 0,
            status_message: opts.status_message,
            spinner: Spinner::new(),
            fetch_started: None,
            needs_redraw: true,
        };
        if let Some(route) = opts.route.as_deref() {
            model.open_route(route);
        }
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.page.is_loading() {
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

    fn poll_async(&mut self) -> bool {
        let mut changed = self.embeds.poll();
        if self.page.poll() {
            self.on_fetch_settled();
            changed = true;
        }
        changed
    }

    fn on_fetch_settled(&mut self) {
        self.selected_row = 0;
        self.tree_state = ListState::default();
        self.detail_scroll = 0;
        let display = self.page.display_id().unwrap_or_default().to_string();
        let elapsed = self
            .fetch_started
            .take()
            .map(|started| format_elapsed(started.elapsed()))
            .unwrap_or_default();
        match self.page.state() {
            FetchState::Success(result) => {
                let posts = result.stats().posts;
                self.status_message = format!("Loaded {posts} posts for {display}{elapsed}.");
                if let Some(root) = result.root.as_ref().filter(|root| !root.id.is_synthetic()) {
                    let id = root.id.clone();
                    self.embeds.request(&id);
                }
            }
            FetchState::Error(message) => {
                self.status_message = message.clone();
            }
            FetchState::Idle | FetchState::Loading(_) => {}
        }
    }

    fn open_route(&mut self, route: &str) {
        self.screen = Screen::Analysis;
        self.page.enter(Some(route));
        self.after_enter();
    }

    fn open_key(&mut self, key: FetchKey) {
        self.screen = Screen::Analysis;
        self.page.enter_key(key);
        self.after_enter();
    }

    fn after_enter(&mut self) {
        self.selected_row = 0;
        self.tree_state = ListState::default();
        self.detail_scroll = 0;
        self.spinner.reset();
        self.fetch_started = self.page.is_loading().then(Instant::now);
        self.status_message = match self.page.state() {
            FetchState::Loading(key) => format!("Analyzing {key}…"),
            FetchState::Error(message) => message.clone(),
            _ => String::new(),
        };
        self.mark_dirty();
    }

    fn go_home(&mut self) {
        self.page.leave();
        self.fetch_started = None;
        self.home.clear();
        self.screen = Screen::Home;
        self.status_message = "Enter a post URL to analyze.".to_string();
        self.mark_dirty();
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        match self.screen {
            Screen::Home => self.handle_home_key(code),
            Screen::Analysis => {
                if self.page.inspector().is_open() {
                    self.handle_inspector_key(code)
                } else {
                    self.handle_analysis_key(code)
                }
            }
        }
    }

    fn handle_home_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Esc => return Ok(true),
            KeyCode::Char(ch) => self.home.insert_char(ch),
            KeyCode::Backspace => self.home.backspace(),
            KeyCode::Delete => self.home.clear(),
            KeyCode::F(n) => {
                if let Some(key) = ExampleKey::ALL.get(usize::from(n).saturating_sub(1)) {
                    self.open_key(FetchKey::Example(*key));
                }
            }
            KeyCode::Enter => {
                self.home.touched = true;
                match page::submit(&self.home.input) {
                    Ok(key) => {
                        debug!(key = %key, "submitting post");
                        self.open_key(key);
                    }
                    Err(err) => self.home.error = Some(err),
                }
            }
            _ => {}
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_analysis_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Backspace => self.go_home(),
            KeyCode::Char('r') => {
                if self.page.reload() {
                    self.after_enter();
                }
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(10),
            KeyCode::PageUp => self.move_selection(-10),
            KeyCode::Char('g') | KeyCode::Home => self.move_selection(i32::MIN / 2),
            KeyCode::Char('G') | KeyCode::End => self.move_selection(i32::MAX / 2),
            KeyCode::Char(' ') | KeyCode::Char('c') => self.toggle_selected(),
            KeyCode::Char('C') => {
                let focused = self.selected_row_id();
                if self.page.expand_all() {
                    self.status_message = "Expanded every thread.".to_string();
                    if let Some(id) = focused {
                        self.focus_row(&id);
                    }
                } else {
                    self.status_message = "All threads already expanded.".to_string();
                }
            }
            KeyCode::Enter => self.inspect_selected(),
            KeyCode::Char('o') => {
                if let Some(id) = self.selected_row_id() {
                    self.open_link(&id);
                }
            }
            _ => {}
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_inspector_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                self.page.close_inspector();
                self.detail_scroll = 0;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.detail_scroll = self.detail_scroll.saturating_add(DETAIL_SCROLL_STEP);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.detail_scroll = self.detail_scroll.saturating_sub(DETAIL_SCROLL_STEP);
            }
            KeyCode::Char('o') => {
                if let Some(id) = self.page.inspector().selected().cloned() {
                    self.open_link(&id);
                }
            }
            _ => {}
        }
        self.mark_dirty();
        Ok(false)
    }

    fn row_count(&mut self) -> usize {
        match self.page.view() {
            PageView::Ready { rows, .. } => rows.len(),
            _ => 0,
        }
    }

    fn selected_row_id(&mut self) -> Option<PostId> {
        let index = self.selected_row;
        match self.page.view() {
            PageView::Ready { rows, .. } => rows.get(index).map(|row| row.node.id.clone()),
            _ => None,
        }
    }

    fn focus_row(&mut self, id: &PostId) {
        let position = match self.page.view() {
            PageView::Ready { rows, .. } => rows.iter().position(|row| &row.node.id == id),
            _ => None,
        };
        if let Some(position) = position {
            self.selected_row = position;
        }
    }

    fn move_selection(&mut self, delta: i32) {
        let count = self.row_count();
        if count == 0 {
            self.selected_row = 0;
            return;
        }
        let current = self.selected_row as i64;
        let target = (current + i64::from(delta)).clamp(0, count as i64 - 1);
        self.selected_row = target as usize;
    }

    fn toggle_selected(&mut self) {
        let Some(id) = self.selected_row_id() else {
            return;
        };
        match self.page.toggle(&id) {
            Some(true) => self.status_message = "Expanded thread.".to_string(),
            Some(false) => self.status_message = "Collapsed thread.".to_string(),
            None => {}
        }
        self.focus_row(&id);
    }

    fn inspect_selected(&mut self) {
        let Some(id) = self.selected_row_id() else {
            return;
        };
        if self.page.select(&id) {
            self.detail_scroll = 0;
            if !id.is_synthetic() {
                self.embeds.request(&id);
            }
        }
    }

    fn open_link(&mut self, id: &PostId) {
        if id.is_synthetic() {
            self.status_message = "This post has no public link.".to_string();
            return;
        }
        let url = id.permalink();
        match webbrowser::open(&url) {
            Ok(_) => self.status_message = format!("Opened {url}"),
            Err(err) => {
                warn!(%url, error = %err, "failed to open browser");
                self.status_message = format!("Could not open browser: {err}");
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.page.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        match self.screen {
            Screen::Home => self.draw_home(frame, layout[1]),
            Screen::Analysis => self.draw_analysis(frame, layout[1]),
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);
    }

    fn draw_home(&self, frame: &mut Frame<'_>, area: Rect) {
        let column = centered_rect(80, 90, area);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(3),
                Constraint::Length(2),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(column);

        let title = Paragraph::new(Line::from(Span::styled(
            "TweetLyticsAI",
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(title, chunks[0]);

        let error = self.home.visible_error();
        let border = if error.is_some() {
            COLOR_ERROR
        } else {
            COLOR_BORDER_FOCUSED
        };
        let input_line = if self.home.input.is_empty() {
            Line::from(Span::styled(
                INPUT_PLACEHOLDER,
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            ))
        } else {
            Line::from(vec![
                Span::styled(
                    self.home.input.clone(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                ),
                Span::styled("▏", Style::default().fg(COLOR_ACCENT)),
            ])
        };
        let input = Paragraph::new(input_line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title("Tweet URL / Tweet Link")
                .style(Style::default().bg(COLOR_PANEL_BG)),
        );
        frame.render_widget(input, chunks[1]);

        let hint = match error {
            Some(err) => Line::from(Span::styled(
                err.to_string(),
                Style::default().fg(COLOR_ERROR),
            )),
            None if self.home.is_valid() => Line::from(Span::styled(
                "Press Enter to analyze.",
                Style::default().fg(COLOR_SUCCESS),
            )),
            None => Line::from(Span::styled(
                format!("Paste a post URL such as {EXAMPLE_URL}, then press Enter."),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )),
        };
        frame.render_widget(
            Paragraph::new(hint).wrap(Wrap { trim: true }),
            chunks[2],
        );

        let examples: Vec<Span<'static>> = ExampleKey::ALL
            .iter()
            .enumerate()
            .flat_map(|(idx, key)| {
                vec![
                    Span::styled(
                        format!(" F{} ", idx + 1),
                        Style::default()
                            .fg(COLOR_BG)
                            .bg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" {}   ", key.label()),
                        Style::default().fg(COLOR_TEXT_PRIMARY),
                    ),
                ]
            })
            .collect();
        let examples = Paragraph::new(Line::from(examples))
            .alignment(Alignment::Center)
            .block(Block::default().padding(Padding::vertical(1)));
        frame.render_widget(examples, chunks[3]);

        let width = chunks[4].width.saturating_sub(4).max(1) as usize;
        let mut lines = wrap_plain(HOME_BLURB, width, Style::default().fg(COLOR_TEXT_SECONDARY));
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Directly means someone replied to the tweet. Indirectly means someone posted an argument for or against it.",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        )));
        let blurb = Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_BORDER_IDLE))
                    .padding(Padding::horizontal(1)),
            );
        frame.render_widget(blurb, chunks[4]);
    }

    fn draw_analysis(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let spinner = self.spinner.frame();
        let selected_row = self.selected_row;
        let detail_scroll = self.detail_scroll;
        let can_retry = self.page.route().is_some();
        let display = self.page.display_id().unwrap_or_default().to_string();
        let Self {
            page,
            embeds,
            tree_state,
            ..
        } = self;

        match page.view() {
            PageView::Idle => {
                draw_message(frame, area, "Analysis", "Nothing to analyze yet.", COLOR_TEXT_SECONDARY);
            }
            PageView::Loading { key } => {
                let message = format!("{spinner} Analyzing {key}… this can take a while for large conversations.");
                draw_message(frame, area, "Loading", &message, COLOR_ACCENT);
            }
            PageView::Failed { message } => {
                let body = failure_body(message, can_retry);
                draw_message(frame, area, "Something went wrong", &body, COLOR_ERROR);
            }
            PageView::Ready {
                result,
                rows,
                selected,
                details,
            } => {
                let columns = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                    .split(area);
                let title = format!("Tweet Tree · {display}");
                draw_tree(frame, columns[0], &title, &rows, tree_state, selected_row);
                draw_metrics(frame, columns[1], result, embeds);
                if let (Some(node), Some(details)) = (selected, details) {
                    draw_inspector(frame, area, node, &details, embeds, detail_scroll);
                }
            }
        }
    }

    fn footer_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match self.screen {
            Screen::Home => {
                parts.push("Type or paste a URL, Enter analyze".to_string());
                parts.push("F1-F3 examples".to_string());
                parts.push("Del clear".to_string());
                parts.push("Esc quit".to_string());
            }
            Screen::Analysis => {
                if self.page.inspector().is_open() {
                    parts.push("Details: j/k scroll".to_string());
                    parts.push("o open in browser".to_string());
                    parts.push("Esc/Enter close".to_string());
                } else {
                    match self.page.state() {
                        FetchState::Success(_) => {
                            parts.push("Tree: j/k move, Space fold, Shift+C expand all".to_string());
                            parts.push("Enter details".to_string());
                            parts.push("o open in browser".to_string());
                            let collapsed = self.page.collapsed_count();
                            if collapsed > 0 {
                                parts.push(format!("{collapsed} folded"));
                            }
                        }
                        FetchState::Loading(_) => parts.push("Analyzing…".to_string()),
                        FetchState::Error(_) | FetchState::Idle => {}
                    }
                    if self.page.route().is_some() {
                        parts.push("r reload".to_string());
                    }
                    parts.push("Esc home".to_string());
                    parts.push("q quit".to_string());
                }
            }
        }
        parts.join(" · ")
    }
}

/// Retrying only helps when there is a route to re-enter.
fn failure_body(message: &str, can_retry: bool) -> String {
    if can_retry {
        format!("{message}\n\nPress r to retry, or Esc to try another post.")
    } else {
        format!("{message}\n\nPress Esc to try another post.")
    }
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        COLOR_BORDER_FOCUSED
    } else {
        COLOR_BORDER_IDLE
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            title,
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(COLOR_PANEL_BG))
}

fn draw_message(frame: &mut Frame<'_>, area: Rect, title: &str, body: &str, color: Color) {
    let popup = centered_rect(60, 40, area);
    let paragraph = Paragraph::new(body.to_string())
        .style(Style::default().fg(color))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(pane_block(title.to_string(), true).padding(Padding::uniform(1)));
    frame.render_widget(paragraph, popup);
}

fn row_line(row: &TreeRow<'_>, width: usize) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut used = 0usize;
    for open in &row.guides {
        let guide = if *open { "│   " } else { "    " };
        spans.push(Span::styled(guide, Style::default().fg(COLOR_BORDER_IDLE)));
        used += 4;
    }
    if let Some(edge) = row.edge {
        let branch = if row.is_last_sibling { "└── " } else { "├── " };
        spans.push(Span::styled(branch, Style::default().fg(edge_color(edge))));
        spans.push(Span::styled(
            edge_marker(edge),
            Style::default()
                .fg(edge_color(edge))
                .add_modifier(Modifier::BOLD),
        ));
        used += 6;
    }
    if row.has_children() {
        let indicator = if row.expanded { "[-] " } else { "[+] " };
        spans.push(Span::styled(indicator, Style::default().fg(COLOR_TEXT_SECONDARY)));
        used += 4;
    }
    spans.push(Span::styled("● ", Style::default().fg(node_color(row.color))));
    used += 2;

    let mut suffix = String::new();
    if row.hidden_descendants > 0 {
        let noun = if row.hidden_descendants == 1 {
            "reply"
        } else {
            "replies"
        };
        suffix = format!(" ({} hidden {noun})", row.hidden_descendants);
    }
    let budget = width
        .saturating_sub(used)
        .saturating_sub(UnicodeWidthStr::width(suffix.as_str()));
    let text = single_line(&row.node.text);
    spans.push(Span::styled(
        truncate_to_width(&text, budget),
        Style::default().fg(COLOR_TEXT_PRIMARY),
    ));
    if !suffix.is_empty() {
        spans.push(Span::styled(
            suffix,
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        ));
    }
    Line::from(spans)
}

fn draw_tree(
    frame: &mut Frame<'_>,
    area: Rect,
    title: &str,
    rows: &[TreeRow<'_>],
    state: &mut ListState,
    selected_row: usize,
) {
    let block = pane_block(title.to_string(), true);
    if rows.is_empty() {
        let empty = Paragraph::new("No tree data was returned for this post. Try another post.")
            .style(Style::default().fg(COLOR_TEXT_SECONDARY))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let width = block.inner(area).width.max(1) as usize;
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| ListItem::new(row_line(row, width)))
        .collect();
    state.select(Some(selected_row.min(rows.len() - 1)));
    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(COLOR_PANEL_SELECTED_BG)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, area, state);
}

fn metric_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{label}: "),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
        Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ])
}

fn sentiment_line(label: &str, sentiment: Sentiment) -> Line<'static> {
    metric_line(label, sentiment.as_str().to_string(), sentiment_color(sentiment))
}

fn draw_metrics(frame: &mut Frame<'_>, area: Rect, result: &TreeResult, embeds: &embed::Loader) {
    let block = pane_block("Tweet Tree Metrics".to_string(), false);
    let width = block.inner(area).width.max(1) as usize;
    let metrics = result.resolved_metrics();
    let stats = result.stats();

    let mut lines = vec![
        sentiment_line("General Sentiment", metrics.general_sentiment),
        sentiment_line("Original Tweet Sentiment", metrics.root_sentiment),
        sentiment_line("Sentiment Towards Original Tweet", metrics.sentiment_towards_root),
    ];
    if let Some(strength) = metrics.root_argument_strength {
        lines.push(metric_line(
            "Original Tweet Argument Strength",
            format_strength(Some(strength)),
            COLOR_ACCENT,
        ));
    }
    if let Some(node) = metrics.strongest_argument {
        lines.push(metric_line(
            "Strongest Argument",
            node.id.to_string(),
            COLOR_ACCENT,
        ));
        lines.extend(wrap_with_prefix(
            &single_line(&node.text),
            width,
            "  ",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        ));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        format!(
            "{} posts · {} supports · {} attacks · {} arguments",
            stats.posts, stats.supports, stats.attacks, stats.arguments
        ),
        Style::default().fg(COLOR_TEXT_SECONDARY),
    )));
    lines.push(Line::from(vec![
        Span::styled("● ", Style::default().fg(COLOR_SUCCESS)),
        Span::styled(
            format!("{} positive  ", stats.positive),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
        Span::styled("● ", Style::default().fg(COLOR_ERROR)),
        Span::styled(
            format!("{} negative  ", stats.negative),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
        Span::styled("● ", Style::default().fg(COLOR_NEUTRAL)),
        Span::styled(
            format!("{} neutral", stats.neutral),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
    ]));

    if let Some(root) = result.root.as_ref() {
        lines.push(Line::default());
        lines.extend(embed_lines(root, embeds, width));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn embed_lines(node: &TreeNode, embeds: &embed::Loader, width: usize) -> Vec<Line<'static>> {
    let heading = Line::from(Span::styled(
        "Original post",
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD),
    ));
    let body_style = Style::default().fg(COLOR_TEXT_SECONDARY);
    match embeds.state(&node.id) {
        None => Vec::new(),
        Some(EmbedState::Loading) => vec![
            heading,
            Line::from(Span::styled("Loading post…", body_style)),
        ],
        Some(EmbedState::Failed) => vec![
            heading,
            Line::from(Span::styled(
                EMBED_FAILED_PLACEHOLDER,
                Style::default().fg(COLOR_ERROR),
            )),
        ],
        Some(EmbedState::Ready(embed)) => {
            let mut lines = vec![heading];
            for paragraph in embed.text.lines() {
                lines.extend(wrap_with_prefix(paragraph, width, "│ ", body_style));
            }
            if !embed.author.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("by {}", embed.author),
                    Style::default()
                        .fg(COLOR_TEXT_SECONDARY)
                        .add_modifier(Modifier::ITALIC),
                )));
            }
            lines
        }
    }
}

fn draw_inspector(
    frame: &mut Frame<'_>,
    area: Rect,
    node: &TreeNode,
    details: &[DetailField],
    embeds: &embed::Loader,
    scroll: u16,
) {
    let popup = centered_rect(70, 75, area);
    frame.render_widget(Clear, popup);
    let block = pane_block("Tweet Data".to_string(), true).padding(Padding::horizontal(1));
    let width = block.inner(popup).width.max(1) as usize;

    let mut lines: Vec<Line<'static>> = Vec::new();
    for field in details {
        let value_color = match field.label {
            "Sentiment" => sentiment_color(node.sentiment),
            "Argumentative Type" => edge_color(crate::tree::edge_class_for(node.stance)),
            _ => COLOR_TEXT_PRIMARY,
        };
        let text = format!("{}: {}", field.label, field.value);
        let mut wrapped = wrap_with_prefixes(&text, width, "• ", "  ", Style::default().fg(value_color));
        if let Some(first) = wrapped.first_mut() {
            first.spans.iter_mut().for_each(|span| {
                span.style = span.style.add_modifier(Modifier::BOLD);
            });
        }
        lines.extend(wrapped);
    }
    let embed = embed_lines(node, embeds, width);
    if !embed.is_empty() {
        lines.push(Line::default());
        lines.extend(embed);
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

fn format_elapsed(elapsed: Duration) -> String {
    let millis = Duration::from_millis(elapsed.as_millis() as u64);
    format!(" in {}", humantime::format_duration(millis))
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width + 1 > width {
            break;
        }
        out.push(ch);
        used += ch_width;
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
    if text.trim().is_empty() {
        return vec![Line::from(Span::styled(String::new(), style))];
    }

    if width == 0 {
        let mut line = String::with_capacity(first_prefix.len() + text.len());
        line.push_str(first_prefix);
        line.push_str(text);
        return vec![Line::from(Span::styled(line, style))];
    }

    let min_width = first_prefix
        .chars()
        .count()
        .max(rest_prefix.chars().count())
        .saturating_add(1);
    let wrap_width = width.max(min_width);
    let options = WrapOptions::new(wrap_width)
        .break_words(true)
        .initial_indent(first_prefix)
        .subsequent_indent(rest_prefix);

    wrap(text, options)
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn wrap_with_prefix(text: &str, width: usize, prefix: &str, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefixes(text, width, prefix, prefix, style)
}

fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefixes(text, width, "", "", style)
}
