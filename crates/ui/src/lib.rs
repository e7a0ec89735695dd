//! ratatui-based UI.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use catalog::Catalog;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{event, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, HighlightSpacing, List, ListItem, ListState, Paragraph, Wrap,
};
use shelfview_application::{AppContext, BooksState, Fetched, Loader, ShelvesState};
use shelfview_core::{Book, Shelf};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ACCENT: Color = Color::Blue;

pub struct Ui<C> {
    ctx: AppContext,
    view: ViewState,
    loader: Loader<C>,
    fetched: UnboundedReceiver<Fetched>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Focus {
    #[default]
    Shelves,
    Books,
}

#[derive(Debug, Clone, Default)]
struct ViewState {
    focus: Focus,
    shelf_cursor: usize,
    editing_query: bool,
}

impl<C: Catalog + 'static> Ui<C> {
    pub fn new(ctx: AppContext, catalog: Arc<C>, runtime: Handle) -> Self {
        let (loader, fetched) = Loader::new(catalog, runtime);
        Self {
            ctx,
            view: ViewState::default(),
            loader,
            fetched,
        }
    }

    pub fn into_context(self) -> AppContext {
        self.ctx
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut terminal = setup_terminal()?;
        terminal.clear().ok();
        self.reload_shelves();
        // A shelf chosen up front suppresses auto-select, so load it directly.
        if let Some(ticket) = self.ctx.reload_books() {
            self.loader.load_books(ticket);
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.event_loop(&mut terminal)
        }));
        let restore_result = restore_terminal(&mut terminal);

        match (result, restore_result) {
            (Ok(Ok(())), Ok(())) => Ok(()),
            (Ok(Ok(())), Err(err)) => Err(err),
            (Ok(Err(err)), _) => Err(err),
            (Err(panic), Ok(())) => Err(anyhow::anyhow!(panic_to_string(panic))),
            (Err(panic), Err(err)) => Err(anyhow::anyhow!(
                "{}\n(additionally failed to restore terminal: {err})",
                panic_to_string(panic)
            )),
        }
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<()> {
        let tick_rate = Duration::from_millis(100);
        let mut needs_redraw = true;

        loop {
            if self.drain_fetched() {
                needs_redraw = true;
            }

            if needs_redraw {
                terminal.draw(|frame| draw(frame, &self.ctx, &self.view))?;
                needs_redraw = false;
            }

            if !event::poll(tick_rate)? {
                continue;
            }

            match event::read()? {
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    needs_redraw = true;

                    let quit = if self.view.editing_query {
                        self.handle_search_key(key);
                        false
                    } else {
                        self.handle_main_key(key)
                    };
                    if quit {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    /// Applies every finished request. Returns whether anything arrived.
    fn drain_fetched(&mut self) -> bool {
        let mut changed = false;
        while let Ok(fetched) = self.fetched.try_recv() {
            changed = true;
            self.apply_fetched(fetched);
        }
        changed
    }

    /// Folds one result into the context, starting the follow-up book load
    /// and moving the cursor onto the selection when shelves arrive.
    fn apply_fetched(&mut self, fetched: Fetched) {
        let shelves_arrived = matches!(fetched, Fetched::Shelves(_));
        if let Some(ticket) = self.ctx.apply(fetched) {
            self.loader.load_books(ticket);
        }
        if shelves_arrived {
            self.view.shelf_cursor = self.selected_shelf_index().unwrap_or(0);
        }
    }

    fn handle_main_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Tab | KeyCode::BackTab => {
                self.view.focus = match self.view.focus {
                    Focus::Shelves => Focus::Books,
                    Focus::Books => Focus::Shelves,
                };
            }
            KeyCode::Char('/') => {
                self.view.editing_query = true;
                self.view.focus = Focus::Books;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.view.shelf_cursor = self.view.shelf_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let last = self.ctx.shelves().len().saturating_sub(1);
                self.view.shelf_cursor = (self.view.shelf_cursor + 1).min(last);
            }
            KeyCode::Enter => {
                if self.view.focus == Focus::Shelves {
                    self.select_shelf_under_cursor();
                }
            }
            KeyCode::Left | KeyCode::PageUp | KeyCode::Char('h') => {
                self.ctx.prev_page();
            }
            KeyCode::Right | KeyCode::PageDown | KeyCode::Char('l') => {
                self.ctx.next_page();
            }
            KeyCode::Char('r') => {
                if let Some(ticket) = self.ctx.reload_books() {
                    self.loader.load_books(ticket);
                }
            }
            KeyCode::Char('R') => self.reload_shelves(),
            KeyCode::Char('x') => {
                if let Some(ticket) = self.ctx.clear_selection() {
                    self.loader.load_books(ticket);
                }
                self.view.shelf_cursor = self.selected_shelf_index().unwrap_or(0);
            }
            _ => {}
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.ctx.set_query(String::new());
            }
            KeyCode::Esc | KeyCode::Enter => {
                self.view.editing_query = false;
            }
            KeyCode::Backspace => self.ctx.pop_query_char(),
            KeyCode::Left => {
                self.ctx.prev_page();
            }
            KeyCode::Right => {
                self.ctx.next_page();
            }
            KeyCode::Char(ch) if !ch.is_control() => self.ctx.push_query_char(ch),
            _ => {}
        }
    }

    fn select_shelf_under_cursor(&mut self) {
        let Some(shelf) = self.ctx.shelves().get(self.view.shelf_cursor) else {
            return;
        };
        let shelf_id = shelf.id.clone();
        debug!(shelf_id = %shelf_id, "selecting shelf from list");
        let ticket = self.ctx.select(shelf_id);
        self.loader.load_books(ticket);
    }

    fn reload_shelves(&mut self) {
        if self.ctx.begin_shelves_load() {
            self.loader.load_shelves();
        } else {
            debug!("shelf list already loading");
        }
    }

    fn selected_shelf_index(&self) -> Option<usize> {
        let selected = self.ctx.selected_shelf_id()?;
        self.ctx.shelves().iter().position(|s| s.id == selected)
    }
}

fn draw(frame: &mut ratatui::Frame, ctx: &AppContext, view: &ViewState) {
    let area = frame.area();
    frame.render_widget(Clear, area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled("Shelfview", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(
            ctx.settings.base_url.clone(),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, layout[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(0)])
        .split(layout[1]);

    draw_shelves(frame, body[0], ctx, view);

    let books_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(body[1]);
    draw_search(frame, books_layout[0], ctx, view);
    draw_books(frame, books_layout[1], ctx, view);

    let footer = Paragraph::new(Text::from(footer_lines(ctx, view)))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, layout[2]);
}

fn focus_block(title: &str, focused: bool) -> Block<'static> {
    let border_style = if focused {
        Style::default().fg(ACCENT)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(
            title.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ShelfRow {
    title: String,
    selected: bool,
}

/// Rows of the shelf list; a shelf is highlighted when its id is the
/// selection.
fn shelf_rows(shelves: &[Shelf], selected: Option<&str>) -> Vec<ShelfRow> {
    shelves
        .iter()
        .map(|shelf| ShelfRow {
            title: shelf.title.clone(),
            selected: selected == Some(shelf.id.as_str()),
        })
        .collect()
}

fn draw_shelves(frame: &mut ratatui::Frame, area: Rect, ctx: &AppContext, view: &ViewState) {
    let block = focus_block("Shelves", view.focus == Focus::Shelves);

    let message = match ctx.shelves_state() {
        ShelvesState::Idle | ShelvesState::Loading => Some(vec![Line::raw("Loading shelves…")]),
        ShelvesState::Failed(err) => Some(vec![
            Line::styled("Could not load shelves.", Style::default().fg(Color::Red)),
            Line::raw(""),
            Line::raw(err.to_string()),
            Line::raw(""),
            Line::raw("Press R to retry."),
        ]),
        ShelvesState::Ready(shelves) if shelves.is_empty() => Some(vec![Line::raw("No shelves.")]),
        ShelvesState::Ready(_) => None,
    };
    if let Some(lines) = message {
        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let max_width = area.width.saturating_sub(6) as usize;
    let items: Vec<ListItem> = shelf_rows(ctx.shelves(), ctx.selected_shelf_id())
        .into_iter()
        .map(|row| {
            let title = truncate_to_width(&row.title, max_width.max(4));
            if row.selected {
                ListItem::new(Line::styled(
                    format!("● {title}"),
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
                ))
            } else {
                ListItem::new(Line::raw(format!("  {title}")))
            }
        })
        .collect();

    let highlight_style = if view.focus == Focus::Shelves {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };
    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style)
        .highlight_symbol("> ")
        .highlight_spacing(HighlightSpacing::Always);

    let mut state = ListState::default();
    state.select(Some(view.shelf_cursor));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_search(frame: &mut ratatui::Frame, area: Rect, ctx: &AppContext, view: &ViewState) {
    let block = focus_block("Search a book", view.editing_query);
    let line = if ctx.query().is_empty() && !view.editing_query {
        Line::styled(
            "Press / to search by title or author",
            Style::default().fg(Color::DarkGray),
        )
    } else {
        let cursor = if view.editing_query { "▏" } else { "" };
        Line::raw(format!("{}{cursor}", ctx.query()))
    };
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_books(frame: &mut ratatui::Frame, area: Rect, ctx: &AppContext, view: &ViewState) {
    let title = match ctx.selected_shelf() {
        Some(shelf) if !ctx.query().trim().is_empty() => format!(
            "{} · {}/{} matches",
            shelf.title,
            ctx.filtered_books().len(),
            ctx.books().len()
        ),
        Some(shelf) => shelf.title.clone(),
        None => "Books".to_string(),
    };
    let block = focus_block(&title, view.focus == Focus::Books);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let message = match ctx.books_state() {
        BooksState::Idle => Some(vec![Line::raw("Select a shelf.")]),
        BooksState::Loading { .. } => {
            draw_skeleton_grid(frame, inner, ctx.page_window().page_size());
            return;
        }
        BooksState::Failed { error, .. } => Some(vec![
            Line::styled("Could not load this shelf.", Style::default().fg(Color::Red)),
            Line::raw(""),
            Line::raw(error.to_string()),
            Line::raw(""),
            Line::raw("Press r to retry."),
        ]),
        BooksState::Ready { books, .. } if books.is_empty() => {
            Some(vec![Line::raw("No books found in this shelf.")])
        }
        BooksState::Ready { .. } if ctx.filtered_books().is_empty() => Some(vec![
            Line::raw("No matches."),
            Line::raw(""),
            Line::raw(format!("Query: {}", ctx.query().trim())),
            Line::raw("Tip: press / then Ctrl+u to clear."),
        ]),
        BooksState::Ready { .. } => None,
    };
    if let Some(lines) = message {
        let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
        return;
    }

    let books = ctx.visible_books();
    let slots = ctx.page_window().page_size();
    for (cell, book) in grid_cells(inner, slots).into_iter().zip(books) {
        let width = cell.width.saturating_sub(2) as usize;
        frame.render_widget(book_card(book, width), cell);
    }
}

/// Splits `area` into `slots` cells, one per book of a page; wide areas get
/// four columns, narrow ones two.
fn grid_cells(area: Rect, slots: usize) -> Vec<Rect> {
    let cols: u32 = if area.width >= 100 { 4 } else { 2 };
    let rows = (slots.max(1) as u32).div_ceil(cols);

    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, rows); rows as usize])
        .split(area);

    row_areas
        .iter()
        .flat_map(|row| {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, cols); cols as usize])
                .split(*row)
                .to_vec()
        })
        .collect()
}

fn book_card(book: &Book, width: usize) -> Paragraph<'static> {
    let mut lines = Vec::new();

    let authors = book.author_line();
    if !authors.is_empty() {
        lines.push(Line::styled(
            truncate_to_width(&authors, width),
            Style::default().fg(Color::Gray),
        ));
    }
    if let Some(price) = &book.price {
        lines.push(Line::from(Span::styled(
            truncate_to_width(&format!(" {price} "), width),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )));
    }
    if let Some(rating) = book.rating_label() {
        lines.push(Line::styled(
            format!("★ {rating}"),
            Style::default().fg(Color::Yellow),
        ));
    }

    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        truncate_to_width(&book.title, width),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    Paragraph::new(Text::from(lines)).block(block)
}

fn draw_skeleton_grid(frame: &mut ratatui::Frame, area: Rect, slots: usize) {
    let placeholder = Style::default().fg(Color::DarkGray);
    for cell in grid_cells(area, slots) {
        let width = cell.width.saturating_sub(2) as usize;
        let lines = vec![
            Line::styled("░".repeat(width * 3 / 4), placeholder),
            Line::styled("░".repeat(width / 2), placeholder),
        ];
        let card = Paragraph::new(Text::from(lines)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(placeholder),
        );
        frame.render_widget(card, cell);
    }
}

fn footer_lines(ctx: &AppContext, view: &ViewState) -> Vec<Line<'static>> {
    let window = ctx.page_window();
    let total = ctx.filtered_books().len();
    let enabled = Style::default().add_modifier(Modifier::BOLD);
    let disabled = Style::default().fg(Color::DarkGray);

    let pages = Line::from(vec![
        Span::styled(
            "← Previous",
            if window.has_prev() { enabled } else { disabled },
        ),
        Span::raw(page_label(ctx)),
        Span::styled(
            "Next →",
            if window.has_next(total) {
                enabled
            } else {
                disabled
            },
        ),
    ]);

    let hints = if view.editing_query {
        "type to filter · Ctrl+u clear · Enter/Esc done"
    } else {
        "Tab focus · ↑↓ shelves · Enter select · x clear · / search · ←→ page · r/R reload · q quit"
    };
    vec![pages, Line::styled(hints, Style::default().fg(Color::DarkGray))]
}

/// The page count is unknown until an in-flight load lands.
fn page_label(ctx: &AppContext) -> String {
    if ctx.is_loading_books() {
        format!("   Page {} · loading   ", ctx.current_page())
    } else {
        format!(
            "   Page {} of {}   ",
            ctx.current_page(),
            ctx.total_pages()
        )
    }
}

/// Cuts `text` to at most `max_width` terminal columns, ending with `…` when
/// anything was dropped.
fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
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

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leave alt screen")?;
    Ok(())
}

fn panic_to_string(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: (unknown payload)".to_string()
    }
}
