use anyhow::Result;
use cannabis_registry::dashboard::datasheet;
use cannabis_registry::geo::bounds;
use cannabis_registry::{
    AgeClass, Column, Config, DashboardSettings, FilterEngine, MediaAsset, MediaAssets, Overview,
    Panels, RecordStore, SelectionState, LEGAL_AGE, MAX_AGE, NO_ENTRIES_MESSAGE,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Points},
        Axis, BarChart, Block, Borders, Cell, Chart, Dataset, Gauge, GraphType, Paragraph, Row,
        Table, TableState, Wrap,
    },
    Frame, Terminal,
};
use std::io;

const GREEN: Color = Color::Rgb(0x3C, 0x87, 0x3A);

const PALETTE: [Color; 6] = [
    Color::Green,
    Color::Yellow,
    Color::Cyan,
    Color::Magenta,
    Color::Red,
    Color::Blue,
];

/// Lines each listing entry takes on the Finder page
const LINES_PER_ENTRY: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Welcome,
    Maps,
    Charts,
    Pivot,
    Datasheet,
    Finder,
}

impl Page {
    const ALL: [Page; 6] = [
        Page::Welcome,
        Page::Maps,
        Page::Charts,
        Page::Pivot,
        Page::Datasheet,
        Page::Finder,
    ];

    fn position(&self) -> usize {
        Page::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Page::ALL[(self.position() + 1) % Page::ALL.len()]
    }

    pub fn previous(&self) -> Self {
        Page::ALL[(self.position() + Page::ALL.len() - 1) % Page::ALL.len()]
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Welcome => "Welcome",
            Page::Maps => "Maps",
            Page::Charts => "Charts",
            Page::Pivot => "Pivot Table",
            Page::Datasheet => "Datasheet",
            Page::Finder => "Finder",
        }
    }
}

/// Which control the Finder page's arrow keys drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    ZipCodes,
    Status,
    Business,
    Owner,
}

impl Focus {
    fn next(&self) -> Self {
        match self {
            Focus::ZipCodes => Focus::Status,
            Focus::Status => Focus::Business,
            Focus::Business => Focus::Owner,
            Focus::Owner => Focus::ZipCodes,
        }
    }
}

/// Options offered by the selection controls, fixed for the session.
struct Options {
    categories: Vec<String>,
    statuses: Vec<String>,
    zip_codes: Vec<String>,
    businesses: Vec<String>,
    owners: Vec<String>,
}

pub struct App<'a> {
    engine: FilterEngine<'a>,
    settings: DashboardSettings,
    overview: Overview,
    media: MediaAssets,
    options: Options,
    pub age: u8,
    category_idx: usize,
    status_idx: usize,
    business_idx: usize,
    owner_idx: usize,
    zip_cursor: usize,
    picked_zips: Vec<String>,
    pub focus: Focus,
    pub current_page: Page,
    pub datasheet_state: TableState,
    /// First visible line of the Finder listing
    pub listing_scroll: u16,
    pub panels: Panels,
}

impl<'a> App<'a> {
    pub fn new(store: &'a RecordStore, config: &Config) -> Self {
        let settings = config.dashboard_settings();
        let engine = FilterEngine::new(store);
        let overview = Overview::compute(store, &settings);
        let media = MediaAssets::probe(&config.media);

        let options = Options {
            categories: store.column_values(Column::LicenseCategory),
            statuses: store.column_values(Column::LicenseStatus),
            zip_codes: store.column_values(Column::ZipCode),
            businesses: store.column_values(Column::BusinessName),
            owners: store.column_values(Column::OwnerName),
        };

        let mut datasheet_state = TableState::default();
        if !store.is_empty() {
            datasheet_state.select(Some(0));
        }

        let initial = SelectionState::initial(store);
        let panels = Panels::compute(&engine, &initial, &settings);

        Self {
            engine,
            settings,
            overview,
            media,
            options,
            age: initial.age,
            category_idx: 0,
            status_idx: 0,
            business_idx: 0,
            owner_idx: 0,
            zip_cursor: 0,
            picked_zips: Vec::new(),
            focus: Focus::ZipCodes,
            current_page: Page::Welcome,
            datasheet_state,
            listing_scroll: 0,
            panels,
        }
    }

    /// Current control values
    pub fn selection(&self) -> SelectionState {
        SelectionState {
            age: self.age,
            category: self.options.categories.get(self.category_idx).cloned(),
            zip_codes: self.picked_zips.clone(),
            license_status: self.options.statuses.get(self.status_idx).cloned(),
            business_name: self.options.businesses.get(self.business_idx).cloned(),
            owner_name: self.options.owners.get(self.owner_idx).cloned(),
        }
    }

    /// Full recomputation pass after any control change
    fn refresh(&mut self) {
        let selection = self.selection();
        self.panels = Panels::compute(&self.engine, &selection, &self.settings);
        self.listing_scroll = 0;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn adjust_age(&mut self, delta: i16) {
        let age = (self.age as i16 + delta).clamp(0, MAX_AGE as i16);
        self.age = age as u8;
        self.refresh();
    }

    pub fn cycle_category(&mut self, forward: bool) {
        self.category_idx = cycle(self.category_idx, self.options.categories.len(), forward);
        self.refresh();
    }

    pub fn cycle_focus(&mut self) {
        self.focus = self.focus.next();
    }

    /// Left/Right on the Finder page
    pub fn step_focused(&mut self, forward: bool) {
        match self.focus {
            Focus::ZipCodes => {
                self.zip_cursor = cycle(self.zip_cursor, self.options.zip_codes.len(), forward);
                return;
            }
            Focus::Status => {
                self.status_idx = cycle(self.status_idx, self.options.statuses.len(), forward)
            }
            Focus::Business => {
                self.business_idx = cycle(self.business_idx, self.options.businesses.len(), forward)
            }
            Focus::Owner => {
                self.owner_idx = cycle(self.owner_idx, self.options.owners.len(), forward)
            }
        }
        self.refresh();
    }

    /// Space on the zip code list picks or unpicks the zip under the cursor
    pub fn toggle_zip(&mut self) {
        let Some(zip) = self.options.zip_codes.get(self.zip_cursor) else {
            return;
        };
        match self.picked_zips.iter().position(|z| z == zip) {
            Some(i) => {
                self.picked_zips.remove(i);
            }
            None => self.picked_zips.push(zip.clone()),
        }
        self.refresh();
    }

    pub fn clear_zips(&mut self) {
        self.picked_zips.clear();
        self.refresh();
    }

    fn datasheet_len(&self) -> usize {
        datasheet(self.engine.store(), &self.settings).len()
    }

    pub fn next_row(&mut self) {
        let len = self.datasheet_len();
        if len == 0 {
            return;
        }
        let i = match self.datasheet_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.datasheet_state.select(Some(i));
    }

    pub fn previous_row(&mut self) {
        let len = self.datasheet_len();
        if len == 0 {
            return;
        }
        let i = match self.datasheet_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.datasheet_state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.datasheet_len();
        if len == 0 {
            return;
        }
        let i = self.datasheet_state.selected().map(|i| i + 20).unwrap_or(0);
        self.datasheet_state.select(Some(i.min(len - 1)));
    }

    pub fn page_up(&mut self) {
        let i = self
            .datasheet_state
            .selected()
            .map(|i| i.saturating_sub(20))
            .unwrap_or(0);
        self.datasheet_state.select(Some(i));
    }

    /// Move the Finder listing by `entries`, stopping with the last entry on top
    pub fn scroll_listing(&mut self, entries: i32) {
        let last = self.panels.listing.len().saturating_sub(1) as i32 * LINES_PER_ENTRY as i32;
        let offset = self.listing_scroll as i32 + entries * LINES_PER_ENTRY as i32;
        self.listing_scroll = offset.clamp(0, last) as u16;
    }
}

fn cycle(index: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        0
    } else if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "Dashboard loop failed");
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => app.next_page(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('+') | KeyCode::Char('=') if app.current_page == Page::Welcome => {
                    app.adjust_age(1)
                }
                KeyCode::Char('-') if app.current_page == Page::Welcome => app.adjust_age(-1),
                KeyCode::Right if app.current_page == Page::Welcome => app.adjust_age(1),
                KeyCode::Left if app.current_page == Page::Welcome => app.adjust_age(-1),
                KeyCode::Right if app.current_page == Page::Maps => app.cycle_category(true),
                KeyCode::Left if app.current_page == Page::Maps => app.cycle_category(false),
                KeyCode::Char('f') if app.current_page == Page::Finder => app.cycle_focus(),
                KeyCode::Right if app.current_page == Page::Finder => app.step_focused(true),
                KeyCode::Left if app.current_page == Page::Finder => app.step_focused(false),
                KeyCode::Char(' ') if app.current_page == Page::Finder => app.toggle_zip(),
                KeyCode::Char('c') if app.current_page == Page::Finder => app.clear_zips(),
                KeyCode::Down if app.current_page == Page::Finder => app.scroll_listing(1),
                KeyCode::Up if app.current_page == Page::Finder => app.scroll_listing(-1),
                KeyCode::PageDown if app.current_page == Page::Finder => app.scroll_listing(10),
                KeyCode::PageUp if app.current_page == Page::Finder => app.scroll_listing(-10),
                KeyCode::Down | KeyCode::Char('j') => app.next_row(),
                KeyCode::Up | KeyCode::Char('k') => app.previous_row(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Welcome => render_welcome(f, chunks[1], app),
        Page::Maps => render_maps(f, chunks[1], app),
        Page::Charts => render_charts(f, chunks[1], app),
        Page::Pivot => render_pivot(f, chunks[1], app),
        Page::Datasheet => render_datasheet(f, chunks[1], app),
        Page::Finder => render_finder(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn titled(title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(GREEN).add_modifier(Modifier::BOLD),
        ))
}

fn header_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![Span::styled(
        "🍃 The Cannabis Registry  ",
        Style::default().fg(GREEN).add_modifier(Modifier::BOLD),
    )];

    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Records: {}", app.overview.total_records),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(age_span(app));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

    f.render_widget(header, area);
}

fn age_span(app: &App) -> Span<'static> {
    let color = match app.panels.age_class {
        AgeClass::Minor => Color::Red,
        AgeClass::Adult => Color::Green,
    };
    Span::styled(
        format!("Age {}: {}", app.panels.age, app.panels.age_message),
        Style::default().fg(color),
    )
}

fn render_welcome(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let title = Paragraph::new(vec![
        Line::from(Span::styled(
            "The Cannabis Registry",
            Style::default().fg(GREEN).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "A One Stop-Shop for all your Cannabis Needs",
            Style::default().fg(GREEN),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(title, chunks[0]);

    let gauge = Gauge::default()
        .block(titled("Select your age"))
        .gauge_style(Style::default().fg(GREEN))
        .ratio(app.age as f64 / MAX_AGE as f64)
        .label(format!("{} / {}", app.age, MAX_AGE));
    f.render_widget(gauge, chunks[1]);

    let banner_color = match app.panels.age_class {
        AgeClass::Minor => Color::Red,
        AgeClass::Adult => Color::Green,
    };
    let banner = Paragraph::new(Span::styled(
        app.panels.age_message,
        Style::default().fg(banner_color).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .block(titled("Access"));
    f.render_widget(banner, chunks[2]);

    let mut lines = vec![Line::from("")];
    lines.extend(media_lines(&app.media.video));
    lines.push(Line::from(""));
    lines.extend(media_lines(&app.media.image));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("  You must be {} or older to purchase cannabis.", LEGAL_AGE),
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    let media = Paragraph::new(lines).block(titled("Media"));
    f.render_widget(media, chunks[3]);
}

fn media_lines(asset: &MediaAsset) -> Vec<Line<'static>> {
    let text = match asset.size {
        Some(bytes) => format!("{} ({:.1} MB)", asset.path.display(), bytes as f64 / 1_048_576.0),
        None => format!("{} (not found)", asset.path.display()),
    };
    let color = if asset.is_available() { Color::Green } else { Color::Red };
    let status = Span::styled(text, Style::default().fg(color));

    vec![
        Line::from(Span::styled(
            format!("  {}", asset.kind.title()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![Span::raw("    "), status]),
    ]
}

/// Padded canvas bounds around every registry position
fn canvas_bounds(app: &App) -> ([f64; 2], [f64; 2]) {
    match bounds(app.engine.store().records()) {
        Some((x0, y0, x1, y1)) => {
            let pad_x = ((x1 - x0) * 0.05).max(0.001);
            let pad_y = ((y1 - y0) * 0.05).max(0.001);
            ([x0 - pad_x, x1 + pad_x], [y0 - pad_y, y1 + pad_y])
        }
        None => ([-180.0, 180.0], [-90.0, 90.0]),
    }
}

fn render_maps(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let (x_bounds, y_bounds) = canvas_bounds(app);

    // Density grid: brighter cells hold more businesses
    let max_count = app.overview.grid.iter().map(|c| c.count).max().unwrap_or(1);
    let mut buckets: [Vec<(f64, f64)>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for cell in &app.overview.grid {
        let level = if cell.count * 3 > max_count * 2 {
            2
        } else if cell.count * 3 > max_count {
            1
        } else {
            0
        };
        buckets[level].push((cell.longitude, cell.latitude));
    }

    let grid_title = match app.overview.grid_view {
        Some(view) => format!(
            "Dispensaries in Boston - grid (centre {:.4}, {:.4}, zoom {})",
            view.latitude, view.longitude, view.zoom
        ),
        None => "Dispensaries in Boston - grid (no coordinates)".to_string(),
    };

    let grid = Canvas::default()
        .block(titled(&grid_title))
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            let colors = [Color::Rgb(0x9C, 0xD3, 0x8F), Color::Rgb(0x5B, 0xB0, 0x4F), GREEN];
            for (coords, color) in buckets.iter().zip(colors) {
                ctx.draw(&Points { coords, color });
            }
        });
    f.render_widget(grid, chunks[0]);

    let points: Vec<(f64, f64)> = app
        .panels
        .category_points
        .iter()
        .map(|p| (p.longitude, p.latitude))
        .collect();
    let category = app.panels.category.as_deref().unwrap_or("-");
    let scatter_title = format!(
        "Category: {} ({} locations) ◀ ▶",
        category,
        app.panels.category_points.len()
    );

    let scatter = Canvas::default()
        .block(titled(&scatter_title))
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            ctx.draw(&Points {
                coords: &points,
                color: Color::Red,
            });
        });
    f.render_widget(scatter, chunks[1]);
}

fn render_charts(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    render_share_bars(
        f,
        top[0],
        "Equity Program Designation",
        app.overview
            .equity_program
            .iter()
            .map(|s| (s.label.clone(), s.percent_label(), s.percent)),
    );
    render_share_bars(
        f,
        top[1],
        "App License Status Distribution",
        app.overview
            .license_status
            .iter()
            .map(|s| (s.legend_label(), String::new(), s.percent)),
    );

    let bars: Vec<(&str, u64)> = app
        .overview
        .category_counts
        .iter()
        .map(|(label, count)| (label.as_str(), *count as u64))
        .collect();
    let bar_chart = BarChart::default()
        .block(titled("Count of App License Categories"))
        .data(bars.as_slice())
        .bar_width(9)
        .bar_gap(1)
        .bar_style(Style::default().fg(GREEN))
        .value_style(Style::default().fg(Color::Black).bg(GREEN));
    f.render_widget(bar_chart, bottom[0]);

    render_line_chart(f, bottom[1], app);
}

/// Text rendition of a pie/donut: one proportional bar per slice
fn render_share_bars<I>(f: &mut Frame, area: Rect, title: &str, slices: I)
where
    I: Iterator<Item = (String, String, f64)>,
{
    let width = area.width.saturating_sub(36) as f64;

    let lines: Vec<Line> = slices
        .enumerate()
        .map(|(i, (label, value, percent))| {
            let filled = ((percent / 100.0) * width).round() as usize;
            Line::from(vec![
                Span::styled(
                    format!(" {:<24}", truncate(&label, 24)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(format!("{:>7} ", value), Style::default().fg(Color::DarkGray)),
                Span::styled("█".repeat(filled), Style::default().fg(PALETTE[i % PALETTE.len()])),
            ])
        })
        .collect();

    let body = if lines.is_empty() {
        Paragraph::new("No data")
    } else {
        Paragraph::new(lines)
    };
    f.render_widget(body.block(titled(title)), area);
}

fn render_line_chart(f: &mut Frame, area: Rect, app: &App) {
    let chart = &app.overview.category_by_status;

    let series_points: Vec<Vec<(f64, f64)>> = chart
        .series
        .iter()
        .map(|s| s.points.iter().map(|&(x, y)| (x as f64, y as f64)).collect())
        .collect();

    let datasets: Vec<Dataset> = chart
        .series
        .iter()
        .zip(&series_points)
        .enumerate()
        .map(|(i, (series, points))| {
            Dataset::default()
                .name(series.label.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(PALETTE[i % PALETTE.len()]))
                .data(points)
        })
        .collect();

    let x_max = chart.x_labels.len().saturating_sub(1).max(1) as f64;
    let y_max = chart.max_count().max(1) as f64;

    let x_labels: Vec<Span> = chart
        .x_labels
        .iter()
        .map(|l| Span::raw(truncate(l, 10)))
        .collect();

    let line_chart = Chart::new(datasets)
        .block(titled("App License Category by License Status"))
        .x_axis(
            Axis::default()
                .title("Category")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("Count")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, y_max])
                .labels(vec![Span::raw("0"), Span::raw(format!("{}", y_max as usize))]),
        );
    f.render_widget(line_chart, area);
}

fn render_pivot(f: &mut Frame, area: Rect, app: &App) {
    let pivot = &app.overview.pivot;

    let header_cells = std::iter::once(pivot.row_dim.title().to_string())
        .chain(pivot.header())
        .map(|h| Cell::from(h).style(header_style()));
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = pivot.rows().into_iter().map(|row| {
        let is_total = row.label == cannabis_registry::TOTAL_LABEL;
        let last = row.counts.len().saturating_sub(1);
        let cells = std::iter::once(Cell::from(row.label.clone())).chain(
            row.counts.iter().enumerate().map(|(i, count)| {
                let style = if is_total || i == last {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Cell::from(format!("{:>8}", count)).style(style)
            }),
        );
        Row::new(cells.collect::<Vec<_>>()).height(1)
    });

    let widths: Vec<Constraint> = std::iter::once(Constraint::Length(34))
        .chain(std::iter::repeat(Constraint::Length(14)).take(pivot.column_labels.len() + 1))
        .collect();

    let table = Table::new(rows, widths).header(header).block(titled(&format!(
        "Pivot table - {} vs {}",
        pivot.row_dim.title(),
        pivot.col_dim.title()
    )));

    f.render_widget(table, area);
}

fn render_datasheet(f: &mut Frame, area: Rect, app: &mut App) {
    let records = datasheet(app.engine.store(), &app.settings);

    let header_cells = [
        "Business Name",
        "Facility Address",
        "Zip",
        "Status",
        "Category",
        "Owner",
        "License No",
        "Equity",
    ]
    .iter()
    .map(|h| Cell::from(*h).style(header_style()));

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = records.iter().map(|r| {
        let text = |column: Column| r.text(column).unwrap_or("").to_string();
        Row::new(vec![
            Cell::from(truncate(&text(Column::BusinessName), 28)),
            Cell::from(truncate(&text(Column::FacilityAddress), 28)),
            Cell::from(text(Column::ZipCode)),
            Cell::from(text(Column::LicenseStatus)),
            Cell::from(truncate(&text(Column::LicenseCategory), 20)),
            Cell::from(truncate(&text(Column::OwnerName), 22)),
            Cell::from(text(Column::LicenseNo)),
            Cell::from(truncate(&text(Column::EquityProgram), 14)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(30),
            Constraint::Length(30),
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Length(22),
            Constraint::Length(24),
            Constraint::Length(14),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(titled(&format!(
        "Cannabis Registry Datasheet (first {} rows)",
        records.len()
    )))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.datasheet_state);
}

fn focus_style(app: &App, focus: Focus) -> Style {
    if app.focus == focus {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    }
}

fn render_finder(f: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(28),
            Constraint::Min(30),
            Constraint::Percentage(35),
        ])
        .split(area);

    // Controls: zip code multi-select and license status radio
    let controls = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(app.options.statuses.len() as u16 + 2),
        ])
        .split(columns[0]);

    let visible = controls[0].height.saturating_sub(2) as usize;
    let start = app.zip_cursor.saturating_sub(visible.saturating_sub(1));
    let zip_lines: Vec<Line> = app
        .options
        .zip_codes
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(i, zip)| {
            let mark = if app.picked_zips.contains(zip) { "[x]" } else { "[ ]" };
            let under_cursor = i == app.zip_cursor && app.focus == Focus::ZipCodes;
            let cursor = if under_cursor { "→" } else { " " };
            Line::from(format!("{} {} {}", cursor, mark, zip))
        })
        .collect();
    let zips = Paragraph::new(zip_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(app, Focus::ZipCodes))
            .title(format!(" Zip Codes ({} picked) ", app.picked_zips.len())),
    );
    f.render_widget(zips, controls[0]);

    let status_lines: Vec<Line> = app
        .options
        .statuses
        .iter()
        .enumerate()
        .map(|(i, status)| {
            let mark = if i == app.status_idx { "(•)" } else { "( )" };
            Line::from(format!(" {} {}", mark, status))
        })
        .collect();
    let statuses = Paragraph::new(status_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(app, Focus::Status))
            .title(" App License Status "),
    );
    f.render_widget(statuses, controls[1]);

    // Results, sorted by business name
    let listing: Vec<Line> = if app.panels.listing_is_empty() {
        vec![Line::from(Span::styled(
            NO_ENTRIES_MESSAGE,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))]
    } else {
        app.panels
            .listing
            .iter()
            .flat_map(|entry| {
                vec![
                    Line::from(vec![
                        Span::styled("Business Name: ", header_style()),
                        Span::raw(entry.business_name.clone()),
                    ]),
                    Line::from(vec![
                        Span::styled("Address: ", header_style()),
                        Span::raw(entry.address.clone()),
                    ]),
                    Line::from("───"),
                ]
            })
            .collect()
    };
    let results = Paragraph::new(listing)
        .wrap(Wrap { trim: true })
        .scroll((app.listing_scroll, 0))
        .block(titled(&format!(
            "Filter by Zipcode and License Status - {} found",
            app.panels.listing.len()
        )));
    f.render_widget(results, columns[1]);

    // Sidebar: business addresses and owner lookup
    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(columns[2]);

    let selection = app.selection();
    let mut business_lines = vec![
        Line::from(Span::styled(
            format!("◀ {} ▶", selection.business_name.as_deref().unwrap_or("-")),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    let business_color = if app.panels.business_found { Color::Green } else { Color::Red };
    business_lines.extend(
        app.panels
            .business_lines()
            .into_iter()
            .map(|l| Line::from(Span::styled(l, Style::default().fg(business_color)))),
    );
    let business = Paragraph::new(business_lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(app, Focus::Business))
            .title(" Select Business Name "),
    );
    f.render_widget(business, sidebar[0]);

    let owner = &app.panels.owner;
    let mut owner_lines = vec![
        Line::from(Span::styled(
            format!("◀ {} ▶", selection.owner_name.as_deref().unwrap_or("-")),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    let owner_color = if owner.found { Color::Green } else { Color::Red };
    owner_lines.extend(
        owner
            .summary()
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(owner_color)))),
    );
    if owner.is_ambiguous() {
        owner_lines.push(Line::from(Span::styled(
            format!("({} businesses on record; showing the first)", owner.matches),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        )));
    }
    let owner_panel = Paragraph::new(owner_lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(app, Focus::Owner))
            .title(" Select Owner's Name "),
    );
    f.render_widget(owner_panel, sidebar[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let mut status_spans = vec![Span::styled(
        format!(" {} ", app.current_page.title()),
        Style::default().fg(Color::Cyan),
    )];
    status_spans.push(Span::raw(" | "));

    match app.current_page {
        Page::Welcome => {
            status_spans.push(key("←/→ +/-"));
            status_spans.push(Span::raw(" Age | "));
        }
        Page::Maps => {
            status_spans.push(key("←/→"));
            status_spans.push(Span::raw(" Category | "));
        }
        Page::Datasheet => {
            status_spans.push(key("↑/↓"));
            status_spans.push(Span::raw(" Nav | "));
            status_spans.push(key("PgUp/PgDn"));
            status_spans.push(Span::raw(" Fast | "));
        }
        Page::Finder => {
            status_spans.push(key("f"));
            status_spans.push(Span::raw(" Focus | "));
            status_spans.push(key("←/→"));
            status_spans.push(Span::raw(" Change | "));
            status_spans.push(key("Space"));
            status_spans.push(Span::raw(" Pick zip | "));
            status_spans.push(key("c"));
            status_spans.push(Span::raw(" Clear zips | "));
            status_spans.push(key("↑/↓"));
            status_spans.push(Span::raw(" Scroll | "));
        }
        Page::Charts | Page::Pivot => {}
    }

    status_spans.push(key("Tab"));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    const SAMPLE_CSV: &str = "\
longitude,latitude,equity_program_designation,app_license_status,app_license_category,facility_zip_code,app_business_name,facility_address,id_full_name,app_license_no
-71.06,42.34,Yes,Active,Retail,02118,Zed Shop,1 Main St,Ann Lee,L-1
-71.07,42.35,No,Active,Retail,02118,Acme Shop,2 Main St,Bo Diaz,L-2
-71.08,42.36,,Inactive,Cultivator,02119,Grow Co,3 Farm Rd,Cy Wu,L-3
";

    fn app_for(store: &RecordStore) -> App<'_> {
        App::new(store, &Config::default())
    }

    #[test]
    fn test_initial_state_mirrors_control_defaults() {
        let store = RecordStore::from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let app = app_for(&store);

        assert_eq!(app.current_page, Page::Welcome);
        assert_eq!(app.panels.age, 21);
        assert_eq!(app.panels.category.as_deref(), Some("Retail"));
        assert!(app.panels.listing_is_empty());
        assert_eq!(app.datasheet_state.selected(), Some(0));
    }

    #[test]
    fn test_age_is_clamped_and_reclassified() {
        let store = RecordStore::from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let mut app = app_for(&store);

        app.adjust_age(-1);
        assert_eq!(app.panels.age_class, AgeClass::Minor);

        app.adjust_age(-500);
        assert_eq!(app.age, 0);
        app.adjust_age(500);
        assert_eq!(app.age, MAX_AGE);
        assert_eq!(app.panels.age_class, AgeClass::Adult);
    }

    #[test]
    fn test_picking_zip_codes_fills_the_listing() {
        let store = RecordStore::from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let mut app = app_for(&store);

        app.toggle_zip();
        let names: Vec<&str> = app
            .panels
            .listing
            .iter()
            .map(|e| e.business_name.as_str())
            .collect();
        assert_eq!(names, vec!["Acme Shop", "Zed Shop"]);

        app.toggle_zip();
        assert!(app.panels.listing_is_empty());
    }

    #[test]
    fn test_finder_focus_drives_selection() {
        let store = RecordStore::from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let mut app = app_for(&store);

        app.cycle_focus();
        assert_eq!(app.focus, Focus::Status);
        app.step_focused(true);
        assert_eq!(app.selection().license_status.as_deref(), Some("Inactive"));

        app.cycle_focus();
        app.cycle_focus();
        assert_eq!(app.focus, Focus::Owner);
        app.step_focused(false);
        assert_eq!(app.selection().owner_name.as_deref(), Some("Cy Wu"));
        assert_eq!(app.panels.owner.business_name.as_deref(), Some("Grow Co"));
    }

    #[test]
    fn test_page_cycle_wraps() {
        assert_eq!(Page::Finder.next(), Page::Welcome);
        assert_eq!(Page::Welcome.previous(), Page::Finder);
        assert_eq!(cycle(0, 0, true), 0);
        assert_eq!(cycle(0, 3, false), 2);
    }

    fn busy_zip_store() -> RecordStore {
        let mut csv = String::from(
            "longitude,latitude,equity_program_designation,app_license_status,\
             app_license_category,facility_zip_code,app_business_name,facility_address,\
             id_full_name,app_license_no\n",
        );
        for i in 0..40 {
            csv.push_str(&format!(
                "-71.06,42.35,No,Active,Retail,02118,Shop {i:02},{i} Main St,Owner {i:02},L-{i}\n"
            ));
        }
        RecordStore::from_reader(csv.as_bytes()).unwrap()
    }

    fn screen_text(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(160, 40)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();

        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_finder_listing_scrolls_to_every_entry() {
        let store = busy_zip_store();
        let mut app = app_for(&store);
        app.current_page = Page::Finder;
        app.toggle_zip();
        assert_eq!(app.panels.listing.len(), 40);

        // the sidebar shows Shop 00 throughout, so check entries further down
        let screen = screen_text(&mut app);
        assert!(screen.contains("Shop 05"));
        assert!(!screen.contains("Shop 39"));

        for _ in 0..50 {
            app.scroll_listing(10);
        }
        assert_eq!(app.listing_scroll, 39 * LINES_PER_ENTRY);
        let screen = screen_text(&mut app);
        assert!(screen.contains("Shop 39"));
        assert!(!screen.contains("Shop 05"));

        app.scroll_listing(-1);
        assert_eq!(app.listing_scroll, 38 * LINES_PER_ENTRY);
        app.scroll_listing(-100);
        assert_eq!(app.listing_scroll, 0);
    }

    #[test]
    fn test_listing_scroll_resets_on_new_selection() {
        let store = busy_zip_store();
        let mut app = app_for(&store);
        app.toggle_zip();
        app.scroll_listing(5);
        assert!(app.listing_scroll > 0);

        app.clear_zips();
        assert_eq!(app.listing_scroll, 0);
        // nothing to scroll through
        app.scroll_listing(3);
        assert_eq!(app.listing_scroll, 0);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Dispensaire Montréal", 10), "Dispens...");
    }
}
