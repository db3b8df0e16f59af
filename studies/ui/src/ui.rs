use ratatui::{
    buffer::Buffer,
    layout::{ Alignment, Constraint, Direction, Layout, Rect },
    style::{ palette::tailwind, Color, Style },
    symbols,
    text::Text,
    widgets::{
        block::Title,
        Axis,
        Block,
        Borders,
        Cell,
        Chart,
        Dataset,
        Gauge,
        GraphType,
        HighlightSpacing,
        LineGauge,
        Padding,
        Paragraph,
        Row,
        Table,
        Widget,
    },
    DefaultTerminal,
};
use std::rc::Rc;
use std::time::Duration;
use crossterm::event::{ self, Event, KeyCode, KeyEventKind };
use color_eyre::Result;
use ratatui::prelude::Stylize;

use crate::state::{ StateMutex, TrainingState };

const CUSTOM_LABEL_COLOR: Color = tailwind::SLATE.c200;

#[derive(Debug)]
pub struct App {
    pub state: AppState,
    pub training: StateMutex,
    pub scroll_position: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    #[default]
    Running,
    Quitting,
}

impl App {
    pub fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        while self.state != AppState::Quitting {
            terminal.draw(|frame| frame.render_widget(&self, frame.area()))?;
            self.handle_events()?;
        }
        Ok(())
    }

    fn handle_events(&mut self) -> Result<()> {
        let timeout = Duration::from_secs_f32(1.0 / 20.0);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => self.quit(),
                        KeyCode::Up => {
                            self.scroll_position = self.scroll_position.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            self.scroll_position = self.scroll_position.saturating_add(1);
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn quit(&mut self) {
        self.state = AppState::Quitting;
    }

    /// Copy of the shared state so rendering never holds the lock for long.
    fn snapshot(&self) -> TrainingState {
        match self.training.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.snapshot();

        let body = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([Constraint::Max(1), Constraint::Fill(2), Constraint::Max(1)].as_ref())
            .split(area);

        let container = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([Constraint::Length(7), Constraint::Fill(1)].as_ref())
            .split(body[1]);

        let section_progress = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Fill(1)].as_ref())
            .split(container[0]);

        let section_info = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(60), Constraint::Fill(1)].as_ref())
            .split(container[1]);

        let section_info_table = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)].as_ref())
            .split(section_info[0]);

        render_header(body[0], buf);
        render_footer(&state, body[2], buf);
        render_progress(&state, section_progress, buf);
        render_history_chart(&state, section_info[1], buf);
        render_table_splits(&state, section_info_table[0], buf);
        self.render_table_log(&state, section_info_table[1], buf);
    }
}

fn render_header(area: Rect, buf: &mut Buffer) {
    Paragraph::new("Training Glyph Autoencoder")
        .bold()
        .alignment(Alignment::Left)
        .fg(CUSTOM_LABEL_COLOR)
        .render(area, buf);
}

fn render_footer(state: &TrainingState, area: Rect, buf: &mut Buffer) {
    let text = if state.finished {
        "Training finished - press q to quit"
    } else {
        "q: quit  \u{2191}/\u{2193}: scroll log"
    };
    Paragraph::new(text).alignment(Alignment::Center).fg(CUSTOM_LABEL_COLOR).bold().render(area, buf);
}

fn ratio(current: u16, max: u16) -> f64 {
    if max == 0 { 0.0 } else { ((current as f64) / (max as f64)).clamp(0.0, 1.0) }
}

fn render_progress(state: &TrainingState, area: Rc<[Rect]>, buf: &mut Buffer) {
    let progress = &state.progress;

    LineGauge::default()
        .block(Block::default().borders(Borders::ALL).title("Epochs"))
        .filled_style(Style::default().fg(Color::Cyan))
        .label(format!("{}/{}", progress.current_epoch, progress.max_epoch))
        .ratio(ratio(progress.current_epoch, progress.max_epoch))
        .render(area[0], buf);

    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Iterations"))
        .gauge_style(Style::default().fg(Color::Green))
        .label(state.description.clone())
        .ratio(ratio(progress.current_iteration, progress.max_iteration))
        .render(area[1], buf);
}

fn render_history_chart(state: &TrainingState, area: Rect, buf: &mut Buffer) {
    let train_dataset = Dataset::default()
        .name("train_history")
        .marker(symbols::Marker::Braille)
        .style(Style::default().fg(Color::Green))
        .graph_type(GraphType::Line)
        .data(&state.history.train);

    let valid_dataset = Dataset::default()
        .name("valid_history")
        .marker(symbols::Marker::Braille)
        .style(Style::default().fg(Color::Yellow))
        .graph_type(GraphType::Line)
        .data(&state.history.valid);

    let max_epoch = (state.progress.max_epoch as f64).max(1.0);
    let max_mse = state.history.max_mse().max(f64::EPSILON);

    Chart::new(vec![train_dataset, valid_dataset])
        .block(Block::default().borders(Borders::ALL).title("MSE"))
        .x_axis(
            Axis::default()
                .title("Epochs")
                .bounds([1.0, max_epoch])
                .labels(vec!["1".to_string(), format!("{}", max_epoch as u16)])
                .style(Style::default().fg(Color::Gray))
        )
        .y_axis(
            Axis::default()
                .title("MSE")
                .bounds([0.0, max_mse * 1.1])
                .labels(vec!["0".to_string(), format!("{:.5}", max_mse)])
                .style(Style::default().fg(Color::Gray))
        )
        .render(area, buf);
}

fn render_table_splits(state: &TrainingState, area: Rect, buf: &mut Buffer) {
    let title = title_block("Dataset");

    let header = Row::new(vec![Cell::from(Text::raw("Split")), Cell::from(Text::raw("Samples"))])
        .style(Style::default())
        .height(1);

    let rows = state.splits.iter().map(|(split, size)| {
        vec![Cell::from(split.clone()), Cell::from(size.clone())]
            .into_iter()
            .collect::<Row>()
            .height(1)
    });
    Table::new(rows, [Constraint::Length(10), Constraint::Min(1)])
        .header(header)
        .block(title)
        .highlight_spacing(HighlightSpacing::Always)
        .render(area, buf);
}

impl App {
    fn render_table_log(&self, state: &TrainingState, area: Rect, buf: &mut Buffer) {
        let title = title_block("History");

        let rows = state.log
            .iter()
            .rev()
            .skip(self.scroll_position.min(state.log.len().saturating_sub(1)))
            .map(|(info, value)| {
                Row::new(vec![Cell::from(info.clone()), Cell::from(value.clone())]).height(1)
            });

        let header = Row::new(vec![Cell::from("Info"), Cell::from("MSE")])
            .style(Style::default())
            .height(1);

        Table::new(rows, [Constraint::Percentage(70), Constraint::Percentage(30)])
            .header(header)
            .block(title)
            .render(area, buf);
    }
}

fn title_block(title: &str) -> Block {
    let title = Title::from(title).alignment(Alignment::Center);
    Block::new()
        .padding(Padding::vertical(1))
        .title(title)
        .borders(Borders::ALL)
        .fg(CUSTOM_LABEL_COLOR)
}
