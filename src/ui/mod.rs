pub mod statusbar;
pub mod texture_widget;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::widgets::{Block, BorderType, Borders};

use crate::graphics::ledger::LedgerCounts;
use crate::graphics::texture::Texture;

/// Everything one frame needs.
pub struct WindowView<'a> {
    pub title: &'a str,
    pub width: u32,
    pub height: u32,
    pub texture: &'a Texture,
    pub status: StatusLine<'a>,
}

pub struct StatusLine<'a> {
    pub iteration: u64,
    pub iterations: u64,
    pub report: Option<&'a str>,
    pub ledger: LedgerCounts,
}

pub fn draw(frame: &mut Frame, view: &WindowView<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(88, 91, 112)))
        .title(Span::styled(
            format!(" {} ", view.title),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(chunks[0]);
    frame.render_widget(block, chunks[0]);

    let viewport = texture_widget::fit_viewport(inner, view.width, view.height);
    texture_widget::render(frame, viewport, view.texture);

    statusbar::render(frame, chunks[1], &view.status);
}
