use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use unicode_width::UnicodeWidthStr;

use crate::format::fit_width;

use super::StatusLine;

const STATUS_BG: Color = Color::Rgb(30, 30, 46);
const PILL_FG: Color = Color::Rgb(30, 30, 46);
const PILL_BG: Color = Color::Rgb(137, 180, 250);
const TEXT_FG: Color = Color::Rgb(205, 214, 244);
const MUTED_FG: Color = Color::Rgb(127, 132, 156);

pub fn render(frame: &mut Frame, area: Rect, status: &StatusLine<'_>) {
    let bg_style = Style::default().bg(STATUS_BG);

    let counter = format!(" {}/{} ", status.iteration, status.iterations);
    let ledger = format!(
        " surf {} tex {} ",
        status.ledger.live_surfaces, status.ledger.live_textures
    );
    let used = counter.width() + ledger.width() + 1;
    let report = status.report.unwrap_or("waiting for first sample");
    let report = fit_width(report, usize::from(area.width).saturating_sub(used));

    let line = Line::from(vec![
        Span::styled(
            counter,
            Style::default()
                .fg(PILL_FG)
                .bg(PILL_BG)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(ledger, Style::default().fg(MUTED_FG)),
        Span::raw(" "),
        Span::styled(report, Style::default().fg(TEXT_FG)),
    ]);

    frame.render_widget(Paragraph::new(line).style(bg_style), area);
}
