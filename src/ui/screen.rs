use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::game::Phase;
use crate::session::SessionStatus;
use crate::ui::{tail_rows, SessionView, HORIZONTAL_MARGIN, VERTICAL_MARGIN};
use crate::util::format_clock;

/// A UI screen boundary, one per game phase
pub trait Screen {
    fn render(&self, view: &SessionView, area: Rect, buf: &mut Buffer);
}

/// Before the first keystroke
pub struct PromptScreen;

impl Screen for PromptScreen {
    fn render(&self, view: &SessionView, area: Rect, buf: &mut Buffer) {
        let game = view.app.game();
        let prompt = game.session().prompt();
        let usable_width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let prompt_width = u16::try_from(prompt.width()).unwrap_or(u16::MAX);
        let prompt_lines = prompt_width.div_ceil(usable_width).max(1);
        let padding = area.height.saturating_sub(prompt_lines.saturating_add(3)) / 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(padding),
                Constraint::Length(prompt_lines),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .split(area);

        Paragraph::new(Span::styled(
            prompt,
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

        let deadline = game.timing().inactivity_deadline.as_secs_f64();
        Paragraph::new(Span::styled(
            format!("start typing. {deadline:.0} seconds without a keystroke ends the session"),
            Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

        if view.app.wrote_today() {
            Paragraph::new(Span::styled(
                "you already wrote today",
                Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
        }
    }
}

/// While the session is running
pub struct WritingScreen;

impl Screen for WritingScreen {
    fn render(&self, view: &SessionView, area: Rect, buf: &mut Buffer) {
        let game = view.app.game();
        let now = view.now;
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // prompt
                Constraint::Length(1), // padding
                Constraint::Min(1),    // text
                Constraint::Length(1), // life bar
                Constraint::Length(1), // status
            ])
            .split(area);

        Paragraph::new(Span::styled(
            game.session().prompt(),
            dim_style.add_modifier(Modifier::ITALIC),
        ))
        .render(chunks[0], buf);

        let text_area = chunks[2];
        let mut lines: Vec<Line> = tail_rows(game.session().content(), text_area.width, text_area.height)
            .into_iter()
            .map(Line::from)
            .collect();
        if let Some(last) = lines.last_mut() {
            last.spans.push(Span::styled("▏", dim_style));
        }
        Paragraph::new(lines).render(text_area, buf);

        let bar_color = if game.is_warning(now) {
            Color::Red
        } else {
            Color::Green
        };
        Gauge::default()
            .gauge_style(Style::default().fg(bar_color))
            .ratio(game.life_remaining(now))
            .label("")
            .render(chunks[3], buf);

        let target = game.timing().target_duration.as_secs_f64();
        let mut status = vec![
            Span::styled(
                format!(
                    "{} / {}",
                    format_clock(game.elapsed(now).as_secs_f64()),
                    format_clock(target)
                ),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled(format!("{} words", game.word_count()), dim_style),
        ];
        if game.target_reached() {
            status.push(Span::raw("   "));
            status.push(Span::styled(
                "anky",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            ));
        } else {
            status.push(Span::styled(
                format!("   {:.0}%", game.target_progress(now) * 100.0),
                dim_style,
            ));
        }
        Paragraph::new(Line::from(status))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
    }
}

/// After the session ended
pub struct SummaryScreen;

impl Screen for SummaryScreen {
    fn render(&self, view: &SessionView, area: Rect, buf: &mut Buffer) {
        let game = view.app.game();
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let padding = area.height.saturating_sub(6) / 2;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(padding),
                Constraint::Length(1), // headline
                Constraint::Length(1), // padding
                Constraint::Length(1), // stats
                Constraint::Length(1), // keystrokes
                Constraint::Length(1), // padding
                Constraint::Length(1), // legend
                Constraint::Min(0),
            ])
            .split(area);

        let headline = match game.session().status() {
            SessionStatus::Anky => Span::styled(
                "you wrote an anky",
                bold_style.fg(Color::Magenta),
            ),
            SessionStatus::Draft => Span::styled("saved as a draft", bold_style.fg(Color::Cyan)),
            _ => Span::styled("nothing was written", bold_style.add_modifier(Modifier::DIM)),
        };
        Paragraph::new(headline)
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        if let Some(summary) = game.summary() {
            Paragraph::new(Span::styled(
                format!(
                    "{}   {} words   {:.0} wpm",
                    format_clock(summary.duration_secs),
                    summary.word_count,
                    summary.wpm
                ),
                bold_style,
            ))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);

            let keys = &summary.keystrokes;
            Paragraph::new(Span::styled(
                format!(
                    "{} keys   {} backspaces   longest pause {:.1}s",
                    keys.count,
                    keys.backspaces,
                    keys.longest_pause_ms as f64 / 1000.0
                ),
                Style::default().add_modifier(Modifier::DIM),
            ))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
        }

        Paragraph::new(Span::styled("(n)ew / (esc)ape", italic_style))
            .alignment(Alignment::Center)
            .render(chunks[6], buf);
    }
}

/// Helper to construct the screen for the current phase
pub fn current_screen(phase: Phase) -> Box<dyn Screen> {
    match phase {
        Phase::Idle => Box::new(PromptScreen),
        Phase::Active => Box::new(WritingScreen),
        Phase::Ended => Box::new(SummaryScreen),
    }
}
