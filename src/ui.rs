pub mod screen;

use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};
use std::time::SystemTime;
use unicode_width::UnicodeWidthChar;

use crate::app::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// The app as seen at one instant. Rendering never changes state.
pub struct SessionView<'a> {
    pub app: &'a App,
    pub now: SystemTime,
}

impl<'a> SessionView<'a> {
    pub fn new(app: &'a App, now: SystemTime) -> Self {
        Self { app, now }
    }
}

impl Widget for SessionView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        screen::current_screen(self.app.game().phase()).render(&self, area, buf);
    }
}

/// Hard-wrap `text` at `width` columns and keep the last `height` rows, so
/// the line being written is always on screen.
fn tail_rows(text: &str, width: u16, height: u16) -> Vec<String> {
    let width = usize::from(width.max(1));
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let mut row = String::new();
        let mut row_width = 0;
        for c in line.chars() {
            let w = c.width().unwrap_or(0);
            if row_width + w > width && !row.is_empty() {
                rows.push(std::mem::take(&mut row));
                row_width = 0;
            }
            row.push(c);
            row_width += w;
        }
        rows.push(row);
    }
    let skip = rows.len().saturating_sub(usize::from(height));
    rows.split_off(skip)
}
