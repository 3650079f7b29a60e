//! Render [`ratatui`] widgets into text frames.
//!
//! [`Model::view`](crate::Model::view) returns a string, so widgets are drawn
//! into an off-screen buffer first:
//!
//! ```rust,ignore
//! use ratatui::widgets::{Block, Paragraph};
//!
//! fn view(&self) -> String {
//!     let widget = Paragraph::new(self.text.as_str()).block(Block::bordered());
//!     steep_core::canvas::render_widget(widget, self.width, 5)
//! }
//! ```

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;

/// Draw `widget` into a `width` x `height` area and return the rows joined by
/// newlines.  Trailing blanks are trimmed from each row; styling is dropped.
pub fn render_widget(widget: impl Widget, width: u16, height: u16) -> String {
    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    widget.render(area, &mut buf);
    buffer_to_string(&buf)
}

/// Convert a rendered buffer to plain text.
pub fn buffer_to_string(buf: &Buffer) -> String {
    let area = buf.area;
    let mut rows = Vec::with_capacity(usize::from(area.height));
    for y in area.top()..area.bottom() {
        let mut row = String::new();
        for x in area.left()..area.right() {
            row.push_str(buf[(x, y)].symbol());
        }
        rows.push(row.trim_end().to_string());
    }
    rows.join("\n")
}
