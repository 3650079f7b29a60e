//! Frame painting.
//!
//! The event loop talks to the terminal exclusively through a [`Renderer`].
//! [`StandardRenderer`] is the default; supply your own through
//! [`ProgramOptions::renderer`](crate::ProgramOptions::renderer), e.g. the
//! [`RecordingRenderer`](crate::testing::RecordingRenderer) in tests.

use crossterm::{
    cursor,
    event::{DisableBracketedPaste, EnableBracketedPaste},
    queue,
    terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};
use std::io::{self, stderr, stdout, IsTerminal, Stderr, Stdout, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use unicode_width::UnicodeWidthChar;

/// Receives frames and terminal-mode requests from the event loop.
///
/// Implementations own every terminal mode toggle (alt screen, mouse
/// reporting, cursor visibility).  Methods are infallible: a renderer that
/// fails to write should log and carry on.
pub trait Renderer: Send {
    /// Begin painting frames (e.g. start a flush ticker).
    fn start(&mut self);
    /// Paint the pending frame and stop.
    fn stop(&mut self);
    /// Stop immediately without painting the pending frame.
    fn kill(&mut self);
    /// Replace the pending frame with `frame`.
    fn write(&mut self, frame: String);
    /// Forget what is on screen so the next frame is painted in full.
    fn repaint(&mut self);
    /// Clear the whole screen.
    fn clear_screen(&mut self);
    /// Whether the alternate screen is active.
    fn alt_screen(&self) -> bool;
    /// Switch to the alternate screen buffer.
    fn enter_alt_screen(&mut self);
    /// Return to the primary screen buffer.
    fn exit_alt_screen(&mut self);
    /// Make the cursor visible.
    fn show_cursor(&mut self);
    /// Hide the cursor.
    fn hide_cursor(&mut self);
    /// Report clicks, releases, wheel and drag.
    fn enable_mouse_cell_motion(&mut self);
    /// Stop cell-motion reporting.
    fn disable_mouse_cell_motion(&mut self);
    /// Report all mouse motion, including hover.
    fn enable_mouse_all_motion(&mut self);
    /// Stop all-motion reporting.
    fn disable_mouse_all_motion(&mut self);
    /// Print a line above the frame.  Dropped while the alt screen is active.
    fn print_line(&mut self, text: String);
    /// Ask the terminal to wrap pasted text in paste markers.
    fn enable_bracketed_paste(&mut self) {}
    /// Stop bracketed paste.
    fn disable_bracketed_paste(&mut self) {}
    /// The terminal now has the given dimensions.
    fn resize(&mut self, _width: u16, _height: u16) {}
    /// Set the terminal window title.
    fn set_window_title(&mut self, _title: &str) {}
}

/// Output target for the terminal UI.
///
/// By default the UI renders to **stdout**.  When your program's stdout is
/// piped (e.g. to capture structured output), switch to [`Stderr`](OutputTarget::Stderr)
/// so the UI goes to the terminal while data flows through the pipe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write to stdout (default).
    #[default]
    Stdout,
    /// Write to stderr (useful when stdout is piped).
    Stderr,
}

impl OutputTarget {
    /// Whether the target is attached to a terminal.
    pub fn is_terminal(self) -> bool {
        match self {
            OutputTarget::Stdout => stdout().is_terminal(),
            OutputTarget::Stderr => stderr().is_terminal(),
        }
    }
}

/// Writer behind a [`StandardRenderer`].
enum Output {
    Stdout(Stdout),
    Stderr(Stderr),
    Writer(Box<dyn Write + Send>),
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(w) => w.write(buf),
            Output::Stderr(w) => w.write(buf),
            Output::Writer(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(w) => w.flush(),
            Output::Stderr(w) => w.flush(),
            Output::Writer(w) => w.flush(),
        }
    }
}

impl From<OutputTarget> for Output {
    fn from(target: OutputTarget) -> Self {
        match target {
            OutputTarget::Stdout => Output::Stdout(stdout()),
            OutputTarget::Stderr => Output::Stderr(stderr()),
        }
    }
}

/// xterm mouse tracking modes; 1006 selects SGR-encoded reports.
#[derive(Clone, Copy)]
struct MouseTracking {
    mode: u16,
    enable: bool,
}

const CELL_MOTION: u16 = 1002;
const ALL_MOTION: u16 = 1003;

impl crossterm::Command for MouseTracking {
    fn write_ansi(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        let flag = if self.enable { 'h' } else { 'l' };
        write!(f, "\x1b[?{}{flag}\x1b[?1006{flag}", self.mode)
    }

    #[cfg(windows)]
    fn execute_winapi(&self) -> io::Result<()> {
        Ok(())
    }
}

/// The default renderer: paints text frames with crossterm at a fixed frame
/// rate, repainting only the lines that changed since the previous frame.
pub struct StandardRenderer {
    state: Arc<Mutex<Screen>>,
    fps: u32,
    ticker: Option<CancellationToken>,
}

struct Screen {
    out: Output,
    frame: String,
    last_render: String,
    last_lines: Vec<String>,
    lines_rendered: usize,
    width: u16,
    height: u16,
    alt_screen: bool,
    queued_lines: Vec<String>,
    compress: bool,
}

impl StandardRenderer {
    /// Create a renderer painting to `target` at `fps` frames per second
    /// (clamped to 1..=120).
    pub fn new(target: OutputTarget, fps: u32, ansi_compression: bool) -> Self {
        Self::with_output(Output::from(target), fps, ansi_compression)
    }

    /// Create a renderer painting into an arbitrary writer.
    pub fn with_writer(writer: impl Write + Send + 'static, fps: u32, ansi_compression: bool) -> Self {
        Self::with_output(Output::Writer(Box::new(writer)), fps, ansi_compression)
    }

    fn with_output(out: Output, fps: u32, compress: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(Screen {
                out,
                frame: String::new(),
                last_render: String::new(),
                last_lines: Vec::new(),
                lines_rendered: 0,
                width: 0,
                height: 0,
                alt_screen: false,
                queued_lines: Vec::new(),
                compress,
            })),
            fps: fps.clamp(1, 120),
            ticker: None,
        }
    }

    fn screen(&self) -> MutexGuard<'_, Screen> {
        lock(&self.state)
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }
}

fn lock(state: &Mutex<Screen>) -> MutexGuard<'_, Screen> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Screen {
    fn emit(&mut self, build: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) {
        let mut buf = Vec::new();
        let result = build(&mut buf).and_then(|()| {
            self.out.write_all(&buf)?;
            self.out.flush()
        });
        if let Err(err) = result {
            tracing::warn!(target: "steep::render", %err, "terminal write failed");
        }
    }

    fn repaint(&mut self) {
        self.last_render.clear();
        self.last_lines.clear();
    }

    fn flush(&mut self) {
        if self.frame.is_empty() || (self.frame == self.last_render && self.queued_lines.is_empty()) {
            return;
        }

        let mut lines: Vec<&str> = self.frame.split('\n').map(|l| l.trim_end_matches('\r')).collect();
        let height = usize::from(self.height);
        if height > 0 && lines.len() > height {
            lines.drain(..lines.len() - height);
        }
        let width = usize::from(self.width);
        let lines: Vec<String> = lines
            .into_iter()
            .map(|line| truncate_to_width(line, width))
            .collect();

        let mut buf: Vec<u8> = Vec::new();
        let result = (|| -> io::Result<()> {
            if self.alt_screen {
                queue!(buf, cursor::MoveTo(0, 0))?;
            } else if self.lines_rendered > 1 {
                let up = u16::try_from(self.lines_rendered - 1).unwrap_or(u16::MAX);
                queue!(buf, cursor::MoveUp(up))?;
            }
            queue!(buf, cursor::MoveToColumn(0))?;

            let printed_above = !self.alt_screen && !self.queued_lines.is_empty();
            if printed_above {
                for line in self.queued_lines.drain(..) {
                    buf.extend_from_slice(line.as_bytes());
                    queue!(buf, Clear(ClearType::UntilNewLine))?;
                    buf.extend_from_slice(b"\r\n");
                }
            }

            let last = lines.len() - 1;
            for (i, line) in lines.iter().enumerate() {
                let unchanged = !printed_above && i < last && self.last_lines.get(i) == Some(line);
                if !unchanged {
                    buf.extend_from_slice(line.as_bytes());
                    queue!(buf, Clear(ClearType::UntilNewLine))?;
                }
                if i < last {
                    buf.extend_from_slice(b"\r\n");
                }
            }
            queue!(buf, Clear(ClearType::FromCursorDown))
        })();
        if let Err(err) = result {
            tracing::warn!(target: "steep::render", %err, "failed to build frame");
            return;
        }

        let bytes = if self.compress {
            compress_sgr(&String::from_utf8_lossy(&buf)).into_bytes()
        } else {
            buf
        };
        self.emit(|out| {
            out.extend_from_slice(&bytes);
            Ok(())
        });

        self.lines_rendered = lines.len();
        self.last_lines = lines;
        self.last_render = self.frame.clone();
    }
}

impl Renderer for StandardRenderer {
    fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(target: "steep::render", "no tokio runtime; frames paint on stop only");
            return;
        };
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let state = self.state.clone();
        let period = Duration::from_secs_f64(1.0 / f64::from(self.fps));
        runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => lock(&state).flush(),
                }
            }
        });
        self.ticker = Some(token);
    }

    fn stop(&mut self) {
        self.stop_ticker();
        let mut screen = self.screen();
        screen.flush();
        if !screen.alt_screen && screen.lines_rendered > 0 {
            // Leave the cursor below the final frame.
            screen.emit(|out| {
                out.extend_from_slice(b"\r\n");
                Ok(())
            });
            screen.lines_rendered = 0;
            screen.repaint();
        }
    }

    fn kill(&mut self) {
        self.stop_ticker();
    }

    fn write(&mut self, frame: String) {
        let mut screen = self.screen();
        // An empty frame would never be painted; use a blank line instead.
        screen.frame = if frame.is_empty() { " ".to_string() } else { frame };
    }

    fn repaint(&mut self) {
        self.screen().repaint();
    }

    fn clear_screen(&mut self) {
        let mut screen = self.screen();
        screen.emit(|out| queue!(out, Clear(ClearType::All), cursor::MoveTo(0, 0)));
        screen.lines_rendered = 0;
        screen.repaint();
    }

    fn alt_screen(&self) -> bool {
        self.screen().alt_screen
    }

    fn enter_alt_screen(&mut self) {
        let mut screen = self.screen();
        if screen.alt_screen {
            return;
        }
        screen.alt_screen = true;
        screen.emit(|out| {
            queue!(
                out,
                EnterAlternateScreen,
                Clear(ClearType::All),
                cursor::MoveTo(0, 0)
            )
        });
        screen.lines_rendered = 0;
        screen.repaint();
    }

    fn exit_alt_screen(&mut self) {
        let mut screen = self.screen();
        if !screen.alt_screen {
            return;
        }
        screen.alt_screen = false;
        screen.emit(|out| queue!(out, LeaveAlternateScreen));
        screen.lines_rendered = 0;
        screen.repaint();
    }

    fn show_cursor(&mut self) {
        self.screen().emit(|out| queue!(out, cursor::Show));
    }

    fn hide_cursor(&mut self) {
        self.screen().emit(|out| queue!(out, cursor::Hide));
    }

    fn enable_mouse_cell_motion(&mut self) {
        self.screen().emit(|out| {
            queue!(out, MouseTracking { mode: CELL_MOTION, enable: true })
        });
    }

    fn disable_mouse_cell_motion(&mut self) {
        self.screen().emit(|out| {
            queue!(out, MouseTracking { mode: CELL_MOTION, enable: false })
        });
    }

    fn enable_mouse_all_motion(&mut self) {
        self.screen().emit(|out| {
            queue!(out, MouseTracking { mode: ALL_MOTION, enable: true })
        });
    }

    fn disable_mouse_all_motion(&mut self) {
        self.screen().emit(|out| {
            queue!(out, MouseTracking { mode: ALL_MOTION, enable: false })
        });
    }

    fn print_line(&mut self, text: String) {
        let mut screen = self.screen();
        if screen.alt_screen {
            return;
        }
        screen.queued_lines.extend(text.split('\n').map(str::to_owned));
        screen.repaint();
    }

    fn enable_bracketed_paste(&mut self) {
        self.screen().emit(|out| queue!(out, EnableBracketedPaste));
    }

    fn disable_bracketed_paste(&mut self) {
        self.screen().emit(|out| queue!(out, DisableBracketedPaste));
    }

    fn resize(&mut self, width: u16, height: u16) {
        let mut screen = self.screen();
        screen.width = width;
        screen.height = height;
        screen.repaint();
    }

    fn set_window_title(&mut self, title: &str) {
        self.screen().emit(|out| queue!(out, SetTitle(title)));
    }
}

impl Drop for StandardRenderer {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

/// Cut `line` to at most `width` display cells.  Escape sequences are copied
/// through and count as zero width.  A width of 0 means "unknown": the line is
/// returned unchanged.
fn truncate_to_width(line: &str, width: usize) -> String {
    if width == 0 {
        return line.to_owned();
    }
    let mut out = String::with_capacity(line.len());
    let mut used = 0;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            out.push(c);
            if chars.peek() == Some(&'[') {
                out.extend(chars.next());
                for c in chars.by_ref() {
                    out.push(c);
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            } else {
                out.extend(chars.next());
            }
            continue;
        }
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Drop SGR sequences identical to the previously emitted SGR sequence.
/// Re-applying the same attributes with nothing in between is a no-op.
fn compress_sgr(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_sgr: Option<&str> = None;
    let mut rest = input;
    while let Some(start) = rest.find("\x1b[") {
        out.push_str(&rest[..start]);
        let seq_body = &rest[start + 2..];
        let Some(end) = seq_body.find(|c: char| ('@'..='~').contains(&c)) else {
            out.push_str(&rest[start..]);
            return out;
        };
        let seq = &rest[start..start + 2 + end + 1];
        let is_sgr = seq.ends_with('m');
        if !(is_sgr && last_sgr == Some(seq)) {
            out.push_str(seq);
        }
        if is_sgr {
            last_sgr = Some(seq);
        }
        rest = &rest[start + seq.len()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn take(&self) -> String {
            let bytes = std::mem::take(&mut *self.0.lock().unwrap());
            String::from_utf8(bytes).unwrap()
        }
    }

    fn renderer() -> (StandardRenderer, SharedBuf) {
        let buf = SharedBuf::default();
        (StandardRenderer::with_writer(buf.clone(), 60, false), buf)
    }

    #[test]
    fn stop_paints_pending_frame() {
        let (mut r, buf) = renderer();
        r.write("hello\nworld".into());
        r.stop();
        let out = buf.take();
        assert!(out.contains("hello"));
        assert!(out.contains("world"));
    }

    #[test]
    fn kill_skips_pending_frame() {
        let (mut r, buf) = renderer();
        r.write("never shown".into());
        r.kill();
        assert!(!buf.take().contains("never shown"));
    }

    #[test]
    fn identical_frame_is_not_repainted() {
        let (r, buf) = renderer();
        let mut screen = r.screen();
        screen.frame = "same".into();
        screen.flush();
        assert!(buf.take().contains("same"));
        screen.flush();
        assert!(buf.take().is_empty());
    }

    #[test]
    fn unchanged_lines_are_skipped() {
        let (r, buf) = renderer();
        let mut screen = r.screen();
        screen.frame = "header\nbody 1\nfooter".into();
        screen.flush();
        buf.take();
        screen.frame = "header\nbody 2\nfooter".into();
        screen.flush();
        let out = buf.take();
        assert!(!out.contains("header"));
        assert!(out.contains("body 2"));
        assert!(out.contains("footer"));
    }

    #[test]
    fn repaint_forces_full_frame() {
        let (mut r, buf) = renderer();
        r.write("a\nb".into());
        r.screen().flush();
        buf.take();
        r.repaint();
        r.screen().flush();
        let out = buf.take();
        assert!(out.contains('a'));
        assert!(out.contains('b'));
    }

    #[test]
    fn print_line_is_written_above_frame() {
        let (mut r, buf) = renderer();
        r.write("frame".into());
        r.print_line("log entry".into());
        r.screen().flush();
        let out = buf.take();
        let log = out.find("log entry").unwrap();
        let frame = out.find("frame").unwrap();
        assert!(log < frame);
    }

    #[test]
    fn print_line_is_dropped_on_alt_screen() {
        let (mut r, buf) = renderer();
        r.enter_alt_screen();
        assert!(r.alt_screen());
        r.write("frame".into());
        r.print_line("log entry".into());
        r.screen().flush();
        assert!(!buf.take().contains("log entry"));
    }

    #[test]
    fn alt_screen_toggles_are_idempotent() {
        let (mut r, buf) = renderer();
        r.enter_alt_screen();
        let first = buf.take();
        r.enter_alt_screen();
        assert!(buf.take().is_empty());
        assert!(!first.is_empty());
        r.exit_alt_screen();
        assert!(!r.alt_screen());
        assert!(buf.take().contains("\x1b[?1049l"));
    }

    #[test]
    fn mouse_modes_write_tracking_sequences() {
        let (mut r, buf) = renderer();
        r.enable_mouse_cell_motion();
        assert_eq!(buf.take(), "\x1b[?1002h\x1b[?1006h");
        r.disable_mouse_all_motion();
        assert_eq!(buf.take(), "\x1b[?1003l\x1b[?1006l");
    }

    #[test]
    fn frames_taller_than_terminal_keep_bottom_rows() {
        let (mut r, buf) = renderer();
        r.resize(80, 2);
        r.write("one\ntwo\nthree".into());
        r.screen().flush();
        let out = buf.take();
        assert!(!out.contains("one"));
        assert!(out.contains("two"));
        assert!(out.contains("three"));
    }

    #[test]
    fn truncates_by_display_width() {
        assert_eq!(truncate_to_width("hello world", 5), "hello");
        assert_eq!(truncate_to_width("日本語", 4), "日本");
        assert_eq!(truncate_to_width("abc", 0), "abc");
    }

    #[test]
    fn truncation_keeps_escape_sequences() {
        assert_eq!(
            truncate_to_width("\x1b[31mred text\x1b[0m", 3),
            "\x1b[31mred"
        );
    }

    #[test]
    fn compression_drops_repeated_sgr() {
        let input = "\x1b[1mA\x1b[1mB\x1b[0mC\x1b[0m";
        assert_eq!(compress_sgr(input), "\x1b[1mAB\x1b[0mC");
    }

    #[test]
    fn compression_keeps_other_sequences() {
        let input = "\x1b[1mA\x1b[2K\x1b[1mB";
        assert_eq!(compress_sgr(input), "\x1b[1mA\x1b[2KB");
        assert_eq!(compress_sgr("plain"), "plain");
    }

    #[tokio::test]
    async fn ticker_flushes_frames() {
        let (mut r, buf) = renderer();
        r.start();
        r.write("ticked".into());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(buf.take().contains("ticked"));
        r.kill();
    }
}
