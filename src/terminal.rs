use crate::entity::Direction;
use crate::grid::Viewport;
use crate::input::Input;
use crate::surface::{DrawContext, DrawOp, Rect, Rgb, Surface, SurfaceMetrics};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use std::io::{self, Write};
use std::time::Duration;

/// Logical pixels covered by one terminal character. A 36px cell is 4x2
/// characters.
pub const CHAR_WIDTH_PX: f64 = 9.0;
pub const CHAR_HEIGHT_PX: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalEvent {
    Input(Input),
    Resize(u16, u16),
    Focus(bool),
}

/// Logical viewport for a terminal of `columns` x `rows` characters.
pub fn viewport_for(columns: u16, rows: u16) -> Viewport {
    Viewport::new(columns as f64 * CHAR_WIDTH_PX, rows as f64 * CHAR_HEIGHT_PX)
}

pub fn current_viewport() -> io::Result<Viewport> {
    let (columns, rows) = terminal::size()?;
    Ok(viewport_for(columns, rows))
}

pub fn input_for_key(key: KeyEvent) -> Option<Input> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Input::Quit);
    }

    let input = match key.code {
        KeyCode::Up => Input::Direction(Direction::Up),
        KeyCode::Down => Input::Direction(Direction::Down),
        KeyCode::Left => Input::Direction(Direction::Left),
        KeyCode::Right => Input::Direction(Direction::Right),
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'w' => Input::Direction(Direction::Up),
            's' => Input::Direction(Direction::Down),
            'a' => Input::Direction(Direction::Left),
            'd' => Input::Direction(Direction::Right),
            ' ' => Input::Start,
            'p' => Input::Pause,
            'r' => Input::Restart,
            'q' => Input::Quit,
            _ => return None,
        },
        KeyCode::Enter => Input::Start,
        KeyCode::Esc => Input::Quit,
        _ => return None,
    };
    Some(input)
}

/// Waits up to `timeout` for something the game cares about.
pub fn poll_event(timeout: Duration) -> io::Result<Option<TerminalEvent>> {
    if !event::poll(timeout)? {
        return Ok(None);
    }
    let translated = match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => input_for_key(key).map(TerminalEvent::Input),
        Event::Resize(columns, rows) => Some(TerminalEvent::Resize(columns, rows)),
        Event::FocusGained => Some(TerminalEvent::Focus(true)),
        Event::FocusLost => Some(TerminalEvent::Focus(false)),
        _ => None,
    };
    Ok(translated)
}

/// Raw mode and the alternate screen for as long as this lives.
pub struct TerminalSession {
    active: bool,
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            terminal::EnterAlternateScreen,
            terminal::Clear(ClearType::All),
            event::EnableFocusChange,
            cursor::Hide
        )?;
        tracing::info!("terminal session started");
        Ok(Self { active: true })
    }

    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            cursor::Show,
            event::DisableFocusChange,
            terminal::LeaveAlternateScreen,
            ResetColor
        )?;
        terminal::disable_raw_mode()?;
        tracing::info!("terminal session ended");
        Ok(())
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Glyph {
    ch: char,
    fg: Option<Rgb>,
    bg: Option<Rgb>,
}

const BLANK: Glyph = Glyph {
    ch: ' ',
    fg: None,
    bg: None,
};

/// Rasterises a frame's display list onto a character grid.
#[derive(Debug, Clone)]
pub struct CharBuffer {
    columns: usize,
    rows: usize,
    glyphs: Vec<Glyph>,
}

impl CharBuffer {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            glyphs: vec![BLANK; columns * rows],
        }
    }

    fn span(&self, rect: &Rect) -> (usize, usize, usize, usize) {
        let clamp_col = |px: f64| ((px / CHAR_WIDTH_PX).floor().max(0.0) as usize).min(self.columns);
        let clamp_row = |px: f64| ((px / CHAR_HEIGHT_PX).floor().max(0.0) as usize).min(self.rows);
        (
            clamp_col(rect.x),
            clamp_col(rect.x + rect.width),
            clamp_row(rect.y),
            clamp_row(rect.y + rect.height),
        )
    }

    fn glyph_mut(&mut self, column: usize, row: usize) -> Option<&mut Glyph> {
        if column < self.columns && row < self.rows {
            self.glyphs.get_mut(row * self.columns + column)
        } else {
            None
        }
    }

    pub fn draw(&mut self, op: &DrawOp) {
        match op {
            DrawOp::FillRect { rect, color } => {
                let (c0, c1, r0, r1) = self.span(rect);
                for row in r0..r1 {
                    for column in c0..c1 {
                        if let Some(glyph) = self.glyph_mut(column, row) {
                            *glyph = Glyph {
                                ch: ' ',
                                fg: None,
                                bg: Some(*color),
                            };
                        }
                    }
                }
            }
            DrawOp::StrokeRect { rect, color } => {
                // A dot in the corner reads as a dashed grid at this size.
                let (c0, _, r0, _) = self.span(rect);
                if let Some(glyph) = self.glyph_mut(c0, r0) {
                    glyph.ch = '·';
                    glyph.fg = Some(*color);
                }
            }
            DrawOp::Text { x, y, text, color } => {
                let column = (x / CHAR_WIDTH_PX).floor().max(0.0) as usize;
                let row = (y / CHAR_HEIGHT_PX).floor().max(0.0) as usize;
                for (offset, ch) in text.chars().enumerate() {
                    if let Some(glyph) = self.glyph_mut(column + offset, row) {
                        glyph.ch = ch;
                        glyph.fg = Some(*color);
                    }
                }
            }
        }
    }

    fn glyph(&self, column: usize, row: usize) -> Option<&Glyph> {
        if column < self.columns && row < self.rows {
            self.glyphs.get(row * self.columns + column)
        } else {
            None
        }
    }

    fn row(&self, row: usize) -> Option<&[Glyph]> {
        if row < self.rows {
            self.glyphs.get(row * self.columns..(row + 1) * self.columns)
        } else {
            None
        }
    }

    pub fn char_at(&self, column: usize, row: usize) -> Option<char> {
        self.glyph(column, row).map(|g| g.ch)
    }

    pub fn background_at(&self, column: usize, row: usize) -> Option<Rgb> {
        self.glyph(column, row).and_then(|g| g.bg)
    }

    pub fn row_text(&self, row: usize) -> Option<String> {
        self.row(row).map(|glyphs| glyphs.iter().map(|g| g.ch).collect())
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.0,
        g: rgb.1,
        b: rgb.2,
    }
}

pub struct TerminalSurface {
    columns: usize,
    rows: usize,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            columns: 0,
            rows: 0,
        }
    }

    pub fn rasterise(&self, frame: &DrawContext) -> CharBuffer {
        let mut buffer = CharBuffer::new(self.columns, self.rows);
        for op in frame.ops() {
            buffer.draw(op);
        }
        buffer
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for TerminalSurface {
    fn resize(&mut self, metrics: &SurfaceMetrics) -> io::Result<()> {
        self.columns = (metrics.screen_width / CHAR_WIDTH_PX).floor() as usize;
        self.rows = (metrics.screen_height / CHAR_HEIGHT_PX).floor() as usize;
        execute!(io::stdout(), terminal::Clear(ClearType::All))?;
        Ok(())
    }

    fn present(&mut self, frame: &DrawContext) -> io::Result<()> {
        let buffer = self.rasterise(frame);
        let mut stdout = io::stdout();

        for row in 0..buffer.rows {
            let Some(glyphs) = buffer.row(row) else {
                break;
            };
            queue!(stdout, cursor::MoveTo(0, row as u16))?;
            for glyph in glyphs {
                match glyph.bg {
                    Some(bg) => queue!(stdout, SetBackgroundColor(to_color(bg)))?,
                    None => queue!(stdout, SetBackgroundColor(Color::Reset))?,
                }
                match glyph.fg {
                    Some(fg) => queue!(stdout, SetForegroundColor(to_color(fg)))?,
                    None => queue!(stdout, SetForegroundColor(Color::Reset))?,
                }
                queue!(stdout, Print(glyph.ch))?;
            }
        }
        queue!(stdout, ResetColor)?;
        stdout.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_keys_and_wasd() {
        let up = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(input_for_key(up), Some(Input::Direction(Direction::Up)));

        let d = KeyEvent::new(KeyCode::Char('D'), KeyModifiers::SHIFT);
        assert_eq!(input_for_key(d), Some(Input::Direction(Direction::Right)));

        let s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE);
        assert_eq!(input_for_key(s), Some(Input::Direction(Direction::Down)));
    }

    #[test]
    fn test_controls() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(input_for_key(ctrl_c), Some(Input::Quit));

        let space = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
        assert_eq!(input_for_key(space), Some(Input::Start));

        let other = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(input_for_key(other), None);
        let tab = KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(input_for_key(tab), None);
    }

    #[test]
    fn test_viewport_scales_characters() {
        let viewport = viewport_for(80, 24);
        assert_eq!(viewport.width, 720.0);
        assert_eq!(viewport.height, 432.0);
    }

    #[test]
    fn test_fill_rect_covers_characters_without_gaps() {
        let mut buffer = CharBuffer::new(10, 4);
        buffer.draw(&DrawOp::FillRect {
            rect: Rect::square(36.0, 0.0, 36.0),
            color: Rgb::SNAKE,
        });
        // 36..72 px -> columns 4..8, rows 0..2
        for column in 0..10 {
            let expected = (4..8).contains(&column);
            assert_eq!(buffer.background_at(column, 0).is_some(), expected, "column {}", column);
            assert_eq!(buffer.background_at(column, 1).is_some(), expected);
            assert!(buffer.background_at(column, 2).is_none());
        }
    }

    #[test]
    fn test_draws_outside_the_buffer_are_clipped() {
        let mut buffer = CharBuffer::new(4, 2);
        buffer.draw(&DrawOp::FillRect {
            rect: Rect::new(-50.0, -50.0, 1000.0, 1000.0),
            color: Rgb::GRID,
        });
        buffer.draw(&DrawOp::Text {
            x: 18.0,
            y: 0.0,
            text: "hello".into(),
            color: Rgb::WHITE,
        });
        assert_eq!(buffer.row_text(0).as_deref(), Some("  he"));
        assert!(buffer.background_at(3, 1).is_some());
    }

    #[test]
    fn test_lookups_past_the_buffer_are_none() {
        let buffer = CharBuffer::new(4, 2);
        assert_eq!(buffer.row_text(1).as_deref(), Some("    "));
        assert_eq!(buffer.row_text(2), None);
        assert_eq!(buffer.char_at(4, 0), None);
        assert_eq!(buffer.background_at(0, 5), None);
    }

    #[test]
    fn test_stroke_marks_corner() {
        let mut buffer = CharBuffer::new(8, 4);
        buffer.draw(&DrawOp::StrokeRect {
            rect: Rect::square(36.0, 18.0, 36.0),
            color: Rgb::GRID,
        });
        assert_eq!(buffer.char_at(4, 1), Some('·'));
        assert_eq!(buffer.char_at(5, 1), Some(' '));
    }
}
