//! Terminal preview and keyboard input
//!
//! Renders the combined preview surface with Unicode half-block characters
//! (two vertical pixels per cell) and reads single-key commands in raw mode.
//! Free-text prompts temporarily leave the alternate screen so the operator
//! types on a normal line.

use std::io::{self, stdout, BufRead, Stdout, Write};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
    Terminal,
};

use super::{Command, CommandSource, Display, KeyBindings, Prompt};
use crate::errors::CameraError;
use crate::preview::PreviewSurface;

pub struct TerminalUi {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    keys: KeyBindings,
    active: bool,
}

fn display_err(e: io::Error) -> CameraError {
    CameraError::DisplayError(e.to_string())
}

impl TerminalUi {
    /// Switch the terminal to raw mode on the alternate screen.
    pub fn enter(keys: KeyBindings) -> Result<Self, CameraError> {
        enable_raw_mode().map_err(display_err)?;
        let mut stdout = stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(display_err(e));
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout)).map_err(display_err)?;
        Ok(Self {
            terminal,
            keys,
            active: true,
        })
    }

    pub fn keys(&self) -> &KeyBindings {
        &self.keys
    }

    fn restore(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()
    }

    fn resume(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        execute!(self.terminal.backend_mut(), EnterAlternateScreen)?;
        self.terminal.clear()
    }
}

impl Display for TerminalUi {
    fn show(&mut self, surface: Option<&PreviewSurface>, status: &str) -> Result<(), CameraError> {
        if !self.active {
            return Ok(());
        }

        self.terminal
            .draw(|f| {
                let area = f.area();

                // Reserve bottom line for status
                let preview_area = Rect {
                    x: area.x,
                    y: area.y,
                    width: area.width,
                    height: area.height.saturating_sub(1),
                };
                f.render_widget(SurfaceWidget { surface }, preview_area);

                let status_area = Rect {
                    x: area.x,
                    y: area.y + area.height.saturating_sub(1),
                    width: area.width,
                    height: 1.min(area.height),
                };
                f.render_widget(StatusBar { message: status }, status_area);
            })
            .map_err(display_err)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CameraError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.restore().map_err(display_err)
    }
}

impl CommandSource for TerminalUi {
    fn poll_command(&mut self, timeout: Duration) -> Result<Option<Command>, CameraError> {
        if !event::poll(timeout).map_err(display_err)? {
            return Ok(None);
        }

        match event::read().map_err(display_err)? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                // Raw mode swallows SIGINT, so Ctrl+C arrives as a key
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(Some(Command::Quit));
                }
                match key.code {
                    KeyCode::Char(c) => Ok(self.keys.command_for(c)),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

impl Prompt for TerminalUi {
    fn ask(&mut self, question: &str) -> Result<Option<String>, CameraError> {
        let was_active = self.active;
        if was_active {
            self.restore().map_err(display_err)?;
        }

        let answer = read_line(question);

        if was_active {
            self.resume().map_err(display_err)?;
        }
        answer
    }
}

impl Drop for TerminalUi {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to restore terminal: {}", e);
        }
    }
}

fn read_line(question: &str) -> Result<Option<String>, CameraError> {
    let mut out = stdout();
    write!(out, "{}", question).map_err(display_err)?;
    out.flush().map_err(display_err)?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line).map_err(display_err)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Renders a [`PreviewSurface`] scaled to fit, with tile labels on top.
struct SurfaceWidget<'a> {
    surface: Option<&'a PreviewSurface>,
}

impl Widget for SurfaceWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let Some(surface) = self.surface else {
            let msg = "Waiting for cameras...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            buf.set_string(x, y, msg, Style::default());
            return;
        };

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let aspect = surface.width() as f64 / surface.height() as f64;
        let term_width = area.width as f64;
        let term_height = (area.height as f64) * 2.0;

        let (display_width, display_height) = if term_width / term_height > aspect {
            let h = term_height;
            ((h * aspect) as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            (w as u16, (w / aspect / 2.0) as u16)
        };
        let display_width = display_width.max(1);
        let display_height = display_height.max(1);

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = surface.width() as f64 / display_width as f64;
        let y_scale = surface.height() as f64 / (display_height as f64 * 2.0);

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;
                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(sample(surface, src_x, src_top));
                    cell.set_bg(sample(surface, src_x, src_bottom));
                }
            }
        }

        let label_style = Style::default()
            .fg(Color::White)
            .bg(Color::Black)
            .add_modifier(Modifier::BOLD);
        let rec_style = Style::default()
            .fg(Color::White)
            .bg(Color::Red)
            .add_modifier(Modifier::BOLD);

        for tile in &surface.tiles {
            let tile_x = x_offset + (tile.x as f64 / x_scale) as u16;
            let tile_cells = (tile.width as f64 / x_scale) as u16;
            if tile_x >= area.x + area.width || tile_cells == 0 {
                continue;
            }

            let max = tile_cells.min(area.x + area.width - tile_x) as usize;
            let label: String = tile.label.chars().take(max).collect();
            buf.set_string(tile_x, y_offset, &label, label_style);

            if surface.recording && max > label.chars().count() + 4 {
                let rec_x = tile_x + tile_cells.saturating_sub(4);
                buf.set_string(rec_x, y_offset, "REC", rec_style);
            }
        }
    }
}

fn sample(surface: &PreviewSurface, x: u32, y: u32) -> Color {
    let x = x.min(surface.width().saturating_sub(1));
    let y = y.min(surface.height().saturating_sub(1));
    let [r, g, b] = surface.image.get_pixel(x, y).0;
    Color::Rgb(r, g, b)
}

struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let style = Style::default().fg(Color::Black).bg(Color::Gray);
        let line: String = format!("{:<width$}", self.message, width = area.width as usize)
            .chars()
            .take(area.width as usize)
            .collect();
        buf.set_string(area.x, area.y, line, style);
    }
}
