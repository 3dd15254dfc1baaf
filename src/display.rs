use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;

/// bytes needed to hold the whole screen at one bit per pixel
pub const SCREEN_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT / 8;

/// Display is used by the interpreter to draw things on the screen. It should
/// abstract the implementation details, so a variety of kinds of screen would
/// work.
pub trait Display {
    /// draw a snapshot of the framebuffer
    fn render(&mut self, frame: &Framebuffer) -> Result<(), io::Error>;

    /// false once the screen has gone away and the interpreter should stop
    fn is_alive(&self) -> bool {
        true
    }
}

/// 64x32 monochrome screen; each cell is toggled by sprite draws
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Framebuffer {
    cells: [[bool; SCREEN_WIDTH]; SCREEN_HEIGHT],
}

impl Default for Framebuffer {
    fn default() -> Self {
        Framebuffer {
            cells: [[false; SCREEN_WIDTH]; SCREEN_HEIGHT],
        }
    }
}

/// position along one axis, or None when it falls off the screen
fn clip(origin: u8, offset: usize, limit: usize) -> Option<usize> {
    let pos = origin as usize + offset;
    (pos < limit).then_some(pos)
}

impl Framebuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.cells = [[false; SCREEN_WIDTH]; SCREEN_HEIGHT];
    }

    /// pixel at (x, y); anything off screen reads as unlit
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(false)
    }

    /// XOR a sprite onto the screen, one byte per row, MSB leftmost.
    ///
    /// Pixels past the right edge and rows past the bottom edge are dropped;
    /// the rest of the sprite is still drawn. Returns true when any lit pixel
    /// got switched off.
    pub fn draw_sprite(&mut self, x: u8, y: u8, rows: &[u8]) -> bool {
        let mut collision = false;
        for (dy, &data) in rows.iter().enumerate() {
            let py = match clip(y, dy, SCREEN_HEIGHT) {
                Some(py) => py,
                None => continue,
            };
            for dx in 0..8 {
                if data & (0x80 >> dx) == 0 {
                    continue;
                }
                if let Some(px) = clip(x, dx, SCREEN_WIDTH) {
                    let cell = &mut self.cells[py][px];
                    collision |= *cell;
                    *cell = !*cell;
                }
            }
        }
        collision
    }

    /// pack the screen into a row-major bitplane, MSB first
    pub fn to_bytes(&self) -> [u8; SCREEN_BYTES] {
        let mut bytes = [0u8; SCREEN_BYTES];
        for (y, row) in self.cells.iter().enumerate() {
            for (x, &lit) in row.iter().enumerate() {
                if lit {
                    let n = y * SCREEN_WIDTH + x;
                    bytes[n / 8] |= 0x80 >> (n % 8);
                }
            }
        }
        bytes
    }

    pub fn lit_pixels(&self) -> usize {
        self.cells.iter().flatten().filter(|&&lit| lit).count()
    }
}

// store useful metadata about the terminal
struct Resolution(usize, usize);

impl Resolution {
    fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    fn bitplane_from_data<'a>(
        &self,
        data: &'a [u8],
        bitplane: u8,
    ) -> impl std::iter::Iterator<Item = (f64, f64)> + 'a {
        let mut count = self.pixel_count();
        let w = self.0;
        std::iter::from_fn(move || {
            while count > 0 {
                count -= 1;
                let bit = 1 & (data[count / 8] >> (7 - count % 8));
                if bit == bitplane {
                    return Some((
                        (count % w) as f64,        // x
                        -1.0 * (count / w) as f64, // y
                    ));
                }
            }
            None
        })
    }
}

/// monochrome display in a terminal, rendered using TUI and Crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    resolution: Resolution,
}

impl MonoTermDisplay {
    pub fn new() -> Result<MonoTermDisplay, io::Error> {
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(MonoTermDisplay {
            terminal,
            resolution: Resolution(SCREEN_WIDTH, SCREEN_HEIGHT),
        })
    }

    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        let resolution = &self.resolution;
        // for now this assumes a 1:1 ratio between terminal, chip8 and the
        // internal TUI canvas
        self.terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + resolution.0 as u16, 2 + resolution.1 as u16);

            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("CHIP-8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &resolution.bitplane_from_data(data, 0).collect::<Vec<_>>(),
                        color: Color::Black,
                    });
                    ctx.draw(&Points {
                        coords: &resolution.bitplane_from_data(data, 1).collect::<Vec<_>>(),
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

impl Display for MonoTermDisplay {
    fn render(&mut self, frame: &Framebuffer) -> Result<(), io::Error> {
        self.draw(&frame.to_bytes())
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.show_cursor() {
            log::warn!("can't restore terminal cursor: {}", e);
        }
    }
}

/// useful for testing non-display routines; counts frames and keeps the last
#[derive(Default)]
pub struct DummyDisplay {
    pub frames: usize,
    pub last: Option<Framebuffer>,
}

impl DummyDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Display for DummyDisplay {
    fn render(&mut self, frame: &Framebuffer) -> Result<(), io::Error> {
        self.frames += 1;
        self.last = Some(frame.clone());
        Ok(())
    }
}
