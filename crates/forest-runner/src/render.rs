//! Frame output for the running forest.

use anyhow::Result;
use forest_core::{RenderMode, Stage};
use forest_world::EcosystemSnapshot;
use std::io::{self, Write};

/// Draws one frame per tick
pub trait Renderer {
    fn render(&mut self, snapshot: &EcosystemSnapshot) -> Result<()>;
}

/// Build the renderer selected in the runner configuration
pub fn renderer_for(mode: RenderMode) -> Box<dyn Renderer> {
    match mode {
        RenderMode::Text => Box::new(TextRenderer::stdout()),
        RenderMode::Json => Box::new(JsonRenderer::new(io::stdout())),
        RenderMode::None => Box::new(NullRenderer),
    }
}

/// Glyph and draw priority for a stage. Higher priority wins a shared cell.
fn glyph(stage: Stage) -> (u8, char) {
    match stage {
        Stage::Bear => (5, 'B'),
        Stage::Lumberjack => (4, 'L'),
        Stage::Elder => (3, 'E'),
        Stage::Tree => (2, 'T'),
        Stage::Sapling => (1, 's'),
    }
}

/// ASCII map of the grid followed by a status line
pub struct TextRenderer<W: Write> {
    out: W,
    clear_screen: bool,
}

impl TextRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), true)
    }
}

impl<W: Write> TextRenderer<W> {
    /// `clear_screen` redraws in place on an ANSI terminal
    pub fn new(out: W, clear_screen: bool) -> Self {
        Self { out, clear_screen }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(snapshot: &EcosystemSnapshot) -> String {
        let rows = snapshot.grid.rows.max(0) as usize;
        let cols = snapshot.grid.cols.max(0) as usize;
        let mut cells = vec![(0u8, '.'); rows * cols];

        for occupant in &snapshot.grid.occupants {
            let pos = occupant.position;
            if pos.row < 0 || pos.col < 0 || pos.row as usize >= rows || pos.col as usize >= cols {
                continue;
            }
            let slot = &mut cells[pos.row as usize * cols + pos.col as usize];
            let candidate = glyph(occupant.stage);
            if candidate.0 > slot.0 {
                *slot = candidate;
            }
        }

        let mut frame = String::with_capacity(rows * (cols + 1) + 128);
        for row in cells.chunks(cols.max(1)).take(rows) {
            frame.extend(row.iter().map(|(_, c)| *c));
            frame.push('\n');
        }

        let stats = &snapshot.stats;
        let pops = &snapshot.populations;
        frame.push_str(&format!(
            "year {} month {} | trees {} lumberjacks {} bears {} | lumber {} ({} total) | mauls {} ({} total)\n",
            snapshot.year,
            snapshot.time % forest_world::TICKS_PER_YEAR,
            pops.tree,
            pops.lumberjack,
            pops.bear,
            stats.lumber.year,
            stats.lumber.total,
            stats.maul.year,
            stats.maul.total,
        ));
        frame
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, snapshot: &EcosystemSnapshot) -> Result<()> {
        if self.clear_screen {
            write!(self.out, "\x1b[2J\x1b[H")?;
        }
        self.out.write_all(Self::draw(snapshot).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// One JSON document per line
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn render(&mut self, snapshot: &EcosystemSnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.out, snapshot)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Discards every frame
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _snapshot: &EcosystemSnapshot) -> Result<()> {
        Ok(())
    }
}
