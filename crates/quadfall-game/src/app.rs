//! The game application: tick logic and the two render passes.

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};

use quadfall_engine::core::{App, AppControl, FrameCtx};
use quadfall_engine::input::{InputState, Key};
use quadfall_engine::render::{
    PrimitiveMode, QuadBatch, RenderCtx, RenderTarget, Renderer, ShaderId, Texture2d, Vertex,
    Viewport,
};
use quadfall_engine::time::Ticker;
use rand::Rng;

use crate::board::{BOARD_WIDTH, Board, CELL_SIZE, CellKind, VISIBLE_HEIGHT};
use crate::piece::{ActivePiece, PieceKind};

/// Simulation rate.
const TICKS_PER_SECOND: f32 = 20.0;

/// The piece auto-falls once the fall counter passes this many ticks
/// (i.e. every 9th tick).
const FALL_INTERVAL_TICKS: u32 = 8;

const CLEAR_COLOR: wgpu::Color = wgpu::Color::BLACK;

/// The game. GPU-side state lives in [`Gfx`], created lazily on the first
/// frame (the device does not exist before the runtime opens the window).
pub struct Game {
    board: Board,
    piece: ActivePiece,
    fall_ticker: u32,
    ticker: Ticker,
    gfx: Option<Gfx>,
}

impl Game {
    pub fn new() -> Self {
        let mut game = Self {
            board: Board::new(),
            piece: ActivePiece::new(),
            fall_ticker: 0,
            ticker: Ticker::new(TICKS_PER_SECOND),
            gfx: None,
        };
        game.spawn_piece();
        game
    }

    fn spawn_piece(&mut self) {
        let index = rand::thread_rng().gen_range(0..PieceKind::COUNT);
        self.piece.reset(PieceKind::from_index(index));
    }

    /// One simulation tick.
    ///
    /// An auto-fall tick consumes the whole tick; input and grounding are
    /// only handled on the ticks in between.
    fn tick(&mut self, input: &InputState) {
        self.fall_ticker += 1;
        if self.fall_ticker > FALL_INTERVAL_TICKS {
            self.piece.move_down(&self.board);
            self.fall_ticker = 0;
            return;
        }

        if input.is_held(Key::ArrowLeft) {
            self.piece.move_left(&self.board);
        }
        if input.is_held(Key::ArrowRight) {
            self.piece.move_right(&self.board);
        }
        if input.is_held(Key::ArrowDown) {
            self.piece.move_down(&self.board);
        }

        if self.piece.is_on_ground(&self.board) {
            self.piece.lock_into(&mut self.board);
            self.spawn_piece();
        }
    }

    fn ensure_gfx(&mut self, ctx: &FrameCtx<'_, '_>) -> Result<()> {
        if self.gfx.is_some() {
            return Ok(());
        }

        let size = ctx.gpu.size();
        let rctx = RenderCtx::new(
            ctx.gpu.device(),
            ctx.gpu.queue(),
            ctx.gpu.surface_format(),
            Viewport::new(size.width.max(1) as f32, size.height.max(1) as f32),
        );

        self.gfx = Some(Gfx::new(&rctx)?);
        Ok(())
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl App for Game {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        // Startup resource failures are fatal; there is no degraded mode.
        if let Err(e) = self.ensure_gfx(ctx) {
            log::error!("renderer initialization failed: {e:#}");
            return AppControl::Exit;
        }

        for &key in ctx.input_frame.pressed() {
            if key == Key::Space {
                self.piece.drop_down(&self.board);
            }
        }

        let ticks = self.ticker.advance(ctx.time.dt);
        for _ in 0..ticks {
            self.tick(ctx.input);
        }

        let board = &self.board;
        let piece = &self.piece;
        let Some(gfx) = self.gfx.as_mut() else {
            return AppControl::Exit;
        };

        ctx.render(CLEAR_COLOR, |rctx, target| {
            gfx.apply_viewport(rctx.viewport);
            gfx.render_board(rctx, target, board, piece);
            gfx.render_border(rctx, target);
        })
    }
}

/// GPU-side game state: the render orchestrator and the cell texture.
struct Gfx {
    renderer: Renderer,
    cell_texture: Texture2d,
    viewport: Option<Viewport>,
}

impl Gfx {
    fn new(rctx: &RenderCtx<'_>) -> Result<Self> {
        let renderer = Renderer::new(rctx)?;

        let layout = renderer
            .shader(ShaderId::PosColorTex)
            .texture_layout()
            .context("pos_color_tex does not sample a texture")?;
        let cell_texture =
            Texture2d::from_png(rctx, layout, "cell", include_bytes!("../assets/cell.png"))?;

        Ok(Self {
            renderer,
            cell_texture,
            viewport: None,
        })
    }

    /// Recomputes the orthographic projection when the drawable size changes.
    ///
    /// Bottom-left origin, y-up, one unit per pixel; z=0 lands mid-range.
    fn apply_viewport(&mut self, viewport: Viewport) {
        if self.viewport == Some(viewport) {
            return;
        }
        self.viewport = Some(viewport);
        self.renderer.projection.load(Mat4::orthographic_rh(
            0.0,
            viewport.width,
            0.0,
            viewport.height,
            -1.0,
            1.0,
        ));
    }

    /// Model-view translation centering the visible board in the viewport.
    fn scene_translation(viewport: Viewport) -> Mat4 {
        Mat4::from_translation(Vec3::new(
            (viewport.width - BOARD_WIDTH as f32 * CELL_SIZE) * 0.5,
            (viewport.height - VISIBLE_HEIGHT as f32 * CELL_SIZE) * 0.5,
            0.0,
        ))
    }

    /// Stages and uploads the matrices for the bound shader.
    fn setup_pass(&mut self, rctx: &RenderCtx<'_>) {
        let renderer = &mut self.renderer;
        renderer.model_view.push();
        renderer.model_view.load(Self::scene_translation(rctx.viewport));
        renderer.setup_matrices();
        renderer.model_view.pop();
        renderer.upload_uniforms(rctx);
    }

    /// The textured pass: settled cells plus the active piece.
    fn render_board(
        &mut self,
        rctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        board: &Board,
        piece: &ActivePiece,
    ) {
        self.renderer.use_shader(Some(ShaderId::PosColorTex));
        self.setup_pass(rctx);

        let batch = self.renderer.batch();
        batch.begin();
        for y in 0..VISIBLE_HEIGHT as i32 {
            for x in 0..BOARD_WIDTH as i32 {
                emit_cell(batch, x, y, board.get(x, y));
            }
        }
        for (position, kind) in piece.cells() {
            emit_cell(batch, position.x, position.y, kind);
        }

        self.renderer.flush(
            rctx,
            target,
            Some(&self.cell_texture),
            PrimitiveMode::Triangles,
        );
        self.renderer.use_shader(None);
    }

    /// The flat-colored pass: a 1px white outline around the visible board.
    fn render_border(&mut self, rctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        self.renderer.use_shader(Some(ShaderId::PosColor));
        self.setup_pass(rctx);

        let x0 = -1.0;
        let y0 = -1.0;
        let x1 = BOARD_WIDTH as f32 * CELL_SIZE + 1.0;
        let y1 = VISIBLE_HEIGHT as f32 * CELL_SIZE + 1.0;

        let batch = self.renderer.batch();
        batch.begin();
        // Closed loop: the strip returns to its first vertex.
        batch.indices(&[0, 1, 2, 3, 0]);
        batch.emit(Vertex::at(x0, y1).rgb(0xffffff));
        batch.emit(Vertex::at(x0, y0).rgb(0xffffff));
        batch.emit(Vertex::at(x1, y0).rgb(0xffffff));
        batch.emit(Vertex::at(x1, y1).rgb(0xffffff));

        self.renderer.flush(rctx, target, None, PrimitiveMode::LineStrip);
        self.renderer.use_shader(None);
    }
}

/// Emits one board cell as a textured quad. `Empty` cells emit nothing.
fn emit_cell(batch: &mut QuadBatch, x: i32, y: i32, kind: CellKind) {
    if kind == CellKind::Empty {
        return;
    }

    let x0 = x as f32 * CELL_SIZE;
    let y0 = y as f32 * CELL_SIZE;
    let x1 = (x + 1) as f32 * CELL_SIZE;
    let y1 = (y + 1) as f32 * CELL_SIZE;
    let color = kind.rgb();

    batch.indices(&[0, 1, 2, 2, 3, 0]);
    batch.emit(Vertex::at(x0, y1).uv(0.0, 0.0).rgb(color));
    batch.emit(Vertex::at(x0, y0).uv(0.0, 1.0).rgb(color));
    batch.emit(Vertex::at(x1, y0).uv(1.0, 1.0).rgb(color));
    batch.emit(Vertex::at(x1, y1).uv(1.0, 0.0).rgb(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_piece_y(game: &Game) -> i32 {
        game.piece.cells().map(|(p, _)| p.y).min().expect("occupied")
    }

    // ── tick cadence ──────────────────────────────────────────────────────

    #[test]
    fn piece_auto_falls_every_ninth_tick() {
        let mut game = Game::new();
        let idle = InputState::default();
        let start = min_piece_y(&game);

        for _ in 0..8 {
            game.tick(&idle);
        }
        assert_eq!(min_piece_y(&game), start);

        game.tick(&idle);
        assert_eq!(min_piece_y(&game), start - 1);
    }

    #[test]
    fn grounded_piece_locks_and_respawns() {
        let mut game = Game::new();
        let idle = InputState::default();

        game.piece.drop_down(&game.board);
        game.tick(&idle);

        // The locked cells are in the board and a fresh piece is airborne.
        let occupied = (0..VISIBLE_HEIGHT as i32)
            .flat_map(|y| (0..BOARD_WIDTH as i32).map(move |x| (x, y)))
            .filter(|&(x, y)| game.board.get(x, y) != CellKind::Empty)
            .count();
        assert_eq!(occupied, 4);
        assert!(!game.piece.is_on_ground(&game.board));
    }

    // ── cell tessellation ─────────────────────────────────────────────────

    #[test]
    fn one_cell_is_one_quad() {
        let mut batch = QuadBatch::new();
        batch.begin();
        emit_cell(&mut batch, 0, 0, CellKind::Red);

        // Two triangles over four unique vertices.
        assert_eq!(batch.index_count(), 6);
        assert_eq!(batch.vertex_count(), 4);
        assert_eq!(batch.index_data(), &[0, 1, 2, 2, 3, 0]);

        // Vertex 0 is the cell's top-left corner: (0·16, 1·16).
        let bytes = batch.vertex_bytes();
        assert_eq!(&bytes[0..4], &0.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &16.0f32.to_le_bytes());
        // Red, opaque.
        assert_eq!(&bytes[16..20], &[0xff, 0x00, 0x00, 0xff]);
    }

    #[test]
    fn empty_cells_emit_nothing() {
        let mut batch = QuadBatch::new();
        batch.begin();
        emit_cell(&mut batch, 3, 3, CellKind::Empty);
        assert_eq!(batch.vertex_count(), 0);
        assert_eq!(batch.index_count(), 0);
    }

    #[test]
    fn adjacent_cells_share_no_indices() {
        let mut batch = QuadBatch::new();
        batch.begin();
        emit_cell(&mut batch, 0, 0, CellKind::Cyan);
        emit_cell(&mut batch, 1, 0, CellKind::Yellow);

        assert_eq!(batch.vertex_count(), 8);
        assert_eq!(
            batch.index_data(),
            &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]
        );
    }
}
