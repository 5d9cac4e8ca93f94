//! egui surface for the overlay.
//!
//! [`CanOverlayWidget`] paints a [`Snapshot`] into the bottom-right quarter of the
//! screen on the foreground layer, so it sits above whatever the host UI draws.
//! Rows that do not fit the box are not drawn; the header count still reports every
//! frame held. [`OverlayApp`] is a minimal `eframe` host that ticks an overlay once
//! per frame.

use crate::frame::FrameStyle;
use crate::overlay::CanOverlay;
use crate::params::FlagSource;
use crate::presentation::{Snapshot, COLUMN_HEADER, HEADER};
use crate::transport::Transport;
use egui::{Align2, Color32, FontId, Id, LayerId, Order, Painter, Pos2, Rect, Stroke};
use std::time::{Duration, Instant};

const PADDING: f32 = 10.0;
const FONT_SIZE: f32 = 22.0;
const LINE_HEIGHT: f32 = 26.0;
const ROW_HEIGHT: f32 = LINE_HEIGHT - 4.0;
const OVERLAY_ALPHA: u8 = 128;

/// Colours used by the widget.
#[derive(Debug, Clone, Copy)]
pub struct OverlayPalette {
    /// Box fill.
    pub background: Color32,
    /// Box outline.
    pub border: Color32,
    /// Title and column header.
    pub header: Color32,
    /// Rows within the timeout.
    pub fresh: Color32,
    /// Rows past the timeout, and the message count.
    pub stale: Color32,
    /// Rows flagged invalid.
    pub invalid: Color32,
}

impl Default for OverlayPalette {
    fn default() -> Self {
        Self {
            background: Color32::from_black_alpha(OVERLAY_ALPHA),
            border: Color32::from_rgba_unmultiplied(100, 100, 100, OVERLAY_ALPHA),
            header: Color32::from_rgb(100, 200, 255),
            fresh: Color32::WHITE,
            stale: Color32::from_rgb(150, 150, 150),
            invalid: Color32::from_rgb(255, 100, 100),
        }
    }
}

impl OverlayPalette {
    /// Colour for a row drawn with `style`.
    pub fn row_color(&self, style: FrameStyle) -> Color32 {
        match style {
            FrameStyle::Fresh => self.fresh,
            FrameStyle::Stale => self.stale,
            FrameStyle::Invalid => self.invalid,
        }
    }
}

/// Box the overlay occupies inside `screen`.
pub fn overlay_rect(screen: Rect) -> Rect {
    let size = screen.size() / 4.0;
    let min = Pos2::new(
        screen.right() - size.x - PADDING,
        screen.bottom() - size.y - PADDING,
    );
    Rect::from_min_size(min, size)
}

/// Paints one [`Snapshot`].
pub struct CanOverlayWidget<'a> {
    snapshot: &'a Snapshot,
    palette: OverlayPalette,
}

impl<'a> CanOverlayWidget<'a> {
    /// Widget for `snapshot` with the default palette.
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            palette: OverlayPalette::default(),
        }
    }

    /// Replaces the palette.
    pub fn with_palette(mut self, palette: OverlayPalette) -> Self {
        self.palette = palette;
        self
    }

    /// Paints onto the foreground layer. Returns the number of rows drawn.
    pub fn show(&self, ctx: &egui::Context) -> usize {
        let painter = ctx.layer_painter(LayerId::new(Order::Foreground, Id::new("can_overlay")));
        self.paint(&painter, overlay_rect(ctx.screen_rect()))
    }

    /// Paints into `rect`. Returns the number of rows drawn.
    pub fn paint(&self, painter: &Painter, rect: Rect) -> usize {
        let palette = &self.palette;
        painter.rect_filled(rect, 0.0, palette.background);
        painter.rect_stroke(rect, 0.0, Stroke::new(1.0, palette.border));

        let left = rect.left() + PADDING;
        let header_y = rect.top() + PADDING;
        painter.text(
            Pos2::new(left, header_y),
            Align2::LEFT_TOP,
            HEADER,
            FontId::proportional(FONT_SIZE),
            palette.header,
        );
        painter.text(
            Pos2::new(rect.right() - PADDING, header_y),
            Align2::RIGHT_TOP,
            self.snapshot.count_label(),
            FontId::proportional(FONT_SIZE - 4.0),
            palette.stale,
        );

        let column_y = header_y + LINE_HEIGHT;
        painter.text(
            Pos2::new(left, column_y),
            Align2::LEFT_TOP,
            COLUMN_HEADER,
            FontId::monospace(FONT_SIZE - 2.0),
            palette.header,
        );

        let max_y = rect.bottom() - PADDING;
        let mut y = column_y + LINE_HEIGHT;
        let mut drawn = 0;
        for row in &self.snapshot.rows {
            if y >= max_y {
                break;
            }
            painter.text(
                Pos2::new(left, y),
                Align2::LEFT_TOP,
                row.line(),
                FontId::monospace(FONT_SIZE - 2.0),
                palette.row_color(row.style),
            );
            y += ROW_HEIGHT;
            drawn += 1;
        }
        drawn
    }
}

/// `eframe` host: ticks the overlay every frame and paints it while active.
pub struct OverlayApp<F, T: Transport> {
    overlay: CanOverlay<F, T>,
    repaint_after: Duration,
    last_snapshot: Snapshot,
}

impl<F: FlagSource, T: Transport> OverlayApp<F, T> {
    /// Hosts `overlay`, asking egui to repaint at least every `repaint_after`.
    pub fn new(overlay: CanOverlay<F, T>, repaint_after: Duration) -> Self {
        Self {
            overlay,
            repaint_after,
            last_snapshot: Snapshot::default(),
        }
    }

    /// Ticks the overlay and paints it. Draws nothing while the gate is idle.
    pub fn frame(&mut self, ctx: &egui::Context, now: Instant) -> usize {
        self.last_snapshot = self.overlay.tick(now).snapshot;
        if !self.overlay.is_active() {
            return 0;
        }
        CanOverlayWidget::new(&self.last_snapshot).show(ctx)
    }

    /// The hosted overlay.
    pub fn overlay(&self) -> &CanOverlay<F, T> {
        &self.overlay
    }
}

impl<F: FlagSource, T: Transport> eframe::App for OverlayApp<F, T> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let state = if self.overlay.is_active() {
                "active"
            } else {
                "idle"
            };
            ui.label(format!("CAN overlay {state}"));
        });
        self.frame(ctx, Instant::now());
        ctx.request_repaint_after(self.repaint_after);
    }
}
