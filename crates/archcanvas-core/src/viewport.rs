//! Pan/zoom transform between screen and model coordinates.
//!
//! `screen = model * zoom + pan` and `model = (screen - pan) / zoom`. The viewport knows
//! nothing about diagram content; callers pass it the bounds to frame.

use serde::{Deserialize, Serialize};

use crate::layout::Rect;
use crate::Point;

const ZOOM_IN: f64 = 1.1;
const ZOOM_OUT: f64 = 0.9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportLimits {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Fit-to-content never zooms in past this.
    pub fit_cap: f64,
    /// Fit-to-content scales the fitted zoom by this to leave breathing room.
    pub fit_shrink: f64,
}

impl ViewportLimits {
    /// Free, editable canvas.
    pub const fn canvas() -> Self {
        Self {
            min_zoom: 0.08,
            max_zoom: 3.0,
            fit_cap: 1.0,
            fit_shrink: 0.9,
        }
    }

    /// Static layered blueprint view.
    pub const fn blueprint() -> Self {
        Self {
            min_zoom: 0.15,
            max_zoom: 3.0,
            fit_cap: 1.2,
            fit_shrink: 0.85,
        }
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self::canvas()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PanDrag {
    start: Point,
    origin: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub pan: Point,
    pub limits: ViewportLimits,
    drag: Option<PanDrag>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewportLimits::canvas())
    }
}

impl Viewport {
    pub fn new(limits: ViewportLimits) -> Self {
        Self {
            zoom: 1.0,
            pan: Point::default(),
            limits,
            drag: None,
        }
    }

    pub fn screen_to_model(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.pan.x) / self.zoom,
            (screen.y - self.pan.y) / self.zoom,
        )
    }

    pub fn model_to_screen(&self, model: Point) -> Point {
        Point::new(model.x * self.zoom + self.pan.x, model.y * self.zoom + self.pan.y)
    }

    /// Model-space displacement for a screen-space pointer movement.
    pub fn model_delta(&self, from: Point, to: Point) -> Point {
        Point::new((to.x - from.x) / self.zoom, (to.y - from.y) / self.zoom)
    }

    /// Zoom one wheel notch around `cursor`, keeping the model point under it fixed.
    /// Positive `direction` zooms in.
    pub fn zoom_at(&mut self, cursor: Point, direction: f64) {
        let factor = if direction > 0.0 { ZOOM_IN } else { ZOOM_OUT };
        let old = self.zoom;
        let new = self.limits.clamp(old * factor);
        let ratio = new / old;
        self.pan = Point::new(
            cursor.x - (cursor.x - self.pan.x) * ratio,
            cursor.y - (cursor.y - self.pan.y) * ratio,
        );
        self.zoom = new;
    }

    pub fn begin_pan(&mut self, screen: Point) {
        self.drag = Some(PanDrag {
            start: screen,
            origin: self.pan,
        });
    }

    pub fn is_panning(&self) -> bool {
        self.drag.is_some()
    }

    /// Move the pan 1:1 with the pointer since [`begin_pan`](Self::begin_pan).
    /// Returns false when no pan is in progress.
    pub fn pan_to(&mut self, screen: Point) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        self.pan = Point::new(
            drag.origin.x + (screen.x - drag.start.x),
            drag.origin.y + (screen.y - drag.start.y),
        );
        true
    }

    pub fn end_pan(&mut self) {
        self.drag = None;
    }

    /// Abort a pan gesture, restoring the offset it started from.
    pub fn cancel_pan(&mut self) {
        if let Some(drag) = self.drag.take() {
            self.pan = drag.origin;
        }
    }

    /// Frame `content` in a `width × height` viewport and centre it.
    pub fn fit_to(&mut self, content: Rect, width: f64, height: f64) {
        if content.width <= 0.0 || content.height <= 0.0 || width <= 0.0 || height <= 0.0 {
            return;
        }
        let fitted = (width / content.width)
            .min(height / content.height)
            .min(self.limits.fit_cap)
            * self.limits.fit_shrink;
        self.zoom = self.limits.clamp(fitted);
        let c = content.center();
        self.pan = Point::new(width / 2.0 - c.x * self.zoom, height / 2.0 - c.y * self.zoom);
    }
}
