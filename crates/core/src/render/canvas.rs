//! Software RGBA drawing surface with a scoped affine transform.

use std::ops::{Deref, DerefMut};

use image::{imageops, Rgba, RgbaImage};

/// Row-major 2D affine transform `[a c e; b d f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Post-multiplies by a translation, like a canvas `translate`.
    pub fn translate(self, tx: f64, ty: f64) -> Self {
        Self {
            e: self.a * tx + self.c * ty + self.e,
            f: self.b * tx + self.d * ty + self.f,
            ..self
        }
    }

    /// Post-multiplies by a rotation about the current origin.
    pub fn rotate(self, radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: self.a * cos + self.c * sin,
            b: self.b * cos + self.d * sin,
            c: self.c * cos - self.a * sin,
            d: self.d * cos - self.b * sin,
            ..self
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Self {
            a,
            b,
            c,
            d,
            e: -(a * self.e + c * self.f),
            f: -(b * self.e + d * self.f),
        })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Drawing surface owned by the render loop.
#[derive(Debug)]
pub struct Canvas {
    pixels: RgbaImage,
    transform: Transform,
    saved: Vec<Transform>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            transform: Transform::IDENTITY,
            saved: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Reallocates the backing buffer and resets the transform.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
        self.transform = Transform::IDENTITY;
        self.saved.clear();
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Pushes the current transform. It is restored when the guard drops,
    /// including on early return.
    pub fn save(&mut self) -> CanvasState<'_> {
        self.saved.push(self.transform);
        CanvasState { canvas: self }
    }

    pub fn translate(&mut self, tx: f64, ty: f64) {
        self.transform = self.transform.translate(tx, ty);
    }

    pub fn rotate(&mut self, radians: f64) {
        self.transform = self.transform.rotate(radians);
    }

    /// Copies a raw video frame onto the whole canvas, ignoring the
    /// transform.
    pub fn draw_frame(&mut self, frame: &RgbaImage) {
        if frame.dimensions() == self.pixels.dimensions() {
            self.pixels.copy_from_slice(frame.as_raw());
        } else {
            self.pixels = imageops::resize(
                frame,
                self.width(),
                self.height(),
                imageops::FilterType::Triangle,
            );
        }
    }

    /// Draws `image` into the rectangle `(x, y, width, height)` expressed in
    /// the current transformed space, alpha blending source-over.
    pub fn draw_image(&mut self, image: &RgbaImage, x: f64, y: f64, width: f64, height: f64) {
        if width <= 0.0 || height <= 0.0 || image.width() == 0 || image.height() == 0 {
            return;
        }
        let Some(inverse) = self.transform.inverse() else {
            return;
        };

        let corners = [
            self.transform.apply(x, y),
            self.transform.apply(x + width, y),
            self.transform.apply(x, y + height),
            self.transform.apply(x + width, y + height),
        ];
        let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().min(f64::from(self.width()))).max(0.0) as u32;
        let y1 = (max_y.ceil().min(f64::from(self.height()))).max(0.0) as u32;

        let sx = f64::from(image.width()) / width;
        let sy = f64::from(image.height()) / height;

        for py in y0..y1 {
            for px in x0..x1 {
                let (lx, ly) = inverse.apply(f64::from(px) + 0.5, f64::from(py) + 0.5);
                let u = (lx - x) * sx;
                let v = (ly - y) * sy;
                if u < 0.0 || v < 0.0 {
                    continue;
                }
                let (u, v) = (u as u32, v as u32);
                if u >= image.width() || v >= image.height() {
                    continue;
                }
                blend(self.pixels.get_pixel_mut(px, py), *image.get_pixel(u, v));
            }
        }
    }

    /// Fills a square marker centred on `(x, y)` in canvas space.
    pub fn fill_marker(&mut self, x: f64, y: f64, radius: u32, color: Rgba<u8>) {
        let r = f64::from(radius);
        let x0 = (x - r).floor().max(0.0) as u32;
        let y0 = (y - r).floor().max(0.0) as u32;
        let x1 = ((x + r).ceil().min(f64::from(self.width()))).max(0.0) as u32;
        let y1 = ((y + r).ceil().min(f64::from(self.height()))).max(0.0) as u32;
        for py in y0..y1 {
            for px in x0..x1 {
                blend(self.pixels.get_pixel_mut(px, py), color);
            }
        }
    }
}

fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let alpha = u32::from(src[3]);
    if alpha == 0 {
        return;
    }
    if alpha == 255 {
        *dst = src;
        return;
    }
    let inv = 255 - alpha;
    for channel in 0..3 {
        let mixed = u32::from(src[channel]) * alpha + u32::from(dst[channel]) * inv;
        dst[channel] = (mixed / 255) as u8;
    }
    dst[3] = (alpha + u32::from(dst[3]) * inv / 255).min(255) as u8;
}

/// Scope guard returned by [`Canvas::save`].
pub struct CanvasState<'a> {
    canvas: &'a mut Canvas,
}

impl Deref for CanvasState<'_> {
    type Target = Canvas;

    fn deref(&self) -> &Canvas {
        self.canvas
    }
}

impl DerefMut for CanvasState<'_> {
    fn deref_mut(&mut self) -> &mut Canvas {
        self.canvas
    }
}

impl Drop for CanvasState<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.canvas.saved.pop() {
            self.canvas.transform = previous;
        }
    }
}
