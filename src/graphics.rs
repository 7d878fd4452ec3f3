use crate::color::Color;
use crate::math::edge_function;
use crate::vertex::Vertex;

/// Colour and depth buffers of equal size
#[derive(Clone, Debug)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    color: Vec<Color>,
    depth: Vec<f64>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Framebuffer {
            width,
            height,
            color: vec![Color::BLACK; width * height],
            depth: vec![f64::INFINITY; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            *self = Framebuffer::new(width, height);
        }
    }

    /// Copies a background image and clears depth
    pub fn clear_with(&mut self, background: &[Color]) {
        if background.len() == self.color.len() {
            self.color.copy_from_slice(background);
        } else {
            self.color.fill(Color::BLACK);
        }
        self.depth.fill(f64::INFINITY);
    }

    pub fn get(&self, x: usize, y: usize) -> Color {
        self.color[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, color: Color) {
        self.color[y * self.width + x] = color;
    }

    #[cfg(test)]
    pub fn pixels(&self) -> &[Color] {
        &self.color
    }

    /// Box-filters `source` down into this buffer
    pub fn downsample_from(&mut self, source: &Framebuffer, factor: usize) {
        let factor = factor.max(1);
        let weight = 1.0 / (factor * factor) as f64;
        for y in 0..self.height {
            for x in 0..self.width {
                let mut sum = Color::BLACK;
                for sy in 0..factor {
                    for sx in 0..factor {
                        let (px, py) = (x * factor + sx, y * factor + sy);
                        if px < source.width && py < source.height {
                            sum = sum.add(&source.get(px, py));
                        }
                    }
                }
                self.set(x, y, sum.scale(weight));
            }
        }
    }
}

/// Interpolated surface attributes handed to a shader
pub struct Fragment {
    /// View-space position
    pub position: [f64; 3],
    /// Unit world-space normal
    pub normal: [f64; 3],
}

/// Draws a triangle with per-pixel shading.
///
/// `shade` receives the fragment and the colour already in the buffer and
/// returns the colour to store. Back faces (clockwise on screen) are culled.
pub fn draw_triangle<F>(
    v0: &Vertex,
    v1: &Vertex,
    v2: &Vertex,
    framebuffer: &mut Framebuffer,
    write_depth: bool,
    mut shade: F,
) where
    F: FnMut(&Fragment, Color) -> Color,
{
    let (width, height) = (framebuffer.width, framebuffer.height);
    if width == 0 || height == 0 {
        return;
    }

    // Compute bounding box of the triangle
    let min_x = v0
        .screen_position[0]
        .min(v1.screen_position[0])
        .min(v2.screen_position[0])
        .floor()
        .max(0.0) as usize;
    let max_x = v0
        .screen_position[0]
        .max(v1.screen_position[0])
        .max(v2.screen_position[0])
        .ceil()
        .min(width as f64 - 1.0);
    let min_y = v0
        .screen_position[1]
        .min(v1.screen_position[1])
        .min(v2.screen_position[1])
        .floor()
        .max(0.0) as usize;
    let max_y = v0
        .screen_position[1]
        .max(v1.screen_position[1])
        .max(v2.screen_position[1])
        .ceil()
        .min(height as f64 - 1.0);
    if max_x < 0.0 || max_y < 0.0 {
        return;
    }
    let (max_x, max_y) = (max_x as usize, max_y as usize);

    // Precompute area of the triangle
    let area = edge_function(&v0.screen_position, &v1.screen_position, &v2.screen_position);
    if area <= 0.0 {
        return;
    }

    // For each pixel in the bounding box
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = [x as f64 + 0.5, y as f64 + 0.5];

            let w0 = edge_function(&v1.screen_position, &v2.screen_position, &p);
            let w1 = edge_function(&v2.screen_position, &v0.screen_position, &p);
            let w2 = edge_function(&v0.screen_position, &v1.screen_position, &p);

            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            // Normalize barycentric coordinates
            let w0 = w0 / area;
            let w1 = w1 / area;
            let w2 = w2 / area;

            // Depth test
            let depth = v0.depth * w0 + v1.depth * w1 + v2.depth * w2;
            let offset = y * width + x;
            if depth >= framebuffer.depth[offset] {
                continue;
            }
            if write_depth {
                framebuffer.depth[offset] = depth;
            }

            let interpolate = |a: &[f64; 3], b: &[f64; 3], c: &[f64; 3]| {
                [
                    a[0] * w0 + b[0] * w1 + c[0] * w2,
                    a[1] * w0 + b[1] * w1 + c[1] * w2,
                    a[2] * w0 + b[2] * w1 + c[2] * w2,
                ]
            };
            let position = interpolate(&v0.position, &v1.position, &v2.position);
            let [nx, ny, nz] = interpolate(&v0.normal, &v1.normal, &v2.normal);
            let length = (nx * nx + ny * ny + nz * nz).sqrt().max(1e-12);

            let fragment = Fragment {
                position,
                normal: [nx / length, ny / length, nz / length],
            };
            framebuffer.color[offset] = shade(&fragment, framebuffer.color[offset]);
        }
    }
}

/// Draws a soft round sprite with additive blending; depth tested, never written
pub fn draw_point(
    center: [f64; 2],
    depth: f64,
    radius: f64,
    color: Color,
    framebuffer: &mut Framebuffer,
) {
    let (width, height) = (framebuffer.width as f64, framebuffer.height as f64);
    let radius = radius.max(0.5);
    if center[0] + radius < 0.0
        || center[1] + radius < 0.0
        || center[0] - radius >= width
        || center[1] - radius >= height
    {
        return;
    }

    let min_x = (center[0] - radius).floor().max(0.0) as usize;
    let max_x = (center[0] + radius).ceil().min(width - 1.0) as usize;
    let min_y = (center[1] - radius).floor().max(0.0) as usize;
    let max_y = (center[1] + radius).ceil().min(height - 1.0) as usize;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f64 + 0.5 - center[0];
            let dy = y as f64 + 0.5 - center[1];
            let falloff = 1.0 - (dx * dx + dy * dy) / (radius * radius);
            if falloff <= 0.0 {
                continue;
            }
            let offset = y * framebuffer.width + x;
            if depth >= framebuffer.depth[offset] {
                continue;
            }
            framebuffer.color[offset] = framebuffer.color[offset].add(&color.scale(falloff));
        }
    }
}
