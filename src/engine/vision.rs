//! Image analysis workload
//!
//! Each unit paints a random scene into a reused RGBA canvas and runs five
//! analyses over it: colour classification, face-like region detection,
//! text line detection, rectangle edge detection and a saliency map.

use rand::rngs::SmallRng;
use rand::Rng;

use super::{record_failure, EngineError, WorkloadEngine};
use crate::models::{Detection, EngineKind, StatsRecorder};

pub const DEFAULT_SIZE: usize = 224;
pub const DEFAULT_COMPLEXITY: usize = 3;

/// Cell edge used by the face detector
const CELL: usize = 16;
/// Minimum run of strong vertical gradient counted as a rectangle edge
const EDGE_RUN: usize = 12;

type Rgb = [u8; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Analysis {
    Classify,
    Faces,
    Text,
    Rectangles,
    Saliency,
}

impl Analysis {
    const ALL: [Analysis; 5] = [
        Analysis::Classify,
        Analysis::Faces,
        Analysis::Text,
        Analysis::Rectangles,
        Analysis::Saliency,
    ];

    fn detection(self) -> Option<Detection> {
        match self {
            Analysis::Classify => Some(Detection::Classification),
            Analysis::Faces => Some(Detection::Face),
            Analysis::Text => Some(Detection::TextRegion),
            Analysis::Rectangles | Analysis::Saliency => None,
        }
    }
}

pub struct ImageAnalysisEngine {
    rng: SmallRng,
    width: usize,
    height: usize,
    complexity: usize,
    canvas: Vec<u8>,
    luma: Vec<f32>,
    saliency: Vec<f32>,
}

impl ImageAnalysisEngine {
    pub fn new(rng: SmallRng) -> Self {
        Self::with_size(rng, DEFAULT_SIZE, DEFAULT_SIZE, DEFAULT_COMPLEXITY)
    }

    pub fn with_size(rng: SmallRng, width: usize, height: usize, complexity: usize) -> Self {
        let pixels = width * height;
        Self {
            rng,
            width,
            height,
            complexity,
            canvas: vec![0; pixels * 4],
            luma: vec![0.0; pixels],
            saliency: vec![0.0; pixels],
        }
    }

    /// Paint shapes and text-like bars, then refresh the luma plane
    fn synthesize_scene(&mut self) -> Result<(), EngineError> {
        if self.width < 8 || self.height < 8 {
            return Err(EngineError::EmptyInput(format!(
                "{}x{} canvas is too small",
                self.width, self.height
            )));
        }

        let background = self.rng.gen_range(160..=255u8);
        for px in self.canvas.chunks_exact_mut(4) {
            px.copy_from_slice(&[background, background, background, 255]);
        }

        let (w, h) = (self.width, self.height);
        for _ in 0..20 + self.complexity * 10 {
            let color: Rgb = self.rng.gen();
            let x = self.rng.gen_range(0..w);
            let y = self.rng.gen_range(0..h);
            let sw = self.rng.gen_range(4..=(w / 4).max(5));
            let sh = self.rng.gen_range(4..=(h / 4).max(5));
            match self.rng.gen_range(0..4) {
                0 => self.fill_rect(x, y, sw, sh, color),
                1 => self.fill_ellipse(x, y, sw, sh, color),
                2 => self.draw_line(x, y, x + sw, y + sh, color),
                _ => self.fill_triangle(x, y, sw, sh, color),
            }
        }

        // Dark bars laid out like words on a line
        for _ in 0..self.complexity * 2 {
            let glyph_h = self.rng.gen_range(3..=8usize);
            let mut x = self.rng.gen_range(0..w.saturating_sub(60).max(1));
            let y = self.rng.gen_range(0..h.saturating_sub(glyph_h).max(1));
            for _ in 0..self.rng.gen_range(3..=8) {
                let glyph_w = self.rng.gen_range(2..=5usize);
                self.fill_rect(x, y, glyph_w, glyph_h, [10, 10, 10]);
                x += glyph_w + 2;
            }
        }

        for (l, px) in self.luma.iter_mut().zip(self.canvas.chunks_exact(4)) {
            *l = (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32) / 255.0;
        }
        Ok(())
    }

    fn put(&mut self, x: usize, y: usize, color: Rgb) {
        if x < self.width && y < self.height {
            let offset = (y * self.width + x) * 4;
            self.canvas[offset..offset + 3].copy_from_slice(&color);
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: Rgb) {
        for yy in y..(y + h).min(self.height) {
            for xx in x..(x + w).min(self.width) {
                self.put(xx, yy, color);
            }
        }
    }

    fn fill_ellipse(&mut self, x: usize, y: usize, w: usize, h: usize, color: Rgb) {
        let (rx, ry) = (w as f32 / 2.0, h as f32 / 2.0);
        let (cx, cy) = (x as f32 + rx, y as f32 + ry);
        for yy in y..(y + h).min(self.height) {
            for xx in x..(x + w).min(self.width) {
                let dx = (xx as f32 + 0.5 - cx) / rx;
                let dy = (yy as f32 + 0.5 - cy) / ry;
                if dx * dx + dy * dy <= 1.0 {
                    self.put(xx, yy, color);
                }
            }
        }
    }

    fn draw_line(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, color: Rgb) {
        let steps = (x1 - x0).max(y1 - y0).max(1);
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = x0 as f32 + t * (x1 - x0) as f32;
            let y = y0 as f32 + t * (y1 - y0) as f32;
            self.put(x as usize, y as usize, color);
        }
    }

    fn fill_triangle(&mut self, x: usize, y: usize, w: usize, h: usize, color: Rgb) {
        for row in 0..h {
            let span = w * (h - row) / h;
            let start = x + (w - span) / 2;
            for xx in start..start + span {
                self.put(xx, y + row, color);
            }
        }
    }

    fn analyze(&mut self, analysis: Analysis) -> Result<u64, EngineError> {
        if self.luma.len() != self.width * self.height {
            return Err(EngineError::ResourceUnavailable("luma plane has wrong size".to_string()));
        }
        match analysis {
            Analysis::Classify => Ok(self.classify()),
            Analysis::Faces => Ok(self.detect_faces()),
            Analysis::Text => Ok(self.detect_text_regions()),
            Analysis::Rectangles => Ok(self.detect_rectangles()),
            Analysis::Saliency => self.compute_saliency(),
        }
    }

    /// Colour buckets holding at least 2% of the pixels
    fn classify(&self) -> u64 {
        let mut histogram = [0u32; 64];
        for px in self.canvas.chunks_exact(4) {
            let bin = ((px[0] >> 6) as usize) << 4 | ((px[1] >> 6) as usize) << 2 | (px[2] >> 6) as usize;
            histogram[bin] += 1;
        }
        let threshold = (self.width * self.height / 50).max(1) as u32;
        histogram.iter().filter(|&&count| count >= threshold).count() as u64
    }

    /// Mid-tone, smooth cells with warm colour balance
    fn detect_faces(&self) -> u64 {
        let mut faces = 0;
        for cy in (0..(self.height + 1).saturating_sub(CELL)).step_by(CELL) {
            for cx in (0..(self.width + 1).saturating_sub(CELL)).step_by(CELL) {
                let (mut sum, mut sum_sq, mut warm) = (0.0f32, 0.0f32, 0usize);
                for y in cy..cy + CELL {
                    for x in cx..cx + CELL {
                        let idx = y * self.width + x;
                        let l = self.luma[idx];
                        sum += l;
                        sum_sq += l * l;
                        let px = &self.canvas[idx * 4..idx * 4 + 3];
                        if px[0] > px[1] && px[1] > px[2] {
                            warm += 1;
                        }
                    }
                }
                let n = (CELL * CELL) as f32;
                let mean = sum / n;
                let variance = sum_sq / n - mean * mean;
                if (0.35..=0.75).contains(&mean) && variance < 0.005 && warm * 2 > CELL * CELL {
                    faces += 1;
                }
            }
        }
        faces
    }

    /// Groups of consecutive rows with several dark runs
    fn detect_text_regions(&self) -> u64 {
        let mut regions = 0;
        let mut streak = 0;
        for row in self.luma.chunks_exact(self.width) {
            let mut runs = 0;
            let mut in_dark = false;
            for &l in row {
                let dark = l < 0.2;
                if dark && !in_dark {
                    runs += 1;
                }
                in_dark = dark;
            }
            if runs >= 3 {
                streak += 1;
            } else {
                if streak >= 2 {
                    regions += 1;
                }
                streak = 0;
            }
        }
        if streak >= 2 {
            regions += 1;
        }
        regions
    }

    /// Long horizontal edges between adjacent rows
    fn detect_rectangles(&self) -> u64 {
        let mut edges = 0;
        for y in 1..self.height {
            let mut run = 0;
            for x in 0..self.width {
                let diff = (self.luma[y * self.width + x] - self.luma[(y - 1) * self.width + x]).abs();
                if diff > 0.2 {
                    run += 1;
                    if run == EDGE_RUN {
                        edges += 1;
                    }
                } else {
                    run = 0;
                }
            }
        }
        edges
    }

    /// Normalized gradient magnitude; returns the count of salient pixels
    fn compute_saliency(&mut self) -> Result<u64, EngineError> {
        let (w, h) = (self.width, self.height);
        let mut peak = 0.0f32;
        for y in 0..h {
            for x in 0..w {
                let left = self.luma[y * w + x.saturating_sub(1)];
                let right = self.luma[y * w + (x + 1).min(w - 1)];
                let up = self.luma[y.saturating_sub(1) * w + x];
                let down = self.luma[(y + 1).min(h - 1) * w + x];
                let magnitude = ((right - left).powi(2) + (down - up).powi(2)).sqrt();
                self.saliency[y * w + x] = magnitude;
                peak = peak.max(magnitude);
            }
        }
        if !peak.is_finite() {
            return Err(EngineError::NonFinite("saliency"));
        }
        if peak == 0.0 {
            return Ok(0);
        }
        let mut salient = 0;
        for value in self.saliency.iter_mut() {
            *value /= peak;
            if *value > 0.5 {
                salient += 1;
            }
        }
        Ok(salient)
    }
}

impl WorkloadEngine for ImageAnalysisEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::ImageAnalysis
    }

    fn run_operations(&mut self, iterations: u32, stats: &mut StatsRecorder<'_>) {
        for _ in 0..iterations {
            if let Err(err) = self.synthesize_scene() {
                record_failure(stats, &err);
                continue;
            }
            for analysis in Analysis::ALL {
                match self.analyze(analysis) {
                    Ok(found) => {
                        stats.record_operations(1);
                        if let Some(detection) = analysis.detection() {
                            stats.record_detections(detection, found);
                        }
                    }
                    Err(err) => {
                        record_failure(stats, &err);
                        break;
                    }
                }
            }
        }
    }
}
