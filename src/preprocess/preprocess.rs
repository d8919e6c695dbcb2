//! Observation preprocessing: grayscale, resize and quantization.

use std::borrow::Cow;

use crate::cts::Symbol;
use crate::error::{Error, Result};

/// Luminance weights applied to the R, G and B channels.
const LUMA_WEIGHTS: [f32; 3] = [0.2125, 0.7154, 0.0721];

/// A row-major, channel-last observation with values by convention in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<f32>,
}

impl Frame {
    /// Builds a frame with 1 (gray), 3 (RGB) or 4 (RGBA) channels.
    pub fn new(height: usize, width: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(Error::InvalidObservation(format!(
                "frame must be non-empty, got {height}x{width}"
            )));
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(Error::InvalidObservation(format!(
                "expected 1, 3 or 4 channels, got {channels}"
            )));
        }
        let expected = height * width * channels;
        if data.len() != expected {
            return Err(Error::InvalidObservation(format!(
                "{height}x{width}x{channels} frame needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Frame {
            height,
            width,
            channels,
            data,
        })
    }

    pub fn gray(height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        Frame::new(height, width, 1, data)
    }

    /// Builds a frame from raw bytes, scaling them into `[0, 1]`.
    pub fn from_u8(height: usize, width: usize, channels: usize, bytes: &[u8]) -> Result<Self> {
        let data = bytes.iter().map(|&b| b as f32 / 255.0).collect();
        Frame::new(height, width, channels, data)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    fn at(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.data[(row * self.width + col) * self.channels + channel]
    }
}

/// Reduces a colour frame to one luminance channel. Alpha is ignored.
pub fn to_grayscale(frame: &Frame) -> Cow<'_, Frame> {
    if frame.channels == 1 {
        return Cow::Borrowed(frame);
    }
    let data = frame
        .data
        .chunks_exact(frame.channels)
        .map(|px| {
            px.iter()
                .zip(LUMA_WEIGHTS)
                .map(|(value, weight)| value * weight)
                .sum::<f32>()
        })
        .collect();
    Cow::Owned(Frame {
        height: frame.height,
        width: frame.width,
        channels: 1,
        data,
    })
}

/// Source coordinate and blend weight for every output index along one axis.
fn axis_samples(input: usize, output: usize) -> Vec<(usize, usize, f32)> {
    let scale = input as f64 / output as f64;
    let last = input - 1;
    (0..output)
        .map(|o| {
            let src = ((o as f64 + 0.5) * scale - 0.5).clamp(0.0, last as f64);
            let lo = src.floor() as usize;
            let hi = (lo + 1).min(last);
            (lo, hi, (src - lo as f64) as f32)
        })
        .collect()
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Bilinear resize with pixel-centre alignment. Output values stay within the
/// input's range.
///
/// No anti-aliasing filter is applied, so large downscales alias fine detail.
pub fn resize(frame: &Frame, height: usize, width: usize) -> Cow<'_, Frame> {
    if frame.height == height && frame.width == width {
        return Cow::Borrowed(frame);
    }

    let rows = axis_samples(frame.height, height);
    let cols = axis_samples(frame.width, width);
    let mut data = Vec::with_capacity(height * width * frame.channels);
    for &(r0, r1, fr) in &rows {
        for &(c0, c1, fc) in &cols {
            for ch in 0..frame.channels {
                let corners = [
                    frame.at(r0, c0, ch),
                    frame.at(r0, c1, ch),
                    frame.at(r1, c0, ch),
                    frame.at(r1, c1, ch),
                ];
                let top = lerp(corners[0], corners[1], fc);
                let bottom = lerp(corners[2], corners[3], fc);
                let lo = corners.iter().copied().fold(f32::INFINITY, f32::min);
                let hi = corners.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let value = lerp(top, bottom, fr);
                // Rounding must not push a value out of its neighbours' range.
                data.push(if lo <= hi { value.clamp(lo, hi) } else { value });
            }
        }
    }
    Cow::Owned(Frame {
        height,
        width,
        channels: frame.channels,
        data,
    })
}

/// Maps an intensity in `[0, 1]` to one of `num_bins` bins.
///
/// The top of the range (and anything beyond it) lands in the last bin;
/// negative values and NaN land in bin 0.
#[inline]
pub fn quantize(value: f32, num_bins: usize) -> Symbol {
    let bin = (value as f64 * num_bins as f64).floor() as i64;
    bin.clamp(0, num_bins as i64 - 1) as Symbol
}
