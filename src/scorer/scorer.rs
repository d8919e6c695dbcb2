use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::density::{DensityModel, FrameScore};
use crate::error::{Error, Result};
use crate::preprocess::Frame;

/// Pixel encoding of a raw frame file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// One byte per value, scaled into `[0, 1]`.
    #[default]
    U8,
    /// Little-endian `f32` per value, used as is.
    F32,
}

impl PixelFormat {
    pub fn bytes_per_value(self) -> usize {
        match self {
            PixelFormat::U8 => 1,
            PixelFormat::F32 => 4,
        }
    }
}

/// Shape of the frames stored back to back in a raw frame file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub pixel: PixelFormat,
}

impl FrameLayout {
    /// Size of one stored frame. Fails when the shape overflows `usize`.
    pub fn frame_bytes(&self) -> Result<usize> {
        self.height
            .checked_mul(self.width)
            .and_then(|n| n.checked_mul(self.channels))
            .and_then(|n| n.checked_mul(self.pixel.bytes_per_value()))
            .ok_or_else(|| {
                Error::InvalidObservation(format!("frame layout {self:?} overflows usize"))
            })
    }

    fn decode(&self, block: &[u8]) -> Result<Frame> {
        match self.pixel {
            PixelFormat::U8 => Frame::from_u8(self.height, self.width, self.channels, block),
            PixelFormat::F32 => {
                let mut values: Vec<f32> = bytemuck::pod_collect_to_vec(block);
                if cfg!(target_endian = "big") {
                    for value in &mut values {
                        *value = f32::from_bits(value.to_bits().swap_bytes());
                    }
                }
                Frame::new(self.height, self.width, self.channels, values)
            }
        }
    }
}

/// Fills `buffer` from `reader`, returning how many bytes were read before EOF.
fn read_block<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Feeds every frame of `reader` to `model` in order and returns their scores.
pub fn score_reader<R: Read>(
    reader: &mut R,
    layout: FrameLayout,
    model: &mut DensityModel,
) -> Result<Vec<FrameScore>> {
    let frame_bytes = layout.frame_bytes()?;
    if frame_bytes == 0 {
        return Err(Error::InvalidObservation(format!(
            "frame layout {layout:?} is empty"
        )));
    }

    let mut buffer = vec![0u8; frame_bytes];
    let mut scores = Vec::new();
    loop {
        let bytes_read = read_block(reader, &mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        if bytes_read < frame_bytes {
            return Err(Error::InvalidObservation(format!(
                "trailing partial frame of {bytes_read} bytes, expected {frame_bytes}"
            )));
        }
        let frame = layout.decode(&buffer)?;
        let score = model.update_scored(&frame);
        debug!(frame = scores.len(), bonus = score.bonus, "frame scored");
        scores.push(score);
    }
    Ok(scores)
}

/// Scores a raw frame file, see [`score_reader`].
pub fn score_file<P: AsRef<Path>>(
    path: P,
    layout: FrameLayout,
    model: &mut DensityModel,
) -> Result<Vec<FrameScore>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let scores = score_reader(&mut reader, layout, model)?;
    info!(
        path = %path.display(),
        frames = scores.len(),
        nodes = model.node_count(),
        "frame file scored"
    );
    Ok(scores)
}
