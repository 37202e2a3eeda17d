//! Frame sequence to animation export.
//!
//! Test renders are written as `<dir>/<n>.png`; this module collects them in
//! numeric order and encodes a looping animated GIF.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};

use crate::error::{DreamIoError, Result};

/// List `<n>.png` files in a directory, sorted by `n`.
///
/// Files whose stem is not a plain number are ignored.
pub fn numbered_frames<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<(u64, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        let index = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok());
        if let Some(index) = index {
            frames.push((index, path));
        }
    }
    frames.sort_by_key(|(index, _)| *index);
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

/// Encode the numbered PNG frames of `frame_dir` as an animated GIF.
///
/// # Returns
/// The number of frames written.
pub fn save_img_sequence<P: AsRef<Path>, Q: AsRef<Path>>(
    frame_dir: P,
    output: Q,
    fps: u32,
) -> Result<usize> {
    let frame_dir = frame_dir.as_ref();
    let output = output.as_ref();
    let paths = numbered_frames(frame_dir)?;
    if paths.is_empty() {
        return Err(DreamIoError::Empty {
            what: "frame sequence",
        });
    }

    let delay = Delay::from_numer_denom_ms(1000, fps.max(1));
    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        let rgba = image::open(path)?.to_rgba8();
        frames.push(Frame::from_parts(rgba, 0, 0, delay));
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut encoder = GifEncoder::new(BufWriter::new(File::create(output)?));
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(frames)?;

    log::info!(
        "Wrote {} frames from {} to {}",
        paths.len(),
        frame_dir.display(),
        output.display()
    );
    Ok(paths.len())
}
