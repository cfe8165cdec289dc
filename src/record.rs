//! Motion-JPEG AVI recording sink.
//!
//! The container is written incrementally: RIFF/AVI headers with
//! placeholder sizes, one `00dc` chunk of baseline JPEG per frame, then an
//! `idx1` index and the patched sizes at close time. Geometry and frame
//! rate are fixed at open and every subsequent write must match; a write
//! failure is fatal to the session, and the file stays valid up to the
//! last successful write once finalized.
//!
//! The sink is opened lazily by the pipeline on the first acquired frame,
//! because the geometry is unknown before that.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::frame::{Frame, FrameSize};
use crate::PipelineError;

const JPEG_QUALITY: u8 = 85;
const AVIF_HASINDEX: u32 = 0x0000_0010;
const AVIIF_KEYFRAME: u32 = 0x0000_0010;

/// Optional recording sink for the processed stream.
pub struct MjpegAviSink {
    path: PathBuf,
    state: Option<SinkState>,
    /// Survives close, for shutdown reporting.
    frames_written: u32,
}

struct SinkState {
    file: BufWriter<File>,
    size: FrameSize,
    /// (offset into movi data, chunk payload size) per frame, for idx1.
    index: Vec<(u32, u32)>,
    /// File position of the movi LIST size field.
    movi_size_pos: u64,
    /// File position where movi chunk data begins (after "movi").
    movi_data_pos: u64,
    /// File positions of the two frame-count fields patched at close.
    total_frames_pos: u64,
    stream_length_pos: u64,
}

impl MjpegAviSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: None,
            frames_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    pub fn frames_written(&self) -> u32 {
        self.frames_written
    }

    /// Create the output file and write the container headers. Called once,
    /// with the geometry of the first relevant frame.
    pub fn open(&mut self, size: FrameSize, fps: u32) -> Result<(), PipelineError> {
        assert!(self.state.is_none(), "sink opened twice");
        let unopenable = |err: std::io::Error| {
            PipelineError::SinkUnopenable(format!("{}: {}", self.path.display(), err))
        };

        let file = File::create(&self.path).map_err(unopenable)?;
        let mut file = BufWriter::new(file);
        let positions = write_headers(&mut file, size, fps).map_err(unopenable)?;

        log::info!(
            "record: opened {} ({} @ {} fps, MJPG)",
            self.path.display(),
            size,
            fps
        );
        self.state = Some(SinkState {
            file,
            size,
            index: Vec::new(),
            movi_size_pos: positions.movi_size_pos,
            movi_data_pos: positions.movi_data_pos,
            total_frames_pos: positions.total_frames_pos,
            stream_length_pos: positions.stream_length_pos,
        });
        Ok(())
    }

    /// Append one processed frame as a JPEG chunk.
    pub fn write(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        let path = self.path.clone();
        let fail =
            |err: String| PipelineError::SinkWriteFailure(format!("{}: {}", path.display(), err));

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| fail("sink not open".to_string()))?;
        if frame.size() != state.size {
            return Err(fail(format!(
                "frame geometry {} does not match sink geometry {}",
                frame.size(),
                state.size
            )));
        }

        let mut jpeg = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
        let color_type = match frame {
            Frame::Color(_) => ExtendedColorType::Rgb8,
            Frame::Gray(_) => ExtendedColorType::L8,
        };
        encoder
            .encode(frame.raw_bytes(), frame.width(), frame.height(), color_type)
            .map_err(|e| fail(format!("jpeg encode: {}", e)))?;

        let chunk_pos = state
            .file
            .stream_position()
            .map_err(|e| fail(e.to_string()))?;
        let offset_in_movi = (chunk_pos - state.movi_data_pos + 4) as u32;

        let write_chunk = |file: &mut BufWriter<File>| -> std::io::Result<()> {
            file.write_all(b"00dc")?;
            file.write_all(&(jpeg.len() as u32).to_le_bytes())?;
            file.write_all(&jpeg)?;
            if jpeg.len() % 2 == 1 {
                file.write_all(&[0u8])?;
            }
            Ok(())
        };
        write_chunk(&mut state.file).map_err(|e| fail(e.to_string()))?;

        state.index.push((offset_in_movi, jpeg.len() as u32));
        self.frames_written += 1;
        Ok(())
    }

    /// Write the index, patch header sizes, and flush. Idempotent: only the
    /// first call does work, and a sink that never opened is a no-op.
    pub fn close(&mut self) -> Result<(), PipelineError> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        let fail = |err: std::io::Error| {
            PipelineError::SinkWriteFailure(format!(
                "{}: finalize: {}",
                self.path.display(),
                err
            ))
        };

        finalize(&mut state, self.frames_written).map_err(fail)?;
        log::info!(
            "record: finalized {} ({} frames)",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }
}

impl Drop for MjpegAviSink {
    fn drop(&mut self) {
        // Drain closes the sink explicitly; this is the last-resort path.
        if let Some(mut state) = self.state.take() {
            if let Err(err) = finalize(&mut state, self.frames_written) {
                log::warn!(
                    "record: failed to finalize {} on drop: {}",
                    self.path.display(),
                    err
                );
            }
        }
    }
}

struct HeaderPositions {
    movi_size_pos: u64,
    movi_data_pos: u64,
    total_frames_pos: u64,
    stream_length_pos: u64,
}

fn write_headers(
    file: &mut BufWriter<File>,
    size: FrameSize,
    fps: u32,
) -> std::io::Result<HeaderPositions> {
    let fps = fps.max(1);
    let micros_per_frame = 1_000_000 / fps;

    file.write_all(b"RIFF")?;
    file.write_all(&0u32.to_le_bytes())?; // riff size, patched at close
    file.write_all(b"AVI ")?;

    // hdrl list: avih + one strl. Fixed-size contents, so the list sizes
    // are known up front; only the frame counts are patched later.
    let strl_size = 4 + (8 + 56) + (8 + 40);
    let hdrl_size = 4 + (8 + 56) + (8 + strl_size);
    file.write_all(b"LIST")?;
    file.write_all(&(hdrl_size as u32).to_le_bytes())?;
    file.write_all(b"hdrl")?;

    file.write_all(b"avih")?;
    file.write_all(&56u32.to_le_bytes())?;
    file.write_all(&micros_per_frame.to_le_bytes())?;
    file.write_all(&(size.width * size.height * 3 * fps).to_le_bytes())?; // max bytes/sec
    file.write_all(&0u32.to_le_bytes())?; // padding granularity
    file.write_all(&AVIF_HASINDEX.to_le_bytes())?;
    let total_frames_pos = file.stream_position()?;
    file.write_all(&0u32.to_le_bytes())?; // total frames, patched
    file.write_all(&0u32.to_le_bytes())?; // initial frames
    file.write_all(&1u32.to_le_bytes())?; // streams
    file.write_all(&0u32.to_le_bytes())?; // suggested buffer size
    file.write_all(&size.width.to_le_bytes())?;
    file.write_all(&size.height.to_le_bytes())?;
    file.write_all(&[0u8; 16])?; // reserved

    file.write_all(b"LIST")?;
    file.write_all(&(strl_size as u32).to_le_bytes())?;
    file.write_all(b"strl")?;

    file.write_all(b"strh")?;
    file.write_all(&56u32.to_le_bytes())?;
    file.write_all(b"vids")?;
    file.write_all(b"MJPG")?;
    file.write_all(&0u32.to_le_bytes())?; // flags
    file.write_all(&0u32.to_le_bytes())?; // priority + language
    file.write_all(&0u32.to_le_bytes())?; // initial frames
    file.write_all(&1u32.to_le_bytes())?; // scale
    file.write_all(&fps.to_le_bytes())?; // rate: rate/scale = fps
    file.write_all(&0u32.to_le_bytes())?; // start
    let stream_length_pos = file.stream_position()?;
    file.write_all(&0u32.to_le_bytes())?; // length in frames, patched
    file.write_all(&0u32.to_le_bytes())?; // suggested buffer size
    file.write_all(&u32::MAX.to_le_bytes())?; // quality: driver default
    file.write_all(&0u32.to_le_bytes())?; // sample size
    file.write_all(&0u16.to_le_bytes())?; // rcFrame left
    file.write_all(&0u16.to_le_bytes())?; // top
    file.write_all(&(size.width as u16).to_le_bytes())?; // right
    file.write_all(&(size.height as u16).to_le_bytes())?; // bottom

    file.write_all(b"strf")?;
    file.write_all(&40u32.to_le_bytes())?;
    file.write_all(&40u32.to_le_bytes())?; // biSize
    file.write_all(&(size.width as i32).to_le_bytes())?;
    file.write_all(&(size.height as i32).to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?; // planes
    file.write_all(&24u16.to_le_bytes())?; // bit count
    file.write_all(b"MJPG")?; // compression
    file.write_all(&(size.width * size.height * 3).to_le_bytes())?; // image size
    file.write_all(&[0u8; 16])?; // resolution, palette fields

    file.write_all(b"LIST")?;
    let movi_size_pos = file.stream_position()?;
    file.write_all(&0u32.to_le_bytes())?; // movi size, patched
    file.write_all(b"movi")?;
    let movi_data_pos = file.stream_position()?;

    Ok(HeaderPositions {
        movi_size_pos,
        movi_data_pos,
        total_frames_pos,
        stream_length_pos,
    })
}

fn finalize(state: &mut SinkState, frames_written: u32) -> std::io::Result<()> {
    let movi_end = state.file.stream_position()?;
    let movi_size = (movi_end - state.movi_data_pos + 4) as u32;

    // idx1: one entry per frame chunk.
    state.file.write_all(b"idx1")?;
    state
        .file
        .write_all(&((state.index.len() * 16) as u32).to_le_bytes())?;
    for &(offset, size) in &state.index {
        state.file.write_all(b"00dc")?;
        state.file.write_all(&AVIIF_KEYFRAME.to_le_bytes())?;
        state.file.write_all(&offset.to_le_bytes())?;
        state.file.write_all(&size.to_le_bytes())?;
    }

    let riff_size = (state.file.stream_position()? - 8) as u32;

    state.file.seek(SeekFrom::Start(4))?;
    state.file.write_all(&riff_size.to_le_bytes())?;
    state.file.seek(SeekFrom::Start(state.total_frames_pos))?;
    state.file.write_all(&frames_written.to_le_bytes())?;
    state.file.seek(SeekFrom::Start(state.stream_length_pos))?;
    state.file.write_all(&frames_written.to_le_bytes())?;
    state.file.seek(SeekFrom::Start(state.movi_size_pos))?;
    state.file.write_all(&movi_size.to_le_bytes())?;

    state.file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_requires_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MjpegAviSink::new(dir.path().join("out.avi"));
        let frame = Frame::solid(10, 10, [1, 2, 3]);
        assert!(matches!(
            sink.write(&frame),
            Err(PipelineError::SinkWriteFailure(_))
        ));
    }

    #[test]
    fn geometry_mismatch_is_a_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MjpegAviSink::new(dir.path().join("out.avi"));
        sink.open(FrameSize::new(100, 100), 20).unwrap();
        let wrong = Frame::solid(50, 50, [0, 0, 0]);
        assert!(matches!(
            sink.write(&wrong),
            Err(PipelineError::SinkWriteFailure(_))
        ));
        sink.close().unwrap();
    }

    #[test]
    fn close_is_idempotent_and_unopened_close_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MjpegAviSink::new(dir.path().join("out.avi"));
        sink.close().unwrap();

        sink.open(FrameSize::new(16, 16), 20).unwrap();
        sink.write(&Frame::solid(16, 16, [5, 5, 5])).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
    }

    #[test]
    fn unopenable_path_reports_sink_unopenable() {
        let mut sink = MjpegAviSink::new("/nonexistent-dir/out.avi");
        assert!(matches!(
            sink.open(FrameSize::new(10, 10), 20),
            Err(PipelineError::SinkUnopenable(_))
        ));
    }
}
