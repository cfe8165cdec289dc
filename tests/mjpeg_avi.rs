//! Container-level checks on the motion-JPEG AVI sink.

use camfx::{Frame, FrameSize, MjpegAviSink};

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn finalized_container_is_well_formed() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("out.avi");

    let mut sink = MjpegAviSink::new(&path);
    sink.open(FrameSize::new(32, 24), 20).expect("open sink");
    for i in 0..3u8 {
        let frame = Frame::solid(32, 24, [i * 40, 100, 200 - i * 40]);
        sink.write(&frame).expect("write frame");
    }
    assert_eq!(sink.frames_written(), 3);
    sink.close().expect("finalize");

    let bytes = std::fs::read(&path).expect("container exists");

    // RIFF framing, with the outer size patched to the real file length.
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(read_u32(&bytes, 4) as usize, bytes.len() - 8);
    assert_eq!(&bytes[8..12], b"AVI ");

    // Main header: 20 fps (50 ms per frame), 3 frames, 32x24.
    assert_eq!(&bytes[24..28], b"avih");
    assert_eq!(read_u32(&bytes, 32), 50_000);
    assert_eq!(read_u32(&bytes, 48), 3);
    assert_eq!(read_u32(&bytes, 64), 32);
    assert_eq!(read_u32(&bytes, 68), 24);

    // Stream declares motion JPEG, and again in the format block.
    assert_eq!(&bytes[108..112], b"vids");
    assert_eq!(&bytes[112..116], b"MJPG");
    assert_eq!(read_u32(&bytes, 140), 3, "stream length in frames");
    assert_eq!(&bytes[188..192], b"MJPG", "bitmap compression fourcc");

    // movi list holds the first chunk: a JPEG with its SOI marker.
    assert_eq!(&bytes[212..216], b"LIST");
    assert_eq!(&bytes[220..224], b"movi");
    assert_eq!(&bytes[224..228], b"00dc");
    assert_eq!(&bytes[232..234], &[0xFF, 0xD8], "JPEG SOI marker");

    // Index: 3 entries of 16 bytes, trailing the file.
    let idx1_pos = bytes.len() - 8 - 3 * 16;
    assert_eq!(&bytes[idx1_pos..idx1_pos + 4], b"idx1");
    assert_eq!(read_u32(&bytes, idx1_pos + 4), 3 * 16);
    assert_eq!(&bytes[idx1_pos + 8..idx1_pos + 12], b"00dc");
    // First entry points at the first chunk, relative to the movi fourcc.
    assert_eq!(read_u32(&bytes, idx1_pos + 16), 4);
    let first_size = read_u32(&bytes, idx1_pos + 20);
    assert_eq!(read_u32(&bytes, 228), first_size, "index size matches chunk");
}

#[test]
fn gray_frames_are_accepted() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("gray.avi");

    let mut sink = MjpegAviSink::new(&path);
    sink.open(FrameSize::new(16, 16), 20).expect("open sink");
    let gray = Frame::solid(16, 16, [128, 128, 128]).into_gray();
    sink.write(&gray).expect("gray frames encode");
    sink.close().expect("finalize");

    assert!(std::fs::read(&path).expect("exists").len() > 224);
}
