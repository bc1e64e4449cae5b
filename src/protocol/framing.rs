use super::{FrameError, MAX_FRAME_LEN, ProtoError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Write a single stream frame: `[len: u32 LE][payload...]`.
///
/// There is no magic number, checksum or per-frame metadata; sequencing and
/// timing are implicit in arrival order.
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> io::Result<()> {
    if payload.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty frame"));
    }
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "frame too large",
        ));
    }
    w.write_u32::<LittleEndian>(payload.len() as u32)?;
    w.write_all(payload)?;
    w.flush()?;
    Ok(())
}

/// Read a single stream frame, enforcing the payload ceiling before any
/// allocation. `read_exact` retries short reads until satisfied or the
/// connection errors.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Vec<u8>, FrameError> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    if len == 0 {
        return Err(ProtoError::EmptyFrame.into());
    }
    if len > MAX_FRAME_LEN {
        return Err(ProtoError::TooLarge {
            max: MAX_FRAME_LEN,
            actual: len,
        }
        .into());
    }

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip_preserves_payload() {
        for payload in [vec![0x42u8], vec![0u8; 4096], (0..=255u8).collect()] {
            let mut wire = Vec::new();
            write_frame(&mut wire, &payload).expect("write should succeed");

            let mut cursor = Cursor::new(wire);
            let decoded = read_frame(&mut cursor).expect("read should succeed");
            assert_eq!(decoded, payload);
        }
    }

    #[test]
    fn header_is_little_endian() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &[0xAA; 3]).expect("write should succeed");
        assert_eq!(&wire[..4], &[3, 0, 0, 0]);
    }

    #[test]
    fn rejects_zero_length_header() {
        let mut cursor = Cursor::new(vec![0u8, 0, 0, 0]);
        match read_frame(&mut cursor) {
            Err(FrameError::Proto(ProtoError::EmptyFrame)) => {}
            other => panic!("expected EmptyFrame, got: {:?}", other),
        }
    }

    #[test]
    fn rejects_oversized_header_without_reading_payload() {
        // Declares MAX_FRAME_LEN + 1 bytes but carries none; the reject must
        // come from the header alone.
        let declared = (MAX_FRAME_LEN + 1) as u32;
        let mut cursor = Cursor::new(declared.to_le_bytes().to_vec());
        match read_frame(&mut cursor) {
            Err(FrameError::Proto(ProtoError::TooLarge { actual, .. })) => {
                assert_eq!(actual, MAX_FRAME_LEN + 1);
            }
            other => panic!("expected TooLarge, got: {:?}", other),
        }
    }

    #[test]
    fn truncated_payload_is_io_error() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &[1, 2, 3, 4]).expect("write should succeed");
        wire.truncate(wire.len() - 2);

        let mut cursor = Cursor::new(wire);
        match read_frame(&mut cursor) {
            Err(FrameError::Io(_)) => {}
            other => panic!("expected Io, got: {:?}", other),
        }
    }

    #[test]
    fn write_refuses_empty_payload() {
        let mut wire = Vec::new();
        assert!(write_frame(&mut wire, &[]).is_err());
        assert!(wire.is_empty());
    }
}
