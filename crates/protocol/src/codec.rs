use anyhow::{Result, bail};
use bincode::config;
use serde::{Serialize, de::DeserializeOwned};
use std::io::{ErrorKind, Read, Write};

/// Upper bound on a single frame; anything larger is treated as corruption.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Read a single length-prefixed bincode message from `reader`.
///
/// Wire format:
///   - 4-byte big-endian length (u32)
///   - that many bytes of bincode payload
pub fn read_message<R, T>(reader: &mut R) -> Result<T>
where
    R: Read,
    T: DeserializeOwned,
{
    match try_read_message(reader)? {
        Some(msg) => Ok(msg),
        None => bail!("connection closed before a message was received"),
    }
}

/// Like [`read_message`], but a clean EOF before the length prefix yields
/// `Ok(None)`. Used by connections that carry a stream of requests.
pub fn try_read_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame of {len} bytes exceeds limit of {MAX_FRAME_LEN}");
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    let (msg, _bytes_read): (T, usize) =
        bincode::serde::decode_from_slice(&buf, config::standard())?;
    Ok(Some(msg))
}

/// Write a single length-prefixed bincode message to `writer`.
pub fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: Write,
    T: Serialize,
{
    let bytes = bincode::serde::encode_to_vec(msg, config::standard())?;
    if bytes.len() > MAX_FRAME_LEN {
        bail!(
            "message of {} bytes exceeds limit of {MAX_FRAME_LEN}",
            bytes.len()
        );
    }

    let len = bytes.len() as u32;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
