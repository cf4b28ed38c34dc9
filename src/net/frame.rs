use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Token (u64) followed by body length (u32), both little-endian.
pub const HEADER_LEN: usize = 12;

/// Responses larger than this are treated as a broken stream.
pub const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

pub fn encode_header(token: u64, body_len: usize) -> Result<Vec<u8>> {
    let body_len = u32::try_from(body_len)
        .map_err(|_| Error::protocol(format!("query of {body_len} bytes is too large")))?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    WriteBytesExt::write_u64::<LittleEndian>(&mut header, token)?;
    WriteBytesExt::write_u32::<LittleEndian>(&mut header, body_len)?;
    Ok(header)
}

pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<(u64, usize)> {
    let mut cursor = Cursor::new(&header[..]);
    let token = ReadBytesExt::read_u64::<LittleEndian>(&mut cursor)?;
    let body_len = ReadBytesExt::read_u32::<LittleEndian>(&mut cursor)? as usize;
    if body_len > MAX_BODY_LEN {
        return Err(Error::protocol(format!(
            "response of {body_len} bytes exceeds the {MAX_BODY_LEN} byte limit"
        )));
    }
    Ok((token, body_len))
}

/// Takes one complete frame off the front of `inbox`, if it holds one.
/// Bytes of an incomplete frame stay in place for the next read.
pub fn split_frame(inbox: &mut Vec<u8>) -> Result<Option<(u64, Vec<u8>)>> {
    if inbox.len() < HEADER_LEN {
        return Ok(None);
    }
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&inbox[..HEADER_LEN]);
    let (token, body_len) = decode_header(&header)?;
    if inbox.len() < HEADER_LEN + body_len {
        return Ok(None);
    }
    let body = inbox[HEADER_LEN..HEADER_LEN + body_len].to_vec();
    inbox.drain(..HEADER_LEN + body_len);
    Ok(Some((token, body)))
}

pub async fn write_frame<W>(writer: &mut W, token: u64, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_header(token, body.len())?).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R>(reader: &mut R) -> Result<(u64, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let (token, body_len) = decode_header(&header)?;
    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await?;
    Ok((token, body))
}

/// Handshake messages are JSON strings terminated by a NUL byte.
pub async fn write_handshake_message<W>(writer: &mut W, message: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(message).await?;
    writer.write_all(&[0]).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_handshake_message<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut message = Vec::new();
    reader.read_until(0, &mut message).await?;
    match message.pop() {
        Some(0) => Ok(message),
        _ => Err(Error::Handshake(
            "connection closed in the middle of the handshake".into(),
        )),
    }
}
