#![forbid(unsafe_code)]
//! Frames a resource's plaintext as `varint(streamVersion) ‖ resourceId[16]
//! ‖ varint(chunkSize) ‖ chunks...` and encrypts/decrypts it one chunk
//! at a time (spec.md §4.6).
//!
//! Each chunk is sealed under `HKDF(resourceKey, chunkIndex)`
//! ([`ward_core::crypto::kdf::derive_chunk_key`]) with the big-endian
//! chunk index as associated data, so chunks cannot be silently
//! reordered or spliced from another stream. The last chunk is the
//! first one strictly smaller than the configured plaintext chunk size
//! (an exact multiple of the chunk size yields one extra empty final
//! chunk); decryption never buffers more than one chunk, so it drives
//! naturally off any [`tokio::io::AsyncRead`]/[`tokio::io::AsyncWrite`] pair.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use ward_core::crypto::aead::{open, seal, AeadKey, AEAD_NONCE_LEN, AEAD_TAG_LEN};
use ward_core::crypto::kdf::derive_chunk_key;
use ward_core::encoding::write_varint;
use ward_core::{ResourceId, WardError};

/// Current stream frame version (spec.md §4.6 `varint(streamVersion=1)`).
pub const STREAM_VERSION: u64 = 1;

/// Default plaintext chunk size: 1 MiB (spec.md §4.6 "default 1 MiB").
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

const CHUNK_OVERHEAD: usize = AEAD_NONCE_LEN + AEAD_TAG_LEN;

/// Encrypt `reader` into `writer` as a framed chunked stream for
/// `resource_id` under `resource_key`. `chunk_size` is the plaintext
/// size per chunk before AEAD overhead.
pub async fn encrypt<R, W>(
    resource_id: ResourceId,
    resource_key: &AeadKey,
    chunk_size: usize,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), WardError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if chunk_size == 0 {
        return Err(WardError::invalid_argument("chunk size must be non-zero"));
    }

    let mut header = Vec::new();
    write_varint(STREAM_VERSION, &mut header);
    header.extend_from_slice(resource_id.as_bytes());
    write_varint(chunk_size as u64, &mut header);
    writer
        .write_all(&header)
        .await
        .map_err(|err| WardError::internal(err.to_string()))?;

    let mut buf = vec![0u8; chunk_size];
    let mut index: u64 = 0;
    loop {
        let n = read_full(reader, &mut buf).await?;
        let key = derive_chunk_key(resource_key, index)?;
        let ciphertext = seal(&key, &buf[..n], &index.to_be_bytes())?;
        writer
            .write_all(&ciphertext)
            .await
            .map_err(|err| WardError::internal(err.to_string()))?;
        index += 1;
        if n < chunk_size {
            break;
        }
    }

    writer
        .flush()
        .await
        .map_err(|err| WardError::internal(err.to_string()))
}

/// Decrypt a framed stream produced by [`encrypt`]. Returns the
/// resource id the stream was encrypted for, so callers that haven't
/// resolved `resource_key` themselves yet can read the header first
/// (see [`read_header`]) before supplying it.
pub async fn decrypt<R, W>(
    resource_key: &AeadKey,
    reader: &mut R,
    writer: &mut W,
) -> Result<ResourceId, WardError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (resource_id, chunk_size) = read_header(reader).await?;

    let mut buf = vec![0u8; chunk_size + CHUNK_OVERHEAD];
    let mut index: u64 = 0;
    loop {
        let n = read_full(reader, &mut buf).await?;
        if n == 0 {
            return Err(WardError::invalid_format(
                "stream ended before a final chunk was seen",
            ));
        }
        if n < CHUNK_OVERHEAD {
            return Err(WardError::decryption_failed("truncated final chunk"));
        }

        let key = derive_chunk_key(resource_key, index)?;
        let plaintext = open(&key, &buf[..n], &index.to_be_bytes())?;
        writer
            .write_all(&plaintext)
            .await
            .map_err(|err| WardError::internal(err.to_string()))?;

        index += 1;
        if plaintext.len() < chunk_size {
            break;
        }
    }

    writer
        .flush()
        .await
        .map_err(|err| WardError::internal(err.to_string()))?;
    Ok(resource_id)
}

/// Read just the frame header (`resourceId`, `chunkSize`), leaving the
/// reader positioned at the first chunk. Lets a caller resolve the
/// resource key for `resourceId` before decrypting the body.
///
/// Reads the two header varints one byte at a time rather than into a
/// fixed-size prefix buffer, so it never consumes bytes belonging to
/// the first chunk.
pub async fn read_header<R>(reader: &mut R) -> Result<(ResourceId, usize), WardError>
where
    R: AsyncRead + Unpin,
{
    let version = read_async_varint(reader).await?;
    if version != STREAM_VERSION {
        return Err(WardError::upgrade_required(format!(
            "unsupported stream frame version {version}"
        )));
    }

    let mut resource_id_bytes = [0u8; 16];
    reader
        .read_exact(&mut resource_id_bytes)
        .await
        .map_err(|err| WardError::internal(err.to_string()))?;
    let resource_id = ResourceId::try_from_slice(&resource_id_bytes)?;

    let chunk_size = read_async_varint(reader).await?;
    let chunk_size = usize::try_from(chunk_size)
        .map_err(|_| WardError::invalid_format("chunk size overflow"))?;
    if chunk_size == 0 {
        return Err(WardError::invalid_format("chunk size must be non-zero"));
    }

    Ok((resource_id, chunk_size))
}

/// Read one LEB128 varint directly off `reader`, one byte at a time.
async fn read_async_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u64, WardError> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    let mut byte = [0u8; 1];
    loop {
        reader
            .read_exact(&mut byte)
            .await
            .map_err(|err| WardError::internal(err.to_string()))?;
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift >= 64 {
            return Err(WardError::invalid_format("varint too long"));
        }
    }
}

/// Read into `buf` until full or EOF, returning the number of bytes
/// actually read (spec.md §4.6 "decryption is streamable, no buffering
/// beyond one chunk" — this is the one-chunk buffer).
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize, WardError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|err| WardError::internal(err.to_string()))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn small_input_round_trips() {
        let resource_id = ResourceId::new([1u8; 16]);
        let key = AeadKey::generate();
        let plaintext = b"the quick brown fox jumps over the lazy dog";

        let mut framed = Vec::new();
        encrypt(resource_id, &key, 16, &mut Cursor::new(plaintext), &mut framed)
            .await
            .expect("encrypt");

        let mut out = Vec::new();
        let decoded_id = decrypt(&key, &mut Cursor::new(framed), &mut out)
            .await
            .expect("decrypt");
        assert_eq!(decoded_id, resource_id);
        assert_eq!(out, plaintext);
    }

    #[tokio::test]
    async fn exact_multiple_produces_trailing_empty_chunk() {
        let resource_id = ResourceId::new([2u8; 16]);
        let key = AeadKey::generate();
        let plaintext = vec![7u8; 32];

        let mut framed = Vec::new();
        encrypt(resource_id, &key, 16, &mut Cursor::new(&plaintext), &mut framed)
            .await
            .expect("encrypt");

        let mut out = Vec::new();
        decrypt(&key, &mut Cursor::new(framed), &mut out)
            .await
            .expect("decrypt");
        assert_eq!(out, plaintext);
    }

    #[tokio::test]
    async fn empty_input_round_trips() {
        let resource_id = ResourceId::new([3u8; 16]);
        let key = AeadKey::generate();

        let mut framed = Vec::new();
        encrypt(resource_id, &key, 16, &mut Cursor::new(&[][..]), &mut framed)
            .await
            .expect("encrypt");

        let mut out = Vec::new();
        decrypt(&key, &mut Cursor::new(framed), &mut out)
            .await
            .expect("decrypt");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn large_input_round_trips_across_many_chunks() {
        let resource_id = ResourceId::new([4u8; 16]);
        let key = AeadKey::generate();
        let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let mut framed = Vec::new();
        encrypt(resource_id, &key, 1024, &mut Cursor::new(&plaintext), &mut framed)
            .await
            .expect("encrypt");

        let mut out = Vec::new();
        decrypt(&key, &mut Cursor::new(framed), &mut out)
            .await
            .expect("decrypt");
        assert_eq!(out, plaintext);
    }

    #[tokio::test]
    async fn corrupted_chunk_fails_with_decryption_failed() {
        let resource_id = ResourceId::new([5u8; 16]);
        let key = AeadKey::generate();
        let plaintext = vec![9u8; 100];

        let mut framed = Vec::new();
        encrypt(resource_id, &key, 16, &mut Cursor::new(&plaintext), &mut framed)
            .await
            .expect("encrypt");
        let last = framed.len() - 1;
        framed[last] ^= 0x01;

        let mut out = Vec::new();
        let err = decrypt(&key, &mut Cursor::new(framed), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, WardError::DecryptionFailed { .. }));
    }

    #[tokio::test]
    async fn wrong_key_fails_with_decryption_failed() {
        let resource_id = ResourceId::new([6u8; 16]);
        let key = AeadKey::generate();
        let other_key = AeadKey::generate();
        let plaintext = vec![3u8; 64];

        let mut framed = Vec::new();
        encrypt(resource_id, &key, 16, &mut Cursor::new(&plaintext), &mut framed)
            .await
            .expect("encrypt");

        let mut out = Vec::new();
        let err = decrypt(&other_key, &mut Cursor::new(framed), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, WardError::DecryptionFailed { .. }));
    }
}
