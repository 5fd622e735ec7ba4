use crate::common::errors::{ArloError, Result};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Stream `body` into `dest`, writing `chunk_size` bytes at a time.
///
/// At most one chunk plus one network frame is held in memory. Bytes land in
/// `<dest>.part` first and are renamed into place once the stream ends, so a
/// failed transfer never leaves a truncated file under the final name.
/// Returns the number of bytes written.
pub async fn stream_to_file<S, E>(body: S, dest: &Path, chunk_size: usize) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    ArloError: From<E>,
{
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let part = part_path(dest);
    let result = match write_chunks(body, &part, chunk_size.max(1)).await {
        Ok(written) => fs::rename(&part, dest)
            .await
            .map(|_| written)
            .map_err(<ArloError as From<std::io::Error>>::from),
        Err(e) => Err(e),
    };

    if result.is_err() {
        let _ = fs::remove_file(&part).await;
    }
    result
}

async fn write_chunks<S, E>(body: S, part: &Path, chunk_size: usize) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    ArloError: From<E>,
{
    futures::pin_mut!(body);

    let mut file = File::create(part).await?;
    let mut buffer = BytesMut::with_capacity(chunk_size);
    let mut written = 0u64;

    while let Some(frame) = body.next().await {
        buffer.extend_from_slice(&frame?);

        while buffer.len() >= chunk_size {
            let chunk = buffer.split_to(chunk_size);
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
    }

    // tail shorter than one chunk
    if !buffer.is_empty() {
        file.write_all(&buffer).await?;
        written += buffer.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}
