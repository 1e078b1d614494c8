//! File transfer and filesystem handlers.

use std::collections::HashMap;

use async_trait::async_trait;
use deskhand_protocol::message::{decode_uint, encode_uint, SEPARATOR};
use deskhand_types::{Event, FailureKind};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, trace};

use crate::error::ServerError;
use crate::registry::{EventContext, EventHandler};

/// Tracks in-progress chunked uploads by target name.
#[derive(Debug, Default)]
pub struct ChunkAssembly {
    counts: HashMap<String, u64>,
}

impl ChunkAssembly {
    /// Record one arrived chunk and return the running count.
    fn record(&mut self, name: &str) -> u64 {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn finish(&mut self, name: &str) {
        self.counts.remove(name);
    }
}

/// Stream a file to the client in numbered chunks, then acknowledge.
pub struct SendFile;

#[async_trait]
impl EventHandler for SendFile {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let [transfer_id, path] = fields else {
            return Err(ServerError::malformed(
                Event::FileRequest,
                "expected transfer id and path fields",
            ));
        };
        let Ok(path) = std::str::from_utf8(path) else {
            ctx.conn
                .send_failure(FailureKind::BadPath, &[transfer_id])
                .await?;
            return Ok(());
        };

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                ctx.conn
                    .send_failure(FailureKind::BadPath, &[transfer_id])
                    .await?;
                return Ok(());
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                ctx.conn
                    .send_failure(FailureKind::FileNotFound, &[transfer_id])
                    .await?;
                return Ok(());
            }
            Err(_) => {
                ctx.conn
                    .send_failure(FailureKind::BadPath, &[transfer_id])
                    .await?;
                return Ok(());
            }
        };

        let chunk_size = ctx.server.config.transfer.chunk_size as u64;
        // An empty file still sends one empty chunk so the client always
        // sees the transfer it asked for.
        let total = metadata.len().div_ceil(chunk_size).max(1);
        let mut file = File::open(path).await?;
        let mut remaining = metadata.len();
        for index in 1..=total {
            let take = remaining.min(chunk_size) as usize;
            let mut chunk = vec![0u8; take];
            file.read_exact(&mut chunk).await?;
            remaining -= take as u64;
            ctx.conn
                .send_message(
                    Event::DownloadChunk,
                    &[transfer_id, &encode_uint(index), &encode_uint(total), &chunk],
                )
                .await?;
            trace!(index, total, "sent download chunk");
        }
        ctx.conn.send_success().await?;
        info!(path, size = metadata.len(), chunks = total, "file sent");
        Ok(())
    }
}

/// Append one upload chunk; acknowledge once all chunks arrived.
///
/// The payload is `name <sep> total <sep> chunk` where only the first two
/// separators delimit: the chunk bytes may themselves contain separators.
pub struct ReceiveChunk;

#[async_trait]
impl EventHandler for ReceiveChunk {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let [raw] = fields else {
            return Err(ServerError::malformed(
                Event::UploadChunk,
                "expected a raw payload",
            ));
        };
        let mut parts = raw.splitn(3, |byte| *byte == SEPARATOR);
        let (Some(name), Some(total), Some(chunk)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ServerError::malformed(
                Event::UploadChunk,
                "expected name, total and chunk",
            ));
        };
        let Ok(name) = std::str::from_utf8(name) else {
            return Err(ServerError::malformed(
                Event::UploadChunk,
                "target name is not utf-8",
            ));
        };
        let total = decode_uint(total);

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(name)
            .await?;
        file.write_all(chunk).await?;
        file.flush().await?;

        let received = ctx.state.uploads.record(name);
        trace!(name, received, total, "stored upload chunk");
        if received >= total {
            ctx.state.uploads.finish(name);
            ctx.conn.send_success().await?;
            info!(name, chunks = received, "upload complete");
        }
        Ok(())
    }
}

/// List a directory as a JSON array of entry names, directories suffixed
/// with the platform path separator.
pub struct ListDir;

#[async_trait]
impl EventHandler for ListDir {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let [path] = fields else {
            return Err(ServerError::malformed(
                Event::ListRequest,
                "expected a path field",
            ));
        };
        let Ok(path) = std::str::from_utf8(path) else {
            ctx.conn.send_failure(FailureKind::BadPath, &[]).await?;
            return Ok(());
        };

        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(error) => {
                debug!(path, error = %error, "list failed");
                ctx.conn.send_failure(FailureKind::BadPath, &[]).await?;
                return Ok(());
            }
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                name.push(std::path::MAIN_SEPARATOR);
            }
            names.push(name);
        }
        names.sort();

        let listing = serde_json::to_vec(&names)?;
        ctx.conn
            .send_message(Event::FileList, &[&listing])
            .await?;
        ctx.conn.send_success().await?;
        debug!(path, entries = names.len(), "listed directory");
        Ok(())
    }
}

/// Copy a file to a new path.
pub struct CopyFile;

#[async_trait]
impl EventHandler for CopyFile {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let [source, target] = fields else {
            return Err(ServerError::malformed(
                Event::CopyRequest,
                "expected source and target fields",
            ));
        };
        let (Ok(source), Ok(target)) = (std::str::from_utf8(source), std::str::from_utf8(target))
        else {
            ctx.conn.send_failure(FailureKind::BadPath, &[]).await?;
            return Ok(());
        };

        match tokio::fs::copy(source, target).await {
            Ok(_) => {
                ctx.conn.send_success().await?;
                debug!(source, target, "copied file");
            }
            Err(error) => {
                debug!(source, target, error = %error, "copy failed");
                ctx.conn.send_failure(FailureKind::BadPath, &[]).await?;
            }
        }
        Ok(())
    }
}

/// Rename a file or directory.
pub struct MoveEntry;

#[async_trait]
impl EventHandler for MoveEntry {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let [source, target] = fields else {
            return Err(ServerError::malformed(
                Event::MoveRequest,
                "expected source and target fields",
            ));
        };
        let (Ok(source), Ok(target)) = (std::str::from_utf8(source), std::str::from_utf8(target))
        else {
            ctx.conn.send_failure(FailureKind::BadPath, &[]).await?;
            return Ok(());
        };

        match tokio::fs::rename(source, target).await {
            Ok(()) => {
                ctx.conn.send_success().await?;
                debug!(source, target, "moved entry");
            }
            Err(error) => {
                debug!(source, target, error = %error, "move failed");
                ctx.conn.send_failure(FailureKind::BadPath, &[]).await?;
            }
        }
        Ok(())
    }
}

/// Delete a file, or a directory tree recursively.
pub struct RemoveEntry;

#[async_trait]
impl EventHandler for RemoveEntry {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let [path] = fields else {
            return Err(ServerError::malformed(
                Event::RemoveRequest,
                "expected a path field",
            ));
        };
        let Ok(path) = std::str::from_utf8(path) else {
            ctx.conn.send_failure(FailureKind::BadPath, &[]).await?;
            return Ok(());
        };

        let removed = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() => tokio::fs::remove_dir_all(path).await,
            Ok(_) => tokio::fs::remove_file(path).await,
            Err(error) => Err(error),
        };
        match removed {
            Ok(()) => {
                ctx.conn.send_success().await?;
                debug!(path, "removed entry");
            }
            Err(error) => {
                debug!(path, error = %error, "remove failed");
                ctx.conn.send_failure(FailureKind::BadPath, &[]).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_assembly_counts_per_name() {
        let mut uploads = ChunkAssembly::default();
        assert_eq!(uploads.record("a.bin"), 1);
        assert_eq!(uploads.record("b.bin"), 1);
        assert_eq!(uploads.record("a.bin"), 2);
        uploads.finish("a.bin");
        assert_eq!(uploads.record("a.bin"), 1);
    }
}
