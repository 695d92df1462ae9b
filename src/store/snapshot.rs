use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::CollectionKind;

/// Frame a payload as `[u32: len][payload][u32: crc32]`.
fn encode_frame(writer: &mut impl Write, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "snapshot too large"))?;
    let crc = crc32fast::hash(payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Validate a frame and return its payload. A snapshot is one frame with
/// nothing after it, so any length disagreement is corruption.
pub(super) fn decode_frame(bytes: &[u8]) -> Result<&[u8], String> {
    if bytes.len() < 8 {
        return Err(format!("truncated: {} bytes", bytes.len()));
    }
    let (len_buf, rest) = bytes.split_at(4);
    let len = u32::from_le_bytes([len_buf[0], len_buf[1], len_buf[2], len_buf[3]]) as usize;
    if rest.len() != len + 4 {
        return Err(format!("length mismatch: header says {len}, found {}", rest.len().saturating_sub(4)));
    }
    let (payload, crc_buf) = rest.split_at(len);
    let stored_crc = u32::from_le_bytes([crc_buf[0], crc_buf[1], crc_buf[2], crc_buf[3]]);
    if stored_crc != crc32fast::hash(payload) {
        return Err("checksum mismatch".into());
    }
    Ok(payload)
}

pub(super) fn encode_records<T: Serialize>(records: &[&T]) -> io::Result<Vec<u8>> {
    bincode::serialize(records).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Decode a framed snapshot. Unknown enum values fail here, at the load
/// boundary, rather than leaking into the engine.
pub(super) fn decode_records<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, String> {
    let payload = decode_frame(bytes)?;
    bincode::deserialize(payload).map_err(|e| format!("undecodable records: {e}"))
}

/// Write a snapshot to a temp file, fsync, and rename it over `path`.
pub(super) fn write_snapshot_file(path: &Path, payload: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("snap.tmp");
    let file = File::create(&tmp_path)?;
    let mut writer = BufWriter::new(file);
    encode_frame(&mut writer, payload)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    fs::rename(&tmp_path, path)
}

/// Raw snapshot bytes, or `None` if the file has never been written.
pub(super) fn read_snapshot_file(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// ── Group-commit snapshot writer ─────────────────────────

pub(super) enum SnapshotCommand {
    Write {
        collection: CollectionKind,
        payload: Vec<u8>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

type PendingWrite = (CollectionKind, Vec<u8>, oneshot::Sender<io::Result<()>>);

/// Background task that owns the snapshot files.
/// 1. Block until the first Write arrives.
/// 2. Drain all immediately available Writes (the batch window).
/// 3. Write only the newest snapshot per collection.
/// 4. Respond to every sender with its collection's result.
pub(super) async fn snapshot_writer_loop(dir: PathBuf, mut rx: mpsc::Receiver<SnapshotCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            SnapshotCommand::Write {
                collection,
                payload,
                response,
            } => {
                let mut batch: Vec<PendingWrite> = vec![(collection, payload, response)];
                let mut shutdown = None;

                loop {
                    match rx.try_recv() {
                        Ok(SnapshotCommand::Write {
                            collection,
                            payload,
                            response,
                        }) => batch.push((collection, payload, response)),
                        Ok(SnapshotCommand::Shutdown { response }) => {
                            shutdown = Some(response);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                metrics::histogram!(crate::observability::SNAPSHOT_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                flush_batch(&dir, batch);
                metrics::histogram!(crate::observability::SNAPSHOT_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());

                if let Some(done) = shutdown {
                    let _ = done.send(());
                    return;
                }
            }
            SnapshotCommand::Shutdown { response } => {
                let _ = response.send(());
                return;
            }
        }
    }
}

fn flush_batch(dir: &Path, batch: Vec<PendingWrite>) {
    // Writes for one collection arrive in commit order, so the last one wins.
    let mut newest: HashMap<CollectionKind, usize> = HashMap::new();
    for (idx, (collection, _, _)) in batch.iter().enumerate() {
        newest.insert(*collection, idx);
    }

    let mut results: HashMap<CollectionKind, io::Result<()>> = HashMap::new();
    for (collection, idx) in &newest {
        let path = dir.join(collection.file_name());
        let result = write_snapshot_file(&path, &batch[*idx].1);
        if let Err(e) = &result {
            tracing::error!("snapshot write for {collection} failed: {e}");
        }
        results.insert(*collection, result);
    }

    for (collection, _, tx) in batch {
        let r = match results.get(&collection) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(io::Error::new(e.kind(), e.to_string())),
            None => Err(io::Error::other("snapshot not written")),
        };
        let _ = tx.send(r);
    }
}
