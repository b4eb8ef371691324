use super::decoder::RawFrame;
use crate::clock::Clock;
use crate::error::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::info;

/// Forward newline-delimited frames from `reader` until EOF.
///
/// Returns the number of frames forwarded. Stops early if the consumer closes.
pub async fn read_frames<R>(reader: R, clock: Arc<dyn Clock>, tx: mpsc::Sender<RawFrame>) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        if tx.send(RawFrame::new(line, clock.now())).await.is_err() {
            info!(forwarded, "Frame consumer closed, stdin reader exiting");
            return Ok(forwarded);
        }
        forwarded += 1;
    }

    info!(forwarded, "Input exhausted");
    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_forwards_non_blank_lines() {
        let at = Utc.with_ymd_and_hms(2024, 10, 7, 4, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(at));
        let (tx, mut rx) = mpsc::channel(8);

        let input: &[u8] = b"{\"a\":1}\n\n   \n{\"b\":2}\n";
        let forwarded = read_frames(input, clock, tx).await.unwrap();
        assert_eq!(forwarded, 2);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.bytes, b"{\"a\":1}".to_vec());
        assert_eq!(first.received_at, at);
        assert_eq!(rx.recv().await.unwrap().bytes, b"{\"b\":2}".to_vec());
        assert!(rx.recv().await.is_none());
    }
}
