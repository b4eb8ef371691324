use crate::error::{DriftError, Result};
use crate::feed::RawFrame;
use std::fs;
use std::path::{Path, PathBuf};

/// Dumps inbound frames verbatim, one `websocket_output_*.json` file each.
///
/// Runs ahead of decoding so frames the decoder rejects can still be replayed.
#[derive(Debug)]
pub struct RawFrameWriter {
    dir: PathBuf,
    seq: u64,
}

impl RawFrameWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, seq: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames received in the same millisecond are told apart by `seq`
    pub fn file_name(frame: &RawFrame, seq: u64) -> String {
        format!(
            "websocket_output_{}_{:06}.json",
            frame.received_at.format("%Y%m%dT%H%M%S%3fZ"),
            seq
        )
    }

    pub fn write(&mut self, frame: &RawFrame) -> Result<PathBuf> {
        let path = self.dir.join(Self::file_name(frame, self.seq));
        fs::write(&path, &frame.bytes).map_err(|e| DriftError::sink("raw_frames", format!("{}: {}", path.display(), e)))?;
        self.seq += 1;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_frames_written_verbatim_with_unique_names() {
        let tmp = TempDir::new().unwrap();
        let mut writer = RawFrameWriter::new(tmp.path().join("raw")).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 10, 7, 4, 0, 0).unwrap();

        let first = writer.write(&RawFrame::new(r#"{"payload":{}}"#, at)).unwrap();
        let second = writer.write(&RawFrame::new("not json", at)).unwrap();

        assert_ne!(first, second);
        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "websocket_output_20241007T040000000Z_000000.json"
        );
        assert_eq!(fs::read_to_string(&first).unwrap(), r#"{"payload":{}}"#);
        assert_eq!(fs::read_to_string(&second).unwrap(), "not json");
        assert_eq!(fs::read_dir(writer.dir()).unwrap().count(), 2);
    }
}
