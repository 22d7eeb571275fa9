// src/response_log.rs
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only log of raw node responses, split into numbered segments.
///
/// A new segment starts after every `rotate_every` recorded responses. The
/// counters are private; nothing outside this type needs them.
#[derive(Debug)]
pub struct ResponseLog {
    dir: PathBuf,
    rotate_every: u64,
    calls_in_segment: u64,
    segment: u64,
}

impl ResponseLog {
    pub fn new(dir: impl Into<PathBuf>, rotate_every: u64) -> Self {
        Self {
            dir: dir.into(),
            rotate_every: rotate_every.max(1),
            calls_in_segment: 0,
            segment: 0,
        }
    }

    fn segment_path(&self) -> PathBuf {
        self.dir
            .join(format!("api_responses_log_{}.txt", self.segment))
    }

    /// Append one response body as a single line.
    pub fn record(&mut self, body: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.segment_path())?;
        // keep one response per line even if the body is pretty-printed
        let line = body.replace('\n', " ");
        writeln!(file, "{}", line)?;

        self.calls_in_segment += 1;
        if self.calls_in_segment >= self.rotate_every {
            self.calls_in_segment = 0;
            self.segment += 1;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rotates_after_call_count() {
        let dir = tempdir().unwrap();
        let mut log = ResponseLog::new(dir.path().join("logs"), 2);

        for i in 0..5 {
            log.record(&format!("{{\"n\":{}}}", i)).unwrap();
        }

        let read = |n: u64| {
            fs::read_to_string(log.dir().join(format!("api_responses_log_{}.txt", n))).unwrap()
        };
        assert_eq!(read(0).lines().count(), 2);
        assert_eq!(read(1).lines().count(), 2);
        assert_eq!(read(2).lines().collect::<Vec<_>>(), vec!["{\"n\":4}"]);
    }

    #[test]
    fn test_multiline_body_stays_on_one_line() {
        let dir = tempdir().unwrap();
        let mut log = ResponseLog::new(dir.path(), 1000);
        log.record("{\n  \"a\": 1\n}").unwrap();

        let content = fs::read_to_string(dir.path().join("api_responses_log_0.txt")).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
