//! Read-until-pattern loop shared by the concrete targets.

use std::io::Write as _;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::engine::Pattern;
use crate::error::{BinExpectError, Result};

/// Incoming-data buffer plus the matching loop that fills it.
pub(crate) struct ExpectState {
    buffer: Vec<u8>,
    eof: bool,
    max_read: usize,
}

impl ExpectState {
    pub(crate) const fn new(max_read: usize) -> Self {
        Self {
            buffer: Vec::new(),
            eof: false,
            max_read,
        }
    }

    /// Whether the target's stream has ended.
    pub(crate) const fn is_eof(&self) -> bool {
        self.eof
    }

    /// Read from `reader` until `pattern` matches within the search window.
    ///
    /// On a match, everything up to and including the matched bytes is
    /// consumed from the buffer and the matched bytes are returned. A
    /// `timeout` of `None` waits forever.
    pub(crate) async fn expect<R>(
        &mut self,
        reader: &mut R,
        pattern: &Pattern,
        timeout: Option<Duration>,
        search_window: Option<usize>,
        mut log: Option<&mut std::fs::File>,
    ) -> Result<Vec<u8>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let window_start =
                search_window.map_or(0, |w| self.buffer.len().saturating_sub(w));
            if let Some((start, end)) = pattern.find(&self.buffer[window_start..]) {
                let match_end = window_start + end;
                let matched = self.buffer[window_start + start..match_end].to_vec();
                self.buffer.drain(..match_end);
                return Ok(matched);
            }

            if self.eof {
                return Err(BinExpectError::eof(
                    String::from_utf8_lossy(&self.buffer).into_owned(),
                ));
            }

            let mut chunk = vec![0u8; self.max_read.max(1)];
            let n = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(BinExpectError::timeout(
                            timeout.unwrap_or_default(),
                            pattern.describe(),
                            String::from_utf8_lossy(&self.buffer).into_owned(),
                        ));
                    }
                    match tokio::time::timeout(remaining, reader.read(&mut chunk)).await {
                        // Deadline passed mid-read; the next iteration reports it.
                        Err(_) => continue,
                        Ok(result) => result
                            .map_err(|e| BinExpectError::io_context("reading from target", e))?,
                    }
                }
                None => reader
                    .read(&mut chunk)
                    .await
                    .map_err(|e| BinExpectError::io_context("reading from target", e))?,
            };

            if n == 0 {
                self.eof = true;
                continue;
            }

            if let Some(log) = log.as_deref_mut() {
                log.write_all(&chunk[..n])
                    .map_err(|e| BinExpectError::io_context("writing session log", e))?;
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

impl std::fmt::Debug for ExpectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpectState")
            .field("buffered", &self.buffer.len())
            .field("eof", &self.is_eof())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn matches_and_consumes_through_the_match() {
        let (mut tx, mut rx) = tokio::io::duplex(256);
        tx.write_all(b"noise foo tail").await.unwrap();

        let mut state = ExpectState::new(2000);
        let matched = state
            .expect(&mut rx, &Pattern::exact(b"foo".as_slice()), Some(Duration::from_secs(1)), None, None)
            .await
            .unwrap();
        assert_eq!(matched, b"foo");
        assert_eq!(state.buffer, b" tail");
    }

    #[tokio::test]
    async fn times_out_without_data() {
        let (_tx, mut rx) = tokio::io::duplex(256);

        let mut state = ExpectState::new(2000);
        let err = state
            .expect(
                &mut rx,
                &Pattern::exact(b"never".as_slice()),
                Some(Duration::from_millis(50)),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn reports_eof_when_the_stream_ends() {
        let (mut tx, mut rx) = tokio::io::duplex(256);
        tx.write_all(b"partial").await.unwrap();
        drop(tx);

        let mut state = ExpectState::new(2000);
        let err = state
            .expect(
                &mut rx,
                &Pattern::exact(b"complete".as_slice()),
                Some(Duration::from_secs(1)),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_eof());
        assert!(state.is_eof());
        assert_eq!(err.buffer(), Some("partial"));
    }

    #[tokio::test]
    async fn search_window_limits_the_match() {
        let (mut tx, mut rx) = tokio::io::duplex(256);
        tx.write_all(b"marker xxxxxxxxxx").await.unwrap();

        // The marker scrolled out of the 8-byte window, so this times out.
        let mut state = ExpectState::new(2000);
        let err = state
            .expect(
                &mut rx,
                &Pattern::exact(b"marker".as_slice()),
                Some(Duration::from_millis(50)),
                Some(8),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn matches_across_chunked_reads() {
        let (mut tx, mut rx) = tokio::io::duplex(256);
        tx.write_all(b"hel").await.unwrap();

        let mut state = ExpectState::new(1);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.write_all(b"lo").await.unwrap();
        });

        let matched = state
            .expect(
                &mut rx,
                &Pattern::exact(b"hello".as_slice()),
                Some(Duration::from_secs(2)),
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(matched, b"hello");
    }
}
