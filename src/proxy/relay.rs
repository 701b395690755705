//! Size-limited streaming relay.
//!
//! The upstream body is re-cut into `chunk_size` pieces and handed to the
//! caller one at a time. The next upstream read only happens when the caller
//! asks for the next chunk, so a slow caller slows the upstream down.
//!
//! # Truncation
//! Once the running byte count exceeds the size budget the relay stops and
//! the body simply ends. Response headers are already on the wire at that
//! point, so no error status can be sent: callers can only detect a cut by
//! comparing the bytes received with `Content-Length` when one was sent.
//!
//! The upstream stream is dropped, and with it the upstream connection, as
//! soon as the relay finishes for any reason, including the caller going away.

use std::error::Error as StdError;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt};
use thiserror::Error;

use crate::config::ProxyConfig;
use crate::observability::metrics;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Starting buffer capacity. Larger chunks grow the buffer as data arrives.
const INITIAL_BUFFER_CAPACITY: usize = 16 * 1024;

/// Mid-stream failure. Ends the caller's body with an error.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream read failed: {0}")]
    Read(#[source] BoxError),

    #[error("upstream read stalled for {0:?}")]
    Stalled(Duration),
}

/// Limits applied to one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayLimits {
    pub chunk_size: usize,
    /// `None` = unlimited.
    pub max_size: Option<u64>,
    /// Bound on each individual upstream read.
    pub read_timeout: Duration,
}

impl From<&ProxyConfig> for RelayLimits {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            max_size: config.max_size(),
            read_timeout: config.timeout(),
        }
    }
}

struct RelayState<S> {
    upstream: S,
    buffer: BytesMut,
    relayed: u64,
    eof: bool,
    limits: RelayLimits,
}

impl<S, E> RelayState<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
{
    /// Next full chunk, or the short remainder at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
        let chunk_size = self.limits.chunk_size;

        while self.buffer.len() < chunk_size && !self.eof {
            match tokio::time::timeout(self.limits.read_timeout, self.upstream.next()).await {
                Err(_) => return Err(RelayError::Stalled(self.limits.read_timeout)),
                Ok(None) => self.eof = true,
                Ok(Some(Err(e))) => return Err(RelayError::Read(e.into())),
                Ok(Some(Ok(bytes))) => self.buffer.extend_from_slice(&bytes),
            }
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }
        let take = self.buffer.len().min(chunk_size);
        Ok(Some(self.buffer.split_to(take).freeze()))
    }

    fn over_budget(&self) -> bool {
        self.limits.max_size.is_some_and(|max| self.relayed > max)
    }
}

/// Relay `upstream` to the caller under `limits`.
pub fn relay<S, E>(
    upstream: S,
    limits: RelayLimits,
) -> impl Stream<Item = Result<Bytes, RelayError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<BoxError> + Send + 'static,
{
    let state = RelayState {
        upstream,
        buffer: BytesMut::with_capacity(limits.chunk_size.min(INITIAL_BUFFER_CAPACITY)),
        relayed: 0,
        eof: false,
        limits,
    };

    // Returning `None` drops the state, which closes the upstream.
    stream::unfold(Some(state), |state| async move {
        let mut state = state?;

        match state.next_chunk().await {
            Ok(Some(chunk)) => {
                state.relayed += chunk.len() as u64;
                if state.over_budget() {
                    tracing::warn!(
                        max_size = ?state.limits.max_size,
                        relayed = state.relayed - chunk.len() as u64,
                        "Proxying stopped: content exceeded max size"
                    );
                    metrics::record_truncated();
                    return None;
                }
                metrics::record_relayed_bytes(chunk.len() as u64);
                Some((Ok(chunk), Some(state)))
            }
            Ok(None) => {
                tracing::debug!(relayed = state.relayed, "Relay complete");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, relayed = state.relayed, "Relay aborted");
                Some((Err(e), None))
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    /// Upstream stand-in that counts reads and notices being dropped.
    struct Tracked<S> {
        inner: S,
        reads: Arc<AtomicUsize>,
        dropped: Arc<AtomicBool>,
    }

    impl<S: Stream + Unpin> Stream for Tracked<S> {
        type Item = S::Item;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            let poll = Pin::new(&mut self.inner).poll_next(cx);
            if let Poll::Ready(Some(_)) = poll {
                self.reads.fetch_add(1, Ordering::SeqCst);
            }
            poll
        }
    }

    impl<S> Drop for Tracked<S> {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    type Item = Result<Bytes, std::io::Error>;
    type Upstream = Tracked<stream::Iter<std::vec::IntoIter<Item>>>;

    fn tracked(pieces: Vec<&'static [u8]>) -> (Upstream, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicBool::new(false));
        let items: Vec<Item> = pieces.into_iter().map(|p| Ok(Bytes::from_static(p))).collect();
        let upstream = Tracked {
            inner: stream::iter(items),
            reads: reads.clone(),
            dropped: dropped.clone(),
        };
        (upstream, reads, dropped)
    }

    fn limits(chunk_size: usize, max_size: Option<u64>) -> RelayLimits {
        RelayLimits {
            chunk_size,
            max_size,
            read_timeout: Duration::from_secs(5),
        }
    }

    async fn collect_ok<S>(s: S) -> Vec<Bytes>
    where
        S: Stream<Item = Result<Bytes, RelayError>>,
    {
        s.map(|r| r.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_rechunks_to_chunk_size() {
        let (upstream, _, _) = tracked(vec![&b"abcdefg"[..], &b"hij"[..], &b"k"[..]]);
        let chunks = collect_ok(relay(upstream, limits(4, None))).await;
        assert_eq!(chunks, vec![&b"abcd"[..], &b"efgh"[..], &b"ijk"[..]]);
    }

    #[tokio::test]
    async fn test_truncates_after_budget_and_closes_upstream() {
        // 20 bytes, one byte per upstream read, no declared length.
        let pieces: Vec<&'static [u8]> = b"0123456789abcdefghij".chunks(1).collect();
        let (upstream, reads, dropped) = tracked(pieces);

        let chunks = collect_ok(relay(upstream, limits(4, Some(10)))).await;

        let total: usize = chunks.iter().map(Bytes::len).sum();
        assert_eq!(chunks.len(), 2);
        assert_eq!(total, 8);
        assert_eq!(chunks.concat(), b"01234567");
        // Only the chunk that crossed the budget was read beyond what was sent.
        assert_eq!(reads.load(Ordering::SeqCst), 12);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_huge_chunk_size_buffers_only_what_arrives() {
        let (upstream, _, dropped) = tracked(vec![&b"small"[..], &b" body"[..]]);
        let chunks = collect_ok(relay(upstream, limits(usize::MAX, None))).await;
        assert_eq!(chunks, vec![&b"small body"[..]]);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_exact_budget_is_not_truncated() {
        let (upstream, _, _) = tracked(vec![&b"0123456789"[..]]);
        let chunks = collect_ok(relay(upstream, limits(4, Some(10)))).await;
        assert_eq!(chunks.concat(), b"0123456789");
    }

    #[tokio::test]
    async fn test_reads_only_on_demand() {
        let (upstream, reads, dropped) = tracked(vec![&b"aaaa"[..], &b"bbbb"[..], &b"cccc"[..]]);
        let mut body = Box::pin(relay(upstream, limits(4, None)));

        assert_eq!(&body.next().await.unwrap().unwrap()[..], b"aaaa");
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        // Caller goes away mid-stream.
        drop(body);
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_error_ends_stream() {
        let items: Vec<Item> = vec![
            Ok(Bytes::from_static(b"abcd")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"never")),
        ];
        let results: Vec<_> = relay(stream::iter(items), limits(4, None)).collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(&results[0].as_ref().unwrap()[..], b"abcd");
        assert!(matches!(results[1], Err(RelayError::Read(_))));
    }

    #[tokio::test]
    async fn test_stalled_upstream_times_out() {
        let stalled = stream::pending::<Item>();
        let limits = RelayLimits {
            chunk_size: 4,
            max_size: None,
            read_timeout: Duration::from_millis(20),
        };
        let results: Vec<_> = relay(stalled, limits).collect().await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(RelayError::Stalled(_))));
    }

    #[test]
    fn test_limits_from_config() {
        let config = ProxyConfig {
            timeout_secs: 7,
            chunk_size: 1024,
            max_file_size: 0,
            download_proxy: None,
        };
        let limits = RelayLimits::from(&config);
        assert_eq!(limits.chunk_size, 1024);
        assert_eq!(limits.max_size, None);
        assert_eq!(limits.read_timeout, Duration::from_secs(7));
    }
}
