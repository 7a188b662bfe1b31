use crate::model::DrainStop;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::Poll;
use tokio::io::{AsyncRead, ReadBuf};

/// Collects only what the stream can hand over without waiting.
pub struct AvailableReader {
    max_bytes: usize,
}

impl AvailableReader {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes: max_bytes.max(1),
        }
    }

    /// Never fails outright: a read error ends the drain and is returned
    /// next to whatever was collected before it.
    pub async fn drain<T: AsyncRead + Unpin>(&self, stream: &mut T) -> Drained {
        let mut buf = vec![0u8; self.max_bytes];
        let mut total = 0usize;
        let mut reason = DrainStop::Idle;
        let mut error = None;
        while total < self.max_bytes {
            match read_ready(stream, &mut buf[total..]).await {
                Ok(Some(0)) => {
                    reason = DrainStop::ConnectionClosed;
                    break;
                }
                Ok(Some(n)) => total += n,
                Ok(None) => break,
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }
        if total >= self.max_bytes {
            reason = DrainStop::SizeLimit;
        }
        buf.truncate(total);
        Drained {
            bytes: buf,
            reason,
            error,
        }
    }
}

#[derive(Debug)]
pub struct Drained {
    pub bytes: Vec<u8>,
    pub reason: DrainStop,
    pub error: Option<std::io::Error>,
}

/// Polls the stream exactly once. `None` means nothing is buffered right now.
async fn read_ready<T: AsyncRead + Unpin>(
    stream: &mut T,
    buf: &mut [u8],
) -> std::io::Result<Option<usize>> {
    let mut read_buf = ReadBuf::new(buf);
    poll_fn(|cx| match Pin::new(&mut *stream).poll_read(cx, &mut read_buf) {
        Poll::Ready(Ok(())) => Poll::Ready(Ok(Some(read_buf.filled().len()))),
        Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
        Poll::Pending => Poll::Ready(Ok(None)),
    })
    .await
}
