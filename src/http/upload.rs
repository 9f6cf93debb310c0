//! Synthetic upload payload.

use axum::body::Body;
use bytes::Bytes;
use futures_util::stream;
use std::convert::Infallible;
use tokio::sync::oneshot;

/// Zero-filled streaming body of `total` bytes in `chunk`-sized pieces.
///
/// The receiver fires once the last chunk has been handed out. Nothing is
/// buffered beyond a single shared chunk.
pub fn zero_stream(total: u64, chunk: usize) -> (Body, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    let zeros = Bytes::from(vec![0u8; chunk.max(1)]);

    let chunks = stream::unfold((total, Some(tx)), move |(remaining, mut done)| {
        let zeros = zeros.clone();
        async move {
            if remaining == 0 {
                if let Some(done) = done.take() {
                    let _ = done.send(());
                }
                return None;
            }
            let n = remaining.min(zeros.len() as u64) as usize;
            Some((Ok::<_, Infallible>(zeros.slice(..n)), (remaining - n as u64, done)))
        }
    });

    (Body::from_stream(chunks), rx)
}
