//! Connection IO with inactivity deadlines.
//!
//! # Responsibilities
//! - Establish TCP connections under the connect deadline
//! - Fail a read that sees no bytes for the read timeout
//! - Fail a write that makes no progress for the write timeout
//! - Emit connection metrics tagged by service id
//!
//! A deadline is armed when an operation first returns `Pending` and cleared
//! as soon as it makes progress. Written bytes also clear the read deadline,
//! so a pooled connection does not carry idle time into its next exchange.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::http::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::time::Sleep;
use tower::Service;

use crate::observability::metrics;
use crate::resilience::timeouts::{InactivityElapsed, TimeoutLeg, Timeouts};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// IO wrapper enforcing read and write inactivity timeouts.
#[derive(Debug)]
pub struct InactivityIo<T> {
    inner: T,
    read_timeout: Duration,
    write_timeout: Duration,
    read_deadline: Option<Pin<Box<Sleep>>>,
    write_deadline: Option<Pin<Box<Sleep>>>,
}

impl<T> InactivityIo<T> {
    pub fn new(inner: T, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            inner,
            read_timeout,
            write_timeout,
            read_deadline: None,
            write_deadline: None,
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

/// Poll (arming if needed) the deadline in `slot`.
fn poll_deadline(
    slot: &mut Option<Pin<Box<Sleep>>>,
    timeout: Duration,
    leg: TimeoutLeg,
    cx: &mut Context<'_>,
) -> Poll<io::Result<()>> {
    let deadline = slot.get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
    match deadline.as_mut().poll(cx) {
        Poll::Ready(()) => {
            *slot = None;
            tracing::debug!(leg = %leg, timeout_ms = timeout.as_millis() as u64, "Connection inactivity timeout");
            Poll::Ready(Err(InactivityElapsed(leg).into_io()))
        }
        Poll::Pending => Poll::Pending,
    }
}

impl<T: Read + Unpin> Read for InactivityIo<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.read_deadline = None;
                Poll::Ready(result)
            }
            Poll::Pending => {
                poll_deadline(&mut this.read_deadline, this.read_timeout, TimeoutLeg::Read, cx)
            }
        }
    }
}

impl<T: Write + Unpin> Write for InactivityIo<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(result) => {
                this.write_deadline = None;
                if matches!(result, Ok(n) if n > 0) {
                    this.read_deadline = None;
                }
                Poll::Ready(result)
            }
            Poll::Pending => {
                match poll_deadline(&mut this.write_deadline, this.write_timeout, TimeoutLeg::Write, cx) {
                    Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                    _ => Poll::Pending,
                }
            }
        }
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_write_vectored(cx, bufs) {
            Poll::Ready(result) => {
                this.write_deadline = None;
                if matches!(result, Ok(n) if n > 0) {
                    this.read_deadline = None;
                }
                Poll::Ready(result)
            }
            Poll::Pending => {
                match poll_deadline(&mut this.write_deadline, this.write_timeout, TimeoutLeg::Write, cx) {
                    Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                    _ => Poll::Pending,
                }
            }
        }
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_flush(cx) {
            Poll::Ready(result) => {
                this.write_deadline = None;
                Poll::Ready(result)
            }
            Poll::Pending => {
                poll_deadline(&mut this.write_deadline, this.write_timeout, TimeoutLeg::Write, cx)
            }
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl<T: Connection> Connection for InactivityIo<T> {
    fn connected(&self) -> Connected {
        self.inner.connected()
    }
}

/// Connector producing [`InactivityIo`] connections under a connect deadline.
#[derive(Debug, Clone)]
pub struct TimeoutConnector {
    http: HttpConnector,
    read_timeout: Duration,
    write_timeout: Duration,
    service_id: Arc<str>,
}

impl TimeoutConnector {
    pub fn new(timeouts: &Timeouts, service_id: &str) -> Self {
        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(timeouts.connect));
        http.set_nodelay(true);
        Self {
            http,
            read_timeout: timeouts.read,
            write_timeout: timeouts.write,
            service_id: Arc::from(service_id),
        }
    }
}

impl Service<Uri> for TimeoutConnector {
    type Response = InactivityIo<TokioIo<TcpStream>>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.http.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let connecting = self.http.call(dst.clone());
        let read_timeout = self.read_timeout;
        let write_timeout = self.write_timeout;
        let service_id = self.service_id.clone();

        Box::pin(async move {
            let start = Instant::now();
            match connecting.await {
                Ok(io) => {
                    metrics::record_connection(&service_id, "established", start);
                    tracing::debug!(service = %service_id, target = %dst, "Backend connection established");
                    Ok(InactivityIo::new(io, read_timeout, write_timeout))
                }
                Err(e) => {
                    metrics::record_connection(&service_id, "failed", start);
                    tracing::warn!(service = %service_id, target = %dst, error = %e, "Backend connection failed");
                    Err(e.into())
                }
            }
        })
    }
}
