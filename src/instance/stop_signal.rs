use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub(super) fn new() -> (StopHandle, StopSignal) {
    let (tx, rx) = oneshot::channel();

    (StopHandle { tx }, StopSignal { rx })
}

/// Sending `stop()` or dropping the handle both resolve the paired `StopSignal`, so a process
/// whose handle is lost still gets killed.
pub(super) struct StopHandle {
    tx: oneshot::Sender<()>,
}

impl StopHandle {
    pub(super) fn stop(self) {
        let _ = self.tx.send(());
    }
}

pub(super) struct StopSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for StopSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = Pin::new(&mut self.rx);

        match rx.poll(cx) {
            Poll::Pending => Poll::Pending,
            // Sent or dropped, either way we stop.
            Poll::Ready(_) => Poll::Ready(()),
        }
    }
}
