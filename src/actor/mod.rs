use crate::api::ReplSetError;
use crate::controller::{ReplSetController, StartupReport, Teardown};
use std::error::Error;
use std::fmt::Debug;
use tokio::sync::{mpsc, oneshot};

// Controller logic is serialized by funnelling every request, and every background result,
// through one event queue.
#[derive(Debug)]
enum Event {
    // Stopped/Errored: begin a startup attempt. Init/Running: no-op.
    Start(Callback<(), ReplSetError>),

    // Any state: cancel startup, transition to Stopped, respond with the teardown to await.
    Stop(Callback<Teardown, ReplSetError>),

    // Init (same generation): transition to Running or Errored. Otherwise discarded.
    StartupFinished(StartupReport),
}

#[derive(Debug)]
struct Callback<O: Debug, E: Error>(oneshot::Sender<Result<O, E>>);

impl<O: Debug, E: Error> Callback<O, E> {
    pub fn send(self, message: Result<O, E>) {
        // Caller may have given up waiting.
        let _ = self.0.send(message);
    }
}

#[derive(Clone)]
pub(crate) struct ActorClient {
    sender: mpsc::Sender<Event>,
}

impl ActorClient {
    pub(crate) fn new(buffer_size: usize) -> (Self, ActorQueueReceiver) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (ActorClient { sender: tx }, ActorQueueReceiver(rx))
    }

    /// Background tasks hold a weak client so they never keep the controller alive on their own.
    pub(crate) fn weak(&self) -> WeakActorClient {
        WeakActorClient {
            sender: self.sender.downgrade(),
        }
    }

    pub(crate) async fn start(&self) -> Result<(), ReplSetError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Start(Callback(tx))).await?;

        rx.await.map_err(|_| ReplSetError::ControllerExited)?
    }

    pub(crate) async fn stop(&self) -> Result<Teardown, ReplSetError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Stop(Callback(tx))).await?;

        rx.await.map_err(|_| ReplSetError::ControllerExited)?
    }

    async fn send(&self, event: Event) -> Result<(), ReplSetError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| ReplSetError::ControllerExited)
    }
}

pub(crate) struct ActorQueueReceiver(mpsc::Receiver<Event>);

#[derive(Clone)]
pub(crate) struct WeakActorClient {
    sender: mpsc::WeakSender<Event>,
}

impl WeakActorClient {
    pub(crate) async fn startup_finished(&self, report: StartupReport) {
        if let Some(sender) = self.sender.upgrade() {
            // Controller gone means nobody is left to care.
            let _ = sender.send(Event::StartupFinished(report)).await;
        }
    }
}

/// ReplSetActor is the controller in actor model.
pub(crate) struct ReplSetActor {
    logger: slog::Logger,
    receiver: mpsc::Receiver<Event>,
    controller: ReplSetController,
}

impl ReplSetActor {
    pub(crate) fn new(logger: slog::Logger, receiver: ActorQueueReceiver, controller: ReplSetController) -> Self {
        ReplSetActor {
            logger,
            receiver: receiver.0,
            controller,
        }
    }

    pub(crate) async fn run_event_loop(mut self) {
        while let Some(event) = self.receiver.recv().await {
            self.handle_event(event);
        }
        slog::debug!(self.logger, "Event loop exited");
    }

    // This must NOT be async. Any long running work must be spawned on another task
    // and come back as an event to this actor.
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(callback) => {
                self.controller.start();
                callback.send(Ok(()));
            }
            Event::Stop(callback) => {
                let teardown = self.controller.stop();
                callback.send(Ok(teardown));
            }
            Event::StartupFinished(report) => {
                self.controller.startup_finished(report);
            }
        }
    }
}
