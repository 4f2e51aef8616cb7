//! Async driver around [`Chat`].
//!
//! A [`Session`] runs each exchange's transport on a background task and funnels the bytes back
//! through a channel, so every state mutation still happens on the caller's task.

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::{Chat, StreamEvent, Update};
use crate::error::Error;
use crate::message::Message;

pub type ByteStream = BoxStream<'static, Result<Vec<u8>, Error>>;

/// Sends a conversation to the relay and hands back the raw response body.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, messages: Vec<Message>) -> BoxFuture<'static, Result<ByteStream, Error>>;
}

type Tagged = (u64, StreamEvent);

pub struct Session<T: Transport> {
    chat: Chat,
    transport: Arc<T>,
    sender: mpsc::UnboundedSender<Tagged>,
    receiver: mpsc::UnboundedReceiver<Tagged>,
    task: Option<JoinHandle<()>>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            chat: Chat::new(),
            transport: Arc::new(transport),
            sender,
            receiver,
            task: None,
        }
    }

    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.chat.set_input(input);
    }

    /// Submits the current input.
    ///
    /// Returns `false` when the input was blank. A stream still running for an earlier submit is
    /// aborted. Outside a tokio runtime the exchange fails right away instead of starting.
    pub fn submit(&mut self) -> bool {
        let Some(submission) = self.chat.submit() else {
            return false;
        };

        if let Some(task) = self.task.take() {
            task.abort();
        }

        let generation = submission.generation;
        let sender = self.sender.clone();

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("cannot start the exchange: {}", e);
                let _ = sender.send((generation, StreamEvent::Failed(e.to_string())));
                return true;
            }
        };

        let request = self.transport.send(submission.messages);

        self.task = Some(runtime.spawn(async move {
            let mut body = match request.await {
                Ok(body) => body,
                Err(e) => {
                    let _ = sender.send((generation, StreamEvent::Failed(e.to_string())));
                    return;
                }
            };

            while let Some(chunk) = body.next().await {
                let event = match chunk {
                    Ok(bytes) => StreamEvent::Chunk(bytes),
                    Err(e) => {
                        let _ = sender.send((generation, StreamEvent::Failed(e.to_string())));
                        return;
                    }
                };

                if sender.send((generation, event)).is_err() {
                    return;
                }
            }

            let _ = sender.send((generation, StreamEvent::End));
        }));

        true
    }

    /// Waits for the next change to the conversation. Returns `None` once nothing is in flight.
    pub async fn next(&mut self) -> Option<Update> {
        while self.chat.loading() {
            let (generation, event) = self.receiver.recv().await?;
            if let Some(update) = self.chat.apply(generation, event) {
                return Some(update);
            }
        }

        None
    }

    /// Drives the current exchange to its end and returns the error it ended with, if any.
    pub async fn wait(&mut self) -> Option<String> {
        while self.next().await.is_some() {}
        self.chat.error().map(ToString::to_string)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
