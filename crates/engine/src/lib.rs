//! Thread channels between the frontend (GPU thread) and the backend
//! (read manager plus its workers).
//!
//! - Backend to frontend: a bounded multi-producer channel. Every worker holds
//!   its own [`FrontendMessageSender`] clone, so ordering is FIFO per sender.
//! - Frontend to backend: a single-producer ring for camera commands, with a
//!   one-slot notify channel so the backend can sleep while idle.

use std::time::{Duration, Instant};

use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendError, Sender, TryRecvError, TrySendError, bounded,
};
use protocol::Message;
use rtrb::{Consumer, Producer, PushError, RingBuffer};
use static_assertions::assert_not_impl_any;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub frontend_capacity: usize,
    pub backend_command_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            frontend_capacity: 1024,
            backend_command_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("message channel disconnected")]
    Disconnected,
}

pub struct FrontendChannels<B> {
    pub message_receiver: FrontendMessageReceiver<B>,
    pub command_producer: BackendCommandProducer<B>,
}

pub struct BackendChannels<B> {
    pub message_sender: FrontendMessageSender<B>,
    pub command_consumer: BackendCommandConsumer<B>,
}

pub struct FrontendMessageSender<B> {
    sender: Sender<Message<B>>,
}

impl<B> Clone for FrontendMessageSender<B> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<B> FrontendMessageSender<B> {
    /// Blocks while the channel is full. A disconnected frontend drops the
    /// message, releasing any bucket it carries on this thread.
    pub fn send(&self, message: impl Into<Message<B>>) -> Result<(), ChannelError> {
        match self.sender.send(message.into()) {
            Ok(()) => Ok(()),
            Err(SendError(message)) => {
                log::error!(
                    "frontend channel: receiver gone, dropping {:?}",
                    message.kind()
                );
                Err(ChannelError::Disconnected)
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

pub struct FrontendMessageReceiver<B> {
    receiver: Receiver<Message<B>>,
}

impl<B> FrontendMessageReceiver<B> {
    pub fn try_recv(&self) -> Result<Option<Message<B>>, ChannelError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Message<B>>, ChannelError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }

    /// Drain up to `max_items` messages into `output`, waiting at most
    /// `wait_timeout` for the first one.
    ///
    /// NOTE:
    /// - This function APPENDS to `output`.
    /// - Returns the number of appended messages.
    /// - Errors only once every sender is gone and the channel is empty.
    pub fn drain_batch_with_wait(
        &self,
        output: &mut Vec<Message<B>>,
        max_items: usize,
        wait_timeout: Duration,
    ) -> Result<usize, ChannelError> {
        if max_items == 0 {
            return Ok(0);
        }

        let mut drained_count = 0;
        if !wait_timeout.is_zero() {
            match self.recv_timeout(wait_timeout)? {
                Some(message) => {
                    output.push(message);
                    drained_count += 1;
                }
                None => return Ok(0),
            }
        }

        while drained_count < max_items {
            match self.receiver.try_recv() {
                Ok(message) => {
                    output.push(message);
                    drained_count += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if drained_count == 0 {
                        return Err(ChannelError::Disconnected);
                    }
                    break;
                }
            }
        }
        Ok(drained_count)
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

pub struct BackendCommandProducer<B> {
    producer: Producer<Message<B>>,
    notify_sender: Sender<()>,
}

impl<B> BackendCommandProducer<B> {
    pub fn push(&mut self, message: impl Into<Message<B>>) -> Result<(), PushError<Message<B>>> {
        self.producer.push(message.into())?;
        self.notify();
        Ok(())
    }

    /// Spins until the ring has room.
    pub fn blocking_push(&mut self, message: impl Into<Message<B>>) -> Result<(), ChannelError> {
        let mut message = message.into();
        loop {
            if self.producer.is_abandoned() {
                return Err(ChannelError::Disconnected);
            }
            match self.producer.push(message) {
                Ok(()) => break,
                Err(PushError::Full(returned)) => {
                    message = returned;
                    std::thread::yield_now();
                }
            }
        }
        self.notify();
        Ok(())
    }

    pub fn slots(&self) -> usize {
        self.producer.slots()
    }

    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }

    fn notify(&self) {
        match self.notify_sender.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                log::debug!("backend command ring: consumer gone before notify");
            }
        }
    }
}

pub struct BackendCommandConsumer<B> {
    consumer: Consumer<Message<B>>,
    notify_receiver: Receiver<()>,
}

impl<B> BackendCommandConsumer<B> {
    pub fn pop(&mut self) -> Option<Message<B>> {
        self.consumer.pop().ok()
    }

    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }

    /// Drain up to `max_items` commands into `output`, waiting at most
    /// `wait_timeout` when the ring is empty.
    ///
    /// NOTE:
    /// - This function APPENDS to `output`.
    /// - Errors once the producer is gone and the ring is empty.
    pub fn drain_batch_with_wait(
        &mut self,
        output: &mut Vec<Message<B>>,
        max_items: usize,
        wait_timeout: Duration,
    ) -> Result<usize, ChannelError> {
        if max_items == 0 {
            return Ok(0);
        }

        let mut drained_count = self.drain_available(output, max_items);
        if drained_count > 0 {
            return Ok(drained_count);
        }
        if self.consumer.is_abandoned() {
            return Err(ChannelError::Disconnected);
        }
        if wait_timeout.is_zero() {
            return Ok(0);
        }

        let wait_deadline = Instant::now() + wait_timeout;
        loop {
            let now = Instant::now();
            if now >= wait_deadline {
                return Ok(drained_count);
            }
            let remaining = wait_deadline.saturating_duration_since(now);
            match self.notify_receiver.recv_timeout(remaining) {
                Ok(()) => {
                    drained_count += self.drain_available(output, max_items - drained_count);
                    if drained_count > 0 {
                        return Ok(drained_count);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Ok(drained_count),
                Err(RecvTimeoutError::Disconnected) => {
                    drained_count += self.drain_available(output, max_items - drained_count);
                    if drained_count > 0 {
                        return Ok(drained_count);
                    }
                    return Err(ChannelError::Disconnected);
                }
            }
        }
    }

    fn drain_available(&mut self, output: &mut Vec<Message<B>>, max_items: usize) -> usize {
        let mut drained_count = 0;
        while drained_count < max_items {
            match self.consumer.pop() {
                Ok(message) => {
                    output.push(message);
                    drained_count += 1;
                }
                Err(_) => break,
            }
        }
        drained_count
    }
}

// A second receiver or command producer would break the single-consumer and
// single-producer contracts.
assert_not_impl_any!(FrontendMessageReceiver<()>: Clone);
assert_not_impl_any!(BackendCommandProducer<()>: Clone);
assert_not_impl_any!(BackendCommandConsumer<()>: Clone);

pub fn create_thread_channels<B>(config: ChannelConfig) -> (FrontendChannels<B>, BackendChannels<B>) {
    assert!(
        config.frontend_capacity > 0,
        "frontend message capacity must be greater than zero"
    );
    assert!(
        config.backend_command_capacity > 0,
        "backend command capacity must be greater than zero"
    );

    let (message_sender, message_receiver) = bounded(config.frontend_capacity);
    let (command_producer, command_consumer) = RingBuffer::new(config.backend_command_capacity);
    let (notify_sender, notify_receiver) = bounded(1);

    let frontend_channels = FrontendChannels {
        message_receiver: FrontendMessageReceiver {
            receiver: message_receiver,
        },
        command_producer: BackendCommandProducer {
            producer: command_producer,
            notify_sender,
        },
    };

    let backend_channels = BackendChannels {
        message_sender: FrontendMessageSender {
            sender: message_sender,
        },
        command_consumer: BackendCommandConsumer {
            consumer: command_consumer,
            notify_receiver,
        },
    };

    (frontend_channels, backend_channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{TileGeneration, TileKey};
    use protocol::{MessageKind, ResizeMessage, TileReadEndMessage, TileReadStartMessage};
    use render_protocol::RenderBucket;
    use view::Viewport;

    fn channels() -> (FrontendChannels<RenderBucket>, BackendChannels<RenderBucket>) {
        create_thread_channels(ChannelConfig {
            frontend_capacity: 16,
            backend_command_capacity: 4,
        })
    }

    #[test]
    fn messages_from_one_sender_arrive_in_order() {
        let (frontend, backend) = channels();
        let worker = backend.message_sender.clone();
        let producer = std::thread::spawn(move || {
            for x in 0..8 {
                worker
                    .send(TileReadStartMessage::new(
                        TileKey::new(x, 0, 4),
                        TileGeneration(1),
                    ))
                    .expect("send");
            }
        });
        producer.join().expect("producer thread");

        let mut received = Vec::new();
        let count = frontend
            .message_receiver
            .drain_batch_with_wait(&mut received, 64, Duration::from_millis(50))
            .expect("drain");

        assert_eq!(count, 8);
        let xs: Vec<i32> = received
            .iter()
            .map(|message| message.tile_key().expect("tile keyed").x())
            .collect();
        assert_eq!(xs, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn receiver_reports_disconnect_after_senders_drop() {
        let (frontend, backend) = channels();
        backend
            .message_sender
            .send(TileReadEndMessage::new(TileKey::new(0, 0, 0), TileGeneration(1)))
            .expect("send");
        drop(backend);

        let first = frontend.message_receiver.try_recv().expect("queued message");
        assert_eq!(first.map(|message| message.kind()), Some(MessageKind::TileReadEnded));
        assert_eq!(
            frontend.message_receiver.try_recv().map(|message| message.is_some()),
            Err(ChannelError::Disconnected)
        );
    }

    #[test]
    fn command_ring_wakes_waiting_backend() {
        let (mut frontend, mut backend) = channels();
        let waiter = std::thread::spawn(move || {
            let mut output = Vec::new();
            let count = backend
                .command_consumer
                .drain_batch_with_wait(&mut output, 8, Duration::from_secs(5))
                .expect("drain");
            (count, output.first().map(|message| message.kind()))
        });

        frontend
            .command_producer
            .blocking_push(ResizeMessage::new(Viewport::new(0, 0, 10, 10)))
            .expect("push");

        let (count, kind) = waiter.join().expect("waiter thread");
        assert_eq!(count, 1);
        assert_eq!(kind, Some(MessageKind::Resize));
    }

    #[test]
    fn command_ring_reports_full_and_abandoned() {
        let (mut frontend, backend) = create_thread_channels::<RenderBucket>(ChannelConfig {
            frontend_capacity: 1,
            backend_command_capacity: 1,
        });
        let resize = ResizeMessage::new(Viewport::new(0, 0, 1, 1));
        frontend.command_producer.push(resize).expect("first push");
        assert!(frontend.command_producer.push(resize).is_err());

        drop(backend);
        assert_eq!(
            frontend.command_producer.blocking_push(resize),
            Err(ChannelError::Disconnected)
        );
    }

    #[test]
    fn consumer_errors_once_producer_gone_and_ring_empty() {
        let (frontend, mut backend) = channels();
        drop(frontend);
        let mut output = Vec::new();
        assert_eq!(
            backend
                .command_consumer
                .drain_batch_with_wait(&mut output, 4, Duration::from_millis(10)),
            Err(ChannelError::Disconnected)
        );
    }

    #[test]
    #[should_panic(expected = "frontend message capacity must be greater than zero")]
    fn zero_capacity_is_rejected() {
        let _ = create_thread_channels::<RenderBucket>(ChannelConfig {
            frontend_capacity: 0,
            backend_command_capacity: 1,
        });
    }
}
