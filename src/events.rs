//! Out-of-band event delivery from the engine to the caller.
//!
//! Each logical channel is an unbounded queue with a presence flag. The
//! producer checks the flag before every send, so a caller that stops
//! listening never disturbs a running capture thread, and cancelling twice is
//! harmless. Dropping every [`EventStream`] counts as stopping: nothing is
//! queued for a listener that no longer exists.

use async_channel::{Receiver, Sender, TryRecvError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Machine-readable category of an [`Event::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    /// A hardware callback delivered an unusable buffer.
    MalformedFrame,
    /// The device reported an asynchronous failure.
    Device,
}

/// An event pushed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// Something went wrong on the frame path.
    Error { code: ErrorCode, message: String },
    /// The session is being torn down.
    SessionClosing,
    /// A QR code was decoded while scanning.
    QrDecoded { text: String },
}

impl Event {
    /// Wire form delivered to the caller.
    ///
    /// Decoded QR text travels as a bare string on the scanning channel;
    /// everything else is a tagged object.
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            Event::QrDecoded { text } => serde_json::Value::String(text.clone()),
            other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// One logical event channel.
#[derive(Debug)]
pub struct EventChannel {
    name: &'static str,
    tx: Sender<Event>,
    rx: Receiver<Event>,
    listening: AtomicBool,
}

impl EventChannel {
    /// Creates a channel nobody listens to yet.
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            name,
            tx,
            rx,
            listening: AtomicBool::new(false),
        }
    }

    /// Starts delivery and returns a stream over this channel.
    pub fn listen(&self) -> EventStream {
        if !self.has_stream() {
            self.drain();
        }
        self.listening.store(true, Ordering::Release);
        tracing::debug!(channel = self.name, "Listener attached");
        EventStream {
            rx: self.rx.clone(),
        }
    }

    /// Stops delivery and drops anything still queued. Idempotent.
    pub fn cancel(&self) {
        if self.listening.swap(false, Ordering::AcqRel) {
            let dropped = self.drain();
            tracing::debug!(channel = self.name, dropped, "Listener cancelled");
        }
    }

    /// True while a listener is attached and at least one of its streams is
    /// still alive.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire) && self.has_stream()
    }

    // The channel keeps one receiver of its own.
    fn has_stream(&self) -> bool {
        self.tx.receiver_count() > 1
    }

    fn drain(&self) -> usize {
        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Queues `event` if someone is listening. Never blocks.
    ///
    /// Returns whether the event was queued.
    pub fn emit(&self, event: Event) -> bool {
        if !self.is_listening() {
            tracing::trace!(channel = self.name, ?event, "No listener, event dropped");
            if !self.rx.is_empty() {
                self.drain();
            }
            return false;
        }
        self.tx.try_send(event).is_ok()
    }
}

/// The engine's channels: session lifecycle/errors and scan results.
#[derive(Debug)]
pub struct EventHub {
    /// Errors and session-closing notifications.
    pub session: EventChannel,
    /// Decoded QR strings.
    pub scan: EventChannel,
}

impl EventHub {
    /// Creates both channels.
    pub fn new() -> Self {
        Self {
            session: EventChannel::new("session"),
            scan: EventChannel::new("scan"),
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end handed to the caller.
#[derive(Debug, Clone)]
pub struct EventStream {
    rx: Receiver<Event>,
}

impl EventStream {
    /// Waits for the next event.
    pub async fn recv(&self) -> Option<Event> {
        self.rx.recv().await.ok()
    }

    /// Blocks the current thread until the next event.
    pub fn recv_blocking(&self) -> Option<Event> {
        self.rx.recv_blocking().ok()
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_listener_is_dropped() {
        let channel = EventChannel::new("test");
        assert!(!channel.emit(Event::SessionClosing));

        let stream = channel.listen();
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_emit_and_receive() {
        let channel = EventChannel::new("test");
        let stream = channel.listen();
        assert!(channel.emit(Event::SessionClosing));
        assert_eq!(stream.try_recv(), Some(Event::SessionClosing));
    }

    #[test]
    fn test_cancel_is_idempotent_and_stops_delivery() {
        let channel = EventChannel::new("test");
        let stream = channel.listen();
        channel.emit(Event::SessionClosing);

        channel.cancel();
        channel.cancel();
        assert!(!channel.is_listening());
        assert!(!channel.emit(Event::SessionClosing));
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_dropped_stream_stops_queueing() {
        let channel = EventChannel::new("test");
        let stream = channel.listen();
        channel.emit(Event::SessionClosing);
        drop(stream);

        for i in 0..10_000 {
            let queued = channel.emit(Event::Error {
                code: ErrorCode::MalformedFrame,
                message: format!("frame {i}"),
            });
            assert!(!queued);
        }
        assert!(!channel.is_listening());
        assert_eq!(channel.rx.len(), 0);

        // A new listener starts from an empty queue.
        let stream = channel.listen();
        assert!(stream.try_recv().is_none());
        assert!(channel.emit(Event::SessionClosing));
        assert_eq!(stream.try_recv(), Some(Event::SessionClosing));
    }

    #[test]
    fn test_cloned_stream_keeps_channel_alive() {
        let channel = EventChannel::new("test");
        let stream = channel.listen();
        let clone = stream.clone();
        drop(stream);

        assert!(channel.is_listening());
        assert!(channel.emit(Event::SessionClosing));
        assert_eq!(clone.try_recv(), Some(Event::SessionClosing));
    }

    #[test]
    fn test_wire_forms() {
        let error = Event::Error {
            code: ErrorCode::MalformedFrame,
            message: "bad".into(),
        };
        assert_eq!(
            error.to_wire(),
            serde_json::json!({"type": "error", "code": "malformedFrame", "message": "bad"})
        );
        assert_eq!(
            Event::SessionClosing.to_wire(),
            serde_json::json!({"type": "sessionClosing"})
        );
        assert_eq!(
            Event::QrDecoded {
                text: "hello".into()
            }
            .to_wire(),
            serde_json::json!("hello")
        );
    }
}
