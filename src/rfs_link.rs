// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                             RFS Link
// —————————————————————————————————————————————————————————————————————————————————————————————————

//! Ties buffer, synchronizer, decoder and handlers together.
//!
//! The receiver side only ever touches a [`LinkInput`], the parser side owns the
//! [`RfsLink`]. The ring buffer and the statistics are the only shared state.

use std::sync::Arc;
use std::thread::sleep;

use tracing::{debug, warn};

use crate::config::LinkConfig;
use crate::error::ParseError;
use crate::rfs_buffer::RingBuffer;
use crate::rfs_decoder::{Message, MessageDecoder};
use crate::rfs_shared::*;
use crate::rfs_stats::{LinkStats, StatsSnapshot};
use crate::rfs_sync::{FrameSynchronizer, SyncEvent};
use crate::transport::StopFlag;

pub type Handler = Box<dyn FnMut(&Message) -> anyhow::Result<()> + Send>;

/// Discarded candidates tolerated per `process_available` call, per requested message.
const DISCARDS_PER_MESSAGE: usize = 16;

// ———————————————————————————————————————————— Input ——————————————————————————————————————————————

/// Producer handle, cheap to clone and safe to move into the receiver thread.
#[derive(Debug, Clone)]
pub struct LinkInput {
    buffer: Arc<RingBuffer>,
    stats:  Arc<LinkStats>,
}

impl LinkInput {
    /// Appends incoming bytes. Never blocks; on overflow the oldest bytes are evicted
    /// and counted.
    pub fn add_data(&self, data: &[u8]) -> usize {
        let (accepted, evicted) = self.buffer.write_evicting(data);
        self.stats.record_received(data.len(), evicted as u64);
        if evicted > 0 {
            debug!(evicted, "ring buffer overflow");
        }
        accepted
    }
}

// ————————————————————————————————————————————— Link ——————————————————————————————————————————————

/// Outcome of one synchronizer pass.
enum Step {
    Message(Message),
    /// A frame or message was rejected and its bytes dropped.
    Rejected,
    /// Not enough data buffered.
    Idle,
}

pub struct RfsLink {
    config:   LinkConfig,
    buffer:   Arc<RingBuffer>,
    stats:    Arc<LinkStats>,
    sync:     FrameSynchronizer,
    decoder:  MessageDecoder,
    handlers: [Option<Handler>; MessageType::ALL.len()],
}

impl RfsLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            buffer: Arc::new(RingBuffer::new(config.buffer_capacity)),
            stats: Arc::new(LinkStats::new()),
            sync: FrameSynchronizer::new(&config),
            decoder: MessageDecoder::new(config.drop_threshold),
            handlers: Default::default(),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn input(&self) -> LinkInput {
        LinkInput {
            buffer: Arc::clone(&self.buffer),
            stats:  Arc::clone(&self.stats),
        }
    }

    /// Same as `self.input().add_data(data)`, for single threaded use.
    pub fn add_data(&self, data: &[u8]) -> usize {
        self.input().add_data(data)
    }

    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    /// Live counters, for a display thread.
    pub fn shared_stats(&self) -> Arc<LinkStats> {
        Arc::clone(&self.stats)
    }

    /// Registers the handler for `msg_type`, replacing any previous one.
    pub fn on_message<F>(&mut self, msg_type: MessageType, handler: F)
    where
        F: FnMut(&Message) -> anyhow::Result<()> + Send + 'static,
    {
        self.handlers[msg_type.index()] = Some(Box::new(handler));
    }

    /// Performs at most one pass of the synchronizer.
    ///
    /// `None` means either that more data is needed or that a candidate was rejected,
    /// the statistics tell which.
    pub fn parse_one_message(&mut self) -> Option<Message> {
        match self.step() {
            Step::Message(msg) => Some(msg),
            Step::Rejected | Step::Idle => None,
        }
    }

    /// Decodes and dispatches up to `max_messages` messages, returns how many were decoded.
    ///
    /// Never blocks, returns early once the buffer holds no complete frame.
    pub fn process_available(&mut self, max_messages: usize) -> usize {
        let mut processed = 0;
        let mut discards = max_messages.saturating_mul(DISCARDS_PER_MESSAGE).max(DISCARDS_PER_MESSAGE);

        while processed < max_messages {
            match self.step() {
                Step::Message(msg) => {
                    self.dispatch(&msg);
                    processed += 1;
                }
                Step::Rejected => {
                    discards -= 1;
                    if discards == 0 {
                        break;
                    }
                }
                Step::Idle => break,
            }
        }

        processed
    }

    /// Parser loop. Drains batches until `stop` is raised, sleeping while idle.
    pub fn run(&mut self, stop: &StopFlag) {
        debug!("parser started");
        while !stop.is_stopped() {
            if self.process_available(self.config.batch_size.max(1)) == 0 {
                sleep(self.config.idle_sleep);
            }
        }
        debug!("parser exiting");
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Clears the counters and the sequence history.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
        self.decoder.reset();
    }

    /// Drops buffered bytes and any half recognised frame, e.g. after a reconnect.
    pub fn reset_stream(&mut self) {
        self.buffer.clear();
        self.sync.reset();
    }

    fn step(&mut self) -> Step {
        let payload = match self.sync.poll(&self.buffer, &self.stats) {
            SyncEvent::Frame(payload) => payload,
            SyncEvent::Incomplete => return Step::Idle,
            SyncEvent::Discarded(_) => return Step::Rejected,
        };

        let decoded = self.decoder.decode(&payload);

        let dropped = self.decoder.take_dropped();
        if dropped > 0 {
            LinkStats::add(&self.stats.messages_dropped, dropped);
        }

        match decoded {
            Ok(msg) => {
                LinkStats::incr(&self.stats.messages_received);
                Step::Message(msg)
            }
            Err(e) => {
                LinkStats::incr(&self.stats.parse_errors);
                debug!(error = %e, "message dropped");
                Step::Rejected
            }
        }
    }

    fn dispatch(&mut self, msg: &Message) {
        let Some(handler) = self.handlers[msg.msg_type.index()].as_mut()
        else {
            return;
        };

        if let Err(e) = handler(msg) {
            // A typed body that fails to parse is a stream fault, anything else is the handler's
            if e.downcast_ref::<ParseError>().is_some() {
                LinkStats::incr(&self.stats.parse_errors);
            }
            else {
                LinkStats::incr(&self.stats.handler_errors);
            }
            warn!(
                msg_type = %msg.msg_type,
                seq = msg.sequence_id,
                error = %e,
                "handler failed"
            );
        }
    }
}

impl std::fmt::Debug for RfsLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<MessageType> = MessageType::ALL
            .into_iter()
            .filter(|t| self.handlers[t.index()].is_some())
            .collect();

        f.debug_struct("RfsLink")
            .field("config", &self.config)
            .field("buffered", &self.buffer.available())
            .field("sync", &self.sync.state())
            .field("handlers", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::rfs_encoder::MessageWriter;

    fn writer() -> MessageWriter {
        MessageWriter::new(ProtocolVariant::CrcFullPayload)
    }

    #[test]
    fn dispatches_to_registered_handler() {
        let mut link = RfsLink::new(LinkConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        link.on_message(MessageType::Heartbeat, move |msg| {
            sink.lock().unwrap().push(msg.sequence_id);
            Ok(())
        });

        let mut w = writer();
        for _ in 0..3 {
            link.add_data(&w.frame(MessageType::Heartbeat, &[0; 4]).unwrap());
        }
        link.add_data(&w.frame(MessageType::DebugInfo, b"unhandled").unwrap());

        assert_eq!(link.process_available(10), 4);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(link.stats().messages_received, 4);
    }

    #[test]
    fn batch_is_bounded() {
        let mut link = RfsLink::new(LinkConfig::default());
        let mut w = writer();
        for _ in 0..5 {
            link.add_data(&w.frame(MessageType::Heartbeat, &[0; 4]).unwrap());
        }

        assert_eq!(link.process_available(2), 2);
        assert_eq!(link.process_available(2), 2);
        assert_eq!(link.process_available(2), 1);
        assert_eq!(link.process_available(2), 0);
    }

    #[test]
    fn handler_error_is_counted_not_fatal() {
        let mut link = RfsLink::new(LinkConfig::default());
        link.on_message(MessageType::DebugInfo, |_| anyhow::bail!("display closed"));

        let mut w = writer();
        link.add_data(&w.frame(MessageType::DebugInfo, b"a").unwrap());
        link.add_data(&w.frame(MessageType::DebugInfo, b"b").unwrap());

        assert_eq!(link.process_available(10), 2);
        assert_eq!(link.stats().handler_errors, 2);
    }

    #[test]
    fn malformed_typed_body_counts_as_parse_error() {
        use crate::payload::DetectionResults;

        let mut link = RfsLink::new(LinkConfig::default());
        link.on_message(MessageType::DetectionResults, |msg| {
            DetectionResults::try_from(msg.body.as_slice())?;
            Ok(())
        });

        // frame_id 7, declared count 101
        let mut body = 7u32.to_le_bytes().to_vec();
        body.extend_from_slice(&101u32.to_le_bytes());
        link.add_data(&writer().frame(MessageType::DetectionResults, &body).unwrap());

        assert_eq!(link.process_available(10), 1);
        let stats = link.stats();
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.handler_errors, 0);
    }

    #[test]
    fn unknown_type_is_a_parse_error_and_consumed() {
        let mut link = RfsLink::new(LinkConfig::default());
        let bogus = crate::rfs_encoder::encode_frame(&[0x7F, 0x01, 0x00, 1], ProtocolVariant::CrcFullPayload).unwrap();
        link.add_data(&bogus);
        link.add_data(&writer().frame(MessageType::Heartbeat, &[0; 4]).unwrap());

        assert_eq!(link.parse_one_message(), None);
        assert_eq!(link.stats().parse_errors, 1);
        assert!(link.parse_one_message().is_some());
        assert!(link.buffer().is_empty());
    }

    #[test]
    fn reset_stats_clears_sequence_history() {
        let mut link = RfsLink::new(LinkConfig::default());
        let mut w = writer();
        w.set_next_sequence(MessageType::Heartbeat, 10);
        link.add_data(&w.frame(MessageType::Heartbeat, &[0; 4]).unwrap());
        link.process_available(1);

        link.reset_stats();
        assert_eq!(link.stats(), StatsSnapshot::default());

        // 10 -> 12 would be a gap of one without the reset
        w.set_next_sequence(MessageType::Heartbeat, 12);
        link.add_data(&w.frame(MessageType::Heartbeat, &[0; 4]).unwrap());
        link.process_available(1);
        assert_eq!(link.stats().messages_dropped, 0);
    }

    #[test]
    fn run_exits_on_stop() {
        let mut link = RfsLink::new(LinkConfig::default());
        let stop = StopFlag::new();
        stop.stop();
        link.run(&stop);
    }
}
