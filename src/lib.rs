//! RFS Serial Link
//!
//! Host side receiver for the Robust Framed Stream protocol: recovers framed, CRC checked
//! messages from a lossy high speed serial stream and hands them to per type handlers.
//!
//! ```ignore
//! let mut link = RfsLink::new(LinkConfig::default());
//! link.on_message(MessageType::Heartbeat, |msg| {
//!     println!("{:?}", Heartbeat::try_from(msg.body.as_slice())?);
//!     Ok(())
//! });
//!
//! link.add_data(&bytes_from_port);
//! link.process_available(50);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod payload;
pub mod rfs_buffer;
pub mod rfs_checksum;
pub mod rfs_decoder;
pub mod rfs_encoder;
pub mod rfs_link;
pub mod rfs_sequence;
pub mod rfs_shared;
pub mod rfs_stats;
pub mod rfs_sync;
pub mod stdio_helper;
pub mod transport;

pub use config::{AppConfig, LinkConfig};
pub use error::{ConfigError, EncodeError, ParseError, ParseResult};
pub use rfs_buffer::RingBuffer;
pub use rfs_decoder::{Message, MessageDecoder};
pub use rfs_encoder::{MessageWriter, encode_frame, encode_message};
pub use rfs_link::{LinkInput, RfsLink};
pub use rfs_sequence::SequenceTracker;
pub use rfs_shared::{MessageType, ProtocolVariant};
pub use rfs_stats::{LinkStats, StatsSnapshot};
pub use rfs_sync::{Discard, FrameSynchronizer, SyncEvent, SyncState};
pub use transport::{StopFlag, Transport, spawn_receiver};
