//! Outbound signal integration: UDP datagrams, a file-backed shared memory
//! block and a replayed live loop.

pub mod shared_memory;
pub mod sink;
pub mod stream;

pub use shared_memory::{SharedMemoryBlock, DEFAULT_BLOCK_SIZE, HEADER_LEN};
pub use sink::{SignalSink, UdpSignalSender, DEFAULT_SIGNAL_HOST, DEFAULT_SIGNAL_PORT};
pub use stream::{EmitterStats, SignalEmitter, TickReplay};
