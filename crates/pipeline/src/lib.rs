//! Stream decoding and conversation reconstruction for agent backends.
//!
//! Live mode: bytes → [`FrameDecoder`] → [`Normalizer`] → [`LiveReconstructor`]
//! (client) or [`Relay`] (server), driven by [`pump`] and [`relay_pump`]. Batch
//! mode: stored records → [`HistoryReconstructor`].

pub mod accumulate;
pub mod activity;
pub mod correlate;
pub mod dedup;
pub mod frame;
pub mod history;
pub mod live;
pub mod normalize;
pub mod pump;
pub mod relay;
pub mod thought;
mod turn;

pub use accumulate::{Accumulator, TextOutcome};
pub use dedup::{DedupCache, part_key};
pub use frame::{FrameDecoder, Framing, decode_all};
pub use history::HistoryReconstructor;
pub use live::{LiveReconstructor, StreamStats, StreamUpdate};
pub use normalize::{DEFAULT_AGENT, NormalizeError, Normalizer};
pub use pump::{
    PumpOptions, RelayOutcome, StreamEnd, StreamError, StreamOutcome, pump, relay_pump,
};
pub use relay::{Relay, RelayEvent, RelayFormat, RelayStats};
pub use thought::{ThoughtSection, segment};
