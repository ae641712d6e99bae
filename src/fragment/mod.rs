//! Splitting oversized request and payload frames into fragments.
//!
//! Outbound, a [`Fragmenter`] cuts a [`RequestFrame`](crate::frame::RequestFrame)
//! whose metadata and data exceed the configured fragment size into a chain
//! linked by the FOLLOWS flag. Inbound, a [`Reassembler`] buffers the chain
//! per stream id and yields the logical frame once the last fragment arrives.

pub mod config;
pub mod error;
pub mod fragmenter;
pub mod reassembler;

pub use config::FragmentationConfig;
pub use error::ReassemblyError;
pub use fragmenter::Fragmenter;
pub use reassembler::Reassembler;
