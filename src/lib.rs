//! Proxy node harvesting: extraction, codec, subscription decoding and latency probing.

pub mod b64;
pub mod codec;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod node;
pub mod probe;
pub mod subscription;

pub use codec::{convert, parse, serialize};
pub use error::{CodecError, NetworkError, NetworkErrorKind, ProbeError};
pub use extract::extract_all;
pub use fetch::{Fetcher, FetcherConfig};
pub use node::{CanonicalNode, NodeSettings, Protocol};
pub use probe::{NodeDescriptor, ProbeResult, Prober, ProberConfig};
