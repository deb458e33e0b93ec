use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Owned stream of object bytes, as read from disk or from an upstream body.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'static>>;
