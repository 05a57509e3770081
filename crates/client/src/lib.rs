//! Client-side upload driver for the depot upload service.
//!
//! Splits a file into fixed-size chunks and uploads them sequentially with
//! retry, resumption and progress reporting. The wire protocol lives behind
//! the [`UploadTransport`] trait; [`HttpTransport`] is the reqwest-backed
//! implementation.

pub mod driver;
pub mod error;
pub mod transport;

pub use driver::{ProgressFn, UploadDriver, UploadOptions, UploadRequest};
pub use error::{ClientError, ErrorKind, TransportError, UploadError};
pub use transport::{HttpTransport, UploadTransport};
