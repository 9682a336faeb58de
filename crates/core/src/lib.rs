//! Core types, payload codecs, and errors for the gridwatch sensor pipeline.

pub mod codec;
pub mod error;
pub mod observation;
pub mod sensor;

pub use codec::*;
pub use error::{Error, Result};
pub use observation::*;
pub use sensor::*;
