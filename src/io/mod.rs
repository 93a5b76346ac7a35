//! File access layer used by the format backends.

mod stream;

pub use stream::{FileMode, FileStream};
