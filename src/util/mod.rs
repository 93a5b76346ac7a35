//! Utility types shared by every layer.
//!
//! - [`Type`] / [`TypeKind`] - Immutable type descriptors and the name registry
//! - [`Element`] - POD scalars that can be stored in array buffers
//! - [`Error`] / [`Result`] - Error handling

mod types;
mod infer;
mod element;
mod error;

pub use types::*;
pub use element::{Element, swap_bytes};
pub(crate) use element::dispatch_element;
pub use error::*;
