//! Core data model.
//!
//! This module provides:
//! - [`Value`] / [`Object`] - Tagged scalars and type-sticky value cells
//! - [`ArrayDim`] / [`Array`] - Shapes and owned typed buffers, with borrowing views
//! - [`Image`] / [`ImageLocation`] - Arrays bound to a position in an image file
//! - [`Table`] / [`Column`] / [`Row`] - Schema-aware metadata tables

mod value;
mod object;
mod dimensions;
mod array;
mod image;
mod table;

pub use value::{FromValue, Value};
pub use object::{Object, ObjectDict};
pub use dimensions::ArrayDim;
pub use array::{Array, ArrayView, ArrayViewMut, Operand, Stats};
pub use image::{Image, ImageLocation};
pub use table::{CellMut, Column, ColumnKey, Row, RowMut, RowsMut, Table};
