//! # emcore
//!
//! Data interchange for electron-microscopy imaging: a runtime type
//! registry, dynamically typed values, typed multi-dimensional arrays and
//! images, columnar metadata tables, and the file formats that carry them
//! (MRC, SPIDER, STAR, XMD).
//!
//! ## Modules
//!
//! - [`util`] - Type registry, type inference, errors
//! - [`core`] - Object, Array, Image, Table
//! - [`io`] - Positioned file access (mmap or locked file handle)
//! - [`formats`] - Image and table format registries and backends
//!
//! ## Example
//!
//! ```no_run
//! use emcore::prelude::*;
//!
//! let mut particles = Table::new();
//! particles.read_block("run_it025_data.star", "particles")?;
//! particles.sort(&["rlnDefocusU DESC"])?;
//!
//! let loc: ImageLocation = particles[0]["rlnImageName"].to_string().parse()?;
//! let mut img = Image::new();
//! img.read(&loc)?;
//! println!("{} {}", img.dim(), img.ty());
//! # Ok::<(), emcore::Error>(())
//! ```

pub mod util;
pub mod core;
pub mod io;
pub mod formats;

pub use util::{Error, Result, Type, TypeKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        Array, ArrayDim, Column, Image, ImageLocation, Object, Row, Table, Value,
    };
    pub use crate::formats::{ImageFile, TableFile};
    pub use crate::io::FileMode;
    pub use crate::util::{Error, Result, Type};
}
