//! File format backends and their registries.
//!
//! Image formats implement [`ImageFormat`] and table formats implement
//! [`TableFormat`]. Each registry is a static list of entries mapping a
//! format name and its file extensions to a constructor; adding a format
//! means adding an entry, lookup code stays untouched.
//!
//! | Registry | Name | Extensions |
//! |---|---|---|
//! | image | `mrc` | `mrc mrcs map st` |
//! | image | `spider` | `spi spider stk vol` |
//! | image | `em` | `em` |
//! | image | `imagic` | `hed img` |
//! | table | `star` | `star` |
//! | table | `xmd` | `xmd` |

mod image_file;
mod em;
mod imagic;
mod mrc;
mod spider;
mod table_file;
mod star;

use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub use image_file::{ImageFile, ImageFormat, ImageInfo, ImageOpenOptions};
pub use table_file::{BlockInfo, TableFile, TableFormat};

/// Registry entry for an image format.
pub struct ImageFormatEntry {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub build: fn() -> Box<dyn ImageFormat>,
}

/// Registry entry for a table format.
pub struct TableFormatEntry {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub build: fn() -> Box<dyn TableFormat>,
}

static IMAGE_FORMATS: &[ImageFormatEntry] = &[
    ImageFormatEntry {
        name: "mrc",
        extensions: &["mrc", "mrcs", "map", "st"],
        build: mrc::build,
    },
    ImageFormatEntry {
        name: "spider",
        extensions: &["spi", "spider", "stk", "vol"],
        build: spider::build,
    },
    ImageFormatEntry {
        name: "em",
        extensions: &["em"],
        build: em::build,
    },
    ImageFormatEntry {
        name: "imagic",
        extensions: &["hed", "img"],
        build: imagic::build,
    },
];

static TABLE_FORMATS: &[TableFormatEntry] = &[
    TableFormatEntry {
        name: "star",
        extensions: &["star"],
        build: star::build_star,
    },
    TableFormatEntry {
        name: "xmd",
        extensions: &["xmd"],
        build: star::build_xmd,
    },
];

/// All registered image formats.
pub fn image_formats() -> &'static [ImageFormatEntry] {
    IMAGE_FORMATS
}

/// All registered table formats.
pub fn table_formats() -> &'static [TableFormatEntry] {
    TABLE_FORMATS
}

/// Find an image format by name or extension (case insensitive).
pub fn find_image_format(id: &str) -> Option<&'static ImageFormatEntry> {
    IMAGE_FORMATS.iter().find(|e| {
        e.name.eq_ignore_ascii_case(id) || e.extensions.iter().any(|x| x.eq_ignore_ascii_case(id))
    })
}

/// Find a table format by name or extension (case insensitive).
pub fn find_table_format(id: &str) -> Option<&'static TableFormatEntry> {
    TABLE_FORMATS.iter().find(|e| {
        e.name.eq_ignore_ascii_case(id) || e.extensions.iter().any(|x| x.eq_ignore_ascii_case(id))
    })
}

/// Lowercase extension of `path`, empty when there is none.
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Fixed-size binary header read and written in a given byte order.
#[derive(Clone, Debug)]
pub(crate) struct HeaderBuf {
    pub bytes: Vec<u8>,
    pub big_endian: bool,
}

impl HeaderBuf {
    /// Zeroed header in native byte order.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
            big_endian: cfg!(target_endian = "big"),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, big_endian: bool) -> Self {
        Self { bytes, big_endian }
    }

    /// True when the header byte order differs from the host.
    pub fn is_swapped(&self) -> bool {
        self.big_endian != cfg!(target_endian = "big")
    }

    pub fn i32(&self, off: usize) -> i32 {
        let b = &self.bytes[off..off + 4];
        if self.big_endian {
            BigEndian::read_i32(b)
        } else {
            LittleEndian::read_i32(b)
        }
    }

    pub fn f32(&self, off: usize) -> f32 {
        let b = &self.bytes[off..off + 4];
        if self.big_endian {
            BigEndian::read_f32(b)
        } else {
            LittleEndian::read_f32(b)
        }
    }

    pub fn set_i32(&mut self, off: usize, v: i32) {
        let b = &mut self.bytes[off..off + 4];
        if self.big_endian {
            BigEndian::write_i32(b, v)
        } else {
            LittleEndian::write_i32(b, v)
        }
    }

    pub fn set_f32(&mut self, off: usize, v: f32) {
        let b = &mut self.bytes[off..off + 4];
        if self.big_endian {
            BigEndian::write_f32(b, v)
        } else {
            LittleEndian::write_f32(b, v)
        }
    }
}
