//! Images: arrays bound to a location inside an image file.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::array::Array;
use super::dimensions::ArrayDim;
use super::object::ObjectDict;
use crate::formats::ImageFile;
use crate::io::FileMode;
use crate::util::{Error, Result, Type};

/// A file path plus a 1-based item index within the file's stack.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageLocation {
    pub path: PathBuf,
    pub index: usize,
}

impl ImageLocation {
    /// First item of a stack.
    pub const FIRST: usize = 1;
    /// Whole file; reads and writes treat it as [`FIRST`](Self::FIRST).
    pub const ALL: usize = 0;

    pub fn new(path: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            path: path.into(),
            index,
        }
    }

    /// Index with `ALL` resolved to `FIRST`.
    #[inline]
    pub fn effective_index(&self) -> usize {
        if self.index == Self::ALL {
            Self::FIRST
        } else {
            self.index
        }
    }
}

impl From<&str> for ImageLocation {
    fn from(path: &str) -> Self {
        Self::new(path, Self::FIRST)
    }
}

impl From<&Path> for ImageLocation {
    fn from(path: &Path) -> Self {
        Self::new(path, Self::FIRST)
    }
}

impl From<PathBuf> for ImageLocation {
    fn from(path: PathBuf) -> Self {
        Self::new(path, Self::FIRST)
    }
}

/// Parses `path` or the metadata form `index@path`.
impl FromStr for ImageLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('@') {
            Some((idx, path)) if !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()) => {
                let index = idx
                    .parse()
                    .map_err(|_| Error::invalid(format!("bad image index in '{s}'")))?;
                Ok(Self::new(path, index))
            }
            _ => Ok(Self::new(s, Self::FIRST)),
        }
    }
}

impl fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == Self::ALL {
            write!(f, "({}, ALL)", self.path.display())
        } else {
            write!(f, "({}, {})", self.path.display(), self.index)
        }
    }
}

/// Pixel or voxel data plus the header values read with it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Image {
    array: Array,
    header: ObjectDict,
}

impl Image {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-filled image.
    pub fn zeros(dim: ArrayDim, ty: Type) -> Result<Self> {
        Ok(Self::from_array(Array::zeros(dim, ty)?))
    }

    pub fn from_array(array: Array) -> Self {
        Self {
            array,
            header: ObjectDict::new(),
        }
    }

    pub fn array(&self) -> &Array {
        &self.array
    }

    pub fn into_array(self) -> Array {
        self.array
    }

    /// Header values filled in by the format backend on read.
    pub fn header(&self) -> &ObjectDict {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut ObjectDict {
        &mut self.header
    }

    pub(crate) fn replace(&mut self, array: Array, header: ObjectDict) {
        self.array = array;
        self.header = header;
    }

    /// Read one item from `loc`. On error the image is left unchanged.
    pub fn read(&mut self, loc: &ImageLocation) -> Result<()> {
        let mut file = ImageFile::new();
        file.open(&loc.path, FileMode::ReadOnly)?;
        file.read(loc.effective_index(), self)?;
        file.close()
    }

    /// Write the image at `loc`, creating the file if it does not exist and
    /// growing the stack when `loc` lies past its end.
    pub fn write(&self, loc: &ImageLocation) -> Result<()> {
        let mut file = ImageFile::new();
        file.open(&loc.path, FileMode::ReadWrite)?;
        file.write(loc.effective_index(), self)?;
        file.close()
    }
}

impl Deref for Image {
    type Target = Array;

    fn deref(&self) -> &Array {
        &self.array
    }
}

impl DerefMut for Image {
    fn deref_mut(&mut self) -> &mut Array {
        &mut self.array
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image {} {}", self.array.dim(), self.array.ty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_equality() {
        let a = ImageLocation::new("/tmp/a.mrc", 1);
        let b = ImageLocation::from("/tmp/a.mrc");
        assert_eq!(a, b);
        assert_ne!(a, ImageLocation::new("/tmp/a.mrc", 2));
        assert_ne!(a, ImageLocation::new("/tmp/b.mrc", 1));
    }

    #[test]
    fn test_location_display() {
        assert_eq!(ImageLocation::new("a.mrcs", 3).to_string(), "(a.mrcs, 3)");
        assert_eq!(
            ImageLocation::new("a.mrcs", ImageLocation::ALL).to_string(),
            "(a.mrcs, ALL)"
        );
        assert_eq!(ImageLocation::new("a.mrcs", ImageLocation::ALL).effective_index(), 1);
    }

    #[test]
    fn test_location_parse() {
        let loc: ImageLocation = "000012@Particles/run1.mrcs".parse().unwrap();
        assert_eq!(loc, ImageLocation::new("Particles/run1.mrcs", 12));

        let loc: ImageLocation = "mic@2.mrc".parse().unwrap();
        assert_eq!(loc, ImageLocation::new("mic@2.mrc", 1));
    }

    #[test]
    fn test_image_derefs_to_array() {
        let mut img = Image::zeros(ArrayDim::new(4, 4, 1, 1), Type::FLOAT).unwrap();
        img.fill(1.5f32).unwrap();
        assert_eq!(img.size(), 16);
        assert_eq!(img.data::<f32>().unwrap()[15], 1.5);
        assert!(img.header().is_empty());
    }
}
