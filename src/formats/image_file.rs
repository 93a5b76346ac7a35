//! Image file sessions and the backend trait.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::{extension_of, find_image_format, image_formats, ImageFormatEntry};
use crate::core::{Array, ArrayDim, Image, ObjectDict, Stats};
use crate::io::{FileMode, FileStream};
use crate::util::{swap_bytes, Error, Result, Type};

/// What a backend knows about an open image file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageInfo {
    /// Shape of the whole file, `n` is the stack size
    pub dim: ArrayDim,
    /// Element type as stored on disk
    pub ty: Type,
    /// Data byte order differs from the host
    pub swap: bool,
    /// Extra header values exposed to callers
    pub header: ObjectDict,
}

/// One binary image format.
///
/// A backend instance is created per session and may keep header state
/// between calls. Offsets of stack items follow
/// `header_size + (item_bytes + pad_size) * (index - 1) + pad_size`,
/// which covers formats with a per-item header of `pad_size` bytes.
pub trait ImageFormat: Send + fmt::Debug {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Element types this format stores.
    fn types(&self) -> &'static [Type];

    /// File holding the pixel data for a session opened on `path`.
    /// Formats with a separate header file open that one themselves.
    fn data_path(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }

    /// Parse and validate the main header.
    fn read_header(&mut self, stream: &FileStream) -> Result<ImageInfo>;

    /// Write the main header describing `info`.
    fn write_header(&mut self, stream: &mut FileStream, info: &ImageInfo) -> Result<()>;

    /// Size of the main header in bytes.
    fn header_size(&self) -> u64;

    /// Bytes preceding each stack item.
    fn pad_size(&self) -> u64 {
        0
    }

    /// On-disk size of one item.
    fn item_bytes(&self, info: &ImageInfo) -> u64 {
        (info.dim.item_size() * info.ty.size()) as u64
    }

    /// Offset of the data of item `index` (1-based).
    fn item_offset(&self, info: &ImageInfo, index: usize) -> u64 {
        let pad = self.pad_size();
        self.header_size() + (self.item_bytes(info) + pad) * (index as u64 - 1) + pad
    }

    /// Expected file size for `info`, or `None` when the declared shape
    /// does not fit in 64 bits. A `Some` result bounds every offset
    /// [`item_offset`](ImageFormat::item_offset) computes for that shape.
    fn data_size(&self, info: &ImageInfo) -> Option<u64> {
        // item_bytes never exceeds item_size * type size
        info.dim.checked_item_size()?.checked_mul(info.ty.size().max(1))?;
        self.item_bytes(info)
            .checked_add(self.pad_size())?
            .checked_mul(u64::try_from(info.dim.n).ok()?)?
            .checked_add(self.header_size())
    }

    /// Fill `out` with item `index` in host byte order.
    fn read_item(
        &mut self,
        stream: &FileStream,
        info: &ImageInfo,
        index: usize,
        out: &mut [u8],
    ) -> Result<()> {
        read_item_bytes(stream, self.item_offset(info, index), info, out)
    }

    /// Store item `index` from host-order bytes.
    fn write_item(
        &mut self,
        stream: &mut FileStream,
        info: &ImageInfo,
        index: usize,
        data: &[u8],
    ) -> Result<()> {
        write_item_bytes(stream, self.item_offset(info, index), info, data)
    }

    /// Update the header after the stack grew to `info.dim.n` items.
    fn expand(&mut self, stream: &mut FileStream, info: &ImageInfo) -> Result<()> {
        self.write_header(stream, info)
    }

    /// Record data statistics in the header. `None` marks them as unknown
    /// after a write that did not cover the whole file.
    fn write_stats(&mut self, _stream: &mut FileStream, _stats: Option<&Stats>) -> Result<()> {
        Ok(())
    }
}

/// Positioned read with byte swapping for foreign-endian files.
pub(crate) fn read_item_bytes(
    stream: &FileStream,
    offset: u64,
    info: &ImageInfo,
    out: &mut [u8],
) -> Result<()> {
    stream.read_into(offset, out)?;
    if info.swap {
        swap_bytes(out, info.ty.size());
    }
    Ok(())
}

/// Positioned write, converting to the file byte order first.
pub(crate) fn write_item_bytes(
    stream: &mut FileStream,
    offset: u64,
    info: &ImageInfo,
    data: &[u8],
) -> Result<()> {
    if info.swap {
        let mut buf = data.to_vec();
        swap_bytes(&mut buf, info.ty.size());
        stream.write_at(offset, &buf)
    } else {
        stream.write_at(offset, data)
    }
}

/// Options for [`ImageFile::open_with`].
#[derive(Clone, Debug)]
pub struct ImageOpenOptions {
    pub mode: FileMode,
    /// Backend name or extension; `None` selects by file extension
    pub format: Option<String>,
    /// Memory-map read-only sessions (needs the `mmap` feature)
    pub use_mmap: bool,
}

impl Default for ImageOpenOptions {
    fn default() -> Self {
        Self {
            mode: FileMode::ReadOnly,
            format: None,
            use_mmap: true,
        }
    }
}

/// An open image file.
///
/// ```no_run
/// use emcore::core::Image;
/// use emcore::formats::ImageFile;
/// use emcore::io::FileMode;
///
/// let mut file = ImageFile::new();
/// file.open("particles.mrcs", FileMode::ReadOnly)?;
/// let mut img = Image::new();
/// for i in 1..=file.dim().n {
///     file.read(i, &mut img)?;
/// }
/// file.close()?;
/// # Ok::<(), emcore::Error>(())
/// ```
pub struct ImageFile {
    forced: Option<&'static ImageFormatEntry>,
    backend: Option<Box<dyn ImageFormat>>,
    stream: Option<FileStream>,
    info: ImageInfo,
    has_header: bool,
}

impl Default for ImageFile {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFile {
    /// Session that picks its backend from the file extension.
    pub fn new() -> Self {
        Self {
            forced: None,
            backend: None,
            stream: None,
            info: ImageInfo::default(),
            has_header: false,
        }
    }

    /// Session bound to a backend by name or extension.
    pub fn with_format(id: &str) -> Result<Self> {
        let entry = find_image_format(id).ok_or_else(|| Error::UnsupportedFormat(id.to_string()))?;
        let mut file = Self::new();
        file.forced = Some(entry);
        Ok(file)
    }

    /// True when a backend is registered under `id` (name or extension).
    pub fn has_impl(id: &str) -> bool {
        find_image_format(id).is_some()
    }

    /// Element types per registered format, sorted by size then name.
    pub fn format_types() -> BTreeMap<String, Vec<Type>> {
        image_formats()
            .iter()
            .map(|e| (e.name.to_string(), sorted_types((e.build)().types())))
            .collect()
    }

    /// Element types supported by the backend registered under `id`.
    pub fn impl_types(id: &str) -> Result<Vec<Type>> {
        let entry = find_image_format(id).ok_or_else(|| Error::UnsupportedFormat(id.to_string()))?;
        Ok(sorted_types((entry.build)().types()))
    }

    pub fn open(&mut self, path: impl AsRef<Path>, mode: FileMode) -> Result<()> {
        self.open_with(
            path,
            ImageOpenOptions {
                mode,
                ..ImageOpenOptions::default()
            },
        )
    }

    /// Open `path`; an already open file is closed first.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display(), mode = ?options.mode))]
    pub fn open_with(&mut self, path: impl AsRef<Path>, options: ImageOpenOptions) -> Result<()> {
        self.close()?;
        let path = path.as_ref();

        let entry = match &options.format {
            Some(id) => find_image_format(id).ok_or_else(|| Error::UnsupportedFormat(id.clone()))?,
            None => match self.forced {
                Some(entry) => entry,
                None => {
                    let ext = extension_of(path);
                    find_image_format(&ext).ok_or(Error::UnsupportedFormat(ext))?
                }
            },
        };

        let mut backend = (entry.build)();
        let use_mmap = options.use_mmap && options.mode == FileMode::ReadOnly;
        let stream = FileStream::open_opts(backend.data_path(path), options.mode, use_mmap)?;

        let mut info = ImageInfo::default();
        let has_header = stream.mode() != FileMode::Truncate && !stream.is_empty();
        if has_header {
            info = backend.read_header(&stream)?;
            let expected = backend.data_size(&info).ok_or_else(|| {
                Error::corrupt(path, format!("header dimensions {} overflow", info.dim))
            })?;
            if stream.size() < expected {
                return Err(Error::corrupt(
                    path,
                    format!("file has {} bytes, header declares {}", stream.size(), expected),
                ));
            }
            tracing::debug!(format = entry.name, dim = %info.dim, ty = %info.ty, swap = info.swap, "read header");
        } else if stream.mode() == FileMode::ReadOnly {
            return Err(Error::corrupt(path, "empty file"));
        }

        self.backend = Some(backend);
        self.stream = Some(stream);
        self.info = info;
        self.has_header = has_header;
        Ok(())
    }

    /// Release the file. Safe to call when nothing is open.
    pub fn close(&mut self) -> Result<()> {
        self.backend = None;
        self.info = ImageInfo::default();
        self.has_header = false;
        if let Some(mut stream) = self.stream.take() {
            if stream.mode() != FileMode::ReadOnly {
                stream.flush()?;
            }
            tracing::trace!(path = %stream.path().display(), "closed image file");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Name of the backend in use.
    pub fn format_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Shape of the whole file.
    pub fn dim(&self) -> ArrayDim {
        self.info.dim
    }

    /// Element type stored in the file.
    pub fn ty(&self) -> Type {
        self.info.ty
    }

    /// Header values exposed by the backend.
    pub fn header(&self) -> &ObjectDict {
        &self.info.header
    }

    fn parts(&mut self) -> Result<(&mut FileStream, &mut Box<dyn ImageFormat>)> {
        match (self.stream.as_mut(), self.backend.as_mut()) {
            (Some(stream), Some(backend)) => Ok((stream, backend)),
            _ => Err(Error::NotOpen),
        }
    }

    /// Read item `index` (1-based, 0 means the first) into `image`.
    ///
    /// The image receives the item's `(x, y, z, 1)` shape and the file's
    /// native element type. On error `image` is left unchanged.
    #[tracing::instrument(skip_all, fields(index = index))]
    pub fn read(&mut self, index: usize, image: &mut Image) -> Result<()> {
        let index = index.max(1);
        let info = self.info.clone();
        let has_header = self.has_header;
        let (stream, backend) = self.parts()?;
        if !has_header {
            return Err(Error::corrupt(stream.path(), "no image header"));
        }
        if index > info.dim.n {
            return Err(Error::IndexOutOfRange {
                index,
                count: info.dim.n,
            });
        }

        let mut array = Array::zeros(info.dim.item_dim(), info.ty)?;
        backend.read_item(stream, &info, index, array.as_bytes_mut())?;
        image.replace(array, info.header);
        Ok(())
    }

    /// Write `image` starting at item `index` (0 means the first).
    ///
    /// A file without header is created with the image's shape. A stacked
    /// image writes all its items, growing the file when needed. When the
    /// write covers the whole file its statistics go to the header.
    #[tracing::instrument(skip_all, fields(index = index))]
    pub fn write(&mut self, index: usize, image: &Image) -> Result<()> {
        let index = index.max(1);
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        let item_dim = image.dim().item_dim();
        let count = image.dim().n.max(1);
        let last = index
            .checked_add(count - 1)
            .ok_or_else(|| Error::invalid(format!("item index {} out of range", index)))?;

        if !self.has_header {
            self.create_empty(ArrayDim { n: last, ..item_dim }, image.ty())?;
        } else {
            if item_dim != self.info.dim.item_dim() {
                return Err(Error::DimensionMismatch {
                    expected: self.info.dim.item_dim().to_string(),
                    actual: item_dim.to_string(),
                });
            }
            if image.ty() != self.info.ty {
                return Err(Error::TypeMismatch {
                    expected: self.info.ty.name().to_string(),
                    actual: image.ty().name().to_string(),
                });
            }
            if last > self.info.dim.n {
                self.expand(last)?;
            }
        }

        let info = self.info.clone();
        let item_bytes = item_dim.size() * info.ty.size();
        let stats = if index == 1 && last >= info.dim.n {
            Some(image.stats()?)
        } else {
            None
        };
        let (stream, backend) = self.parts()?;
        for (k, chunk) in image.as_bytes().chunks(item_bytes.max(1)).enumerate() {
            backend.write_item(stream, &info, index + k, chunk)?;
        }
        backend.write_stats(stream, stats.as_ref())
    }

    /// Write a fresh header for `dim` items of `ty` and size the file.
    pub fn create_empty(&mut self, dim: ArrayDim, ty: Type) -> Result<()> {
        let has_header = self.has_header;
        let (stream, backend) = self.parts()?;
        if stream.mode() == FileMode::ReadOnly {
            return Err(Error::ReadOnly(stream.path().to_path_buf()));
        }
        if has_header && stream.mode() != FileMode::Truncate {
            return Err(Error::invalid("file already has a header; open it with Truncate"));
        }
        if !backend.types().contains(&ty) {
            return Err(Error::UnsupportedType {
                ty: ty.name().to_string(),
                context: backend.name().to_string(),
            });
        }
        match dim.checked_size().and_then(|n| n.checked_mul(ty.size())) {
            Some(0) => {
                return Err(Error::invalid(format!("cannot create an empty image {}", dim)))
            }
            None => return Err(Error::invalid(format!("image {} is too large", dim))),
            Some(_) => {}
        }

        let mut info = ImageInfo {
            dim,
            ty,
            swap: false,
            header: ObjectDict::new(),
        };
        backend.write_header(stream, &info)?;
        let size = backend
            .data_size(&info)
            .ok_or_else(|| Error::invalid(format!("image {} is too large", dim)))?;
        stream.set_len(size)?;
        info.header.insert("format".to_string(), backend.name().into());
        tracing::debug!(format = backend.name(), %dim, %ty, "created image file");

        self.info = info;
        self.has_header = true;
        Ok(())
    }

    /// Grow the stack to `n` items.
    pub fn expand(&mut self, n: usize) -> Result<()> {
        let mut info = self.info.clone();
        let has_header = self.has_header;
        let (stream, backend) = self.parts()?;
        if stream.mode() == FileMode::ReadOnly {
            return Err(Error::ReadOnly(stream.path().to_path_buf()));
        }
        if !has_header {
            return Err(Error::invalid("expand needs an existing header"));
        }
        if n <= info.dim.n {
            return Ok(());
        }
        info.dim.n = n;
        let size = backend
            .data_size(&info)
            .ok_or_else(|| Error::invalid(format!("cannot grow the stack to {} items", n)))?;
        backend.expand(stream, &info)?;
        stream.set_len(size)?;
        tracing::debug!(n, "expanded image stack");
        self.info = info;
        Ok(())
    }
}

impl Drop for ImageFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("failed to close image file: {}", e);
        }
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("stream", &self.stream)
            .field("format", &self.format_name())
            .field("info", &self.info)
            .finish()
    }
}

fn sorted_types(types: &[Type]) -> Vec<Type> {
    let mut v = types.to_vec();
    v.sort_by(Type::cmp_by_size);
    v
}
