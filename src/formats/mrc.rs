//! MRC / MRCS image format (MRC2014 with pre-2014 mode 0 handling).
//!
//! ## Header layout (1024 bytes, then `nsymbt` extended header bytes)
//!
//! ```text
//! offset  field
//!      0  nx, ny, nz           i32 x3
//!     12  mode                 i32
//!     28  mx, my, mz           i32 x3   (mz: sections per volume)
//!     40  cella                f32 x3   (cell size in Angstrom)
//!     52  cellb                f32 x3   (cell angles)
//!     64  mapc, mapr, maps     i32 x3
//!     76  dmin, dmax, dmean    f32 x3
//!     88  ispg                 i32      (0 image/stack, 1 volume, 401 volume stack)
//!     92  nsymbt               i32
//!    104  exttyp               4 chars
//!    108  nversion             i32      (year * 10 + revision)
//!    208  "MAP "               4 chars
//!    212  machine stamp        4 bytes  (0x44 0x44 little, 0x11 0x11 big endian)
//!    216  rms                  f32
//!    220  nlabl                i32
//!    224  labels               10 x 80 chars
//! ```

use byteorder::{ByteOrder, LittleEndian};

use super::image_file::{read_item_bytes, write_item_bytes, ImageFormat, ImageInfo};
use super::{extension_of, HeaderBuf};
use crate::core::{ArrayDim, Object, ObjectDict, Stats};
use crate::io::FileStream;
use crate::util::{Error, Result, Type};

pub const HEADER_SIZE: usize = 1024;

const NX: usize = 0;
const NY: usize = 4;
const NZ: usize = 8;
const MODE: usize = 12;
const MX: usize = 28;
const MY: usize = 32;
const MZ: usize = 36;
const CELLA: usize = 40;
const CELLB: usize = 52;
const MAPC: usize = 64;
const DMIN: usize = 76;
const DMAX: usize = 80;
const DMEAN: usize = 84;
const ISPG: usize = 88;
const NSYMBT: usize = 92;
const EXTTYP: usize = 104;
const NVERSION: usize = 108;
const MAP: usize = 208;
const MACHST: usize = 212;
const RMS: usize = 216;

/// Version written for new files.
const NVERSION_2014: i32 = 20140;

/// Packed 4-bit mode (IMOD extension), read only.
const MODE_PACKED4: i32 = 101;

const KNOWN_MODES: [i32; 8] = [0, 1, 2, 3, 4, 6, 12, MODE_PACKED4];

static TYPES: [Type; 6] = [
    Type::INT8,
    Type::UINT8,
    Type::INT16,
    Type::UINT16,
    Type::HALF,
    Type::FLOAT,
];

pub(super) fn build() -> Box<dyn ImageFormat> {
    Box::new(MrcFormat::default())
}

#[derive(Debug, Default)]
struct MrcFormat {
    header: Option<HeaderBuf>,
    mode: i32,
    nsymbt: u64,
}

/// Byte order from the machine stamp, falling back to a plausibility
/// check on `mode` when the stamp is blank.
fn detect_big_endian(bytes: &[u8]) -> bool {
    match bytes[MACHST] {
        0x44 | 0x41 => false,
        0x11 => true,
        _ => {
            let mode = LittleEndian::read_i32(&bytes[MODE..MODE + 4]);
            !KNOWN_MODES.contains(&mode)
        }
    }
}

fn mode_type(mode: i32, mrc2014: bool) -> Option<Type> {
    Some(match mode {
        0 if mrc2014 => Type::INT8,
        0 => Type::UINT8,
        1 => Type::INT16,
        2 => Type::FLOAT,
        6 => Type::UINT16,
        12 => Type::HALF,
        MODE_PACKED4 => Type::UINT8,
        _ => return None,
    })
}

/// Mode and version used to store `ty`. uint8 keeps a pre-2014 version
/// so mode 0 reads back unsigned.
fn type_mode(ty: Type) -> Option<(i32, i32)> {
    Some(if ty == Type::INT8 {
        (0, NVERSION_2014)
    } else if ty == Type::UINT8 {
        (0, 0)
    } else if ty == Type::INT16 {
        (1, NVERSION_2014)
    } else if ty == Type::FLOAT {
        (2, NVERSION_2014)
    } else if ty == Type::UINT16 {
        (6, NVERSION_2014)
    } else if ty == Type::HALF {
        (12, NVERSION_2014)
    } else {
        return None;
    })
}

/// Store data statistics; `None` writes the "not determined" markers
/// (dmax < dmin, dmean < both, rms < 0).
fn set_stats(h: &mut HeaderBuf, stats: Option<&Stats>) {
    let (dmin, dmax, dmean, rms) = match stats {
        Some(s) => (s.min as f32, s.max as f32, s.mean as f32, s.std as f32),
        None => (0.0, -1.0, -2.0, -1.0),
    };
    h.set_f32(DMIN, dmin);
    h.set_f32(DMAX, dmax);
    h.set_f32(DMEAN, dmean);
    h.set_f32(RMS, rms);
}

fn packed_error() -> Error {
    Error::UnsupportedType {
        ty: "mode 101".to_string(),
        context: "mrc write".to_string(),
    }
}

impl ImageFormat for MrcFormat {
    fn name(&self) -> &'static str {
        "mrc"
    }

    fn types(&self) -> &'static [Type] {
        &TYPES
    }

    fn read_header(&mut self, stream: &FileStream) -> Result<ImageInfo> {
        let path = stream.path();
        if stream.size() < HEADER_SIZE as u64 {
            return Err(Error::corrupt(path, "file is shorter than an MRC header"));
        }
        let bytes = stream.read_bytes(0, HEADER_SIZE)?;
        let big_endian = detect_big_endian(&bytes);
        let h = HeaderBuf::from_bytes(bytes, big_endian);

        let (nx, ny, nz) = (h.i32(NX), h.i32(NY), h.i32(NZ));
        if nx <= 0 || ny <= 0 || nz <= 0 {
            return Err(Error::corrupt(
                path,
                format!("invalid MRC dimensions {} x {} x {}", nx, ny, nz),
            ));
        }

        let mode = h.i32(MODE);
        let nversion = h.i32(NVERSION);
        let ty = match mode_type(mode, nversion / 10 == 2014) {
            Some(ty) => ty,
            None if mode == 3 || mode == 4 => {
                return Err(Error::UnsupportedType {
                    ty: format!("complex mode {}", mode),
                    context: "mrc".to_string(),
                })
            }
            None => return Err(Error::corrupt(path, format!("unknown MRC mode {}", mode))),
        };

        let nsymbt = h.i32(NSYMBT);
        if nsymbt < 0 {
            return Err(Error::corrupt(path, format!("negative extended header size {}", nsymbt)));
        }

        let ispg = h.i32(ISPG);
        let mz = h.i32(MZ);
        let (nx, ny, nz) = (nx as usize, ny as usize, nz as usize);
        let is_image_stack = (ispg == 0 && nx > 1) || extension_of(path) == "mrcs";
        let dim = if is_image_stack {
            ArrayDim::new(nx, ny, 1, nz)
        } else if mz > 0 && nz % mz as usize == 0 {
            let mz = mz as usize;
            ArrayDim::new(nx, ny, mz, nz / mz)
        } else {
            ArrayDim::new(nx, ny, nz, 1)
        };

        let mut header = ObjectDict::new();
        header.insert("format".into(), Object::from("mrc"));
        header.insert("mode".into(), Object::from(mode));
        header.insert("nversion".into(), Object::from(nversion));
        header.insert("ispg".into(), Object::from(ispg));
        header.insert("nsymbt".into(), Object::from(nsymbt));
        header.insert("dmin".into(), Object::from(h.f32(DMIN)));
        header.insert("dmax".into(), Object::from(h.f32(DMAX)));
        header.insert("dmean".into(), Object::from(h.f32(DMEAN)));
        header.insert("rms".into(), Object::from(h.f32(RMS)));
        let mx = h.i32(MX);
        if mx > 0 {
            header.insert("pixel_size".into(), Object::from(h.f32(CELLA) / mx as f32));
        }
        let exttyp = String::from_utf8_lossy(&h.bytes[EXTTYP..EXTTYP + 4])
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string();
        if !exttyp.is_empty() {
            header.insert("exttyp".into(), Object::from(exttyp));
        }

        let swap = h.is_swapped();
        self.mode = mode;
        self.nsymbt = nsymbt as u64;
        self.header = Some(h);

        Ok(ImageInfo {
            dim,
            ty,
            swap,
            header,
        })
    }

    fn write_header(&mut self, stream: &mut FileStream, info: &ImageInfo) -> Result<()> {
        if self.mode == MODE_PACKED4 {
            return Err(packed_error());
        }
        let (mode, nversion) = type_mode(info.ty).ok_or_else(|| Error::UnsupportedType {
            ty: info.ty.name().to_string(),
            context: "mrc".to_string(),
        })?;

        // Existing headers are updated in place to keep labels and origin.
        let fresh = self.header.is_none();
        let mut h = self.header.take().unwrap_or_else(|| HeaderBuf::new(HEADER_SIZE));
        let d = info.dim;

        h.set_i32(NX, d.x as i32);
        h.set_i32(NY, d.y as i32);
        h.set_i32(NZ, (d.z * d.n) as i32);
        h.set_i32(MODE, mode);
        h.set_i32(MX, d.x as i32);
        h.set_i32(MY, d.y as i32);
        h.set_i32(MZ, d.z as i32);
        let ispg = if d.z == 1 {
            0
        } else if d.n == 1 {
            1
        } else {
            401
        };
        h.set_i32(ISPG, ispg);
        h.set_i32(NVERSION, nversion);

        if fresh {
            for (i, v) in [d.x, d.y, d.z].into_iter().enumerate() {
                h.set_f32(CELLA + 4 * i, v as f32);
                h.set_f32(CELLB + 4 * i, 90.0);
                h.set_i32(MAPC + 4 * i, i as i32 + 1);
            }
            set_stats(&mut h, None);
            h.set_i32(NSYMBT, 0);
            h.bytes[MAP..MAP + 4].copy_from_slice(b"MAP ");
            let stamp: [u8; 4] = if h.big_endian {
                [0x11, 0x11, 0, 0]
            } else {
                [0x44, 0x44, 0, 0]
            };
            h.bytes[MACHST..MACHST + 4].copy_from_slice(&stamp);
        }

        let result = stream.write_at(0, &h.bytes);
        self.header = Some(h);
        self.mode = mode;
        result
    }

    fn header_size(&self) -> u64 {
        HEADER_SIZE as u64 + self.nsymbt
    }

    fn item_bytes(&self, info: &ImageInfo) -> u64 {
        let n = info.dim.item_size();
        if self.mode == MODE_PACKED4 {
            n.div_ceil(2) as u64
        } else {
            (n * info.ty.size()) as u64
        }
    }

    fn read_item(
        &mut self,
        stream: &FileStream,
        info: &ImageInfo,
        index: usize,
        out: &mut [u8],
    ) -> Result<()> {
        let offset = self.item_offset(info, index);
        if self.mode != MODE_PACKED4 {
            return read_item_bytes(stream, offset, info, out);
        }
        let packed = stream.read_bytes(offset, self.item_bytes(info) as usize)?;
        for (i, v) in out.iter_mut().enumerate() {
            let byte = packed[i / 2];
            *v = if i % 2 == 0 { byte & 0x0F } else { byte >> 4 };
        }
        Ok(())
    }

    fn write_item(
        &mut self,
        stream: &mut FileStream,
        info: &ImageInfo,
        index: usize,
        data: &[u8],
    ) -> Result<()> {
        if self.mode == MODE_PACKED4 {
            return Err(packed_error());
        }
        write_item_bytes(stream, self.item_offset(info, index), info, data)
    }

    fn write_stats(&mut self, stream: &mut FileStream, stats: Option<&Stats>) -> Result<()> {
        let Some(h) = self.header.as_mut() else {
            return Ok(());
        };
        if stats.is_none() && h.f32(DMAX) < h.f32(DMIN) {
            return Ok(());
        }
        set_stats(h, stats);
        stream.write_at(DMIN as u64, &h.bytes[DMIN..DMEAN + 4])?;
        stream.write_at(RMS as u64, &h.bytes[RMS..RMS + 4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Image;
    use crate::formats::ImageFile;
    use crate::io::FileMode;
    use tempfile::tempdir;

    /// Minimal header in the requested byte order.
    fn raw_header(nx: i32, ny: i32, nz: i32, mode: i32, big_endian: bool) -> HeaderBuf {
        let mut h = HeaderBuf::from_bytes(vec![0u8; HEADER_SIZE], big_endian);
        h.set_i32(NX, nx);
        h.set_i32(NY, ny);
        h.set_i32(NZ, nz);
        h.set_i32(MODE, mode);
        h.set_i32(MZ, 1);
        h.set_i32(NVERSION, NVERSION_2014);
        h.bytes[MACHST] = if big_endian { 0x11 } else { 0x44 };
        h
    }

    #[test]
    fn test_mode_mapping() {
        assert_eq!(mode_type(0, true), Some(Type::INT8));
        assert_eq!(mode_type(0, false), Some(Type::UINT8));
        assert_eq!(mode_type(12, true), Some(Type::HALF));
        assert_eq!(mode_type(101, true), Some(Type::UINT8));
        assert_eq!(mode_type(7, true), None);
        assert_eq!(type_mode(Type::UINT8), Some((0, 0)));
        assert_eq!(type_mode(Type::DOUBLE), None);
    }

    #[test]
    fn test_detect_byte_order() {
        let le = raw_header(4, 4, 1, 2, false);
        let be = raw_header(4, 4, 1, 2, true);
        assert!(!detect_big_endian(&le.bytes));
        assert!(detect_big_endian(&be.bytes));

        // Blank stamp: decided by mode plausibility.
        let mut blank = raw_header(4, 4, 1, 2, true);
        blank.bytes[MACHST] = 0;
        assert!(detect_big_endian(&blank.bytes));
        blank = raw_header(4, 4, 1, 2, false);
        blank.bytes[MACHST] = 0;
        assert!(!detect_big_endian(&blank.bytes));
    }

    #[test]
    fn test_read_big_endian_float() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("be.mrc");
        let mut bytes = raw_header(2, 2, 1, 2, true).bytes;
        for v in [1.0f32, -2.0, 3.5, 4.25] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();

        let mut img = Image::new();
        img.read(&path.as_path().into()).unwrap();
        assert_eq!(img.dim(), ArrayDim::new(2, 2, 1, 1));
        assert_eq!(img.data::<f32>().unwrap(), &[1.0, -2.0, 3.5, 4.25]);
        assert_eq!(img.header()["mode"], 2);
    }

    #[test]
    fn test_read_packed_4bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packed.mrc");
        let mut bytes = raw_header(3, 1, 2, MODE_PACKED4, false).bytes;
        // ispg 0 and nx > 1: a stack of two 3-pixel images, 2 bytes each.
        bytes.extend_from_slice(&[0x21, 0x03, 0x54, 0x06]);
        std::fs::write(&path, &bytes).unwrap();

        let mut f = ImageFile::new();
        f.open(&path, FileMode::ReadOnly).unwrap();
        assert_eq!(f.dim(), ArrayDim::new(3, 1, 1, 2));
        assert_eq!(f.ty(), Type::UINT8);
        let mut img = Image::new();
        f.read(2, &mut img).unwrap();
        assert_eq!(img.data::<u8>().unwrap(), &[4, 5, 6]);
        f.read(1, &mut img).unwrap();
        assert_eq!(img.data::<u8>().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_volume_stack_dims() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vols.mrc");
        let mut h = raw_header(2, 2, 6, 0, false);
        h.set_i32(ISPG, 401);
        h.set_i32(MZ, 2);
        let mut bytes = h.bytes;
        bytes.extend_from_slice(&[0u8; 24]);
        std::fs::write(&path, &bytes).unwrap();

        let mut f = ImageFile::new();
        f.open(&path, FileMode::ReadOnly).unwrap();
        assert_eq!(f.dim(), ArrayDim::new(2, 2, 2, 3));
        assert_eq!(f.ty(), Type::INT8);
    }

    #[test]
    fn test_extended_header_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ext.mrc");
        let mut h = raw_header(2, 1, 1, 1, false);
        h.set_i32(NSYMBT, 8);
        let mut bytes = h.bytes;
        bytes.extend_from_slice(&[0xFF; 8]);
        bytes.extend_from_slice(&7i16.to_le_bytes());
        bytes.extend_from_slice(&(-7i16).to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let mut img = Image::new();
        img.read(&path.as_path().into()).unwrap();
        assert_eq!(img.data::<i16>().unwrap(), &[7, -7]);
    }

    #[test]
    fn test_corrupt_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.mrc");
        let mut f = ImageFile::new();

        std::fs::write(&path, [0u8; 100]).unwrap();
        assert!(matches!(f.open(&path, FileMode::ReadOnly), Err(Error::CorruptFile { .. })));

        std::fs::write(&path, raw_header(0, 4, 1, 2, false).bytes).unwrap();
        assert!(matches!(f.open(&path, FileMode::ReadOnly), Err(Error::CorruptFile { .. })));

        std::fs::write(&path, raw_header(4, 4, 1, 9, false).bytes).unwrap();
        assert!(matches!(f.open(&path, FileMode::ReadOnly), Err(Error::CorruptFile { .. })));

        // Truncated payload.
        let mut bytes = raw_header(4, 4, 1, 2, false).bytes;
        bytes.extend_from_slice(&[0u8; 10]);
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(f.open(&path, FileMode::ReadOnly), Err(Error::CorruptFile { .. })));
        assert!(!f.is_open());
    }

    #[test]
    fn test_overflowing_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.mrc");
        let big = 1 << 21;

        // Stack of 2^21 images of 2^21 x 2^21 floats.
        std::fs::write(&path, raw_header(big, big, big, 2, false).bytes).unwrap();
        let mut img = Image::new();
        let err = img.read(&path.as_path().into()).unwrap_err();
        assert!(matches!(err, Error::CorruptFile { .. }), "{:?}", err);
        assert!(img.is_empty());

        // One volume of 2^63 floats.
        let mut h = raw_header(big, big, big, 2, false);
        h.set_i32(ISPG, 1);
        h.set_i32(MZ, big);
        std::fs::write(&path, &h.bytes).unwrap();
        let mut f = ImageFile::new();
        let err = f.open(&path, FileMode::ReadOnly).unwrap_err();
        assert!(matches!(err, Error::CorruptFile { .. }), "{:?}", err);
    }

    #[test]
    fn test_header_statistics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.mrcs");
        let data = vec![1.0f32, 3.0, 5.0, 7.0, -2.0, 4.0];
        let img = Image::from_array(
            crate::core::Array::from_vec(ArrayDim::new(3, 1, 1, 2), data).unwrap(),
        );
        img.write(&path.as_path().into()).unwrap();

        let mut back = Image::new();
        back.read(&path.as_path().into()).unwrap();
        let h = back.header();
        assert_eq!(h["dmin"], -2.0f32);
        assert_eq!(h["dmax"], 7.0f32);
        assert_eq!(h["dmean"], 3.0f32);
        assert_eq!(h["rms"], 10.0f64.sqrt() as f32);

        // Rewriting one item leaves the statistics undetermined.
        let one = Image::from_array(
            crate::core::Array::from_vec(ArrayDim::new(3, 1, 1, 1), vec![0.0f32; 3]).unwrap(),
        );
        one.write(&crate::core::ImageLocation::new(path.clone(), 2)).unwrap();
        back.read(&path.as_path().into()).unwrap();
        assert_eq!(back.header()["dmin"], 0.0f32);
        assert_eq!(back.header()["dmax"], -1.0f32);
        assert_eq!(back.header()["rms"], -1.0f32);
    }

    #[test]
    fn test_uint8_round_trip_keeps_signedness() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("u8.mrc");
        let img = Image::from_array(
            crate::core::Array::from_vec(ArrayDim::new(3, 1, 1, 1), vec![0u8, 128, 255]).unwrap(),
        );
        img.write(&path.as_path().into()).unwrap();

        let mut back = Image::new();
        back.read(&path.as_path().into()).unwrap();
        assert_eq!(back.ty(), Type::UINT8);
        assert_eq!(back.array(), img.array());
        assert_eq!(back.header()["nversion"], 0);
    }
}
