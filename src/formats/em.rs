//! EM image format (TOM toolbox / EMAN), one volume per file.
//!
//! ## Header layout (512 bytes)
//!
//! ```text
//! offset  field
//!      0  machine      u8       (0, 3, 5 big endian; 1, 2, 4, 6 little endian)
//!      1  general      u8
//!      2  unused       u8
//!      3  datatype     u8       (1 int8, 2 int16, 4 int32, 5 float, 8 complex, 9 double)
//!      4  nx, ny, nz   i32 x3
//!     16  comment      80 chars
//!     96  params       i32 x40
//!    256  user data    256 bytes
//! ```

use super::image_file::{ImageFormat, ImageInfo};
use super::HeaderBuf;
use crate::core::{ArrayDim, Object, ObjectDict};
use crate::io::FileStream;
use crate::util::{Error, Result, Type};

pub const HEADER_SIZE: usize = 512;

const MACHINE: usize = 0;
const DATATYPE: usize = 3;
const NX: usize = 4;
const NY: usize = 8;
const NZ: usize = 12;
const COMMENT: usize = 16;
const COMMENT_LEN: usize = 80;

// Machine codes written for new little and big endian files.
const MACHINE_PC: u8 = 6;
const MACHINE_SGI: u8 = 3;

static TYPES: [Type; 5] = [Type::INT8, Type::INT16, Type::INT32, Type::FLOAT, Type::DOUBLE];

pub(super) fn build() -> Box<dyn ImageFormat> {
    Box::new(EmFormat::default())
}

#[derive(Debug, Default)]
struct EmFormat {
    header: Option<HeaderBuf>,
}

fn machine_big_endian(machine: u8) -> Option<bool> {
    match machine {
        0 | 3 | 5 => Some(true),
        1 | 2 | 4 | 6 => Some(false),
        _ => None,
    }
}

fn datatype_type(code: u8) -> Option<Type> {
    Some(match code {
        1 => Type::INT8,
        2 => Type::INT16,
        4 => Type::INT32,
        5 => Type::FLOAT,
        9 => Type::DOUBLE,
        _ => return None,
    })
}

fn type_datatype(ty: Type) -> Option<u8> {
    Some(if ty == Type::INT8 {
        1
    } else if ty == Type::INT16 {
        2
    } else if ty == Type::INT32 {
        4
    } else if ty == Type::FLOAT {
        5
    } else if ty == Type::DOUBLE {
        9
    } else {
        return None;
    })
}

impl ImageFormat for EmFormat {
    fn name(&self) -> &'static str {
        "em"
    }

    fn types(&self) -> &'static [Type] {
        &TYPES
    }

    fn read_header(&mut self, stream: &FileStream) -> Result<ImageInfo> {
        let path = stream.path();
        if stream.size() < HEADER_SIZE as u64 {
            return Err(Error::corrupt(path, "file is shorter than an EM header"));
        }
        let bytes = stream.read_bytes(0, HEADER_SIZE)?;
        let machine = bytes[MACHINE];
        let big_endian = machine_big_endian(machine)
            .ok_or_else(|| Error::corrupt(path, format!("unknown EM machine code {}", machine)))?;
        let h = HeaderBuf::from_bytes(bytes, big_endian);

        let code = h.bytes[DATATYPE];
        let ty = match datatype_type(code) {
            Some(ty) => ty,
            None if code == 8 => {
                return Err(Error::UnsupportedType {
                    ty: "complex".to_string(),
                    context: "em".to_string(),
                })
            }
            None => return Err(Error::corrupt(path, format!("unknown EM data type {}", code))),
        };

        let (nx, ny, nz) = (h.i32(NX), h.i32(NY), h.i32(NZ));
        if nx <= 0 || ny <= 0 || nz <= 0 {
            return Err(Error::corrupt(
                path,
                format!("invalid EM dimensions {} x {} x {}", nx, ny, nz),
            ));
        }

        let comment = String::from_utf8_lossy(&h.bytes[COMMENT..COMMENT + COMMENT_LEN])
            .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string();
        let mut header = ObjectDict::new();
        header.insert("format".into(), Object::from("em"));
        header.insert("machine".into(), Object::from(machine));
        header.insert("datatype".into(), Object::from(code));
        if !comment.is_empty() {
            header.insert("comment".into(), Object::from(comment));
        }

        let swap = h.is_swapped();
        self.header = Some(h);
        Ok(ImageInfo {
            dim: ArrayDim::new(nx as usize, ny as usize, nz as usize, 1),
            ty,
            swap,
            header,
        })
    }

    fn write_header(&mut self, stream: &mut FileStream, info: &ImageInfo) -> Result<()> {
        let d = info.dim;
        if d.n > 1 {
            return Err(Error::invalid(format!("EM files hold a single volume, not {}", d)));
        }
        let code = type_datatype(info.ty).ok_or_else(|| Error::UnsupportedType {
            ty: info.ty.name().to_string(),
            context: "em".to_string(),
        })?;
        let to_i32 = |v: usize| {
            i32::try_from(v).map_err(|_| Error::invalid(format!("EM dimensions {} too large", d)))
        };
        let (nx, ny, nz) = (to_i32(d.x)?, to_i32(d.y)?, to_i32(d.z)?);

        let mut h = match self.header.take() {
            Some(h) => h,
            None => {
                let mut h = HeaderBuf::new(HEADER_SIZE);
                h.bytes[MACHINE] = if h.big_endian { MACHINE_SGI } else { MACHINE_PC };
                h
            }
        };
        h.bytes[DATATYPE] = code;
        h.set_i32(NX, nx);
        h.set_i32(NY, ny);
        h.set_i32(NZ, nz);

        let result = stream.write_at(0, &h.bytes);
        self.header = Some(h);
        result
    }

    fn header_size(&self) -> u64 {
        HEADER_SIZE as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Array, Image};
    use crate::formats::ImageFile;
    use crate::io::FileMode;
    use tempfile::tempdir;

    fn raw_header(machine: u8, datatype: u8, dims: [i32; 3]) -> Vec<u8> {
        let big_endian = machine_big_endian(machine).unwrap_or(false);
        let mut h = HeaderBuf::from_bytes(vec![0u8; HEADER_SIZE], big_endian);
        h.bytes[MACHINE] = machine;
        h.bytes[DATATYPE] = datatype;
        for (off, v) in [NX, NY, NZ].into_iter().zip(dims) {
            h.set_i32(off, v);
        }
        h.bytes
    }

    #[test]
    fn test_type_codes() {
        for ty in TYPES {
            assert_eq!(datatype_type(type_datatype(ty).unwrap()), Some(ty));
        }
        assert_eq!(type_datatype(Type::UINT8), None);
        assert_eq!(machine_big_endian(0), Some(true));
        assert_eq!(machine_big_endian(6), Some(false));
        assert_eq!(machine_big_endian(7), None);
    }

    #[test]
    fn test_write_read_volume() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vol.em");
        let data: Vec<f64> = (0..24).map(|v| v as f64 * 0.5).collect();
        let img = Image::from_array(Array::from_vec(ArrayDim::new(4, 3, 2, 1), data).unwrap());
        img.write(&path.as_path().into()).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 512 + 24 * 8);

        let mut back = Image::new();
        back.read(&path.as_path().into()).unwrap();
        assert_eq!(back.array(), img.array());
        assert_eq!(back.header()["format"], "em");
        assert_eq!(back.header()["datatype"], 9u8);
    }

    #[test]
    fn test_read_big_endian_int16() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("be.em");
        let mut bytes = raw_header(0, 2, [3, 1, 1]);
        bytes[COMMENT..COMMENT + 5].copy_from_slice(b"tilt ");
        for v in [1i16, -300, 7] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();

        let mut img = Image::new();
        img.read(&path.as_path().into()).unwrap();
        assert_eq!(img.data::<i16>().unwrap(), &[1, -300, 7]);
        assert_eq!(img.header()["comment"], "tilt");
        assert_eq!(img.header()["machine"], 0u8);
    }

    #[test]
    fn test_single_volume_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("one.em");
        let mut f = ImageFile::new();
        f.open(&path, FileMode::Truncate).unwrap();
        let err = f.create_empty(ArrayDim::new(4, 4, 1, 2), Type::FLOAT).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{:?}", err);

        f.create_empty(ArrayDim::new(4, 4, 1, 1), Type::FLOAT).unwrap();
        let item = Image::zeros(ArrayDim::new(4, 4, 1, 1), Type::FLOAT).unwrap();
        assert!(matches!(f.write(2, &item), Err(Error::InvalidArgument(_))));
        assert_eq!(f.dim().n, 1);
    }

    #[test]
    fn test_corrupt_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.em");
        let mut f = ImageFile::new();

        std::fs::write(&path, [0u8; 100]).unwrap();
        assert!(matches!(f.open(&path, FileMode::ReadOnly), Err(Error::CorruptFile { .. })));

        std::fs::write(&path, raw_header(9, 5, [2, 2, 1])).unwrap();
        assert!(matches!(f.open(&path, FileMode::ReadOnly), Err(Error::CorruptFile { .. })));

        std::fs::write(&path, raw_header(6, 8, [2, 2, 1])).unwrap();
        assert!(matches!(f.open(&path, FileMode::ReadOnly), Err(Error::UnsupportedType { .. })));

        std::fs::write(&path, raw_header(6, 5, [2, 0, 1])).unwrap();
        assert!(matches!(f.open(&path, FileMode::ReadOnly), Err(Error::CorruptFile { .. })));

        // Payload shorter than the declared volume.
        let mut bytes = raw_header(6, 5, [2, 2, 1]);
        bytes.extend_from_slice(&[0u8; 8]);
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(f.open(&path, FileMode::ReadOnly), Err(Error::CorruptFile { .. })));
    }
}
