//! IMAGIC image stacks: headers in `<base>.hed`, pixel data in `<base>.img`.
//!
//! Every section of the stack has its own 1024-byte header record in the
//! `.hed` file. The `.img` file holds the raw data without any header, so
//! the session stream is always the `.img` file and this backend manages
//! the `.hed` file itself.
//!
//! ## Header record (256 words of 4 bytes)
//!
//! ```text
//! offset  field
//!      0  imn          i32      (1-based record number)
//!      4  ifol         i32      (records following, first record only)
//!     12  nblocks      i32
//!     40  rsize        i32      (bytes per section)
//!     48  ixlp         i32      (lines per section, y)
//!     52  iylp         i32      (pixels per line, x)
//!     56  type         4 chars  (PACK, INTG, LONG, REAL, COMP)
//!     68  avdens       f32
//!     72  sigma        f32
//!     84  densmax      f32
//!     88  densmin      f32
//!    240  izlp         i32      (sections per volume)
//!    268  imavers      i32
//!    272  realtype     4 bytes  (02020202 little, 04040404 big endian)
//! ```

use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};

use super::image_file::{ImageFormat, ImageInfo};
use super::HeaderBuf;
use crate::core::{ArrayDim, Object, ObjectDict};
use crate::io::FileStream;
use crate::util::{Error, Result, Type};

pub const RECORD_SIZE: usize = 1024;

const HEADER_EXT: &str = "hed";
const DATA_EXT: &str = "img";

const IMN: usize = 0;
const IFOL: usize = 4;
const NBLOCKS: usize = 12;
const RSIZE: usize = 40;
const IXLP: usize = 48;
const IYLP: usize = 52;
const TYPE: usize = 56;
const AVDENS: usize = 68;
const SIGMA: usize = 72;
const DENSMAX: usize = 84;
const DENSMIN: usize = 88;
const IZLP: usize = 240;
const IMAVERS: usize = 268;
const REALTYPE: usize = 272;

static TYPES: [Type; 4] = [Type::UINT8, Type::INT16, Type::INT32, Type::FLOAT];

pub(super) fn build() -> Box<dyn ImageFormat> {
    Box::new(ImagicFormat::default())
}

#[derive(Debug, Default)]
struct ImagicFormat {
    hed: Option<FileStream>,
    header: Option<HeaderBuf>,
    /// Header records present in the `.hed` file
    records: usize,
}

fn type_code(ty: Type) -> Option<&'static [u8; 4]> {
    Some(if ty == Type::UINT8 {
        b"PACK"
    } else if ty == Type::INT16 {
        b"INTG"
    } else if ty == Type::INT32 {
        b"LONG"
    } else if ty == Type::FLOAT {
        b"REAL"
    } else {
        return None;
    })
}

fn code_type(code: &[u8]) -> Option<Type> {
    Some(match code {
        b"PACK" => Type::UINT8,
        b"INTG" => Type::INT16,
        b"LONG" => Type::INT32,
        b"REAL" => Type::FLOAT,
        _ => return None,
    })
}

/// Byte order from the realtype stamp; `None` for VAX floats. Records
/// without a stamp are judged by the little endian line length.
fn detect_big_endian(bytes: &[u8]) -> Option<bool> {
    match bytes[REALTYPE..REALTYPE + 4] {
        [2, 2, 2, 2] => Some(false),
        [4, 4, 4, 4] => Some(true),
        [0, 0, 0, 1] | [1, 0, 0, 0] => None,
        _ => {
            let iylp = LittleEndian::read_i32(&bytes[IYLP..IYLP + 4]);
            Some(!(1..=1 << 20).contains(&iylp))
        }
    }
}

fn fresh_header() -> HeaderBuf {
    let mut h = HeaderBuf::new(RECORD_SIZE);
    let stamp = if h.big_endian { [4u8; 4] } else { [2u8; 4] };
    h.bytes[REALTYPE..REALTYPE + 4].copy_from_slice(&stamp);
    h
}

impl ImagicFormat {
    fn open_header_file(&mut self, data: &FileStream) -> Result<()> {
        if self.hed.is_none() {
            let path = data.path().with_extension(HEADER_EXT);
            self.hed = Some(FileStream::open_opts(path, data.mode(), false)?);
        }
        Ok(())
    }

    /// Write the first record and records `first_new..=n`, then trim the
    /// header file to `n` records.
    fn store(&mut self, data: &FileStream, info: &ImageInfo, first_new: usize) -> Result<()> {
        let d = info.dim;
        if d.z > 1 {
            return Err(Error::invalid(format!("IMAGIC volumes cannot be written: {}", d)));
        }
        let code = type_code(info.ty).ok_or_else(|| Error::UnsupportedType {
            ty: info.ty.name().to_string(),
            context: "imagic".to_string(),
        })?;
        let too_large = || Error::invalid(format!("IMAGIC stack {} too large", d));
        let ifol = i32::try_from(d.n - 1).map_err(|_| too_large())?;
        let rsize = i32::try_from(d.item_size() * info.ty.size()).map_err(|_| too_large())?;
        let ixlp = i32::try_from(d.y).map_err(|_| too_large())?;
        let iylp = i32::try_from(d.x).map_err(|_| too_large())?;
        let len = (d.n as u64)
            .checked_mul(RECORD_SIZE as u64)
            .ok_or_else(too_large)?;

        self.open_header_file(data)?;
        let mut h = self.header.take().unwrap_or_else(fresh_header);
        h.set_i32(NBLOCKS, 1);
        h.set_i32(RSIZE, rsize);
        h.set_i32(IXLP, ixlp);
        h.set_i32(IYLP, iylp);
        h.set_i32(IZLP, 1);
        h.bytes[TYPE..TYPE + 4].copy_from_slice(code);

        let result = match self.hed.as_mut() {
            Some(hed) => write_records(hed, &h, ifol, first_new, d.n, len),
            None => Err(Error::NotOpen),
        };
        h.set_i32(IMN, 1);
        h.set_i32(IFOL, ifol);
        self.header = Some(h);
        if result.is_ok() {
            self.records = d.n;
        }
        result
    }
}

fn write_records(
    hed: &mut FileStream,
    template: &HeaderBuf,
    ifol: i32,
    first_new: usize,
    n: usize,
    len: u64,
) -> Result<()> {
    let mut record = template.clone();
    record.set_i32(IMN, 1);
    record.set_i32(IFOL, ifol);
    hed.write_at(0, &record.bytes)?;

    record.set_i32(IFOL, 0);
    for k in first_new.max(2)..=n {
        record.set_i32(IMN, k as i32);
        hed.write_at((k as u64 - 1) * RECORD_SIZE as u64, &record.bytes)?;
    }
    hed.set_len(len)
}

impl ImageFormat for ImagicFormat {
    fn name(&self) -> &'static str {
        "imagic"
    }

    fn types(&self) -> &'static [Type] {
        &TYPES
    }

    fn data_path(&self, path: &Path) -> PathBuf {
        path.with_extension(DATA_EXT)
    }

    fn read_header(&mut self, stream: &FileStream) -> Result<ImageInfo> {
        self.open_header_file(stream)?;
        let Some(hed) = self.hed.as_ref() else {
            return Err(Error::NotOpen);
        };
        let path = hed.path();
        if hed.size() < RECORD_SIZE as u64 {
            return Err(Error::corrupt(path, "missing IMAGIC header record"));
        }
        let bytes = hed.read_bytes(0, RECORD_SIZE)?;
        let big_endian = detect_big_endian(&bytes).ok_or_else(|| Error::UnsupportedType {
            ty: "VAX real".to_string(),
            context: "imagic".to_string(),
        })?;
        let h = HeaderBuf::from_bytes(bytes, big_endian);

        let code = &h.bytes[TYPE..TYPE + 4];
        let ty = match code_type(code) {
            Some(ty) => ty,
            None if code == b"COMP" => {
                return Err(Error::UnsupportedType {
                    ty: "complex".to_string(),
                    context: "imagic".to_string(),
                })
            }
            None => {
                return Err(Error::corrupt(
                    path,
                    format!("unknown IMAGIC type {:?}", String::from_utf8_lossy(code)),
                ))
            }
        };

        let (ifol, ixlp, iylp, izlp) = (h.i32(IFOL), h.i32(IXLP), h.i32(IYLP), h.i32(IZLP));
        if ifol < 0 || ixlp <= 0 || iylp <= 0 || izlp < 0 {
            return Err(Error::corrupt(
                path,
                format!(
                    "invalid IMAGIC header: ifol {} ixlp {} iylp {} izlp {}",
                    ifol, ixlp, iylp, izlp
                ),
            ));
        }
        let records = ifol as usize + 1;
        let z = (izlp as usize).max(1);
        let dim = if records % z == 0 {
            ArrayDim::new(iylp as usize, ixlp as usize, z, records / z)
        } else {
            ArrayDim::new(iylp as usize, ixlp as usize, 1, records)
        };

        let mut header = ObjectDict::new();
        header.insert("format".into(), Object::from("imagic"));
        header.insert("type".into(), Object::from(String::from_utf8_lossy(code).into_owned()));
        header.insert("imavers".into(), Object::from(h.i32(IMAVERS)));
        header.insert("avdens".into(), Object::from(h.f32(AVDENS)));
        header.insert("sigma".into(), Object::from(h.f32(SIGMA)));
        header.insert("densmax".into(), Object::from(h.f32(DENSMAX)));
        header.insert("densmin".into(), Object::from(h.f32(DENSMIN)));

        let swap = h.is_swapped();
        self.header = Some(h);
        self.records = records;
        Ok(ImageInfo {
            dim,
            ty,
            swap,
            header,
        })
    }

    fn write_header(&mut self, stream: &mut FileStream, info: &ImageInfo) -> Result<()> {
        self.store(stream, info, 2)
    }

    fn header_size(&self) -> u64 {
        0
    }

    fn expand(&mut self, stream: &mut FileStream, info: &ImageInfo) -> Result<()> {
        let first_new = self.records + 1;
        self.store(stream, info, first_new)
    }
}
