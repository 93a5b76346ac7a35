//! SPIDER image and stack format.
//!
//! The header is a sequence of 32-bit floats. A stack has one main
//! header followed by a per-image header before every item; both are
//! `labbyt` bytes long.

use super::image_file::{write_item_bytes, ImageFormat, ImageInfo};
use super::{extension_of, HeaderBuf};
use crate::core::{ArrayDim, Object, ObjectDict};
use crate::io::FileStream;
use crate::util::{Error, Result, Type};

// Word offsets (float index, 0-based)
const NSLICE: usize = 0;
const NROW: usize = 1;
const IREC: usize = 2;
const IFORM: usize = 4;
const IMAMI: usize = 5;
const SIG: usize = 9;
const NSAM: usize = 11;
const LABREC: usize = 12;
const LABBYT: usize = 21;
const LENBYT: usize = 22;
const ISTACK: usize = 23;
const INUSE: usize = 24;
const MAXIM: usize = 25;
const IMGNUM: usize = 26;

/// Words needed to decode the main header fields.
const PEEK_BYTES: usize = (IMGNUM + 1) * 4;

static TYPES: [Type; 1] = [Type::FLOAT];

pub(super) fn build() -> Box<dyn ImageFormat> {
    Box::new(SpiderFormat::default())
}

#[derive(Debug, Default)]
struct SpiderFormat {
    header: Option<HeaderBuf>,
    labbyt: u64,
    stacked: bool,
}

trait Words {
    fn word(&self, i: usize) -> f32;
    fn set_word(&mut self, i: usize, v: f32);
}

impl Words for HeaderBuf {
    fn word(&self, i: usize) -> f32 {
        self.f32(i * 4)
    }

    fn set_word(&mut self, i: usize, v: f32) {
        self.set_f32(i * 4, v)
    }
}

/// Header values read in the wrong byte order come out as huge, tiny or
/// non-finite numbers.
fn is_plausible(h: &HeaderBuf) -> bool {
    let nslice = h.word(NSLICE);
    let iform = h.word(IFORM);
    nslice.is_finite()
        && iform.is_finite()
        && nslice.abs() >= 1.0
        && nslice.abs() <= 16_776_960.0
        && iform.abs() <= 1000.0
}

impl ImageFormat for SpiderFormat {
    fn name(&self) -> &'static str {
        "spider"
    }

    fn types(&self) -> &'static [Type] {
        &TYPES
    }

    fn read_header(&mut self, stream: &FileStream) -> Result<ImageInfo> {
        let path = stream.path();
        if stream.size() < PEEK_BYTES as u64 {
            return Err(Error::corrupt(path, "file is shorter than a SPIDER header"));
        }
        let bytes = stream.read_bytes(0, PEEK_BYTES)?;
        let native = cfg!(target_endian = "big");
        let mut h = HeaderBuf::from_bytes(bytes, native);
        if !is_plausible(&h) {
            h.big_endian = !native;
            if !is_plausible(&h) {
                return Err(Error::corrupt(path, "not a SPIDER header"));
            }
        }

        let iform = h.word(IFORM) as i32;
        match iform {
            1 | 3 => {}
            f if f < 0 => {
                return Err(Error::UnsupportedType {
                    ty: format!("fourier iform {}", f),
                    context: "spider".to_string(),
                })
            }
            f => return Err(Error::corrupt(path, format!("unknown SPIDER iform {}", f))),
        }

        let nsam = h.word(NSAM) as i64;
        let nrow = h.word(NROW) as i64;
        let nslice = h.word(NSLICE).abs() as i64;
        if nsam < 1 || nrow < 1 {
            return Err(Error::corrupt(
                path,
                format!("invalid SPIDER dimensions {} x {} x {}", nsam, nrow, nslice),
            ));
        }

        let labrec = h.word(LABREC) as i64;
        let lenbyt = h.word(LENBYT) as i64;
        let labbyt = h.word(LABBYT) as i64;
        if labbyt < PEEK_BYTES as i64 || labrec.checked_mul(lenbyt) != Some(labbyt) {
            return Err(Error::corrupt(
                path,
                format!("labbyt {} != labrec {} * lenbyt {}", labbyt, labrec, lenbyt),
            ));
        }

        let istack = h.word(ISTACK) as i32;
        let stacked = istack > 0;
        let n = if stacked {
            let maxim = h.word(MAXIM) as i64;
            if maxim < 1 {
                return Err(Error::corrupt(path, format!("stack with maxim {}", maxim)));
            }
            maxim as usize
        } else {
            1
        };

        if stream.size() < labbyt as u64 {
            return Err(Error::corrupt(path, "file is shorter than its SPIDER label"));
        }
        let big_endian = h.big_endian;
        let h = HeaderBuf::from_bytes(stream.read_bytes(0, labbyt as usize)?, big_endian);

        let mut header = ObjectDict::new();
        header.insert("format".into(), Object::from("spider"));
        header.insert("iform".into(), Object::from(iform));
        header.insert("istack".into(), Object::from(istack));
        header.insert("maxim".into(), Object::from(h.word(MAXIM) as i32));
        header.insert("imami".into(), Object::from(h.word(IMAMI) as i32));
        header.insert("sig".into(), Object::from(h.word(SIG)));

        let swap = h.is_swapped();
        self.labbyt = labbyt as u64;
        self.stacked = stacked;
        self.header = Some(h);

        Ok(ImageInfo {
            dim: ArrayDim::new(nsam as usize, nrow as usize, nslice.max(1) as usize, n),
            ty: Type::FLOAT,
            swap,
            header,
        })
    }

    fn write_header(&mut self, stream: &mut FileStream, info: &ImageInfo) -> Result<()> {
        if info.ty != Type::FLOAT {
            return Err(Error::UnsupportedType {
                ty: info.ty.name().to_string(),
                context: "spider".to_string(),
            });
        }
        let d = info.dim;
        let lenbyt = d.x * 4;
        let labrec = 1024usize.div_ceil(lenbyt);
        let labbyt = labrec * lenbyt;
        let data_bytes = d.item_size() * 4;
        let irec = labrec + data_bytes.div_ceil(lenbyt);
        let stacked = self.stacked || d.n > 1 || extension_of(stream.path()) == "stk";

        let mut h = match self.header.take() {
            Some(old) => HeaderBuf::from_bytes(vec![0u8; labbyt], old.big_endian),
            None => HeaderBuf::new(labbyt),
        };
        h.set_word(NSLICE, d.z as f32);
        h.set_word(NROW, d.y as f32);
        h.set_word(IREC, irec as f32);
        h.set_word(IFORM, if d.z > 1 { 3.0 } else { 1.0 });
        h.set_word(IMAMI, 0.0);
        h.set_word(SIG, -1.0);
        h.set_word(NSAM, d.x as f32);
        h.set_word(LABREC, labrec as f32);
        h.set_word(LABBYT, labbyt as f32);
        h.set_word(LENBYT, lenbyt as f32);
        if stacked {
            h.set_word(ISTACK, 2.0);
            h.set_word(INUSE, 1.0);
            h.set_word(MAXIM, d.n as f32);
        }

        let result = stream.write_at(0, &h.bytes);
        self.header = Some(h);
        self.labbyt = labbyt as u64;
        self.stacked = stacked;
        result
    }

    fn header_size(&self) -> u64 {
        self.labbyt
    }

    fn pad_size(&self) -> u64 {
        if self.stacked {
            self.labbyt
        } else {
            0
        }
    }

    fn write_item(
        &mut self,
        stream: &mut FileStream,
        info: &ImageInfo,
        index: usize,
        data: &[u8],
    ) -> Result<()> {
        let offset = self.item_offset(info, index);
        if self.stacked {
            if let Some(main) = &self.header {
                let mut item = main.clone();
                item.set_word(ISTACK, 0.0);
                item.set_word(INUSE, 1.0);
                item.set_word(MAXIM, 0.0);
                item.set_word(IMGNUM, index as f32);
                stream.write_at(offset - self.labbyt, &item.bytes)?;
            }
        } else if index > 1 {
            return Err(Error::invalid(format!(
                "item {} requested but {} is not a SPIDER stack",
                index,
                stream.path().display()
            )));
        }
        write_item_bytes(stream, offset, info, data)
    }

    fn expand(&mut self, stream: &mut FileStream, info: &ImageInfo) -> Result<()> {
        if !self.stacked {
            return Err(Error::invalid(format!(
                "{} is a single SPIDER image and cannot grow",
                stream.path().display()
            )));
        }
        let h = self.header.as_mut().ok_or(Error::NotOpen)?;
        h.set_word(MAXIM, info.dim.n as f32);
        stream.write_at(0, &h.bytes)
    }
}
