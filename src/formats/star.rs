//! STAR text tables and the XMD dialect.
//!
//! A file is a sequence of `data_<name>` blocks. Each block holds either
//! a loop (many rows)
//!
//! ```text
//! data_particles
//!
//! loop_
//! _rlnImageName #1
//! _rlnDefocusU #2
//! 1@particles.mrcs 15060.5
//! 2@particles.mrcs 15102.0
//! ```
//!
//! or one `_label value` line per field (a single row). Values are
//! separated by whitespace and may be quoted with `'` or `"`.

use smallvec::SmallVec;

use super::table_file::{BlockInfo, TableFormat};
use crate::core::{Column, Object, Table};
use crate::util::{Error, Result, Type};

const DATA: &str = "data_";
const LOOP: &str = "loop_";
const XMD_MARKER: &str = "# XMIPP_STAR_1 *";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flavour {
    Star,
    Xmd,
}

#[derive(Debug)]
struct StarFormat {
    flavour: Flavour,
}

pub(super) fn build_star() -> Box<dyn TableFormat> {
    Box::new(StarFormat {
        flavour: Flavour::Star,
    })
}

pub(super) fn build_xmd() -> Box<dyn TableFormat> {
    Box::new(StarFormat {
        flavour: Flavour::Xmd,
    })
}

/// One value of a data line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Token<'a> {
    text: &'a str,
    quoted: bool,
}

type Tokens<'a> = SmallVec<[Token<'a>; 16]>;

/// Split a line into values. An unquoted `#` starts a comment; a quote
/// only closes when followed by whitespace or the end of the line.
fn tokenize(line: &str) -> std::result::Result<Tokens<'_>, &'static str> {
    let bytes = line.as_bytes();
    let mut tokens = Tokens::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == b'#' {
            break;
        } else if c == b'\'' || c == b'"' {
            let start = i + 1;
            let mut j = start;
            loop {
                if j >= bytes.len() {
                    return Err("unterminated quote");
                }
                if bytes[j] == c && bytes.get(j + 1).map_or(true, |b| b.is_ascii_whitespace()) {
                    break;
                }
                j += 1;
            }
            tokens.push(Token {
                text: &line[start..j],
                quoted: true,
            });
            i = j + 1;
        } else {
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            tokens.push(Token {
                text: &line[start..i],
                quoted: false,
            });
        }
    }
    Ok(tokens)
}

/// Lines of `text` with their byte offset.
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_inclusive('\n').scan(0usize, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line))
    })
}

fn is_skipped(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Field label of a `_label ...` line, without the underscore.
fn label_of(line: &str) -> &str {
    line[1..].split_whitespace().next().unwrap_or("")
}

fn malformed(line: usize, reason: impl Into<String>) -> Error {
    Error::MalformedRow {
        line,
        reason: reason.into(),
    }
}

/// Raw content of one block before typing.
#[derive(Default)]
struct RawBlock<'a> {
    labels: Vec<&'a str>,
    rows: Vec<(usize, Tokens<'a>)>,
}

fn parse_block<'a>(body: &'a str, first_line: usize) -> Result<RawBlock<'a>> {
    let mut raw = RawBlock::default();
    let mut lines = body
        .lines()
        .enumerate()
        .map(|(i, l)| (first_line + i, l.trim()))
        .filter(|(_, l)| !is_skipped(l))
        .peekable();

    match lines.peek().copied() {
        Some((_, l)) if l.starts_with(LOOP) => {
            lines.next();
            while let Some((_, l)) = lines.next_if(|(_, l)| l.starts_with('_')) {
                raw.labels.push(label_of(l));
            }
            for (n, l) in lines {
                if l.starts_with(LOOP) || l.starts_with('_') || l.starts_with(DATA) {
                    break;
                }
                let tokens = tokenize(l).map_err(|e| malformed(n, e))?;
                if tokens.len() != raw.labels.len() {
                    return Err(malformed(
                        n,
                        format!("{} values for {} fields", tokens.len(), raw.labels.len()),
                    ));
                }
                raw.rows.push((n, tokens));
            }
        }
        Some((row_line, l)) if l.starts_with('_') => {
            let mut values = Tokens::new();
            for (n, l) in lines {
                if !l.starts_with('_') {
                    break;
                }
                let tokens = tokenize(&l[1..]).map_err(|e| malformed(n, e))?;
                let &[label, value] = &tokens[..] else {
                    return Err(malformed(n, "expected '_label value'"));
                };
                raw.labels.push(label.text);
                values.push(value);
            }
            raw.rows.push((row_line, values));
        }
        _ => {}
    }
    Ok(raw)
}

/// Widest inferred type of a field; quoted values are strings.
fn infer_column(raw: &RawBlock<'_>, pos: usize) -> Type {
    let ty = raw.rows.iter().fold(Type::NULL, |acc, (_, tokens)| {
        Type::widen(acc, token_type(&tokens[pos]))
    });
    if ty.is_null() {
        Type::STRING
    } else {
        ty
    }
}

/// `nan`, `inf` and `infinity` with an optional sign, any case.
fn is_non_finite(s: &str) -> bool {
    let s = s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s);
    ["nan", "inf", "infinity"]
        .iter()
        .any(|w| s.eq_ignore_ascii_case(w))
}

/// Type a bare value counts as when inferring its column.
fn token_type(tok: &Token<'_>) -> Type {
    if tok.quoted {
        Type::STRING
    } else if is_non_finite(tok.text) {
        Type::DOUBLE
    } else {
        Type::infer_from_str(tok.text)
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.starts_with(&['_', '#', '\'', '"'][..])
        || s.starts_with(DATA)
        || s.starts_with(LOOP)
        || s.chars().any(char::is_whitespace)
        || !Type::infer_from_str(s).is_string()
        || is_non_finite(s)
}

/// Quote character that keeps `text` in one token. A quote closes when
/// followed by whitespace, so that sequence must not occur inside.
fn quote_for(text: &str) -> Option<char> {
    let closes_early = |q: char| {
        text.match_indices(q)
            .any(|(i, _)| text[i + 1..].starts_with(char::is_whitespace))
    };
    let order = if text.contains('"') { ['\'', '"'] } else { ['"', '\''] };
    order.into_iter().find(|&q| !closes_early(q))
}

fn format_value(obj: &Object, out: &mut String) -> Result<()> {
    let text = obj.to_string();
    let ty = obj.ty();
    if ty.is_string() && needs_quotes(&text) {
        let q = match quote_for(&text) {
            Some(q) if !text.contains(|c: char| c == '\n' || c == '\r') => q,
            _ => {
                return Err(Error::invalid(format!(
                    "string {:?} has no STAR representation",
                    text
                )))
            }
        };
        out.push(q);
        out.push_str(&text);
        out.push(q);
    } else {
        out.push_str(&text);
        // Keep whole floats typed as floats on the way back in.
        if ty.is_float() && text.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
            out.push_str(".0");
        }
    }
    Ok(())
}

impl TableFormat for StarFormat {
    fn name(&self) -> &'static str {
        match self.flavour {
            Flavour::Star => "star",
            Flavour::Xmd => "xmd",
        }
    }

    fn scan(&mut self, text: &str) -> Result<Vec<BlockInfo>> {
        let mut blocks: Vec<BlockInfo> = Vec::new();
        for (i, (offset, line)) in lines_with_offsets(text).enumerate() {
            let trimmed = line.trim();
            let Some(rest) = trimmed.strip_prefix(DATA) else {
                continue;
            };
            if let Some(prev) = blocks.last_mut() {
                prev.end = offset;
            }
            blocks.push(BlockInfo {
                name: rest.split_whitespace().next().unwrap_or("").to_string(),
                start: offset + line.len(),
                end: text.len(),
                line: i + 1,
            });
        }
        tracing::trace!(blocks = blocks.len(), "scanned star text");
        Ok(blocks)
    }

    fn read_block(&mut self, text: &str, block: &BlockInfo, table: &mut Table) -> Result<()> {
        let raw = parse_block(&text[block.start..block.end], block.line + 1)?;

        let mut columns = Vec::with_capacity(raw.labels.len());
        for (i, label) in raw.labels.iter().enumerate() {
            let ty = match table.column(*label) {
                Ok(col) => col.ty(),
                Err(_) => infer_column(&raw, i),
            };
            columns.push(Column::with_id(i + 1, *label, ty));
        }
        let mut parsed = Table::with_columns(columns)?;

        for (line, tokens) in &raw.rows {
            let mut row = parsed.create_row();
            for (pos, tok) in tokens.iter().enumerate() {
                row.at_mut(pos)?
                    .parse(tok.text)
                    .map_err(|e| malformed(*line, e.to_string()))?;
            }
            parsed.push_row(row);
        }

        *table = parsed;
        Ok(())
    }

    fn write_block(
        &mut self,
        out: &mut String,
        name: &str,
        table: &Table,
        new_file: bool,
    ) -> Result<()> {
        let name = match self.flavour {
            Flavour::Xmd if name.is_empty() => "noname",
            _ => name,
        };
        if new_file && self.flavour == Flavour::Xmd {
            out.push_str(XMD_MARKER);
            out.push('\n');
        }
        out.push_str(&format!("\n{}{}\n\n", DATA, name));

        if table.len() == 1 {
            let width = table.columns().iter().map(|c| c.name().len()).max().unwrap_or(0);
            for (col, obj) in table[0].iter() {
                out.push_str(&format!("_{:<width$} ", col.name(), width = width));
                format_value(obj, out)?;
                out.push('\n');
            }
        } else {
            out.push_str(LOOP);
            out.push('\n');
            for (i, col) in table.columns().iter().enumerate() {
                out.push_str(&format!("_{} #{}\n", col.name(), i + 1));
            }
            for row in table {
                for (i, obj) in row.values().iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    format_value(obj, out)?;
                }
                out.push('\n');
            }
        }
        out.push('\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# RELION; version 3.0

data_sampling_general

_rlnIs3DSampling                          1
_rlnPsiStep                       10.000000
_rlnSymmetryGroup                        C1

data_sampling_directions

loop_
_rlnAngleRot #1
_rlnAngleTilt #2
 0.000000  0.000000
 60.000000 31.717474
# trailing comment
 120.000000  90.000000
";

    fn read(text: &str, name: &str) -> Result<Table> {
        let mut fmt = StarFormat {
            flavour: Flavour::Star,
        };
        let blocks = fmt.scan(text)?;
        let block = blocks
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))?;
        let mut table = Table::new();
        fmt.read_block(text, block, &mut table)?;
        Ok(table)
    }

    #[test]
    fn test_tokenize() {
        let toks = tokenize("  a 'b c' \"it's\" 1.5 # note").unwrap();
        let texts: Vec<&str> = toks.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["a", "b c", "it's", "1.5"]);
        assert!(toks[1].quoted && !toks[3].quoted);

        assert_eq!(tokenize("'' x").unwrap()[0].text, "");
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn test_scan_blocks() {
        let mut fmt = StarFormat {
            flavour: Flavour::Star,
        };
        let blocks = fmt.scan(SAMPLE).unwrap();
        let names: Vec<&str> = blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["sampling_general", "sampling_directions"]);
        assert_eq!(blocks[0].line, 3);
        assert_eq!(blocks[0].end, blocks[1].start - "data_sampling_directions\n".len());
        assert_eq!(blocks[1].end, SAMPLE.len());
    }

    #[test]
    fn test_single_row_block() {
        let t = read(SAMPLE, "sampling_general").unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(
            t.column_names(),
            vec!["rlnIs3DSampling", "rlnPsiStep", "rlnSymmetryGroup"]
        );
        assert_eq!(t.column("rlnIs3DSampling").unwrap().ty(), Type::INT32);
        assert_eq!(t.column("rlnPsiStep").unwrap().ty(), Type::DOUBLE);
        assert_eq!(t[0]["rlnPsiStep"], 10.0);
        assert_eq!(t[0]["rlnSymmetryGroup"], "C1");
    }

    #[test]
    fn test_loop_block() {
        let t = read(SAMPLE, "sampling_directions").unwrap();
        assert_eq!(t.len(), 3);
        let ids: Vec<usize> = t.columns().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(t.column("rlnAngleTilt").unwrap().ty(), Type::DOUBLE);
        assert_eq!(t[1]["rlnAngleTilt"], 31.717474);
        assert_eq!(t[2]["rlnAngleRot"], 120.0);
    }

    #[test]
    fn test_widest_type_wins() {
        let text = "data_t\nloop_\n_a\n_b\n1 x\n2.5 7\n3000000000 8\n";
        let t = read(text, "t").unwrap();
        assert_eq!(t.column("a").unwrap().ty(), Type::DOUBLE);
        assert_eq!(t.column("b").unwrap().ty(), Type::STRING);
        assert_eq!(t[1]["b"], "7");

        let text = "data_t\nloop_\n_a\n1\n3000000000\n";
        assert_eq!(read(text, "t").unwrap().column("a").unwrap().ty(), Type::INT64);
    }

    #[test]
    fn test_predeclared_types() {
        let text = "data_t\nloop_\n_a\n_b\n1 2\n3 4\n";
        let mut fmt = StarFormat {
            flavour: Flavour::Star,
        };
        let blocks = fmt.scan(text).unwrap();
        let mut t = Table::with_columns([Column::new("b", Type::FLOAT)]).unwrap();
        fmt.read_block(text, &blocks[0], &mut t).unwrap();
        assert_eq!(t.column("a").unwrap().ty(), Type::INT32);
        assert_eq!(t.column("b").unwrap().ty(), Type::FLOAT);
        assert_eq!(t[1]["b"], 4.0f32);
    }

    #[test]
    fn test_quoted_numbers_stay_strings() {
        let text = "data_t\nloop_\n_a\n'12'\n\"13\"\n";
        let t = read(text, "t").unwrap();
        assert_eq!(t.column("a").unwrap().ty(), Type::STRING);
        assert_eq!(t[0]["a"], "12");
    }

    #[test]
    fn test_malformed_rows() {
        let text = "data_t\nloop_\n_a\n_b\n1 2\n3\n";
        match read(text, "t") {
            Err(Error::MalformedRow { line, .. }) => assert_eq!(line, 6),
            other => panic!("unexpected {:?}", other),
        }

        let text = "data_t\n_a 1 2\n";
        assert!(matches!(read(text, "t"), Err(Error::MalformedRow { line: 2, .. })));
    }

    #[test]
    fn test_loop_without_rows() {
        let t = read("data_t\nloop_\n_a #1\n_b #2\n", "t").unwrap();
        assert_eq!(t.column_count(), 2);
        assert!(t.is_empty());
        assert_eq!(t.column("a").unwrap().ty(), Type::STRING);

        let t = read("data_empty\n\n", "empty").unwrap();
        assert_eq!(t.column_count(), 0);
    }

    #[test]
    fn test_write_layouts() {
        let mut fmt = StarFormat {
            flavour: Flavour::Star,
        };
        let mut t = Table::with_columns([
            Column::new("name", Type::STRING),
            Column::new("value", Type::DOUBLE),
        ])
        .unwrap();
        let mut row = t.create_row();
        row.set("name", "two words").unwrap();
        row.set("value", 2.0).unwrap();
        t.add_row(&row).unwrap();

        let mut out = String::new();
        fmt.write_block(&mut out, "one", &t, true).unwrap();
        assert_eq!(out, "\ndata_one\n\n_name  \"two words\"\n_value 2.0\n\n");

        t.add_row(&row).unwrap();
        let mut out = String::new();
        fmt.write_block(&mut out, "two", &t, true).unwrap();
        assert!(out.contains("loop_\n_name #1\n_value #2\n\"two words\" 2.0\n"));
        assert_eq!(read(&out, "two").unwrap(), t);
    }

    #[test]
    fn test_string_quoting() {
        for (s, quoted) in [
            ("plain", false),
            ("1@a.mrcs", false),
            ("", true),
            ("42", true),
            ("_x", true),
            ("#x", true),
            ("data_x", true),
        ] {
            assert_eq!(needs_quotes(s), quoted, "{:?}", s);
        }
        assert!(needs_quotes("nan"));
        assert!(needs_quotes("-Inf"));

        let quoted = |s: &str| {
            let mut out = String::new();
            format_value(&Object::from(s), &mut out).map(|_| out)
        };
        assert_eq!(quoted("say \"hi\"").unwrap(), "'say \"hi\"'");
        assert_eq!(quoted("it's mine").unwrap(), "\"it's mine\"");
        // A single quote before a space would close '...' early.
        assert_eq!(quoted("'b' \"c\"").unwrap(), "\"'b' \"c\"\"");
        assert_eq!(quoted("x\"").unwrap(), "'x\"'");

        assert!(matches!(quoted("\"a\" and 'b' c"), Err(Error::InvalidArgument(_))));
        assert!(matches!(quoted("two\nlines"), Err(Error::InvalidArgument(_))));
        assert!(matches!(quoted("cr\r"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_awkward_strings_round_trip() {
        let mut t = Table::with_columns([Column::new("rlnComment", Type::STRING)]).unwrap();
        let texts = [
            "say \"hi\" now",
            "it's done",
            "'b' \"c\"",
            "'quoted' 10",
            "# not a comment",
            "nan",
            "-inf",
            "ends with \"",
        ];
        for text in texts {
            let mut row = t.create_row();
            row.set("rlnComment", text).unwrap();
            t.add_row(&row).unwrap();
        }

        let mut fmt = StarFormat {
            flavour: Flavour::Star,
        };
        let mut out = String::new();
        fmt.write_block(&mut out, "notes", &t, true).unwrap();
        let blocks = fmt.scan(&out).unwrap();
        let mut back = Table::new();
        fmt.read_block(&out, &blocks[0], &mut back).unwrap();
        assert_eq!(back.column("rlnComment").unwrap().ty(), Type::STRING);
        for (row, text) in back.iter().zip(texts) {
            assert_eq!(row["rlnComment"], text);
        }

        let mut row = t.create_row();
        row.set("rlnComment", "\"a\" and 'b' c").unwrap();
        t.add_row(&row).unwrap();
        let mut out = String::new();
        assert!(fmt.write_block(&mut out, "notes", &t, true).is_err());
    }

    #[test]
    fn test_non_finite_doubles_round_trip() {
        let mut t = Table::with_columns([
            Column::new("rlnDefocusU", Type::DOUBLE),
            Column::new("rlnScore", Type::FLOAT),
        ])
        .unwrap();
        for (d, f) in [(f64::NAN, 1.0f32), (f64::INFINITY, f32::NEG_INFINITY), (2.0, 0.5)] {
            let mut row = t.create_row();
            row.set("rlnDefocusU", d).unwrap();
            row.set("rlnScore", f).unwrap();
            t.add_row(&row).unwrap();
        }

        let mut fmt = StarFormat {
            flavour: Flavour::Star,
        };
        let mut out = String::new();
        fmt.write_block(&mut out, "scores", &t, true).unwrap();
        let blocks = fmt.scan(&out).unwrap();
        let mut back = Table::new();
        fmt.read_block(&out, &blocks[0], &mut back).unwrap();

        assert_eq!(back.column("rlnDefocusU").unwrap().ty(), Type::DOUBLE);
        assert_eq!(back.column("rlnScore").unwrap().ty(), Type::DOUBLE);
        assert!(back[0]["rlnDefocusU"].get::<f64>().unwrap().is_nan());
        assert_eq!(back[1]["rlnDefocusU"], f64::INFINITY);
        assert_eq!(back[1]["rlnScore"], f64::NEG_INFINITY);
        assert_eq!(back[2]["rlnDefocusU"], 2.0);
    }

    #[test]
    fn test_xmd_marker_and_noname() {
        let mut fmt = StarFormat {
            flavour: Flavour::Xmd,
        };
        let t = Table::with_columns([Column::new("image", Type::STRING)]).unwrap();
        let mut out = String::new();
        fmt.write_block(&mut out, "", &t, true).unwrap();
        assert!(out.starts_with("# XMIPP_STAR_1 *\n\ndata_noname\n"));

        let mut again = String::new();
        fmt.write_block(&mut again, "more", &t, false).unwrap();
        assert!(!again.contains(XMD_MARKER));
    }
}
