//! Strict VPD parser
//!
//! Works on "significant" lines: `//` comments stripped, whitespace trimmed,
//! blank lines dropped. Errors carry the 1-based line number in the file.

use glam::{DQuat, DVec3};

use super::{VPD_MAGIC, VpdBone, VpdDocument, VpdMorph};
use crate::error::{PoseLibError, Result};

struct Cursor<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
    total: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                let line = line.split_once("//").map_or(line, |(code, _)| code).trim();
                (!line.is_empty()).then_some((i + 1, line))
            })
            .collect();
        Self {
            lines,
            pos: 0,
            total: text.lines().count(),
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).map(|&(_, line)| line)
    }

    fn next_opt(&mut self) -> Option<(usize, &'a str)> {
        let entry = self.lines.get(self.pos).copied();
        if entry.is_some() {
            self.pos += 1;
        }
        entry
    }

    fn next(&mut self, expected: &str) -> Result<(usize, &'a str)> {
        self.next_opt().ok_or_else(|| {
            PoseLibError::invalid_file(
                self.total.max(1),
                format!("unexpected end of file, expected {expected}"),
            )
        })
    }
}

/// `body;` → `body`
fn statement(line_no: usize, line: &str) -> Result<&str> {
    line.strip_suffix(';')
        .map(str::trim)
        .ok_or_else(|| PoseLibError::invalid_file(line_no, format!("missing ';' in '{line}'")))
}

fn floats<const N: usize>(line_no: usize, line: &str, what: &str) -> Result<[f64; N]> {
    let body = statement(line_no, line)?;
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(PoseLibError::invalid_file(
            line_no,
            format!("expected {N} values for {what}, found {}", parts.len()),
        ));
    }

    let mut values = [0.0; N];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| PoseLibError::invalid_file(line_no, format!("bad number '{part}' in {what}")))?;
    }
    Ok(values)
}

/// `Bone3{name` → `(3, "name")`
fn block_header<'a>(line_no: usize, line: &'a str, keyword: &str) -> Result<(usize, &'a str)> {
    let malformed = || PoseLibError::invalid_file(line_no, format!("malformed {keyword} block header '{line}'"));
    let rest = line.strip_prefix(keyword).ok_or_else(malformed)?;
    let (index, name) = rest.split_once('{').ok_or_else(malformed)?;
    let index = index.trim().parse::<usize>().map_err(|_| malformed())?;
    Ok((index, name.trim()))
}

fn expect_block_index(line_no: usize, keyword: &str, index: usize, expected: usize) -> Result<()> {
    if index != expected {
        return Err(PoseLibError::invalid_file(
            line_no,
            format!("{keyword}{index} out of order, expected {keyword}{expected}"),
        ));
    }
    Ok(())
}

fn close_block(cursor: &mut Cursor<'_>, keyword: &str) -> Result<()> {
    let (line_no, line) = cursor.next("'}'")?;
    if line != "}" {
        return Err(PoseLibError::invalid_file(
            line_no,
            format!("expected '}}' closing {keyword} block, found '{line}'"),
        ));
    }
    Ok(())
}

impl VpdDocument {
    /// Parse decoded text. No partial result on failure.
    pub fn parse(text: &str) -> Result<Self> {
        let mut cursor = Cursor::new(text);

        let (line_no, magic) = cursor.next("header")?;
        if magic != VPD_MAGIC {
            return Err(PoseLibError::invalid_file(
                line_no,
                format!("expected '{VPD_MAGIC}', found '{magic}'"),
            ));
        }

        let (line_no, model) = cursor.next("model name")?;
        let model_name = statement(line_no, model)?.to_string();

        let (count_line, count) = cursor.next("bone count")?;
        let declared: usize = statement(count_line, count)?
            .parse()
            .map_err(|_| PoseLibError::invalid_file(count_line, format!("bad bone count '{count}'")))?;

        let mut bones = Vec::with_capacity(declared);
        while cursor.peek().is_some_and(|line| line.starts_with("Bone")) {
            let (line_no, header) = cursor.next("bone block")?;
            let (index, name) = block_header(line_no, header, "Bone")?;
            expect_block_index(line_no, "Bone", index, bones.len())?;

            let (line_no, line) = cursor.next("bone location")?;
            let [x, y, z] = floats::<3>(line_no, line, "location")?;
            let (line_no, line) = cursor.next("bone rotation")?;
            let [qx, qy, qz, qw] = floats::<4>(line_no, line, "rotation")?;
            close_block(&mut cursor, "Bone")?;

            bones.push(VpdBone {
                name: name.to_string(),
                location: DVec3::new(x, y, z),
                rotation: DQuat::from_xyzw(qx, qy, qz, qw),
            });
        }

        if bones.len() != declared {
            return Err(PoseLibError::invalid_file(
                count_line,
                format!("declared {declared} bones, found {}", bones.len()),
            ));
        }

        let mut morphs = Vec::new();
        while cursor.peek().is_some_and(|line| line.starts_with("Morph")) {
            let (line_no, header) = cursor.next("morph block")?;
            let (index, name) = block_header(line_no, header, "Morph")?;
            expect_block_index(line_no, "Morph", index, morphs.len())?;

            let (line_no, line) = cursor.next("morph weight")?;
            let [weight] = floats::<1>(line_no, line, "weight")?;
            close_block(&mut cursor, "Morph")?;

            morphs.push(VpdMorph {
                name: name.to_string(),
                weight,
            });
        }

        if let Some((line_no, extra)) = cursor.next_opt() {
            return Err(PoseLibError::invalid_file(line_no, format!("unexpected '{extra}'")));
        }

        Ok(Self {
            model_name,
            bones,
            morphs,
        })
    }
}
