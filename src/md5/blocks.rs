use glam::Vec3;

use super::Md5Error;

/// One brace-delimited section of an MD5 file. `name` is the opening line
/// with the trailing `{` removed, so every `frame N` block keeps its own
/// identity (`"frame 0"`, `"frame 1"`, ...).
#[derive(Debug)]
pub struct RawBlock<'a> {
    pub name: &'a str,
    pub body: Vec<&'a str>,
}

/// A model or animation file split into its flat header (everything up to
/// and including the first block opener) and its blocks, in source order.
/// Borrows the input text.
#[derive(Debug)]
pub struct RawDocument<'a> {
    pub header: Vec<&'a str>,
    pub blocks: Vec<RawBlock<'a>>,
}

impl<'a> RawDocument<'a> {
    pub fn parse(text: &'a str) -> Result<Self, Md5Error> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return Err(Md5Error::EmptyFile);
        }

        let first_open = lines
            .iter()
            .position(|line| line.trim_end().ends_with('{'))
            .ok_or(Md5Error::MissingHeader)?;
        let header = lines[..=first_open].to_vec();

        let mut blocks = Vec::new();
        let mut open: Option<(&str, usize)> = None;
        for (index, line) in lines.iter().enumerate().skip(first_open) {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_suffix('{') {
                // A new opener while a block is still open abandons the
                // unclosed one; the format has no nested blocks.
                open = Some((rest.trim_end(), index));
            } else if trimmed.ends_with('}') {
                if let Some((name, start)) = open.take() {
                    blocks.push(RawBlock { name, body: lines[start + 1..index].to_vec() });
                }
            }
        }

        Ok(Self { header, blocks })
    }

    /// First block with the given name, if any.
    pub fn block(&self, name: &str) -> Option<&RawBlock<'a>> {
        self.blocks.iter().find(|block| block.name == name)
    }
}

/// Splits a line into tokens: whitespace separates, `(` and `)` stand
/// alone, a double-quoted run is one token (quotes kept), and `//` starts
/// a comment that runs to the end of the line.
pub fn tokenize(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            break;
        } else if b == b'(' || b == b')' {
            tokens.push(&line[i..i + 1]);
            i += 1;
        } else if b == b'"' {
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            if i < bytes.len() {
                i += 1;
            }
            tokens.push(&line[start..i]);
        } else {
            let start = i;
            while i < bytes.len() && !is_delimiter(bytes[i]) {
                i += 1;
            }
            tokens.push(&line[start..i]);
        }
    }
    tokens
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'(' || b == b')' || b == b'"'
}

/// Strips the surrounding double quotes from a quoted token. Tokens
/// without both quotes come back unchanged.
pub fn unquote(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(token)
}

pub fn parse_f32(token: &str, context: &'static str) -> Result<f32, Md5Error> {
    token
        .parse()
        .map_err(|_| Md5Error::InvalidNumber { token: token.to_string(), context })
}

pub fn parse_i32(token: &str, context: &'static str) -> Result<i32, Md5Error> {
    token
        .parse()
        .map_err(|_| Md5Error::InvalidNumber { token: token.to_string(), context })
}

pub fn parse_u32(token: &str, context: &'static str) -> Result<u32, Md5Error> {
    token
        .parse()
        .map_err(|_| Md5Error::InvalidNumber { token: token.to_string(), context })
}

pub fn parse_usize(token: &str, context: &'static str) -> Result<usize, Md5Error> {
    token
        .parse()
        .map_err(|_| Md5Error::InvalidNumber { token: token.to_string(), context })
}

/// Reads a `( x y z )` group starting at `tokens[at]`. `Ok(None)` means
/// the tokens are not shaped like a triple (callers skip the line);
/// a malformed number inside a well-shaped triple is a hard error.
pub fn read_vec3(
    tokens: &[&str],
    at: usize,
    context: &'static str,
) -> Result<Option<Vec3>, Md5Error> {
    if tokens.len() < at + 5 || tokens[at] != "(" || tokens[at + 4] != ")" {
        return Ok(None);
    }
    let x = parse_f32(tokens[at + 1], context)?;
    let y = parse_f32(tokens[at + 2], context)?;
    let z = parse_f32(tokens[at + 3], context)?;
    Ok(Some(Vec3::new(x, y, z)))
}
