use crate::cell::*;
use crate::error::*;
use crate::image::*;
use crate::state::State;
use memchr::memchr;

fn input_count(xs: &State) -> Zresult1<usize> {
    let c = to_offset(xs.fetch(TIB_LEN_ADDR)?)?;
    Ok(c.min(TIB_SIZE - 1))
}

fn input_pos(xs: &State, count: usize) -> Zresult1<usize> {
    let p = to_offset(xs.fetch(TIB_IN_ADDR)?)?;
    Ok(p.min(count))
}

/// Scan from `>IN` to the delimiter or the end of the input buffer.
/// Returns the token's image address and length; `>IN` ends up past the
/// delimiter.
pub fn parse(xs: &mut State, delim: u8) -> Zresult1<(usize, usize)> {
    let count = input_count(xs)?;
    let pos = input_pos(xs, count)?;
    let (len, next) = {
        let rest = xs.bytes(TIB_ADDR + pos, count - pos)?;
        match memchr(delim, rest) {
            Some(i) => (i, pos + i + 1),
            None => (rest.len(), count),
        }
    };
    xs.store(TIB_IN_ADDR, next as Zreal)?;
    Ok((TIB_ADDR + pos, len))
}

fn skip_leading(xs: &mut State, delim: u8) -> Zresult {
    let count = input_count(xs)?;
    let mut pos = input_pos(xs, count)?;
    {
        let rest = xs.bytes(TIB_ADDR + pos, count - pos)?;
        pos += rest.iter().take_while(|b| **b == delim).count();
    }
    xs.store(TIB_IN_ADDR, pos as Zreal)
}

/// Skip leading spaces, then parse the next space-delimited token. The raw
/// token is also kept in the parsed-word buffer for diagnostics.
pub fn parse_name(xs: &mut State) -> Zresult1<(usize, usize)> {
    skip_leading(xs, b' ')?;
    let (addr, len) = parse(xs, b' ')?;
    let n = len.min(PARSE_WORD_SIZE - 1);
    xs.copy_bytes(addr, PARSE_WORD_ADDR + 1, n)?;
    xs.cstore(PARSE_WORD_ADDR, n as u8)?;
    Ok((addr, len))
}

/// Copy `len` characters from `src` to `dst+1` folding a-z to A-Z, and put
/// the length at `dst`, producing a counted string.
pub fn to_uppercase(xs: &mut State, src: usize, len: usize, dst: usize) -> Zresult1<usize> {
    let n = len.min(255);
    xs.copy_bytes(src, dst + 1, n)?;
    for i in 0..n {
        let b = xs.cfetch(dst + 1 + i)?;
        xs.cstore(dst + 1 + i, b.to_ascii_uppercase())?;
    }
    xs.cstore(dst, n as u8)?;
    Ok(dst)
}

/// Signed decimal accumulation. Returns the value and how many characters
/// were left unconsumed; anything non-zero means the text was not a number.
pub fn to_number(digits: &[u8]) -> (Zreal, usize) {
    let mut i = 0;
    let mut sign = 1.0;
    match digits.first() {
        Some(b'-') => {
            sign = -1.0;
            i = 1;
        }
        Some(b'+') => {
            i = 1;
        }
        _ => (),
    }
    let mut res = 0.0;
    let mut seen = 0;
    while i < digits.len() && digits[i].is_ascii_digit() {
        res = res * 10.0 + (digits[i] - b'0') as Zreal;
        i += 1;
        seen += 1;
    }
    if seen == 0 {
        return (0.0, digits.len().max(1));
    }
    (sign * res, digits.len() - i)
}

// ---- parsing words

pub fn core_word_source(xs: &mut State, _: usize) -> Zresult {
    xs.push(TIB_ADDR as Zreal)?;
    let count = xs.fetch(TIB_LEN_ADDR)?;
    xs.push(count)
}

pub fn core_word_to_in(xs: &mut State, _: usize) -> Zresult {
    xs.push(TIB_IN_ADDR as Zreal)
}

pub fn core_word_bl(xs: &mut State, _: usize) -> Zresult {
    xs.push(b' ' as Zreal)
}

pub fn core_word_parse(xs: &mut State, _: usize) -> Zresult {
    let delim = (xs.pop()? as i64 & 0xff) as u8;
    let (addr, len) = parse(xs, delim)?;
    xs.push(addr as Zreal)?;
    xs.push(len as Zreal)
}

pub fn core_word_parse_name(xs: &mut State, _: usize) -> Zresult {
    let (addr, len) = parse_name(xs)?;
    xs.push(addr as Zreal)?;
    xs.push(len as Zreal)
}

// legacy variant: counted copy into POD
pub fn core_word_word(xs: &mut State, _: usize) -> Zresult {
    let delim = (xs.pop()? as i64 & 0xff) as u8;
    skip_leading(xs, delim)?;
    let (addr, len) = parse(xs, delim)?;
    let n = len.min(255);
    xs.copy_bytes(addr, POD_ADDR + 1, n)?;
    xs.cstore(POD_ADDR, n as u8)?;
    xs.push(POD_ADDR as Zreal)
}

pub fn core_word_char(xs: &mut State, _: usize) -> Zresult {
    let (addr, len) = parse_name(xs)?;
    if len == 0 {
        return Err(Zerr::EmptyName);
    }
    let b = xs.cfetch(addr)?;
    xs.push(b as Zreal)
}

pub fn core_word_count(xs: &mut State, _: usize) -> Zresult {
    let addr = char_addr(xs.pop()?)?;
    let len = xs.cfetch(addr)?;
    xs.push((addr + 1) as Zreal)?;
    xs.push(len as Zreal)
}

pub fn core_word_to_number(xs: &mut State, _: usize) -> Zresult {
    let len = to_offset(xs.pop()?)?;
    let addr = char_addr(xs.pop()?)?;
    let (num, rest) = to_number(xs.bytes(addr, len)?);
    xs.push(num)?;
    xs.push(rest as Zreal)
}

pub fn core_word_to_uppercase(xs: &mut State, _: usize) -> Zresult {
    let dst = char_addr(xs.pop()?)?;
    let len = to_offset(xs.pop()?)?;
    let src = char_addr(xs.pop()?)?;
    let dst = to_uppercase(xs, src, len, dst)?;
    xs.push(dst as Zreal)
}

pub fn core_word_find(xs: &mut State, _: usize) -> Zresult {
    let caddr = char_addr(xs.pop()?)?;
    let (xt, order) = xs.find(caddr)?;
    xs.push(xt)?;
    xs.push(order as Zreal)
}

pub fn core_word_s_quote(xs: &mut State, _: usize) -> Zresult {
    let (addr, len) = parse(xs, b'"')?;
    let n = len.min(255);
    xs.copy_bytes(addr, POD_ADDR + 1, n)?;
    xs.cstore(POD_ADDR, n as u8)?;
    xs.push((POD_ADDR + 1) as Zreal)?;
    xs.push(n as Zreal)
}

pub fn core_word_dot_quote(xs: &mut State, _: usize) -> Zresult {
    let (addr, len) = parse(xs, b'"')?;
    let text: String = xs.bytes(addr, len)?.iter().map(|b| *b as char).collect();
    xs.print(&text);
    OK
}

pub fn core_word_paren(xs: &mut State, _: usize) -> Zresult {
    parse(xs, b')')?;
    OK
}

pub fn core_word_backslash(xs: &mut State, _: usize) -> Zresult {
    let count = xs.fetch(TIB_LEN_ADDR)?;
    xs.store(TIB_IN_ADDR, count)
}
