use crate::cell::*;
use crate::error::*;
use crate::image::char_addr;
use crate::state::State;

pub fn core_word_dot(xs: &mut State, _: usize) -> Zresult {
    let val = xs.pop()?;
    let text = format!("{} ", fmt_cell(val));
    xs.print(&text);
    OK
}

// bottom-to-top picture of the data stack
pub fn core_word_dot_s(xs: &mut State, _: usize) -> Zresult {
    use std::fmt::Write;
    let mut buf = String::new();
    for i in (0..xs.depth()).rev() {
        write!(buf, "{} ", fmt_cell(xs.pick(i)?)).unwrap();
    }
    buf.push_str("<top");
    xs.print(&buf);
    OK
}

pub fn core_word_emit(xs: &mut State, _: usize) -> Zresult {
    let val = xs.pop()?;
    let b = val as i64;
    let c = if (32..=126).contains(&b) {
        b as u8 as char
    } else {
        '?'
    };
    let mut tmp = [0u8; 4];
    let text: &str = c.encode_utf8(&mut tmp);
    xs.print(text);
    OK
}

pub fn core_word_type(xs: &mut State, _: usize) -> Zresult {
    let len = to_offset(xs.pop()?)?;
    let addr = char_addr(xs.pop()?)?;
    let text: String = xs.bytes(addr, len)?.iter().map(|b| *b as char).collect();
    xs.print(&text);
    OK
}

pub fn core_word_cr(xs: &mut State, _: usize) -> Zresult {
    xs.print("\n");
    OK
}

pub fn core_word_space(xs: &mut State, _: usize) -> Zresult {
    xs.print(" ");
    OK
}

pub fn core_word_spaces(xs: &mut State, _: usize) -> Zresult {
    let n = xs.pop()? as i64;
    if n > 0 {
        let text = " ".repeat(n as usize);
        xs.print(&text);
    }
    OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn boot_with_capture() -> (State, Rc<RefCell<String>>) {
        let mut xs = State::boot().unwrap();
        let buf = Rc::new(RefCell::new(String::new()));
        let sink = buf.clone();
        xs.intercept_output(Box::new(move |s| sink.borrow_mut().push_str(s)));
        (xs, buf)
    }

    #[test]
    fn test_dot() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("42 .");
        assert_eq!("42 . 42  ok\n", out.borrow().as_str());
        xs.interpret("-1 .");
        assert!(out.borrow().contains("-1 "));
    }

    #[test]
    fn test_dot_s() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("1 2 3 .S");
        assert!(out.borrow().contains("1 2 3 <top"));
        // stack untouched
        assert_eq!(3, xs.depth());
    }

    #[test]
    fn test_emit() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("65 EMIT");
        assert!(out.borrow().contains("A ok\n"));
        xs.interpret("7 EMIT");
        assert!(out.borrow().contains("? ok\n"));
    }

    #[test]
    fn test_type() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("S\" Hello\" TYPE");
        assert!(out.borrow().contains("Hello ok\n"));
    }

    #[test]
    fn test_dot_quote() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret(".\" hi there\"");
        assert!(out.borrow().ends_with("hi there ok\n"));
    }

    #[test]
    fn test_cr_space_spaces() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("CR");
        assert!(out.borrow().contains("\n ok\n"));
        xs.interpret("3 SPACES");
        assert!(out.borrow().contains("    ok\n"));
    }
}
