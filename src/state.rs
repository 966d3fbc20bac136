use crate::arith::*;
use crate::cell::*;
use crate::error::*;
use crate::image::*;
use crate::output::*;
use crate::parse::*;

// Runtime ids of the seven internal runtimes, fixed by registration order.
pub const RID_VARIABLE: usize = NATIVE_XT_ADDR;
pub const RID_CONSTANT: usize = NATIVE_XT_ADDR + 1;
pub const RID_VALUE: usize = NATIVE_XT_ADDR + 2;
pub const RID_NEST: usize = NATIVE_XT_ADDR + 3;
pub const RID_UNNEST: usize = NATIVE_XT_ADDR + 4;
pub const RID_NEXT: usize = NATIVE_XT_ADDR + 5;
pub const RID_CELL: usize = NATIVE_XT_ADDR + 6;

pub struct State {
    image: Image,
    // dictionary-space pointer (HERE) and the two stack pointers; these
    // live outside the image and are reset by ABORT/QUIT
    dsp: usize,
    sp: usize,
    rp: usize,
    natives: Vec<ZfnType>,
    output: Option<Box<dyn FnMut(&str)>>,
}

impl State {
    pub fn boot() -> Zresult1<State> {
        let mut xs = State {
            image: Image::new(),
            dsp: DSP_START_ADDR,
            sp: DATA_STACK_ADDR,
            rp: RETURN_STACK_ADDR,
            natives: Vec::new(),
            output: None,
        };
        xs.load_core()?;
        Ok(xs)
    }

    fn load_core(&mut self) -> Zresult {
        struct Def(&'static str, ZfnType);
        // the seven runtimes come first so their ids start at the base;
        // they are nameless and hidden
        for i in [
            Def("", variable_rts),
            Def("", constant_rts),
            Def("", value_rts),
            Def("", nest_rts),
            Def("", unnest_rts),
            Def("", next_rts),
            Def("", cell_rts),
        ]
        .iter()
        {
            self.def_word(i.0, i.1, HIDDEN_FLAG)?;
        }
        for i in [
            Def(";", core_word_semicolon),
            Def("(", core_word_paren),
            Def("\\", core_word_backslash),
        ]
        .iter()
        {
            self.def_word(i.0, i.1, IMMEDIATE_FLAG)?;
        }
        for i in [
            Def("DUP", |xs: &mut State, _| xs.dup_data()),
            Def("?DUP", core_word_question_dup),
            Def("DROP", |xs: &mut State, _| xs.drop_data()),
            Def("SWAP", |xs: &mut State, _| xs.swap_data()),
            Def("OVER", |xs: &mut State, _| xs.over_data()),
            Def("ROT", |xs: &mut State, _| xs.rot_data()),
            Def("-ROT", core_word_minus_rot),
            Def("NIP", core_word_nip),
            Def("TUCK", core_word_tuck),
            Def("PICK", core_word_pick),
            Def("DEPTH", core_word_depth),
            Def("2DUP", core_word_two_dup),
            Def("2DROP", core_word_two_drop),
            Def("2SWAP", core_word_two_swap),
            Def("2OVER", core_word_two_over),
            Def(">R", core_word_to_r),
            Def("R>", core_word_r_from),
            Def("R@", core_word_r_fetch),
            Def("+", core_word_add),
            Def("-", core_word_sub),
            Def("*", core_word_mul),
            Def("/", core_word_div),
            Def("MOD", core_word_mod),
            Def("/MOD", core_word_div_mod),
            Def("NEGATE", core_word_negate),
            Def("ABS", core_word_abs),
            Def("MIN", core_word_min),
            Def("MAX", core_word_max),
            Def("1+", core_word_one_plus),
            Def("1-", core_word_one_minus),
            Def("2*", core_word_two_star),
            Def("2/", core_word_two_slash),
            Def("=", core_word_eq),
            Def("<>", core_word_ne),
            Def("<", core_word_less),
            Def(">", core_word_greater),
            Def("<=", core_word_less_eq),
            Def(">=", core_word_greater_eq),
            Def("0=", core_word_zero_eq),
            Def("0<", core_word_zero_less),
            Def("0>", core_word_zero_greater),
            Def("AND", core_word_and),
            Def("OR", core_word_or),
            Def("XOR", core_word_xor),
            Def("INVERT", core_word_invert),
            Def("TRUE", core_word_true),
            Def("FALSE", core_word_false),
            Def("@", core_word_fetch),
            Def("!", core_word_store),
            Def("C@", core_word_cfetch),
            Def("C!", core_word_cstore),
            Def("+!", core_word_plus_store),
            Def(",", core_word_comma),
            Def("C,", core_word_ccomma),
            Def("ALLOT", core_word_allot),
            Def("HERE", core_word_here),
            Def("ALIGN", core_word_align),
            Def("ALIGNED", core_word_aligned),
            Def("CELLS", core_word_cells),
            Def("CELL+", core_word_cell_plus),
            Def("CHAR+", core_word_char_plus),
            Def("FILL", core_word_fill),
            Def("CREATE", core_word_create),
            Def("VARIABLE", core_word_variable),
            Def("CONSTANT", core_word_constant),
            Def("VALUE", core_word_value),
            Def("TO", core_word_to),
            Def(":", core_word_colon),
            Def("IMMEDIATE", core_word_immediate),
            Def("'", core_word_tick),
            Def(">BODY", core_word_to_body),
            Def("EXECUTE", core_word_execute),
            Def("STATE", core_word_state),
            Def("ABORT", core_word_abort),
            Def("QUIT", core_word_quit),
            Def("WORD", core_word_word),
            Def("PARSE", core_word_parse),
            Def("PARSE-NAME", core_word_parse_name),
            Def("CHAR", core_word_char),
            Def("COUNT", core_word_count),
            Def(">NUMBER", core_word_to_number),
            Def(">UPPERCASE", core_word_to_uppercase),
            Def("FIND", core_word_find),
            Def("SOURCE", core_word_source),
            Def(">IN", core_word_to_in),
            Def("BL", core_word_bl),
            Def("EMIT", core_word_emit),
            Def("TYPE", core_word_type),
            Def("CR", core_word_cr),
            Def("SPACE", core_word_space),
            Def("SPACES", core_word_spaces),
            Def(".", core_word_dot),
            Def(".S", core_word_dot_s),
            Def("S\"", core_word_s_quote),
            Def(".\"", core_word_dot_quote),
        ]
        .iter()
        {
            self.def_word(i.0, i.1, 0)?;
        }
        OK
    }

    // ---- output sink

    pub fn print(&mut self, text: &str) {
        match self.output.as_mut() {
            Some(f) => f(text),
            None => print!("{}", text),
        }
    }

    pub fn intercept_output(&mut self, f: Box<dyn FnMut(&str)>) {
        self.output = Some(f);
    }

    // ---- data stack

    pub fn push(&mut self, val: Zreal) -> Zresult {
        if self.sp >= DATA_STACK_ADDR + DATA_STACK_CELLS * CELL {
            return Err(Zerr::StackOverflow);
        }
        self.image.store(self.sp, val)?;
        self.sp += CELL;
        OK
    }

    pub fn pop(&mut self) -> Zresult1<Zreal> {
        if self.sp <= DATA_STACK_ADDR {
            return Err(Zerr::StackUnderflow);
        }
        self.sp -= CELL;
        self.image.fetch(self.sp)
    }

    pub fn pick(&self, i: usize) -> Zresult1<Zreal> {
        let offs = (i + 1) * CELL;
        if self.sp < DATA_STACK_ADDR + offs {
            return Err(Zerr::StackUnderflow);
        }
        self.image.fetch(self.sp - offs)
    }

    pub fn depth(&self) -> usize {
        (self.sp - DATA_STACK_ADDR) / CELL
    }

    pub fn stack_is_empty(&self) -> bool {
        self.sp == DATA_STACK_ADDR
    }

    fn dup_data(&mut self) -> Zresult {
        let v = self.pick(0)?;
        self.push(v)
    }

    fn drop_data(&mut self) -> Zresult {
        self.pop()?;
        OK
    }

    fn swap_data(&mut self) -> Zresult {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(b)?;
        self.push(a)
    }

    fn over_data(&mut self) -> Zresult {
        let v = self.pick(1)?;
        self.push(v)
    }

    fn rot_data(&mut self) -> Zresult {
        let c = self.pop()?;
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(b)?;
        self.push(c)?;
        self.push(a)
    }

    // ---- return stack

    pub fn rpush(&mut self, val: Zreal) -> Zresult {
        if self.rp >= RETURN_STACK_ADDR + RETURN_STACK_CELLS * CELL {
            return Err(Zerr::StackOverflow);
        }
        self.image.store(self.rp, val)?;
        self.rp += CELL;
        OK
    }

    pub fn rpop(&mut self) -> Zresult1<Zreal> {
        if self.rp <= RETURN_STACK_ADDR {
            return Err(Zerr::StackUnderflow);
        }
        self.rp -= CELL;
        self.image.fetch(self.rp)
    }

    pub fn rpick(&self, i: usize) -> Zresult1<Zreal> {
        let offs = (i + 1) * CELL;
        if self.rp < RETURN_STACK_ADDR + offs {
            return Err(Zerr::StackUnderflow);
        }
        self.image.fetch(self.rp - offs)
    }

    pub fn return_is_empty(&self) -> bool {
        self.rp == RETURN_STACK_ADDR
    }

    // ---- image access

    pub fn fetch(&self, addr: usize) -> Zresult1<Zreal> {
        self.image.fetch(addr)
    }

    pub fn store(&mut self, addr: usize, val: Zreal) -> Zresult {
        self.image.store(addr, val)
    }

    pub fn cfetch(&self, addr: usize) -> Zresult1<u8> {
        self.image.cfetch(addr)
    }

    pub fn cstore(&mut self, addr: usize, b: u8) -> Zresult {
        self.image.cstore(addr, b)
    }

    pub fn bytes(&self, addr: usize, len: usize) -> Zresult1<&[u8]> {
        self.image.slice(addr, len)
    }

    pub fn copy_bytes(&mut self, src: usize, dst: usize, len: usize) -> Zresult {
        self.image.copy(src, dst, len)
    }

    pub fn fill_bytes(&mut self, addr: usize, len: usize, b: u8) -> Zresult {
        self.image.fill(addr, len, b)
    }

    // ---- dictionary space

    pub fn here(&self) -> usize {
        self.dsp
    }

    pub fn align_here(&mut self) {
        self.dsp = aligned(self.dsp);
    }

    pub fn allot(&mut self, n: Zreal) -> Zresult {
        if n.fract() != 0.0 {
            return Err(Zerr::BadAddress(n));
        }
        let new = self.dsp as i64 + n as i64;
        if new < DSP_START_ADDR as i64 || new > MEMORY_SIZE as i64 {
            return Err(Zerr::DictFull);
        }
        self.dsp = new as usize;
        OK
    }

    pub fn comma(&mut self, val: Zreal) -> Zresult {
        if self.dsp + CELL > MEMORY_SIZE {
            return Err(Zerr::DictFull);
        }
        self.image.store(self.dsp, val)?;
        self.dsp += CELL;
        OK
    }

    pub fn ccomma(&mut self, b: u8) -> Zresult {
        if self.dsp + 1 > MEMORY_SIZE {
            return Err(Zerr::DictFull);
        }
        self.image.cstore(self.dsp, b)?;
        self.dsp += 1;
        OK
    }

    // ---- dictionary

    pub fn def_word(&mut self, name: &str, f: ZfnType, flags: u8) -> Zresult {
        let rid = NATIVE_XT_ADDR + self.natives.len();
        self.natives.push(f);
        self.align_here();
        let nfa = self.dsp;
        if nfa + HEADER_SIZE > MEMORY_SIZE {
            return Err(Zerr::DictFull);
        }
        let bytes = name.as_bytes();
        let n = bytes.len().min(NAME_MAX);
        self.image.cstore(nfa, n as u8)?;
        self.image.write_bytes(nfa + 1, &bytes[..n])?;
        self.finish_header(nfa, flags, rid)?;
        OK
    }

    /// Parse a name and build a fresh header for it; the parameter field is
    /// left empty and the XT selects the variable runtime.
    pub(crate) fn create(&mut self) -> Zresult1<usize> {
        let (addr, len) = parse_name(self)?;
        if len == 0 {
            return Err(Zerr::EmptyName);
        }
        self.align_here();
        let nfa = self.dsp;
        if nfa + HEADER_SIZE > MEMORY_SIZE {
            return Err(Zerr::DictFull);
        }
        to_uppercase(self, addr, len.min(NAME_MAX), nfa)?;
        self.finish_header(nfa, 0, RID_VARIABLE)
    }

    // flags, link, XT, head update; the counted name is already in place
    fn finish_header(&mut self, nfa: usize, flags: u8, rid: usize) -> Zresult1<usize> {
        self.image.cstore(nfa + FLAGS_OFFSET, flags)?;
        let link = self.image.fetch(CURRENT_DEF_ADDR)?;
        self.image.store(nfa + LINK_OFFSET, link)?;
        self.image.store(nfa + XT_OFFSET, xt_pack(nfa + HEADER_SIZE, rid))?;
        self.image.store(CURRENT_DEF_ADDR, nfa as Zreal)?;
        self.dsp = nfa + HEADER_SIZE;
        Ok(nfa)
    }

    /// Walk the link chain comparing against the counted string at `caddr`
    /// (callers fold it to uppercase first). Hidden entries are skipped, the
    /// most recent match wins.
    pub fn find(&self, caddr: usize) -> Zresult1<(Zreal, i32)> {
        let len = self.image.cfetch(caddr)? as usize;
        let name = self.image.slice(caddr + 1, len)?;
        let mut link = self.image.fetch(CURRENT_DEF_ADDR)?;
        while link != 0.0 {
            let nfa = to_offset(link)?;
            let flags = self.image.cfetch(nfa + FLAGS_OFFSET)?;
            if flags & HIDDEN_FLAG == 0 && self.image.cfetch(nfa)? as usize == len {
                if self.image.slice(nfa + 1, len)? == name {
                    let xt = self.image.fetch(nfa + XT_OFFSET)?;
                    let order = if flags & IMMEDIATE_FLAG != 0 { 1 } else { -1 };
                    return Ok((xt, order));
                }
            }
            link = self.image.fetch(nfa + LINK_OFFSET)?;
        }
        Ok((caddr as Zreal, 0))
    }

    // ---- execution

    pub fn execute(&mut self, xt: Zreal) -> Zresult {
        let (pfa, rid) = xt_unpack(xt)?;
        let f = rid
            .checked_sub(NATIVE_XT_ADDR)
            .and_then(|i| self.natives.get(i).copied())
            .ok_or(Zerr::NotExecutable)?;
        f(self, pfa)
    }

    // ---- compiler

    pub(crate) fn compile_xt(&mut self, xt: Zreal) -> Zresult {
        self.align_here();
        self.comma(xt)?;
        // transient chain cell at HERE; the next compiled cell overwrites it
        if self.dsp + CELL <= MEMORY_SIZE {
            self.image.store(self.dsp, xt_pack(self.dsp, RID_NEXT))?;
        }
        OK
    }

    pub(crate) fn compile_literal(&mut self, val: Zreal) -> Zresult {
        self.align_here();
        let a = self.dsp;
        self.comma(xt_pack(a + CELL, RID_CELL))?;
        self.comma(val)
    }

    fn is_compiling(&self) -> Zresult1<bool> {
        Ok(self.image.fetch(STATE_ADDR)? != 0.0)
    }

    // ---- outer interpreter

    /// Run one line of source to completion. Errors are reported through
    /// the output sink and never escape to the host.
    pub fn interpret(&mut self, source: &str) {
        if let Err(e) = self.interpret_line(source) {
            let _ = self.abort();
            self.report_error(e);
        }
    }

    fn interpret_line(&mut self, source: &str) -> Zresult {
        self.load_tib(source)?;
        self.echo_input()?;
        self.interpret_tokens()
    }

    fn load_tib(&mut self, source: &str) -> Zresult {
        let bytes = source.as_bytes();
        let n = bytes.len().min(TIB_CAPACITY);
        self.image.fill(TIB_ADDR, TIB_SIZE - 1, b' ')?;
        self.image.cstore(TIB_ADDR + TIB_SIZE - 1, 0)?;
        self.image.write_bytes(TIB_ADDR, &bytes[..n])?;
        self.image.store(TIB_IN_ADDR, 0.0)?;
        // the count includes the trailing space appended after the text
        self.image.store(TIB_LEN_ADDR, (n + 1) as Zreal)
    }

    fn echo_input(&mut self) -> Zresult {
        let count = to_offset(self.image.fetch(TIB_LEN_ADDR)?)?;
        let text: String = self
            .image
            .slice(TIB_ADDR, count.min(TIB_SIZE - 1))?
            .iter()
            .map(|b| *b as char)
            .collect();
        self.print(&text);
        OK
    }

    fn interpret_tokens(&mut self) -> Zresult {
        loop {
            let (addr, len) = parse_name(self)?;
            if len == 0 {
                self.print(" ok\n");
                break OK;
            }
            to_uppercase(self, addr, len, POD_ADDR)?;
            let (xt, order) = self.find(POD_ADDR)?;
            if order != 0 {
                if !self.is_compiling()? || order == 1 {
                    self.execute(xt)?;
                } else {
                    self.compile_xt(xt)?;
                }
            } else {
                let n = self.image.cfetch(POD_ADDR)? as usize;
                let (num, rest) = to_number(self.image.slice(POD_ADDR + 1, n)?);
                if rest != 0 {
                    return Err(Zerr::UnknownWord);
                }
                if self.is_compiling()? {
                    self.compile_literal(num)?;
                } else {
                    self.push(num)?;
                }
            }
        }
    }

    fn report_error(&mut self, e: Zerr) {
        let token = self.parsed_word();
        self.print(&format!("\n{} {}\n", token, e.message()));
    }

    // latest token, kept in the parsed-word buffer for diagnostics
    fn parsed_word(&self) -> String {
        let len = self.image.cfetch(PARSE_WORD_ADDR).unwrap_or(0) as usize;
        match self.image.slice(PARSE_WORD_ADDR + 1, len) {
            Ok(b) => b.iter().map(|b| *b as char).collect(),
            Err(_) => String::new(),
        }
    }

    /// Empty the data stack, then QUIT. User definitions survive.
    pub fn abort(&mut self) -> Zresult {
        self.sp = DATA_STACK_ADDR;
        self.quit_reset()
    }

    /// Empty the return stack, clear the input buffer and enter interpret
    /// state. HERE and the dictionary head are untouched.
    pub fn quit_reset(&mut self) -> Zresult {
        self.rp = RETURN_STACK_ADDR;
        self.image.fill(TIB_ADDR, TIB_SIZE - 1, b' ')?;
        self.image.cstore(TIB_ADDR + TIB_SIZE - 1, 0)?;
        self.image.store(TIB_IN_ADDR, 0.0)?;
        self.image.store(TIB_LEN_ADDR, 0.0)?;
        self.image.store(STATE_ADDR, FALSE)
    }
}

// ---- the seven runtimes

fn variable_rts(xs: &mut State, pfa: usize) -> Zresult {
    xs.push(pfa as Zreal)
}

fn constant_rts(xs: &mut State, pfa: usize) -> Zresult {
    let val = xs.fetch(pfa)?;
    xs.push(val)
}

fn value_rts(xs: &mut State, pfa: usize) -> Zresult {
    constant_rts(xs, pfa)
}

// Colon-definition entry: the first body XT goes to the return stack as a
// marker (R@ sees it), then the body cells run in sequence until the unnest
// cell balances the marker.
fn nest_rts(xs: &mut State, pfa: usize) -> Zresult {
    let first = xs.fetch(pfa)?;
    xs.push(first)?;
    let marker = xs.pop()?;
    xs.rpush(marker)?;
    let mut ip = pfa;
    loop {
        let xt = xs.fetch(ip)?;
        let (p, rid) = xt_unpack(xt)?;
        match rid {
            RID_UNNEST => {
                xs.rpop()?;
                break OK;
            }
            RID_CELL => {
                let val = xs.fetch(p)?;
                xs.push(val)?;
                ip = p + CELL;
            }
            RID_NEXT => {
                // chain cell of an unterminated definition
                break OK;
            }
            _ => {
                xs.execute(xt)?;
                ip += CELL;
            }
        }
    }
}

fn unnest_rts(xs: &mut State, _: usize) -> Zresult {
    xs.rpop()?;
    OK
}

fn next_rts(xs: &mut State, pfa: usize) -> Zresult {
    let val = xs.fetch(pfa)?;
    xs.push(val)
}

fn cell_rts(xs: &mut State, pfa: usize) -> Zresult {
    let val = xs.fetch(pfa)?;
    xs.push(val)?;
    let next = xs.fetch(pfa + CELL)?;
    xs.execute(next)
}

// ---- stack words without a generic helper

fn core_word_question_dup(xs: &mut State, _: usize) -> Zresult {
    let v = xs.pick(0)?;
    if v != 0.0 {
        xs.push(v)?;
    }
    OK
}

fn core_word_minus_rot(xs: &mut State, _: usize) -> Zresult {
    let c = xs.pop()?;
    let b = xs.pop()?;
    let a = xs.pop()?;
    xs.push(c)?;
    xs.push(a)?;
    xs.push(b)
}

fn core_word_nip(xs: &mut State, _: usize) -> Zresult {
    let b = xs.pop()?;
    xs.pop()?;
    xs.push(b)
}

fn core_word_tuck(xs: &mut State, _: usize) -> Zresult {
    let b = xs.pop()?;
    let a = xs.pop()?;
    xs.push(b)?;
    xs.push(a)?;
    xs.push(b)
}

fn core_word_pick(xs: &mut State, _: usize) -> Zresult {
    let n = to_offset(xs.pop()?)?;
    let v = xs.pick(n)?;
    xs.push(v)
}

fn core_word_depth(xs: &mut State, _: usize) -> Zresult {
    let d = xs.depth() as Zreal;
    xs.push(d)
}

fn core_word_two_dup(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pick(1)?;
    let b = xs.pick(0)?;
    xs.push(a)?;
    xs.push(b)
}

fn core_word_two_drop(xs: &mut State, _: usize) -> Zresult {
    xs.pop()?;
    xs.pop()?;
    OK
}

fn core_word_two_swap(xs: &mut State, _: usize) -> Zresult {
    let d = xs.pop()?;
    let c = xs.pop()?;
    let b = xs.pop()?;
    let a = xs.pop()?;
    xs.push(c)?;
    xs.push(d)?;
    xs.push(a)?;
    xs.push(b)
}

fn core_word_two_over(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pick(3)?;
    let b = xs.pick(2)?;
    xs.push(a)?;
    xs.push(b)
}

fn core_word_to_r(xs: &mut State, _: usize) -> Zresult {
    let v = xs.pop()?;
    xs.rpush(v)
}

fn core_word_r_from(xs: &mut State, _: usize) -> Zresult {
    let v = xs.rpop()?;
    xs.push(v)
}

fn core_word_r_fetch(xs: &mut State, _: usize) -> Zresult {
    let v = xs.rpick(0)?;
    xs.push(v)
}

// ---- memory words

fn core_word_fetch(xs: &mut State, _: usize) -> Zresult {
    let a = cell_addr(xs.pop()?)?;
    let v = xs.fetch(a)?;
    xs.push(v)
}

fn core_word_store(xs: &mut State, _: usize) -> Zresult {
    let a = cell_addr(xs.pop()?)?;
    let v = xs.pop()?;
    xs.store(a, v)
}

fn core_word_cfetch(xs: &mut State, _: usize) -> Zresult {
    let a = char_addr(xs.pop()?)?;
    let b = xs.cfetch(a)?;
    xs.push(b as Zreal)
}

fn core_word_cstore(xs: &mut State, _: usize) -> Zresult {
    let a = char_addr(xs.pop()?)?;
    let v = xs.pop()?;
    xs.cstore(a, (v as i64 & 0xff) as u8)
}

fn core_word_plus_store(xs: &mut State, _: usize) -> Zresult {
    let a = cell_addr(xs.pop()?)?;
    let n = xs.pop()?;
    let v = xs.fetch(a)?;
    xs.store(a, v + n)
}

fn core_word_comma(xs: &mut State, _: usize) -> Zresult {
    let v = xs.pop()?;
    xs.comma(v)
}

fn core_word_ccomma(xs: &mut State, _: usize) -> Zresult {
    let v = xs.pop()?;
    xs.ccomma((v as i64 & 0xff) as u8)
}

fn core_word_allot(xs: &mut State, _: usize) -> Zresult {
    let n = xs.pop()?;
    xs.allot(n)
}

fn core_word_here(xs: &mut State, _: usize) -> Zresult {
    let h = xs.here() as Zreal;
    xs.push(h)
}

fn core_word_align(xs: &mut State, _: usize) -> Zresult {
    xs.align_here();
    OK
}

fn core_word_aligned(xs: &mut State, _: usize) -> Zresult {
    let a = to_offset(xs.pop()?)?;
    xs.push(aligned(a) as Zreal)
}

fn core_word_cells(xs: &mut State, _: usize) -> Zresult {
    let n = xs.pop()?;
    xs.push(n * CELL as Zreal)
}

fn core_word_cell_plus(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pop()?;
    xs.push(a + CELL as Zreal)
}

fn core_word_char_plus(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pop()?;
    xs.push(a + 1.0)
}

fn core_word_fill(xs: &mut State, _: usize) -> Zresult {
    let b = (xs.pop()? as i64 & 0xff) as u8;
    let len = to_offset(xs.pop()?)?;
    let a = char_addr(xs.pop()?)?;
    xs.fill_bytes(a, len, b)
}

// ---- defining words

fn core_word_create(xs: &mut State, _: usize) -> Zresult {
    xs.create()?;
    OK
}

fn core_word_variable(xs: &mut State, _: usize) -> Zresult {
    xs.create()?;
    xs.comma(0.0)
}

fn core_word_constant(xs: &mut State, _: usize) -> Zresult {
    let nfa = xs.create()?;
    xs.store(nfa + XT_OFFSET, xt_pack(nfa + HEADER_SIZE, RID_CONSTANT))?;
    let val = xs.pop()?;
    xs.comma(val)
}

fn core_word_value(xs: &mut State, _: usize) -> Zresult {
    let nfa = xs.create()?;
    xs.store(nfa + XT_OFFSET, xt_pack(nfa + HEADER_SIZE, RID_VALUE))?;
    let val = xs.pop()?;
    xs.comma(val)
}

fn core_word_to(xs: &mut State, _: usize) -> Zresult {
    let xt = tick(xs)?;
    let (pfa, _) = xt_unpack(xt)?;
    let val = xs.pop()?;
    xs.store(pfa, val)
}

fn core_word_colon(xs: &mut State, _: usize) -> Zresult {
    let nfa = xs.create()?;
    // the word under construction must not find itself
    let flags = xs.cfetch(nfa + FLAGS_OFFSET)?;
    xs.cstore(nfa + FLAGS_OFFSET, flags | HIDDEN_FLAG)?;
    xs.store(nfa + XT_OFFSET, xt_pack(nfa + HEADER_SIZE, RID_NEST))?;
    xs.store(STATE_ADDR, TRUE)
}

fn core_word_semicolon(xs: &mut State, _: usize) -> Zresult {
    let head = to_offset(xs.fetch(CURRENT_DEF_ADDR)?)?;
    if head != 0 {
        let flags = xs.cfetch(head + FLAGS_OFFSET)?;
        xs.cstore(head + FLAGS_OFFSET, flags & !HIDDEN_FLAG)?;
    }
    xs.align_here();
    let a = xs.here();
    xs.compile_xt(xt_pack(a, RID_UNNEST))?;
    xs.store(STATE_ADDR, FALSE)
}

fn core_word_immediate(xs: &mut State, _: usize) -> Zresult {
    let head = to_offset(xs.fetch(CURRENT_DEF_ADDR)?)?;
    if head != 0 {
        let flags = xs.cfetch(head + FLAGS_OFFSET)?;
        xs.cstore(head + FLAGS_OFFSET, flags | IMMEDIATE_FLAG)?;
    }
    OK
}

pub(crate) fn tick(xs: &mut State) -> Zresult1<Zreal> {
    let (addr, len) = parse_name(xs)?;
    if len == 0 {
        return Err(Zerr::EmptyName);
    }
    to_uppercase(xs, addr, len, POD_ADDR)?;
    let (xt, order) = xs.find(POD_ADDR)?;
    if order == 0 {
        return Err(Zerr::UnknownWord);
    }
    Ok(xt)
}

fn core_word_tick(xs: &mut State, _: usize) -> Zresult {
    let xt = tick(xs)?;
    xs.push(xt)
}

fn core_word_to_body(xs: &mut State, _: usize) -> Zresult {
    let xt = xs.pop()?;
    let (pfa, _) = xt_unpack(xt)?;
    xs.push(pfa as Zreal)
}

fn core_word_execute(xs: &mut State, _: usize) -> Zresult {
    let xt = xs.pop()?;
    xs.execute(xt)
}

fn core_word_state(xs: &mut State, _: usize) -> Zresult {
    xs.push(STATE_ADDR as Zreal)
}

fn core_word_abort(xs: &mut State, _: usize) -> Zresult {
    xs.abort()
}

fn core_word_quit(xs: &mut State, _: usize) -> Zresult {
    xs.quit_reset()
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
    fn test_depth_scenario() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("42 43 DEPTH");
        assert_eq!(Ok(2.0), xs.pop());
        assert_eq!(Ok(43.0), xs.pop());
        assert_eq!(Ok(42.0), xs.pop());
        assert_eq!(Err(Zerr::StackUnderflow), xs.pop());
    }

    #[test]
    fn test_create_comma_fetch() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("CREATE foo   42 ,  foo @");
        assert_eq!(Ok(42.0), xs.pop());
        assert!(xs.stack_is_empty());
    }

    #[test]
    fn test_create_pushes_here() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("CREATE foo HERE foo");
        let pfa = xs.pop().unwrap();
        let here = xs.pop().unwrap();
        assert_eq!(here, pfa);
    }

    #[test]
    fn test_variable() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("VARIABLE v   42 v !   v @");
        assert_eq!(Ok(42.0), xs.pop());
    }

    #[test]
    fn test_constant_execute() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("42 CONSTANT c   ' c EXECUTE");
        assert_eq!(Ok(42.0), xs.pop());
        xs.interpret("c c +");
        assert_eq!(Ok(84.0), xs.pop());
    }

    #[test]
    fn test_value_to() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("42 VALUE v   v");
        assert_eq!(Ok(42.0), xs.pop());
        xs.interpret("7 TO v   v");
        assert_eq!(Ok(7.0), xs.pop());
    }

    #[test]
    fn test_colon_square() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret(": sq DUP * ;   6 sq");
        assert_eq!(Ok(36.0), xs.pop());
        assert!(xs.stack_is_empty());
    }

    #[test]
    fn test_colon_literal_body() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret(": fortytwo 21 DUP + ;   fortytwo");
        assert_eq!(Ok(42.0), xs.pop());
        xs.interpret("' fortytwo EXECUTE");
        assert_eq!(Ok(42.0), xs.pop());
    }

    #[test]
    fn test_colon_with_live_stack() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("10 2 : f TUCK DUP + * + ;   f");
        assert_eq!(Ok(42.0), xs.pop());
        assert!(xs.stack_is_empty());
    }

    #[test]
    fn test_nested_colon_words() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret(": sq DUP * ;  : quad sq sq ;  3 quad");
        assert_eq!(Ok(81.0), xs.pop());
        assert!(xs.return_is_empty());
    }

    #[test]
    fn test_unknown_word_diagnostic() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("foo");
        assert!(out.borrow().contains("foo ?\n"));
        assert!(xs.stack_is_empty());
        assert!(xs.return_is_empty());
    }

    #[test]
    fn test_underflow_diagnostic() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret(".");
        assert!(out.borrow().contains(". Stack underflow"));
    }

    #[test]
    fn test_s_quote() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("S\" Hello\" SWAP DROP");
        assert_eq!(Ok(5.0), xs.pop());
    }

    #[test]
    fn test_ok_line() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("1 2 +");
        assert_eq!("1 2 +  ok\n", out.borrow().as_str());
        assert_eq!(Ok(3.0), xs.pop());
    }

    #[test]
    fn test_immediate_word() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret(": now 42 ; IMMEDIATE");
        xs.interpret(": later now ;");
        // `now` ran during compilation
        assert_eq!(Ok(42.0), xs.pop());
        assert!(xs.stack_is_empty());
        xs.interpret("later");
        assert!(xs.stack_is_empty());
    }

    #[test]
    fn test_definition_hidden_while_compiling() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret(": rec rec ;");
        assert!(out.borrow().contains("rec ?\n"));
    }

    #[test]
    fn test_redefinition_shadows() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret(": w 1 ;  : w 2 ;  w");
        assert_eq!(Ok(2.0), xs.pop());
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret(": SQ dup * ;   3 sq");
        assert_eq!(Ok(9.0), xs.pop());
    }

    #[test]
    fn test_abort_preserves_definitions() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("VARIABLE v  42 v !");
        let here = xs.here();
        xs.interpret("1 2 3 nonsense");
        assert!(xs.stack_is_empty());
        assert_eq!(here, xs.here());
        xs.interpret("v @");
        assert_eq!(Ok(42.0), xs.pop());
    }

    #[test]
    fn test_abort_word() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("1 2 3 ABORT");
        assert!(xs.stack_is_empty());
        assert!(xs.return_is_empty());
    }

    #[test]
    fn test_stack_overflow_reported() {
        let (mut xs, out) = boot_with_capture();
        let line = "1 ".repeat(DATA_STACK_CELLS + 1);
        xs.interpret(&line);
        assert!(out.borrow().contains("Stack overflow"));
        assert!(xs.stack_is_empty());
    }

    #[test]
    fn test_alignment_diagnostic() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("75 @");
        assert!(out
            .borrow()
            .contains("@ Address is not aligned. Given: 75"));
    }

    #[test]
    fn test_dict_head_guard_diagnostic() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("5 96 !");
        assert!(out.borrow().contains("! Wrong DSP_START_ADDR: 5"));
    }

    #[test]
    fn test_empty_name_diagnostic() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("CREATE");
        assert!(out.borrow().contains("Empty name"));
    }

    #[test]
    fn test_not_executable() {
        let (mut xs, out) = boot_with_capture();
        xs.interpret("5 EXECUTE");
        assert!(out.borrow().contains("EXECUTE Not an executable"));
    }

    #[test]
    fn test_here_tracks_allot_and_commas() {
        let (mut xs, _) = boot_with_capture();
        let h0 = xs.here();
        xs.interpret("1 , 2 ,");
        assert_eq!(h0 + 2 * CELL, xs.here());
        xs.interpret("65 C,");
        assert_eq!(h0 + 2 * CELL + 1, xs.here());
        xs.interpret("7 ALLOT");
        assert_eq!(h0 + 2 * CELL + 8, xs.here());
        xs.interpret("ALIGN");
        assert_eq!(h0 + 3 * CELL, xs.here());
    }

    #[test]
    fn test_to_body_of_constant() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("42 CONSTANT c  ' c >BODY @");
        assert_eq!(Ok(42.0), xs.pop());
    }

    #[test]
    fn test_return_stack_words() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("5 >R 6 R@ R>");
        assert_eq!(Ok(5.0), xs.pop());
        assert_eq!(Ok(5.0), xs.pop());
        assert_eq!(Ok(6.0), xs.pop());
        assert!(xs.return_is_empty());
    }

    #[test]
    fn test_nest_marker_visible_to_r_fetch() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret(": m R@ ;  m  ' R@");
        let tick_xt = xs.pop().unwrap();
        let marker = xs.pop().unwrap();
        // the marker is the first compiled XT of the body
        assert_eq!(tick_xt, marker);
    }

    #[test]
    fn test_state_variable() {
        let (mut xs, _) = boot_with_capture();
        xs.interpret("STATE @");
        assert_eq!(Ok(0.0), xs.pop());
        // a definition left open keeps compile state across lines
        xs.interpret(": half 2");
        assert_eq!(Ok(TRUE), xs.fetch(STATE_ADDR));
        xs.interpret("/ ;  9 half");
        assert_eq!(Ok(4.0), xs.pop());
        assert_eq!(Ok(FALSE), xs.fetch(STATE_ADDR));
    }

    #[test]
    fn test_input_truncated() {
        let (mut xs, _) = boot_with_capture();
        let long = format!("( {} )", "x".repeat(300));
        xs.interpret(&long);
        assert_eq!(Ok((TIB_CAPACITY + 1) as Zreal), xs.fetch(TIB_LEN_ADDR));
    }

    #[test]
    fn test_runtime_registration() {
        let xs = State::boot().unwrap();
        assert!(xs.natives.len() > 90);
        // the first seven entries are the hidden nameless runtimes
        let mut link = xs.fetch(CURRENT_DEF_ADDR).unwrap();
        let mut nfa = 0;
        while link != 0.0 {
            nfa = link as usize;
            link = xs.fetch(nfa + LINK_OFFSET).unwrap();
        }
        // deepest entry: the variable runtime
        assert_eq!(0, xs.cfetch(nfa).unwrap());
        assert_eq!(HIDDEN_FLAG, xs.cfetch(nfa + FLAGS_OFFSET).unwrap());
        let (pfa, rid) = xt_unpack(xs.fetch(nfa + XT_OFFSET).unwrap()).unwrap();
        assert_eq!(RID_VARIABLE, rid);
        assert_eq!(nfa + HEADER_SIZE, pfa);
    }

    #[test]
    fn test_multiple_instances_are_independent() {
        let (mut a, _) = boot_with_capture();
        let (mut b, _) = boot_with_capture();
        a.interpret("1 CONSTANT one");
        b.interpret("one");
        assert_eq!(Err(Zerr::StackUnderflow), b.pop());
        a.interpret("one");
        assert_eq!(Ok(1.0), a.pop());
    }
}
