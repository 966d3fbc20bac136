use crate::cell::Zreal;
use crate::error::{Zerr, Zresult, Zresult1, OK};

pub const CELL: usize = 8;
pub const MEMORY_SIZE: usize = 64_000;

// Fixed image layout, byte offsets.
pub const STATE_ADDR: usize = 72;
pub const TIB_IN_ADDR: usize = 80;
pub const TIB_LEN_ADDR: usize = 88;
pub const CURRENT_DEF_ADDR: usize = 96;
pub const TIB_ADDR: usize = 120;
pub const TIB_SIZE: usize = 256;
// last two buffer bytes are reserved: trailing space, final zero
pub const TIB_CAPACITY: usize = 254;
pub const DATA_STACK_ADDR: usize = 376;
pub const DATA_STACK_CELLS: usize = 32;
pub const RETURN_STACK_ADDR: usize = 632;
pub const RETURN_STACK_CELLS: usize = 1024;
pub const POD_ADDR: usize = 8_824;
pub const POD_SIZE: usize = 90 * CELL;
pub const PARSE_WORD_ADDR: usize = 9_544;
pub const PARSE_WORD_SIZE: usize = 32;
pub const NATIVE_XT_ADDR: usize = 9_800;
pub const DSP_START_ADDR: usize = 10_000;

// Definition header: count byte, 30 name chars, flags, link cell, XT cell.
pub const HEADER_SIZE: usize = 48;
pub const NAME_MAX: usize = 30;
pub const FLAGS_OFFSET: usize = 31;
pub const LINK_OFFSET: usize = 32;
pub const XT_OFFSET: usize = 40;
pub const IMMEDIATE_FLAG: u8 = 1;
pub const HIDDEN_FLAG: u8 = 2;

pub fn aligned(addr: usize) -> usize {
    (addr + CELL - 1) & !(CELL - 1)
}

/// Cell address from a raw cell value: integral, 8-aligned, inside the image.
pub fn cell_addr(x: Zreal) -> Zresult1<usize> {
    if x.fract() != 0.0 {
        return Err(Zerr::NotAligned(x));
    }
    let a = crate::cell::to_offset(x)?;
    if a % CELL != 0 {
        return Err(Zerr::NotAligned(x));
    }
    if a + CELL > MEMORY_SIZE {
        return Err(Zerr::BadAddress(x));
    }
    Ok(a)
}

/// Character address from a raw cell value: any byte offset inside the image.
pub fn char_addr(x: Zreal) -> Zresult1<usize> {
    let a = crate::cell::to_offset(x)?;
    if a >= MEMORY_SIZE {
        return Err(Zerr::BadAddress(x));
    }
    Ok(a)
}

pub struct Image {
    bytes: Box<[u8]>,
}

impl Image {
    pub fn new() -> Image {
        Image {
            bytes: vec![0u8; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    pub fn fetch(&self, addr: usize) -> Zresult1<Zreal> {
        self.check_cell(addr)?;
        let mut b = [0u8; CELL];
        b.copy_from_slice(&self.bytes[addr..addr + CELL]);
        Ok(Zreal::from_le_bytes(b))
    }

    pub fn store(&mut self, addr: usize, val: Zreal) -> Zresult {
        self.check_cell(addr)?;
        if addr == CURRENT_DEF_ADDR && val != 0.0 {
            let sane = val.fract() == 0.0
                && val >= DSP_START_ADDR as Zreal
                && val <= MEMORY_SIZE as Zreal;
            if !sane {
                return Err(Zerr::DictHeadCorrupt(val));
            }
        }
        self.bytes[addr..addr + CELL].copy_from_slice(&val.to_le_bytes());
        OK
    }

    pub fn cfetch(&self, addr: usize) -> Zresult1<u8> {
        if addr >= MEMORY_SIZE {
            return Err(Zerr::BadAddress(addr as Zreal));
        }
        Ok(self.bytes[addr])
    }

    pub fn cstore(&mut self, addr: usize, b: u8) -> Zresult {
        if addr >= MEMORY_SIZE {
            return Err(Zerr::BadAddress(addr as Zreal));
        }
        self.bytes[addr] = b;
        OK
    }

    pub fn slice(&self, addr: usize, len: usize) -> Zresult1<&[u8]> {
        self.check_range(addr, len)?;
        Ok(&self.bytes[addr..addr + len])
    }

    pub fn write_bytes(&mut self, addr: usize, src: &[u8]) -> Zresult {
        self.check_range(addr, src.len())?;
        self.bytes[addr..addr + src.len()].copy_from_slice(src);
        OK
    }

    pub fn copy(&mut self, src: usize, dst: usize, len: usize) -> Zresult {
        self.check_range(src, len)?;
        self.check_range(dst, len)?;
        self.bytes.copy_within(src..src + len, dst);
        OK
    }

    pub fn fill(&mut self, addr: usize, len: usize, b: u8) -> Zresult {
        self.check_range(addr, len)?;
        for x in self.bytes[addr..addr + len].iter_mut() {
            *x = b;
        }
        OK
    }

    fn check_cell(&self, addr: usize) -> Zresult {
        if addr % CELL != 0 {
            return Err(Zerr::NotAligned(addr as Zreal));
        }
        if addr + CELL > MEMORY_SIZE {
            return Err(Zerr::BadAddress(addr as Zreal));
        }
        OK
    }

    fn check_range(&self, addr: usize, len: usize) -> Zresult {
        if addr + len > MEMORY_SIZE {
            return Err(Zerr::BadAddress(addr as Zreal));
        }
        OK
    }
}
