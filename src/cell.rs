use crate::error::{Zerr, Zresult, Zresult1};
use crate::state::State;
use num_traits::ToPrimitive;

/// The universal cell: every stack slot and every aligned image cell is a
/// 64-bit float. Integers stay exact below 2^53, which covers all image
/// addresses and execution tokens.
pub type Zreal = f64;

/// A native word body. The argument is the parameter-field address the
/// execution token was packed with; plain words ignore it.
pub type ZfnType = fn(&mut State, usize) -> Zresult;

pub const TRUE: Zreal = -1.0;
pub const FALSE: Zreal = 0.0;

pub fn flag(t: bool) -> Zreal {
    if t {
        TRUE
    } else {
        FALSE
    }
}

// An execution token packs (parameter-field address, runtime id) into one
// numeric cell. The multiplier keeps the runtime-id range clear of the
// packed address for any address inside the image.
const XT_SHIFT: Zreal = 100_000.0;
const RID_MOD: Zreal = 10_000.0;

pub fn xt_pack(pfa: usize, rid: usize) -> Zreal {
    pfa as Zreal * XT_SHIFT + rid as Zreal
}

pub fn xt_unpack(xt: Zreal) -> Zresult1<(usize, usize)> {
    if !xt.is_finite() || xt.fract() != 0.0 || xt < 0.0 {
        return Err(Zerr::NotExecutable);
    }
    let pfa = (xt / XT_SHIFT).floor();
    let rid = xt % RID_MOD;
    Ok((pfa as usize, rid as usize))
}

/// Cell to image offset. Any finite non-negative integral cell qualifies;
/// bounds are checked at the access site.
pub fn to_offset(x: Zreal) -> Zresult1<usize> {
    if x.fract() != 0.0 {
        return Err(Zerr::BadAddress(x));
    }
    x.to_usize().ok_or(Zerr::BadAddress(x))
}

// 2^53, the largest width where every integer is representable.
const EXACT_INT_LIMIT: Zreal = 9_007_199_254_740_992.0;

/// Decimal text for a cell: integral values print as integers.
pub fn fmt_cell(x: Zreal) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < EXACT_INT_LIMIT {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}
