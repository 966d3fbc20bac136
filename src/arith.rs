use crate::cell::*;
use crate::error::*;
use crate::state::State;

// (a b -- c)
fn binary_op(xs: &mut State, op: fn(Zreal, Zreal) -> Zreal) -> Zresult {
    let b = xs.pop()?;
    let a = xs.pop()?;
    xs.push(op(a, b))
}

// (a b -- flag)
fn compare_op(xs: &mut State, op: fn(Zreal, Zreal) -> bool) -> Zresult {
    let b = xs.pop()?;
    let a = xs.pop()?;
    xs.push(flag(op(a, b)))
}

// (a -- flag)
fn test_op(xs: &mut State, op: fn(Zreal) -> bool) -> Zresult {
    let a = xs.pop()?;
    xs.push(flag(op(a)))
}

// bitwise words act on the cell's integer value
fn bits(x: Zreal) -> i64 {
    x as i64
}

// Forth-83 division floors toward negative infinity.
fn floored_div(a: Zreal, b: Zreal) -> Zreal {
    (a / b).floor()
}

fn floored_rem(a: Zreal, b: Zreal) -> Zreal {
    a - b * (a / b).floor()
}

pub fn core_word_add(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, |a, b| a + b)
}

pub fn core_word_sub(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, |a, b| a - b)
}

pub fn core_word_mul(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, |a, b| a * b)
}

pub fn core_word_div(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, floored_div)
}

pub fn core_word_mod(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, floored_rem)
}

// (a b -- rem quot)
pub fn core_word_div_mod(xs: &mut State, _: usize) -> Zresult {
    let b = xs.pop()?;
    let a = xs.pop()?;
    xs.push(floored_rem(a, b))?;
    xs.push(floored_div(a, b))
}

pub fn core_word_negate(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pop()?;
    xs.push(-a)
}

pub fn core_word_abs(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pop()?;
    xs.push(a.abs())
}

pub fn core_word_min(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, Zreal::min)
}

pub fn core_word_max(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, Zreal::max)
}

pub fn core_word_one_plus(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pop()?;
    xs.push(a + 1.0)
}

pub fn core_word_one_minus(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pop()?;
    xs.push(a - 1.0)
}

pub fn core_word_two_star(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pop()?;
    xs.push(a * 2.0)
}

pub fn core_word_two_slash(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pop()?;
    xs.push(floored_div(a, 2.0))
}

pub fn core_word_eq(xs: &mut State, _: usize) -> Zresult {
    compare_op(xs, |a, b| a == b)
}

pub fn core_word_ne(xs: &mut State, _: usize) -> Zresult {
    compare_op(xs, |a, b| a != b)
}

pub fn core_word_less(xs: &mut State, _: usize) -> Zresult {
    compare_op(xs, |a, b| a < b)
}

pub fn core_word_greater(xs: &mut State, _: usize) -> Zresult {
    compare_op(xs, |a, b| a > b)
}

pub fn core_word_less_eq(xs: &mut State, _: usize) -> Zresult {
    compare_op(xs, |a, b| a <= b)
}

pub fn core_word_greater_eq(xs: &mut State, _: usize) -> Zresult {
    compare_op(xs, |a, b| a >= b)
}

pub fn core_word_zero_eq(xs: &mut State, _: usize) -> Zresult {
    test_op(xs, |a| a == 0.0)
}

pub fn core_word_zero_less(xs: &mut State, _: usize) -> Zresult {
    test_op(xs, |a| a < 0.0)
}

pub fn core_word_zero_greater(xs: &mut State, _: usize) -> Zresult {
    test_op(xs, |a| a > 0.0)
}

pub fn core_word_and(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, |a, b| (bits(a) & bits(b)) as Zreal)
}

pub fn core_word_or(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, |a, b| (bits(a) | bits(b)) as Zreal)
}

pub fn core_word_xor(xs: &mut State, _: usize) -> Zresult {
    binary_op(xs, |a, b| (bits(a) ^ bits(b)) as Zreal)
}

pub fn core_word_invert(xs: &mut State, _: usize) -> Zresult {
    let a = xs.pop()?;
    xs.push(!bits(a) as Zreal)
}

pub fn core_word_true(xs: &mut State, _: usize) -> Zresult {
    xs.push(TRUE)
}

pub fn core_word_false(xs: &mut State, _: usize) -> Zresult {
    xs.push(FALSE)
}
