//! 8-bit ALU operations.
//!
//! Every function takes the flags before the operation and returns the flags after it, leaving
//! untouched those the operation does not define.

use crate::state::Flags;

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: Flags,
}

impl AluResult {
    fn with_nz(value: u8, mut flags: Flags) -> Self {
        flags.set_nz8(value);
        AluResult { value, flags }
    }
}

/// Add, setting H N Z V C.
#[must_use]
pub fn add8(a: u8, b: u8, mut flags: Flags) -> AluResult {
    let wide = a as u16 + b as u16;
    let result = wide as u8;
    flags.h = (a & 0x0F) + (b & 0x0F) > 0x0F;
    flags.c = wide > 0xFF;
    flags.v = (a ^ result) & (b ^ result) & 0x80 != 0;
    AluResult::with_nz(result, flags)
}

/// Subtract, setting N Z V C. C is set on borrow.
#[must_use]
pub fn sub8(a: u8, b: u8, mut flags: Flags) -> AluResult {
    let result = a.wrapping_sub(b);
    flags.c = a < b;
    flags.v = (a ^ b) & (a ^ result) & 0x80 != 0;
    AluResult::with_nz(result, flags)
}

#[must_use]
pub fn and8(a: u8, b: u8, flags: Flags) -> AluResult {
    logic(a & b, flags)
}

#[must_use]
pub fn or8(a: u8, b: u8, flags: Flags) -> AluResult {
    logic(a | b, flags)
}

#[must_use]
pub fn eor8(a: u8, b: u8, flags: Flags) -> AluResult {
    logic(a ^ b, flags)
}

fn logic(result: u8, mut flags: Flags) -> AluResult {
    flags.v = false;
    AluResult::with_nz(result, flags)
}

/// V is set only when crossing from 0x7F to 0x80.
#[must_use]
pub fn inc8(a: u8, mut flags: Flags) -> AluResult {
    flags.v = a == 0x7F;
    AluResult::with_nz(a.wrapping_add(1), flags)
}

/// V is set only when crossing from 0x80 to 0x7F.
#[must_use]
pub fn dec8(a: u8, mut flags: Flags) -> AluResult {
    flags.v = a == 0x80;
    AluResult::with_nz(a.wrapping_sub(1), flags)
}

// Shifts and rotates put the bit shifted off into C and leave V alone.

#[must_use]
pub fn lsl8(a: u8, mut flags: Flags) -> AluResult {
    flags.c = a & 0x80 != 0;
    AluResult::with_nz(a << 1, flags)
}

/// Logical shift right. N is always cleared.
#[must_use]
pub fn lsr8(a: u8, mut flags: Flags) -> AluResult {
    flags.c = a & 0x01 != 0;
    AluResult::with_nz(a >> 1, flags)
}

#[must_use]
pub fn rol8(a: u8, mut flags: Flags) -> AluResult {
    let carry_in = flags.c as u8;
    flags.c = a & 0x80 != 0;
    AluResult::with_nz((a << 1) | carry_in, flags)
}

#[must_use]
pub fn ror8(a: u8, mut flags: Flags) -> AluResult {
    let carry_in = (flags.c as u8) << 7;
    flags.c = a & 0x01 != 0;
    AluResult::with_nz((a >> 1) | carry_in, flags)
}

#[must_use]
pub fn clr8(mut flags: Flags) -> AluResult {
    flags.v = false;
    flags.c = false;
    AluResult::with_nz(0, flags)
}

/// One's complement. C is always set, V always cleared.
#[must_use]
pub fn com8(a: u8, mut flags: Flags) -> AluResult {
    flags.v = false;
    flags.c = true;
    AluResult::with_nz(!a, flags)
}

/// Two's complement. C is set for any non-zero result, V only for 0x80.
#[must_use]
pub fn neg8(a: u8, mut flags: Flags) -> AluResult {
    let result = a.wrapping_neg();
    flags.c = result != 0;
    flags.v = a == 0x80;
    AluResult::with_nz(result, flags)
}

#[cfg(test)]
mod test {
    use super::*;

    fn flags() -> Flags {
        Flags::default()
    }

    #[test]
    fn add_carries_out() {
        let res = add8(0x01, 0xFF, flags());
        assert_eq!(res.value, 0x00);
        assert!(res.flags.c && res.flags.z && res.flags.h);
        assert!(!res.flags.n && !res.flags.v);
    }

    #[test]
    fn add_signed_overflow() {
        let res = add8(0x7F, 0x01, flags());
        assert_eq!(res.value, 0x80);
        assert!(res.flags.v && res.flags.n && res.flags.h);
        assert!(!res.flags.c && !res.flags.z);
    }

    #[test]
    fn sub_borrows() {
        let res = sub8(0x00, 0x01, flags());
        assert_eq!(res.value, 0xFF);
        assert!(res.flags.c && res.flags.n);
        assert!(!res.flags.z && !res.flags.v);

        let res = sub8(0x80, 0x01, flags());
        assert_eq!(res.value, 0x7F);
        assert!(res.flags.v && !res.flags.c);
    }

    #[test]
    fn logic_clears_overflow() {
        let mut before = flags();
        before.v = true;
        before.c = true;
        let res = and8(0xF0, 0x0F, before);
        assert_eq!(res.value, 0);
        assert!(res.flags.z && !res.flags.v);
        // Carry is not defined by logic operations
        assert!(res.flags.c);
        assert_eq!(or8(0x80, 0x01, flags()).value, 0x81);
        assert!(eor8(0xFF, 0x0F, flags()).flags.n);
    }

    #[test]
    fn inc_dec_boundaries() {
        assert!(inc8(0x7F, flags()).flags.v);
        assert!(!inc8(0x80, flags()).flags.v);
        assert!(dec8(0x80, flags()).flags.v);
        assert!(inc8(0xFF, flags()).flags.z);
        let mut before = flags();
        before.c = true;
        assert!(dec8(0x00, before).flags.c);
    }

    #[test]
    fn shifts_and_rotates() {
        let res = lsl8(0x81, flags());
        assert_eq!((res.value, res.flags.c), (0x02, true));
        let res = lsr8(0x81, flags());
        assert_eq!((res.value, res.flags.c, res.flags.n), (0x40, true, false));

        let mut carry = flags();
        carry.c = true;
        let res = rol8(0x80, carry);
        assert_eq!((res.value, res.flags.c), (0x01, true));
        let res = ror8(0x02, carry);
        assert_eq!((res.value, res.flags.c), (0x81, false));
        assert!(res.flags.n);
    }

    #[test]
    fn unary() {
        let res = clr8(flags());
        assert_eq!(res.value, 0);
        assert!(res.flags.z && !res.flags.c);

        let res = com8(0x0F, flags());
        assert_eq!(res.value, 0xF0);
        assert!(res.flags.c && res.flags.n && !res.flags.v);

        let res = neg8(0x01, flags());
        assert_eq!(res.value, 0xFF);
        assert!(res.flags.c && res.flags.n);
        let res = neg8(0x00, flags());
        assert!(res.flags.z && !res.flags.c);
        assert!(neg8(0x80, flags()).flags.v);
    }
}
