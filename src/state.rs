use crate::symbol::Register;

/// Address at which assembled code is placed and execution starts.
pub const PROGRAM_BASE: u16 = 0xFE00;

// Bit positions inside the packed condition code register.
const CC_H: u8 = 0b0010_0000;
const CC_N: u8 = 0b0000_1000;
const CC_Z: u8 = 0b0000_0100;
const CC_V: u8 = 0b0000_0010;
const CC_C: u8 = 0b0000_0001;

/// Register file. Values are stored at their architectural width.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    pub dp: u8,
    pub x: u16,
    pub y: u16,
    pub u: u16,
    pub s: u16,
    pub pc: u16,
}

/// Condition flags modelled by the simulator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Flags {
    /// Negative
    pub n: bool,
    /// Zero
    pub z: bool,
    /// Overflow
    pub v: bool,
    /// Carry (borrow for subtraction)
    pub c: bool,
    /// Half-carry
    pub h: bool,
}

impl Default for Registers {
    fn default() -> Self {
        Registers {
            a: 0,
            b: 0,
            dp: 0,
            x: 0,
            y: 0,
            u: 0,
            s: 0,
            pc: PROGRAM_BASE,
        }
    }
}

impl Registers {
    /// Read any register, zero-extended to 16 bits. `CC` is not stored here, see [`Flags::pack`].
    pub fn get(&self, reg: Register, flags: &Flags) -> u16 {
        match reg {
            Register::A => self.a as u16,
            Register::B => self.b as u16,
            Register::D => self.d(),
            Register::DP => self.dp as u16,
            Register::CC => flags.pack() as u16,
            Register::X => self.x,
            Register::Y => self.y,
            Register::U => self.u,
            Register::S => self.s,
            Register::PC => self.pc,
        }
    }

    /// Write a register, truncating to its width. Writing `CC` unpacks into `flags`.
    pub fn set(&mut self, reg: Register, value: u16, flags: &mut Flags) {
        match reg {
            Register::A => self.a = value as u8,
            Register::B => self.b = value as u8,
            Register::D => self.set_d(value),
            Register::DP => self.dp = value as u8,
            Register::CC => *flags = Flags::unpack(value as u8),
            Register::X => self.x = value,
            Register::Y => self.y = value,
            Register::U => self.u = value,
            Register::S => self.s = value,
            Register::PC => self.pc = value,
        }
    }

    pub fn d(&self) -> u16 {
        u16::from_be_bytes([self.a, self.b])
    }

    pub fn set_d(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.a = hi;
        self.b = lo;
    }
}

impl Default for Flags {
    fn default() -> Self {
        // Power-on state shows Z set
        Flags {
            n: false,
            z: true,
            v: false,
            c: false,
            h: false,
        }
    }
}

impl Flags {
    /// Set Z and N from an 8-bit result.
    pub fn set_nz8(&mut self, value: u8) {
        self.z = value == 0;
        self.n = value & 0x80 != 0;
    }

    /// Set Z and N from a 16-bit result.
    pub fn set_nz16(&mut self, value: u16) {
        self.z = value == 0;
        self.n = value & 0x8000 != 0;
    }

    /// Pack into the `E F H I N Z V C` layout. Unmodelled bits read as zero.
    pub fn pack(&self) -> u8 {
        let mut cc = 0;
        for (set, bit) in [
            (self.h, CC_H),
            (self.n, CC_N),
            (self.z, CC_Z),
            (self.v, CC_V),
            (self.c, CC_C),
        ] {
            if set {
                cc |= bit;
            }
        }
        cc
    }

    pub fn unpack(cc: u8) -> Self {
        Flags {
            h: cc & CC_H != 0,
            n: cc & CC_N != 0,
            z: cc & CC_Z != 0,
            v: cc & CC_V != 0,
            c: cc & CC_C != 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn power_on_defaults() {
        let regs = Registers::default();
        let flags = Flags::default();
        assert_eq!(regs.pc, 0xFE00);
        assert_eq!((regs.a, regs.b, regs.x, regs.dp), (0, 0, 0, 0));
        assert!(flags.z);
        assert!(!flags.n && !flags.v && !flags.c && !flags.h);
    }

    #[test]
    fn width_aware_access() {
        let mut regs = Registers::default();
        let mut flags = Flags::default();
        regs.set(Register::A, 0x1234, &mut flags);
        assert_eq!(regs.a, 0x34);
        regs.set(Register::D, 0xBEEF, &mut flags);
        assert_eq!((regs.a, regs.b), (0xBE, 0xEF));
        assert_eq!(regs.get(Register::D, &flags), 0xBEEF);
        regs.set(Register::X, 0xFFFF, &mut flags);
        assert_eq!(regs.get(Register::X, &flags), 0xFFFF);
    }

    #[test]
    fn condition_codes_pack() {
        let flags = Flags {
            n: true,
            z: false,
            v: true,
            c: true,
            h: false,
        };
        assert_eq!(flags.pack(), 0b0000_1011);
        assert_eq!(Flags::unpack(flags.pack()), flags);
        assert_eq!(Flags::default().pack(), 0b0000_0100);
    }
}
