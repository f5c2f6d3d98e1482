use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::air::Air;
use crate::mem::Memory;
use crate::sim::Snapshot;
use crate::state::{Flags, Registers};
use crate::symbol::Register;

#[macro_export]
macro_rules! dprint {
    ( $cond:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        let s = format!(
            $fmt
            $($tt)*
        );
        $crate::output::Output::Debugger($cond).print_str(&s);
    }};
    // Trigger type error if missing condition
    ( $fmt:literal $($tt:tt)* ) => {{
        $crate::output::Output::Debugger($fmt);
    }};
}

#[macro_export]
macro_rules! dprintln {
    ( $cond:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        $crate::output::Output::Debugger($cond).print_str("\n");
    }};
    ( $cond:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Debugger($cond).print_str(&s);
    }};
    // Trigger type error if missing condition
    ( $fmt:literal $($tt:tt)* ) => {{
        $crate::output::Output::Debugger($fmt);
    }};
}

/// Registers in display order.
const REGISTERS: [Register; 10] = [
    Register::A,
    Register::B,
    Register::D,
    Register::DP,
    Register::X,
    Register::Y,
    Register::U,
    Register::S,
    Register::PC,
    Register::CC,
];

/// Bytes per row of a memory dump.
const ROW_LEN: usize = 8;

#[derive(Clone, Copy, Debug)]
pub enum Output {
    /// Program results, to stdout
    Normal,
    /// Debugger chatter, to stderr
    Debugger(Condition),
}

/// Whether debugger output survives `--minimal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    Sometimes,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_LINE_START: RefCell<bool> = const { RefCell::new(true) };
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_line_start(new_value: bool) -> bool {
        Self::IS_LINE_START.with(|value| value.replace(new_value))
    }
    /// Private. Use [`Output::start_new_line`].
    fn is_line_start() -> bool {
        Self::IS_LINE_START.with(|value| *value.borrow())
    }
    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    fn set_line_start_from_str(string: &str) {
        let last = Decolored::new(string).last();
        if let Some(ch) = last {
            Output::set_line_start(ch == '\n');
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                if Self::is_minimal() {
                    print_colorless(string);
                } else {
                    print!("{}", string);
                }
                Self::set_line_start_from_str(string);
            }

            Self::Debugger(condition) => match (Self::is_minimal(), *condition) {
                (false, _) => {
                    eprint!("{}", ColoredString::from(string).blue());
                    Self::set_line_start_from_str(string);
                }
                // Always remove color if `--minimal`
                (true, Condition::Always) => {
                    eprint_colorless(string);
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Sometimes) => (),
            },
        }
    }

    pub fn start_new_line(&self) {
        if !Self::is_line_start() {
            self.print_str("\n");
        }
    }

    /// Registers, flags and the memory cells the last instruction wrote.
    pub fn print_snapshot(&self, snapshot: &Snapshot) {
        self.print_registers(&snapshot.registers, &snapshot.flags);
        if !snapshot.writes.is_empty() {
            let writes = snapshot
                .writes
                .iter()
                .map(|(addr, value)| format!("{addr:04X}={value:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            self.print_str(&format!("Wrote {writes}\n"));
        }
    }

    pub fn print_registers(&self, regs: &Registers, flags: &Flags) {
        if Self::is_minimal() {
            for reg in REGISTERS {
                let value = regs.get(reg, flags);
                self.print_str(&format!("{} {:0width$X}\n", reg, value, width = reg.digits()));
            }
            self.print_flags(flags);
            return;
        }

        self.print_str("\x1b[2m┌──────────────────────────────┐\x1b[0m\n");
        self.print_str("\x1b[2m│        \x1b[3mhex    uint     int\x1b[0m\x1b[2m │\x1b[0m\n");
        for reg in REGISTERS {
            let value = regs.get(reg, flags);
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(&format!(" \x1b[1m{:<2}\x1b[0m  ", reg));
            self.print_integer(value, reg.is_wide());
            self.print_str(" \x1b[2m│\x1b[0m\n");
        }
        self.print_str("\x1b[2m│\x1b[0m");
        self.print_str(" \x1b[1mFlags\x1b[0m ");
        for (name, set) in flag_bits(flags) {
            let bit = if set { "1".bold() } else { "0".dimmed() };
            self.print_str(&format!(" {name}:{bit}"));
        }
        self.print_str("  \x1b[2m│\x1b[0m\n");
        self.print_str("\x1b[2m└──────────────────────────────┘\x1b[0m\n");
    }

    fn print_flags(&self, flags: &Flags) {
        let flags = flag_bits(flags)
            .iter()
            .map(|(name, set)| format!("{} {}", name, *set as u8))
            .collect::<Vec<_>>()
            .join(" ");
        self.print_str(&format!("{flags}\n"));
    }

    fn print_integer(&self, value: u16, wide: bool) {
        if wide {
            self.print_str(&format!("{:04X}  {:>6}  {:>6}", value, value, value as i16));
        } else {
            let byte = value as u8;
            self.print_str(&format!("  {:02X}  {:>6}  {:>6}", byte, byte, byte as i8));
        }
    }

    /// Dump `count` bytes starting at `base`, one row per `ROW_LEN` bytes.
    pub fn print_memory(&self, mem: &Memory, base: u16, count: usize) {
        let cells: Vec<_> = mem.range(base, count).collect();
        for row in cells.chunks(ROW_LEN) {
            let Some(&(addr, _)) = row.first() else {
                continue;
            };
            let bytes = row
                .iter()
                .map(|(_, value)| {
                    let text = format!("{value:02X}");
                    if *value == 0 && !Self::is_minimal() {
                        text.dimmed().to_string()
                    } else {
                        text
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            self.print_str(&format!("{addr:04X}  {bytes}\n"));
        }
    }

    /// Listing of the assembled program, marking the instruction at `pc`.
    pub fn print_program(&self, air: &Air, pc: u16) {
        for asm in air {
            let marker = if asm.address == pc { ">" } else { " " };
            let bytes = asm
                .bytes
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            let line = format!(
                "{marker} {:04X}  {:<12} {:>4}  {}\n",
                asm.address,
                bytes,
                asm.line + 1,
                asm.instr
            );
            if asm.address == pc && !Self::is_minimal() {
                self.print_str(&line.bold().to_string());
            } else {
                self.print_str(&line);
            }
        }
    }
}

fn flag_bits(flags: &Flags) -> [(&'static str, bool); 5] {
    [
        ("H", flags.h),
        ("N", flags.n),
        ("Z", flags.z),
        ("V", flags.v),
        ("C", flags.c),
    ]
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn eprint_colorless(string: &str) {
    eprint!("{}", Decolored::new(string).collect::<String>());
}

fn print_colorless(string: &str) {
    print!("{}", Decolored::new(string).collect::<String>());
}
