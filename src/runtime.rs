use crate::air::{Air, AsmLine};
use crate::alu::{self, AluResult};
use crate::error::{ErrorKind, Result, SimError};
use crate::instr::{Instruction, Operand};
use crate::lexer;
use crate::mem::Memory;
use crate::parser;
use crate::state::{Flags, Registers};
use crate::symbol::{Acc, Cond, Op, Register};
use crate::{dprintln, env};

/// Why execution stopped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Halt {
    /// Reached `END`
    End,
    /// Reached `SWI`
    Interrupt,
    /// `RTS` with nothing on the call stack
    Return,
    /// Ran off the end of the program
    Exhausted,
    /// An instruction failed
    Fault,
}

/// Where control goes after an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Flow {
    Next,
    Jump(u16),
    Halt(Halt),
}

/// Represents complete program state during runtime.
#[derive(Clone, Debug)]
pub struct RunState {
    regs: Registers,
    flags: Flags,
    /// Operands and stores go here
    data: Memory,
    /// Holds the assembled image, never written at run time
    program: Memory,
    /// Return addresses pushed by `BSR`/`JSR`
    call_stack: Vec<u16>,
    air: Air,
    halted: Option<Halt>,
    /// Data store cells written by the last instruction
    writes: Vec<(u16, u8)>,
    /// Instructions executed since the last reset
    steps: u64,
}

impl RunState {
    pub fn new(air: Air) -> Self {
        let mut program = Memory::new();
        air.emit(&mut program);
        let mut regs = Registers::default();
        regs.pc = air.orig();
        RunState {
            regs,
            flags: Flags::default(),
            data: Memory::new(),
            program,
            call_stack: Vec::new(),
            air,
            halted: None,
            writes: Vec::new(),
            steps: 0,
        }
    }

    /// Return to power-on state, keeping the assembled program.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.regs.pc = self.air.orig();
        self.flags = Flags::default();
        self.data.clear();
        self.call_stack.clear();
        self.halted = None;
        self.writes.clear();
        self.steps = 0;
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn data(&self) -> &Memory {
        &self.data
    }

    pub fn program(&self) -> &Memory {
        &self.program
    }

    pub fn air(&self) -> &Air {
        &self.air
    }

    pub fn call_stack(&self) -> &[u16] {
        &self.call_stack
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    pub fn halted(&self) -> Option<Halt> {
        self.halted
    }

    pub fn writes(&self) -> &[(u16, u8)] {
        &self.writes
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn reg(&self, reg: Register) -> u16 {
        self.regs.get(reg, &self.flags)
    }

    /// Writing PC also clears any halt, so execution resumes from the new address.
    pub fn set_reg(&mut self, reg: Register, value: u16) {
        self.regs.set(reg, value, &mut self.flags);
        if reg == Register::PC {
            self.halted = None;
        }
    }

    pub fn write_data(&mut self, addr: u16, value: u8) {
        self.data.write(addr, value);
    }

    /// Zero-based source line of the next instruction, or the line count once past the end.
    pub fn line(&self) -> usize {
        self.current().map_or(self.air.line_count(), |asm| asm.line)
    }

    /// Instruction at PC.
    pub fn current(&self) -> Option<&AsmLine> {
        let idx = self.air.index_of(self.regs.pc)?;
        self.air.get(idx)
    }

    fn is_past_end(&self, addr: u16) -> bool {
        // The end may be exactly 0x10000, which wraps to 0
        addr == self.air.end() as u16
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> Result<Option<Halt>> {
        if let Some(halt) = self.halted {
            return Ok(Some(halt));
        }
        self.writes.clear();

        let pc = self.regs.pc;
        // Owned copy keeps `self` free to mutate
        let Some(asm) = self.current().cloned() else {
            if self.is_past_end(pc) {
                self.halted = Some(Halt::Exhausted);
                return Ok(self.halted);
            }
            self.halted = Some(Halt::Fault);
            return Err(SimError::new(
                ErrorKind::InvalidAddress,
                format!("no instruction starts at ${pc:04X}"),
            ));
        };

        if env::is_trace_enabled() {
            let text = asm.instr.to_string();
            dprintln!(Sometimes, "{:04X}  {:<12} {}", asm.address, text, hex(&asm.bytes));
        }

        let flow = match self.execute(&asm.instr, &asm.operand, asm.next_address()) {
            Ok(flow) => flow,
            Err(err) => {
                self.halted = Some(Halt::Fault);
                return Err(err.at(asm.line, asm.span));
            }
        };
        self.steps += 1;
        self.settle(flow, asm.next_address())
    }

    /// Apply the control flow decided by an instruction.
    fn settle(&mut self, flow: Flow, next: u16) -> Result<Option<Halt>> {
        match flow {
            Flow::Next => self.regs.pc = next,
            Flow::Jump(target) => self.regs.pc = target,
            Flow::Halt(halt) => self.halted = Some(halt),
        }
        Ok(self.halted)
    }

    /// Step until a halt, `cancel` returns true, or `max_steps` instructions were executed.
    ///
    /// Returns `None` when cancelled.
    pub fn run_until(
        &mut self,
        max_steps: u64,
        mut cancel: impl FnMut(&RunState) -> bool,
    ) -> Result<Option<Halt>> {
        let mut count = 0;
        loop {
            if let Some(halt) = self.step()? {
                return Ok(Some(halt));
            }
            count += 1;
            if cancel(self) {
                return Ok(None);
            }
            if count >= max_steps {
                return Err(SimError::new(
                    ErrorKind::StepLimit,
                    format!("stopped after {count} instructions without halting"),
                ));
            }
        }
    }

    /// Run to completion with the configured step limit.
    pub fn run(&mut self) -> Result<Halt> {
        let halt = self.run_until(env::max_steps(), |_| false)?;
        Ok(halt.unwrap_or(Halt::Fault))
    }

    /// Execute a single line of source against the current state without it being part of the
    /// program. PC only moves if the instruction transfers control.
    pub fn eval(&mut self, src: &str) -> Result<Option<Halt>> {
        self.writes.clear();
        let line = lexer::lex_line(src, 0, 0)?;
        if line.is_blank() {
            return Err(SimError::new(ErrorKind::SyntaxError, "nothing to evaluate"));
        }
        let instr = parser::parse_instruction(&line).map_err(|err| {
            SimError::new(ErrorKind::UnsupportedInstruction, err.message.clone())
        })?;
        let operand = instr.validate_syntax(self.air.labels())?;
        let next = self.regs.pc;
        let flow = self.execute(&instr, &operand, next)?;
        // A halting instruction typed by hand does not end the program
        match flow {
            Flow::Halt(_) => Ok(self.halted),
            flow => self.settle(flow, next),
        }
    }

    fn execute(&mut self, instr: &Instruction, operand: &Operand, next: u16) -> Result<Flow> {
        match instr.mnemonic.op() {
            Op::Load(reg) => {
                let value = self.read_operand(operand, reg.is_wide())?;
                self.regs.set(reg, value, &mut self.flags);
                if reg.is_wide() {
                    self.flags.set_nz16(value);
                } else {
                    self.flags.set_nz8(value as u8);
                }
            }
            Op::Store(reg) => {
                let addr = self.address_of(operand)?;
                let value = self.reg(reg);
                if reg.is_wide() {
                    let [hi, lo] = value.to_be_bytes();
                    self.store(addr, hi);
                    self.store(addr.wrapping_add(1), lo);
                } else {
                    self.store(addr, value as u8);
                }
            }
            Op::Add(acc) => self.binary(acc, operand, alu::add8, true)?,
            Op::Sub(acc) => self.binary(acc, operand, alu::sub8, true)?,
            Op::Cmp(acc) => self.binary(acc, operand, alu::sub8, false)?,
            Op::And(acc) => self.binary(acc, operand, alu::and8, true)?,
            Op::Or(acc) => self.binary(acc, operand, alu::or8, true)?,
            Op::Eor(acc) => self.binary(acc, operand, alu::eor8, true)?,
            Op::Lsl(acc) => self.unary(acc, alu::lsl8),
            Op::Lsr(acc) => self.unary(acc, alu::lsr8),
            Op::Rol(acc) => self.unary(acc, alu::rol8),
            Op::Ror(acc) => self.unary(acc, alu::ror8),
            Op::Clr(acc) => self.unary(acc, |_, flags| alu::clr8(flags)),
            Op::Inc(acc) => self.unary(acc, alu::inc8),
            Op::Dec(acc) => self.unary(acc, alu::dec8),
            Op::Com(acc) => self.unary(acc, alu::com8),
            Op::Neg(acc) => self.unary(acc, alu::neg8),
            Op::Tfr => {
                let (src, dest) = pair(operand)?;
                let value = self.reg(src);
                self.set_reg(dest, value);
                if dest == Register::PC {
                    return Ok(Flow::Jump(self.regs.pc));
                }
            }
            Op::Exg => {
                let (left, right) = pair(operand)?;
                let (a, b) = (self.reg(left), self.reg(right));
                self.set_reg(left, b);
                self.set_reg(right, a);
                if left == Register::PC || right == Register::PC {
                    return Ok(Flow::Jump(self.regs.pc));
                }
            }
            Op::Branch(cond) => {
                if self.condition(cond) {
                    return Ok(Flow::Jump(self.target(operand)?));
                }
            }
            Op::Jump => return Ok(Flow::Jump(self.target(operand)?)),
            Op::Call => {
                let target = self.target(operand)?;
                self.call_stack.push(next);
                return Ok(Flow::Jump(target));
            }
            Op::Return => {
                return Ok(match self.call_stack.pop() {
                    Some(addr) => Flow::Jump(addr),
                    None => Flow::Halt(Halt::Return),
                });
            }
            Op::Nop => (),
            Op::Interrupt => return Ok(Flow::Halt(Halt::Interrupt)),
            Op::End => return Ok(Flow::Halt(Halt::End)),
        }
        Ok(Flow::Next)
    }

    fn binary(
        &mut self,
        acc: Acc,
        operand: &Operand,
        op: fn(u8, u8, Flags) -> AluResult,
        write_back: bool,
    ) -> Result<()> {
        let a = self.reg(acc.register()) as u8;
        let b = self.read_operand(operand, false)? as u8;
        let res = op(a, b, self.flags);
        self.flags = res.flags;
        if write_back {
            self.set_reg(acc.register(), res.value as u16);
        }
        Ok(())
    }

    fn unary(&mut self, acc: Acc, op: impl Fn(u8, Flags) -> AluResult) {
        let a = self.reg(acc.register()) as u8;
        let res = op(a, self.flags);
        self.flags = res.flags;
        self.set_reg(acc.register(), res.value as u16);
    }

    fn condition(&self, cond: Cond) -> bool {
        let f = &self.flags;
        match cond {
            Cond::Always => true,
            Cond::Eq => f.z,
            Cond::Ne => !f.z,
            Cond::Mi => f.n,
            Cond::Pl => !f.n,
            Cond::Cc => !f.c,
            Cond::Cs => f.c,
            Cond::Vc => !f.v,
            Cond::Vs => f.v,
        }
    }

    /// Address an operand refers to in the data store.
    fn address_of(&self, operand: &Operand) -> Result<u16> {
        match operand {
            Operand::Direct(lo) => Ok(u16::from_be_bytes([self.regs.dp, *lo])),
            Operand::Extended(addr) => Ok(*addr),
            Operand::Indexed { offset, reg } => {
                let base = self.reg(reg.register());
                Ok(base.wrapping_add(*offset as i16 as u16))
            }
            other => Err(SimError::new(
                ErrorKind::UnsupportedEncoding,
                format!("operand {other:?} does not name a memory address"),
            )),
        }
    }

    fn read_operand(&self, operand: &Operand, wide: bool) -> Result<u16> {
        if let Operand::Immediate(value) = operand {
            return Ok(*value);
        }
        let addr = self.address_of(operand)?;
        Ok(if wide {
            self.data.read_word(addr)
        } else {
            self.data.read(addr) as u16
        })
    }

    /// Destination of a jump, branch or call.
    fn target(&self, operand: &Operand) -> Result<u16> {
        match operand {
            Operand::Label(label) => self
                .air
                .label_address(label)
                .map(|addr| addr as u16)
                .ok_or_else(|| {
                    SimError::new(ErrorKind::LabelNotFound, format!("label `{label}` not found"))
                }),
            other => self.address_of(other),
        }
    }

    fn store(&mut self, addr: u16, value: u8) {
        self.data.write(addr, value);
        self.writes.push((addr, value));
    }
}

fn pair(operand: &Operand) -> Result<(Register, Register)> {
    match operand {
        Operand::Pair(src, dest) => Ok((*src, *dest)),
        other => Err(SimError::new(
            ErrorKind::SyntaxError,
            format!("expected a register pair, found {other:?}"),
        )),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::AsmParser;

    fn load(src: &str) -> RunState {
        RunState::new(AsmParser::new(src).unwrap().parse().unwrap())
    }

    #[test]
    fn loads_set_flags_by_width() {
        let mut state = load("LDA #$80\nLDX #$0000\nEND");
        state.step().unwrap();
        assert_eq!(state.reg(Register::A), 0x80);
        assert!(state.flags().n && !state.flags().z);
        state.step().unwrap();
        assert!(state.flags().z && !state.flags().n);
        assert_eq!(state.pc(), 0xFE05);
    }

    #[test]
    fn direct_page_addressing() {
        let mut state = load("LDA $10\nEND");
        state.set_reg(Register::DP, 0x20);
        state.write_data(0x2010, 0x42);
        state.write_data(0x0010, 0x99);
        state.step().unwrap();
        assert_eq!(state.reg(Register::A), 0x42);
    }

    #[test]
    fn stores_wide_registers_big_endian() {
        let mut state = load("LDX #$1234\nSTX $0100\nLDB #$7F\nSTB 2,X\nEND");
        state.step().unwrap();
        state.step().unwrap();
        assert_eq!(state.writes(), &[(0x0100, 0x12), (0x0101, 0x34)]);
        state.step().unwrap();
        state.step().unwrap();
        assert_eq!(state.data().read(0x1236), 0x7F);
        assert_eq!(state.writes(), &[(0x1236, 0x7F)]);
    }

    #[test]
    fn compare_reads_data_store_without_writing() {
        let mut state = load("LDA #$05\nCMPA $0040\nEND");
        state.write_data(0x0040, 0x05);
        state.step().unwrap();
        state.step().unwrap();
        assert_eq!(state.reg(Register::A), 0x05);
        assert!(state.flags().z && !state.flags().c);
    }

    #[test]
    fn negative_index_offsets() {
        let mut state = load("LDU #$0010\nLDA -1,U\nEND");
        state.write_data(0x000F, 0xAB);
        state.run().unwrap();
        assert_eq!(state.reg(Register::A), 0xAB);
    }

    #[test]
    fn subroutines_return() {
        let src = "\
            BSR SUB
            INCB
            BRA DONE
        SUB: LDA #$01
            RTS
        DONE: END";
        let mut state = load(src);
        state.step().unwrap();
        assert_eq!(state.call_stack(), &[0xFE02]);
        assert_eq!(state.run().unwrap(), Halt::End);
        assert_eq!(state.reg(Register::A), 1);
        assert_eq!(state.reg(Register::B), 1);
        assert!(state.call_stack().is_empty());
    }

    #[test]
    fn return_on_empty_stack_halts() {
        let mut state = load("RTS\nEND");
        assert_eq!(state.step().unwrap(), Some(Halt::Return));
        // Further steps are no-ops
        assert_eq!(state.step().unwrap(), Some(Halt::Return));
        assert_eq!(state.steps(), 1);
    }

    #[test]
    fn swi_halts() {
        let mut state = load("SWI\nINCA\nEND");
        assert_eq!(state.run().unwrap(), Halt::Interrupt);
        assert_eq!(state.reg(Register::A), 0);
    }

    #[test]
    fn jump_to_middle_of_instruction() {
        let mut state = load("LDX #$FE01\nJMP ,X\nEND");
        state.step().unwrap();
        state.step().unwrap();
        assert_eq!(state.pc(), 0xFE01);
        let err = state.step().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidAddress);
        assert_eq!(state.halted(), Some(Halt::Fault));
    }

    #[test]
    fn transfer_to_pc_jumps() {
        let mut state = load("LDX #$FE06\nTFR X,PC\nINCA\nEND");
        state.run().unwrap();
        assert_eq!(state.reg(Register::A), 0);
    }

    #[test]
    fn transfers_between_widths() {
        let mut state = load("LDX #$1234\nTFR X,A\nLDB #$FF\nTFR B,Y\nEXG A,DP\nEND");
        state.run().unwrap();
        assert_eq!(state.reg(Register::A), 0x00);
        assert_eq!(state.reg(Register::DP), 0x34);
        assert_eq!(state.reg(Register::Y), 0x00FF);
    }

    #[test]
    fn step_limit() {
        let mut state = load("LOOP: BRA LOOP\nEND");
        let err = state.run_until(50, |_| false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StepLimit);
        assert_eq!(state.steps(), 50);
    }

    #[test]
    fn cancellation() {
        let mut state = load("LOOP: INCA\nBRA LOOP\nEND");
        let res = state.run_until(1000, |state| state.reg(Register::A) == 3);
        assert_eq!(res.unwrap(), None);
        assert_eq!(state.line(), 1);
    }

    #[test]
    fn eval_runs_outside_the_program() {
        let mut state = load("NOP\nEND");
        state.eval("lda #$2A").unwrap();
        assert_eq!(state.reg(Register::A), 0x2A);
        assert_eq!(state.pc(), 0xFE00);
        let err = state.eval("FOO #1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedInstruction);
    }

    #[test]
    fn reset_restores_power_on_state() {
        let mut state = load("LDA #$10\nSTA $0000\nEND");
        state.run().unwrap();
        state.reset();
        assert_eq!(state.reg(Register::A), 0);
        assert_eq!(state.pc(), 0xFE00);
        assert!(state.flags().z);
        assert_eq!(state.data().read(0x0000), 0);
        assert_eq!(state.halted(), None);
        // Program store is kept
        assert_eq!(state.program().read(0xFE00), 0x86);
    }
}
