use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::air::Air;
use crate::env;
use crate::error::Result;
use crate::parser::AsmParser;
use crate::runtime::{Halt, RunState};
use crate::state::{Flags, Registers, PROGRAM_BASE};
use crate::symbol::Register;

/// Conventional extension of program files.
pub const PROGRAM_EXTENSION: &str = "asmb";

/// Lifecycle of the loaded program.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    NotAssembled,
    /// Assembled, nothing executed yet
    Ready,
    Running,
    Halted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::NotAssembled => "not assembled",
            Status::Ready => "ready",
            Status::Running => "running",
            Status::Halted => "halted",
        };
        f.write_str(name)
    }
}

/// Consistent view of the machine, handed to observers after every action.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Snapshot {
    pub registers: Registers,
    pub flags: Flags,
    pub pc: u16,
    /// Zero-based line of the next instruction
    pub line: usize,
    /// Data store cells written since the previous snapshot
    pub writes: Vec<(u16, u8)>,
    pub status: Status,
}

type Observer = Box<dyn FnMut(&Snapshot)>;

/// Owns the program text and, once assembled, the engine running it.
pub struct Simulator {
    source: String,
    state: Option<RunState>,
    status: Status,
    observers: Vec<Observer>,
    max_steps: u64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Simulator {
            source: String::new(),
            state: None,
            status: Status::NotAssembled,
            observers: Vec::new(),
            max_steps: env::max_steps(),
        }
    }

    pub fn with_source(source: impl Into<String>) -> Self {
        let mut sim = Self::new();
        sim.load_program(source);
        sim
    }

    /// Replace the program text. Any assembled program is discarded.
    pub fn load_program(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.clear();
    }

    pub fn save_program(&self) -> &str {
        &self.source
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let source = fs::read_to_string(path)?;
        self.load_program(source);
        Ok(())
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, &self.source)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn state(&self) -> Option<&RunState> {
        self.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut RunState> {
        self.state.as_mut()
    }

    pub fn air(&self) -> Option<&Air> {
        self.state.as_ref().map(RunState::air)
    }

    pub fn set_max_steps(&mut self, max_steps: u64) {
        self.max_steps = max_steps;
    }

    /// Register an observer, called with every snapshot from now on.
    pub fn subscribe(&mut self, observer: impl FnMut(&Snapshot) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_with(Vec::new())
    }

    fn snapshot_with(&self, writes: Vec<(u16, u8)>) -> Snapshot {
        match &self.state {
            Some(state) => Snapshot {
                registers: *state.registers(),
                flags: *state.flags(),
                pc: state.pc(),
                line: state.line(),
                writes,
                status: self.status,
            },
            None => Snapshot {
                registers: Registers::default(),
                flags: Flags::default(),
                pc: PROGRAM_BASE,
                line: 0,
                writes,
                status: self.status,
            },
        }
    }

    fn broadcast(&mut self, snapshot: &Snapshot) {
        for observer in &mut self.observers {
            observer(snapshot);
        }
    }

    fn publish(&mut self, writes: Vec<(u16, u8)>) -> Snapshot {
        let snapshot = self.snapshot_with(writes);
        self.broadcast(&snapshot);
        snapshot
    }

    fn clear(&mut self) {
        self.state = None;
        self.status = Status::NotAssembled;
    }

    /// Assemble the program, or if it is already assembled, discard it and return to power-on
    /// state.
    pub fn assemble(&mut self) -> Result<Snapshot> {
        if self.state.is_some() {
            self.clear();
        } else {
            let air = AsmParser::new(&self.source)?.parse()?;
            self.state = Some(RunState::new(air));
            self.status = Status::Ready;
        }
        Ok(self.publish(Vec::new()))
    }

    /// Execute one instruction. Assembles instead when nothing is assembled yet.
    pub fn step(&mut self) -> Result<Snapshot> {
        let Some(state) = self.state.as_mut() else {
            return self.assemble();
        };
        if self.status == Status::Halted {
            return Ok(self.snapshot());
        }
        let res = state.step();
        let writes = state.writes().to_vec();
        self.settle(res.map(|halt| halt.is_some()), writes)
    }

    /// Run until the program halts.
    pub fn run(&mut self) -> Result<Snapshot> {
        self.run_until(|| false)
    }

    /// Run until the program halts or `cancel` returns true, checked between instructions.
    pub fn run_until(&mut self, mut cancel: impl FnMut() -> bool) -> Result<Snapshot> {
        if self.state.is_none() {
            self.assemble()?;
        }
        let max_steps = self.max_steps;
        let Some(state) = self.state.as_mut() else {
            return Ok(self.snapshot());
        };
        if self.status == Status::Halted {
            return Ok(self.snapshot());
        }
        let mut writes = Vec::new();
        let res = state.run_until(max_steps, |state| {
            writes.extend_from_slice(state.writes());
            cancel()
        });
        self.settle(res.map(|halt| halt.is_some()), writes)
    }

    fn settle(&mut self, res: Result<bool>, writes: Vec<(u16, u8)>) -> Result<Snapshot> {
        match res {
            Ok(halted) => {
                self.status = if halted {
                    Status::Halted
                } else {
                    Status::Running
                };
                Ok(self.publish(writes))
            }
            Err(err) => {
                self.status = Status::Halted;
                self.publish(writes);
                Err(err)
            }
        }
    }

    /// Return registers, flags and data to power-on state, keeping the assembled program.
    pub fn reset(&mut self) -> Snapshot {
        if let Some(state) = self.state.as_mut() {
            state.reset();
            self.status = Status::Ready;
        }
        self.publish(Vec::new())
    }

    /// Write a register. Moving PC resumes a halted program. Returns `None` when nothing is
    /// assembled.
    pub fn set_register(&mut self, register: Register, value: u16) -> Option<Snapshot> {
        let state = self.state.as_mut()?;
        state.set_reg(register, value);
        if register == Register::PC && self.status == Status::Halted {
            self.status = Status::Running;
        }
        Some(self.publish(Vec::new()))
    }

    /// Why the program stopped, once halted.
    pub fn halt_reason(&self) -> Option<Halt> {
        self.state.as_ref().and_then(RunState::halted)
    }
}
