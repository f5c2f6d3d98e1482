mod command;
mod error;
mod source;

use self::command::Command;
use self::source::{CommandSource, SourceRead as _};
use crate::error::SimError;
use crate::output::{Condition, Output};
use crate::runtime::Halt;
use crate::sim::{Simulator, Status};
use crate::symbol::Register;
use crate::dprintln;

/// Leave this as a struct, in case more options are added in the future. Plus it is more explicit.
#[derive(Debug, Default)]
pub struct DebuggerOptions {
    pub command: Option<String>,
}

/// Interactive command loop driving a [`Simulator`].
pub struct Debugger {
    sim: Simulator,
    command_source: CommandSource,
    /// Whether PC should be displayed on next command prompt.
    should_echo_pc: bool,
}

const OUTPUT: Output = Output::Debugger(Condition::Always);

impl Debugger {
    pub fn new(opts: DebuggerOptions, mut sim: Simulator) -> Self {
        sim.subscribe(|snapshot| {
            for (addr, value) in &snapshot.writes {
                dprintln!(Sometimes, "Wrote ${:02X} to ${:04X}.", value, addr);
            }
        });
        Self {
            sim,
            command_source: CommandSource::from(opts.command),
            should_echo_pc: true,
        }
    }

    /// Read and execute commands until `quit` or end of input.
    pub fn run(mut self) -> Simulator {
        loop {
            OUTPUT.start_new_line();
            if self.should_echo_pc {
                self.echo_pc();
                self.should_echo_pc = false;
            }
            // Convert `EOF` to `quit` command
            let Some(line) = self.next_line() else {
                break;
            };
            let command = match Command::try_from(line.as_str()) {
                Ok(command) => command,
                Err(error) => {
                    dprintln!(Always, "{}", error);
                    dprintln!(Always, "Type `help` for a list of commands.");
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            self.execute(command);
        }
        self.sim
    }

    /// Returns `None` on EOF.
    fn next_line(&mut self) -> Option<String> {
        loop {
            let line = self.command_source.read()?;
            // `Command::try_from` assumes non-empty line
            if !line.trim().is_empty() {
                return Some(line);
            }
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Quit => (),
            Command::Help => {
                dprintln!(Always, "\n{}", include_str!("./help.txt"));
            }

            Command::Step { count } => {
                let mut executed = 0;
                for _ in 0..count {
                    if self.sim.status() == Status::Halted {
                        break;
                    }
                    let was_assembled = self.sim.status() != Status::NotAssembled;
                    if let Err(err) = self.sim.step() {
                        self.report(&err);
                        break;
                    }
                    if !was_assembled {
                        dprintln!(Always, "Assembled program.");
                        break;
                    }
                    executed += 1;
                }
                self.finish_execution(executed);
            }
            Command::Run => {
                let before = self.steps();
                let res = self.sim.run();
                let executed = self.steps().saturating_sub(before);
                if let Err(err) = res {
                    self.report(&err);
                }
                self.finish_execution(executed);
            }

            Command::Reset => {
                self.sim.reset();
                self.should_echo_pc = true;
                dprintln!(Always, "Reset program to initial state.");
            }
            Command::Assemble => match self.sim.assemble() {
                Ok(snapshot) if snapshot.status == Status::NotAssembled => {
                    dprintln!(Always, "Cleared assembled program.");
                }
                Ok(_) => {
                    self.should_echo_pc = true;
                    dprintln!(Always, "Assembled program.");
                }
                Err(err) => self.report(&err),
            },

            Command::Registers => {
                dprintln!(Sometimes, "Registers:");
                let snapshot = self.sim.snapshot();
                OUTPUT.print_registers(&snapshot.registers, &snapshot.flags);
            }
            Command::Memory { address, count } => {
                let Some(state) = self.sim.state() else {
                    dprintln!(Always, "Program is not assembled.");
                    return;
                };
                dprintln!(Sometimes, "Memory from ${:04X}:", address);
                OUTPUT.print_memory(state.data(), address, count as usize);
            }
            Command::Program => {
                let Some(state) = self.sim.state() else {
                    dprintln!(Always, "Program is not assembled.");
                    return;
                };
                OUTPUT.print_program(state.air(), state.pc());
            }

            Command::Set { register, value } => {
                if self.sim.set_register(register, value).is_none() {
                    dprintln!(Always, "Program is not assembled.");
                    return;
                }
                if register == Register::PC {
                    self.should_echo_pc = true;
                }
                dprintln!(Always, "Updated register {}.", register);
            }
            Command::Eval { instruction } => {
                let Some(state) = self.sim.state_mut() else {
                    dprintln!(Always, "Program is not assembled.");
                    return;
                };
                let pc = state.pc();
                match state.eval(instruction) {
                    Ok(_) => {
                        for (addr, value) in state.writes() {
                            dprintln!(Sometimes, "Wrote ${:02X} to ${:04X}.", value, addr);
                        }
                        self.should_echo_pc = state.pc() != pc;
                    }
                    Err(err) => self.report(&err),
                }
            }
        }
    }

    fn steps(&self) -> u64 {
        self.sim.state().map_or(0, |state| state.steps())
    }

    fn finish_execution(&mut self, executed: u64) {
        if executed > 0 {
            dprintln!(
                Always,
                "Executed {} instruction{}.",
                executed,
                if executed == 1 { "" } else { "s" },
            );
        }
        if let Some(halt) = self.sim.halt_reason() {
            dprintln!(Always, "{}", halt_message(halt));
        }
        self.should_echo_pc = true;
    }

    fn echo_pc(&self) {
        let snapshot = self.sim.snapshot();
        match self.sim.state().and_then(|state| state.current()) {
            Some(asm) => dprintln!(
                Sometimes,
                "Program counter at ${:04X} (line {}): {}",
                snapshot.pc,
                asm.line + 1,
                asm.instr
            ),
            None => dprintln!(
                Sometimes,
                "Program counter at ${:04X} ({}).",
                snapshot.pc,
                snapshot.status
            ),
        }
    }

    fn report(&self, err: &SimError) {
        if Output::is_minimal() {
            dprintln!(Always, "{}", err);
        } else {
            eprintln!("{:?}", err.report(self.sim.save_program()));
        }
    }
}

fn halt_message(halt: Halt) -> &'static str {
    match halt {
        Halt::End => "Reached END. Program halted.",
        Halt::Interrupt => "Reached SWI. Program halted.",
        Halt::Return => "Returned with an empty call stack. Program halted.",
        Halt::Exhausted => "Ran past the last instruction. Program halted.",
        Halt::Fault => "Program halted on an error. Use `reset` to start again.",
    }
}
