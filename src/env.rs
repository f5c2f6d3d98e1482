use std::{cell::RefCell, ffi::OsStr};

/// Instructions `run` executes before giving up, unless overridden.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Env {
    trace_enabled: bool,
    max_steps: u64,
}

impl Default for Env {
    fn default() -> Self {
        Env {
            trace_enabled: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read `SIM6809_TRACE` and `SIM6809_MAX_STEPS` from the process environment.
pub fn init() {
    let value = Env {
        trace_enabled: var_is("SIM6809_TRACE", "1"),
        max_steps: var_parse("SIM6809_MAX_STEPS").unwrap_or(DEFAULT_MAX_STEPS),
    };
    set_env(value);
}

pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

pub fn max_steps() -> u64 {
    with_env(|env| env.max_steps)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

/// Library users never call `init`, so fall back to defaults.
fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow().unwrap_or_default();
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

fn var_parse(name: impl AsRef<OsStr>) -> Option<u64> {
    std::env::var(name.as_ref())
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|&steps| steps > 0)
}
