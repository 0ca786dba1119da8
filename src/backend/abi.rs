//! Calling convention policy. Everything the shared x86 generator needs to
//! know about an ABI lives here as data: the argument register set, the
//! shadow space, where an incoming parameter can be found inside the callee
//! frame and where an outgoing argument goes before a call. Parameter and
//! argument locations are kept consistent with each other so callers and
//! callees agree on the overflow slots.

use super::{
    alloc::Location,
    arch::{ARCH32, ARCH64, Arch},
};

/// Argument registers hold 32-bit values, so the 64-bit conventions use the
/// low halves of their usual registers.
static SYSV64_REGISTERS: [&str; 6] = ["%edi", "%esi", "%edx", "%ecx", "%r8d", "%r9d"];
static WIN64_REGISTERS: [&str; 4] = ["%ecx", "%edx", "%r8d", "%r9d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abi {
    /// 32-bit cdecl: every argument on the stack
    Posix32,
    /// System V AMD64: six register arguments
    Posix64,
    /// Windows x64: four register arguments plus 32 bytes of shadow space
    Win64,
}

impl Abi {
    pub fn arch(&self) -> &'static Arch {
        match self {
            Abi::Posix32 => &ARCH32,
            Abi::Posix64 | Abi::Win64 => &ARCH64,
        }
    }

    pub fn registers(&self) -> &'static [&'static str] {
        match self {
            Abi::Posix32 => &[],
            Abi::Posix64 => &SYSV64_REGISTERS,
            Abi::Win64 => &WIN64_REGISTERS,
        }
    }

    /// Bytes the caller reserves below its outgoing arguments
    pub fn shadow_space(&self) -> i32 {
        match self {
            Abi::Win64 => 32,
            _ => 0,
        }
    }

    /// Where the callee finds its `index`-th parameter. Register for the
    /// first N parameters, otherwise a base-pointer-relative slot above the
    /// saved frame pointer and return address.
    pub fn parameter_location(&self, index: usize) -> Location {
        let registers = self.registers();

        if index < registers.len() {
            return Location::Register(registers[index]);
        }

        let overflow = (index - registers.len()) as i32;
        let width = self.arch().width;
        Location::Base(2 * width + self.shadow_space() + overflow * width)
    }

    /// Where the caller places its `index`-th outgoing argument
    pub fn argument_location(&self, index: usize) -> Location {
        let registers = self.registers();

        if index < registers.len() {
            return Location::Register(registers[index]);
        }

        let overflow = (index - registers.len()) as i32;
        Location::Stack(self.shadow_space() + overflow * self.arch().width)
    }
}
