//! Code generation. The `Target` selects either the portable C backend or
//! the shared x86 generator parameterized by one of the three calling
//! conventions, and knows how to drive the external toolchain for the text
//! it produced.

use std::{path::Path, process::Command};

use strum::{Display, EnumIter, EnumString};

use crate::middle::ir::Package;

pub mod abi;
pub mod alloc;
pub mod arch;
pub mod c;
pub mod x86;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter)]
pub enum Target {
    #[default]
    #[strum(serialize = "c")]
    C,
    #[strum(serialize = "x86-32")]
    X86_32,
    #[strum(serialize = "x86-64-linux")]
    X86_64Linux,
    #[strum(serialize = "x86-64-windows")]
    X86_64Windows,
}

impl Target {
    /// Extension of the generated source text
    pub fn extension(&self) -> &'static str {
        match self {
            Target::C => "c",
            _ => "s",
        }
    }

    pub fn generate(&self, package: &Package) -> String {
        match self {
            Target::C => c::generate(package),
            Target::X86_32 => x86::generate(package, abi::Abi::Posix32),
            Target::X86_64Linux => x86::generate(package, abi::Abi::Posix64),
            Target::X86_64Windows => x86::generate(package, abi::Abi::Win64),
        }
    }

    /// Compiles or assembles the generated text into an object file
    pub fn create_assembler_command(&self, input_file: &Path, output_file: &Path) -> Command {
        let mut command = Command::new("gcc");

        if *self == Target::X86_32 {
            command.arg("-m32");
        }
        if *self == Target::C {
            command.arg("-std=gnu99");
        }

        command
            .arg("-c")
            .arg(input_file)
            .arg("-o")
            .arg(output_file);
        command
    }

    pub fn create_linker_command(&self, input_file: &Path, output_file: &Path) -> Command {
        let mut command = Command::new("gcc");

        if *self == Target::X86_32 {
            command.arg("-m32");
        }

        command.arg(input_file).arg("-o").arg(output_file);
        command
    }
}
