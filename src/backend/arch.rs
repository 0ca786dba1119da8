//! Width-dependent pieces of the assembly output. Values are 32 bits wide
//! on every target, so only the pointer-sized instructions (prologue,
//! epilogue) and the frame registers vary between the two descriptors.

pub struct Arch {
    /// Machine word width in bytes, 4 or 8
    pub width: i32,

    /* pointer-width registers */
    pub accumulator: &'static str,
    pub base_pointer: &'static str,
    pub stack_pointer: &'static str,

    /* pointer-width instructions */
    pub add: &'static str,
    pub mov: &'static str,
    pub pop: &'static str,
    pub push: &'static str,
    pub sub: &'static str,
}

pub static ARCH32: Arch = Arch {
    width: 4,
    accumulator: "%eax",
    base_pointer: "%ebp",
    stack_pointer: "%esp",
    add: "addl",
    mov: "movl",
    pop: "popl",
    push: "pushl",
    sub: "subl",
};

pub static ARCH64: Arch = Arch {
    width: 8,
    accumulator: "%rax",
    base_pointer: "%rbp",
    stack_pointer: "%rsp",
    add: "addq",
    mov: "movq",
    pop: "popq",
    push: "pushq",
    sub: "subq",
};
