//! The stack allocator. Every identity-bearing entity of a function gets a
//! machine-word slot in the frame, in depth-first visit order; no attempt is
//! made to keep values in registers across expressions. The computed frame
//! sizes are always 16-byte aligned.

use hashbrown::HashMap;

use crate::middle::ir::{ObjectId, ObjectKind, Package};

use super::{abi::Abi, arch::Arch};

/// Rounds up to the next multiple of 16. An already aligned size still
/// advances a full block, leaving headroom the frame layout relies on.
pub fn align16(n: i32) -> i32 {
    (n & -16) + 16
}

/// Where a value lives at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Register(&'static str),
    /// `offset(%ebp)` / `offset(%rbp)`
    Base(i32),
    /// `offset(%esp)` / `offset(%rsp)`
    Stack(i32),
}

impl Location {
    pub fn render(&self, arch: &Arch) -> String {
        match self {
            Location::Register(register) => (*register).to_string(),
            Location::Base(offset) => format!("{offset}({})", arch.base_pointer),
            Location::Stack(offset) => format!("{offset}({})", arch.stack_pointer),
        }
    }
}

/// Slot assignments and frame sizes for a whole package, keyed by identity
#[derive(Debug, Default)]
pub struct FrameLayout {
    locations: HashMap<u32, Location>,
    frames: HashMap<u32, i32>,
}

impl FrameLayout {
    pub fn location(&self, identity: u32) -> Location {
        self.locations[&identity]
    }

    pub fn frame_size(&self, function_identity: u32) -> i32 {
        self.frames[&function_identity]
    }
}

pub fn allocate(package: &Package, abi: Abi) -> FrameLayout {
    let mut layout = FrameLayout::default();

    let definitions: Vec<ObjectId> = package.definitions().map(|(_, id)| id).collect();
    for definition in definitions {
        let ObjectKind::Definition { body } = package.object(definition).kind else {
            continue;
        };
        if matches!(package.object(body).kind, ObjectKind::Function { .. }) {
            Allocator {
                package,
                abi,
                width: abi.arch().width,
                next_offset: -abi.arch().width,
                locals: 0,
                max_args: 0,
            }
            .allocate_function(body, &mut layout);
        }
    }

    layout
}

struct Allocator<'package> {
    package: &'package Package,
    abi: Abi,
    width: i32,
    next_offset: i32,
    locals: i32,
    max_args: i32,
}

impl Allocator<'_> {
    fn allocate_function(mut self, function: ObjectId, layout: &mut FrameLayout) {
        let ObjectKind::Function {
            ref parameters,
            ref body,
        } = self.package.object(function).kind
        else {
            unreachable!("allocate_function is only called on functions");
        };

        for (index, &parameter) in parameters.iter().enumerate() {
            let identity = self.package.object(parameter).id;
            let location = match self.abi.parameter_location(index) {
                // Register parameters would be clobbered by the first call
                // in the body, so the prologue spills them to frame slots
                Location::Register(_) => self.next_slot(),
                location => location,
            };
            layout.locations.insert(identity, location);
        }

        for &expression in body {
            self.walk(expression, layout);
        }

        let frame = align16(
            self.abi.shadow_space() + self.max_args * self.width + self.locals * self.width,
        );
        layout.frames.insert(self.package.object(function).id, frame);
    }

    fn next_slot(&mut self) -> Location {
        let slot = Location::Base(self.next_offset);
        self.next_offset -= self.width;
        self.locals += 1;
        slot
    }

    fn assign_slot(&mut self, id: ObjectId, layout: &mut FrameLayout) {
        let identity = self.package.object(id).id;
        let slot = self.next_slot();
        layout.locations.insert(identity, slot);
    }

    fn walk(&mut self, id: ObjectId, layout: &mut FrameLayout) {
        match self.package.object(id).kind {
            ObjectKind::Constant(_) | ObjectKind::VariableRef | ObjectKind::Param => {}
            ObjectKind::Unary { operand, .. } => self.walk(operand, layout),
            ObjectKind::Binary { lhs, rhs, .. } => {
                self.walk(lhs, layout);
                self.walk(rhs, layout);
                // The slot holds the left operand while the right one is
                // being evaluated
                self.assign_slot(id, layout);
            }
            ObjectKind::Assignment { value } => self.walk(value, layout),
            ObjectKind::Call { ref arguments } => {
                let arguments = arguments.clone();
                self.max_args = self.max_args.max(arguments.len() as i32);
                // One scratch slot per argument, owned by this call, so a
                // nested call cannot clobber already evaluated arguments
                if !arguments.is_empty() {
                    self.assign_slot(id, layout);
                    for _ in 1..arguments.len() {
                        self.next_slot();
                    }
                }
                for argument in arguments {
                    self.walk(argument, layout);
                }
            }
            ObjectKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.assign_slot(id, layout);
                self.walk(condition, layout);
                self.walk(then, layout);
                if let Some(otherwise) = otherwise {
                    self.walk(otherwise, layout);
                }
            }
            ObjectKind::For {
                condition,
                ref body,
            } => {
                let body = body.clone();
                self.assign_slot(id, layout);
                self.walk(condition, layout);
                for expression in body {
                    self.walk(expression, layout);
                }
            }
            ObjectKind::VarBlock {
                ref parameters,
                ref body,
            } => {
                let (parameters, body) = (parameters.clone(), body.clone());
                self.assign_slot(id, layout);
                for parameter in parameters {
                    self.assign_slot(parameter, layout);
                }
                for expression in body {
                    self.walk(expression, layout);
                }
            }
            // Functions are only emitted at the top level
            ObjectKind::Function { ref body, .. } => {
                let body = body.clone();
                for expression in body {
                    self.walk(expression, layout);
                }
            }
            ObjectKind::Definition { .. } => {
                unreachable!("definitions only exist at the top level")
            }
        }
    }
}
