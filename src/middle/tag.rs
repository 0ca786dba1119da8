//! Assigns identities to the objects that need names downstream: stack
//! slots, jump labels and generated function names are all derived from an
//! object's identity. Identities start at 1 and are handed out in a
//! pre-order walk over the definitions in declaration order, so the same
//! package always tags the same way. Already tagged objects keep their
//! identity, which makes the pass idempotent.

use super::ir::{ObjectId, ObjectKind, Package};

pub fn tag(package: &mut Package) {
    let next = package
        .objects
        .iter()
        .map(|object| object.id)
        .max()
        .unwrap_or(0)
        + 1;

    let mut tagger = Tagger { next };

    let definitions: Vec<ObjectId> = package.definitions().map(|(_, id)| id).collect();
    for definition in definitions {
        tagger.tag_object(package, definition);
    }
}

struct Tagger {
    next: u32,
}

impl Tagger {
    fn tag_object(&mut self, package: &mut Package, id: ObjectId) {
        let needs_identity = matches!(
            package.object(id).kind,
            ObjectKind::Binary { .. }
                | ObjectKind::Call { .. }
                | ObjectKind::If { .. }
                | ObjectKind::For { .. }
                | ObjectKind::Function { .. }
                | ObjectKind::VarBlock { .. }
                | ObjectKind::Param
        );

        if needs_identity && package.object(id).id == 0 {
            package.object_mut(id).id = self.next;
            self.next += 1;
        }

        match package.object(id).kind.clone() {
            ObjectKind::Constant(_) | ObjectKind::VariableRef | ObjectKind::Param => {}
            ObjectKind::Unary { operand, .. } => self.tag_object(package, operand),
            ObjectKind::Binary { lhs, rhs, .. } => {
                self.tag_object(package, lhs);
                self.tag_object(package, rhs);
            }
            ObjectKind::Assignment { value } => self.tag_object(package, value),
            ObjectKind::Call { arguments } => {
                for argument in arguments {
                    self.tag_object(package, argument);
                }
            }
            ObjectKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.tag_object(package, condition);
                self.tag_object(package, then);
                if let Some(otherwise) = otherwise {
                    self.tag_object(package, otherwise);
                }
            }
            ObjectKind::For { condition, body } => {
                self.tag_object(package, condition);
                for expression in body {
                    self.tag_object(package, expression);
                }
            }
            ObjectKind::Function { parameters, body }
            | ObjectKind::VarBlock { parameters, body } => {
                for parameter in parameters {
                    self.tag_object(package, parameter);
                }
                for expression in body {
                    self.tag_object(package, expression);
                }
            }
            ObjectKind::Definition { body } => self.tag_object(package, body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{SourceFile, parser::Parser};
    use crate::middle::ast_lowering;

    fn tagged(src: &str) -> Package {
        let source = SourceFile::from_string(src);
        let file = Parser::parse_file(&source).expect("file should parse");
        let mut package = ast_lowering::lower_file(&file, "main").expect("file should lower");
        tag(&mut package);
        package
    }

    fn identities(package: &Package) -> Vec<u32> {
        package
            .objects
            .iter()
            .filter(|object| object.id != 0)
            .map(|object| object.id)
            .collect()
    }

    #[test]
    fn identities_are_unique_and_start_at_one() {
        let package = tagged(
            "(define main (func (a:int b:int):int (+ a b (* a b))))",
        );

        let mut ids = identities(&package);
        ids.sort_unstable();
        assert_eq!(ids.first(), Some(&1));
        let count = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), count, "identities must be unique");
    }

    #[test]
    fn constants_and_references_are_never_tagged() {
        let package = tagged("(define main (func (a:int):int (+ a 1)))");

        for object in package.objects.iter() {
            match object.kind {
                ObjectKind::Constant(_) | ObjectKind::VariableRef => {
                    assert_eq!(object.id, 0)
                }
                _ => {}
            }
        }
    }

    #[test]
    fn tagging_is_idempotent() {
        let mut package = tagged("(define main (func:int (+ 1 2)))");
        let before: Vec<u32> = package.objects.iter().map(|object| object.id).collect();
        tag(&mut package);
        let after: Vec<u32> = package.objects.iter().map(|object| object.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn calls_receive_identities() {
        let package = tagged(
            "(define f (func (a:int):int a))(define main (func:int (f 1)))",
        );
        let call = package
            .objects
            .iter()
            .find(|object| matches!(object.kind, ObjectKind::Call { .. }))
            .expect("call object should exist");
        assert_ne!(call.id, 0);
    }

    #[test]
    fn functions_are_tagged_for_code_generation() {
        let package = tagged("(define main (func:int 1))");
        let function = package
            .objects
            .iter()
            .find(|object| matches!(object.kind, ObjectKind::Function { .. }))
            .expect("function object should exist");
        assert_ne!(function.id, 0);
    }
}
