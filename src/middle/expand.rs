//! Expansion of value definitions. A top-level `(define x expr)` whose body
//! is not a function acts as a macro: every reference to `x` is replaced by
//! a fresh copy of `expr` so the backends only ever see functions, locals
//! and parameters. Runs after folding, so most copies are single constants.

use super::{
    ir::{Object, ObjectId, ObjectKind, Package},
    scope::ScopeId,
};

pub fn expand(package: &mut Package) {
    let definitions: Vec<ObjectId> = package.definitions().map(|(_, id)| id).collect();

    for definition in definitions {
        let ObjectKind::Definition { body } = package.object(definition).kind else {
            continue;
        };
        let body = expand_object(package, body);
        let ObjectKind::Definition { body: slot } = &mut package.object_mut(definition).kind
        else {
            unreachable!();
        };
        *slot = body;
    }
}

/// Expands the subtree rooted at `id`, returning the object that replaces it
pub fn expand_object(package: &mut Package, id: ObjectId) -> ObjectId {
    let kind = package.object(id).kind.clone();

    match kind {
        ObjectKind::Constant(_) | ObjectKind::Param | ObjectKind::Definition { .. } => id,
        ObjectKind::VariableRef => {
            let scope = package.object(id).scope;
            let name = package.object(id).name.clone();

            // References resolving to a non-function definition get replaced
            // by a copy of its body; anything else stays a plain reference
            let Some(target) = package.scopes.lookup(scope, &name) else {
                return id;
            };
            let ObjectKind::Definition { body } = package.object(target).kind else {
                return id;
            };
            if matches!(package.object(body).kind, ObjectKind::Function { .. }) {
                return id;
            }

            let copy = deep_copy(package, body, scope);
            expand_object(package, copy)
        }
        ObjectKind::Unary { operand, .. } => {
            let operand = expand_object(package, operand);
            let ObjectKind::Unary { operand: slot, .. } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *slot = operand;
            id
        }
        ObjectKind::Binary { lhs, rhs, .. } => {
            let lhs = expand_object(package, lhs);
            let rhs = expand_object(package, rhs);
            let ObjectKind::Binary {
                lhs: lhs_slot,
                rhs: rhs_slot,
                ..
            } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *lhs_slot = lhs;
            *rhs_slot = rhs;
            id
        }
        ObjectKind::Assignment { value } => {
            let value = expand_object(package, value);
            let ObjectKind::Assignment { value: slot } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *slot = value;
            id
        }
        ObjectKind::Call { arguments } => {
            let arguments: Vec<ObjectId> = arguments
                .into_iter()
                .map(|argument| expand_object(package, argument))
                .collect();
            let ObjectKind::Call { arguments: slot } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *slot = arguments;
            id
        }
        ObjectKind::If {
            condition,
            then,
            otherwise,
        } => {
            let condition = expand_object(package, condition);
            let then = expand_object(package, then);
            let otherwise = otherwise.map(|otherwise| expand_object(package, otherwise));
            let ObjectKind::If {
                condition: condition_slot,
                then: then_slot,
                otherwise: otherwise_slot,
            } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *condition_slot = condition;
            *then_slot = then;
            *otherwise_slot = otherwise;
            id
        }
        ObjectKind::For { condition, body } => {
            let condition = expand_object(package, condition);
            let body: Vec<ObjectId> = body
                .into_iter()
                .map(|expression| expand_object(package, expression))
                .collect();
            let ObjectKind::For {
                condition: condition_slot,
                body: body_slot,
            } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *condition_slot = condition;
            *body_slot = body;
            id
        }
        ObjectKind::Function { body, .. } => {
            let body: Vec<ObjectId> = body
                .into_iter()
                .map(|expression| expand_object(package, expression))
                .collect();
            let ObjectKind::Function { body: slot, .. } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *slot = body;
            id
        }
        ObjectKind::VarBlock { body, .. } => {
            let body: Vec<ObjectId> = body
                .into_iter()
                .map(|expression| expand_object(package, expression))
                .collect();
            let ObjectKind::VarBlock { body: slot, .. } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *slot = body;
            id
        }
    }
}

/// Copies a subtree into fresh arena slots under `scope`, with identities
/// cleared and new scopes for any nested `func` or `var` forms
fn deep_copy(package: &mut Package, id: ObjectId, scope: ScopeId) -> ObjectId {
    let object = package.object(id).clone();

    let kind = match object.kind {
        ObjectKind::Constant(value) => ObjectKind::Constant(value),
        ObjectKind::VariableRef => ObjectKind::VariableRef,
        ObjectKind::Param => ObjectKind::Param,
        ObjectKind::Definition { .. } => {
            unreachable!("definitions only exist at the top level")
        }
        ObjectKind::Unary { operator, operand } => ObjectKind::Unary {
            operator,
            operand: deep_copy(package, operand, scope),
        },
        ObjectKind::Binary { operator, lhs, rhs } => ObjectKind::Binary {
            operator,
            lhs: deep_copy(package, lhs, scope),
            rhs: deep_copy(package, rhs, scope),
        },
        ObjectKind::Assignment { value } => ObjectKind::Assignment {
            value: deep_copy(package, value, scope),
        },
        ObjectKind::Call { arguments } => ObjectKind::Call {
            arguments: arguments
                .into_iter()
                .map(|argument| deep_copy(package, argument, scope))
                .collect(),
        },
        ObjectKind::If {
            condition,
            then,
            otherwise,
        } => ObjectKind::If {
            condition: deep_copy(package, condition, scope),
            then: deep_copy(package, then, scope),
            otherwise: otherwise.map(|otherwise| deep_copy(package, otherwise, scope)),
        },
        ObjectKind::For { condition, body } => ObjectKind::For {
            condition: deep_copy(package, condition, scope),
            body: body
                .into_iter()
                .map(|expression| deep_copy(package, expression, scope))
                .collect(),
        },
        ObjectKind::Function { parameters, body } => {
            let inner = package.scopes.new_scope(Some(scope));
            let (parameters, body) = copy_block(package, parameters, body, inner);
            ObjectKind::Function { parameters, body }
        }
        ObjectKind::VarBlock { parameters, body } => {
            let inner = package.scopes.new_scope(Some(scope));
            let (parameters, body) = copy_block(package, parameters, body, inner);
            ObjectKind::VarBlock { parameters, body }
        }
    };

    package.objects.push(Object {
        kind,
        name: object.name,
        span: object.span,
        ty: object.ty,
        id: 0,
        scope,
    })
}

fn copy_block(
    package: &mut Package,
    parameters: Vec<ObjectId>,
    body: Vec<ObjectId>,
    inner: ScopeId,
) -> (Vec<ObjectId>, Vec<ObjectId>) {
    let parameters: Vec<ObjectId> = parameters
        .into_iter()
        .map(|parameter| {
            let copy = deep_copy(package, parameter, inner);
            let name = package.object(copy).name.clone();
            package.scopes.insert(inner, &name, copy);
            copy
        })
        .collect();

    let body = body
        .into_iter()
        .map(|expression| deep_copy(package, expression, inner))
        .collect();

    (parameters, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frontend::{SourceFile, parser::Parser},
        middle::{ast_lowering, fold, ir::Value, type_check},
    };

    fn expanded(src: &str) -> Package {
        let source = SourceFile::from_string(src);
        let file = Parser::parse_file(&source).expect("file should parse");
        let mut package = ast_lowering::lower_file(&file, "main").expect("file should lower");
        assert_eq!(type_check::check(&mut package), vec![]);
        fold::fold(&mut package);
        expand(&mut package);
        package
    }

    fn definition_body(package: &Package, name: &str) -> ObjectId {
        let (_, definition) = package
            .definitions()
            .find(|(entry, _)| *entry == name)
            .expect("definition should exist");
        let ObjectKind::Definition { body } = package.object(definition).kind else {
            panic!("expected definition object");
        };
        body
    }

    #[test]
    fn value_definition_references_become_copies() {
        let package = expanded(
            "(define answer 42)(define main (func:int answer))",
        );

        let body = definition_body(&package, "main");
        let ObjectKind::Function { ref body, .. } = package.object(body).kind else {
            panic!("expected function body");
        };
        assert!(matches!(
            package.object(body[0]).kind,
            ObjectKind::Constant(Value::Int(42))
        ));
    }

    #[test]
    fn chained_value_definitions_expand_fully() {
        let package = expanded(
            "(define a b)(define b 7)(define main (func:int a))",
        );

        let body = definition_body(&package, "main");
        let ObjectKind::Function { ref body, .. } = package.object(body).kind else {
            panic!("expected function body");
        };
        assert!(matches!(
            package.object(body[0]).kind,
            ObjectKind::Constant(Value::Int(7))
        ));
    }

    #[test]
    fn function_references_are_left_alone() {
        let package = expanded(
            "(define f (func:int 1))(define main (func:int (f)))",
        );

        let body = definition_body(&package, "main");
        let ObjectKind::Function { ref body, .. } = package.object(body).kind else {
            panic!("expected function body");
        };
        assert!(matches!(
            package.object(body[0]).kind,
            ObjectKind::Call { .. }
        ));
    }

    #[test]
    fn copies_rebuild_scopes_for_nested_blocks() {
        let package = expanded(
            "(define block (var (a:int):int (= a 3) a))\
             (define main (func:int block))",
        );

        let body = definition_body(&package, "main");
        let ObjectKind::Function { ref body, .. } = package.object(body).kind else {
            panic!("expected function body");
        };
        let ObjectKind::VarBlock { ref parameters, ref body } =
            package.object(body[0]).kind
        else {
            panic!("expected copied var block");
        };

        let parameter = parameters[0];
        let assignment = body[0];
        let scope = package.object(assignment).scope;
        assert_eq!(package.scopes.lookup(scope, "a"), Some(parameter));
    }
}
