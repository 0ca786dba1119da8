//! Constant folding. Operators over constant operands are evaluated at
//! compile time by overwriting the operator's arena slot with the result;
//! everything else keeps its shape with folded children. Division and
//! remainder by a constant zero are left alone so the program still faults
//! at runtime the way a non-constant zero would.

use crate::frontend::ast::{BinaryOperator, UnaryOperator};

use super::{
    ir::{ObjectId, ObjectKind, Package, Value},
    ty::Type,
};

pub fn fold(package: &mut Package) {
    let definitions: Vec<ObjectId> = package.definitions().map(|(_, id)| id).collect();

    for definition in definitions {
        let ObjectKind::Definition { body } = package.object(definition).kind else {
            continue;
        };
        let body = fold_object(package, body);
        let ObjectKind::Definition { body: slot } = &mut package.object_mut(definition).kind
        else {
            unreachable!();
        };
        *slot = body;
    }
}

/// Folds the subtree rooted at `id`, returning the object that replaces it
pub fn fold_object(package: &mut Package, id: ObjectId) -> ObjectId {
    let kind = package.object(id).kind.clone();

    match kind {
        ObjectKind::Constant(_)
        | ObjectKind::VariableRef
        | ObjectKind::Param
        | ObjectKind::Definition { .. } => {}
        ObjectKind::Unary { operator, operand } => {
            let operand = fold_object(package, operand);

            if let ObjectKind::Constant(Value::Int(value)) = package.object(operand).kind {
                let value = match operator {
                    UnaryOperator::Plus => value,
                    UnaryOperator::Minus => value.wrapping_neg(),
                };
                let object = package.object_mut(id);
                object.kind = ObjectKind::Constant(Value::Int(value));
                object.ty = Type::Int;
            } else {
                let ObjectKind::Unary { operand: slot, .. } =
                    &mut package.object_mut(id).kind
                else {
                    unreachable!();
                };
                *slot = operand;
            }
        }
        ObjectKind::Binary { operator, lhs, rhs } => {
            let lhs = fold_object(package, lhs);
            let rhs = fold_object(package, rhs);

            if let (ObjectKind::Constant(left), ObjectKind::Constant(right)) =
                (&package.object(lhs).kind, &package.object(rhs).kind)
                && let Some(value) = evaluate(operator, *left, *right)
            {
                let object = package.object_mut(id);
                object.kind = ObjectKind::Constant(value);
                object.ty = match value {
                    Value::Int(_) => Type::Int,
                    Value::Bool(_) => Type::Bool,
                };
            } else {
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
            }
        }
        ObjectKind::Assignment { value } => {
            let value = fold_object(package, value);
            let ObjectKind::Assignment { value: slot } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *slot = value;
        }
        ObjectKind::Call { arguments } => {
            let arguments: Vec<ObjectId> = arguments
                .into_iter()
                .map(|argument| fold_object(package, argument))
                .collect();
            let ObjectKind::Call { arguments: slot } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *slot = arguments;
        }
        ObjectKind::If {
            condition,
            then,
            otherwise,
        } => {
            let condition = fold_object(package, condition);
            let then = fold_object(package, then);
            let otherwise = otherwise.map(|otherwise| fold_object(package, otherwise));
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
        }
        ObjectKind::For { condition, body } => {
            let condition = fold_object(package, condition);
            let body: Vec<ObjectId> = body
                .into_iter()
                .map(|expression| fold_object(package, expression))
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
        }
        ObjectKind::Function { body, .. } => {
            let body: Vec<ObjectId> = body
                .into_iter()
                .map(|expression| fold_object(package, expression))
                .collect();
            let ObjectKind::Function { body: slot, .. } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *slot = body;
        }
        ObjectKind::VarBlock { body, .. } => {
            let body: Vec<ObjectId> = body
                .into_iter()
                .map(|expression| fold_object(package, expression))
                .collect();
            let ObjectKind::VarBlock { body: slot, .. } = &mut package.object_mut(id).kind
            else {
                unreachable!();
            };
            *slot = body;
        }
    }

    id
}

fn evaluate(operator: BinaryOperator, lhs: Value, rhs: Value) -> Option<Value> {
    let value = match (operator, lhs, rhs) {
        (BinaryOperator::Add, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
        (BinaryOperator::Subtract, Value::Int(a), Value::Int(b)) => {
            Value::Int(a.wrapping_sub(b))
        }
        (BinaryOperator::Multiply, Value::Int(a), Value::Int(b)) => {
            Value::Int(a.wrapping_mul(b))
        }
        (BinaryOperator::Divide, Value::Int(a), Value::Int(b)) if b != 0 => {
            Value::Int(a.wrapping_div(b))
        }
        (BinaryOperator::Remainder, Value::Int(a), Value::Int(b)) if b != 0 => {
            Value::Int(a.wrapping_rem(b))
        }
        (BinaryOperator::Equals, a, b) => Value::Bool(a == b),
        (BinaryOperator::NotEquals, a, b) => Value::Bool(a != b),
        (BinaryOperator::LessThan, Value::Int(a), Value::Int(b)) => Value::Bool(a < b),
        (BinaryOperator::LessThanOrEqualTo, Value::Int(a), Value::Int(b)) => {
            Value::Bool(a <= b)
        }
        (BinaryOperator::GreaterThan, Value::Int(a), Value::Int(b)) => Value::Bool(a > b),
        (BinaryOperator::GreaterThanOrEqualTo, Value::Int(a), Value::Int(b)) => {
            Value::Bool(a >= b)
        }
        _ => return None,
    };

    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frontend::{SourceFile, parser::Parser},
        middle::ast_lowering,
    };

    fn fold_source(src: &str) -> (Package, ObjectId) {
        let source = SourceFile::from_string(src);
        let expression =
            Parser::parse_expression_source(&source).expect("expression should parse");
        let (mut package, root) =
            ast_lowering::lower_expression(&expression).expect("expression should lower");
        let root = fold_object(&mut package, root);
        (package, root)
    }

    fn folded_value(src: &str) -> Value {
        let (package, root) = fold_source(src);
        let ObjectKind::Constant(value) = package.object(root).kind else {
            panic!("expected '{src}' to fold to a constant, got {:?}", package.object(root));
        };
        value
    }

    #[test]
    fn folds_arithmetic() {
        assert_eq!(folded_value("(+ 1 2 3 4)"), Value::Int(10));
        assert_eq!(folded_value("(* 1 2 3 4)"), Value::Int(24));
        assert_eq!(folded_value("(- 10 1 2)"), Value::Int(7));
        assert_eq!(folded_value("(/ 12 4)"), Value::Int(3));
        assert_eq!(folded_value("(% 7 4)"), Value::Int(3));
        assert_eq!(folded_value("(+ 1 (* 2 3))"), Value::Int(7));
    }

    #[test]
    fn folds_unary() {
        assert_eq!(folded_value("-24"), Value::Int(-24));
        assert_eq!(folded_value("+24"), Value::Int(24));
        assert_eq!(folded_value("-(+ 1 2)"), Value::Int(-3));
    }

    #[test]
    fn arithmetic_wraps_at_32_bits() {
        assert_eq!(folded_value("(+ 2147483647 1)"), Value::Int(i32::MIN));
        assert_eq!(folded_value("(* 65536 65536)"), Value::Int(0));
    }

    #[test]
    fn folds_comparisons() {
        assert_eq!(folded_value("(< 1 2)"), Value::Bool(true));
        assert_eq!(folded_value("(>= 3 4)"), Value::Bool(false));
        assert_eq!(folded_value("(== true true)"), Value::Bool(true));
        assert_eq!(folded_value("(!= 1 1)"), Value::Bool(false));
    }

    #[test]
    fn division_by_constant_zero_is_left_alone() {
        for src in ["(/ 1 0)", "(% 1 0)"] {
            let (package, root) = fold_source(src);
            assert!(
                matches!(package.object(root).kind, ObjectKind::Binary { .. }),
                "expected '{src}' to stay a binary expression"
            );
        }
    }

    #[test]
    fn folding_is_idempotent() {
        let (mut package, root) = fold_source("(+ 1 2)");
        let again = fold_object(&mut package, root);
        assert_eq!(again, root);
        assert!(matches!(
            package.object(root).kind,
            ObjectKind::Constant(Value::Int(3))
        ));
    }

    #[test]
    fn non_constant_operands_keep_the_expression() {
        let source = SourceFile::from_string("(func (a:int):int (+ a 1))");
        let expression =
            Parser::parse_expression_source(&source).expect("expression should parse");
        let (mut package, root) =
            ast_lowering::lower_expression(&expression).expect("expression should lower");
        let root = fold_object(&mut package, root);

        let ObjectKind::Function { ref body, .. } = package.object(root).kind else {
            panic!("expected function root");
        };
        assert!(matches!(
            package.object(body[0]).kind,
            ObjectKind::Binary { .. }
        ));
    }
}
