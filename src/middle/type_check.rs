//! Checks every object of a package against the declared types and fills
//! in the types lowering could not know (references, calls, assignments).
//! Errors accumulate; a type that is already `Unknown` from an earlier
//! error never produces a second, cascaded error.

use hashbrown::HashSet;

use crate::diagnostics::Diagnostic;

use super::{
    ir::{ObjectId, ObjectKind, Package},
    ty::Type,
};

pub fn check(package: &mut Package) -> Vec<Diagnostic> {
    let mut checker = Checker {
        package,
        diagnostics: Vec::new(),
        checked_definitions: HashSet::new(),
        in_progress: Vec::new(),
    };

    let definitions: Vec<ObjectId> = checker
        .package
        .definitions()
        .map(|(_, id)| id)
        .collect();

    for definition in definitions {
        checker.check_definition(definition);
    }

    checker.diagnostics
}

/// Checks a standalone expression object, for testing passes in isolation
pub fn check_object(package: &mut Package, root: ObjectId) -> Vec<Diagnostic> {
    let mut checker = Checker {
        package,
        diagnostics: Vec::new(),
        checked_definitions: HashSet::new(),
        in_progress: Vec::new(),
    };

    checker.check_expression(root);
    checker.diagnostics
}

struct Checker<'package> {
    package: &'package mut Package,
    diagnostics: Vec<Diagnostic>,
    checked_definitions: HashSet<ObjectId>,
    /// Definitions currently being checked, to catch reference cycles
    in_progress: Vec<ObjectId>,
}

impl Checker<'_> {
    fn error(&mut self, id: ObjectId, message: String) {
        let span = self.package.object(id).span;
        self.diagnostics.push(Diagnostic::new(span, message));
    }

    fn check_definition(&mut self, id: ObjectId) -> Type {
        if self.checked_definitions.contains(&id) {
            return self.package.object(id).ty;
        }

        if self.in_progress.contains(&id) {
            let name = self.package.object(id).name.clone();
            self.error(id, format!("definition '{name}' refers to itself"));
            return Type::Unknown;
        }

        self.in_progress.push(id);
        let ObjectKind::Definition { body } = self.package.object(id).kind else {
            unreachable!("top-level bindings are Definition objects");
        };
        let body_ty = self.check_expression(body);
        self.in_progress.pop();
        self.checked_definitions.insert(id);

        let declared = self.package.object(id).ty;
        if declared == Type::Unknown {
            self.package.object_mut(id).ty = body_ty;
            body_ty
        } else {
            if body_ty != Type::Unknown && body_ty != declared {
                let name = self.package.object(id).name.clone();
                self.error(
                    id,
                    format!(
                        "definition '{name}' is of type '{body_ty}' but is declared as \
                         '{declared}'"
                    ),
                );
            }
            declared
        }
    }

    fn check_expression(&mut self, id: ObjectId) -> Type {
        let kind = self.package.object(id).kind.clone();

        let ty = match kind {
            ObjectKind::Constant(_) | ObjectKind::Param => self.package.object(id).ty,
            ObjectKind::VariableRef => {
                let scope = self.package.object(id).scope;
                let name = self.package.object(id).name.clone();

                match self.package.scopes.lookup(scope, &name) {
                    Some(target) => match self.package.object(target).kind {
                        ObjectKind::Definition { body } => {
                            if matches!(
                                self.package.object(body).kind,
                                ObjectKind::Function { .. }
                            ) {
                                self.error(
                                    id,
                                    format!("'{name}' is a function, not a variable"),
                                );
                                Type::Unknown
                            } else {
                                self.check_definition(target)
                            }
                        }
                        _ => self.package.object(target).ty,
                    },
                    None => {
                        self.error(id, format!("undeclared variable '{name}'"));
                        Type::Unknown
                    }
                }
            }
            ObjectKind::Unary { operator, operand } => {
                let operand_ty = self.check_expression(operand);
                if operand_ty != Type::Unknown && operand_ty != Type::Int {
                    self.error(
                        id,
                        format!(
                            "unary operator '{operator}' expects an operand of type 'int' \
                             but got '{operand_ty}'"
                        ),
                    );
                }
                Type::Int
            }
            ObjectKind::Binary { operator, lhs, rhs } => {
                let lhs_ty = self.check_expression(lhs);
                let rhs_ty = self.check_expression(rhs);

                // Equality is defined over both types; every other operator
                // works on integers only
                let expected = if operator.is_equality() && lhs_ty == Type::Bool {
                    Type::Bool
                } else {
                    Type::Int
                };

                for operand_ty in [lhs_ty, rhs_ty] {
                    if operand_ty != Type::Unknown && operand_ty != expected {
                        self.error(
                            id,
                            format!(
                                "operator '{operator}' expects operands of type \
                                 '{expected}' but got '{operand_ty}'"
                            ),
                        );
                    }
                }

                self.package.object(id).ty
            }
            ObjectKind::Assignment { value } => {
                let value_ty = self.check_expression(value);
                let scope = self.package.object(id).scope;
                let name = self.package.object(id).name.clone();

                match self.package.scopes.lookup(scope, &name) {
                    // Only locals and parameters are assignable; definitions
                    // would have no storage behind the name
                    Some(target)
                        if !matches!(self.package.object(target).kind, ObjectKind::Param) =>
                    {
                        self.error(
                            id,
                            format!("cannot assign to '{name}'; it is not a variable"),
                        );
                    }
                    Some(target) => {
                        let target_ty = self.package.object(target).ty;
                        if target_ty == Type::Unknown {
                            self.package.object_mut(target).ty = value_ty;
                        } else if value_ty != Type::Unknown && value_ty != target_ty {
                            self.error(
                                id,
                                format!(
                                    "cannot assign value of type '{value_ty}' to '{name}' \
                                     of type '{target_ty}'"
                                ),
                            );
                        }
                    }
                    None => {
                        self.error(id, format!("undeclared variable '{name}'"));
                    }
                }

                value_ty
            }
            ObjectKind::Call { arguments } => self.check_call(id, &arguments),
            ObjectKind::If {
                condition,
                then,
                otherwise,
            } => {
                let condition_ty = self.check_expression(condition);
                if condition_ty != Type::Unknown && condition_ty != Type::Bool {
                    self.error(
                        id,
                        format!(
                            "if condition is of type '{condition_ty}' but expects type \
                             'bool'"
                        ),
                    );
                }

                let want = self.package.object(id).ty;
                let then_ty = self.check_expression(then);
                self.check_result_type(id, "then branch", then_ty, want);

                if let Some(otherwise) = otherwise {
                    let otherwise_ty = self.check_expression(otherwise);
                    self.check_result_type(id, "else branch", otherwise_ty, want);
                }

                want
            }
            ObjectKind::For { condition, body } => {
                let condition_ty = self.check_expression(condition);
                if condition_ty != Type::Unknown && condition_ty != Type::Bool {
                    self.error(
                        id,
                        format!(
                            "for condition is of type '{condition_ty}' but expects type \
                             'bool'"
                        ),
                    );
                }

                let want = self.package.object(id).ty;
                self.check_body(id, "for loop", &body, want);
                want
            }
            ObjectKind::Function { body, .. } => {
                let want = self.package.object(id).ty;
                self.check_body(id, "function", &body, want);
                want
            }
            ObjectKind::VarBlock { body, .. } => {
                let want = self.package.object(id).ty;
                self.check_body(id, "var block", &body, want);
                want
            }
            ObjectKind::Definition { .. } => self.check_definition(id),
        };

        self.package.object_mut(id).ty = ty;
        ty
    }

    fn check_call(&mut self, id: ObjectId, arguments: &[ObjectId]) -> Type {
        let scope = self.package.object(id).scope;
        let name = self.package.object(id).name.clone();

        let argument_tys: Vec<Type> = arguments
            .iter()
            .map(|&argument| self.check_expression(argument))
            .collect();

        let Some(mut target) = self.package.scopes.lookup(scope, &name) else {
            self.error(id, format!("calling undeclared function '{name}'"));
            return Type::Unknown;
        };

        if let ObjectKind::Definition { body } = self.package.object(target).kind {
            target = body;
        }

        let ObjectKind::Function { ref parameters, .. } = self.package.object(target).kind
        else {
            self.error(id, format!("'{name}' is not a function"));
            return Type::Unknown;
        };
        let parameters = parameters.clone();

        if parameters.len() != arguments.len() {
            self.error(
                id,
                format!(
                    "function '{name}' expects {} arguments but got {}",
                    parameters.len(),
                    arguments.len()
                ),
            );
        }

        for (index, (&parameter, &argument_ty)) in
            parameters.iter().zip(&argument_tys).enumerate()
        {
            let parameter_ty = self.package.object(parameter).ty;
            if argument_ty != Type::Unknown && argument_ty != parameter_ty {
                self.error(
                    id,
                    format!(
                        "argument {} of '{name}' is of type '{argument_ty}' but expects \
                         type '{parameter_ty}'",
                        index + 1
                    ),
                );
            }
        }

        self.package.object(target).ty
    }

    fn check_body(&mut self, id: ObjectId, what: &str, body: &[ObjectId], want: Type) {
        let mut last = Type::Unknown;
        let mut has_last = false;

        for &expression in body {
            last = self.check_expression(expression);
            has_last = true;
        }

        if has_last {
            self.check_result_type(id, what, last, want);
        }
    }

    fn check_result_type(&mut self, id: ObjectId, what: &str, got: Type, want: Type) {
        if got != Type::Unknown && want != Type::Unknown && got != want {
            self.error(
                id,
                format!(
                    "last expression of {what} is of type '{got}' but expects type '{want}'"
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frontend::{SourceFile, parser::Parser},
        middle::ast_lowering,
    };

    fn check_expression_source(src: &str) -> Vec<Diagnostic> {
        let source = SourceFile::from_string(src);
        let expression =
            Parser::parse_expression_source(&source).expect("expression should parse");
        let (mut package, root) =
            ast_lowering::lower_expression(&expression).expect("expression should lower");
        check_object(&mut package, root)
    }

    fn check_file_source(src: &str) -> Vec<Diagnostic> {
        let source = SourceFile::from_string(src);
        let file = Parser::parse_file(&source).expect("file should parse");
        let mut package = ast_lowering::lower_file(&file, "main").expect("file should lower");
        check(&mut package)
    }

    #[test]
    fn accepts_well_typed_programs() {
        for src in [
            "(define main (func:int 42))",
            "(define main (func:int (+ 1 2 3)))",
            "(define add (func (a:int b:int):int (+ a b)))\
             (define main (func:int (add 1 2)))",
            "(define main (func:int (if (< 1 2):int 1 0)))",
            "(define main (func:int (var (a:int):int (= a 5) a)))",
            "(define main (func:bool (== true false)))",
        ] {
            assert_eq!(check_file_source(src), vec![], "source: {src}");
        }
    }

    #[test]
    fn rejects_undeclared_variable() {
        let diagnostics = check_expression_source("(+ a 1)");
        assert_eq!(diagnostics[0].message, "undeclared variable 'a'");
    }

    #[test]
    fn rejects_undeclared_function() {
        let diagnostics = check_file_source("(define main (func:int (missing 1)))");
        assert_eq!(
            diagnostics[0].message,
            "calling undeclared function 'missing'"
        );
    }

    #[test]
    fn rejects_boolean_arithmetic() {
        let diagnostics = check_expression_source("(+ 1 true)");
        assert_eq!(
            diagnostics[0].message,
            "operator '+' expects operands of type 'int' but got 'bool'"
        );
    }

    #[test]
    fn allows_boolean_equality_but_not_ordering() {
        assert_eq!(check_expression_source("(== true true)"), vec![]);
        assert_eq!(check_expression_source("(!= true false)"), vec![]);

        let diagnostics = check_expression_source("(< true false)");
        assert_eq!(
            diagnostics[0].message,
            "operator '<' expects operands of type 'int' but got 'bool'"
        );
    }

    #[test]
    fn rejects_integer_if_condition() {
        let diagnostics = check_file_source("(define main (func:int (if 1:int 2)))");
        assert_eq!(
            diagnostics[0].message,
            "if condition is of type 'int' but expects type 'bool'"
        );
    }

    #[test]
    fn rejects_mismatched_function_result() {
        let diagnostics = check_file_source("(define main (func:int (< 1 2)))");
        assert_eq!(
            diagnostics[0].message,
            "last expression of function is of type 'bool' but expects type 'int'"
        );
    }

    #[test]
    fn rejects_wrong_arity_and_argument_type() {
        let diagnostics = check_file_source(
            "(define add (func (a:int b:int):int (+ a b)))\
             (define main (func:int (add 1)))",
        );
        assert_eq!(
            diagnostics[0].message,
            "function 'add' expects 2 arguments but got 1"
        );

        let diagnostics = check_file_source(
            "(define add (func (a:int b:int):int (+ a b)))\
             (define main (func:int (add 1 true)))",
        );
        assert_eq!(
            diagnostics[0].message,
            "argument 2 of 'add' is of type 'bool' but expects type 'int'"
        );
    }

    #[test]
    fn rejects_mismatched_assignment() {
        let diagnostics = check_file_source(
            "(define main (func:int (var (a:int):int (= a true) a)))",
        );
        assert_eq!(
            diagnostics[0].message,
            "cannot assign value of type 'bool' to 'a' of type 'int'"
        );
    }

    #[test]
    fn rejects_assignment_to_definitions() {
        let diagnostics = check_file_source(
            "(define f (func:int 1))(define main (func:int (= f 2)))",
        );
        assert_eq!(
            diagnostics[0].message,
            "cannot assign to 'f'; it is not a variable"
        );

        let diagnostics =
            check_file_source("(define x 42)(define main (func:int (= x 2)))");
        assert_eq!(
            diagnostics[0].message,
            "cannot assign to 'x'; it is not a variable"
        );
    }

    #[test]
    fn resolves_value_definitions_forward() {
        assert_eq!(
            check_file_source(
                "(define main (func:int answer))(define answer 42)"
            ),
            vec![]
        );
    }

    #[test]
    fn rejects_definition_cycles() {
        let diagnostics = check_file_source("(define a b)(define b a)");
        assert!(diagnostics[0].message.contains("refers to itself"));
    }

    #[test]
    fn empty_function_body_is_accepted() {
        assert_eq!(check_file_source("(define main (func:int))"), vec![]);
    }
}
