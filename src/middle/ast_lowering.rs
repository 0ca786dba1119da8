//! Lowers the parsed AST into the flat object arena. N-ary operator forms
//! become left-associated chains of binary objects, scopes are built for
//! `func` and `var` forms, and type annotations are resolved to concrete
//! types here so later passes never see a type name again.

use crate::{
    diagnostics::Diagnostic,
    frontend::{
        ast::{Definition, Expression, ExpressionKind, File, Identifier, Literal, Parameter},
        lexer::Span,
    },
};

use super::{
    ir::{Object, ObjectId, ObjectKind, Package, Value},
    scope::ScopeId,
    ty::Type,
};

/// Lowers a whole file. The resulting package has one `Definition` object
/// per top-level form, bound in its top scope in declaration order.
pub fn lower_file(file: &File, package_name: &str) -> Result<Package, Vec<Diagnostic>> {
    let mut lowerer = Lowerer {
        package: Package::new(package_name),
        diagnostics: Vec::new(),
    };

    // Declare every definition up front so bodies can refer to later ones
    let mut ids = Vec::with_capacity(file.definitions.len());
    for definition in &file.definitions {
        ids.push(lowerer.declare_definition(definition));
    }

    for (definition, id) in file.definitions.iter().zip(ids) {
        let top = lowerer.package.top;
        let body = lowerer.lower_expression(&definition.body, top);
        let ObjectKind::Definition { body: slot } = &mut lowerer.package.object_mut(id).kind
        else {
            unreachable!("declared definitions are Definition objects");
        };
        *slot = body;
    }

    if !lowerer.diagnostics.is_empty() {
        return Err(lowerer.diagnostics);
    }

    Ok(lowerer.package)
}

/// Lowers a single expression into a fresh package, returning the root
/// object. Intended for testing individual passes.
pub fn lower_expression(
    expression: &Expression,
) -> Result<(Package, ObjectId), Vec<Diagnostic>> {
    let mut lowerer = Lowerer {
        package: Package::new("main"),
        diagnostics: Vec::new(),
    };

    let top = lowerer.package.top;
    let root = lowerer.lower_expression(expression, top);

    if !lowerer.diagnostics.is_empty() {
        return Err(lowerer.diagnostics);
    }

    Ok((lowerer.package, root))
}

struct Lowerer {
    package: Package,
    diagnostics: Vec<Diagnostic>,
}

impl Lowerer {
    fn declare_definition(&mut self, definition: &Definition) -> ObjectId {
        let ty = definition
            .ty
            .as_ref()
            .map(|ty| self.resolve_type(ty))
            .unwrap_or(Type::Unknown);

        // The body slot is patched once the body itself is lowered
        let placeholder = self.package.objects.next_index();
        let id = self.package.objects.push(Object {
            kind: ObjectKind::Definition { body: placeholder },
            name: definition.name.name.clone(),
            span: definition.span,
            ty,
            id: 0,
            scope: self.package.top,
        });

        let top = self.package.top;
        self.package.scopes.insert(top, &definition.name.name, id);

        id
    }

    fn lower_expression(&mut self, expression: &Expression, scope: ScopeId) -> ObjectId {
        let span = expression.span;

        match &expression.kind {
            ExpressionKind::Literal(literal) => {
                let (value, ty) = match *literal {
                    Literal::Integer(value) => (Value::Int(value), Type::Int),
                    Literal::Boolean(value) => (Value::Bool(value), Type::Bool),
                };

                self.push(ObjectKind::Constant(value), String::new(), span, ty, scope)
            }
            ExpressionKind::Identifier(identifier) => self.push(
                ObjectKind::VariableRef,
                identifier.name.clone(),
                span,
                Type::Unknown,
                scope,
            ),
            ExpressionKind::Unary { operator, operand } => {
                let operand = self.lower_expression(operand, scope);
                self.push(
                    ObjectKind::Unary {
                        operator: *operator,
                        operand,
                    },
                    String::new(),
                    span,
                    Type::Int,
                    scope,
                )
            }
            ExpressionKind::Binary { operator, operands } => {
                // (op a b c) lowers as ((a op b) op c)
                let mut lhs = self.lower_expression(&operands[0], scope);
                let ty = if operator.is_arithmetic() {
                    Type::Int
                } else {
                    Type::Bool
                };

                for operand in &operands[1..] {
                    let rhs = self.lower_expression(operand, scope);
                    lhs = self.push(
                        ObjectKind::Binary {
                            operator: *operator,
                            lhs,
                            rhs,
                        },
                        String::new(),
                        span,
                        ty,
                        scope,
                    );
                }

                lhs
            }
            ExpressionKind::Assignment { name, value } => {
                let value = self.lower_expression(value, scope);
                self.push(
                    ObjectKind::Assignment { value },
                    name.name.clone(),
                    span,
                    Type::Unknown,
                    scope,
                )
            }
            ExpressionKind::Call { name, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.lower_expression(argument, scope))
                    .collect();

                self.push(
                    ObjectKind::Call { arguments },
                    name.name.clone(),
                    span,
                    Type::Unknown,
                    scope,
                )
            }
            ExpressionKind::If {
                ty,
                condition,
                then,
                otherwise,
            } => {
                let ty = self.resolve_type(ty);
                let condition = self.lower_expression(condition, scope);
                let then = self.lower_expression(then, scope);
                let otherwise = otherwise
                    .as_ref()
                    .map(|otherwise| self.lower_expression(otherwise, scope));

                self.push(
                    ObjectKind::If {
                        condition,
                        then,
                        otherwise,
                    },
                    String::new(),
                    span,
                    ty,
                    scope,
                )
            }
            ExpressionKind::For {
                ty,
                condition,
                body,
            } => {
                let ty = self.resolve_type(ty);
                let condition = self.lower_expression(condition, scope);
                let body = body
                    .iter()
                    .map(|expression| self.lower_expression(expression, scope))
                    .collect();

                self.push(
                    ObjectKind::For { condition, body },
                    String::new(),
                    span,
                    ty,
                    scope,
                )
            }
            ExpressionKind::Function {
                ty,
                parameters,
                body,
            } => {
                let ty = self.resolve_type(ty);
                let inner = self.package.scopes.new_scope(Some(scope));
                let parameters = self.lower_parameters(parameters, inner);
                let body = body
                    .iter()
                    .map(|expression| self.lower_expression(expression, inner))
                    .collect();

                self.push(
                    ObjectKind::Function { parameters, body },
                    String::new(),
                    span,
                    ty,
                    scope,
                )
            }
            ExpressionKind::VarBlock {
                ty,
                parameters,
                body,
            } => {
                let ty = self.resolve_type(ty);
                let inner = self.package.scopes.new_scope(Some(scope));
                let parameters = self.lower_parameters(parameters, inner);
                let body = body
                    .iter()
                    .map(|expression| self.lower_expression(expression, inner))
                    .collect();

                self.push(
                    ObjectKind::VarBlock { parameters, body },
                    String::new(),
                    span,
                    ty,
                    scope,
                )
            }
        }
    }

    fn lower_parameters(&mut self, parameters: &[Parameter], scope: ScopeId) -> Vec<ObjectId> {
        parameters
            .iter()
            .map(|parameter| {
                let ty = self.resolve_type(&parameter.ty);
                let id = self.push(
                    ObjectKind::Param,
                    parameter.name.name.clone(),
                    parameter.name.span,
                    ty,
                    scope,
                );
                self.package.scopes.insert(scope, &parameter.name.name, id);
                id
            })
            .collect()
    }

    fn resolve_type(&mut self, identifier: &Identifier) -> Type {
        match Type::from_name(&identifier.name) {
            Some(ty) => ty,
            None => {
                self.diagnostics.push(Diagnostic::new(
                    identifier.span,
                    format!("unknown type '{}'", identifier.name),
                ));
                Type::Unknown
            }
        }
    }

    fn push(
        &mut self,
        kind: ObjectKind,
        name: String,
        span: Span,
        ty: Type,
        scope: ScopeId,
    ) -> ObjectId {
        self.package.objects.push(Object {
            kind,
            name,
            span,
            ty,
            id: 0,
            scope,
        })
    }
}
