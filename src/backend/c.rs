//! The portable C backend. Functions are emitted as `f<identity>` with a
//! function-pointer alias carrying the user-visible `_name`, so forward
//! references need no ordering analysis: one pass declares everything, a
//! second emits the bodies. Compound expressions that need statements
//! (assignments, conditionals, loops, var blocks) emit those statements
//! first and evaluate to a named temporary.

use itertools::Itertools;

use crate::middle::{
    ir::{ObjectId, ObjectKind, Package},
    ty::Type,
};

pub fn generate(package: &Package) -> String {
    let mut generator = CGenerator {
        package,
        out: String::new(),
    };
    generator.gen_package();
    generator.out
}

fn c_type(ty: Type) -> &'static str {
    match ty {
        Type::Int => "int32_t",
        Type::Bool => "bool",
        Type::Unknown => "int",
    }
}

struct CGenerator<'package> {
    package: &'package Package,
    out: String,
}

impl CGenerator<'_> {
    fn emit(&mut self, line: impl AsRef<str>) {
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    fn gen_package(&mut self) {
        self.emit("#include <stdio.h>");
        self.emit("#include <stdint.h>");
        self.emit("#include <stdbool.h>");
        self.emit("");

        let functions: Vec<(String, ObjectId)> = self
            .package
            .definitions()
            .filter_map(|(name, id)| {
                let ObjectKind::Definition { body } = self.package.object(id).kind else {
                    return None;
                };
                matches!(self.package.object(body).kind, ObjectKind::Function { .. })
                    .then(|| (name.to_string(), body))
            })
            .collect();

        for (name, function) in &functions {
            self.emit(format!("{};", self.signature(*function)));
            self.emit(format!(
                "{} (*_{name})({}) = f{};",
                c_type(self.package.object(*function).ty),
                self.parameter_types(*function),
                self.package.object(*function).id
            ));
        }
        self.emit("");

        self.emit("int main(void) {");
        self.emit("printf(\"%d\\n\", _main());");
        self.emit("return 0;");
        self.emit("}");

        for (_, function) in &functions {
            self.emit("");
            self.gen_function(*function);
        }
    }

    fn signature(&self, function: ObjectId) -> String {
        let ObjectKind::Function { ref parameters, .. } = self.package.object(function).kind
        else {
            unreachable!("signatures are only built for functions");
        };

        let parameters = if parameters.is_empty() {
            "void".to_string()
        } else {
            parameters
                .iter()
                .map(|&parameter| {
                    let object = self.package.object(parameter);
                    format!("{} {}{}", c_type(object.ty), object.name, object.id)
                })
                .join(", ")
        };

        format!(
            "{} f{}({parameters})",
            c_type(self.package.object(function).ty),
            self.package.object(function).id
        )
    }

    fn parameter_types(&self, function: ObjectId) -> String {
        let ObjectKind::Function { ref parameters, .. } = self.package.object(function).kind
        else {
            unreachable!();
        };

        if parameters.is_empty() {
            return "void".to_string();
        }

        parameters
            .iter()
            .map(|&parameter| c_type(self.package.object(parameter).ty))
            .join(", ")
    }

    fn gen_function(&mut self, function: ObjectId) {
        let ObjectKind::Function { ref body, .. } = self.package.object(function).kind else {
            unreachable!("only functions are emitted");
        };
        let body = body.clone();

        self.emit(format!("{} {{", self.signature(function)));

        match body.split_last() {
            None => self.emit("return 0;"),
            Some((&last, rest)) => {
                for &expression in rest {
                    let value = self.gen_object(expression);
                    self.emit(format!("{value};"));
                }
                let value = self.gen_object(last);
                self.emit(format!("return {value};"));
            }
        }

        self.emit("}");
    }

    /// Emits any statements the object needs and returns the C expression
    /// for its value
    fn gen_object(&mut self, id: ObjectId) -> String {
        match self.package.object(id).kind.clone() {
            ObjectKind::Constant(value) => value.to_string(),
            ObjectKind::VariableRef => self.resolved_name(id),
            ObjectKind::Unary { operator, operand } => {
                let operand = self.gen_object(operand);
                format!("({operator}{operand})")
            }
            ObjectKind::Binary { operator, lhs, rhs } => {
                let lhs = self.gen_object(lhs);
                let rhs = self.gen_object(rhs);
                format!("({lhs} {operator} {rhs})")
            }
            ObjectKind::Assignment { value } => {
                let target = self.resolved_name(id);
                let value = self.gen_object(value);
                self.emit(format!("{target} = {value};"));
                target
            }
            ObjectKind::Call { arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|&argument| self.gen_object(argument))
                    .join(", ");
                format!("_{}({arguments})", self.package.object(id).name)
            }
            ObjectKind::If {
                condition,
                then,
                otherwise,
            } => {
                let object = self.package.object(id);
                let (identity, ty) = (object.id, object.ty);
                self.emit(format!("{} if{identity} = 0;", c_type(ty)));

                let condition = self.gen_object(condition);
                self.emit(format!("if ({condition}) {{"));
                let then = self.gen_object(then);
                self.emit(format!("if{identity} = {then};"));
                if let Some(otherwise) = otherwise {
                    self.emit("} else {");
                    let otherwise = self.gen_object(otherwise);
                    self.emit(format!("if{identity} = {otherwise};"));
                }
                self.emit("}");

                format!("if{identity}")
            }
            ObjectKind::For { condition, body } => {
                let object = self.package.object(id);
                let (identity, ty) = (object.id, object.ty);
                self.emit(format!("{} for{identity} = 0;", c_type(ty)));

                let condition = self.gen_object(condition);
                self.emit(format!("while ({condition}) {{"));
                match body.split_last() {
                    None => {}
                    Some((&last, rest)) => {
                        for &expression in rest {
                            let value = self.gen_object(expression);
                            self.emit(format!("{value};"));
                        }
                        let value = self.gen_object(last);
                        self.emit(format!("for{identity} = {value};"));
                    }
                }
                self.emit("}");

                format!("for{identity}")
            }
            ObjectKind::VarBlock { parameters, body } => {
                let object = self.package.object(id);
                let (identity, ty) = (object.id, object.ty);
                self.emit(format!("{} var{identity} = 0;", c_type(ty)));

                for &parameter in &parameters {
                    let object = self.package.object(parameter);
                    self.emit(format!(
                        "{} {}{} = 0;",
                        c_type(object.ty),
                        object.name,
                        object.id
                    ));
                }

                match body.split_last() {
                    None => {}
                    Some((&last, rest)) => {
                        for &expression in rest {
                            let value = self.gen_object(expression);
                            self.emit(format!("{value};"));
                        }
                        let value = self.gen_object(last);
                        self.emit(format!("var{identity} = {value};"));
                    }
                }

                format!("var{identity}")
            }
            ObjectKind::Param => {
                let object = self.package.object(id);
                format!("{}{}", object.name, object.id)
            }
            ObjectKind::Function { .. } | ObjectKind::Definition { .. } => {
                unreachable!("not an expression")
            }
        }
    }

    /// Name of whatever a reference or assignment resolves to
    fn resolved_name(&self, id: ObjectId) -> String {
        let object = self.package.object(id);
        let target = self
            .package
            .scopes
            .lookup(object.scope, &object.name)
            .unwrap_or_else(|| unreachable!("checked programs resolve every name"));
        let target = self.package.object(target);
        format!("{}{}", target.name, target.id)
    }
}
