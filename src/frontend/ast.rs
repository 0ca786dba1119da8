use strum::Display;

use super::lexer::Span;

/// A single parsed source file: a list of top-level definitions
#[derive(Debug)]
pub struct File {
    pub definitions: Vec<Definition>,
}

/// `(define name[:type] body)`
#[derive(Debug)]
pub struct Definition {
    pub span: Span,
    pub name: Identifier,
    pub ty: Option<Identifier>,
    pub body: Expression,
}

#[derive(Debug, Clone)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

#[derive(Debug)]
pub struct Parameter {
    pub name: Identifier,
    pub ty: Identifier,
}

#[derive(Debug)]
pub struct Expression {
    pub span: Span,
    pub kind: ExpressionKind,
}

#[derive(Debug)]
pub enum ExpressionKind {
    Literal(Literal),
    /// A bare identifier referencing a parameter, local or definition
    Identifier(Identifier),
    /// `-expr` / `+expr`
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    /// `(op a b c ...)` with two or more operands
    Binary {
        operator: BinaryOperator,
        operands: Vec<Expression>,
    },
    /// `(= name expr)`
    Assignment {
        name: Identifier,
        value: Box<Expression>,
    },
    /// `(name args...)`
    Call {
        name: Identifier,
        arguments: Vec<Expression>,
    },
    /// `(if cond:type then [else])`
    If {
        ty: Identifier,
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Option<Box<Expression>>,
    },
    /// `(for cond:type body...)`
    For {
        ty: Identifier,
        condition: Box<Expression>,
        body: Vec<Expression>,
    },
    /// `(func [(params)]:type body...)`
    Function {
        ty: Identifier,
        parameters: Vec<Parameter>,
        body: Vec<Expression>,
    },
    /// `(var [(params)]:type body...)`
    VarBlock {
        ty: Identifier,
        parameters: Vec<Parameter>,
        body: Vec<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Integer(i32),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOperator {
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Remainder,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanOrEqualTo,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanOrEqualTo,
}

impl BinaryOperator {
    /// Operators producing an `int` result (as opposed to a `bool` one)
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Remainder
        )
    }

    pub fn is_comparison(&self) -> bool {
        !self.is_arithmetic()
    }

    /// `==` or `!=`, the only comparisons defined over booleans
    pub fn is_equality(&self) -> bool {
        matches!(self, Self::Equals | Self::NotEquals)
    }
}
