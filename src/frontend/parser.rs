use hashbrown::HashMap;

use super::{
    SourceFile,
    ast::{
        BinaryOperator, Definition, Expression, ExpressionKind, File, Identifier, Literal,
        Parameter, UnaryOperator,
    },
    lexer::{Keyword, Lexer, Span, Token, TokenKind},
};
use crate::diagnostics::Diagnostic;

#[derive(Debug)]
pub struct Parser<'source> {
    source: &'source SourceFile,
    lexer: Lexer<'source>,
    token: Token,
    diagnostics: Vec<Diagnostic>,
}

impl<'source> Parser<'source> {
    /// Parses a whole source file: one or more top-level definitions
    pub fn parse_file(source: &'source SourceFile) -> Result<File, Vec<Diagnostic>> {
        let mut parser = Self::new(source);
        let mut definitions: Vec<Definition> = Vec::new();
        let mut declared: HashMap<String, Span> = HashMap::new();

        while parser.token.kind != TokenKind::Eof {
            let before = parser.diagnostics.len();
            let definition = parser.parse_definition();

            // A malformed definition leaves the parser mid-form; skip to the
            // next definition so its errors get reported too
            if parser.diagnostics.len() > before {
                parser.resynchronize();
                continue;
            }

            if let Some(previous) = declared.get(&definition.name.name) {
                parser.error(
                    definition.name.span,
                    format!(
                        "'{}' redeclared; previously declared at {}",
                        definition.name.name,
                        source.format_span_position(*previous)
                    ),
                );
                continue;
            }

            declared.insert(definition.name.name.clone(), definition.name.span);
            definitions.push(definition);
        }

        if definitions.is_empty() && parser.diagnostics.is_empty() {
            parser.error(
                parser.token.span,
                "reached end of file without any definitions",
            );
        }

        if !parser.diagnostics.is_empty() {
            return Err(parser.diagnostics);
        }

        Ok(File { definitions })
    }

    /// Parses a single standalone expression. Intended for testing the
    /// middle passes without wrapping everything in a definition.
    pub fn parse_expression_source(
        source: &'source SourceFile,
    ) -> Result<Expression, Vec<Diagnostic>> {
        let mut parser = Self::new(source);
        let expression = parser.parse_expression();

        if !parser.diagnostics.is_empty() {
            return Err(parser.diagnostics);
        }

        Ok(expression)
    }

    fn new(source: &'source SourceFile) -> Self {
        let mut lexer = Lexer::new(source);
        let token = lexer.next();

        Self {
            source,
            lexer,
            token,
            diagnostics: Vec::new(),
        }
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(span, message));
    }

    fn advance(&mut self) {
        self.token = self.lexer.next();
    }

    /// Skips ahead to what looks like the start of the next top-level
    /// definition. A `(define` nested inside a malformed body fools this,
    /// but those programs are rejected either way.
    fn resynchronize(&mut self) {
        loop {
            match self.token.kind {
                TokenKind::Eof => return,
                TokenKind::OpenParen
                    if self.lexer.peek().kind == TokenKind::Keyword(Keyword::Define) =>
                {
                    return;
                }
                _ => self.advance(),
            }
        }
    }

    fn token_text(&self) -> &str {
        if self.token.kind == TokenKind::Eof {
            return "end of file";
        }
        self.source.value_of_span(self.token.span)
    }

    /// Consumes the current token if it matches, otherwise records an error
    /// and stays put
    fn expect(&mut self, kind: TokenKind, expecting: &str) -> Span {
        let span = self.token.span;

        if self.token.kind != kind {
            let message = format!("expected {} but got '{}'", expecting, self.token_text());
            self.error(span, message);
            return span;
        }

        self.advance();
        span
    }

    fn parse_definition(&mut self) -> Definition {
        let open = self.expect(TokenKind::OpenParen, "'('");
        self.expect(TokenKind::Keyword(Keyword::Define), "'define'");

        let name = self.parse_identifier();
        let ty = (self.token.kind == TokenKind::Colon).then(|| self.parse_type());
        let body = self.parse_expression();

        let close = self.expect(TokenKind::CloseParen, "')'");

        Definition {
            span: open.to(close),
            name,
            ty,
            body,
        }
    }

    fn parse_expression(&mut self) -> Expression {
        let span = self.token.span;

        match self.token.kind {
            TokenKind::OpenParen => self.parse_parenthesized(),
            TokenKind::Identifier => {
                let identifier = self.parse_identifier();
                Expression {
                    span,
                    kind: ExpressionKind::Identifier(identifier),
                }
            }
            TokenKind::BooleanLiteral => {
                let value = self.source.value_of_span(span) == "true";
                self.advance();
                Expression {
                    span,
                    kind: ExpressionKind::Literal(Literal::Boolean(value)),
                }
            }
            TokenKind::IntegerLiteral => {
                // Values are 32 bits wide at runtime, so reject anything
                // wider up front
                let value = match self.source.value_of_span(span).parse::<i32>() {
                    Ok(value) => value,
                    Err(_) => {
                        let message =
                            format!("integer literal '{}' out of range", self.token_text());
                        self.error(span, message);
                        0
                    }
                };
                self.advance();
                Expression {
                    span,
                    kind: ExpressionKind::Literal(Literal::Integer(value)),
                }
            }
            TokenKind::Plus | TokenKind::Minus => {
                let operator = if self.token.kind == TokenKind::Plus {
                    UnaryOperator::Plus
                } else {
                    UnaryOperator::Minus
                };
                self.advance();
                let operand = self.parse_expression();

                Expression {
                    span: span.to(operand.span),
                    kind: ExpressionKind::Unary {
                        operator,
                        operand: Box::new(operand),
                    },
                }
            }
            _ => {
                let message = format!("expected expression, got '{}'", self.token_text());
                self.error(span, message);
                self.advance();
                placeholder(span)
            }
        }
    }

    fn parse_parenthesized(&mut self) -> Expression {
        let open = self.expect(TokenKind::OpenParen, "'('");

        let expression = match self.token.kind {
            kind if kind.is_operator() => self.parse_binary(),
            TokenKind::Equals => self.parse_assignment(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Func) => self.parse_function(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::Var) => self.parse_var_block(),
            TokenKind::Identifier => self.parse_call(),
            _ => {
                let message = format!(
                    "expected operator, keyword or identifier but got '{}'",
                    self.token_text()
                );
                self.error(self.token.span, message);

                // Skip to the closing paren so the file loop can decide what
                // to do next
                while !matches!(self.token.kind, TokenKind::CloseParen | TokenKind::Eof) {
                    self.advance();
                }
                placeholder(open)
            }
        };

        let close = self.expect(TokenKind::CloseParen, "')'");

        Expression {
            span: open.to(close),
            ..expression
        }
    }

    fn parse_binary(&mut self) -> Expression {
        let span = self.token.span;
        let operator = match self.token.kind {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Subtract,
            TokenKind::Asterisk => BinaryOperator::Multiply,
            TokenKind::Divide => BinaryOperator::Divide,
            TokenKind::Modulus => BinaryOperator::Remainder,
            TokenKind::DoubleEquals => BinaryOperator::Equals,
            TokenKind::NotEquals => BinaryOperator::NotEquals,
            TokenKind::LessThan => BinaryOperator::LessThan,
            TokenKind::LessThanOrEqualTo => BinaryOperator::LessThanOrEqualTo,
            TokenKind::GreaterThan => BinaryOperator::GreaterThan,
            TokenKind::GreaterThanOrEqualTo => BinaryOperator::GreaterThanOrEqualTo,
            _ => unreachable!("parse_binary called on a non-operator token"),
        };
        self.advance();

        let operands = self.parse_expression_list();

        if operands.len() < 2 {
            let message = format!("operator '{operator}' expects at least two operands");
            self.error(span, message);
        }

        Expression {
            span,
            kind: ExpressionKind::Binary { operator, operands },
        }
    }

    fn parse_assignment(&mut self) -> Expression {
        let span = self.expect(TokenKind::Equals, "'='");
        let name = self.parse_identifier();
        let value = self.parse_expression();

        Expression {
            span,
            kind: ExpressionKind::Assignment {
                name,
                value: Box::new(value),
            },
        }
    }

    fn parse_call(&mut self) -> Expression {
        let name = self.parse_identifier();
        let arguments = self.parse_expression_list();

        Expression {
            span: name.span,
            kind: ExpressionKind::Call { name, arguments },
        }
    }

    fn parse_if(&mut self) -> Expression {
        let span = self.expect(TokenKind::Keyword(Keyword::If), "'if'");
        let condition = self.parse_expression();
        let ty = self.parse_type();
        let then = self.parse_expression();
        let otherwise = (self.token.kind != TokenKind::CloseParen)
            .then(|| Box::new(self.parse_expression()));

        Expression {
            span,
            kind: ExpressionKind::If {
                ty,
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise,
            },
        }
    }

    fn parse_for(&mut self) -> Expression {
        let span = self.expect(TokenKind::Keyword(Keyword::For), "'for'");
        let condition = self.parse_expression();
        let ty = self.parse_type();
        let body = self.parse_expression_list();

        Expression {
            span,
            kind: ExpressionKind::For {
                ty,
                condition: Box::new(condition),
                body,
            },
        }
    }

    fn parse_function(&mut self) -> Expression {
        let span = self.expect(TokenKind::Keyword(Keyword::Func), "'func'");
        let parameters = self.parse_parameter_list();
        let ty = self.parse_type();
        let body = self.parse_expression_list();

        Expression {
            span,
            kind: ExpressionKind::Function {
                ty,
                parameters,
                body,
            },
        }
    }

    fn parse_var_block(&mut self) -> Expression {
        let span = self.expect(TokenKind::Keyword(Keyword::Var), "'var'");
        let parameters = self.parse_parameter_list();
        let ty = self.parse_type();
        let body = self.parse_expression_list();

        Expression {
            span,
            kind: ExpressionKind::VarBlock {
                ty,
                parameters,
                body,
            },
        }
    }

    fn parse_expression_list(&mut self) -> Vec<Expression> {
        let mut list = Vec::new();

        // One error is enough per list; anything after it is likely noise
        // from the same mistake
        let sound = self.diagnostics.len();
        while !matches!(self.token.kind, TokenKind::CloseParen | TokenKind::Eof)
            && self.diagnostics.len() == sound
        {
            list.push(self.parse_expression());
        }

        list
    }

    /// Parses the optional `(name:type ...)` parameter list of a `func` or
    /// `var` form
    fn parse_parameter_list(&mut self) -> Vec<Parameter> {
        let mut parameters: Vec<Parameter> = Vec::new();

        if self.token.kind != TokenKind::OpenParen {
            return parameters;
        }
        self.advance();

        while !matches!(self.token.kind, TokenKind::CloseParen | TokenKind::Eof) {
            let name = self.parse_identifier();
            let ty = self.parse_type();

            if let Some(previous) = parameters.iter().find(|p| p.name.name == name.name) {
                let message = format!(
                    "duplicate parameter '{}'; previously declared at {}",
                    name.name,
                    self.source.format_span_position(previous.name.span)
                );
                self.error(name.span, message);
                break;
            }

            parameters.push(Parameter { name, ty });
        }
        self.expect(TokenKind::CloseParen, "')'");

        parameters
    }

    fn parse_type(&mut self) -> Identifier {
        self.expect(TokenKind::Colon, "':'");
        self.parse_identifier()
    }

    fn parse_identifier(&mut self) -> Identifier {
        let span = self.token.span;
        let name = if self.token.kind == TokenKind::Identifier {
            self.source.value_of_span(span).to_string()
        } else {
            String::new()
        };

        self.expect(TokenKind::Identifier, "an identifier");

        Identifier { name, span }
    }
}

fn placeholder(span: Span) -> Expression {
    Expression {
        span,
        kind: ExpressionKind::Literal(Literal::Integer(0)),
    }
}
