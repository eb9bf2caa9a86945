//! Análisis sintáctico.
//!
//! Un parser descendente recursivo construye el árbol etiquetado a
//! partir del flujo de tokens. A cada nodo decorable se le asigna aquí
//! su [`NodeId`] denso, en orden de creación; las fases semánticas
//! asumen ese orden como contrato de determinismo.
//!
//! La precedencia de operadores, de mayor a menor: indexación `[]`;
//! `not` `+` `-` unarios; `*` `/` `%`; `+` `-`; relacionales; `and`;
//! `or`. Todos los operadores binarios asocian a la izquierda.

use std::iter::Peekable;

use crate::{
    ast::*,
    lex::{Keyword, Token},
    source::{Located, Location},
};
use thiserror::Error;

/// Error de parseo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    /// El token encontrado no corresponde a lo que la gramática admite.
    #[error("Expected {0}, found {1}")]
    UnexpectedToken(&'static str, Token),

    /// El programa terminó antes de completar una producción.
    #[error("Expected {0}, found end of input")]
    AbruptEnd(&'static str),
}

type Parse<T> = Result<T, Located<ParserError>>;

/// Reduce un flujo de tokens a un [`Program`].
pub fn parse(
    start: Location,
    tokens: impl IntoIterator<Item = Located<Token>>,
) -> Parse<Program> {
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
        last: start,
        ids: NodeIds::default(),
    };

    parser.program()
}

struct Parser<I: Iterator<Item = Located<Token>>> {
    tokens: Peekable<I>,
    last: Location,
    ids: NodeIds,
}

impl<I: Iterator<Item = Located<Token>>> Parser<I> {
    fn program(&mut self) -> Parse<Program> {
        let id = self.ids.alloc();
        let mut functions = Vec::new();

        while self.tokens.peek().is_some() {
            self.expect(Token::Keyword(Keyword::Func), "`func`")?;
            functions.push(self.function()?);
        }

        Ok(Program {
            id,
            functions,
            eof: self.last.clone(),
            node_count: self.ids.count(),
        })
    }

    /// Una función, desde su nombre hasta `endfunc`. El token `func`
    /// ya fue consumido.
    fn function(&mut self) -> Parse<Function> {
        let id = self.ids.alloc();
        let name = self.identifier()?;

        self.expect(Token::OpenParen, "`(`")?;
        let mut params = Vec::new();
        if !self.eat(&Token::CloseParen) {
            loop {
                let name = self.identifier()?;
                self.expect(Token::Colon, "`:`")?;
                let ty = self.type_spec()?;
                params.push(Param { name, ty });

                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::CloseParen, "`)` or `,`")?;
        }

        let ret = if self.eat(&Token::Colon) {
            Some(self.basic_type_spec()?)
        } else {
            None
        };

        let mut decls = Vec::new();
        while self.eat(&Token::Keyword(Keyword::Var)) {
            let mut names = vec![self.identifier()?];
            while self.eat(&Token::Comma) {
                names.push(self.identifier()?);
            }
            self.expect(Token::Colon, "`:`")?;
            let ty = self.type_spec()?;
            decls.push(VarDecl { names, ty });
        }

        let body = self.statements()?;
        self.expect(Token::Keyword(Keyword::Endfunc), "`endfunc`")?;

        Ok(Function {
            id,
            name,
            params,
            ret,
            decls,
            body,
        })
    }

    /// `int | float | bool | char | array [ N ] of basic_type`
    fn type_spec(&mut self) -> Parse<TypeSpec> {
        if let Some(Token::Keyword(Keyword::Array)) = self.peek() {
            let id = self.ids.alloc();
            let start = self.advance().unwrap().split().0;

            self.expect(Token::OpenBracket, "`[`")?;
            let size = match self.advance() {
                Some(token) => match token.as_ref() {
                    Token::IntLiteral(n) => *n,
                    _ => return Err(self.unexpected("an array size", token)),
                },
                None => return Err(self.abrupt("an array size")),
            };
            self.expect(Token::CloseBracket, "`]`")?;
            self.expect(Token::Keyword(Keyword::Of), "`of`")?;

            let elem = self.basic_type()?;
            let location = Location::span(start, &self.last);

            Ok(TypeSpec {
                id,
                location,
                kind: TypeSpecKind::Array { size, elem },
            })
        } else {
            self.basic_type_spec()
        }
    }

    fn basic_type_spec(&mut self) -> Parse<TypeSpec> {
        let id = self.ids.alloc();
        let basic = self.basic_type()?;
        let location = self.last.clone();

        Ok(TypeSpec {
            id,
            location,
            kind: TypeSpecKind::Basic(basic),
        })
    }

    fn basic_type(&mut self) -> Parse<BasicType> {
        match self.advance() {
            Some(token) => match token.as_ref() {
                Token::Keyword(Keyword::Int) => Ok(BasicType::Int),
                Token::Keyword(Keyword::Float) => Ok(BasicType::Float),
                Token::Keyword(Keyword::Bool) => Ok(BasicType::Bool),
                Token::Keyword(Keyword::Char) => Ok(BasicType::Char),
                _ => Err(self.unexpected("a basic type", token)),
            },
            None => Err(self.abrupt("a basic type")),
        }
    }

    /// Sentencias consecutivas hasta el cierre del bloque actual.
    fn statements(&mut self) -> Parse<Vec<Statement>> {
        use Keyword::*;

        let mut statements = Vec::new();
        loop {
            match self.peek() {
                None
                | Some(Token::Keyword(Endfunc))
                | Some(Token::Keyword(Endif))
                | Some(Token::Keyword(Else))
                | Some(Token::Keyword(Endwhile)) => break,

                _ => statements.push(self.statement()?),
            }
        }

        Ok(statements)
    }

    fn statement(&mut self) -> Parse<Statement> {
        use Keyword::*;

        match self.peek() {
            Some(Token::Keyword(If)) => {
                let location = self.advance().unwrap().split().0;
                let condition = self.expr()?;
                self.expect(Token::Keyword(Then), "`then`")?;
                let then_body = self.statements()?;

                let else_body = if self.eat(&Token::Keyword(Else)) {
                    Some(self.statements()?)
                } else {
                    None
                };
                self.expect(Token::Keyword(Endif), "`endif`")?;

                Ok(Statement::If {
                    location,
                    condition,
                    then_body,
                    else_body,
                })
            }

            Some(Token::Keyword(While)) => {
                let location = self.advance().unwrap().split().0;
                let condition = self.expr()?;
                self.expect(Token::Keyword(Do), "`do`")?;
                let body = self.statements()?;
                self.expect(Token::Keyword(Endwhile), "`endwhile`")?;

                Ok(Statement::While {
                    location,
                    condition,
                    body,
                })
            }

            Some(Token::Keyword(Read)) => {
                let location = self.advance().unwrap().split().0;
                let target = self.left_expr()?;
                self.expect(Token::Semicolon, "`;`")?;

                Ok(Statement::Read { location, target })
            }

            Some(Token::Keyword(Write)) => {
                let location = self.advance().unwrap().split().0;

                let statement = if let Some(Token::StringLiteral(_)) = self.peek() {
                    let string = match self.advance().unwrap().into_inner() {
                        Token::StringLiteral(string) => string,
                        _ => unreachable!(),
                    };

                    Statement::WriteString { location, string }
                } else {
                    Statement::WriteExpr {
                        location,
                        expr: self.expr()?,
                    }
                };

                self.expect(Token::Semicolon, "`;`")?;
                Ok(statement)
            }

            Some(Token::Keyword(Return)) => {
                let location = self.advance().unwrap().split().0;

                let expr = if let Some(Token::Semicolon) = self.peek() {
                    None
                } else {
                    Some(self.expr()?)
                };

                self.expect(Token::Semicolon, "`;`")?;
                Ok(Statement::Return { location, expr })
            }

            Some(Token::Id(_)) => {
                let ident = self.identifier_node()?;

                let statement = match self.peek() {
                    // Llamada en posición de sentencia
                    Some(Token::OpenParen) => Statement::ProcCall(self.call(ident)?),

                    // Asignación, con destino simple o indexado
                    _ => {
                        let lhs = self.left_expr_from(ident)?;
                        let assign = self.expect(Token::Assign, "`=`")?;
                        let rhs = self.expr()?;

                        Statement::Assign { assign, lhs, rhs }
                    }
                };

                self.expect(Token::Semicolon, "`;`")?;
                Ok(statement)
            }

            Some(_) => {
                let token = self.advance().unwrap();
                Err(self.unexpected("a statement", token))
            }

            None => Err(self.abrupt("a statement")),
        }
    }

    fn left_expr(&mut self) -> Parse<LeftExpr> {
        let ident = self.identifier_node()?;
        self.left_expr_from(ident)
    }

    fn left_expr_from(&mut self, base: Ident) -> Parse<LeftExpr> {
        let id = self.ids.alloc();
        let start = base.location.clone();

        if self.eat(&Token::OpenBracket) {
            let index = self.expr()?;
            self.expect(Token::CloseBracket, "`]`")?;

            Ok(LeftExpr {
                id,
                location: Location::span(start, &self.last),
                kind: LeftExprKind::Index {
                    base,
                    index: Box::new(index),
                },
            })
        } else {
            Ok(LeftExpr {
                id,
                location: start,
                kind: LeftExprKind::Ident(base),
            })
        }
    }

    fn expr(&mut self) -> Parse<Expr> {
        self.logic_or()
    }

    fn logic_or(&mut self) -> Parse<Expr> {
        let mut lhs = self.logic_and()?;

        while let Some(Token::Keyword(Keyword::Or)) = self.peek() {
            let op = self.advance().unwrap().map(|_| LogicOp::Or);
            let rhs = self.logic_and()?;
            lhs = self.binary(lhs, rhs, op, |op, lhs, rhs| ExprKind::Logic { op, lhs, rhs });
        }

        Ok(lhs)
    }

    fn logic_and(&mut self) -> Parse<Expr> {
        let mut lhs = self.relational()?;

        while let Some(Token::Keyword(Keyword::And)) = self.peek() {
            let op = self.advance().unwrap().map(|_| LogicOp::And);
            let rhs = self.relational()?;
            lhs = self.binary(lhs, rhs, op, |op, lhs, rhs| ExprKind::Logic { op, lhs, rhs });
        }

        Ok(lhs)
    }

    fn relational(&mut self) -> Parse<Expr> {
        let mut lhs = self.additive()?;

        loop {
            let op = match self.peek() {
                Some(Token::Equal) => RelOp::Eq,
                Some(Token::NotEqual) => RelOp::Neq,
                Some(Token::Less) => RelOp::Lt,
                Some(Token::LessEqual) => RelOp::Le,
                Some(Token::Greater) => RelOp::Gt,
                Some(Token::GreaterEqual) => RelOp::Ge,
                _ => break,
            };

            let op = self.advance().unwrap().map(|_| op);
            let rhs = self.additive()?;
            lhs = self.binary(lhs, rhs, op, |op, lhs, rhs| ExprKind::Relational { op, lhs, rhs });
        }

        Ok(lhs)
    }

    fn additive(&mut self) -> Parse<Expr> {
        let mut lhs = self.multiplicative()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => break,
            };

            let op = self.advance().unwrap().map(|_| op);
            let rhs = self.multiplicative()?;
            lhs = self.binary(lhs, rhs, op, |op, lhs, rhs| ExprKind::Arithmetic { op, lhs, rhs });
        }

        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Parse<Expr> {
        let mut lhs = self.unary()?;

        loop {
            let op = match self.peek() {
                Some(Token::Times) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                Some(Token::Percent) => ArithOp::Mod,
                _ => break,
            };

            let op = self.advance().unwrap().map(|_| op);
            let rhs = self.unary()?;
            lhs = self.binary(lhs, rhs, op, |op, lhs, rhs| ExprKind::Arithmetic { op, lhs, rhs });
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Parse<Expr> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => UnaryOp::Minus,
            Some(Token::Keyword(Keyword::Not)) => UnaryOp::Not,
            _ => return self.primary(),
        };

        let id = self.ids.alloc();
        let op = self.advance().unwrap().map(|_| op);
        let expr = self.unary()?;
        let location = Location::span(op.location().clone(), &expr.location);

        Ok(Expr {
            id,
            location,
            kind: ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
        })
    }

    fn primary(&mut self) -> Parse<Expr> {
        match self.peek() {
            Some(Token::OpenParen) => {
                let id = self.ids.alloc();
                let start = self.advance().unwrap().split().0;
                let inner = self.expr()?;
                self.expect(Token::CloseParen, "`)`")?;

                Ok(Expr {
                    id,
                    location: Location::span(start, &self.last),
                    kind: ExprKind::Paren(Box::new(inner)),
                })
            }

            Some(Token::Id(_)) => {
                let id = self.ids.alloc();
                let ident = self.identifier_node()?;
                let start = ident.location.clone();

                match self.peek() {
                    Some(Token::OpenParen) => {
                        let call = self.call(ident)?;

                        Ok(Expr {
                            id,
                            location: call.location.clone(),
                            kind: ExprKind::Call(call),
                        })
                    }

                    Some(Token::OpenBracket) => {
                        self.advance();
                        let index = self.expr()?;
                        self.expect(Token::CloseBracket, "`]`")?;

                        Ok(Expr {
                            id,
                            location: Location::span(start, &self.last),
                            kind: ExprKind::Index {
                                base: ident,
                                index: Box::new(index),
                            },
                        })
                    }

                    _ => Ok(Expr {
                        id,
                        location: start,
                        kind: ExprKind::Ident(ident),
                    }),
                }
            }

            Some(
                Token::IntLiteral(_)
                | Token::FloatLiteral(_)
                | Token::CharLiteral(_)
                | Token::Keyword(Keyword::True)
                | Token::Keyword(Keyword::False),
            ) => {
                let id = self.ids.alloc();
                let (location, token) = self.advance().unwrap().split();

                let literal = match token {
                    Token::IntLiteral(value) => Literal::Int(value),
                    Token::FloatLiteral(text) => Literal::Float(text),
                    Token::CharLiteral(text) => Literal::Char(text),
                    Token::Keyword(Keyword::True) => Literal::Bool(true),
                    Token::Keyword(Keyword::False) => Literal::Bool(false),
                    _ => unreachable!(),
                };

                Ok(Expr {
                    id,
                    location,
                    kind: ExprKind::Value(literal),
                })
            }

            Some(_) => {
                let token = self.advance().unwrap();
                Err(self.unexpected("an expression", token))
            }

            None => Err(self.abrupt("an expression")),
        }
    }

    /// Argumentos de llamada; el `(` aún no fue consumido.
    fn call(&mut self, callee: Ident) -> Parse<Call> {
        let id = self.ids.alloc();
        let start = callee.location.clone();
        self.expect(Token::OpenParen, "`(`")?;

        let mut args = Vec::new();
        if !self.eat(&Token::CloseParen) {
            loop {
                args.push(self.expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::CloseParen, "`)` or `,`")?;
        }

        Ok(Call {
            id,
            location: Location::span(start, &self.last),
            callee,
            args,
        })
    }

    fn identifier(&mut self) -> Parse<Located<String>> {
        match self.advance() {
            Some(token) => {
                let (location, token) = token.split();
                match token {
                    Token::Id(name) => Ok(Located::at(name, location)),
                    token => Err(self.unexpected("an identifier", Located::at(token, location))),
                }
            }
            None => Err(self.abrupt("an identifier")),
        }
    }

    fn identifier_node(&mut self) -> Parse<Ident> {
        let id = self.ids.alloc();
        let (location, name) = self.identifier()?.split();

        Ok(Ident { id, location, name })
    }

    /// Ensambla un nodo binario; la ubicación abarca ambos operandos.
    fn binary<O>(
        &mut self,
        lhs: Expr,
        rhs: Expr,
        op: Located<O>,
        kind: impl FnOnce(Located<O>, Box<Expr>, Box<Expr>) -> ExprKind,
    ) -> Expr {
        let id = self.ids.alloc();
        let location = Location::span(lhs.location.clone(), &rhs.location);

        Expr {
            id,
            location,
            kind: kind(op, Box::new(lhs), Box::new(rhs)),
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.tokens.peek().map(Located::as_ref)
    }

    fn advance(&mut self) -> Option<Located<Token>> {
        let token = self.tokens.next();
        if let Some(token) = &token {
            self.last = token.location().clone();
        }

        token
    }

    /// Consume el siguiente token solo si es exactamente el esperado.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &'static str) -> Parse<Location> {
        match self.advance() {
            Some(token) if *token.as_ref() == expected => Ok(token.split().0),
            Some(token) => Err(self.unexpected(what, token)),
            None => Err(self.abrupt(what)),
        }
    }

    fn unexpected(&self, what: &'static str, token: Located<Token>) -> Located<ParserError> {
        let (location, token) = token.split();
        Located::at(ParserError::UnexpectedToken(what, token), location)
    }

    fn abrupt(&self, what: &'static str) -> Located<ParserError> {
        Located::at(ParserError::AbruptEnd(what), self.last.clone())
    }
}
