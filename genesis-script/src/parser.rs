//! Recursive-descent parser
//!
//! Builds the AST from the token stream. Expression parsing is a Pratt
//! loop over binding powers; statement and top-level parsing is plain
//! descent. All errors carry the offending token's line and column.

use crate::ast::*;
use crate::error::{ScriptError, ScriptResult};
use crate::lexer::{Lexeme, Lexer, Token};

pub struct Parser {
    tokens: Vec<Lexeme>,
    pos: usize,
}

/// Parses a full source file.
pub fn parse(source: &str) -> ScriptResult<Source> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser { tokens, pos: 0 }.source()
}

/// Parses a standalone expression (conditions strings, system parameter
/// authorization expressions).
pub fn parse_expr(source: &str) -> ScriptResult<Expr> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.error(format!("trailing input {:?}", other))),
    }
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn here(&self) -> (u32, u32) {
        let l = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        (l.line, l.column)
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        let (line, column) = self.here();
        ScriptError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    fn expect(&mut self, want: Token) -> ScriptResult<()> {
        if *self.peek() == want {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", want, self.peek())))
        }
    }

    fn ident(&mut self) -> ScriptResult<String> {
        match self.bump() {
            Token::Ident(name) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {:?}", other))),
        }
    }

    fn type_name(&mut self) -> ScriptResult<Type> {
        let (line, column) = self.here();
        let name = self.ident()?;
        Type::parse(&name).ok_or(ScriptError::Parse {
            line,
            column,
            message: format!("unknown type {}", name),
        })
    }

    // --- top level ---

    fn source(&mut self) -> ScriptResult<Source> {
        let mut out = Source::default();
        loop {
            match self.peek() {
                Token::Eof => return Ok(out),
                Token::Contract => out.contracts.push(self.contract()?),
                Token::Func => out.funcs.push(self.func()?),
                other => {
                    return Err(self.error(format!(
                        "expected contract or func at top level, found {:?}",
                        other
                    )))
                }
            }
        }
    }

    fn contract(&mut self) -> ScriptResult<ContractDecl> {
        let (line, _) = self.here();
        self.expect(Token::Contract)?;
        let name = self.ident()?;
        self.expect(Token::LBrace)?;

        let mut decl = ContractDecl {
            name,
            data: Vec::new(),
            conditions: Vec::new(),
            action: Vec::new(),
            settings: Vec::new(),
            line,
        };

        while *self.peek() != Token::RBrace {
            match self.bump() {
                Token::Data => decl.data = self.data_block()?,
                Token::Conditions => decl.conditions = self.block()?,
                Token::Action => decl.action = self.block()?,
                Token::Settings => decl.settings = self.settings_block()?,
                other => {
                    return Err(self.error(format!(
                        "expected data, conditions, action or settings, found {:?}",
                        other
                    )))
                }
            }
        }
        self.expect(Token::RBrace)?;
        Ok(decl)
    }

    fn data_block(&mut self) -> ScriptResult<Vec<DataField>> {
        self.expect(Token::LBrace)?;
        let mut fields = Vec::new();
        while *self.peek() != Token::RBrace {
            let name = self.ident()?;
            let ty = self.type_name()?;
            let mut tags = Vec::new();
            if let Token::Str(tag) = self.peek() {
                tags = tag
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                self.bump();
            }
            if *self.peek() == Token::Comma {
                self.bump();
            }
            fields.push(DataField { name, ty, tags });
        }
        self.expect(Token::RBrace)?;
        Ok(fields)
    }

    fn settings_block(&mut self) -> ScriptResult<Vec<(String, Expr)>> {
        self.expect(Token::LBrace)?;
        let mut out = Vec::new();
        while *self.peek() != Token::RBrace {
            let name = self.ident()?;
            self.expect(Token::Assign)?;
            let value = self.expr()?;
            if *self.peek() == Token::Comma {
                self.bump();
            }
            out.push((name, value));
        }
        self.expect(Token::RBrace)?;
        Ok(out)
    }

    fn func(&mut self) -> ScriptResult<FuncDecl> {
        let (line, _) = self.here();
        self.expect(Token::Func)?;
        let name = self.ident()?;
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        while *self.peek() != Token::RParen {
            let pname = self.ident()?;
            let ty = self.type_name()?;
            params.push((pname, ty));
            if *self.peek() == Token::Comma {
                self.bump();
            }
        }
        self.expect(Token::RParen)?;

        let returns = match self.peek() {
            Token::LBrace => None,
            _ => Some(self.type_name()?),
        };
        let body = self.block()?;
        Ok(FuncDecl {
            name,
            params,
            returns,
            body,
            line,
        })
    }

    // --- statements ---

    fn block(&mut self) -> ScriptResult<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while *self.peek() != Token::RBrace {
            stmts.push(self.stmt()?);
        }
        self.expect(Token::RBrace)?;
        Ok(stmts)
    }

    fn stmt(&mut self) -> ScriptResult<Stmt> {
        match self.peek().clone() {
            Token::Var => {
                self.bump();
                let mut decls = Vec::new();
                loop {
                    let name = self.ident()?;
                    let ty = self.type_name()?;
                    decls.push((name, ty));
                    if *self.peek() == Token::Comma {
                        self.bump();
                    } else {
                        break;
                    }
                }
                Ok(Stmt::Var(decls))
            }
            Token::If => {
                self.bump();
                self.if_stmt()
            }
            Token::While => {
                self.bump();
                let cond = self.expr()?;
                let body = self.block()?;
                Ok(Stmt::While(cond, body))
            }
            Token::Break => {
                self.bump();
                Ok(Stmt::Break)
            }
            Token::Continue => {
                self.bump();
                Ok(Stmt::Continue)
            }
            Token::Return => {
                self.bump();
                // a return value must start on the same statement; the
                // closing brace or a keyword means a bare return
                let value = match self.peek() {
                    Token::RBrace | Token::If | Token::While | Token::Var | Token::Return => None,
                    _ => Some(self.expr()?),
                };
                Ok(Stmt::Return(value))
            }
            Token::Ident(name) => {
                // assignment or expression statement
                if self.tokens.get(self.pos + 1).map(|l| &l.token) == Some(&Token::Assign) {
                    self.bump();
                    self.bump();
                    let value = self.expr()?;
                    Ok(Stmt::Assign(name, value))
                } else {
                    Ok(Stmt::Expr(self.expr()?))
                }
            }
            _ => Ok(Stmt::Expr(self.expr()?)),
        }
    }

    fn if_stmt(&mut self) -> ScriptResult<Stmt> {
        let mut arms = Vec::new();
        let cond = self.expr()?;
        let body = self.block()?;
        arms.push((cond, body));

        let mut otherwise = None;
        loop {
            match self.peek() {
                Token::Elif => {
                    self.bump();
                    let cond = self.expr()?;
                    let body = self.block()?;
                    arms.push((cond, body));
                }
                Token::Else => {
                    self.bump();
                    otherwise = Some(self.block()?);
                    break;
                }
                _ => break,
            }
        }
        Ok(Stmt::If(arms, otherwise))
    }

    // --- expressions (Pratt) ---

    fn expr(&mut self) -> ScriptResult<Expr> {
        self.ternary()
    }

    fn ternary(&mut self) -> ScriptResult<Expr> {
        let cond = self.binary(0)?;
        if *self.peek() == Token::Question {
            self.bump();
            let then = self.expr()?;
            self.expect(Token::Colon)?;
            let other = self.expr()?;
            return Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(other)));
        }
        Ok(cond)
    }

    fn binary(&mut self, min_bp: u8) -> ScriptResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let (op, bp) = match self.peek() {
                Token::Or => (BinaryOp::Or, 1),
                Token::And => (BinaryOp::And, 2),
                Token::Eq => (BinaryOp::Eq, 3),
                Token::NotEq => (BinaryOp::NotEq, 3),
                Token::Lt => (BinaryOp::Lt, 4),
                Token::LtEq => (BinaryOp::LtEq, 4),
                Token::Gt => (BinaryOp::Gt, 4),
                Token::GtEq => (BinaryOp::GtEq, 4),
                Token::Plus => (BinaryOp::Add, 5),
                Token::Minus => (BinaryOp::Sub, 5),
                Token::Star => (BinaryOp::Mul, 6),
                Token::Slash => (BinaryOp::Div, 6),
                Token::Percent => (BinaryOp::Mod, 6),
                _ => break,
            };
            if bp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.binary(bp + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> ScriptResult<Expr> {
        match self.peek() {
            Token::Minus => {
                self.bump();
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)))
            }
            Token::Not => {
                self.bump();
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::LParen => {
                    let name = match expr {
                        Expr::Ident(name) => name,
                        _ => return Err(self.error("only named functions can be called")),
                    };
                    self.bump();
                    let mut args = Vec::new();
                    while *self.peek() != Token::RParen {
                        args.push(self.expr()?);
                        if *self.peek() == Token::Comma {
                            self.bump();
                        }
                    }
                    self.expect(Token::RParen)?;
                    expr = Expr::Call(name, args);
                }
                Token::LBracket => {
                    self.bump();
                    let index = self.expr()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Token::Dot => {
                    self.bump();
                    let field = self.ident()?;
                    expr = Expr::Field(Box::new(expr), field);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> ScriptResult<Expr> {
        match self.bump() {
            Token::Int(v) => Ok(Expr::Int(v)),
            Token::Float(v) => Ok(Expr::Float(v)),
            Token::Money(v) => Ok(Expr::Money(v)),
            Token::Str(v) => Ok(Expr::Str(v)),
            Token::Bool(v) => Ok(Expr::Bool(v)),
            Token::Nil => Ok(Expr::Nil),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                while *self.peek() != Token::RBracket {
                    items.push(self.expr()?);
                    if *self.peek() == Token::Comma {
                        self.bump();
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::Array(items))
            }
            Token::LBrace => {
                let mut entries = Vec::new();
                while *self.peek() != Token::RBrace {
                    let key = match self.bump() {
                        Token::Str(key) => key,
                        other => {
                            return Err(self.error(format!(
                                "map keys must be string literals, found {:?}",
                                other
                            )))
                        }
                    };
                    self.expect(Token::Colon)?;
                    entries.push((key, self.expr()?));
                    if *self.peek() == Token::Comma {
                        self.bump();
                    }
                }
                self.expect(Token::RBrace)?;
                Ok(Expr::Map(entries))
            }
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_contract() {
        let src = r#"
            contract TransferMoney {
                data {
                    Recipient int
                    Amount money "optional"
                }
                conditions {
                    if Amount == 0 {
                        return false
                    }
                    return true
                }
                action {
                    var total money
                    total = Amount + 10
                    DBUpdate("keys", Recipient, "amount", total)
                }
            }
        "#;
        let source = parse(src).unwrap();
        assert_eq!(source.contracts.len(), 1);
        let c = &source.contracts[0];
        assert_eq!(c.name, "TransferMoney");
        assert_eq!(c.data.len(), 2);
        assert!(c.data[1].optional());
        assert_eq!(c.conditions.len(), 2);
        assert_eq!(c.action.len(), 3);
    }

    #[test]
    fn parses_top_level_func() {
        let src = r#"
            func double(x int) int {
                return x * 2
            }
        "#;
        let source = parse(src).unwrap();
        assert_eq!(source.funcs.len(), 1);
        assert_eq!(source.funcs[0].params, vec![("x".to_string(), Type::Int)]);
        assert_eq!(source.funcs[0].returns, Some(Type::Int));
    }

    #[test]
    fn precedence_and_ternary() {
        let source = parse(
            "contract C { action { x = 1 + 2 * 3 == 7 ? \"y\" : \"n\" } }",
        )
        .unwrap();
        let action = &source.contracts[0].action;
        match &action[0] {
            Stmt::Assign(name, Expr::Ternary(cond, _, _)) => {
                assert_eq!(name, "x");
                assert!(matches!(**cond, Expr::Binary(BinaryOp::Eq, _, _)));
            }
            other => panic!("unexpected stmt {:?}", other),
        }
    }

    #[test]
    fn while_with_break_continue() {
        let src = "contract C { action { while i < 10 { i = i + 1 continue } break } }";
        // break outside a loop is a compile error, not a parse error
        let source = parse(src).unwrap();
        assert_eq!(source.contracts[0].action.len(), 2);
    }

    #[test]
    fn map_literals_take_string_keys() {
        let source = parse(
            r#"contract C { action { x = { "to": 1, "note": "hi", "nested": { "a": true } } } }"#,
        )
        .unwrap();
        match &source.contracts[0].action[0] {
            Stmt::Assign(_, Expr::Map(entries)) => {
                assert_eq!(entries.len(), 3);
                assert_eq!(entries[0].0, "to");
                assert!(matches!(entries[2].1, Expr::Map(_)));
            }
            other => panic!("unexpected stmt {:?}", other),
        }

        // identifier keys are rejected
        assert!(parse("contract C { action { x = { to: 1 } } }").is_err());
    }

    #[test]
    fn reports_position_of_syntax_errors() {
        let err = parse("contract C {\n  junk { }\n}").unwrap_err();
        match err {
            ScriptError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn elif_chains() {
        let src = r#"
            contract C {
                action {
                    if a { x = 1 } elif b { x = 2 } elif c { x = 3 } else { x = 4 }
                }
            }
        "#;
        let source = parse(src).unwrap();
        match &source.contracts[0].action[0] {
            Stmt::If(arms, otherwise) => {
                assert_eq!(arms.len(), 3);
                assert!(otherwise.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
