//! Expression parser.
//!
//! Precedence climbing over the token stream, emitting postfix [`Op`]s
//! directly. Binary levels from loosest to tightest:
//!
//! | level | operators |
//! |-------|-----------|
//! | 1 | `\|\|` |
//! | 2 | `&&` |
//! | 3 | `== != < <= > >=` |
//! | 4 | `+ -` |
//! | 5 | `* / % $` |
//!
//! Unary `-` and `!` bind looser than `^` (so `-2^2` is `-4`), and postfix
//! indexing and calls bind tightest.

use hbl_stack::ensure_sufficient_stack;
use smallvec::SmallVec;

use crate::lexer::{tokenize, Spanned, Token};
use crate::{
    BinaryOp, Builtin, Dict, Formula, FormulaError, Matrix, Op, Statement, UnaryOp, Value,
    VariableTable,
};

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

/// Resolves user function names to registry slots.
pub trait FunctionLookup {
    fn find_function(&self, name: &str, namespace: Option<&str>) -> Option<usize>;
}

/// A lookup that knows no user functions.
pub struct NoFunctions;

impl FunctionLookup for NoFunctions {
    fn find_function(&self, _name: &str, _namespace: Option<&str>) -> Option<usize> {
        None
    }
}

/// Everything name resolution needs while parsing.
pub struct ParseContext<'a> {
    pub variables: &'a mut VariableTable,
    pub functions: &'a dyn FunctionLookup,
    pub namespace: Option<&'a str>,
}

impl ParseContext<'_> {
    /// Qualified variable name: `x` inside namespace `ns` is `ns.x`.
    pub fn qualify(&self, name: &str, global: bool) -> String {
        match self.namespace {
            Some(ns) if !global && !ns.is_empty() => format!("{ns}.{name}"),
            _ => name.to_string(),
        }
    }
}

/// Parse a standalone expression.
pub fn parse_expression(source: &str, cx: &mut ParseContext<'_>) -> Result<Formula, FormulaError> {
    let mut parser = Parser::new(source, cx)?;
    parser.expression()?;
    parser.expect_end()?;
    Ok(parser.finish())
}

/// Parse an expression statement, plain assignment, compound assignment
/// or indexed assignment.
pub fn parse_statement(source: &str, cx: &mut ParseContext<'_>) -> Result<Statement, FormulaError> {
    let mut parser = Parser::new(source, cx)?;
    parser.expression()?;

    let compound = match parser.peek_sym() {
        Some("=") => None,
        Some("+=") => Some(BinaryOp::Add),
        Some("-=") => Some(BinaryOp::Sub),
        Some("*=") => Some(BinaryOp::Mul),
        Some("/=") => Some(BinaryOp::Div),
        _ => {
            parser.expect_end()?;
            return Ok(Statement::Expression(parser.finish()));
        }
    };

    let lhs_end = parser.tokens[parser.pos].pos;
    parser.pos += 1;
    let target_ops = std::mem::take(&mut parser.ops);
    let target_volatile = std::mem::replace(&mut parser.volatile, false);

    if let Some(op) = compound {
        parser.ops.extend(target_ops.iter().cloned());
        parser.expression()?;
        parser.ops.push(Op::Binary(op));
    } else {
        parser.expression()?;
    }
    parser.expect_end()?;
    let value = parser.finish();

    match target_ops.as_slice() {
        [Op::Var(id)] => Ok(Statement::Assign { target: *id, value }),
        [Op::Var(_), .., Op::Index(_)] => Ok(Statement::AssignIndexed {
            target: Formula::new(target_ops, target_volatile),
            value,
        }),
        _ => Err(FormulaError::InvalidAssignmentTarget(
            source[..lhs_end].trim().to_string(),
        )),
    }
}

struct Parser<'s, 'c, 'a> {
    source: &'s str,
    tokens: Vec<Spanned>,
    pos: usize,
    cx: &'c mut ParseContext<'a>,
    ops: Vec<Op>,
    volatile: bool,
}

impl<'s, 'c, 'a> Parser<'s, 'c, 'a> {
    fn new(source: &'s str, cx: &'c mut ParseContext<'a>) -> Result<Self, FormulaError> {
        Ok(Parser {
            source,
            tokens: tokenize(source)?,
            pos: 0,
            cx,
            ops: Vec::new(),
            volatile: false,
        })
    }

    fn finish(self) -> Formula {
        Formula::new(self.ops, self.volatile)
    }

    // ─── Token access ───

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_sym(&self) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Sym(s)) => Some(s),
            _ => None,
        }
    }

    fn eat(&mut self, sym: &str) -> bool {
        if self.peek_sym() == Some(sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, sym: &str) -> Result<(), FormulaError> {
        if self.eat(sym) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_end(&self) -> Result<(), FormulaError> {
        if self.pos < self.tokens.len() {
            Err(self.unexpected())
        } else {
            Ok(())
        }
    }

    fn unexpected(&self) -> FormulaError {
        match self.tokens.get(self.pos) {
            Some(spanned) => FormulaError::UnexpectedToken {
                found: describe(&spanned.token),
                position: spanned.pos,
                source_text: self.source.to_string(),
            },
            None => FormulaError::UnexpectedEnd(self.source.to_string()),
        }
    }

    // ─── Expressions ───

    fn expression(&mut self) -> Result<(), FormulaError> {
        self.binary(1)
    }

    fn binary(&mut self, min_level: u8) -> Result<(), FormulaError> {
        self.unary()?;
        while let Some((op, level)) = self.peek_sym().and_then(binary_op) {
            if level < min_level {
                break;
            }
            self.pos += 1;
            self.binary(level + 1)?;
            self.ops.push(Op::Binary(op));
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<(), FormulaError> {
        ensure_sufficient_stack(|| {
            let op = match self.peek_sym() {
                Some("-") => UnaryOp::Neg,
                Some("!") => UnaryOp::Not,
                Some("+") => {
                    self.pos += 1;
                    return self.unary();
                }
                _ => return self.power(),
            };
            self.pos += 1;
            let start = self.ops.len();
            self.unary()?;
            if op == UnaryOp::Neg {
                if let [Op::Number(n)] = self.ops[start..] {
                    self.ops[start] = Op::Number(-n);
                    return Ok(());
                }
            }
            self.ops.push(Op::Unary(op));
            Ok(())
        })
    }

    fn power(&mut self) -> Result<(), FormulaError> {
        self.postfix()?;
        if self.eat("^") {
            self.unary()?;
            self.ops.push(Op::Binary(BinaryOp::Pow));
        }
        Ok(())
    }

    fn postfix(&mut self) -> Result<(), FormulaError> {
        self.primary()?;
        let mut pending = 0_u8;
        while self.eat("[") {
            self.expression()?;
            self.expect("]")?;
            pending += 1;
            if pending == 2 {
                self.ops.push(Op::Index(2));
                pending = 0;
            }
        }
        if pending == 1 {
            self.ops.push(Op::Index(1));
        }
        Ok(())
    }

    fn primary(&mut self) -> Result<(), FormulaError> {
        let Some(spanned) = self.tokens.get(self.pos).cloned() else {
            return Err(self.unexpected());
        };
        self.pos += 1;
        match spanned.token {
            Token::Number(n) => self.ops.push(Op::Number(n)),
            Token::Str(s) => self.ops.push(Op::Const(Value::from(s))),
            Token::Sym("(") => {
                self.expression()?;
                self.expect(")")?;
            }
            Token::Sym("{") => self.literal()?,
            Token::Sym("^") => match self.peek().cloned() {
                Some(Token::Ident(name)) => {
                    self.pos += 1;
                    self.variable(&name, true);
                }
                _ => return Err(self.unexpected()),
            },
            Token::Ident(name) => {
                if self.peek_sym() == Some("(") {
                    self.pos += 1;
                    self.call(&name)?;
                } else {
                    self.variable(&name, false);
                }
            }
            Token::Sym(_) => {
                self.pos -= 1;
                return Err(self.unexpected());
            }
        }
        Ok(())
    }

    fn variable(&mut self, name: &str, global: bool) {
        let qualified = self.cx.qualify(name, global);
        let id = self.cx.variables.intern(&qualified);
        self.ops.push(Op::Var(id));
    }

    fn call(&mut self, name: &str) -> Result<(), FormulaError> {
        let mut refs: SmallVec<[Option<_>; 4]> = SmallVec::new();
        if !self.eat(")") {
            loop {
                let start = self.ops.len();
                self.expression()?;
                refs.push(match &self.ops[start..] {
                    [Op::Var(id)] => Some(*id),
                    _ => None,
                });
                if self.eat(")") {
                    break;
                }
                self.expect(",")?;
            }
        }

        if let Some(builtin) = Builtin::from_name(name) {
            if refs.len() != builtin.arity() {
                return Err(FormulaError::WrongArity {
                    name: builtin.name(),
                    expected: builtin.arity(),
                    found: refs.len(),
                });
            }
            self.ops.push(Op::Builtin(builtin));
            return Ok(());
        }

        let slot = self
            .cx
            .functions
            .find_function(name, self.cx.namespace)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
        self.ops.push(Op::Call {
            slot,
            name: name.into(),
            refs,
        });
        Ok(())
    }

    // ─── Literals ───

    /// After an opening `{`: a matrix `{{..}{..}}`, an empty dictionary
    /// `{}`, or a dictionary `{"k": v, ...}`.
    fn literal(&mut self) -> Result<(), FormulaError> {
        if self.eat("}") {
            self.ops.push(Op::Const(Value::dict(Dict::new())));
            return Ok(());
        }
        if self.peek_sym() == Some("{") {
            return self.matrix_literal();
        }
        self.dict_literal()
    }

    fn matrix_literal(&mut self) -> Result<(), FormulaError> {
        let start = self.ops.len();
        let mut rows = 0;
        let mut cols: Option<usize> = None;
        let mut constant = true;

        while self.eat("{") {
            let mut width = 0;
            if !self.eat("}") {
                loop {
                    let entry = self.ops.len();
                    self.expression()?;
                    constant &= matches!(&self.ops[entry..], [Op::Number(_)]);
                    width += 1;
                    if self.eat("}") {
                        break;
                    }
                    self.expect(",")?;
                }
            }
            if *cols.get_or_insert(width) != width {
                return Err(FormulaError::RaggedMatrix(self.source.to_string()));
            }
            rows += 1;
            self.eat(",");
        }
        self.expect("}")?;

        let cols = cols.unwrap_or(0);
        if constant {
            let cells = self.ops.drain(start..).map(|op| match op {
                Op::Number(n) => n,
                _ => 0.0,
            });
            let matrix = Matrix::from_cells(rows, cols, cells.collect());
            self.ops.push(Op::Const(Value::matrix(matrix)));
        } else {
            self.volatile = true;
            self.ops.push(Op::MatrixBuild { rows, cols });
        }
        Ok(())
    }

    fn dict_literal(&mut self) -> Result<(), FormulaError> {
        let start = self.ops.len();
        let mut pairs = 0;
        loop {
            self.expression()?;
            self.expect(":")?;
            self.expression()?;
            pairs += 1;
            if self.eat("}") {
                break;
            }
            self.expect(",")?;
        }

        let constant = self.ops[start..]
            .iter()
            .all(|op| matches!(op, Op::Number(_) | Op::Const(_)));
        if constant && self.ops.len() - start == pairs * 2 {
            let mut dict = Dict::new();
            let entries: Vec<Op> = self.ops.drain(start..).collect();
            for pair in entries.chunks(2) {
                let key = constant_value(&pair[0]).to_text();
                dict.insert(key, constant_value(&pair[1]));
            }
            self.ops.push(Op::Const(Value::dict(dict)));
        } else {
            self.volatile = true;
            self.ops.push(Op::DictBuild(pairs));
        }
        Ok(())
    }
}

fn constant_value(op: &Op) -> Value {
    match op {
        Op::Number(n) => Value::Number(*n),
        Op::Const(v) => v.clone(),
        _ => Value::Undefined,
    }
}

fn binary_op(sym: &str) -> Option<(BinaryOp, u8)> {
    Some(match sym {
        "||" => (BinaryOp::Or, 1),
        "&&" => (BinaryOp::And, 2),
        "==" => (BinaryOp::Eq, 3),
        "!=" => (BinaryOp::NotEq, 3),
        "<" => (BinaryOp::Lt, 3),
        "<=" => (BinaryOp::LtEq, 3),
        ">" => (BinaryOp::Gt, 3),
        ">=" => (BinaryOp::GtEq, 3),
        "+" => (BinaryOp::Add, 4),
        "-" => (BinaryOp::Sub, 4),
        "*" => (BinaryOp::Mul, 5),
        "/" => (BinaryOp::Div, 5),
        "%" => (BinaryOp::Mod, 5),
        "$" => (BinaryOp::IntDiv, 5),
        _ => return None,
    })
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => n.to_string(),
        Token::Str(s) => format!("\"{s}\""),
        Token::Ident(name) => name.clone(),
        Token::Sym(s) => (*s).to_string(),
    }
}
