use crate::traits::{Scalar, ScalarFunction};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while turning source text into an evaluable expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected ')'")]
    ExpectedClosingParen,
    #[error("trailing input after expression: {0}")]
    TrailingInput(String),
    #[error("unknown variable or parameter: {0}")]
    UnknownSymbol(String),
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("expected {expected} parameter values, got {actual}")]
    ParameterCount { expected: usize, actual: usize },
}

/// OpCodes for the stack-based virtual machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant `f64` value onto the stack.
    LoadConst(f64),
    /// Pushes the value of the independent variable.
    LoadVar,
    /// Pushes the value of a parameter (by index).
    LoadParam(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    /// Pops top value (a), pushes -a.
    Neg,
    /// Pops top value (a), pushes the function applied to it.
    Call(Function),
}

/// Built-in unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Abs,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "tan" => Some(Function::Tan),
            "exp" => Some(Function::Exp),
            "ln" | "log" => Some(Function::Ln),
            "sqrt" => Some(Function::Sqrt),
            "abs" => Some(Function::Abs),
            _ => None,
        }
    }

    fn apply<T: Scalar>(self, a: T) -> T {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Sqrt => a.sqrt(),
            Function::Abs => a.abs(),
        }
    }
}

/// A compiled sequence of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
    /// Deepest stack the ops reach, used to size the evaluation buffer.
    pub max_depth: usize,
}

/// Stack-based virtual machine for evaluating bytecode.
///
/// The VM holds no state; `execute` receives the value of the variable, the
/// parameter values, and a scratch stack owned by the caller.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(bytecode: &Bytecode, x: T, params: &[T], stack: &mut Vec<T>) -> T {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => stack.push(T::from_f64(val).unwrap_or_else(T::nan)),
                OpCode::LoadVar => stack.push(x),
                OpCode::LoadParam(idx) => {
                    stack.push(params.get(idx).copied().unwrap_or_else(T::nan))
                }
                OpCode::Add => binary(stack, |a, b| a + b),
                OpCode::Sub => binary(stack, |a, b| a - b),
                OpCode::Mul => binary(stack, |a, b| a * b),
                OpCode::Div => binary(stack, |a, b| a / b),
                OpCode::Pow => binary(stack, |a, b| a.powf(b)),
                OpCode::Neg => unary(stack, |a| -a),
                OpCode::Call(func) => unary(stack, |a| func.apply(a)),
            }
        }

        // Compiled bytecode always leaves exactly one value.
        stack.pop().unwrap_or_else(T::nan)
    }
}

fn pop<T: Scalar>(stack: &mut Vec<T>) -> T {
    stack.pop().unwrap_or_else(T::nan)
}

fn unary<T: Scalar>(stack: &mut Vec<T>, op: impl Fn(T) -> T) {
    let a = pop(stack);
    stack.push(op(a));
}

fn binary<T: Scalar>(stack: &mut Vec<T>, op: impl Fn(T, T) -> T) {
    let b = pop(stack);
    let a = pop(stack);
    stack.push(op(a, b));
}

// --- AST & Compiler ---

/// Abstract syntax tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>), // +, -, *, /, ^
    Unary(char, Box<Expr>),             // -
    Call(String, Box<Expr>),
}

/// Compiles an AST into bytecode, resolving the variable and parameter names
/// to load instructions.
pub struct Compiler {
    pub variable: String,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(variable: &str, param_names: &[String]) -> Self {
        let param_map = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Self {
            variable: variable.to_string(),
            param_map,
        }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, ExpressionError> {
        let mut ops = Vec::new();
        let max_depth = self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops, max_depth })
    }

    /// Emits ops for `expr` and returns the stack depth they need.
    fn compile_recursive(
        &self,
        expr: &Expr,
        ops: &mut Vec<OpCode>,
    ) -> Result<usize, ExpressionError> {
        match expr {
            Expr::Number(n) => {
                ops.push(OpCode::LoadConst(*n));
                Ok(1)
            }
            Expr::Variable(name) => {
                if *name == self.variable {
                    ops.push(OpCode::LoadVar);
                } else if let Some(&idx) = self.param_map.get(name) {
                    ops.push(OpCode::LoadParam(idx));
                } else if let Some(value) = constant(name) {
                    ops.push(OpCode::LoadConst(value));
                } else {
                    return Err(ExpressionError::UnknownSymbol(name.clone()));
                }
                Ok(1)
            }
            Expr::Binary(left, op, right) => {
                let left_depth = self.compile_recursive(left, ops)?;
                let right_depth = self.compile_recursive(right, ops)?;
                ops.push(match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    other => return Err(ExpressionError::UnexpectedToken(format!("'{other}'"))),
                });
                Ok(left_depth.max(right_depth + 1))
            }
            Expr::Unary(op, operand) => {
                let depth = self.compile_recursive(operand, ops)?;
                match op {
                    '-' => ops.push(OpCode::Neg),
                    other => return Err(ExpressionError::UnexpectedToken(format!("'{other}'"))),
                }
                Ok(depth)
            }
            Expr::Call(name, arg) => {
                let func = Function::from_name(name)
                    .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                let depth = self.compile_recursive(arg, ops)?;
                ops.push(OpCode::Call(func));
                Ok(depth)
            }
        }
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

// --- Parser ---

/// Parses a string expression into an AST.
///
/// Grammar, loosest first: `+ -`, `* /`, unary `-`, `^` (right associative),
/// then numbers, names, calls and parentheses. So `-x^2` is `-(x^2)`.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_sum()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::TrailingInput(token.describe())),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Identifier(name) => format!("'{name}'"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else if d == 'e' || d == 'E' {
                    // Exponent only when followed by digits, so `2e` stays `2 * e`.
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    let sign = lookahead.next_if(|s| *s == '+' || *s == '-');
                    if lookahead.peek().is_some_and(|s| s.is_ascii_digit()) {
                        num_str.push(d);
                        chars.next();
                        if let Some(sign) = sign {
                            num_str.push(sign);
                            chars.next();
                        }
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            }
            let value = num_str
                .parse()
                .map_err(|_| ExpressionError::InvalidNumber(num_str.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(ExpressionError::UnexpectedCharacter(other)),
            });
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_closing_paren(&mut self) -> Result<(), ExpressionError> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(ExpressionError::ExpectedClosingParen),
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_product()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => '+',
                Some(Token::Minus) => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_product()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek() {
                Some(Token::Star) => '*',
                Some(Token::Slash) => '/',
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary('-', Box::new(expr)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            // Right associative; the exponent may carry its own sign.
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let arg = self.parse_sum()?;
                    self.expect_closing_paren()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_sum()?;
                self.expect_closing_paren()?;
                Ok(expr)
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(token.describe())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

// --- Expression ---

/// A compiled single-variable expression usable as a [`ScalarFunction`].
///
/// Parameters are fixed at compile time. Each evaluation allocates its own
/// scratch stack, so an `Expression` can be shared across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    bytecode: Bytecode,
    params: Vec<f64>,
}

impl Expression {
    pub fn new(bytecode: Bytecode, params: Vec<f64>) -> Self {
        Self { bytecode, params }
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn evaluate<T: Scalar>(&self, x: T) -> T {
        let params: Vec<T> = self
            .params
            .iter()
            .map(|&p| T::from_f64(p).unwrap_or_else(T::nan))
            .collect();
        let mut stack = Vec::with_capacity(self.bytecode.max_depth);
        VM::execute(&self.bytecode, x, &params, &mut stack)
    }
}

impl<T: Scalar> ScalarFunction<T> for Expression {
    fn eval(&self, x: T) -> T {
        self.evaluate(x)
    }
}

/// Parses and compiles `source` as a function of `variable`.
pub fn compile_expression(
    source: &str,
    variable: &str,
    param_names: &[String],
    params: &[f64],
) -> Result<Expression, ExpressionError> {
    if param_names.len() != params.len() {
        return Err(ExpressionError::ParameterCount {
            expected: param_names.len(),
            actual: params.len(),
        });
    }
    let parsed = parse(source)?;
    let bytecode = Compiler::new(variable, param_names).compile(&parsed)?;
    Ok(Expression::new(bytecode, params.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::{compile_expression, parse, Compiler, Expr, ExpressionError, OpCode};
    use crate::difference::{DifferenceStrategy, Stencil};
    use crate::integral::integrate;
    use crate::traits::ScalarFunction;
    use std::thread;

    fn compile(source: &str) -> super::Expression {
        compile_expression(source, "x", &[], &[]).expect("expression should compile")
    }

    #[test]
    fn evaluates_arithmetic_with_precedence() {
        assert_eq!(compile("1 + 2 * 3").evaluate(0.0), 7.0);
        assert_eq!(compile("(1 + 2) * 3").evaluate(0.0), 9.0);
        assert_eq!(compile("2 ^ 3 ^ 2").evaluate(0.0), 512.0);
        assert_eq!(compile("-x ^ 2").evaluate(3.0), -9.0);
        assert_eq!(compile("2 ^ -1").evaluate(0.0), 0.5);
        assert_eq!(compile("8 / 4 / 2").evaluate(0.0), 1.0);
        assert_eq!(compile("x - 1 - 1").evaluate(5.0), 3.0);
    }

    #[test]
    fn evaluates_functions_and_constants() {
        assert!((compile("sin(pi / 2)").evaluate(0.0_f64) - 1.0).abs() < 1e-15);
        assert!((compile("ln(e)").evaluate(0.0_f64) - 1.0).abs() < 1e-15);
        assert_eq!(compile("sqrt(abs(x))").evaluate(-16.0), 4.0);
        assert_eq!(compile("exp(0) + cos(0) + tan(0)").evaluate(0.0), 2.0);
    }

    #[test]
    fn parses_scientific_notation() {
        assert_eq!(compile("1e-3 * x").evaluate(2000.0), 2.0);
        assert_eq!(compile("2.5E+1").evaluate(0.0), 25.0);
        // Without exponent digits `e` is Euler's number.
        assert_eq!(
            parse("2e").expect_err("adjacent operands"),
            ExpressionError::TrailingInput("'e'".to_string())
        );
    }

    #[test]
    fn binds_parameters_by_name() {
        let names = vec!["a".to_string(), "b".to_string()];
        let expr = compile_expression("a * t + b", "t", &names, &[3.0, -1.0]).expect("compile");
        assert_eq!(expr.evaluate(2.0), 5.0);
        assert_eq!(expr.bytecode().ops[0], OpCode::LoadParam(0));
        assert_eq!(expr.params(), &[3.0, -1.0]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse("1 +"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(parse("(x"), Err(ExpressionError::ExpectedClosingParen));
        assert_eq!(parse("x # 2"), Err(ExpressionError::UnexpectedCharacter('#')));
        assert_eq!(parse("1.2.3"), Err(ExpressionError::InvalidNumber("1.2.3".to_string())));
        assert!(matches!(parse("x )"), Err(ExpressionError::TrailingInput(_))));
    }

    #[test]
    fn rejects_unknown_symbols_and_functions() {
        let err = compile_expression("x + missing", "x", &[], &[]).expect_err("unknown symbol");
        assert_eq!(err, ExpressionError::UnknownSymbol("missing".to_string()));
        assert!(err.to_string().to_lowercase().contains("unknown"));

        let err = compile_expression("cosh(x)", "x", &[], &[]).expect_err("unknown function");
        assert_eq!(err, ExpressionError::UnknownFunction("cosh".to_string()));
    }

    #[test]
    fn rejects_mismatched_parameter_values() {
        let names = vec!["a".to_string()];
        assert_eq!(
            compile_expression("a * x", "x", &names, &[]),
            Err(ExpressionError::ParameterCount {
                expected: 1,
                actual: 0
            })
        );
    }

    #[test]
    fn variable_shadows_constants() {
        let expr = compile_expression("e + 1", "e", &[], &[]).expect("compile");
        assert_eq!(expr.evaluate(1.0), 2.0);
    }

    #[test]
    fn tracks_stack_depth() {
        let parsed = parse("1 + 2 * (3 - x)").expect("parse");
        let bytecode = Compiler::new("x", &[]).compile(&parsed).expect("compile");
        assert_eq!(bytecode.max_depth, 4);
        assert!(matches!(parsed, Expr::Binary(_, '+', _)));
    }

    #[test]
    fn evaluates_in_single_precision() {
        let expr = compile("x * x + 1");
        let value: f32 = expr.eval(2.0_f32);
        assert_eq!(value, 5.0);
    }

    #[test]
    fn expressions_feed_the_numerical_methods() {
        let cubic = compile("x^3 - 2*x");
        let derivative = Stencil::Central
            .derivative(None, cubic.clone(), 1e-4_f64)
            .expect("nonzero delta");
        // d/dx (x^3 - 2x) = 3x^2 - 2
        assert!((derivative.eval(2.0_f64) - 10.0).abs() < 1e-3);

        let area: f64 = integrate(None, &compile("sin(x)"), 0.0, std::f64::consts::PI, 1e-4)
            .expect("converges");
        assert!((area - 2.0).abs() < 1e-3);
    }

    #[test]
    fn expressions_are_shareable_across_threads() {
        let expr = compile("x * x");
        let handle = {
            let expr = expr.clone();
            thread::spawn(move || expr.evaluate(3.0_f64))
        };
        assert_eq!(handle.join().expect("thread"), 9.0);
        assert_eq!(expr.evaluate(3.0_f64), 9.0);
    }
}
