//! Parsing with `rustpython-parser` and lowering into [`super::ast`].
//!
//! The parser accepts the full Python grammar; lowering keeps the subset the
//! interpreter executes and rejects the rest with a located [`ParseError`].

use std::rc::Rc;

use rustpython_parser::ast::{self as py, Ranged};
use rustpython_parser::lexer::lex;
use rustpython_parser::text_size::TextSize;
use rustpython_parser::{Mode, Tok};

use super::ast::*;
use crate::error::ParseError;
use crate::stack::StackMark;

/// Deepest bracket nesting accepted, as in CPython's tokenizer.
pub const MAX_BRACKET_DEPTH: usize = 200;

/// Deepest statement and expression nesting accepted after parsing.
pub const MAX_TREE_DEPTH: usize = 1000;

/// A parsed source region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub body: Suite,
}

/// A comment seen while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub line: usize,
    pub column: usize,
    /// Full comment text including the leading `#`.
    pub text: String,
}

/// Parse a complete source text.
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let lines = LineIndex::new(source);
    check_nesting(source, &lines)?;

    let parsed = rustpython_parser::parse(source, Mode::Module, "<cell>")
        .map_err(|e| lines.error(e.offset, e.error.to_string()))?;
    let py::Mod::Module(module) = parsed else {
        return Ok(Module::default());
    };

    let mut lowering = Lowering::new(&lines);
    match lowering.suite(&module.body) {
        Ok(body) => Ok(Module { body }),
        Err(error) => {
            if lowering.too_deep {
                // Dropping the tree recurses as deep as it is nested.
                std::mem::forget(module);
            }
            Err(error)
        }
    }
}

/// Every comment in `source`, in document order.
pub fn comments(source: &str) -> Result<Vec<Comment>, ParseError> {
    let lines = LineIndex::new(source);
    let mut comments = Vec::new();
    for token in lex(source, Mode::Module) {
        let (tok, range) = token.map_err(|e| lines.error(e.location, e.error.to_string()))?;
        if let Tok::Comment(_) = tok {
            let (line, column) = lines.location(range.start());
            let text = source
                .get(usize::from(range.start())..usize::from(range.end()))
                .unwrap_or_default();
            comments.push(Comment {
                line,
                column,
                text: text.to_string(),
            });
        }
    }
    Ok(comments)
}

/// Reject bracket nesting the parser would need unbounded recursion for.
///
/// Lexical errors are left for the parser to report.
fn check_nesting(source: &str, lines: &LineIndex<'_>) -> Result<(), ParseError> {
    let mut depth = 0usize;
    for token in lex(source, Mode::Module) {
        let Ok((tok, range)) = token else {
            break;
        };
        match tok {
            Tok::Lpar | Tok::Lsqb | Tok::Lbrace => {
                depth += 1;
                if depth > MAX_BRACKET_DEPTH {
                    return Err(lines.error(range.start(), "too many nested parentheses"));
                }
            }
            Tok::Rpar | Tok::Rsqb | Tok::Rbrace => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

// =============================================================================
// Positions
// =============================================================================

/// Byte offset to 1-based line and column conversion.
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, starts }
    }

    /// Line and character column of a byte offset.
    fn location(&self, offset: TextSize) -> (usize, usize) {
        let offset = usize::from(offset).min(self.source.len());
        let line = self.starts.partition_point(|&start| start <= offset).max(1);
        let start = self.starts[line - 1];
        let column = self
            .source
            .get(start..offset)
            .map_or(offset - start, |text| text.chars().count());
        (line, column + 1)
    }

    fn error(&self, offset: TextSize, message: impl Into<String>) -> ParseError {
        let (line, column) = self.location(offset);
        ParseError::new(line, column, message)
    }

    /// Letters written before the opening quote of a string literal.
    fn string_prefix(&self, offset: TextSize) -> String {
        self.source
            .get(usize::from(offset)..)
            .unwrap_or_default()
            .chars()
            .take_while(char::is_ascii_alphabetic)
            .collect()
    }
}

// =============================================================================
// Lowering
// =============================================================================

struct Lowering<'a, 'src> {
    lines: &'a LineIndex<'src>,
    depth: usize,
    stack: StackMark,
    too_deep: bool,
}

impl<'a, 'src> Lowering<'a, 'src> {
    fn new(lines: &'a LineIndex<'src>) -> Self {
        Self {
            lines,
            depth: 0,
            stack: StackMark::here(),
            too_deep: false,
        }
    }

    fn error(&self, offset: TextSize, message: impl Into<String>) -> ParseError {
        self.lines.error(offset, message)
    }

    fn unsupported(&self, offset: TextSize, what: &str) -> ParseError {
        self.error(offset, format!("{what} are not supported"))
    }

    fn enter(&mut self, offset: TextSize) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_TREE_DEPTH || self.stack.exhausted() {
            self.too_deep = true;
            return Err(self.error(offset, "expression is too deeply nested"));
        }
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn suite(&mut self, body: &[py::Stmt]) -> Result<Suite, ParseError> {
        body.iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&mut self, stmt: &py::Stmt) -> Result<Stmt, ParseError> {
        let range = stmt.range();
        self.enter(range.start())?;
        let kind = self.stmt_kind(stmt);
        self.depth -= 1;

        let (line, column) = self.lines.location(range.start());
        let last = if range.end() > range.start() {
            range.end() - TextSize::from(1)
        } else {
            range.end()
        };
        Ok(Stmt {
            kind: kind?,
            line,
            column,
            end_line: self.lines.location(last).0,
        })
    }

    fn stmt_kind(&mut self, stmt: &py::Stmt) -> Result<StmtKind, ParseError> {
        let start = stmt.range().start();
        Ok(match stmt {
            py::Stmt::Expr(py::StmtExpr { value, .. }) => StmtKind::Expr(self.expr(value)?),
            py::Stmt::Assign(py::StmtAssign { targets, value, .. }) => {
                let targets = self.exprs(targets)?;
                for target in &targets {
                    check_target(target, "assign to")?;
                }
                StmtKind::Assign {
                    targets,
                    value: self.expr(value)?,
                }
            }
            py::Stmt::AnnAssign(py::StmtAnnAssign {
                target,
                annotation,
                value,
                ..
            }) => {
                let target = self.expr(target)?;
                check_single_target(&target, "annotation")?;
                StmtKind::AnnAssign {
                    target,
                    annotation: self.expr(annotation)?,
                    value: self.optional(value.as_deref())?,
                }
            }
            py::Stmt::AugAssign(py::StmtAugAssign { target, op, value, .. }) => {
                let target = self.expr(target)?;
                check_single_target(&target, "augmented assignment")?;
                StmtKind::AugAssign {
                    target,
                    op: bin_op(op),
                    value: self.expr(value)?,
                }
            }
            py::Stmt::Delete(py::StmtDelete { targets, .. }) => {
                let targets = self.exprs(targets)?;
                for target in &targets {
                    check_target(target, "delete")?;
                }
                StmtKind::Delete(targets)
            }
            py::Stmt::Pass(_) => StmtKind::Pass,
            py::Stmt::Break(_) => StmtKind::Break,
            py::Stmt::Continue(_) => StmtKind::Continue,
            py::Stmt::Return(py::StmtReturn { value, .. }) => {
                StmtKind::Return(self.optional(value.as_deref())?)
            }
            py::Stmt::If(py::StmtIf {
                test, body, orelse, ..
            }) => StmtKind::If {
                test: self.expr(test)?,
                body: self.suite(body)?,
                orelse: self.suite(orelse)?,
            },
            py::Stmt::While(py::StmtWhile {
                test, body, orelse, ..
            }) => StmtKind::While {
                test: self.expr(test)?,
                body: self.suite(body)?,
                orelse: self.suite(orelse)?,
            },
            py::Stmt::For(py::StmtFor {
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                let target = self.expr(target)?;
                check_target(&target, "assign to")?;
                StmtKind::For {
                    target,
                    iter: self.expr(iter)?,
                    body: self.suite(body)?,
                    orelse: self.suite(orelse)?,
                }
            }
            py::Stmt::FunctionDef(py::StmtFunctionDef {
                name,
                args,
                body,
                decorator_list,
                ..
            }) => {
                let decorators = self.exprs(decorator_list)?;
                let params = self.params(args)?;
                let body = self.suite(body)?;
                StmtKind::FunctionDef(Rc::new(FunctionDef {
                    name: name.as_str().to_string(),
                    params,
                    body,
                    decorators,
                    line: self.lines.location(start).0,
                }))
            }
            py::Stmt::ClassDef(py::StmtClassDef {
                name,
                bases,
                keywords,
                body,
                decorator_list,
                ..
            }) => {
                if let Some(keyword) = keywords.first() {
                    return Err(self.unsupported(keyword.value.range().start(), "class keyword arguments"));
                }
                StmtKind::ClassDef(Rc::new(ClassDef {
                    name: name.as_str().to_string(),
                    bases: self.exprs(bases)?,
                    body: self.suite(body)?,
                    decorators: self.exprs(decorator_list)?,
                }))
            }
            py::Stmt::Import(py::StmtImport { names, .. }) => StmtKind::Import(aliases(names)),
            py::Stmt::ImportFrom(py::StmtImportFrom { module, names, .. }) => StmtKind::ImportFrom {
                module: module.as_ref().map(|m| m.as_str().to_string()).unwrap_or_default(),
                names: aliases(names),
            },
            py::Stmt::Global(py::StmtGlobal { names, .. }) => StmtKind::Global(identifiers(names)),
            py::Stmt::Nonlocal(py::StmtNonlocal { names, .. }) => {
                StmtKind::Nonlocal(identifiers(names))
            }
            py::Stmt::Try(py::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            }) => StmtKind::Try {
                body: self.suite(body)?,
                handlers: handlers
                    .iter()
                    .map(|handler| self.handler(handler))
                    .collect::<Result<_, _>>()?,
                orelse: self.suite(orelse)?,
                finalbody: self.suite(finalbody)?,
            },
            py::Stmt::Raise(py::StmtRaise { exc, .. }) => StmtKind::Raise(self.optional(exc.as_deref())?),
            py::Stmt::Assert(py::StmtAssert { test, msg, .. }) => StmtKind::Assert {
                test: self.expr(test)?,
                msg: self.optional(msg.as_deref())?,
            },
            py::Stmt::With(_) => return Err(self.unsupported(start, "'with' statements")),
            py::Stmt::Match(_) => return Err(self.unsupported(start, "'match' statements")),
            py::Stmt::TryStar(_) => return Err(self.unsupported(start, "'except*' clauses")),
            py::Stmt::AsyncFunctionDef(_) | py::Stmt::AsyncFor(_) | py::Stmt::AsyncWith(_) => {
                return Err(self.unsupported(start, "async statements"));
            }
            _ => return Err(self.unsupported(start, "statements of this kind")),
        })
    }

    fn handler(&mut self, handler: &py::ExceptHandler) -> Result<Handler, ParseError> {
        let py::ExceptHandler::ExceptHandler(py::ExceptHandlerExceptHandler {
            type_,
            name,
            body,
            range,
            ..
        }) = handler;
        Ok(Handler {
            kind: self.optional(type_.as_deref())?,
            name: name.as_ref().map(|n| n.as_str().to_string()),
            body: self.suite(body)?,
            line: self.lines.location(range.start()).0,
        })
    }

    fn params(&mut self, args: &py::Arguments) -> Result<Params, ParseError> {
        let mut params = Params::default();
        for arg in args.posonlyargs.iter().chain(&args.args) {
            params.positional.push(self.param(arg)?);
        }
        for arg in &args.kwonlyargs {
            params.kwonly.push(self.param(arg)?);
        }
        params.vararg = args.vararg.as_ref().map(|arg| arg.arg.as_str().to_string());
        params.kwarg = args.kwarg.as_ref().map(|arg| arg.arg.as_str().to_string());
        Ok(params)
    }

    fn param(&mut self, arg: &py::ArgWithDefault) -> Result<Param, ParseError> {
        Ok(Param {
            name: arg.def.arg.as_str().to_string(),
            default: self.optional(arg.default.as_deref())?,
        })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn exprs(&mut self, exprs: &[py::Expr]) -> Result<Vec<Expr>, ParseError> {
        exprs.iter().map(|expr| self.expr(expr)).collect()
    }

    fn optional(&mut self, expr: Option<&py::Expr>) -> Result<Option<Expr>, ParseError> {
        expr.map(|expr| self.expr(expr)).transpose()
    }

    fn boxed(&mut self, expr: &py::Expr) -> Result<Box<Expr>, ParseError> {
        self.expr(expr).map(Box::new)
    }

    fn optional_boxed(&mut self, expr: Option<&py::Expr>) -> Result<Option<Box<Expr>>, ParseError> {
        expr.map(|expr| self.boxed(expr)).transpose()
    }

    fn expr(&mut self, expr: &py::Expr) -> Result<Expr, ParseError> {
        let start = expr.range().start();
        self.enter(start)?;
        let kind = self.expr_kind(expr);
        self.depth -= 1;
        let (line, column) = self.lines.location(start);
        Ok(Expr::new(kind?, line, column))
    }

    fn expr_kind(&mut self, expr: &py::Expr) -> Result<ExprKind, ParseError> {
        let start = expr.range().start();
        Ok(match expr {
            py::Expr::Name(py::ExprName { id, .. }) => ExprKind::Name(id.as_str().to_string()),
            py::Expr::Constant(py::ExprConstant { value, .. }) => {
                ExprKind::Constant(self.constant(value, start)?)
            }
            py::Expr::JoinedStr(py::ExprJoinedStr { values, .. }) => ExprKind::FString(self.fstring(values)?),
            py::Expr::FormattedValue(_) => ExprKind::FString(self.fstring(std::slice::from_ref(expr))?),
            py::Expr::List(py::ExprList { elts, .. }) => ExprKind::List(self.exprs(elts)?),
            py::Expr::Tuple(py::ExprTuple { elts, .. }) => ExprKind::Tuple(self.exprs(elts)?),
            py::Expr::Set(py::ExprSet { elts, .. }) => ExprKind::Set(self.exprs(elts)?),
            py::Expr::Dict(py::ExprDict { keys, values, .. }) => {
                let mut pairs = Vec::with_capacity(values.len());
                for (key, value) in keys.iter().zip(values) {
                    let Some(key) = key else {
                        return Err(self.unsupported(value.range().start(), "dict unpackings"));
                    };
                    pairs.push((self.expr(key)?, self.expr(value)?));
                }
                ExprKind::Dict(pairs)
            }
            py::Expr::Starred(py::ExprStarred { value, .. }) => ExprKind::Starred(self.boxed(value)?),
            py::Expr::BinOp(py::ExprBinOp { left, op, right, .. }) => ExprKind::BinOp {
                left: self.boxed(left)?,
                op: bin_op(op),
                right: self.boxed(right)?,
            },
            py::Expr::UnaryOp(py::ExprUnaryOp { op, operand, .. }) => ExprKind::UnaryOp {
                op: match op {
                    py::UnaryOp::Invert => UnaryOp::Invert,
                    py::UnaryOp::Not => UnaryOp::Not,
                    py::UnaryOp::UAdd => UnaryOp::Pos,
                    py::UnaryOp::USub => UnaryOp::Neg,
                },
                operand: self.boxed(operand)?,
            },
            py::Expr::BoolOp(py::ExprBoolOp { op, values, .. }) => ExprKind::BoolOp {
                op: match op {
                    py::BoolOp::And => BoolOp::And,
                    py::BoolOp::Or => BoolOp::Or,
                },
                values: self.exprs(values)?,
            },
            py::Expr::Compare(py::ExprCompare {
                left,
                ops,
                comparators,
                ..
            }) => ExprKind::Compare {
                left: self.boxed(left)?,
                ops: ops.iter().map(cmp_op).collect(),
                comparators: self.exprs(comparators)?,
            },
            py::Expr::IfExp(py::ExprIfExp {
                test, body, orelse, ..
            }) => ExprKind::IfExp {
                test: self.boxed(test)?,
                body: self.boxed(body)?,
                orelse: self.boxed(orelse)?,
            },
            py::Expr::Lambda(py::ExprLambda { args, body, .. }) => {
                let params = self.params(args)?;
                let value = self.expr(body)?;
                let (line, column) = (value.line, value.column);
                ExprKind::Lambda(Rc::new(FunctionDef {
                    name: "<lambda>".to_string(),
                    params,
                    body: vec![Stmt {
                        kind: StmtKind::Return(Some(value)),
                        line,
                        column,
                        end_line: line,
                    }],
                    decorators: Vec::new(),
                    line: self.lines.location(start).0,
                }))
            }
            py::Expr::Call(py::ExprCall {
                func, args, keywords, ..
            }) => {
                let func = self.boxed(func)?;
                let mut lowered = Vec::with_capacity(args.len() + keywords.len());
                for arg in args {
                    lowered.push(match arg {
                        py::Expr::Starred(py::ExprStarred { value, .. }) => Arg::Starred(self.expr(value)?),
                        other => Arg::Positional(self.expr(other)?),
                    });
                }
                for keyword in keywords {
                    let value = self.expr(&keyword.value)?;
                    lowered.push(match &keyword.arg {
                        Some(name) => Arg::Keyword(name.as_str().to_string(), value),
                        None => Arg::DoubleStarred(value),
                    });
                }
                ExprKind::Call { func, args: lowered }
            }
            py::Expr::Attribute(py::ExprAttribute { value, attr, .. }) => ExprKind::Attribute {
                value: self.boxed(value)?,
                attr: attr.as_str().to_string(),
            },
            py::Expr::Subscript(py::ExprSubscript { value, slice, .. }) => ExprKind::Subscript {
                value: self.boxed(value)?,
                index: self.boxed(slice)?,
            },
            py::Expr::Slice(py::ExprSlice {
                lower, upper, step, ..
            }) => ExprKind::Slice {
                lower: self.optional_boxed(lower.as_deref())?,
                upper: self.optional_boxed(upper.as_deref())?,
                step: self.optional_boxed(step.as_deref())?,
            },
            py::Expr::ListComp(py::ExprListComp { elt, generators, .. }) => {
                self.comprehension(ComprehensionKind::List, elt, None, generators)?
            }
            py::Expr::SetComp(py::ExprSetComp { elt, generators, .. }) => {
                self.comprehension(ComprehensionKind::Set, elt, None, generators)?
            }
            py::Expr::GeneratorExp(py::ExprGeneratorExp { elt, generators, .. }) => {
                self.comprehension(ComprehensionKind::Generator, elt, None, generators)?
            }
            py::Expr::DictComp(py::ExprDictComp {
                key,
                value,
                generators,
                ..
            }) => self.comprehension(ComprehensionKind::Dict, key, Some(value), generators)?,
            py::Expr::NamedExpr(_) => return Err(self.unsupported(start, "assignment expressions")),
            py::Expr::Await(_) | py::Expr::Yield(_) | py::Expr::YieldFrom(_) => {
                return Err(self.unsupported(start, "generators and coroutines"));
            }
        })
    }

    fn comprehension(
        &mut self,
        kind: ComprehensionKind,
        element: &py::Expr,
        value: Option<&py::Expr>,
        generators: &[py::Comprehension],
    ) -> Result<ExprKind, ParseError> {
        let mut lowered = Vec::with_capacity(generators.len());
        for generator in generators {
            if generator.is_async {
                return Err(self.unsupported(generator.target.range().start(), "async comprehensions"));
            }
            let target = self.expr(&generator.target)?;
            check_target(&target, "assign to")?;
            lowered.push(Generator {
                target,
                iter: self.expr(&generator.iter)?,
                conditions: self.exprs(&generator.ifs)?,
            });
        }
        Ok(ExprKind::Comprehension {
            kind,
            element: self.boxed(element)?,
            value: self.optional_boxed(value)?,
            generators: lowered,
        })
    }

    fn constant(&self, value: &py::Constant, start: TextSize) -> Result<Constant, ParseError> {
        Ok(match value {
            py::Constant::None => Constant::None,
            py::Constant::Bool(b) => Constant::Bool(*b),
            py::Constant::Int(i) => Constant::Int(
                i.to_string()
                    .parse()
                    .map_err(|_| self.error(start, "integer literal is too large"))?,
            ),
            py::Constant::Float(f) => Constant::Float(*f),
            py::Constant::Str(s) => Constant::Str {
                value: s.clone(),
                prefix: self.lines.string_prefix(start),
            },
            py::Constant::Ellipsis => Constant::Ellipsis,
            py::Constant::Bytes(_) => return Err(self.unsupported(start, "bytes literals")),
            py::Constant::Complex { .. } => return Err(self.unsupported(start, "complex literals")),
            py::Constant::Tuple(_) => return Err(self.unsupported(start, "constant tuples")),
        })
    }

    fn fstring(&mut self, values: &[py::Expr]) -> Result<Vec<FStringPart>, ParseError> {
        let mut parts: Vec<FStringPart> = Vec::with_capacity(values.len());
        for value in values {
            match value {
                py::Expr::Constant(py::ExprConstant {
                    value: py::Constant::Str(text),
                    ..
                }) => match parts.last_mut() {
                    Some(FStringPart::Literal(literal)) => literal.push_str(text),
                    _ => parts.push(FStringPart::Literal(text.clone())),
                },
                py::Expr::FormattedValue(py::ExprFormattedValue {
                    value: field,
                    conversion,
                    format_spec,
                    ..
                }) => {
                    let conversion = match conversion {
                        py::ConversionFlag::None => None,
                        py::ConversionFlag::Str => Some('s'),
                        py::ConversionFlag::Ascii => Some('a'),
                        py::ConversionFlag::Repr => Some('r'),
                    };
                    let spec = match format_spec.as_deref() {
                        Some(spec) => self.format_spec(spec)?,
                        None => String::new(),
                    };
                    parts.push(FStringPart::Field {
                        expr: self.boxed(field)?,
                        conversion,
                        spec,
                    });
                }
                py::Expr::JoinedStr(py::ExprJoinedStr { values, .. }) => parts.extend(self.fstring(values)?),
                other => return Err(self.error(other.range().start(), "f-string: invalid syntax")),
            }
        }
        Ok(parts)
    }

    /// A format spec made only of literal text.
    fn format_spec(&mut self, spec: &py::Expr) -> Result<String, ParseError> {
        let parts = match spec {
            py::Expr::JoinedStr(py::ExprJoinedStr { values, .. }) => self.fstring(values)?,
            other => self.fstring(std::slice::from_ref(other))?,
        };
        let mut text = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(literal) => text.push_str(&literal),
                FStringPart::Field { expr, .. } => {
                    return Err(ParseError::new(
                        expr.line,
                        expr.column,
                        "f-string: nested replacement fields in format specs are not supported",
                    ));
                }
            }
        }
        Ok(text)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn aliases(names: &[py::Alias]) -> Vec<Alias> {
    names
        .iter()
        .map(|alias| Alias {
            name: alias.name.as_str().to_string(),
            asname: alias.asname.as_ref().map(|name| name.as_str().to_string()),
        })
        .collect()
}

fn identifiers(names: &[py::Identifier]) -> Vec<String> {
    names.iter().map(|name| name.as_str().to_string()).collect()
}

fn bin_op(op: &py::Operator) -> BinOp {
    match op {
        py::Operator::Add => BinOp::Add,
        py::Operator::Sub => BinOp::Sub,
        py::Operator::Mult => BinOp::Mul,
        py::Operator::MatMult => BinOp::MatMul,
        py::Operator::Div => BinOp::Div,
        py::Operator::Mod => BinOp::Mod,
        py::Operator::Pow => BinOp::Pow,
        py::Operator::LShift => BinOp::LShift,
        py::Operator::RShift => BinOp::RShift,
        py::Operator::BitOr => BinOp::BitOr,
        py::Operator::BitXor => BinOp::BitXor,
        py::Operator::BitAnd => BinOp::BitAnd,
        py::Operator::FloorDiv => BinOp::FloorDiv,
    }
}

fn cmp_op(op: &py::CmpOp) -> CmpOp {
    match op {
        py::CmpOp::Eq => CmpOp::Eq,
        py::CmpOp::NotEq => CmpOp::NotEq,
        py::CmpOp::Lt => CmpOp::Lt,
        py::CmpOp::LtE => CmpOp::LtE,
        py::CmpOp::Gt => CmpOp::Gt,
        py::CmpOp::GtE => CmpOp::GtE,
        py::CmpOp::Is => CmpOp::Is,
        py::CmpOp::IsNot => CmpOp::IsNot,
        py::CmpOp::In => CmpOp::In,
        py::CmpOp::NotIn => CmpOp::NotIn,
    }
}

fn describe(expr: &Expr) -> &'static str {
    match &expr.kind {
        ExprKind::Constant(_) | ExprKind::FString(_) => "literal",
        ExprKind::Call { .. } => "function call",
        ExprKind::Lambda(_) => "lambda",
        ExprKind::Comprehension { .. } => "comprehension",
        ExprKind::Compare { .. } => "comparison",
        ExprKind::IfExp { .. } => "conditional expression",
        ExprKind::Dict(_) => "dict literal",
        ExprKind::Set(_) => "set display",
        _ => "expression",
    }
}

fn check_target(expr: &Expr, action: &str) -> Result<(), ParseError> {
    match &expr.kind {
        ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            let starred = items
                .iter()
                .filter(|item| matches!(item.kind, ExprKind::Starred(_)))
                .count();
            if starred > 1 {
                return Err(ParseError::new(
                    expr.line,
                    expr.column,
                    "multiple starred expressions in assignment",
                ));
            }
            items.iter().try_for_each(|item| check_target(item, action))
        }
        ExprKind::Starred(inner) if action != "delete" => check_target(inner, action),
        _ => Err(ParseError::new(
            expr.line,
            expr.column,
            format!("cannot {action} {}", describe(expr)),
        )),
    }
}

fn check_single_target(expr: &Expr, context: &str) -> Result<(), ParseError> {
    match &expr.kind {
        ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
        _ => Err(ParseError::new(
            expr.line,
            expr.column,
            format!("illegal target for {context}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(source: &str) -> Suite {
        parse(source).unwrap().body
    }

    fn only_expr(source: &str) -> Expr {
        match body(source).remove(0).kind {
            StmtKind::Expr(e) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_and_positions() {
        let stmts = body("x = 1\n\ny = x + 1\n");
        assert_eq!(stmts.len(), 2);
        assert_eq!((stmts[1].line, stmts[1].column), (3, 1));
        assert!(matches!(&stmts[0].kind, StmtKind::Assign { targets, .. } if targets.len() == 1));
        match &stmts[1].kind {
            StmtKind::Assign { value, .. } => assert_eq!((value.line, value.column), (3, 5)),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_chained_and_tuple_assignment() {
        let stmts = body("a = b = 1\nc, d = 1, 2\n");
        match &stmts[0].kind {
            StmtKind::Assign { targets, .. } => assert_eq!(targets.len(), 2),
            other => panic!("{other:?}"),
        }
        match &stmts[1].kind {
            StmtKind::Assign { targets, value } => {
                assert!(matches!(targets[0].kind, ExprKind::Tuple(_)));
                assert!(matches!(value.kind, ExprKind::Tuple(_)));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_power_binds_tighter_than_unary_minus() {
        match only_expr("-2 ** 2").kind {
            ExprKind::UnaryOp { op, operand } => {
                assert_eq!(op, UnaryOp::Neg);
                assert!(matches!(operand.kind, ExprKind::BinOp { op: BinOp::Pow, .. }));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_compound_statements_span_lines() {
        let stmts = body("def f(a, b=2, *args, c, **kw):\n    return a\n\nx = 1\n");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].end_line, 2);
        match &stmts[0].kind {
            StmtKind::FunctionDef(def) => {
                assert_eq!(def.params.positional.len(), 2);
                assert_eq!(def.params.vararg.as_deref(), Some("args"));
                assert_eq!(def.params.kwonly.len(), 1);
                assert_eq!(def.params.kwarg.as_deref(), Some("kw"));
                assert_eq!(def.params.defaults().count(), 1);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_multiline_string_statement_spans_its_lines() {
        let stmts = body("x = 1\n\"\"\"\nnotes\n\"\"\"\ny = 2\n");
        assert_eq!((stmts[1].line, stmts[1].end_line), (2, 4));
        assert_eq!(stmts[2].line, 5);
    }

    #[test]
    fn test_try_statement() {
        let source = "try:\n    x = 1\nexcept ValueError as e:\n    pass\nelse:\n    y = 2\nfinally:\n    z = 3\n";
        match &body(source)[0].kind {
            StmtKind::Try {
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                assert_eq!(handlers[0].name.as_deref(), Some("e"));
                assert_eq!(handlers[0].line, 3);
                assert_eq!(orelse.len(), 1);
                assert_eq!(finalbody.len(), 1);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_comprehensions() {
        assert!(matches!(
            only_expr("[x * 2 for x in items if x]").kind,
            ExprKind::Comprehension {
                kind: ComprehensionKind::List,
                ..
            }
        ));
        assert!(matches!(
            only_expr("{k: v for k, v in pairs}").kind,
            ExprKind::Comprehension {
                kind: ComprehensionKind::Dict,
                value: Some(_),
                ..
            }
        ));
        match only_expr("sum(x for x in xs)").kind {
            ExprKind::Call { args, .. } => assert!(matches!(
                args[0].expr().kind,
                ExprKind::Comprehension {
                    kind: ComprehensionKind::Generator,
                    ..
                }
            )),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_call_arguments_keep_their_kind() {
        match only_expr("f(a, *rest, key=1, **extra)").kind {
            ExprKind::Call { args, .. } => {
                assert!(matches!(args[0], Arg::Positional(_)));
                assert!(matches!(args[1], Arg::Starred(_)));
                assert!(matches!(&args[2], Arg::Keyword(name, _) if name == "key"));
                assert!(matches!(args[3], Arg::DoubleStarred(_)));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_slices() {
        match only_expr("a[::-1]").kind {
            ExprKind::Subscript { index, .. } => match index.kind {
                ExprKind::Slice { lower, upper, step } => {
                    assert!(lower.is_none() && upper.is_none() && step.is_some());
                }
                other => panic!("{other:?}"),
            },
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_fstring_fields() {
        match only_expr("f'{x!r:>10} and {{literal}} {y + 1}'").kind {
            ExprKind::FString(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[0], FStringPart::Field { conversion: Some('r'), spec, .. } if spec == ">10"));
                assert_eq!(parts[1], FStringPart::Literal(" and {literal} ".into()));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_string_literals_keep_prefix() {
        match only_expr("'a' \"b\"").kind {
            ExprKind::Constant(Constant::Str { value, prefix }) => {
                assert_eq!(value, "ab");
                assert_eq!(prefix, "");
            }
            other => panic!("{other:?}"),
        }
        match only_expr("r'\\d+'").kind {
            ExprKind::Constant(Constant::Str { value, prefix }) => {
                assert_eq!(value, "\\d+");
                assert_eq!(prefix, "r");
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_imports() {
        let stmts = body("import a.b as c, d\nfrom e import (f, g as h)\nfrom m import *\n");
        assert!(matches!(&stmts[0].kind, StmtKind::Import(names) if names.len() == 2 && names[0].name == "a.b"));
        assert!(matches!(&stmts[1].kind, StmtKind::ImportFrom { names, .. } if names[1].asname.as_deref() == Some("h")));
        assert!(matches!(&stmts[2].kind, StmtKind::ImportFrom { names, .. } if names[0].name == "*"));
    }

    #[test]
    fn test_lambda_becomes_function() {
        match only_expr("lambda x, y=1: x + y").kind {
            ExprKind::Lambda(def) => {
                assert_eq!(def.name, "<lambda>");
                assert_eq!(def.params.positional.len(), 2);
                assert!(matches!(def.body[0].kind, StmtKind::Return(Some(_))));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_errors_report_location() {
        let err = parse("x = 1\ny = (2 +\n").unwrap_err();
        assert!(err.line >= 2);

        let err = parse("x = = 1\n").unwrap_err();
        assert_eq!((err.line, err.column), (1, 5));

        let err = parse("1 = x\n").unwrap_err();
        assert!(err.message.contains("cannot assign to literal"));

        let err = parse("def f():\nreturn 1\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_unsupported_constructs_are_rejected() {
        let err = parse("x = 1\nwith open('f') as fh:\n    pass\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("'with' statements"));

        assert!(parse("(y := 3)\n").unwrap_err().message.contains("assignment expressions"));
        assert!(parse("{**base}\n").unwrap_err().message.contains("dict unpackings"));
        assert!(parse("x = 99999999999999999999\n").unwrap_err().message.contains("too large"));
        assert!(parse("f'{x:{width}}'\n").is_err());
    }

    #[test]
    fn test_deep_bracket_nesting_is_an_error() {
        let deep = format!("x = {}1{}\n", "(".repeat(20_000), ")".repeat(20_000));
        let err = parse(&deep).unwrap_err();
        assert_eq!(err.message, "too many nested parentheses");
        assert_eq!(err.line, 1);

        let shallow = format!("x = {}1{}\n", "[".repeat(50), "]".repeat(50));
        assert!(parse(&shallow).is_ok());
    }

    #[test]
    fn test_deep_expression_chain_is_an_error() {
        let deep = format!("x = {}1\n", "-".repeat(5_000));
        let err = parse(&deep).unwrap_err();
        assert_eq!(err.message, "expression is too deeply nested");
    }

    #[test]
    fn test_comments_are_located() {
        let comments = comments("x = 1  # trailing\n# %% Cell\ns = '# not a comment'\n").unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!((comments[0].line, comments[0].column), (1, 8));
        assert_eq!(comments[1].text, "# %% Cell");
        assert_eq!((comments[1].line, comments[1].column), (2, 1));
    }
}
