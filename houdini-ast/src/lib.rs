#![forbid(unsafe_code)]

use std::fmt;

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

/// Placeholder span for synthesized nodes (axioms, test fixtures).
pub fn no_span() -> Span {
    span(0, 0)
}

pub type Ident = Spanned<String>;

pub fn ident(name: impl Into<String>) -> Ident {
    Spanned::new(no_span(), name.into())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
}

impl Program {
    pub fn constants(&self) -> impl Iterator<Item = &ConstantDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Constant(c) => Some(c),
            _ => None,
        })
    }

    pub fn procedures(&self) -> impl Iterator<Item = &ProcedureDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Procedure(p) => Some(p),
            _ => None,
        })
    }

    /// Implementations in declaration order.
    pub fn implementations(&self) -> impl Iterator<Item = &ImplementationDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Implementation(i) => Some(i),
            _ => None,
        })
    }

    pub fn procedure(&self, name: &str) -> Option<&ProcedureDecl> {
        self.procedures().find(|p| p.name.node == name)
    }

    pub fn implementation(&self, name: &str) -> Option<&ImplementationDecl> {
        self.implementations().find(|i| i.name.node == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    Constant(ConstantDecl),
    Procedure(ProcedureDecl),
    Implementation(ImplementationDecl),
}

impl Decl {
    pub fn name(&self) -> &Ident {
        match self {
            Decl::Constant(c) => &c.name,
            Decl::Procedure(p) => &p.name,
            Decl::Implementation(i) => &i.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Decl::Constant(_) => "constant",
            Decl::Procedure(_) => "procedure",
            Decl::Implementation(_) => "implementation",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRef {
    Bool,
    Int,
    Named(String),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::Int => f.write_str("int"),
            TypeRef::Named(n) => f.write_str(n),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstantDecl {
    pub span: Span,
    pub name: Ident,
    pub ty: TypeRef,
    pub attributes: Vec<Attribute>,
}

impl ConstantDecl {
    /// Reads a boolean attribute. A bare flag (`{:name}`) counts as `true`;
    /// a non-boolean value yields `None`.
    pub fn bool_attribute(&self, key: &str) -> Option<bool> {
        let attr = self.attributes.iter().rev().find(|a| a.key.node == key)?;
        match &attr.value {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Flag => Some(true),
            AttrValue::Str(_) | AttrValue::Int(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub span: Span,
    pub key: Ident,
    pub value: AttrValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    Flag,
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProcedureDecl {
    pub span: Span,
    pub name: Ident,
    pub requires: Vec<Contract>,
    pub ensures: Vec<Contract>,
}

/// A `requires`/`ensures` clause. Free clauses are assumed but never checked.
#[derive(Clone, Debug, PartialEq)]
pub struct Contract {
    pub span: Span,
    pub free: bool,
    pub condition: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImplementationDecl {
    pub span: Span,
    pub name: Ident,
    pub procedure: Ident,
    pub blocks: Vec<Block>,
}

impl ImplementationDecl {
    pub fn cmds(&self) -> impl Iterator<Item = &Cmd> {
        self.blocks.iter().flat_map(|b| b.cmds.iter())
    }

    pub fn calls(&self) -> impl Iterator<Item = &CallCmd> {
        self.cmds().filter_map(|c| match c {
            Cmd::Call(call) => Some(call),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub label: Ident,
    pub cmds: Vec<Cmd>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cmd {
    Call(CallCmd),
    Assert(PredicateCmd),
    Assume(PredicateCmd),
}

impl Cmd {
    pub fn span(&self) -> Span {
        match self {
            Cmd::Call(c) => c.span,
            Cmd::Assert(p) | Cmd::Assume(p) => p.span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallCmd {
    pub span: Span,
    pub callee: Ident,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PredicateCmd {
    pub span: Span,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    BoolLit(bool),
    Ident(Ident),
    /// Opaque relation (`x > 0`, `len(a) <= n`), kept as canonical token text.
    Atom(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Implies,
    Or,
    And,
    Eq,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Implies => "==>",
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
        }
    }
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self { span, kind }
    }

    pub fn bool_lit(value: bool) -> Self {
        Self::new(no_span(), ExprKind::BoolLit(value))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(no_span(), ExprKind::Ident(ident(name)))
    }

    pub fn atom(text: impl Into<String>) -> Self {
        Self::new(no_span(), ExprKind::Atom(text.into()))
    }

    pub fn not(expr: Expr) -> Self {
        Self::new(
            expr.span,
            ExprKind::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            },
        )
    }

    pub fn binary(left: Expr, op: BinOp, right: Expr) -> Self {
        let span = join(left.span, right.span);
        Self::new(
            span,
            ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
        )
    }

    pub fn implies(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinOp::Implies, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinOp::And, right)
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinOp::Eq, right)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(id) => Some(&id.node),
            _ => None,
        }
    }

    /// Splits `a ==> b` into `(a, b)`.
    pub fn as_implication(&self) -> Option<(&Expr, &Expr)> {
        match &self.kind {
            ExprKind::Binary {
                left,
                op: BinOp::Implies,
                right,
            } => Some((left, right)),
            _ => None,
        }
    }

    /// Flattens nested `&&` into its conjuncts (left to right).
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        collect_conjuncts(self, &mut out);
        out
    }
}

fn collect_conjuncts<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match &expr.kind {
        ExprKind::Binary {
            left,
            op: BinOp::And,
            right,
        } => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        _ => out.push(expr),
    }
}

pub fn join(a: Span, b: Span) -> Span {
    let a0: usize = a.offset();
    let b0: usize = b.offset();
    let a1 = a0 + a.len();
    let b1 = b0 + b.len();
    span_between(a0.min(b0), a1.max(b1))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Lowest,
    Implies,
    Or,
    And,
    Eq,
    Unary,
    Primary,
}

fn bin_prec(op: BinOp) -> Prec {
    match op {
        BinOp::Implies => Prec::Implies,
        BinOp::Or => Prec::Or,
        BinOp::And => Prec::And,
        BinOp::Eq => Prec::Eq,
    }
}

fn fmt_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, parent: Prec) -> fmt::Result {
    match &expr.kind {
        ExprKind::BoolLit(b) => write!(f, "{b}"),
        ExprKind::Ident(id) => f.write_str(&id.node),
        ExprKind::Atom(text) => {
            // Multi-token atoms bind looser than `!`.
            if parent == Prec::Unary && text.contains(' ') {
                write!(f, "({text})")
            } else {
                f.write_str(text)
            }
        }
        ExprKind::Unary { op: UnaryOp::Not, expr } => {
            f.write_str("!")?;
            fmt_expr(f, expr, Prec::Unary)
        }
        ExprKind::Binary { left, op, right } => {
            let prec = bin_prec(*op);
            let parens = prec < parent;
            if parens {
                f.write_str("(")?;
            }
            // `==>` is right associative; `&&`/`||`/`==` group to the left.
            let (lp, rp) = match op {
                BinOp::Implies => (next_prec(prec), prec),
                _ => (prec, next_prec(prec)),
            };
            fmt_expr(f, left, lp)?;
            write!(f, " {} ", op.symbol())?;
            fmt_expr(f, right, rp)?;
            if parens {
                f.write_str(")")?;
            }
            Ok(())
        }
    }
}

fn next_prec(p: Prec) -> Prec {
    match p {
        Prec::Lowest => Prec::Implies,
        Prec::Implies => Prec::Or,
        Prec::Or => Prec::And,
        Prec::And => Prec::Eq,
        Prec::Eq => Prec::Unary,
        Prec::Unary | Prec::Primary => Prec::Primary,
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expr(f, self, Prec::Lowest)
    }
}
