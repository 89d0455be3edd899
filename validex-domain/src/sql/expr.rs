// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A minimal SQL expression tree.
//!
//! This is not a general-purpose SQL parser/AST — it is exactly the subset
//! of SQL a [`crate::metric::MetricBuilder`] needs to express an aggregate
//! over a table: identifiers, literals, function calls, binary operators,
//! `CASE WHEN`, `CAST`, the five standard aggregates, and division. Every
//! node renders to a [`Dialect`]-specific string, and [`rewrite`] lets a
//! [`Rewriter`] replace any subtree — used by the per-request filter rewrite
//! in [`crate::batch`].

use super::dialect::Dialect;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Str(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Sub,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Eq => "=",
            BinOp::NotEq => "<>",
            BinOp::Lt => "<",
            BinOp::Lte => "<=",
            BinOp::Gt => ">",
            BinOp::Gte => ">=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
            BinOp::Sub => "-",
        };
        write!(f, "{s}")
    }
}

/// The aggregate functions a [`crate::metric::MetricBuilder`] may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    CountStar,
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    StdDev,
}

impl AggKind {
    fn keyword(&self) -> &'static str {
        match self {
            AggKind::CountStar | AggKind::Count => "COUNT",
            AggKind::CountDistinct => "COUNT",
            AggKind::Sum => "SUM",
            AggKind::Avg => "AVG",
            AggKind::Min => "MIN",
            AggKind::Max => "MAX",
            AggKind::StdDev => "STDDEV_SAMP",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A raw SQL identifier (table name, alias); not quoted by default.
    Raw(String),
    Lit(Lit),
    /// A column reference, quoted per-dialect on render.
    Column(String),
    Call(String, Vec<Expr>),
    BinaryOp(Box<Expr>, BinOp, Box<Expr>),
    IsNull { expr: Box<Expr>, negated: bool },
    /// `CASE WHEN c1 THEN r1 WHEN c2 THEN r2 ... [ELSE e] END`
    Case {
        arms: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Cast { expr: Box<Expr>, ty: String },
    /// `arg` is `None` only for `COUNT(*)`.
    Agg { kind: AggKind, arg: Option<Box<Expr>> },
    /// Numerator / denominator rendered as `num / NULLIF(den, 0)`.
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }

    pub fn lit_i64(v: i64) -> Expr {
        Expr::Lit(Lit::I64(v))
    }

    pub fn count_star() -> Expr {
        Expr::Agg { kind: AggKind::CountStar, arg: None }
    }

    pub fn count(arg: Expr) -> Expr {
        Expr::Agg { kind: AggKind::Count, arg: Some(Box::new(arg)) }
    }

    pub fn count_distinct(arg: Expr) -> Expr {
        Expr::Agg { kind: AggKind::CountDistinct, arg: Some(Box::new(arg)) }
    }

    pub fn sum(arg: Expr) -> Expr {
        Expr::Agg { kind: AggKind::Sum, arg: Some(Box::new(arg)) }
    }

    pub fn min(arg: Expr) -> Expr {
        Expr::Agg { kind: AggKind::Min, arg: Some(Box::new(arg)) }
    }

    pub fn max(arg: Expr) -> Expr {
        Expr::Agg { kind: AggKind::Max, arg: Some(Box::new(arg)) }
    }

    pub fn avg(arg: Expr) -> Expr {
        Expr::Agg { kind: AggKind::Avg, arg: Some(Box::new(arg)) }
    }

    pub fn stddev(arg: Expr) -> Expr {
        Expr::Agg { kind: AggKind::StdDev, arg: Some(Box::new(arg)) }
    }

    pub fn div(num: Expr, den: Expr) -> Expr {
        Expr::Div(Box::new(num), Box::new(den))
    }

    pub fn is_null(expr: Expr) -> Expr {
        Expr::IsNull { expr: Box::new(expr), negated: false }
    }

    pub fn is_not_null(expr: Expr) -> Expr {
        Expr::IsNull { expr: Box::new(expr), negated: true }
    }

    pub fn case_when(cond: Expr, then: Expr) -> CaseBuilder {
        CaseBuilder { arms: vec![(cond, then)], otherwise: None }
    }

    /// True for a top-level aggregate or a ratio of aggregates — the only
    /// shapes a `MetricBuilder` is allowed to return at its root.
    pub fn is_metric_root(&self) -> bool {
        match self {
            Expr::Agg { .. } => true,
            Expr::Div(num, den) => num.is_metric_root() && den.is_metric_root(),
            Expr::BinaryOp(lhs, BinOp::Sub, rhs) => lhs.is_metric_root() && rhs.is_metric_root(),
            _ => false,
        }
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::BinaryOp(Box::new(lhs), BinOp::Sub, Box::new(rhs))
    }

    pub fn render(&self, dialect: Dialect) -> String {
        match self {
            Expr::Raw(s) => s.clone(),
            Expr::Lit(lit) => render_lit(lit),
            Expr::Column(name) => dialect.quote_ident(name),
            Expr::Call(name, args) => {
                let rendered = args.iter().map(|a| a.render(dialect)).collect::<Vec<_>>().join(", ");
                format!("{name}({rendered})")
            }
            Expr::BinaryOp(lhs, op, rhs) => {
                format!("({} {} {})", lhs.render(dialect), op, rhs.render(dialect))
            }
            Expr::IsNull { expr, negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("({} {})", expr.render(dialect), keyword)
            }
            Expr::Case { arms, otherwise } => {
                let mut s = String::from("CASE");
                for (cond, res) in arms {
                    s.push_str(&format!(" WHEN {} THEN {}", cond.render(dialect), res.render(dialect)));
                }
                if let Some(e) = otherwise {
                    s.push_str(&format!(" ELSE {}", e.render(dialect)));
                }
                s.push_str(" END");
                s
            }
            Expr::Cast { expr, ty } => format!("CAST({} AS {})", expr.render(dialect), ty),
            Expr::Agg { kind, arg } => render_agg(*kind, arg.as_deref(), dialect),
            Expr::Div(num, den) => {
                format!("({} / NULLIF({}, 0))", num.render(dialect), den.render(dialect))
            }
        }
    }
}

fn render_lit(lit: &Lit) -> String {
    match lit {
        Lit::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Lit::I64(v) => v.to_string(),
        Lit::F64(v) => v.to_string(),
        Lit::Bool(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        Lit::Null => "NULL".to_string(),
    }
}

fn render_agg(kind: AggKind, arg: Option<&Expr>, dialect: Dialect) -> String {
    match kind {
        AggKind::CountStar => "COUNT(*)".to_string(),
        AggKind::CountDistinct => {
            format!("COUNT(DISTINCT {})", arg.expect("COUNT DISTINCT requires an argument").render(dialect))
        }
        other => format!("{}({})", other.keyword(), arg.expect("aggregate requires an argument").render(dialect)),
    }
}

/// Fluent builder for [`Expr::Case`].
pub struct CaseBuilder {
    arms: Vec<(Expr, Expr)>,
    otherwise: Option<Box<Expr>>,
}

impl CaseBuilder {
    pub fn when(mut self, cond: Expr, then: Expr) -> Self {
        self.arms.push((cond, then));
        self
    }

    pub fn otherwise(mut self, expr: Expr) -> Self {
        self.otherwise = Some(Box::new(expr));
        self
    }

    pub fn build(self) -> Expr {
        Expr::Case { arms: self.arms, otherwise: self.otherwise }
    }
}

impl From<CaseBuilder> for Expr {
    fn from(b: CaseBuilder) -> Expr {
        b.build()
    }
}

/// Rewrites an expression tree bottom-up, letting a [`Rewriter`] intercept
/// aggregate nodes. All other node shapes are reconstructed unchanged around
/// the rewritten children.
pub fn rewrite(expr: &Expr, visitor: &dyn Rewriter) -> Expr {
    match expr {
        Expr::Agg { kind, arg } => {
            let arg = arg.as_deref().map(|a| rewrite(a, visitor));
            visitor.rewrite_agg(*kind, arg)
        }
        Expr::Div(num, den) => Expr::Div(Box::new(rewrite(num, visitor)), Box::new(rewrite(den, visitor))),
        Expr::BinaryOp(lhs, op, rhs) => {
            Expr::BinaryOp(Box::new(rewrite(lhs, visitor)), *op, Box::new(rewrite(rhs, visitor)))
        }
        Expr::IsNull { expr, negated } => Expr::IsNull { expr: Box::new(rewrite(expr, visitor)), negated: *negated },
        Expr::Case { arms, otherwise } => Expr::Case {
            arms: arms.iter().map(|(c, r)| (rewrite(c, visitor), rewrite(r, visitor))).collect(),
            otherwise: otherwise.as_deref().map(|e| Box::new(rewrite(e, visitor))),
        },
        Expr::Cast { expr, ty } => Expr::Cast { expr: Box::new(rewrite(expr, visitor)), ty: ty.clone() },
        Expr::Call(name, args) => Expr::Call(name.clone(), args.iter().map(|a| rewrite(a, visitor)).collect()),
        leaf @ (Expr::Raw(_) | Expr::Lit(_) | Expr::Column(_)) => leaf.clone(),
    }
}

/// Intercepts aggregate nodes during [`rewrite`]. The default method leaves
/// every aggregate untouched; the filter-rewrite pass in
/// [`crate::batch`] is the one non-trivial implementation.
pub trait Rewriter {
    fn rewrite_agg(&self, kind: AggKind, arg: Option<Expr>) -> Expr {
        Expr::Agg { kind, arg: arg.map(Box::new) }
    }
}
