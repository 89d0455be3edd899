// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQL expression model: a minimal AST plus a per-dialect render pass.

mod dialect;
mod expr;

pub use dialect::Dialect;
pub use expr::{rewrite, AggKind, BinOp, CaseBuilder, Expr, Lit, Rewriter};
