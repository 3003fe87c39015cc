//! Remote-safety analysis for restriction clauses.
//!
//! A clause is pushed down only when every node of its tree is expressible
//! in the remote dialect. Anything else is evaluated by the host after the
//! rows come back, which is always correctness-preserving.

use std::collections::BTreeSet;

use super::deparse::{remote_function, remote_operator};
use crate::expr::{Expr, Literal, Restriction};
use crate::types::AttrNum;

/// Tests whether an entire expression tree can be rendered in the remote
/// dialect.
pub fn is_remote_safe(expr: &Expr) -> bool {
    match expr {
        Expr::Column(_) | Expr::Param { .. } => true,
        Expr::Literal(lit) => literal_is_remote_safe(lit),
        Expr::Op { name, args } => {
            remote_operator(name).is_some() && args.iter().all(is_remote_safe)
        }
        Expr::Func {
            name,
            args,
            volatile,
        } => !volatile && remote_function(name).is_some() && args.iter().all(is_remote_safe),
        Expr::Bool { args, .. } => args.iter().all(is_remote_safe),
        Expr::NullTest { arg, .. } => is_remote_safe(arg),
        // Host casts have no remote counterpart.
        Expr::Cast { .. } => false,
    }
}

fn literal_is_remote_safe(literal: &Literal) -> bool {
    match literal {
        // NaN and infinities have no literal rendering in the dialect.
        Literal::Float(value) => value.is_finite(),
        Literal::Null | Literal::Bool(_) | Literal::Int(_) | Literal::String(_) => true,
    }
}

/// Partitions restriction clauses into remote-safe and local-only sets.
/// Pseudo-constant clauses are handled by the host elsewhere and land in
/// neither set.
pub fn classify(restrictions: &[Restriction]) -> (Vec<Restriction>, Vec<Restriction>) {
    let mut remote = Vec::new();
    let mut local = Vec::new();
    for restriction in restrictions {
        if restriction.pseudoconstant {
            continue;
        }
        if is_remote_safe(&restriction.expr) {
            remote.push(restriction.clone());
        } else {
            local.push(restriction.clone());
        }
    }
    (remote, local)
}

/// Attribute numbers that must be fetched from the remote side: everything
/// the projected output references plus everything the local-only clauses
/// reference. A column needed only for local filtering is still retrieved.
pub fn needed_attrs(targets: &[Expr], local_conds: &[Restriction]) -> BTreeSet<AttrNum> {
    let mut attrs = BTreeSet::new();
    for expr in targets {
        expr.collect_attrs(&mut attrs);
    }
    for restriction in local_conds {
        restriction.expr.collect_attrs(&mut attrs);
    }
    attrs
}
