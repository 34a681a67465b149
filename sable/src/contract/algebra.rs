//! Union and intersection of contracts

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{relationship, Contract, FunctionSignature, Relationship};

/// Narrowest contract admitting every value of both operands.
///
/// Unrelated scalars (and anything without a structural common ground)
/// widen to Super.
pub fn union(a: &Contract, b: &Contract) -> Contract {
    match relationship(a, b) {
        Relationship::Same | Relationship::Superset => return a.clone(),
        Relationship::Subset => return b.clone(),
        Relationship::None => {}
    }
    match (a, b) {
        (Contract::Composite(x), Contract::Composite(y)) => {
            // Keep only members both sides constrain compatibly
            let members: BTreeMap<String, Contract> = x
                .iter()
                .filter_map(|(name, cx)| {
                    let cy = y.get(name)?;
                    match relationship(cx, cy) {
                        Relationship::None => None,
                        _ => Some((name.clone(), union(cx, cy))),
                    }
                })
                .collect();
            Contract::Composite(Arc::new(members))
        }
        (
            Contract::Array { element: e1, rank: r1 },
            Contract::Array { element: e2, rank: r2 },
        ) if r1 == r2 => Contract::Array {
            element: Arc::new(union(e1, e2)),
            rank: *r1,
        },
        (Contract::FiniteSet(x), Contract::FiniteSet(y)) => {
            Contract::set(x.iter().chain(y.iter()).cloned())
        }
        (Contract::Product(x), Contract::Product(y)) if x.len() == y.len() => {
            Contract::product(x.iter().zip(y.iter()).map(|(p, q)| union(p, q)))
        }
        (Contract::Function(f), Contract::Function(g)) if f.params.len() == g.params.len() => {
            // A caller of the union may only pass what both accept
            let params: Option<Vec<Contract>> = f
                .params
                .iter()
                .zip(g.params.iter())
                .map(|(p, q)| intersect(p, q))
                .collect();
            match params {
                Some(params) => Contract::Function(Arc::new(FunctionSignature {
                    params,
                    ret: union(&f.ret, &g.ret),
                })),
                None => Contract::Super,
            }
        }
        _ => Contract::Super,
    }
}

/// Widest contract admitted by both operands, or `None` when no value can
/// satisfy both.
pub fn intersect(a: &Contract, b: &Contract) -> Option<Contract> {
    match relationship(a, b) {
        Relationship::Same | Relationship::Subset => return Some(a.clone()),
        Relationship::Superset => return Some(b.clone()),
        Relationship::None => {}
    }
    match (a, b) {
        (Contract::Composite(x), Contract::Composite(y)) => {
            let mut members = BTreeMap::new();
            for (name, cx) in x.iter() {
                let merged = match y.get(name) {
                    Some(cy) => intersect(cx, cy)?,
                    None => cx.clone(),
                };
                members.insert(name.clone(), merged);
            }
            for (name, cy) in y.iter() {
                members.entry(name.clone()).or_insert_with(|| cy.clone());
            }
            Some(Contract::Composite(Arc::new(members)))
        }
        (
            Contract::Array { element: e1, rank: r1 },
            Contract::Array { element: e2, rank: r2 },
        ) if r1 == r2 => Some(Contract::Array {
            element: Arc::new(intersect(e1, e2)?),
            rank: *r1,
        }),
        (Contract::FiniteSet(members), other) | (other, Contract::FiniteSet(members)) => {
            let kept: Vec<_> = members.iter().filter(|m| other.accepts(m)).cloned().collect();
            if kept.is_empty() {
                None
            } else {
                Some(Contract::set(kept))
            }
        }
        (Contract::Product(x), Contract::Product(y)) if x.len() == y.len() => {
            let parts: Option<Vec<Contract>> =
                x.iter().zip(y.iter()).map(|(p, q)| intersect(p, q)).collect();
            parts.map(Contract::product)
        }
        (Contract::Function(f), Contract::Function(g)) if f.params.len() == g.params.len() => {
            Some(Contract::Function(Arc::new(FunctionSignature {
                params: f
                    .params
                    .iter()
                    .zip(g.params.iter())
                    .map(|(p, q)| union(p, q))
                    .collect(),
                ret: intersect(&f.ret, &g.ret)?,
            })))
        }
        _ => None,
    }
}
