//! Ordering between contracts

use super::{element_at_rank, Contract, Primitive};

/// How the first contract relates to the second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    /// Both describe exactly the same values
    Same,
    /// The first admits every value of the second (and possibly more)
    Superset,
    /// The second admits every value of the first
    Subset,
    /// Neither contains the other
    None,
}

impl Relationship {
    /// The relationship seen from the other side
    pub fn inverse(self) -> Self {
        match self {
            Relationship::Superset => Relationship::Subset,
            Relationship::Subset => Relationship::Superset,
            other => other,
        }
    }

    pub fn is_superset_or_same(self) -> bool {
        matches!(self, Relationship::Same | Relationship::Superset)
    }

    pub fn is_subset_or_same(self) -> bool {
        matches!(self, Relationship::Same | Relationship::Subset)
    }

    /// Fold two component relationships of a compound contract
    fn and(self, other: Self) -> Self {
        match (self, other) {
            (Relationship::Same, r) | (r, Relationship::Same) => r,
            (Relationship::Superset, Relationship::Superset) => Relationship::Superset,
            (Relationship::Subset, Relationship::Subset) => Relationship::Subset,
            _ => Relationship::None,
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Relationship::Same => "same",
            Relationship::Superset => "superset",
            Relationship::Subset => "subset",
            Relationship::None => "none",
        };
        f.write_str(name)
    }
}

/// Compute how `a` relates to `b`.
///
/// Void is below everything, Super is above everything but Meta, and
/// compound contracts are compared component-wise.
pub fn relationship(a: &Contract, b: &Contract) -> Relationship {
    if a == b {
        return Relationship::Same;
    }
    match (a, b) {
        (Contract::Primitive(Primitive::Void), _) => Relationship::Subset,
        (_, Contract::Primitive(Primitive::Void)) => Relationship::Superset,
        (Contract::Meta, _) | (_, Contract::Meta) => Relationship::None,
        (Contract::Super, _) => Relationship::Superset,
        (_, Contract::Super) => Relationship::Subset,
        (Contract::Primitive(p), Contract::Primitive(q)) => primitives(*p, *q),
        (Contract::FiniteSet(x), Contract::FiniteSet(y)) => {
            let x_in_y = x.iter().all(|m| y.iter().any(|n| m.strict_eq(n)));
            let y_in_x = y.iter().all(|m| x.iter().any(|n| m.strict_eq(n)));
            match (x_in_y, y_in_x) {
                (true, true) => Relationship::Same,
                (true, false) => Relationship::Subset,
                (false, true) => Relationship::Superset,
                (false, false) => Relationship::None,
            }
        }
        (Contract::FiniteSet(members), other) => set_within(members, other),
        (other, Contract::FiniteSet(members)) => set_within(members, other).inverse(),
        (
            Contract::Array { element: e1, rank: r1 },
            Contract::Array { element: e2, rank: r2 },
        ) => {
            if r1 == r2 {
                relationship(e1, e2)
            } else {
                // A rank-2 array of X is a rank-1 array of X[]
                let (low, high) = if r1 < r2 { (a, b) } else { (b, a) };
                let lifted = match (low, high) {
                    (
                        Contract::Array { element, rank },
                        Contract::Array {
                            element: deep,
                            rank: deep_rank,
                        },
                    ) => relationship(element, &element_at_rank(deep, deep_rank - rank + 1)),
                    _ => Relationship::None,
                };
                if r1 < r2 { lifted } else { lifted.inverse() }
            }
        }
        (Contract::Product(x), Contract::Product(y)) => {
            if x.len() != y.len() {
                return Relationship::None;
            }
            x.iter()
                .zip(y.iter())
                .fold(Relationship::Same, |acc, (p, q)| acc.and(relationship(p, q)))
        }
        (Contract::Composite(x), Contract::Composite(y)) => {
            let x_wider = members_cover(x, y);
            let y_wider = members_cover(y, x);
            match (x_wider, y_wider) {
                (true, true) => Relationship::Same,
                (true, false) => Relationship::Superset,
                (false, true) => Relationship::Subset,
                (false, false) => Relationship::None,
            }
        }
        (Contract::Function(f), Contract::Function(g)) => {
            if f.params.len() != g.params.len() {
                return Relationship::None;
            }
            // Parameters are contravariant, the result is covariant
            f.params
                .iter()
                .zip(g.params.iter())
                .fold(relationship(&f.ret, &g.ret), |acc, (p, q)| {
                    acc.and(relationship(p, q).inverse())
                })
        }
        _ => Relationship::None,
    }
}

fn primitives(p: Primitive, q: Primitive) -> Relationship {
    match (p, q) {
        (Primitive::Integer, Primitive::Real) => Relationship::Subset,
        (Primitive::Real, Primitive::Integer) => Relationship::Superset,
        _ => Relationship::None,
    }
}

/// A finite set sits below any contract accepting all of its members
fn set_within(members: &[crate::interp::Value], other: &Contract) -> Relationship {
    if members.iter().all(|m| other.accepts(m)) {
        Relationship::Subset
    } else {
        Relationship::None
    }
}

/// `wide` constrains a subset of what `narrow` constrains: each of its
/// members must exist in `narrow` with a contract no narrower than the one
/// `narrow` declares. Extra members of `narrow` only restrict it further.
fn members_cover(
    wide: &std::collections::BTreeMap<String, Contract>,
    narrow: &std::collections::BTreeMap<String, Contract>,
) -> bool {
    wide.iter().all(|(name, contract)| {
        narrow
            .get(name)
            .is_some_and(|other| relationship(contract, other).is_superset_or_same())
    })
}
