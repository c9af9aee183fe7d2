//! FROM clause containment expressions

use crate::path::{render_predicates, AndPredicate};
use std::fmt;

/// Containment expression of the FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum Containment {
    /// `EHR e[...]`, `COMPOSITION c[...]`, optionally followed by `CONTAINS`
    Class(ContainmentClass),
    /// `VERSION v[LATEST_VERSION]` / `VERSION v[ALL_VERSIONS]`
    Version(ContainmentVersion),
    /// `a AND b`, `a OR b`
    Set(ContainmentSet),
    /// `NOT CONTAINS x`
    Not(Box<Containment>),
}

impl Containment {
    pub fn class(rm_type: impl Into<String>, identifier: Option<&str>) -> Self {
        Containment::Class(ContainmentClass::new(rm_type, identifier))
    }

    /// Identifiers bound by this expression, in declaration order
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Containment::Class(c) => {
                if let Some(id) = &c.identifier {
                    out.push(id);
                }
                if let Some(inner) = &c.contains {
                    inner.collect_identifiers(out);
                }
            }
            Containment::Version(v) => {
                if let Some(id) = &v.identifier {
                    out.push(id);
                }
                if let Some(inner) = &v.contains {
                    inner.collect_identifiers(out);
                }
            }
            Containment::Set(set) => {
                for value in &set.values {
                    value.collect_identifiers(out);
                }
            }
            Containment::Not(inner) => inner.collect_identifiers(out),
        }
    }
}

impl fmt::Display for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Containment::Class(c) => write!(f, "{c}"),
            Containment::Version(v) => write!(f, "{v}"),
            Containment::Set(set) => {
                let op = match set.operator {
                    ContainmentSetOperator::And => " AND ",
                    ContainmentSetOperator::Or => " OR ",
                };
                let parts = set
                    .values
                    .iter()
                    .map(|v| match v {
                        Containment::Set(_) => format!("({v})"),
                        _ => v.to_string(),
                    })
                    .collect::<Vec<_>>();
                f.write_str(&parts.join(op))
            }
            Containment::Not(inner) => write!(f, "NOT CONTAINS {inner}"),
        }
    }
}

/// A class expression with its identifier and predicates
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentClass {
    pub rm_type: String,
    pub identifier: Option<String>,
    pub predicates: Vec<AndPredicate>,
    pub contains: Option<Box<Containment>>,
}

impl ContainmentClass {
    pub fn new(rm_type: impl Into<String>, identifier: Option<&str>) -> Self {
        Self {
            rm_type: rm_type.into(),
            identifier: identifier.map(str::to_string),
            predicates: Vec::new(),
            contains: None,
        }
    }

    pub fn with_predicates(mut self, predicates: Vec<AndPredicate>) -> Self {
        self.predicates = predicates;
        self
    }

    pub fn containing(mut self, contains: Containment) -> Self {
        self.contains = Some(Box::new(contains));
        self
    }
}

fn write_contains(f: &mut fmt::Formatter<'_>, contains: &Option<Box<Containment>>) -> fmt::Result {
    match contains.as_deref() {
        None => Ok(()),
        Some(Containment::Not(inner)) => write!(f, " NOT CONTAINS {inner}"),
        Some(set @ Containment::Set(_)) => write!(f, " CONTAINS ({set})"),
        Some(other) => write!(f, " CONTAINS {other}"),
    }
}

impl fmt::Display for ContainmentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rm_type)?;
        if let Some(id) = &self.identifier {
            write!(f, " {id}")?;
        }
        if !self.predicates.is_empty() {
            write!(f, "[{}]", render_predicates(&self.predicates))?;
        }
        write_contains(f, &self.contains)
    }
}

/// Which versions a VERSION containment selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    Latest,
    All,
}

/// `VERSION v[...] CONTAINS ...`
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentVersion {
    pub identifier: Option<String>,
    pub selector: VersionSelector,
    pub contains: Option<Box<Containment>>,
}

impl fmt::Display for ContainmentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VERSION")?;
        if let Some(id) = &self.identifier {
            write!(f, " {id}")?;
        }
        match self.selector {
            VersionSelector::Latest => f.write_str("[LATEST_VERSION]")?,
            VersionSelector::All => f.write_str("[ALL_VERSIONS]")?,
        }
        write_contains(f, &self.contains)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainmentSetOperator {
    And,
    Or,
}

/// Logical combination of containment expressions
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentSet {
    pub operator: ContainmentSetOperator,
    pub values: Vec<Containment>,
}
