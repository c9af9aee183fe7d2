//! Object paths and path predicates

use crate::Primitive;
use smallvec::SmallVec;
use std::fmt;

/// Attribute holding the archetype or node id of a LOCATABLE
pub const ARCHETYPE_NODE_ID: &str = "archetype_node_id";

/// A path below an identified containment, e.g. `content[at0001]/data/events/value`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AqlObjectPath {
    pub nodes: Vec<PathNode>,
}

impl AqlObjectPath {
    pub fn new(nodes: Vec<PathNode>) -> Self {
        Self { nodes }
    }

    /// Path made of plain attribute names, e.g. `from_attributes(["name", "value"])`
    pub fn from_attributes<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: attributes.into_iter().map(PathNode::new).collect(),
        }
    }

    /// `archetype_node_id`
    pub fn archetype_node_id() -> Self {
        Self::from_attributes([ARCHETYPE_NODE_ID])
    }

    /// `name/value`
    pub fn name_value() -> Self {
        Self::from_attributes(["name", "value"])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn last(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    /// The nodes `[from, to)` as a new path
    pub fn sub_path(&self, from: usize, to: usize) -> Self {
        let to = to.min(self.nodes.len());
        let from = from.min(to);
        Self::new(self.nodes[from..to].to_vec())
    }

    /// Whether the path consists of the given attributes without predicates
    pub fn is_plain(&self, attributes: &[&str]) -> bool {
        self.nodes.len() == attributes.len()
            && self
                .nodes
                .iter()
                .zip(attributes)
                .all(|(n, a)| n.predicates.is_empty() && n.attribute == *a)
    }

    /// Whether this path ends with `suffix`, comparing attributes and predicates
    pub fn ends_with(&self, suffix: &AqlObjectPath) -> bool {
        self.nodes.ends_with(&suffix.nodes)
    }

    /// Render without predicates, e.g. `content/data/events`
    pub fn render_attributes(&self) -> String {
        self.nodes
            .iter()
            .map(|n| n.attribute.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for AqlObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

/// One segment of an object path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathNode {
    pub attribute: String,
    /// Alternatives joined by `or`; empty means no predicate
    pub predicates: Vec<AndPredicate>,
}

impl PathNode {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            predicates: Vec::new(),
        }
    }

    pub fn with_predicates(attribute: impl Into<String>, predicates: Vec<AndPredicate>) -> Self {
        Self {
            attribute: attribute.into(),
            predicates,
        }
    }
}

impl From<&str> for PathNode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for PathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.attribute)?;
        if !self.predicates.is_empty() {
            write!(f, "[{}]", render_predicates(&self.predicates))?;
        }
        Ok(())
    }
}

/// Render an `or`-list of predicates without the surrounding brackets
pub fn render_predicates(predicates: &[AndPredicate]) -> String {
    predicates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Conjunction of comparisons inside a path predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AndPredicate {
    pub operands: SmallVec<[ComparisonPredicate; 2]>,
}

impl AndPredicate {
    pub fn new(operands: impl IntoIterator<Item = ComparisonPredicate>) -> Self {
        Self {
            operands: operands.into_iter().collect(),
        }
    }

    /// `[archetype_node_id='<id>']`
    pub fn archetype(node_id: impl Into<String>) -> Self {
        Self::new([ComparisonPredicate::archetype_node_id(node_id)])
    }

    /// `[<id>, '<name>']`
    pub fn archetype_and_name(node_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new([
            ComparisonPredicate::archetype_node_id(node_id),
            ComparisonPredicate::name_value(name),
        ])
    }

    /// First operand comparing the given path
    pub fn operand(&self, path: &AqlObjectPath) -> Option<&ComparisonPredicate> {
        self.operands.iter().find(|op| &op.path == path)
    }

    fn shorthand(&self) -> Option<String> {
        let mut ops = self.operands.iter();
        let archetype = ops.next()?;
        if !archetype.is_archetype_node_id() || archetype.operator != PredicateOperator::Eq {
            return None;
        }
        let PredicateValue::Primitive(Primitive::String(node_id)) = &archetype.value else {
            return None;
        };
        match (ops.next(), ops.next()) {
            (None, _) => Some(node_id.clone()),
            (Some(name), None)
                if name.operator == PredicateOperator::Eq
                    && name.path == AqlObjectPath::name_value() =>
            {
                match &name.value {
                    PredicateValue::Primitive(p @ Primitive::String(_)) => {
                        Some(format!("{node_id}, {p}"))
                    }
                    PredicateValue::Parameter(param) => Some(format!("{node_id}, ${param}")),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for AndPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(short) = self.shorthand() {
            return f.write_str(&short);
        }
        let rendered = self
            .operands
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" and ");
        f.write_str(&rendered)
    }
}

/// Comparison operators allowed in path predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateOperator {
    Eq,
    Neq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl PredicateOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            PredicateOperator::Eq => "=",
            PredicateOperator::Neq => "!=",
            PredicateOperator::Gt => ">",
            PredicateOperator::Ge => ">=",
            PredicateOperator::Lt => "<",
            PredicateOperator::Le => "<=",
        }
    }
}

/// Right-hand side of a path predicate comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredicateValue {
    Primitive(Primitive),
    /// `$name`, replaced before compilation
    Parameter(String),
    Path(AqlObjectPath),
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateValue::Primitive(p) => write!(f, "{p}"),
            PredicateValue::Parameter(name) => write!(f, "${name}"),
            PredicateValue::Path(path) => write!(f, "{path}"),
        }
    }
}

/// `path op value` inside a path predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComparisonPredicate {
    pub path: AqlObjectPath,
    pub operator: PredicateOperator,
    pub value: PredicateValue,
}

impl ComparisonPredicate {
    pub fn new(path: AqlObjectPath, operator: PredicateOperator, value: PredicateValue) -> Self {
        Self {
            path,
            operator,
            value,
        }
    }

    pub fn archetype_node_id(node_id: impl Into<String>) -> Self {
        Self::new(
            AqlObjectPath::archetype_node_id(),
            PredicateOperator::Eq,
            PredicateValue::Primitive(Primitive::String(node_id.into())),
        )
    }

    pub fn name_value(name: impl Into<String>) -> Self {
        Self::new(
            AqlObjectPath::name_value(),
            PredicateOperator::Eq,
            PredicateValue::Primitive(Primitive::String(name.into())),
        )
    }

    pub fn is_archetype_node_id(&self) -> bool {
        self.path.is_plain(&[ARCHETYPE_NODE_ID])
    }

    /// String value of an `=` comparison, if any
    pub fn eq_string_value(&self) -> Option<&str> {
        match (&self.operator, &self.value) {
            (PredicateOperator::Eq, PredicateValue::Primitive(Primitive::String(s))) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match (&self.value, self.is_archetype_node_id()) {
            (PredicateValue::Primitive(Primitive::String(id)), true) => id.clone(),
            (value, _) => value.to_string(),
        };
        write!(f, "{}{}{}", self.path, self.operator.symbol(), value)
    }
}
