use std::fmt;

use promql_parser::label;
use promql_parser::parser::Expr;
use regex::Regex;
use store_api::storepb;
use store_api::storepb::label_matcher::Type;

use super::labels::ValidatedLabel;
use super::Error;
use super::ErrorI;

/// The label holding the metric name.
pub const METRIC_NAME: &str = "__name__";

/// How a [`Matcher`] compares a label value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchOp {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`, fully anchored.
    Regex,
    /// `!~`, fully anchored.
    NotRegex,
}

impl MatchOp {
    fn as_str(&self) -> &'static str {
        use self::MatchOp::*;
        match self {
            Equal => "=",
            NotEqual => "!=",
            Regex => "=~",
            NotRegex => "!~",
        }
    }
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate on one label of a series.
///
/// A label the series does not have compares as the empty string.
#[derive(Clone, Debug)]
pub struct Matcher {
    op: MatchOp,
    name: String,
    value: String,
    regex: Option<Regex>,
}

impl Matcher {
    /// Create a matcher, validating the label name and compiling regular
    /// expressions.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::QueryTranslation`](crate::ErrorKind) on an
    /// invalid label name or regular expression.
    ///
    /// # Example
    ///
    /// ```
    /// # use obslytics::{Error, MatchOp, Matcher};
    /// # fn main() -> Result<(), Error> {
    /// let m = Matcher::new(MatchOp::Regex, "job", "node|kube.*")?;
    /// assert!(m.matches("kubelet"));
    /// assert!(!m.matches("my-node"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn new<N, V>(op: MatchOp, name: N, value: V) -> Result<Matcher, Error>
    where
        N: Into<String>,
        V: Into<String>,
    {
        let name = ValidatedLabel::new(name.into())?.into_inner();
        let value = value.into();
        let regex = match op {
            MatchOp::Equal | MatchOp::NotEqual => None,
            MatchOp::Regex | MatchOp::NotRegex => {
                match Regex::new(&format!("^(?s:{})$", value)) {
                    Ok(r) => Some(r),
                    Err(cause) => return Err(Error(ErrorI::InvalidRegex { name, cause })),
                }
            }
        };
        Ok(Matcher {
            op,
            name,
            value,
            regex,
        })
    }

    /// The comparison.
    pub fn op(&self) -> MatchOp {
        self.op
    }

    /// The label name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value or, for regex matchers, the unanchored pattern.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether a label value satisfies the matcher.
    pub fn matches(&self, value: &str) -> bool {
        let regex_match = || self.regex.as_ref().map_or(false, |re| re.is_match(value));
        match self.op {
            MatchOp::Equal => value == self.value,
            MatchOp::NotEqual => value != self.value,
            MatchOp::Regex => regex_match(),
            MatchOp::NotRegex => !regex_match(),
        }
    }

    pub(crate) fn to_pb(&self) -> storepb::LabelMatcher {
        let r#type = match self.op {
            MatchOp::Equal => Type::Eq,
            MatchOp::NotEqual => Type::Neq,
            MatchOp::Regex => Type::Re,
            MatchOp::NotRegex => Type::Nre,
        };
        storepb::LabelMatcher {
            r#type: r#type as i32,
            name: self.name.clone(),
            value: self.value.clone(),
        }
    }

    /// Reverse of [`Matcher::to_pb`], used by stores written against this
    /// crate.
    pub fn from_pb(m: &storepb::LabelMatcher) -> Result<Matcher, Error> {
        let op = match Type::try_from(m.r#type) {
            Ok(Type::Eq) => MatchOp::Equal,
            Ok(Type::Neq) => MatchOp::NotEqual,
            Ok(Type::Re) => MatchOp::Regex,
            Ok(Type::Nre) => MatchOp::NotRegex,
            Err(_) => return Err(Error(ErrorI::UnknownMatcherType(m.r#type))),
        };
        Matcher::new(op, m.name.clone(), m.value.clone())
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Matcher) -> bool {
        self.op == other.op && self.name == other.name && self.value == other.value
    }
}

impl Eq for Matcher {}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.op, self.value)
    }
}

pub(crate) fn translate(matchers: &[Matcher]) -> Vec<storepb::LabelMatcher> {
    matchers.iter().map(Matcher::to_pb).collect()
}

/// Parse a PromQL series selector like `up{job="node", instance=~"10\\..*"}`.
///
/// A leading metric name stands for `__name__="<name>"`. String values follow
/// PromQL quoting and escapes.
///
/// # Errors
///
/// Fails with [`ErrorKind::QueryTranslation`](crate::ErrorKind) if the input
/// is not a plain vector selector, on an invalid label name or regular
/// expression, or if every matcher accepts the empty string.
pub fn parse_selector(selector: &str) -> Result<Vec<Matcher>, Error> {
    let invalid = |reason: String| {
        Error(ErrorI::InvalidSelector {
            selector: selector.to_owned(),
            reason,
        })
    };
    let vs = match promql_parser::parser::parse(selector).map_err(invalid)? {
        Expr::VectorSelector(vs) => vs,
        _ => return Err(invalid("expected a series selector".into())),
    };
    if !vs.matchers.or_matchers.is_empty() {
        return Err(invalid("\"or\" between matchers is not supported".into()));
    }
    if vs.offset.is_some() || vs.at.is_some() {
        return Err(invalid("offset and @ modifiers are not supported".into()));
    }
    let mut matchers = Vec::with_capacity(vs.matchers.matchers.len() + 1);
    if let Some(name) = vs.name {
        let named = vs.matchers.matchers.iter().any(|m| m.name == METRIC_NAME);
        if !named {
            matchers.push(Matcher::new(MatchOp::Equal, METRIC_NAME, name)?);
        }
    }
    for m in vs.matchers.matchers {
        let op = match m.op {
            label::MatchOp::Equal => MatchOp::Equal,
            label::MatchOp::NotEqual => MatchOp::NotEqual,
            label::MatchOp::Re(_) => MatchOp::Regex,
            label::MatchOp::NotRe(_) => MatchOp::NotRegex,
        };
        matchers.push(Matcher::new(op, m.name, m.value)?);
    }
    if matchers.is_empty() {
        return Err(Error(ErrorI::NoMatchers));
    }
    if matchers.iter().all(|m| m.matches("")) {
        return Err(invalid("at least one matcher must not match the empty string".into()));
    }
    Ok(matchers)
}
