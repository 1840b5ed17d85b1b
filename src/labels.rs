use std::fmt;
use std::slice;

use store_api::storepb;

use super::Error;
use super::ErrorI;

/// A label name that is valid in a PromQL selector.
#[derive(Debug, PartialOrd, Ord, PartialEq, Eq, Hash, Clone)]
pub struct ValidatedLabel(String);

impl ValidatedLabel {
    pub fn new(label: String) -> Result<Self, Error> {
        // Prometheus label names match `[a-zA-Z_][a-zA-Z0-9_]*`.
        for (i, b) in label.bytes().enumerate() {
            match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'_' => {}
                b'0'..=b'9' if i > 0 => {}
                _ => return Err(Error(ErrorI::InvalidLabelName(label))),
            }
        }
        if label.is_empty() {
            return Err(Error(ErrorI::InvalidLabelName(label)));
        }
        Ok(ValidatedLabel(label))
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// The label set of one series: `(name, value)` pairs with unique names, in
/// the order the store sent them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Labels {
    pairs: Vec<(String, String)>,
}

impl Labels {
    /// An empty label set.
    pub fn new() -> Labels {
        Labels { pairs: Vec::new() }
    }

    /// Build a label set from pairs, rejecting duplicate names.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Labels, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut labels = Labels::new();
        for (name, value) in pairs {
            labels.add(name.into(), value.into())?;
        }
        Ok(labels)
    }

    pub(crate) fn from_pb(labels: Vec<storepb::Label>) -> Result<Labels, Error> {
        Labels::from_pairs(labels.into_iter().map(|l| (l.name, l.value)))
    }

    fn add(&mut self, name: String, value: String) -> Result<(), Error> {
        if self.get(&name).is_some() {
            return Err(Error(ErrorI::DuplicateLabel {
                series: self.to_string(),
                name,
            }));
        }
        self.pairs.push((name, value));
        Ok(())
    }

    /// The value of label `name`, if the series has it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the label names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate over the `(name, value)` pairs.
    pub fn iter(&self) -> slice::Iter<'_, (String, String)> {
        self.pairs.iter()
    }

    /// The number of labels.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the label set is empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a (String, String);
    type IntoIter = slice::Iter<'a, (String, String)>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // PromQL quoting, which {:?} matches for label values.
        f.write_str("{")?;
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            let sep = if i == 0 { "" } else { "," };
            write!(f, "{}{}={:?}", sep, name, value)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod test {
    use super::Labels;
    use super::ValidatedLabel;
    use crate::ErrorKind;

    #[test]
    fn display() {
        assert_eq!(Labels::new().to_string(), "{}");
        let labels = Labels::from_pairs([("__name__", "up"), ("job", "node \"1\"")]).unwrap();
        assert_eq!(labels.to_string(), r#"{__name__="up",job="node \"1\""}"#);
    }

    #[test]
    fn duplicate() {
        let err = Labels::from_pairs([("a", "1"), ("b", "2"), ("a", "3")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn lookup() {
        let labels = Labels::from_pairs([("a", "1"), ("b", "")]).unwrap();
        assert_eq!(labels.get("a"), Some("1"));
        assert_eq!(labels.get("b"), Some(""));
        assert_eq!(labels.get("c"), None);
        assert_eq!(labels.names().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn label_names() {
        assert!(ValidatedLabel::new("job".into()).is_ok());
        assert!(ValidatedLabel::new("__name__".into()).is_ok());
        assert!(ValidatedLabel::new("a1".into()).is_ok());
        assert!(ValidatedLabel::new("1a".into()).is_err());
        assert!(ValidatedLabel::new("".into()).is_err());
        assert!(ValidatedLabel::new("a-b".into()).is_err());
        assert!(ValidatedLabel::new("ä".into()).is_err());
    }
}
