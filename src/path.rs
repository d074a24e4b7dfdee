//! Paths into configuration documents.
//!
//! A path is a sequence of segments, each either a field name (for objects)
//! or an item index (for lists). Schema lookups ignore index segments since
//! array element types are uniform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single segment of a document path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    /// Object field access: `{"field": value}`
    Field(String),
    /// List item access: `[index]`
    Item(usize),
}

impl Segment {
    /// Create a field segment.
    #[inline]
    pub fn field(name: impl Into<String>) -> Self {
        Segment::Field(name.into())
    }

    /// Create an item segment.
    #[inline]
    pub fn item(index: usize) -> Self {
        Segment::Item(index)
    }

    /// Get the field name if this is a field segment.
    #[inline]
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Segment::Field(name) => Some(name),
            Segment::Item(_) => None,
        }
    }

    /// Get the index if this is an item segment.
    #[inline]
    pub fn as_item(&self) -> Option<usize> {
        match self {
            Segment::Field(_) => None,
            Segment::Item(i) => Some(*i),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, ".{}", name),
            Segment::Item(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Field(s.to_owned())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::Field(s)
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Segment::Item(i)
    }
}

/// An ordered sequence of segments locating a value in a document.
///
/// # Examples
///
/// ```
/// use doc_cascade::FieldPath;
///
/// let path = FieldPath::root().field("feeds").item(0).field("gateway");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.to_string(), "$.feeds[0].gateway");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// Create an empty path (document root).
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create a path from a vector of segments.
    #[inline]
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Append a field segment (builder).
    #[inline]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.0.push(Segment::Field(name.into()));
        self
    }

    /// Append an item segment (builder).
    #[inline]
    pub fn item(mut self, index: usize) -> Self {
        self.0.push(Segment::Item(index));
        self
    }

    /// Push a segment (mutating).
    #[inline]
    pub fn push(&mut self, seg: Segment) {
        self.0.push(seg);
    }

    /// Pop the last segment.
    #[inline]
    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    /// The segments of this path.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// True if this is the root path.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append a segment without mutating this path.
    #[inline]
    pub fn with_segment(&self, seg: Segment) -> FieldPath {
        let mut out = self.clone();
        out.0.push(seg);
        out
    }

    /// Iterate over segments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.0.iter()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl FromIterator<Segment> for FieldPath {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        FieldPath(iter.into_iter().collect())
    }
}

impl std::ops::Index<usize> for FieldPath {
    type Output = Segment;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Parse a dotted path string into a `FieldPath`.
///
/// Purely-numeric segments become item indices; everything else is a field.
///
/// ```
/// use doc_cascade::parse_path;
///
/// let path = parse_path("feeds.gateways.0.gateway");
/// assert_eq!(path.to_string(), "$.feeds.gateways[0].gateway");
/// ```
pub fn parse_path(path: &str) -> FieldPath {
    let mut out = FieldPath::root();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        match part.parse::<usize>() {
            Ok(i) => out.push(Segment::Item(i)),
            Err(_) => out.push(Segment::Field(part.to_owned())),
        }
    }
    out
}

/// Construct a `FieldPath` from a sequence of segments.
///
/// ```
/// use doc_cascade::path;
///
/// let p = path!("brokers", "accounts", 1, "account");
/// assert_eq!(p.len(), 4);
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::FieldPath::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::FieldPath::root();
        $(
            p.push($crate::Segment::from($seg));
        )+
        p
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_construction() {
        let path = FieldPath::root().field("feeds").item(2).field("gateway");
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], Segment::Field("feeds".into()));
        assert_eq!(path[1], Segment::Item(2));
        assert_eq!(path[2], Segment::Field("gateway".into()));
    }

    #[test]
    fn test_path_display() {
        let path = FieldPath::root().field("brokers").item(0).field("accountId");
        assert_eq!(path.to_string(), "$.brokers[0].accountId");
        assert_eq!(FieldPath::root().to_string(), "$");
    }

    #[test]
    fn test_path_macro() {
        let p = path!("a", 3, "b");
        assert_eq!(p.segments().len(), 3);
        assert_eq!(p[1], Segment::Item(3));
    }

    #[test]
    fn test_parse_path_numeric_segments() {
        let p = parse_path("feeds.gateways.0.gateway.host");
        assert_eq!(p[2], Segment::Item(0));
        assert_eq!(p.len(), 5);
    }

    #[test]
    fn test_parse_path_empty() {
        assert!(parse_path("").is_empty());
    }

    #[test]
    fn test_path_serde() {
        let path = path!("feeds", 0, "gateway");
        let json = serde_json::to_string(&path).unwrap();
        let parsed: FieldPath = serde_json::from_str(&json).unwrap();
        assert_eq!(path, parsed);
    }
}
