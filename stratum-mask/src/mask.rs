use crate::error::{MaskError, MaskResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A set of attribute paths, possibly nested, possibly wildcard.
///
/// The empty mask (also [`FieldMask::default`]) selects only the entity
/// identifier. [`FieldMask::all`] selects every attribute at every depth.
///
/// The plain form used on the wire is:
/// - `true` for the wildcard,
/// - an object mapping attribute names to nested plain masks otherwise.
///
/// ```
/// use stratum_mask::FieldMask;
///
/// let mask = FieldMask::from_paths(["title", "author.name"]).unwrap();
/// assert_eq!(
///     mask.serialize(),
///     serde_json::json!({"author": {"name": true}, "title": true})
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldMask(Node);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Node {
    All,
    Fields(BTreeMap<String, FieldMask>),
}

impl Default for FieldMask {
    fn default() -> Self {
        Self::identifier_only()
    }
}

impl FieldMask {
    /// The wildcard mask: every attribute, recursively.
    #[must_use]
    pub fn all() -> Self {
        Self(Node::All)
    }

    /// The empty mask: only the identifier.
    #[must_use]
    pub fn identifier_only() -> Self {
        Self(Node::Fields(BTreeMap::new()))
    }

    /// Builds a mask from dot-separated paths.
    ///
    /// A path's last segment selects the whole attribute (`"title"`,
    /// `"author.name"`). Use [`FieldMask::with`] to select a nested entity
    /// by identifier only.
    pub fn from_paths<I, S>(paths: I) -> MaskResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mask = Self::identifier_only();
        for path in paths {
            let path = path.as_ref();
            let segments: Vec<&str> = path.split('.').collect();
            if segments.iter().any(|s| s.is_empty()) {
                return Err(MaskError::InvalidPath(path.to_string()));
            }
            let mut branch = Self::all();
            for segment in segments.iter().rev() {
                branch = Self::identifier_only().with(*segment, branch);
            }
            mask = mask.merged(&branch);
        }
        Ok(mask)
    }

    /// Returns a copy of this mask with `name` selected through `sub`.
    ///
    /// On the wildcard the mask is returned unchanged, since it already
    /// covers every attribute.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, sub: FieldMask) -> Self {
        if let Node::Fields(fields) = &mut self.0 {
            let name = name.into();
            let merged = match fields.remove(&name) {
                Some(existing) => existing.merged(&sub),
                None => sub,
            };
            fields.insert(name, merged);
        }
        self
    }

    /// Whether this is the wildcard mask.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self.0, Node::All)
    }

    /// Whether this mask selects only the identifier.
    #[must_use]
    pub fn is_identifier_only(&self) -> bool {
        matches!(&self.0, Node::Fields(fields) if fields.is_empty())
    }

    /// The submask selected for `name`, if any.
    ///
    /// The wildcard selects every name with the wildcard again.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<FieldMask> {
        match &self.0 {
            Node::All => Some(Self::all()),
            Node::Fields(fields) => fields.get(name).cloned(),
        }
    }

    /// The explicitly selected names, or `None` for the wildcard.
    pub fn field_names(&self) -> Option<impl Iterator<Item = &str>> {
        match &self.0 {
            Node::All => None,
            Node::Fields(fields) => Some(fields.keys().map(String::as_str)),
        }
    }

    /// Returns true iff every path selected by `other` is covered by `self`.
    #[must_use]
    pub fn includes(&self, other: &FieldMask) -> bool {
        match (&self.0, &other.0) {
            (Node::All, _) => true,
            (Node::Fields(_), Node::All) => false,
            (Node::Fields(mine), Node::Fields(theirs)) => theirs.iter().all(|(name, sub)| {
                mine.get(name).is_some_and(|own| own.includes(sub))
            }),
        }
    }

    /// The union of two masks. Submasks under the same name merge recursively.
    #[must_use]
    pub fn merge(a: &FieldMask, b: &FieldMask) -> FieldMask {
        a.merged(b)
    }

    /// The union of `self` and `other`.
    #[must_use]
    pub fn merged(&self, other: &FieldMask) -> FieldMask {
        match (&self.0, &other.0) {
            (Node::All, _) | (_, Node::All) => Self::all(),
            (Node::Fields(mine), Node::Fields(theirs)) => {
                let mut fields = mine.clone();
                for (name, sub) in theirs {
                    let merged = match fields.get(name) {
                        Some(existing) => existing.merged(sub),
                        None => sub.clone(),
                    };
                    fields.insert(name.clone(), merged);
                }
                Self(Node::Fields(fields))
            }
        }
    }

    /// The paths selected by both masks.
    #[must_use]
    pub fn intersect(&self, other: &FieldMask) -> FieldMask {
        match (&self.0, &other.0) {
            (Node::All, _) => other.clone(),
            (_, Node::All) => self.clone(),
            (Node::Fields(mine), Node::Fields(theirs)) => Self(Node::Fields(
                mine.iter()
                    .filter_map(|(name, sub)| {
                        theirs.get(name).map(|other| (name.clone(), sub.intersect(other)))
                    })
                    .collect(),
            )),
        }
    }

    /// Converts the mask to its plain nested form.
    #[must_use]
    pub fn serialize(&self) -> Value {
        match &self.0 {
            Node::All => Value::Bool(true),
            Node::Fields(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, sub)| (name.clone(), sub.serialize()))
                    .collect(),
            ),
        }
    }

    /// Parses a plain nested form.
    ///
    /// Accepts `true` (wildcard), `false`/`null` (identifier only), an
    /// object of nested plain masks (entries set to `false` or `null` are
    /// dropped) or an array of dot-separated paths.
    pub fn deserialize(plain: &Value) -> MaskResult<Self> {
        match plain {
            Value::Bool(true) => Ok(Self::all()),
            Value::Bool(false) | Value::Null => Ok(Self::identifier_only()),
            Value::Object(entries) => Self::from_object(entries),
            Value::Array(items) => {
                let paths = items
                    .iter()
                    .map(|item| {
                        item.as_str().ok_or_else(|| {
                            MaskError::InvalidShape(format!("expected a path string, got {item}"))
                        })
                    })
                    .collect::<MaskResult<Vec<_>>>()?;
                Self::from_paths(paths)
            }
            other => Err(MaskError::InvalidShape(format!(
                "expected a boolean, object or array, got {other}"
            ))),
        }
    }

    fn from_object(entries: &Map<String, Value>) -> MaskResult<Self> {
        let mut fields = BTreeMap::new();
        for (name, value) in entries {
            if matches!(value, Value::Bool(false) | Value::Null) {
                continue;
            }
            if name.is_empty() {
                return Err(MaskError::InvalidPath(name.clone()));
            }
            fields.insert(name.clone(), Self::deserialize(value)?);
        }
        Ok(Self(Node::Fields(fields)))
    }
}

impl Serialize for FieldMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FieldMask::serialize(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let plain = Value::deserialize(deserializer)?;
        FieldMask::deserialize(&plain).map_err(serde::de::Error::custom)
    }
}
