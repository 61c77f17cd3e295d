//! Flat attribute view over a verified SAML assertion.

/// Anything that exposes the attributes of an already verified assertion.
pub trait AttributeSource {
    /// Attribute names with their values, in document order.
    fn attribute_values(&self) -> Vec<(String, Vec<String>)>;
}

impl AttributeSource for samael::schema::Assertion {
    fn attribute_values(&self) -> Vec<(String, Vec<String>)> {
        let mut pairs = Vec::new();

        if let Some(ref statements) = self.attribute_statements {
            for statement in statements {
                for attr in &statement.attributes {
                    if let Some(ref name) = attr.name {
                        let values: Vec<String> = attr
                            .values
                            .iter()
                            .filter_map(|v| v.value.clone())
                            .collect();
                        pairs.push((name.clone(), values));
                    }
                }
            }
        }

        pairs
    }
}

/// Ordered `name -> value` mapping extracted from an assertion.
///
/// Multi-valued attributes keep their first value. When a name repeats, the
/// last occurrence wins but keeps the position of the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    entries: Vec<(String, String)>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the attributes of a verified assertion.
    pub fn from_source<S: AttributeSource + ?Sized>(source: &S) -> Self {
        let mut set = Self::new();
        for (name, values) in source.attribute_values() {
            let value = values.into_iter().next().unwrap_or_default();
            set.insert(name, value);
        }
        set
    }

    /// Insert or replace an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up an attribute, defaulting to the empty string.
    pub fn value(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl AttributeSource for AttributeSet {
    fn attribute_values(&self) -> Vec<(String, Vec<String>)> {
        self.entries
            .iter()
            .map(|(n, v)| (n.clone(), vec![v.clone()]))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}
