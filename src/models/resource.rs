use std::fmt;

/// Identifies one logical shared channel as a `(type, id)` pair.
///
/// A session owns at most one live transport per key. The key is encoded
/// into the channel path as `{resource_type}/{resource_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub resource_type: String,
    pub resource_id: String,
}

impl ResourceKey {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Path segment addressing this channel on the server.
    pub fn channel_path(&self) -> String {
        format!("{}/{}", self.resource_type, self.resource_id)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_path() {
        let key = ResourceKey::new("contract", "42");
        assert_eq!(key.channel_path(), "contract/42");
        assert_eq!(key.to_string(), "contract/42");
    }
}
