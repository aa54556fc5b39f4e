//! UUID v7 identifier newtypes.

/// Declares a time-sortable UUID v7 identifier newtype with `Display`/`FromStr`.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Create a new id using UUID v7 (time-sortable).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// Create an id from an existing UUID.
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Hyphen-free form, safe for table and directory names.
            pub fn simple(&self) -> String {
                self.0.simple().to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(uuid::Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a tenant (chatbot).
    TenantId
);

uuid_id!(
    /// Unique identifier for a skill of any type.
    SkillId
);

uuid_id!(
    /// Unique identifier for a retrieval dataset.
    DatasetId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_time_sortable() {
        let a = SkillId::new();
        let b = SkillId::new();
        assert!(a < b);
    }

    #[test]
    fn test_id_parse_roundtrip() {
        let id = TenantId::new();
        let parsed: TenantId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(!id.simple().contains('-'));
    }

    #[test]
    fn test_id_parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<DatasetId>().is_err());
    }
}
