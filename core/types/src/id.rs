//! Typed identifiers and symbolic references
//!
//! Concept IDs, visual IDs and operation IDs live in separate types so a
//! diagram instance can never be passed where a model concept is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Mint a fresh identifier
            pub fn generate() -> Self {
                Self(format!("{}{}", $prefix, Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Durable identifier of a model element
    ElementId,
    "id-"
);
string_id!(
    /// Durable identifier of a model relationship
    RelationshipId,
    "rel-"
);
string_id!(
    /// Identifier of a diagram view
    ViewId,
    "view-"
);
string_id!(
    /// Identifier of a visual object or connection on one view
    VisualId,
    "vis-"
);
string_id!(
    /// Identifier of a folder in the organization tree
    FolderId,
    "fld-"
);
string_id!(
    /// Identifier of an asynchronous apply operation
    OperationId,
    "op-"
);

/// Caller-chosen symbolic id attached to a creation op
pub type TempId = String;

/// A symbolic reference inside a BOM, resolved to a real ID before dispatch.
///
/// Downstream of the resolver all references are `Real`; `Temp` and `Name`
/// only exist between intake and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ref {
    /// tempId declared by an earlier creation in the same batch or an idFile
    Temp(String),
    /// A real ID already present in the model
    Real(String),
    /// Exact-name fallback, only consulted when resolveNames is enabled
    Name(String),
}

impl Ref {
    /// Classify a raw string from the wire.
    ///
    /// Real IDs carry one of the known prefixes; everything else is treated
    /// as a tempId first and a name fallback second.
    pub fn parse(raw: &str) -> Ref {
        const PREFIXES: [&str; 6] = ["id-", "rel-", "view-", "vis-", "fld-", "op-"];
        if PREFIXES.iter().any(|p| raw.starts_with(p)) {
            Ref::Real(raw.to_string())
        } else {
            Ref::Temp(raw.to_string())
        }
    }

    pub fn as_real(&self) -> Option<&str> {
        match self {
            Ref::Real(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ref::Temp(s) => write!(f, "tempId:{s}"),
            Ref::Real(s) => f.write_str(s),
            Ref::Name(s) => write!(f, "name:{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let a = ElementId::generate();
        let b = ElementId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("id-"));
        assert!(OperationId::generate().as_str().starts_with("op-"));
    }

    #[test]
    fn parse_distinguishes_real_from_temp() {
        assert!(matches!(Ref::parse("id-abc123"), Ref::Real(_)));
        assert!(matches!(Ref::parse("vis-9"), Ref::Real(_)));
        assert!(matches!(Ref::parse("t1"), Ref::Temp(_)));
    }
}
