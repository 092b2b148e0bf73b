use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an ID from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self::new)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                    })
            }
        }
    };
}

numeric_id!(
    /// Identifies the learner side of an enrollment.
    EnrolleeId
);
numeric_id!(
    /// Identifies one embeddable activity.
    ActivityId
);
numeric_id!(
    /// Identifies a module (the unit that groups activities).
    ModuleId
);
numeric_id!(
    /// Identifies a course.
    CourseId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_id_display_and_parse() {
        let id = ActivityId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<ActivityId>().unwrap(), id);
    }

    #[test]
    fn rejects_non_numeric_ids() {
        let err = "abc".parse::<EnrolleeId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse EnrolleeId from string");
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", CourseId::new(7)), "CourseId(7)");
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&ModuleId::new(3)).unwrap();
        assert_eq!(json, "3");
    }
}
