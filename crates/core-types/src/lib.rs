use std::fmt;

/// Milliseconds on the host page clock (e.g. `performance.now()` or a
/// replay trace offset). Only differences between two readings matter.
pub type Millis = u64;

/// Opaque handle of a node in the host document.
///
/// The host assigns these; the engine only compares and hashes them and never
/// keeps host objects alive.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Synthetic identity of a tracked element inside the engine registry.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ElementHandle(pub u32);

impl ElementHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ProfileId(pub String);

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SourceId(pub String);

macro_rules! non_empty_id {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// Returns `None` when the raw value is blank.
                pub fn parse(raw: impl Into<String>) -> Option<Self> {
                    let raw = raw.into();
                    if raw.trim().is_empty() {
                        None
                    } else {
                        Some(Self(raw))
                    }
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )*
    };
}

non_empty_id!(ProfileId, SessionId, SourceId);

/// Identity attached to every outbound batch, supplied by an external
/// session/identity collaborator.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Identity {
    pub profile: Option<ProfileId>,
    pub session: Option<SessionId>,
}

impl Identity {
    pub fn new(profile: Option<ProfileId>, session: Option<SessionId>) -> Self {
        Self { profile, session }
    }

    pub fn is_complete(&self) -> bool {
        self.profile.is_some() && self.session.is_some()
    }
}
