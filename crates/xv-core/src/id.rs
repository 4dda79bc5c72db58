use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

/// Process-wide interner shared by every graph and scene.
static NAMES: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// An interned node name.
///
/// The same name resolves to the same `NodeId` in the main graph, in the
/// side buffer, and across scene rebuilds, which is what lets a rebuilt
/// scene be diffed against the previous one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern `name`, reusing the existing key when it was seen before.
    pub fn intern(name: &str) -> Self {
        Self(NAMES.get_or_intern(name))
    }

    /// Look `name` up without interning it.
    pub fn get(name: &str) -> Option<Self> {
        NAMES.get(name).map(Self)
    }

    pub fn as_str(&self) -> &'static str {
        NAMES.resolve(&self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        Cow::<'de, str>::deserialize(de).map(|name| Self::intern(&name))
    }
}
