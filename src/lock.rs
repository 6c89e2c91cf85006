//! Canonical lock identity.
//!
//! A [`Lock`] is a normalized access path naming a monitor: a root (formal
//! parameter, global, or a synthetic class object) followed by field
//! accesses. Construction is the only place paths are normalized; the rest
//! of the analyzer treats them opaquely. Locks are totally ordered so they
//! can key maps and break report-symmetry ties stably across runs.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ir::{AccessExpr, ClassName, ExprRoot};

/// The root of a lock's access path. Local/logical variables are refused at
/// construction, so no lock ever has one.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Root {
    Formal {
        index: usize,
        name: String,
        typ: Option<ClassName>,
    },
    Global {
        name: String,
        typ: Option<ClassName>,
    },
    /// Synthetic root for `static synchronized` methods and
    /// `synchronized(Foo.class)` constructs.
    Class(ClassName),
}

impl Root {
    /// The type string used by the report engine's symmetry breaking.
    /// Falls back to the variable name when no declared type is known.
    pub fn type_name(&self) -> &str {
        match self {
            Root::Formal { typ, name, .. } | Root::Global { typ, name, .. } => {
                typ.as_ref().map(ClassName::as_str).unwrap_or(name)
            }
            Root::Class(class) => class.as_str(),
        }
    }
}

/// A normalized access path rooted at a [`Root`].
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AccessPath {
    root: Root,
    fields: Vec<String>,
}

impl AccessPath {
    /// Build a path, folding nested-class synthetic `this$N` bridge fields
    /// so that equivalent paths through different inner classes
    /// canonicalize to the same value.
    pub fn new(root: Root, fields: Vec<String>) -> Self {
        let fields = fields
            .into_iter()
            .filter(|f| !is_synthetic_bridge(f))
            .collect();
        Self { root, fields }
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

fn is_synthetic_bridge(field: &str) -> bool {
    field
        .strip_prefix("this$")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// A monitor, identified by its normalized access path.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Lock {
    path: AccessPath,
}

impl Lock {
    /// Recognize a lock from an IR expression at a lock/unlock site.
    /// Returns `None` for local/logical roots, which are not syntactically
    /// recognizable locks; callers skip those.
    pub fn from_expr(expr: &AccessExpr) -> Option<Lock> {
        let root = match &expr.root {
            ExprRoot::Local { .. } => return None,
            ExprRoot::Formal { index, name, typ } => Root::Formal {
                index: *index,
                name: name.clone(),
                typ: typ.clone(),
            },
            ExprRoot::Global { name, typ } => Root::Global {
                name: name.clone(),
                typ: typ.clone(),
            },
            // A class-literal constant is the class lock itself; any field
            // suffix would denote a static member, not the monitor.
            ExprRoot::ClassLiteral(class) => {
                return Some(Lock::class_lock(class.clone()));
            }
        };
        Some(Lock {
            path: AccessPath::new(root, expr.fields.clone()),
        })
    }

    /// The synthetic class lock of `static synchronized` methods and
    /// `synchronized(Foo.class)` blocks: a class-tagged root, empty path.
    pub fn class_lock(class: ClassName) -> Lock {
        Lock {
            path: AccessPath::new(Root::Class(class), Vec::new()),
        }
    }

    pub fn path(&self) -> &AccessPath {
        &self.path
    }

    pub fn is_class_lock(&self) -> bool {
        matches!(self.path.root(), Root::Class(_)) && self.path.fields().is_empty()
    }

    /// The class owning this lock, derived from the declared type of the
    /// root. Used by the report engine to find sibling methods.
    pub fn owner_class(&self) -> Option<&ClassName> {
        match self.path.root() {
            Root::Formal { typ, .. } | Root::Global { typ, .. } => typ.as_ref(),
            Root::Class(class) => Some(class),
        }
    }

    /// The root type string used for symmetry-breaking comparison.
    pub fn root_type_name(&self) -> &str {
        self.path.root().type_name()
    }

    /// Rebase a formal-rooted lock onto the actuals of a call site.
    ///
    /// Globals and class locks pass through unchanged. A formal root whose
    /// actual is not itself a recognizable lock root is unbindable and
    /// yields `None`; the caller drops the critical pair.
    pub fn rebase(&self, actuals: &[AccessExpr]) -> Option<Lock> {
        let Root::Formal { index, .. } = self.path.root() else {
            return Some(self.clone());
        };
        let actual = actuals.get(*index)?;
        let base = Lock::from_expr(actual)?;
        if self.path.fields().is_empty() {
            return Some(base);
        }
        let mut fields = base.path.fields().to_vec();
        fields.extend(self.path.fields().iter().cloned());
        Some(Lock {
            path: AccessPath::new(base.path.root().clone(), fields),
        })
    }
}

impl Display for Lock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.path.root() {
            Root::Formal { name, .. } | Root::Global { name, .. } => f.write_str(name)?,
            Root::Class(class) => write!(f, "{}.class", class.simple_name())?,
        }
        for field in self.path.fields() {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}
