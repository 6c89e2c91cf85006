//! The intermediate representation consumed by the analyzer.
//!
//! monitor-clippy does not parse source: a frontend (or a test builder)
//! supplies a [`Program`], a class table plus one [`ProcDesc`] per analyzed
//! procedure, each carrying a control-flow graph of [`Instr`]s. Everything
//! here is a plain serde value, so programs round-trip through JSON and the
//! binary can consume dumps produced by an external frontend.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::absint::ProcCfg;

/// Source language of the analyzed program.
///
/// Only deadlock behavior is meaningful for C++/Objective-C; the
/// blocking-call and Strict Mode analyses are Java-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Java,
    Cpp,
    ObjC,
}

impl Language {
    /// Blocking-call and Strict Mode analyses only apply to Java.
    pub fn supports_blocking_analysis(&self) -> bool {
        matches!(self, Language::Java)
    }
}

/// A source location. Ordered so locations can key the report map and break
/// symmetry ties deterministically.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Loc {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Loc {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl Display for Loc {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A fully qualified class name, e.g. `java.lang.Thread`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing simple name, e.g. `Thread` for `java.lang.Thread`.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl Display for ClassName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A procedure name: declaring class plus method name.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProcName {
    pub class: ClassName,
    pub method: String,
}

impl ProcName {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: ClassName::new(class),
            method: method.into(),
        }
    }
}

impl Display for ProcName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)
    }
}

/// A formal parameter of a procedure. Index 0 is `this` for instance
/// methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormalParam {
    pub index: usize,
    pub name: String,
    /// Declared class of the parameter, when it names a class type.
    pub typ: Option<ClassName>,
}

/// The root of an access expression at a lock/unlock site.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExprRoot {
    /// A local or logical variable. Never accepted as a lock root.
    Local { name: String },
    /// A formal parameter of the enclosing procedure.
    Formal {
        index: usize,
        name: String,
        typ: Option<ClassName>,
    },
    /// A global (static field) variable.
    Global { name: String, typ: Option<ClassName> },
    /// A class-literal constant, `Foo.class`.
    ClassLiteral(ClassName),
}

/// An access expression: a root followed by field accesses, e.g. `this.x.y`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AccessExpr {
    pub root: ExprRoot,
    pub fields: Vec<String>,
}

impl AccessExpr {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            root: ExprRoot::Local { name: name.into() },
            fields: Vec::new(),
        }
    }

    pub fn formal(index: usize, name: impl Into<String>, typ: Option<ClassName>) -> Self {
        Self {
            root: ExprRoot::Formal {
                index,
                name: name.into(),
                typ,
            },
            fields: Vec::new(),
        }
    }

    pub fn global(name: impl Into<String>, typ: Option<ClassName>) -> Self {
        Self {
            root: ExprRoot::Global {
                name: name.into(),
                typ,
            },
            fields: Vec::new(),
        }
    }

    pub fn class_literal(class: impl Into<String>) -> Self {
        Self {
            root: ExprRoot::ClassLiteral(ClassName::new(class)),
            fields: Vec::new(),
        }
    }

    /// Extend the expression with a field access.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }
}

impl Display for AccessExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.root {
            ExprRoot::Local { name }
            | ExprRoot::Formal { name, .. }
            | ExprRoot::Global { name, .. } => f.write_str(name)?,
            ExprRoot::ClassLiteral(class) => write!(f, "{}.class", class.simple_name())?,
        }
        for field in &self.fields {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}

/// One IR instruction. Everything except `Call` is an identity transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instr {
    Assign { loc: Loc },
    Assume { loc: Loc },
    Metadata,
    IndirectCall { loc: Loc },
    Call {
        callee: ProcName,
        actuals: Vec<AccessExpr>,
        loc: Loc,
    },
}

/// Thread annotation carried on a procedure's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    /// No annotation; the procedure may run on any thread.
    #[default]
    Unannotated,
    /// `@UiThread` and friends: known to run on the UI thread.
    Ui,
    /// `@WorkerThread`: known to run off the UI thread.
    Worker,
}

/// Attributes read from a procedure's declaration and annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProcAttributes {
    pub is_private: bool,
    pub is_static: bool,
    pub is_synchronized: bool,
    pub is_constructor: bool,
    pub is_class_initializer: bool,
    pub is_autogen: bool,
    /// `@Lockless` contract: the procedure must not acquire any monitor.
    pub is_lockless: bool,
    /// `@NonBlocking`: blocking calls made directly by this procedure are
    /// intentional and not witnessed.
    pub is_nonblocking: bool,
    pub thread: ThreadKind,
}

impl ProcAttributes {
    /// Private procedures, class initializers and auto-generated methods are
    /// not report targets. Their summaries are still consumed.
    pub fn is_report_eligible(&self) -> bool {
        !self.is_private && !self.is_class_initializer && !self.is_autogen
    }
}

/// A procedure: name, formals, attributes and its CFG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcDesc {
    pub name: ProcName,
    #[serde(default)]
    pub formals: Vec<FormalParam>,
    #[serde(default)]
    pub attributes: ProcAttributes,
    #[serde(default)]
    pub loc: Loc,
    pub cfg: ProcCfg,
}

/// A class: its superclass link and declared methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: ClassName,
    #[serde(default)]
    pub superclass: Option<ClassName>,
    #[serde(default)]
    pub methods: Vec<ProcName>,
}

/// A whole program: the type environment plus all analyzed procedures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "ProgramSpec", into = "ProgramSpec")]
pub struct Program {
    pub language: Language,
    classes: BTreeMap<ClassName, ClassInfo>,
    procedures: BTreeMap<ProcName, ProcDesc>,
}

impl Program {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            classes: BTreeMap::new(),
            procedures: BTreeMap::new(),
        }
    }

    pub fn add_class(&mut self, class: ClassInfo) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn add_procedure(&mut self, proc: ProcDesc) {
        // Keep the class table consistent so the report engine can find
        // sibling methods through the lock owner class.
        let entry = self
            .classes
            .entry(proc.name.class.clone())
            .or_insert_with(|| ClassInfo {
                name: proc.name.class.clone(),
                superclass: None,
                methods: Vec::new(),
            });
        if !entry.methods.contains(&proc.name) {
            entry.methods.push(proc.name.clone());
        }
        self.procedures.insert(proc.name.clone(), proc);
    }

    pub fn procedure(&self, name: &ProcName) -> Option<&ProcDesc> {
        self.procedures.get(name)
    }

    /// All procedures, in deterministic name order.
    pub fn procedures(&self) -> impl Iterator<Item = &ProcDesc> {
        self.procedures.values()
    }

    pub fn class(&self, name: &ClassName) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Declared plus inherited methods of `class`, walking the superclass
    /// chain. A visited set guards against malformed cyclic hierarchies.
    pub fn methods_of(&self, class: &ClassName) -> Vec<&ProcName> {
        let mut methods = Vec::new();
        let mut visited = BTreeSet::new();
        let mut cur = Some(class);
        while let Some(name) = cur {
            if !visited.insert(name.clone()) {
                break;
            }
            let Some(info) = self.classes.get(name) else {
                break;
            };
            methods.extend(info.methods.iter());
            cur = info.superclass.as_ref();
        }
        methods
    }
}

#[derive(Serialize, Deserialize)]
struct ProgramSpec {
    #[serde(default)]
    language: Language,
    #[serde(default)]
    classes: Vec<ClassInfo>,
    #[serde(default)]
    procedures: Vec<ProcDesc>,
}

impl From<ProgramSpec> for Program {
    fn from(spec: ProgramSpec) -> Self {
        let mut program = Program::new(spec.language);
        for class in spec.classes {
            program.add_class(class);
        }
        for proc in spec.procedures {
            program.add_procedure(proc);
        }
        program
    }
}

impl From<Program> for ProgramSpec {
    fn from(program: Program) -> Self {
        ProgramSpec {
            language: program.language,
            classes: program.classes.into_values().collect(),
            procedures: program.procedures.into_values().collect(),
        }
    }
}
