//! Shared builders for assembling IR programs in tests.

#![allow(dead_code)]

use monitor_clippy::absint::ProcCfg;
use monitor_clippy::ir::{
    AccessExpr, ClassName, FormalParam, Instr, Language, Loc, ProcAttributes, ProcDesc, ProcName,
    Program, ThreadKind,
};
use monitor_clippy::models::{BUILTIN_CLASS, MONITOR_ENTER, MONITOR_EXIT};

pub fn loc(line: u32) -> Loc {
    Loc::new("Test.java", line, 1)
}

/// The receiver of an instance method of `class`.
pub fn this(class: &str) -> AccessExpr {
    AccessExpr::formal(0, "this", Some(ClassName::new(class)))
}

/// `synchronized` block entry on `monitor`.
pub fn sync_enter(monitor: AccessExpr, line: u32) -> Instr {
    Instr::Call {
        callee: ProcName::new(BUILTIN_CLASS, MONITOR_ENTER),
        actuals: vec![monitor],
        loc: loc(line),
    }
}

/// `synchronized` block exit on `monitor`.
pub fn sync_exit(monitor: AccessExpr, line: u32) -> Instr {
    Instr::Call {
        callee: ProcName::new(BUILTIN_CLASS, MONITOR_EXIT),
        actuals: vec![monitor],
        loc: loc(line),
    }
}

pub fn call(class: &str, method: &str, actuals: Vec<AccessExpr>, line: u32) -> Instr {
    Instr::Call {
        callee: ProcName::new(class, method),
        actuals,
        loc: loc(line),
    }
}

/// Builder for a test procedure; defaults to a public instance method with
/// a `this` formal.
pub struct ProcBuilder {
    name: ProcName,
    formals: Vec<FormalParam>,
    attributes: ProcAttributes,
    loc: Loc,
    instrs: Vec<Instr>,
}

pub fn proc(class: &str, method: &str) -> ProcBuilder {
    ProcBuilder {
        name: ProcName::new(class, method),
        formals: vec![FormalParam {
            index: 0,
            name: "this".into(),
            typ: Some(ClassName::new(class)),
        }],
        attributes: ProcAttributes::default(),
        loc: loc(1),
        instrs: Vec::new(),
    }
}

impl ProcBuilder {
    pub fn ui(mut self) -> Self {
        self.attributes.thread = ThreadKind::Ui;
        self
    }

    pub fn worker(mut self) -> Self {
        self.attributes.thread = ThreadKind::Worker;
        self
    }

    pub fn lockless(mut self) -> Self {
        self.attributes.is_lockless = true;
        self
    }

    pub fn nonblocking(mut self) -> Self {
        self.attributes.is_nonblocking = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.attributes.is_private = true;
        self
    }

    pub fn constructor(mut self) -> Self {
        self.attributes.is_constructor = true;
        self
    }

    pub fn synchronized(mut self) -> Self {
        self.attributes.is_synchronized = true;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.attributes.is_static = true;
        self.formals.clear();
        self
    }

    pub fn body(mut self, instrs: Vec<Instr>) -> Self {
        self.instrs = instrs;
        self
    }

    pub fn build(self) -> ProcDesc {
        ProcDesc {
            name: self.name,
            formals: self.formals,
            attributes: self.attributes,
            loc: self.loc,
            cfg: ProcCfg::linear(self.instrs),
        }
    }
}

pub fn program(procs: Vec<ProcBuilder>) -> Program {
    program_in(Language::Java, procs)
}

pub fn program_in(language: Language, procs: Vec<ProcBuilder>) -> Program {
    let mut program = Program::new(language);
    for builder in procs {
        program.add_procedure(builder.build());
    }
    program
}
