//! Intermediate representation and lowering.
//!
//! The expanded S-expression forest is lowered into a flat, arena-backed
//! node store. Lowering never panics on malformed input: structural
//! problems become diagnostics and an [`IrNode::Error`] placeholder, so a
//! single bad form cannot take down the rest of the document.

pub mod lower;
pub mod params;

use la_arena::{Arena, Idx};
use smol_str::SmolStr;

use hql_ast::Span;

pub use lower::lower;
pub use params::{parse_param_list, type_annotation, Param};

pub type IrId = Idx<IrNode>;

/// A lowered module: one arena of nodes plus the top-level forms in
/// document order.
#[derive(Debug, Default)]
pub struct IrModule {
    nodes: Arena<IrNode>,
    pub toplevel: Vec<IrId>,
}

impl IrModule {
    pub fn alloc(&mut self, node: IrNode) -> IrId {
        self.nodes.alloc(node)
    }

    pub fn node(&self, id: IrId) -> &IrNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IrId, &IrNode)> {
        self.nodes.iter()
    }
}

/// How strictly a function is checked. `fn` is loose; `fx` demands full
/// type annotations and is treated as pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purity {
    Loose,
    Pure,
}

/// A call-site argument: positional, or named via a `name:` tag.
#[derive(Debug, Clone)]
pub enum Arg {
    Positional(IrId),
    Named { name: SmolStr, value: IrId, span: Span },
}

/// One segment of an interpolated string.
#[derive(Debug, Clone)]
pub enum InterpPart {
    Text(String),
    Exprs(Vec<IrId>),
}

#[derive(Debug, Clone)]
pub enum ObjectEntry {
    Field { key: SmolStr, value: IrId, span: Span },
    /// `& expr` inside a map literal merges the fields of `expr`.
    Spread { expr: IrId, span: Span },
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: SmolStr,
    pub default: Option<IrId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CtorDef {
    pub params: Vec<LoweredParam>,
    pub body: Vec<IrId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: SmolStr,
    pub purity: Purity,
    pub params: Vec<LoweredParam>,
    pub return_type: Option<SmolStr>,
    pub body: Vec<IrId>,
    pub span: Span,
}

/// A parameter with its default already lowered.
#[derive(Debug, Clone)]
pub struct LoweredParam {
    pub name: SmolStr,
    pub ty: Option<SmolStr>,
    pub default: Option<IrId>,
    pub rest: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumCase {
    pub name: SmolStr,
    /// Raw value, for `(case ok 200)` under a raw-typed enum.
    pub value: Option<IrId>,
    /// Associated values, for `(case err code: Int msg: String)`.
    pub params: Vec<(SmolStr, SmolStr)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum IrNode {
    IntLit { value: i64, span: Span },
    FloatLit { value: f64, span: Span },
    BoolLit { value: bool, span: Span },
    NilLit { span: Span },
    StrLit { value: String, span: Span },
    StrInterp { parts: Vec<InterpPart>, span: Span },
    Identifier { name: SmolStr, span: Span },
    /// Property access, from dotted symbols: `a.b` is `Member(a, "b")`.
    Member { object: IrId, property: SmolStr, span: Span },
    Call { callee: IrId, args: Vec<Arg>, span: Span },
    New { class: SmolStr, args: Vec<Arg>, span: Span },
    If { cond: IrId, then_branch: IrId, else_branch: Option<IrId>, span: Span },
    Do { body: Vec<IrId>, span: Span },
    ArrayLit { elems: Vec<IrId>, span: Span },
    ObjectLit { entries: Vec<ObjectEntry>, span: Span },
    SetLit { elems: Vec<IrId>, span: Span },
    Fn {
        name: SmolStr,
        purity: Purity,
        params: Vec<LoweredParam>,
        return_type: Option<SmolStr>,
        body: Vec<IrId>,
        span: Span,
    },
    Lambda { params: Vec<LoweredParam>, body: Vec<IrId>, span: Span },
    Class {
        name: SmolStr,
        fields: Vec<FieldDef>,
        ctor: Option<CtorDef>,
        methods: Vec<MethodDef>,
        span: Span,
    },
    Struct { name: SmolStr, fields: Vec<FieldDef>, span: Span },
    Enum {
        name: SmolStr,
        raw_type: Option<SmolStr>,
        cases: Vec<EnumCase>,
        span: Span,
    },
    Import { names: Vec<SmolStr>, path: Option<String>, span: Span },
    Export {
        names: Vec<SmolStr>,
        /// Wire name for the `(export "name" symbol)` form.
        rename: Option<SmolStr>,
        span: Span,
    },
    Let { name: SmolStr, value: IrId, span: Span },
    Var { name: SmolStr, value: IrId, span: Span },
    LetBlock {
        mutable: bool,
        bindings: Vec<(SmolStr, IrId)>,
        body: Vec<IrId>,
        span: Span,
    },
    /// `set!` assignment; the target is an identifier or member chain.
    Assign { target: IrId, value: IrId, span: Span },
    Loop { bindings: Vec<(SmolStr, IrId)>, body: Vec<IrId>, span: Span },
    Recur { args: Vec<IrId>, span: Span },
    For { var: SmolStr, seq: IrId, body: Vec<IrId>, span: Span },
    While { cond: IrId, body: Vec<IrId>, span: Span },
    Return { value: Option<IrId>, span: Span },
    /// Placeholder for a form that failed to lower; the failure itself is
    /// reported as a diagnostic.
    Error { span: Span },
}

impl IrNode {
    pub fn span(&self) -> Span {
        match self {
            IrNode::IntLit { span, .. }
            | IrNode::FloatLit { span, .. }
            | IrNode::BoolLit { span, .. }
            | IrNode::NilLit { span }
            | IrNode::StrLit { span, .. }
            | IrNode::StrInterp { span, .. }
            | IrNode::Identifier { span, .. }
            | IrNode::Member { span, .. }
            | IrNode::Call { span, .. }
            | IrNode::New { span, .. }
            | IrNode::If { span, .. }
            | IrNode::Do { span, .. }
            | IrNode::ArrayLit { span, .. }
            | IrNode::ObjectLit { span, .. }
            | IrNode::SetLit { span, .. }
            | IrNode::Fn { span, .. }
            | IrNode::Lambda { span, .. }
            | IrNode::Class { span, .. }
            | IrNode::Struct { span, .. }
            | IrNode::Enum { span, .. }
            | IrNode::Import { span, .. }
            | IrNode::Export { span, .. }
            | IrNode::Let { span, .. }
            | IrNode::Var { span, .. }
            | IrNode::LetBlock { span, .. }
            | IrNode::Assign { span, .. }
            | IrNode::Loop { span, .. }
            | IrNode::Recur { span, .. }
            | IrNode::For { span, .. }
            | IrNode::While { span, .. }
            | IrNode::Return { span, .. }
            | IrNode::Error { span } => *span,
        }
    }
}
