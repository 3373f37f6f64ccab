//! Abstract syntax tree

use rust_decimal::Decimal;

/// Declared value types of the contract language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    Money,
    Str,
    Bytes,
    Bool,
    Array,
    Map,
}

impl Type {
    pub fn parse(name: &str) -> Option<Type> {
        match name {
            "int" => Some(Type::Int),
            "float" => Some(Type::Float),
            "money" => Some(Type::Money),
            "string" => Some(Type::Str),
            "bytes" => Some(Type::Bytes),
            "bool" => Some(Type::Bool),
            "array" => Some(Type::Array),
            "map" => Some(Type::Map),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Money => "money",
            Type::Str => "string",
            Type::Bytes => "bytes",
            Type::Bool => "bool",
            Type::Array => "array",
            Type::Map => "map",
        }
    }
}

/// A parsed source file: contracts and standalone functions.
#[derive(Debug, Clone, Default)]
pub struct Source {
    pub contracts: Vec<ContractDecl>,
    pub funcs: Vec<FuncDecl>,
}

/// `contract NAME { data{} conditions{} action{} settings{} }`
#[derive(Debug, Clone)]
pub struct ContractDecl {
    pub name: String,
    pub data: Vec<DataField>,
    pub conditions: Vec<Stmt>,
    pub action: Vec<Stmt>,
    pub settings: Vec<(String, Expr)>,
    pub line: u32,
}

/// One `data` field: `Name type "tag,..."`.
#[derive(Debug, Clone)]
pub struct DataField {
    pub name: String,
    pub ty: Type,
    pub tags: Vec<String>,
}

impl DataField {
    /// Fields tagged `optional` may be absent from the call payload.
    pub fn optional(&self) -> bool {
        self.tags.iter().any(|t| t == "optional")
    }
}

/// `func NAME(params) type { body }`
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub returns: Option<Type>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `var a int, b string`
    Var(Vec<(String, Type)>),
    /// `name = expr`
    Assign(String, Expr),
    /// Expression evaluated for effect (host/contract calls).
    Expr(Expr),
    If(Vec<(Expr, Vec<Stmt>)>, Option<Vec<Stmt>>),
    While(Expr, Vec<Stmt>),
    Break,
    Continue,
    Return(Option<Expr>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Money(Decimal),
    Str(String),
    Bool(bool),
    Nil,
    Ident(String),
    Array(Vec<Expr>),
    /// `{ "key": expr, ... }` with string keys.
    Map(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `cond ? then : else`
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Field(Box<Expr>, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}
