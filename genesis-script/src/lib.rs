//! Genesis Contract Language
//!
//! Compiler and virtual machine for the contract language:
//! - [`lexer`] / [`parser`] tokenize source and build the typed AST
//! - [`compiler`] lowers the AST to linear bytecode over a lexical scope
//!   tree, inserting implicit numeric coercions and recording base costs
//! - [`vm`] executes bytecode on per-call stack frames under a fuel
//!   budget, dispatching host calls through the [`vm::ExtendHost`] seam
//! - [`vm::VmRegistry`] is the process-wide contract/symbol registry:
//!   one writer at a time for installs and activation flips, lock-free
//!   `Arc` reads everywhere else

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod vm;

pub use ast::Type;
pub use bytecode::{BinOp, CodeBlock, Instr, UnOp};
pub use compiler::{
    compile_expr, compile_source, CompiledContract, CompiledFunc, CompiledSource, HostSymbols,
    ParamDef,
};
pub use error::{ScriptError, ScriptResult};
pub use vm::{
    eval_code, eval_conditions, interpolate, invoke, parse_contract_ref, CallState, ContractDef,
    ExtendHost, FuncDef, VmRegistry, DEFAULT_CALL_DEPTH,
};
