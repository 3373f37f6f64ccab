//! Bytecode
//!
//! The compiler lowers each `conditions`/`action` block and each function
//! body to a [`CodeBlock`]: a linear instruction vector plus the local
//! slot layout. Every instruction carries a base fuel cost; host calls
//! additionally charge their registered extend cost at dispatch time.

use genesis_core::Value;

/// Numeric families for implicit coercion instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumFamily {
    Int,
    Float,
    Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Push a literal.
    Push(Value),
    /// Load a local slot.
    Load(u16),
    /// Store the stack top into a local slot.
    Store(u16),
    /// Load a host-provided context value (key_id, ecosystem_id, ...).
    LoadExtern(String),
    /// Call a host extend function with `argc` stack arguments.
    CallHost { name: String, argc: u8 },
    /// Call another contract or a declared function by name.
    Call { name: String, argc: u8 },
    Jump(usize),
    /// Pop the stack top, jump when it is falsy.
    JumpIfZero(usize),
    Binary(BinOp),
    Unary(UnOp),
    /// Pop index then container, push the element.
    Index,
    /// Pop a map, push the named field.
    Field(String),
    /// Pop `n` values, push them as an array.
    MakeArray(u16),
    /// Pop `n` key/value pairs, push them as a map.
    MakeMap(u16),
    /// Coerce the stack top into a numeric family.
    Coerce(NumFamily),
    /// Resolve `$name$` markers in the string at the stack top.
    Interp,
    Pop,
    Return,
}

impl Instr {
    /// Base fuel cost charged before the instruction executes. Host calls
    /// charge their extend cost on top; a cost of −1 in the extend table
    /// means the function prices itself (DB work).
    pub fn base_cost(&self) -> i64 {
        match self {
            Instr::Push(_) | Instr::Load(_) | Instr::Store(_) | Instr::Pop | Instr::Return => 1,
            Instr::Coerce(_) => 1,
            Instr::Jump(_) | Instr::JumpIfZero(_) => 2,
            Instr::Binary(_) | Instr::Unary(_) | Instr::Index | Instr::Field(_) => 3,
            Instr::LoadExtern(_) => 5,
            Instr::MakeArray(_) | Instr::MakeMap(_) => 5,
            Instr::Interp => 10,
            Instr::CallHost { .. } => 10,
            Instr::Call { .. } => 100,
        }
    }
}

/// A compiled body: instructions plus local slot names in slot order.
/// Data fields and parameters occupy the first slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeBlock {
    pub code: Vec<Instr>,
    pub locals: Vec<String>,
}

impl CodeBlock {
    pub fn slot_of(&self, name: &str) -> Option<u16> {
        self.locals.iter().position(|n| n == name).map(|i| i as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_is_the_costliest_family() {
        let call = Instr::Call {
            name: "X".into(),
            argc: 0,
        };
        let host = Instr::CallHost {
            name: "Y".into(),
            argc: 0,
        };
        assert!(call.base_cost() > host.base_cost());
        assert!(host.base_cost() > Instr::Push(Value::Null).base_cost());
    }

    #[test]
    fn slot_lookup() {
        let block = CodeBlock {
            code: Vec::new(),
            locals: vec!["Amount".into(), "total".into()],
        };
        assert_eq!(block.slot_of("total"), Some(1));
        assert_eq!(block.slot_of("missing"), None);
    }
}
