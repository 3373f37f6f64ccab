//! Bytecode compiler
//!
//! Lowers the AST to [`CodeBlock`]s over a lexical scope tree. Identifier
//! resolution order: local, contract-data field, settings constant,
//! host-extend, other-contract (calls only). Implicit numeric coercions
//! are inserted where an assignment target expects a different numeric
//! family than the expression produces.

use std::collections::{BTreeMap, HashMap, HashSet};

use genesis_core::Value;
use rust_decimal::Decimal;

use crate::ast::{self, BinaryOp, Expr, Stmt, Type, UnaryOp};
use crate::bytecode::{BinOp, CodeBlock, Instr, NumFamily, UnOp};
use crate::error::{ScriptError, ScriptResult};
use crate::parser;

/// Names the host environment provides: extend functions callable from
/// contracts and context values readable as identifiers.
#[derive(Debug, Clone, Default)]
pub struct HostSymbols {
    pub funcs: HashSet<String>,
    pub vars: HashSet<String>,
}

/// A contract parameter from its `data` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub ty: Type,
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub conditions: CodeBlock,
    pub action: CodeBlock,
    pub settings: BTreeMap<String, Value>,
    pub source_line: u32,
}

#[derive(Debug, Clone)]
pub struct CompiledFunc {
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub body: CodeBlock,
}

#[derive(Debug, Clone, Default)]
pub struct CompiledSource {
    pub contracts: Vec<CompiledContract>,
    pub funcs: Vec<CompiledFunc>,
}

/// Compiles a source file against the host symbol set.
pub fn compile_source(source: &str, symbols: &HostSymbols) -> ScriptResult<CompiledSource> {
    let parsed = parser::parse(source)?;
    let mut out = CompiledSource::default();

    let local_funcs: HashSet<String> = parsed.funcs.iter().map(|f| f.name.clone()).collect();
    let no_settings = BTreeMap::new();

    for func in &parsed.funcs {
        let mut seen = HashSet::new();
        for (name, _) in &func.params {
            if !seen.insert(name.clone()) {
                return Err(ScriptError::DuplicateParam(name.clone()));
            }
        }
        let mut bc = BlockCompiler::new(symbols, &local_funcs, &no_settings);
        for (name, ty) in &func.params {
            bc.declare(name, Some(*ty))?;
        }
        bc.stmts(&func.body)?;
        out.funcs.push(CompiledFunc {
            name: func.name.clone(),
            params: func.params.clone(),
            body: bc.finish(),
        });
    }

    let mut contract_names = HashSet::new();
    for contract in &parsed.contracts {
        if !contract_names.insert(contract.name.clone()) {
            return Err(ScriptError::DuplicateContract(contract.name.clone()));
        }
        out.contracts.push(compile_contract(
            contract,
            symbols,
            &local_funcs,
        )?);
    }

    Ok(out)
}

/// Compiles a single expression, the form table conditions and system
/// parameter authorization strings take. The expression sees no locals,
/// only host symbols.
pub fn compile_expr(source: &str, symbols: &HostSymbols) -> ScriptResult<CodeBlock> {
    let parsed = parser::parse_expr(source)?;
    let empty_funcs = HashSet::new();
    let empty_settings = BTreeMap::new();
    let mut bc = BlockCompiler::new(symbols, &empty_funcs, &empty_settings);
    bc.expr(&parsed)?;
    bc.emit(Instr::Return);
    Ok(bc.finish())
}

fn compile_contract(
    decl: &ast::ContractDecl,
    symbols: &HostSymbols,
    local_funcs: &HashSet<String>,
) -> ScriptResult<CompiledContract> {
    let mut params = Vec::new();
    let mut seen = HashSet::new();
    for field in &decl.data {
        if !seen.insert(field.name.clone()) {
            return Err(ScriptError::DuplicateParam(field.name.clone()));
        }
        params.push(ParamDef {
            name: field.name.clone(),
            ty: field.ty,
            optional: field.optional(),
        });
    }

    let mut settings = BTreeMap::new();
    for (name, expr) in &decl.settings {
        settings.insert(name.clone(), literal_value(expr)?);
    }

    let conditions = compile_block(&decl.conditions, &params, symbols, local_funcs, &settings, true)?;
    let action = compile_block(&decl.action, &params, symbols, local_funcs, &settings, false)?;

    Ok(CompiledContract {
        name: decl.name.clone(),
        params,
        conditions,
        action,
        settings,
        source_line: decl.line,
    })
}

fn compile_block(
    stmts: &[Stmt],
    params: &[ParamDef],
    symbols: &HostSymbols,
    local_funcs: &HashSet<String>,
    settings: &BTreeMap<String, Value>,
    conditions: bool,
) -> ScriptResult<CodeBlock> {
    let mut bc = BlockCompiler::new(symbols, local_funcs, settings);
    for param in params {
        bc.declare(&param.name, Some(param.ty))?;
    }
    if conditions {
        check_conditions_returns(stmts, &bc)?;
    }
    bc.stmts(stmts)?;
    Ok(bc.finish())
}

/// Every statically-typed `return` inside a conditions block must be
/// boolean.
fn check_conditions_returns(stmts: &[Stmt], bc: &BlockCompiler) -> ScriptResult<()> {
    for stmt in stmts {
        match stmt {
            Stmt::Return(Some(expr)) => {
                if let Some(ty) = bc.infer(expr) {
                    if ty != Type::Bool {
                        return Err(ScriptError::ConditionsNotBool);
                    }
                }
            }
            Stmt::If(arms, otherwise) => {
                for (_, body) in arms {
                    check_conditions_returns(body, bc)?;
                }
                if let Some(body) = otherwise {
                    check_conditions_returns(body, bc)?;
                }
            }
            Stmt::While(_, body) => check_conditions_returns(body, bc)?,
            _ => {}
        }
    }
    Ok(())
}

fn literal_value(expr: &Expr) -> ScriptResult<Value> {
    match expr {
        Expr::Int(v) => Ok(Value::Int(*v)),
        Expr::Float(v) => Ok(Value::Float(*v)),
        Expr::Money(v) => Ok(Value::Money(*v)),
        Expr::Str(v) => Ok(Value::Str(v.clone())),
        Expr::Bool(v) => Ok(Value::Bool(*v)),
        Expr::Nil => Ok(Value::Null),
        _ => Err(ScriptError::Compile(
            "settings entries must be literals".to_string(),
        )),
    }
}

struct LoopCtx {
    start: usize,
    breaks: Vec<usize>,
}

struct BlockCompiler<'a> {
    code: Vec<Instr>,
    locals: Vec<String>,
    types: Vec<Option<Type>>,
    scopes: Vec<HashMap<String, u16>>,
    loops: Vec<LoopCtx>,
    symbols: &'a HostSymbols,
    local_funcs: &'a HashSet<String>,
    settings: &'a BTreeMap<String, Value>,
}

impl<'a> BlockCompiler<'a> {
    fn new(
        symbols: &'a HostSymbols,
        local_funcs: &'a HashSet<String>,
        settings: &'a BTreeMap<String, Value>,
    ) -> Self {
        Self {
            code: Vec::new(),
            locals: Vec::new(),
            types: Vec::new(),
            scopes: vec![HashMap::new()],
            loops: Vec::new(),
            symbols,
            local_funcs,
            settings,
        }
    }

    fn finish(self) -> CodeBlock {
        CodeBlock {
            code: self.code,
            locals: self.locals,
        }
    }

    fn declare(&mut self, name: &str, ty: Option<Type>) -> ScriptResult<u16> {
        let scope = self.scopes.last_mut().expect("scope stack never empty");
        if scope.contains_key(name) {
            return Err(ScriptError::DuplicateParam(name.to_string()));
        }
        let slot = self.locals.len() as u16;
        self.locals.push(name.to_string());
        self.types.push(ty);
        scope.insert(name.to_string(), slot);
        Ok(slot)
    }

    fn lookup(&self, name: &str) -> Option<u16> {
        for scope in self.scopes.iter().rev() {
            if let Some(slot) = scope.get(name) {
                return Some(*slot);
            }
        }
        None
    }

    fn emit(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    fn patch_jump(&mut self, at: usize) {
        let target = self.code.len();
        match &mut self.code[at] {
            Instr::Jump(t) | Instr::JumpIfZero(t) => *t = target,
            _ => {}
        }
    }

    // --- statements ---

    fn stmts(&mut self, stmts: &[Stmt]) -> ScriptResult<()> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> ScriptResult<()> {
        match stmt {
            Stmt::Var(decls) => {
                for (name, ty) in decls {
                    let slot = self.declare(name, Some(*ty))?;
                    self.emit(Instr::Push(default_value(*ty)));
                    self.emit(Instr::Store(slot));
                }
                Ok(())
            }
            Stmt::Assign(name, expr) => {
                let slot = self
                    .lookup(name)
                    .ok_or_else(|| ScriptError::UndefinedIdent(name.clone()))?;
                let actual = self.infer(expr);
                self.expr(expr)?;
                if let (Some(want_ty), Some(have_ty)) = (self.types[slot as usize], actual) {
                    match (family(want_ty), family(have_ty)) {
                        // implicit coercion between numeric families
                        (Some(want), Some(have)) if want != have => {
                            self.emit(Instr::Coerce(want));
                        }
                        // a numeric target cannot take a known non-numeric
                        (Some(_), None) => {
                            return Err(ScriptError::TypeMismatch {
                                expected: want_ty.name().to_string(),
                                actual: have_ty.name().to_string(),
                            });
                        }
                        _ => {}
                    }
                }
                self.emit(Instr::Store(slot));
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.expr(expr)?;
                self.emit(Instr::Pop);
                Ok(())
            }
            Stmt::If(arms, otherwise) => {
                let mut ends = Vec::new();
                for (cond, body) in arms {
                    self.expr(cond)?;
                    let skip = self.emit(Instr::JumpIfZero(0));
                    self.scoped(body)?;
                    ends.push(self.emit(Instr::Jump(0)));
                    self.patch_jump(skip);
                }
                if let Some(body) = otherwise {
                    self.scoped(body)?;
                }
                for end in ends {
                    self.patch_jump(end);
                }
                Ok(())
            }
            Stmt::While(cond, body) => {
                let start = self.code.len();
                self.expr(cond)?;
                let exit = self.emit(Instr::JumpIfZero(0));
                self.loops.push(LoopCtx {
                    start,
                    breaks: Vec::new(),
                });
                self.scoped(body)?;
                self.emit(Instr::Jump(start));
                self.patch_jump(exit);
                let ctx = self.loops.pop().expect("loop context pushed above");
                for at in ctx.breaks {
                    self.patch_jump(at);
                }
                Ok(())
            }
            Stmt::Break => {
                let at = self.emit(Instr::Jump(0));
                match self.loops.last_mut() {
                    Some(ctx) => {
                        ctx.breaks.push(at);
                        Ok(())
                    }
                    None => Err(ScriptError::Compile("break outside of loop".to_string())),
                }
            }
            Stmt::Continue => {
                match self.loops.last() {
                    Some(ctx) => {
                        let start = ctx.start;
                        self.emit(Instr::Jump(start));
                        Ok(())
                    }
                    None => Err(ScriptError::Compile("continue outside of loop".to_string())),
                }
            }
            Stmt::Return(value) => {
                match value {
                    Some(expr) => self.expr(expr)?,
                    None => {
                        self.emit(Instr::Push(Value::Null));
                    }
                }
                self.emit(Instr::Return);
                Ok(())
            }
        }
    }

    fn scoped(&mut self, body: &[Stmt]) -> ScriptResult<()> {
        self.scopes.push(HashMap::new());
        let result = self.stmts(body);
        self.scopes.pop();
        result
    }

    // --- expressions ---

    fn expr(&mut self, expr: &Expr) -> ScriptResult<()> {
        match expr {
            Expr::Int(v) => {
                self.emit(Instr::Push(Value::Int(*v)));
            }
            Expr::Float(v) => {
                self.emit(Instr::Push(Value::Float(*v)));
            }
            Expr::Money(v) => {
                self.emit(Instr::Push(Value::Money(*v)));
            }
            Expr::Bool(v) => {
                self.emit(Instr::Push(Value::Bool(*v)));
            }
            Expr::Nil => {
                self.emit(Instr::Push(Value::Null));
            }
            Expr::Str(s) => {
                self.emit(Instr::Push(Value::Str(s.clone())));
                if has_interpolation(s) {
                    self.emit(Instr::Interp);
                }
            }
            Expr::Ident(name) => self.load_ident(name)?,
            Expr::Array(items) => {
                for item in items {
                    self.expr(item)?;
                }
                self.emit(Instr::MakeArray(items.len() as u16));
            }
            Expr::Map(entries) => {
                for (key, value) in entries {
                    self.emit(Instr::Push(Value::Str(key.clone())));
                    self.expr(value)?;
                }
                self.emit(Instr::MakeMap(entries.len() as u16));
            }
            Expr::Unary(op, inner) => {
                self.expr(inner)?;
                self.emit(Instr::Unary(match op {
                    UnaryOp::Neg => UnOp::Neg,
                    UnaryOp::Not => UnOp::Not,
                }));
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                // short-circuit: rhs not evaluated when lhs is falsy
                self.expr(lhs)?;
                let to_false = self.emit(Instr::JumpIfZero(0));
                self.expr(rhs)?;
                let to_false2 = self.emit(Instr::JumpIfZero(0));
                self.emit(Instr::Push(Value::Bool(true)));
                let to_end = self.emit(Instr::Jump(0));
                self.patch_jump(to_false);
                self.patch_jump(to_false2);
                self.emit(Instr::Push(Value::Bool(false)));
                self.patch_jump(to_end);
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                self.expr(lhs)?;
                let try_rhs = self.emit(Instr::JumpIfZero(0));
                self.emit(Instr::Push(Value::Bool(true)));
                let to_end = self.emit(Instr::Jump(0));
                self.patch_jump(try_rhs);
                self.expr(rhs)?;
                let to_false = self.emit(Instr::JumpIfZero(0));
                self.emit(Instr::Push(Value::Bool(true)));
                let to_end2 = self.emit(Instr::Jump(0));
                self.patch_jump(to_false);
                self.emit(Instr::Push(Value::Bool(false)));
                self.patch_jump(to_end);
                self.patch_jump(to_end2);
            }
            Expr::Binary(op, lhs, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)?;
                self.emit(Instr::Binary(match op {
                    BinaryOp::Add => BinOp::Add,
                    BinaryOp::Sub => BinOp::Sub,
                    BinaryOp::Mul => BinOp::Mul,
                    BinaryOp::Div => BinOp::Div,
                    BinaryOp::Mod => BinOp::Mod,
                    BinaryOp::Eq => BinOp::Eq,
                    BinaryOp::NotEq => BinOp::NotEq,
                    BinaryOp::Lt => BinOp::Lt,
                    BinaryOp::LtEq => BinOp::LtEq,
                    BinaryOp::Gt => BinOp::Gt,
                    BinaryOp::GtEq => BinOp::GtEq,
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                }));
            }
            Expr::Ternary(cond, then, other) => {
                self.expr(cond)?;
                let to_else = self.emit(Instr::JumpIfZero(0));
                self.expr(then)?;
                let to_end = self.emit(Instr::Jump(0));
                self.patch_jump(to_else);
                self.expr(other)?;
                self.patch_jump(to_end);
            }
            Expr::Call(name, args) => {
                for arg in args {
                    self.expr(arg)?;
                }
                let argc = args.len() as u8;
                if self.local_funcs.contains(name) || !self.symbols.funcs.contains(name) {
                    // declared function or another contract, resolved in
                    // the registry at run time
                    self.emit(Instr::Call {
                        name: name.clone(),
                        argc,
                    });
                } else {
                    self.emit(Instr::CallHost {
                        name: name.clone(),
                        argc,
                    });
                }
            }
            Expr::Index(container, index) => {
                self.expr(container)?;
                self.expr(index)?;
                self.emit(Instr::Index);
            }
            Expr::Field(inner, field) => {
                self.expr(inner)?;
                self.emit(Instr::Field(field.clone()));
            }
        }
        Ok(())
    }

    fn load_ident(&mut self, name: &str) -> ScriptResult<()> {
        if let Some(slot) = self.lookup(name) {
            self.emit(Instr::Load(slot));
            return Ok(());
        }
        if let Some(value) = self.settings.get(name) {
            self.emit(Instr::Push(value.clone()));
            return Ok(());
        }
        if self.symbols.vars.contains(name) {
            self.emit(Instr::LoadExtern(name.to_string()));
            return Ok(());
        }
        Err(ScriptError::UndefinedIdent(name.to_string()))
    }

    /// Best-effort static type of an expression; `None` when only the
    /// runtime knows.
    fn infer(&self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::Int(_) => Some(Type::Int),
            Expr::Float(_) => Some(Type::Float),
            Expr::Money(_) => Some(Type::Money),
            Expr::Str(_) => Some(Type::Str),
            Expr::Bool(_) => Some(Type::Bool),
            Expr::Nil => None,
            Expr::Array(_) => Some(Type::Array),
            Expr::Map(_) => Some(Type::Map),
            Expr::Ident(name) => {
                let slot = self.lookup(name)?;
                self.types[slot as usize]
            }
            Expr::Unary(UnaryOp::Neg, inner) => self.infer(inner),
            Expr::Unary(UnaryOp::Not, _) => Some(Type::Bool),
            Expr::Binary(op, lhs, rhs) => match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                    let l = self.infer(lhs)?;
                    let r = self.infer(rhs)?;
                    if l == Type::Str || r == Type::Str {
                        return Some(Type::Str);
                    }
                    Some(promote(l, r))
                }
                _ => Some(Type::Bool),
            },
            Expr::Ternary(_, then, other) => {
                let t = self.infer(then)?;
                if self.infer(other) == Some(t) {
                    Some(t)
                } else {
                    None
                }
            }
            Expr::Call(..) | Expr::Index(..) | Expr::Field(..) => None,
        }
    }
}

fn default_value(ty: Type) -> Value {
    match ty {
        Type::Int => Value::Int(0),
        Type::Float => Value::Float(0.0),
        Type::Money => Value::Money(Decimal::ZERO),
        Type::Str => Value::Str(String::new()),
        Type::Bytes => Value::Bytes(Vec::new()),
        Type::Bool => Value::Bool(false),
        Type::Array => Value::Array(Vec::new()),
        Type::Map => Value::Map(BTreeMap::new()),
    }
}

fn family(ty: Type) -> Option<NumFamily> {
    match ty {
        Type::Int => Some(NumFamily::Int),
        Type::Float => Some(NumFamily::Float),
        Type::Money => Some(NumFamily::Money),
        _ => None,
    }
}

fn promote(l: Type, r: Type) -> Type {
    if l == Type::Money || r == Type::Money {
        Type::Money
    } else if l == Type::Float || r == Type::Float {
        Type::Float
    } else {
        l
    }
}

fn has_interpolation(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                j += 1;
            }
            if j > i + 1 && j < bytes.len() && bytes[j] == b'$' {
                return true;
            }
        }
        i += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> HostSymbols {
        HostSymbols {
            funcs: ["DBInsert", "DBUpdate", "Println"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vars: ["key_id", "ecosystem_id"].iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn compiles_params_into_leading_slots() {
        let src = r#"
            contract C {
                data { Recipient int Amount money }
                action { DBUpdate("keys", Recipient, "amount", Amount) }
            }
        "#;
        let compiled = compile_source(src, &symbols()).unwrap();
        let c = &compiled.contracts[0];
        assert_eq!(c.action.slot_of("Recipient"), Some(0));
        assert_eq!(c.action.slot_of("Amount"), Some(1));
        assert!(c
            .action
            .code
            .contains(&Instr::CallHost {
                name: "DBUpdate".into(),
                argc: 4
            }));
    }

    #[test]
    fn undefined_identifier_is_a_compile_error() {
        let src = "contract C { action { x = 1 } }";
        assert_eq!(
            compile_source(src, &symbols()).unwrap_err(),
            ScriptError::UndefinedIdent("x".into())
        );
    }

    #[test]
    fn duplicate_parameter_rejected() {
        let src = "contract C { data { A int A money } action { } }";
        assert_eq!(
            compile_source(src, &symbols()).unwrap_err(),
            ScriptError::DuplicateParam("A".into())
        );
    }

    #[test]
    fn conditions_must_return_bool() {
        let src = "contract C { conditions { return 5 } action { } }";
        assert_eq!(
            compile_source(src, &symbols()).unwrap_err(),
            ScriptError::ConditionsNotBool
        );
        let ok = "contract C { conditions { return 1 == 1 } action { } }";
        assert!(compile_source(ok, &symbols()).is_ok());
    }

    #[test]
    fn assignment_inserts_numeric_coercion() {
        let src = r#"
            contract C {
                action {
                    var total money
                    total = 5
                }
            }
        "#;
        let compiled = compile_source(src, &symbols()).unwrap();
        assert!(compiled.contracts[0]
            .action
            .code
            .contains(&Instr::Coerce(NumFamily::Money)));
    }

    #[test]
    fn numeric_target_rejects_known_string() {
        let src = r#"
            contract C {
                action {
                    var total money
                    total = "not numeric"
                }
            }
        "#;
        assert!(matches!(
            compile_source(src, &symbols()).unwrap_err(),
            ScriptError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn unknown_call_targets_compile_to_contract_calls() {
        let src = "contract C { action { SomeOther(1, 2) } }";
        let compiled = compile_source(src, &symbols()).unwrap();
        assert!(compiled.contracts[0].action.code.contains(&Instr::Call {
            name: "SomeOther".into(),
            argc: 2
        }));
    }

    #[test]
    fn extern_context_values_resolve() {
        let src = "contract C { conditions { return key_id == 1 } action { } }";
        let compiled = compile_source(src, &symbols()).unwrap();
        assert!(compiled.contracts[0]
            .conditions
            .code
            .contains(&Instr::LoadExtern("key_id".into())));
    }

    #[test]
    fn break_outside_loop_rejected() {
        let src = "contract C { action { break } }";
        assert!(matches!(
            compile_source(src, &symbols()).unwrap_err(),
            ScriptError::Compile(_)
        ));
    }

    #[test]
    fn map_literals_lower_to_make_map() {
        let src = r#"
            contract C {
                action {
                    var m map
                    m = { "amount": 5, "memo": "fee" }
                }
            }
        "#;
        let compiled = compile_source(src, &symbols()).unwrap();
        let code = &compiled.contracts[0].action.code;
        assert!(code.contains(&Instr::MakeMap(2)));
        assert!(code.contains(&Instr::Push(Value::Str("amount".into()))));
    }

    #[test]
    fn interpolated_strings_get_interp_instr() {
        let src = r#"contract C { data { Name string } action { var s string s = "hi $Name$" } }"#;
        let compiled = compile_source(src, &symbols()).unwrap();
        assert!(compiled.contracts[0].action.code.contains(&Instr::Interp));
    }

    #[test]
    fn settings_constants_fold_into_pushes() {
        let src = r#"
            contract C {
                settings { fee = 10 }
                action { var x int x = fee }
            }
        "#;
        let compiled = compile_source(src, &symbols()).unwrap();
        assert_eq!(
            compiled.contracts[0].settings.get("fee"),
            Some(&Value::Int(10))
        );
        assert!(compiled.contracts[0]
            .action
            .code
            .contains(&Instr::Push(Value::Int(10))));
    }
}
