use std::collections::HashMap;

use anyhow::{anyhow, Result};
use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValue, BasicValueEnum, FloatValue, FunctionValue, IntValue,
    PointerValue,
};
use inkwell::{AddressSpace, FloatPredicate, IntPredicate};
use tracing::{debug, trace};

use crate::backend::{lower, runtime};
use crate::frontend::scope::SymbolId;
use crate::frontend::syntax::{BinaryOp, LiteralKind, UnaryOp};
use crate::frontend::typed_ast::*;
use crate::frontend::Type;

pub const INIT_FN: &str = "grammo.init";

/// Name of the generated wrapper that initializes the globals, runs `name`
/// and returns its result widened to an `i64`.
pub fn entry_name(name: &str) -> String {
    format!("grammo.entry.{}", name)
}

fn zero_literal(ty: Type) -> LiteralKind {
    match ty {
        Type::Real => LiteralKind::Real(0.0),
        Type::Bool => LiteralKind::Bool(false),
        Type::String => LiteralKind::String(String::new()),
        _ => LiteralKind::Int(0),
    }
}

fn int_predicate(op: BinaryOp, signed: bool) -> Option<IntPredicate> {
    Some(match (op, signed) {
        (BinaryOp::Eq, _) => IntPredicate::EQ,
        (BinaryOp::NotEq, _) => IntPredicate::NE,
        (BinaryOp::Lt, true) => IntPredicate::SLT,
        (BinaryOp::LtEq, true) => IntPredicate::SLE,
        (BinaryOp::Gt, true) => IntPredicate::SGT,
        (BinaryOp::GtEq, true) => IntPredicate::SGE,
        (BinaryOp::Lt, false) => IntPredicate::ULT,
        (BinaryOp::LtEq, false) => IntPredicate::ULE,
        (BinaryOp::Gt, false) => IntPredicate::UGT,
        (BinaryOp::GtEq, false) => IntPredicate::UGE,
        _ => return None,
    })
}

/// The support layer every module declares; see `backend::runtime`.
struct Runtime<'ctx> {
    enter: FunctionValue<'ctx>,
    leave: FunctionValue<'ctx>,
    poll: FunctionValue<'ctx>,
    ok: FunctionValue<'ctx>,
    div_zero: FunctionValue<'ctx>,
    write_str: FunctionValue<'ctx>,
    write_int: FunctionValue<'ctx>,
    write_real: FunctionValue<'ctx>,
    write_bool: FunctionValue<'ctx>,
    newline: FunctionValue<'ctx>,
    read_int: FunctionValue<'ctx>,
    read_real: FunctionValue<'ctx>,
    read_bool: FunctionValue<'ctx>,
    read_str: FunctionValue<'ctx>,
    concat: FunctionValue<'ctx>,
    compare: FunctionValue<'ctx>,
}

impl<'ctx> Runtime<'ctx> {
    fn declare(context: &'ctx Context, module: &Module<'ctx>) -> Self {
        let i32_type = context.i32_type();
        let i64_type = context.i64_type();
        let f64_type = context.f64_type();
        let ptr_type = context.ptr_type(AddressSpace::default());
        let void_type = context.void_type();

        let declare = |name: &str, ty: FunctionType<'ctx>| {
            module.add_function(name, ty, Some(Linkage::External))
        };

        Self {
            enter: declare(runtime::ENTER, i32_type.fn_type(&[], false)),
            leave: declare(runtime::LEAVE, void_type.fn_type(&[], false)),
            poll: declare(runtime::POLL, i32_type.fn_type(&[], false)),
            ok: declare(runtime::OK, i32_type.fn_type(&[], false)),
            div_zero: declare(runtime::DIV_ZERO, void_type.fn_type(&[], false)),
            write_str: declare(runtime::WRITE_STR, void_type.fn_type(&[ptr_type.into()], false)),
            write_int: declare(runtime::WRITE_INT, void_type.fn_type(&[i64_type.into()], false)),
            write_real: declare(runtime::WRITE_REAL, void_type.fn_type(&[f64_type.into()], false)),
            write_bool: declare(runtime::WRITE_BOOL, void_type.fn_type(&[i32_type.into()], false)),
            newline: declare(runtime::NEWLINE, void_type.fn_type(&[], false)),
            read_int: declare(runtime::READ_INT, i64_type.fn_type(&[], false)),
            read_real: declare(runtime::READ_REAL, f64_type.fn_type(&[], false)),
            read_bool: declare(runtime::READ_BOOL, i32_type.fn_type(&[], false)),
            read_str: declare(runtime::READ_STR, ptr_type.fn_type(&[], false)),
            concat: declare(
                runtime::CONCAT,
                ptr_type.fn_type(&[ptr_type.into(), ptr_type.into()], false),
            ),
            compare: declare(
                runtime::COMPARE,
                i32_type.fn_type(&[ptr_type.into(), ptr_type.into()], false),
            ),
        }
    }
}

struct FnState<'ctx> {
    function: FunctionValue<'ctx>,
    return_type: Type,
    /// Leaves the function with the zero value of its return type once a
    /// fault was raised. Created on first use.
    bail: Option<BasicBlock<'ctx>>,
}

pub struct CodeGen<'a, 'ctx> {
    program: &'a Program,
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    runtime: Runtime<'ctx>,
    slots: HashMap<SymbolId, PointerValue<'ctx>>,
    funcs: HashMap<SymbolId, FunctionValue<'ctx>>,
    strings: HashMap<String, PointerValue<'ctx>>,
    state: Option<FnState<'ctx>>,
}

impl<'a, 'ctx> CodeGen<'a, 'ctx> {
    pub fn new(context: &'ctx Context, program: &'a Program, name: &str) -> Self {
        let module = context.create_module(name);

        Self {
            runtime: Runtime::declare(context, &module),
            builder: context.create_builder(),
            slots: HashMap::new(),
            funcs: HashMap::new(),
            strings: HashMap::new(),
            state: None,
            program,
            context,
            module,
        }
    }

    fn basic_type(&self, ty: Type) -> BasicTypeEnum<'ctx> {
        match ty {
            Type::Int => self.context.i64_type().as_basic_type_enum(),
            Type::Real => self.context.f64_type().as_basic_type_enum(),
            Type::Bool => self.context.bool_type().as_basic_type_enum(),
            Type::String => self
                .context
                .ptr_type(AddressSpace::default())
                .as_basic_type_enum(),
            Type::Void => unreachable!("void values are never stored"),
        }
    }

    fn fn_type(&self, return_type: Type, params: &[Type]) -> FunctionType<'ctx> {
        let params = params
            .iter()
            .map(|ty| self.basic_type(*ty).into())
            .collect::<Vec<BasicMetadataTypeEnum>>();

        match return_type {
            Type::Void => self.context.void_type().fn_type(&params, false),
            ty => self.basic_type(ty).fn_type(&params, false),
        }
    }

    /// Interned, NUL-terminated string constant.
    fn string(&mut self, value: &str) -> PointerValue<'ctx> {
        if let Some(ptr) = self.strings.get(value) {
            return *ptr;
        }

        let data = self.context.const_string(value.as_bytes(), true);
        let global = self.module.add_global(
            data.get_type(),
            None,
            &format!("str.{}", self.strings.len()),
        );

        global.set_initializer(&data);
        global.set_constant(true);
        global.set_linkage(Linkage::Private);
        global.set_unnamed_addr(true);

        let ptr = global.as_pointer_value();
        self.strings.insert(value.to_string(), ptr);

        ptr
    }

    fn literal(&mut self, literal: &LiteralKind) -> BasicValueEnum<'ctx> {
        match literal {
            LiteralKind::Int(value) => self
                .context
                .i64_type()
                .const_int(*value as u64, true)
                .into(),
            LiteralKind::Real(value) => self.context.f64_type().const_float(*value).into(),
            LiteralKind::Bool(value) => self
                .context
                .bool_type()
                .const_int(*value as u64, false)
                .into(),
            LiteralKind::String(value) => self.string(value).into(),
        }
    }

    fn zero(&mut self, ty: Type) -> BasicValueEnum<'ctx> {
        self.literal(&zero_literal(ty))
    }

    fn state(&self) -> Result<&FnState<'ctx>> {
        self.state
            .as_ref()
            .ok_or_else(|| anyhow!("no function is being generated"))
    }

    fn append_block(&self, name: &str) -> Result<BasicBlock<'ctx>> {
        Ok(self.context.append_basic_block(self.state()?.function, name))
    }

    fn current_block(&self) -> Result<BasicBlock<'ctx>> {
        self.builder
            .get_insert_block()
            .ok_or_else(|| anyhow!("builder is not positioned"))
    }

    fn terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_terminator())
            .is_some()
    }

    fn slot(&self, id: SymbolId) -> Result<PointerValue<'ctx>> {
        self.slots
            .get(&id)
            .copied()
            .ok_or_else(|| anyhow!("no storage for '{}'", self.program.symbol(id).name))
    }

    fn function(&self, id: SymbolId) -> Result<FunctionValue<'ctx>> {
        self.funcs
            .get(&id)
            .copied()
            .ok_or_else(|| anyhow!("unknown function '{}'", self.program.symbol(id).name))
    }

    /// Stack slot in the entry block of the current function.
    fn alloca(&mut self, id: SymbolId) -> Result<PointerValue<'ctx>> {
        let symbol = self.program.symbol(id);
        let entry = self
            .state()?
            .function
            .get_first_basic_block()
            .ok_or_else(|| anyhow!("function without an entry block"))?;
        let builder = self.context.create_builder();

        match entry.get_first_instruction() {
            Some(instr) => builder.position_before(&instr),
            None => builder.position_at_end(entry),
        }

        let slot = builder.build_alloca(self.basic_type(symbol.ty), &symbol.name)?;
        self.slots.insert(id, slot);

        Ok(slot)
    }

    fn call_runtime(
        &self,
        function: FunctionValue<'ctx>,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> Result<Option<BasicValueEnum<'ctx>>> {
        let site = self.builder.build_call(function, args, "")?;
        Ok(site.try_as_basic_value().left())
    }

    fn runtime_value(
        &self,
        function: FunctionValue<'ctx>,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> Result<BasicValueEnum<'ctx>> {
        self.call_runtime(function, args)?.ok_or_else(|| {
            anyhow!(
                "runtime function {} returns nothing",
                function.get_name().to_string_lossy()
            )
        })
    }

    /// Calls a runtime function returning a status flag and turns it into an `i1`.
    fn status(&self, function: FunctionValue<'ctx>) -> Result<IntValue<'ctx>> {
        let value = self.runtime_value(function, &[])?.into_int_value();

        Ok(self.builder.build_int_compare(
            IntPredicate::NE,
            value,
            value.get_type().const_zero(),
            "status",
        )?)
    }

    fn build_return(&mut self, value: Option<BasicValueEnum<'ctx>>) -> Result<()> {
        self.call_runtime(self.runtime.leave, &[])?;
        self.builder
            .build_return(value.as_ref().map(|value| value as &dyn BasicValue))?;

        Ok(())
    }

    fn bail(&mut self) -> Result<BasicBlock<'ctx>> {
        let state = self.state()?;

        if let Some(block) = state.bail {
            return Ok(block);
        }

        let (function, return_type) = (state.function, state.return_type);
        let current = self.builder.get_insert_block();
        let block = self.context.append_basic_block(function, "bail");

        self.builder.position_at_end(block);

        let value = match return_type {
            Type::Void => None,
            ty => Some(self.zero(ty)),
        };
        self.build_return(value)?;

        if let Some(current) = current {
            self.builder.position_at_end(current);
        }

        if let Some(state) = self.state.as_mut() {
            state.bail = Some(block);
        }

        Ok(block)
    }

    /// Continues in a fresh block when `status` holds, bails out otherwise.
    fn guard(&mut self, status: IntValue<'ctx>) -> Result<()> {
        let bail = self.bail()?;
        let next = self.append_block("next")?;

        self.builder.build_conditional_branch(status, next, bail)?;
        self.builder.position_at_end(next);

        Ok(())
    }

    fn check_fault(&mut self) -> Result<()> {
        let status = self.status(self.runtime.ok)?;
        self.guard(status)
    }

    fn trap_if(&mut self, cond: IntValue<'ctx>) -> Result<()> {
        let bail = self.bail()?;
        let trap = self.append_block("div.zero")?;
        let next = self.append_block("div.ok")?;

        self.builder.build_conditional_branch(cond, trap, next)?;

        self.builder.position_at_end(trap);
        self.call_runtime(self.runtime.div_zero, &[])?;
        self.builder.build_unconditional_branch(bail)?;

        self.builder.position_at_end(next);

        Ok(())
    }

    fn write_string(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let ptr = self.string(text);
        self.call_runtime(self.runtime.write_str, &[ptr.into()])?;

        Ok(())
    }

    fn write_value(&mut self, ty: Type, value: BasicValueEnum<'ctx>) -> Result<()> {
        let (function, value) = match ty {
            Type::Int => (self.runtime.write_int, value),
            Type::Real => (self.runtime.write_real, value),
            Type::Bool => {
                let value = self.builder.build_int_z_extend(
                    value.into_int_value(),
                    self.context.i32_type(),
                    "flag",
                )?;

                (self.runtime.write_bool, value.into())
            }
            Type::String => (self.runtime.write_str, value),
            Type::Void => return Err(anyhow!("can't print a void value")),
        };

        self.call_runtime(function, &[value.into()])?;

        Ok(())
    }

    fn read_value(&mut self, ty: Type) -> Result<BasicValueEnum<'ctx>> {
        let function = match ty {
            Type::Int => self.runtime.read_int,
            Type::Real => self.runtime.read_real,
            Type::Bool => self.runtime.read_bool,
            Type::String => self.runtime.read_str,
            Type::Void => return Err(anyhow!("can't read a void value")),
        };

        let value = self.runtime_value(function, &[])?;

        if ty == Type::Bool {
            let flag = value.into_int_value();

            return Ok(self
                .builder
                .build_int_compare(IntPredicate::NE, flag, flag.get_type().const_zero(), "read")?
                .into());
        }

        Ok(value)
    }

    fn generate_call(&mut self, call: &Call) -> Result<Option<BasicValueEnum<'ctx>>> {
        let function = self.function(call.callee)?;
        let mut args: Vec<BasicMetadataValueEnum> = Vec::with_capacity(call.args.len());

        for arg in call.args.iter() {
            args.push(self.generate_expr(arg)?.into());
        }

        let name = match function.get_type().get_return_type() {
            Some(_) => "call",
            None => "",
        };
        let site = self.builder.build_call(function, &args, name)?;

        self.check_fault()?;

        Ok(site.try_as_basic_value().left())
    }

    fn generate_int_div(
        &mut self,
        lhs: IntValue<'ctx>,
        rhs: IntValue<'ctx>,
    ) -> Result<IntValue<'ctx>> {
        let int_type = self.context.i64_type();
        let is_zero =
            self.builder
                .build_int_compare(IntPredicate::EQ, rhs, int_type.const_zero(), "is_zero")?;

        self.trap_if(is_zero)?;

        // x / -1 is lowered to a wrapping negation so i64::MIN / -1 doesn't trap.
        let minus_one = int_type.const_all_ones();
        let is_minus_one =
            self.builder
                .build_int_compare(IntPredicate::EQ, rhs, minus_one, "is_minus_one")?;
        let divisor = self
            .builder
            .build_select(is_minus_one, int_type.const_int(1, false), rhs, "divisor")?
            .into_int_value();
        let quotient = self.builder.build_int_signed_div(lhs, divisor, "div")?;
        let negated = self.builder.build_int_neg(lhs, "neg")?;

        Ok(self
            .builder
            .build_select(is_minus_one, negated, quotient, "quotient")?
            .into_int_value())
    }

    fn generate_int_op(
        &mut self,
        op: BinaryOp,
        lhs: IntValue<'ctx>,
        rhs: IntValue<'ctx>,
        signed: bool,
    ) -> Result<BasicValueEnum<'ctx>> {
        if let Some(predicate) = int_predicate(op, signed) {
            return Ok(self
                .builder
                .build_int_compare(predicate, lhs, rhs, "cmp")?
                .into());
        }

        Ok(match op {
            BinaryOp::Add => self.builder.build_int_add(lhs, rhs, "add")?,
            BinaryOp::Sub => self.builder.build_int_sub(lhs, rhs, "sub")?,
            BinaryOp::Mul => self.builder.build_int_mul(lhs, rhs, "mul")?,
            BinaryOp::Div => self.generate_int_div(lhs, rhs)?,
            _ => return Err(anyhow!("invalid integer operator '{}'", op)),
        }
        .into())
    }

    fn generate_real_op(
        &mut self,
        op: BinaryOp,
        lhs: FloatValue<'ctx>,
        rhs: FloatValue<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>> {
        let predicate = match op {
            BinaryOp::Add => return Ok(self.builder.build_float_add(lhs, rhs, "fadd")?.into()),
            BinaryOp::Sub => return Ok(self.builder.build_float_sub(lhs, rhs, "fsub")?.into()),
            BinaryOp::Mul => return Ok(self.builder.build_float_mul(lhs, rhs, "fmul")?.into()),
            BinaryOp::Div => {
                let is_zero = self.builder.build_float_compare(
                    FloatPredicate::OEQ,
                    rhs,
                    self.context.f64_type().const_zero(),
                    "is_zero",
                )?;

                self.trap_if(is_zero)?;

                return Ok(self.builder.build_float_div(lhs, rhs, "fdiv")?.into());
            }
            BinaryOp::Eq => FloatPredicate::OEQ,
            BinaryOp::NotEq => FloatPredicate::UNE,
            BinaryOp::Lt => FloatPredicate::OLT,
            BinaryOp::LtEq => FloatPredicate::OLE,
            BinaryOp::Gt => FloatPredicate::OGT,
            BinaryOp::GtEq => FloatPredicate::OGE,
            BinaryOp::And | BinaryOp::Or => {
                return Err(anyhow!("invalid real operator '{}'", op));
            }
        };

        Ok(self
            .builder
            .build_float_compare(predicate, lhs, rhs, "fcmp")?
            .into())
    }

    fn generate_string_op(
        &mut self,
        op: BinaryOp,
        lhs: PointerValue<'ctx>,
        rhs: PointerValue<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>> {
        if op == BinaryOp::Add {
            return self.runtime_value(self.runtime.concat, &[lhs.into(), rhs.into()]);
        }

        let predicate =
            int_predicate(op, true).ok_or_else(|| anyhow!("invalid string operator '{}'", op))?;
        let order = self
            .runtime_value(self.runtime.compare, &[lhs.into(), rhs.into()])?
            .into_int_value();

        Ok(self
            .builder
            .build_int_compare(predicate, order, order.get_type().const_zero(), "strcmp")?
            .into())
    }

    /// `&&` and `||` only evaluate the right operand when the left one doesn't
    /// decide the result.
    fn generate_logical(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<BasicValueEnum<'ctx>> {
        let bool_type = self.context.bool_type();
        let lhs = self.generate_expr(lhs)?.into_int_value();
        let lhs_block = self.current_block()?;
        let rhs_block = self.append_block("logic.rhs")?;
        let end = self.append_block("logic.end")?;

        let short = if op == BinaryOp::And {
            self.builder.build_conditional_branch(lhs, rhs_block, end)?;
            bool_type.const_zero()
        } else {
            self.builder.build_conditional_branch(lhs, end, rhs_block)?;
            bool_type.const_all_ones()
        };

        self.builder.position_at_end(rhs_block);
        let rhs = self.generate_expr(rhs)?.into_int_value();
        let rhs_block = self.current_block()?;
        self.builder.build_unconditional_branch(end)?;

        self.builder.position_at_end(end);
        let phi = self.builder.build_phi(bool_type, "logic")?;
        phi.add_incoming(&[(&short, lhs_block), (&rhs, rhs_block)]);

        Ok(phi.as_basic_value())
    }

    fn generate_expr(&mut self, expr: &Expr) -> Result<BasicValueEnum<'ctx>> {
        Ok(match &expr.kind {
            ExprKind::Var(id) => {
                let symbol = self.program.symbol(*id);
                let slot = self.slot(*id)?;

                self.builder
                    .build_load(self.basic_type(symbol.ty), slot, &symbol.name)?
            }
            ExprKind::Literal(literal) => self.literal(literal),
            ExprKind::Promote(inner) => {
                let value = self.generate_expr(inner)?.into_int_value();

                self.builder
                    .build_signed_int_to_float(value, self.context.f64_type(), "promote")?
                    .into()
            }
            ExprKind::Unary(op, operand) => {
                let value = self.generate_expr(operand)?;

                match (op, operand.ty) {
                    (UnaryOp::Neg, Type::Real) => self
                        .builder
                        .build_float_neg(value.into_float_value(), "fneg")?
                        .into(),
                    (UnaryOp::Neg, _) => self
                        .builder
                        .build_int_neg(value.into_int_value(), "neg")?
                        .into(),
                    (UnaryOp::Not, _) => self
                        .builder
                        .build_not(value.into_int_value(), "not")?
                        .into(),
                }
            }
            ExprKind::Call(call) => self
                .generate_call(call)?
                .ok_or_else(|| anyhow!("void call used as a value"))?,
            ExprKind::Binary(op, lhs, rhs) if op.is_logical() => {
                self.generate_logical(*op, lhs, rhs)?
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let ty = lhs.ty;
                let lhs = self.generate_expr(lhs)?;
                let rhs = self.generate_expr(rhs)?;

                match ty {
                    Type::Int => {
                        self.generate_int_op(*op, lhs.into_int_value(), rhs.into_int_value(), true)?
                    }
                    Type::Bool => self.generate_int_op(
                        *op,
                        lhs.into_int_value(),
                        rhs.into_int_value(),
                        false,
                    )?,
                    Type::Real => {
                        self.generate_real_op(*op, lhs.into_float_value(), rhs.into_float_value())?
                    }
                    Type::String => self.generate_string_op(
                        *op,
                        lhs.into_pointer_value(),
                        rhs.into_pointer_value(),
                    )?,
                    Type::Void => return Err(anyhow!("operator '{}' applied to void", op)),
                }
            }
        })
    }

    fn generate_if(&mut self, branches: &[CondBlock], else_block: Option<&Block>) -> Result<()> {
        let mut open = vec![];

        for branch in branches {
            let cond = self.generate_expr(&branch.cond)?.into_int_value();
            let then_block = self.append_block("if.then")?;
            let next = self.append_block("if.else")?;

            self.builder
                .build_conditional_branch(cond, then_block, next)?;

            self.builder.position_at_end(then_block);
            self.generate_stmts(&branch.body.stmts)?;

            if !self.terminated() {
                open.push(self.current_block()?);
            }

            self.builder.position_at_end(next);
        }

        if let Some(block) = else_block {
            self.generate_stmts(&block.stmts)?;
        }

        if !self.terminated() {
            open.push(self.current_block()?);
        }

        let merge = self.append_block("if.end")?;

        for block in open {
            self.builder.position_at_end(block);
            self.builder.build_unconditional_branch(merge)?;
        }

        self.builder.position_at_end(merge);

        Ok(())
    }

    fn generate_while(&mut self, cond: &Expr, body: &Block) -> Result<()> {
        let cond_block = self.append_block("while.cond")?;

        self.builder.build_unconditional_branch(cond_block)?;
        self.builder.position_at_end(cond_block);

        // Gives the watchdog a chance to stop runaway loops.
        let running = self.status(self.runtime.poll)?;
        self.guard(running)?;

        let cond = self.generate_expr(cond)?.into_int_value();
        let body_block = self.append_block("while.body")?;
        let end = self.append_block("while.end")?;

        self.builder
            .build_conditional_branch(cond, body_block, end)?;

        self.builder.position_at_end(body_block);
        self.generate_stmts(&body.stmts)?;

        if !self.terminated() {
            self.builder.build_unconditional_branch(cond_block)?;
        }

        self.builder.position_at_end(end);

        Ok(())
    }

    fn generate_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Var { symbols, init } => {
                for id in symbols {
                    let slot = self.alloca(*id)?;
                    let value = match init {
                        Some(init) => self.generate_expr(init)?,
                        None => {
                            let ty = self.program.symbol(*id).ty;
                            self.zero(ty)
                        }
                    };

                    self.builder.build_store(slot, value)?;
                }
            }
            StmtKind::Assign(assign) => {
                let value = self.generate_expr(&assign.value)?;
                let slot = self.slot(assign.symbol)?;

                self.builder.build_store(slot, value)?;
            }
            StmtKind::Call(call) => {
                self.generate_call(call)?;
            }
            StmtKind::Input { prompt, targets } => {
                self.write_string(prompt)?;

                for id in targets {
                    let ty = self.program.symbol(*id).ty;
                    let value = self.read_value(ty)?;

                    self.check_fault()?;

                    let slot = self.slot(*id)?;
                    self.builder.build_store(slot, value)?;
                }
            }
            StmtKind::Output {
                label,
                values,
                newline,
            } => {
                self.write_string(label)?;

                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        self.write_string(" ")?;
                    }

                    let result = self.generate_expr(value)?;
                    self.write_value(value.ty, result)?;
                }

                if *newline {
                    self.call_runtime(self.runtime.newline, &[])?;
                }
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.generate_expr(value)?),
                    None => None,
                };

                self.build_return(value)?;
            }
            StmtKind::If {
                branches,
                else_block,
            } => self.generate_if(branches, else_block.as_ref())?,
            StmtKind::While { cond, body } => self.generate_while(cond, body)?,
            StmtKind::For(for_stmt) => {
                let stmts = lower::desugar_for(stmt.span.clone(), for_stmt.clone());
                self.generate_stmts(&stmts)?;
            }
            StmtKind::Block(block) => self.generate_stmts(&block.stmts)?,
        }

        Ok(())
    }

    fn generate_stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            // Anything after a return is dead.
            if self.terminated() {
                break;
            }

            self.generate_stmt(stmt)?;
        }

        Ok(())
    }

    fn generate_body(
        &mut self,
        function: FunctionValue<'ctx>,
        return_type: Type,
        params: &[SymbolId],
        stmts: &[Stmt],
    ) -> Result<()> {
        let entry = self.context.append_basic_block(function, "entry");

        self.builder.position_at_end(entry);
        self.state = Some(FnState {
            function,
            return_type,
            bail: None,
        });

        let entered = self.status(self.runtime.enter)?;
        self.guard(entered)?;

        for (param, id) in function.get_param_iter().zip(params) {
            let slot = self.alloca(*id)?;
            self.builder.build_store(slot, param)?;
        }

        self.generate_stmts(stmts)?;

        if !self.terminated() {
            match return_type {
                Type::Void => self.build_return(None)?,
                // Every path of a non-void body ends in a return.
                _ => {
                    self.builder.build_unreachable()?;
                }
            }
        }

        self.state = None;

        Ok(())
    }

    fn declare_globals(&mut self) {
        let program = self.program;

        for global in program.globals.iter() {
            let symbol = program.symbol(global.symbol);
            let value = self
                .module
                .add_global(self.basic_type(symbol.ty), None, &symbol.name);
            let zero = self.zero(symbol.ty);

            value.set_initializer(&zero);
            value.set_linkage(Linkage::Internal);

            self.slots.insert(global.symbol, value.as_pointer_value());
        }
    }

    fn declare_fn(&mut self, func: &FnDef) {
        let params = func
            .params
            .iter()
            .map(|id| self.program.symbol(*id).ty)
            .collect::<Vec<_>>();
        let function = self.module.add_function(
            &func.name,
            self.fn_type(func.return_type, &params),
            None,
        );

        for (param, id) in function.get_param_iter().zip(func.params.iter()) {
            param.set_name(&self.program.symbol(*id).name);
        }

        self.funcs.insert(func.symbol, function);
    }

    /// Resets every global: declared ones to their zero value, inferred ones
    /// to their initializer, in declaration order.
    fn generate_init(&mut self) -> Result<FunctionValue<'ctx>> {
        let function = self.module.add_function(
            INIT_FN,
            self.context.void_type().fn_type(&[], false),
            Some(Linkage::Internal),
        );
        let stmts = self
            .program
            .globals
            .iter()
            .map(|global| {
                let ty = self.program.symbol(global.symbol).ty;
                let value = global.init.clone().unwrap_or_else(|| {
                    Expr::new(
                        global.span.clone(),
                        ty,
                        ExprKind::Literal(zero_literal(ty)),
                    )
                });

                Stmt::new(
                    global.span.clone(),
                    StmtKind::Assign(Assign {
                        span: global.span.clone(),
                        symbol: global.symbol,
                        value,
                    }),
                )
            })
            .collect::<Vec<_>>();

        self.generate_body(function, Type::Void, &[], &stmts)?;

        Ok(function)
    }

    fn generate_entry(&mut self, func: &FnDef, init: FunctionValue<'ctx>) -> Result<()> {
        let i64_type = self.context.i64_type();
        let shim = self
            .module
            .add_function(&entry_name(&func.name), i64_type.fn_type(&[], false), None);
        let entry = self.context.append_basic_block(shim, "entry");
        let run = self.context.append_basic_block(shim, "run");
        let failed = self.context.append_basic_block(shim, "failed");

        self.builder.position_at_end(entry);
        self.call_runtime(init, &[])?;

        let ready = self.status(self.runtime.ok)?;
        self.builder.build_conditional_branch(ready, run, failed)?;

        self.builder.position_at_end(failed);
        self.builder.build_return(Some(&i64_type.const_zero()))?;

        self.builder.position_at_end(run);

        let function = self.function(func.symbol)?;
        let result = self.call_runtime(function, &[])?;
        let raw = match (func.return_type, result) {
            (Type::Int, Some(value)) => value.into_int_value(),
            (Type::Real, Some(value)) => self
                .builder
                .build_bit_cast(value, i64_type, "raw")?
                .into_int_value(),
            (Type::Bool, Some(value)) => {
                self.builder
                    .build_int_z_extend(value.into_int_value(), i64_type, "raw")?
            }
            (Type::String, Some(value)) => {
                self.builder
                    .build_ptr_to_int(value.into_pointer_value(), i64_type, "raw")?
            }
            _ => i64_type.const_zero(),
        };

        self.builder.build_return(Some(&raw))?;

        Ok(())
    }

    pub fn generate(mut self) -> Result<Module<'ctx>> {
        let program = self.program;

        self.declare_globals();

        for func in program.funcs.iter() {
            self.declare_fn(func);
        }

        let init = self.generate_init()?;

        for func in program.funcs.iter() {
            trace!(name = %func.name, "generating function");

            let function = self.function(func.symbol)?;
            self.generate_body(function, func.return_type, &func.params, &func.body.stmts)?;
        }

        for func in program.funcs.iter().filter(|func| func.params.is_empty()) {
            self.generate_entry(func, init)?;
        }

        self.module
            .verify()
            .map_err(|e| anyhow!("failed to verify module: {}", e))?;

        debug!(
            functions = program.funcs.len(),
            globals = program.globals.len(),
            strings = self.strings.len(),
            "generated module"
        );

        Ok(self.module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::syntax::{parse, tokenize};
    use crate::frontend::Analyzer;

    fn generate(source: &str) -> String {
        let program = Analyzer::new()
            .analyze(parse(tokenize(source).unwrap()).unwrap())
            .unwrap();
        let context = Context::create();
        let module = CodeGen::new(&context, &program, "test").generate().unwrap();

        module.print_to_string().to_string()
    }

    #[test]
    fn test_entry_shims_for_parameterless_functions() {
        let ir = generate(
            "func int -> f(int: n) { return n; } func void -> main() { <<! \"\" # (f(1)); }",
        );

        assert!(ir.contains("@grammo.entry.main()"));
        assert!(!ir.contains("@grammo.entry.f()"));
        assert!(ir.contains("@grammo.init()"));
    }

    #[test]
    fn test_promotion_is_sitofp() {
        let ir = generate("func real -> f() { var int: i; i = 3; return i + 4.5; }");

        assert!(ir.contains("sitofp i64"));
    }

    #[test]
    fn test_globals_and_strings() {
        let ir = generate(
            "var string: s; var n = 2; func void -> main() { s = \"hi\"; <<! \"s:\" # (s, n); }",
        );

        assert!(ir.contains("@s = internal global ptr"));
        assert!(ir.contains("@n = internal global i64 0"));
        assert!(ir.contains("c\"hi\\00\""));
    }

    #[test]
    fn test_dead_code_after_return() {
        let ir = generate("func int -> f() { return 1; <<! \"never\" # (); }");

        assert!(!ir.contains("never"));
    }

    #[test]
    fn test_for_becomes_while() {
        let ir = generate(
            "func int -> f() { var int: i, s; for (i = 0; i < 10; i = i + 1) { s = s + i; } return s; }",
        );

        assert!(ir.contains("while.cond"));
        assert!(ir.contains("while.body"));
    }
}
