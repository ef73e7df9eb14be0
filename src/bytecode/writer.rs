//! Emits code for rewritten expression trees.
//!
//! Every `write_*` method leaves exactly one value on the operand stack (or
//! none for `void`) and reports the type it left there. Nodes the rewrite
//! could not bind statically are compiled to calls into the runtime's
//! `ScriptBytecodeAdapter`.

use super::adapter::{adapter_method, comparison_adapter};
use super::code::CodeBuilder;
use super::consts::{int_const_instr, ldc, load_literal, load_literal_as};
use super::descriptor::{class_internal_name, internal_name};
use super::helpers::{
    array_element_ops, convert, dup_instruction, load_class_literal, load_instruction, load_var,
    negate_boolean, pop_instruction, return_instruction, store_instruction, store_var,
    unbox_value,
};
use super::pool::PoolCache;
use crate::ast::class::ClassTable;
use crate::ast::types::{CLASS_CLASS, MethodDescriptor, PrimitiveKind, TypeRef, slot_size};
use crate::ast::{
    BinaryOp, ExprKind, Expression, InvokeKind, Literal, MapEntry, MethodCall, MethodRef,
    PropertyInit, Statement, TruthStrategy, Variable,
};
use crate::error::{CompileError, Result};

use ristretto_classfile::attributes::Instruction;

pub struct ExpressionWriter<'a> {
    code: &'a mut CodeBuilder,
    pool: &'a mut PoolCache,
    classes: &'a ClassTable,
    /// Dotted name of the class the code belongs to.
    sender: &'a str,
}

fn unsupported(construct: &str, context: impl Into<String>) -> CompileError {
    CompileError::Unsupported {
        construct: construct.to_string(),
        context: context.into(),
    }
}

fn primitive(kind: PrimitiveKind) -> TypeRef {
    TypeRef::Primitive(kind)
}

/// Kind both operands are brought to before a primitive arithmetic or
/// comparison instruction.
fn promote(left: PrimitiveKind, right: PrimitiveKind) -> PrimitiveKind {
    use PrimitiveKind::*;
    match (left, right) {
        (Double, _) | (_, Double) => Double,
        (Float, _) | (_, Float) => Float,
        (Long, _) | (_, Long) => Long,
        _ => Int,
    }
}

fn arithmetic_instruction(op: BinaryOp, kind: PrimitiveKind) -> Option<Instruction> {
    use Instruction as JI;
    use PrimitiveKind::*;
    Some(match (op, kind) {
        (BinaryOp::Plus, Int) => JI::Iadd,
        (BinaryOp::Minus, Int) => JI::Isub,
        (BinaryOp::Multiply, Int) => JI::Imul,
        (BinaryOp::Mod, Int) => JI::Irem,
        (BinaryOp::BitAnd, Int) => JI::Iand,
        (BinaryOp::BitOr, Int) => JI::Ior,
        (BinaryOp::BitXor, Int) => JI::Ixor,
        (BinaryOp::LeftShift, Int) => JI::Ishl,
        (BinaryOp::RightShift, Int) => JI::Ishr,
        (BinaryOp::Plus, Long) => JI::Ladd,
        (BinaryOp::Minus, Long) => JI::Lsub,
        (BinaryOp::Multiply, Long) => JI::Lmul,
        (BinaryOp::Mod, Long) => JI::Lrem,
        (BinaryOp::BitAnd, Long) => JI::Land,
        (BinaryOp::BitOr, Long) => JI::Lor,
        (BinaryOp::BitXor, Long) => JI::Lxor,
        (BinaryOp::LeftShift, Long) => JI::Lshl,
        (BinaryOp::RightShift, Long) => JI::Lshr,
        (BinaryOp::Plus, Float) => JI::Fadd,
        (BinaryOp::Minus, Float) => JI::Fsub,
        (BinaryOp::Multiply, Float) => JI::Fmul,
        (BinaryOp::Divide, Float) => JI::Fdiv,
        (BinaryOp::Mod, Float) => JI::Frem,
        (BinaryOp::Plus, Double) => JI::Dadd,
        (BinaryOp::Minus, Double) => JI::Dsub,
        (BinaryOp::Multiply, Double) => JI::Dmul,
        (BinaryOp::Divide, Double) => JI::Ddiv,
        (BinaryOp::Mod, Double) => JI::Drem,
        // integer division yields a decimal in the language; left to the runtime
        _ => return None,
    })
}

/// Branch taken when `op` holds, after the operands were reduced to an int
/// (directly for int-width kinds, via a compare instruction otherwise).
fn comparison_branch(op: BinaryOp, int_operands: bool) -> Option<fn(u16) -> Instruction> {
    use Instruction as JI;
    Some(match (op, int_operands) {
        (BinaryOp::Equal, true) => JI::If_icmpeq,
        (BinaryOp::NotEqual, true) => JI::If_icmpne,
        (BinaryOp::LessThan, true) => JI::If_icmplt,
        (BinaryOp::LessThanEqual, true) => JI::If_icmple,
        (BinaryOp::GreaterThan, true) => JI::If_icmpgt,
        (BinaryOp::GreaterThanEqual, true) => JI::If_icmpge,
        (BinaryOp::Equal, false) => JI::Ifeq,
        (BinaryOp::NotEqual, false) => JI::Ifne,
        (BinaryOp::LessThan, false) => JI::Iflt,
        (BinaryOp::LessThanEqual, false) => JI::Ifle,
        (BinaryOp::GreaterThan, false) => JI::Ifgt,
        (BinaryOp::GreaterThanEqual, false) => JI::Ifge,
        _ => return None,
    })
}

impl<'a> ExpressionWriter<'a> {
    pub fn new(
        code: &'a mut CodeBuilder,
        pool: &'a mut PoolCache,
        classes: &'a ClassTable,
        sender: &'a str,
    ) -> Self {
        ExpressionWriter {
            code,
            pool,
            classes,
            sender,
        }
    }

    /// Writes `expr` and returns the type of the value it left on the stack.
    pub fn write(&mut self, expr: &Expression) -> Result<TypeRef> {
        match &expr.kind {
            ExprKind::Constant(literal) => self.write_constant(expr, literal),
            ExprKind::Variable(v) => self.write_variable(v),
            ExprKind::DynamicVariable(name) => {
                let this = Expression::this();
                self.write_dynamic_property(&this, name, false)
            }
            ExprKind::This => {
                self.code.emit(Instruction::Aload_0);
                Ok(TypeRef::class(self.sender))
            }
            ExprKind::Property {
                object,
                property,
                safe,
                ..
            } => self.write_property(object, property, *safe),
            ExprKind::Binary { left, op, right } => self.write_binary(left, *op, right),
            ExprKind::MethodCall(call) => self.write_method_call(call),
            ExprKind::StaticMethodCall {
                owner,
                name,
                arguments,
            } => self.write_dynamic_static_call(owner, name, arguments),
            ExprKind::ConstructorCall { ty, arguments } => {
                self.write_constructor_call(ty, arguments, expr.metadata.direct_call_target())
            }
            ExprKind::Closure { .. } => Err(unsupported(
                "closure expression",
                format!("line {}: closures are compiled into their own classes", expr.position.line),
            )),
            ExprKind::Boolean(inner) => {
                let ty = self.write(inner)?;
                self.to_boolean(&ty)?;
                Ok(TypeRef::boolean())
            }
            ExprKind::TruthTest { expr, strategy } => {
                self.write_truth_test(expr, *strategy)?;
                Ok(TypeRef::boolean())
            }
            ExprKind::Not(inner) => {
                self.write_condition(inner)?;
                negate_boolean(self.code);
                Ok(TypeRef::boolean())
            }
            ExprKind::Ternary {
                condition,
                then,
                otherwise,
            } => self.write_ternary(condition, then, otherwise),
            ExprKind::List(elements) => {
                let elements: Vec<&Expression> = elements.iter().collect();
                self.write_object_array(&elements)?;
                self.invoke_adapter("createList")
            }
            ExprKind::Map(entries) => {
                let flattened: Vec<&Expression> = entries
                    .iter()
                    .flat_map(|MapEntry { key, value }| [key, value])
                    .collect();
                self.write_object_array(&flattened)?;
                self.invoke_adapter("createMap")
            }
            ExprKind::ClassRef(ty) => {
                load_class_literal(self.code, self.pool, ty)?;
                Ok(TypeRef::class(CLASS_CLASS))
            }
            ExprKind::Cast { ty, expr } => {
                self.write_as(expr, ty)?;
                Ok(ty.clone())
            }
            ExprKind::CompareToNull { expr, equal } => {
                self.write_compare_to_null(expr, *equal)?;
                Ok(TypeRef::boolean())
            }
            ExprKind::MapStyleConstructor { ty, entries } => {
                self.write_map_style_constructor(ty, entries)?;
                Ok(ty.clone())
            }
        }
    }

    /// Writes `expr` converted to `target`; a `void` target discards the value.
    pub fn write_as(&mut self, expr: &Expression, target: &TypeRef) -> Result<()> {
        let ty = self.write(expr)?;
        convert(self.code, self.pool, &ty, target)
    }

    /// Writes `expr` as a `boolean` 0/1 value.
    pub fn write_condition(&mut self, expr: &Expression) -> Result<()> {
        let ty = self.write(expr)?;
        self.to_boolean(&ty)
    }

    pub fn write_statement(&mut self, statement: &Statement, return_type: &TypeRef) -> Result<()> {
        match statement {
            Statement::Expression(expr) => {
                let ty = self.write(expr)?;
                if let Some(pop) = pop_instruction(&ty) {
                    self.code.emit(pop);
                }
            }
            Statement::Return(Some(expr)) => {
                self.write_as(expr, return_type)?;
                self.code.emit(return_instruction(return_type));
            }
            Statement::Return(None) => {
                if !return_type.is_void() {
                    convert(self.code, self.pool, &TypeRef::void(), return_type)?;
                }
                self.code.emit(return_instruction(return_type));
            }
        }
        Ok(())
    }

    fn write_constant(&mut self, expr: &Expression, literal: &Literal) -> Result<TypeRef> {
        match expr.metadata.inferred_type().and_then(TypeRef::primitive_kind) {
            Some(kind) if kind != PrimitiveKind::Void && *literal != Literal::Null => {
                load_literal_as(self.code, self.pool, literal, kind)?;
                Ok(primitive(kind))
            }
            _ => load_literal(self.code, self.pool, literal),
        }
    }

    fn write_variable(&mut self, variable: &Variable) -> Result<TypeRef> {
        load_var(self.code, self.pool, variable)?;
        if variable.holder {
            convert(self.code, self.pool, &TypeRef::object(), &variable.ty)?;
        }
        Ok(variable.ty.clone())
    }

    fn invoke(&mut self, method: &MethodRef) -> Result<()> {
        let owner = class_internal_name(&method.owner);
        let descriptor = method.descriptor.to_descriptor()?;
        let instruction = match method.invoke {
            InvokeKind::Static => {
                Instruction::Invokestatic(self.pool.method_ref(&owner, &method.name, &descriptor)?)
            }
            InvokeKind::Virtual => {
                Instruction::Invokevirtual(self.pool.method_ref(&owner, &method.name, &descriptor)?)
            }
            InvokeKind::Special => {
                Instruction::Invokespecial(self.pool.method_ref(&owner, &method.name, &descriptor)?)
            }
            InvokeKind::Interface => {
                let index = self
                    .pool
                    .interface_method_ref(&owner, &method.name, &descriptor)?;
                let count = u8::try_from(1 + method.descriptor.param_slots()).map_err(|_| {
                    CompileError::internal("invokeinterface", "too many argument slots")
                })?;
                Instruction::Invokeinterface(index, count)
            }
        };
        self.code.emit(instruction);
        Ok(())
    }

    /// Calls a runtime helper whose arguments are already on the stack.
    fn invoke_adapter(&mut self, name: &str) -> Result<TypeRef> {
        let method = adapter_method(name)?;
        self.invoke(&method)?;
        Ok(method.descriptor.ret)
    }

    fn load_sender_class(&mut self) -> Result<()> {
        load_class_literal(self.code, self.pool, &TypeRef::class(self.sender))
    }

    fn load_string(&mut self, value: &str) -> Result<()> {
        let index = self.pool.string(value)?;
        self.code.emit(ldc(index));
        Ok(())
    }

    /// `new Object[] { e0, e1, ... }` with every element boxed.
    fn write_object_array(&mut self, elements: &[&Expression]) -> Result<()> {
        let length = i32::try_from(elements.len())
            .map_err(|_| CompileError::internal("object array", "too many elements"))?;
        self.code.emit(int_const_instr(self.pool, length)?);
        let object_class = self.pool.class("java/lang/Object")?;
        self.code.emit(Instruction::Anewarray(object_class));
        for (i, element) in elements.iter().enumerate() {
            self.code.emit(Instruction::Dup);
            self.code.emit(int_const_instr(self.pool, i as i32)?);
            self.write_as(element, &TypeRef::object())?;
            self.code.emit(Instruction::Aastore);
        }
        Ok(())
    }

    fn write_arguments(&mut self, arguments: &[Expression], descriptor: &MethodDescriptor) -> Result<()> {
        if arguments.len() != descriptor.params.len() {
            return Err(CompileError::internal(
                "call arguments",
                format!(
                    "{} arguments for a method taking {}",
                    arguments.len(),
                    descriptor.params.len()
                ),
            ));
        }
        for (argument, param) in arguments.iter().zip(&descriptor.params) {
            self.write_as(argument, param)?;
        }
        Ok(())
    }

    /// Reduces the value of `ty` on the stack to a `boolean`.
    fn to_boolean(&mut self, ty: &TypeRef) -> Result<()> {
        if ty.primitive_kind() == Some(PrimitiveKind::Boolean) {
            return Ok(());
        }
        convert(self.code, self.pool, ty, &TypeRef::object())?;
        self.invoke_adapter("booleanUnbox")?;
        Ok(())
    }

    /// Pushes 1 if `branch` is taken, else 0.
    fn push_branch_result(&mut self, branch: fn(u16) -> Instruction) -> Result<()> {
        let taken = self.code.new_label();
        let end = self.code.new_label();
        self.code.branch(branch, taken);
        self.code.emit(Instruction::Iconst_0);
        self.code.branch(Instruction::Goto, end);
        self.code.place(taken)?;
        self.code.emit(Instruction::Iconst_1);
        self.code.place(end)?;
        Ok(())
    }

    /// Brings a receiver of `from` to the declaring class `owner`.
    fn convert_receiver(&mut self, from: &TypeRef, owner: &str) -> Result<()> {
        if from.class_name() == Some(owner) {
            return Ok(());
        }
        convert(self.code, self.pool, from, &TypeRef::class(owner))
    }

    fn narrow_to_int(&mut self, kind: PrimitiveKind) {
        match kind {
            PrimitiveKind::Long => self.code.emit(Instruction::L2i),
            PrimitiveKind::Float => self.code.emit(Instruction::F2i),
            PrimitiveKind::Double => self.code.emit(Instruction::D2i),
            _ => {}
        }
    }

    fn write_truth_test(&mut self, expr: &Expression, strategy: TruthStrategy) -> Result<()> {
        match strategy {
            TruthStrategy::Primitive(kind) => {
                self.write_as(expr, &primitive(kind))?;
                self.narrow_to_int(kind);
            }
            TruthStrategy::Boxed(kind) => {
                self.write(expr)?;
                let present = self.code.new_label();
                let end = self.code.new_label();
                self.code.emit(Instruction::Dup);
                self.code.branch(Instruction::Ifnonnull, present);
                self.code.emit(Instruction::Pop);
                self.code.emit(Instruction::Iconst_0);
                self.code.branch(Instruction::Goto, end);
                self.code.place(present)?;
                unbox_value(self.code, self.pool, &primitive(kind))?;
                self.narrow_to_int(kind);
                self.code.place(end)?;
            }
            TruthStrategy::NullCheck => {
                self.write(expr)?;
                self.push_branch_result(Instruction::Ifnonnull)?;
            }
            TruthStrategy::Dynamic => {
                let ty = self.write(expr)?;
                convert(self.code, self.pool, &ty, &TypeRef::object())?;
                self.invoke_adapter("booleanUnbox")?;
            }
        }
        Ok(())
    }

    fn write_compare_to_null(&mut self, expr: &Expression, equal: bool) -> Result<()> {
        let ty = self.write(expr)?;
        if ty.is_primitive() {
            // a primitive is never null; void counts as null
            if let Some(pop) = pop_instruction(&ty) {
                self.code.emit(pop);
            }
            let is_null = ty.is_void();
            self.code.emit(if is_null == equal {
                Instruction::Iconst_1
            } else {
                Instruction::Iconst_0
            });
            return Ok(());
        }
        self.push_branch_result(if equal {
            Instruction::Ifnull
        } else {
            Instruction::Ifnonnull
        })
    }

    fn write_ternary(
        &mut self,
        condition: &Expression,
        then: &Expression,
        otherwise: &Expression,
    ) -> Result<TypeRef> {
        let result = match (then.static_type(), otherwise.static_type()) {
            (Some(a), Some(b)) if a.erasure() == b.erasure() && !a.is_void() => a,
            _ => TypeRef::object(),
        };
        let else_label = self.code.new_label();
        let end = self.code.new_label();
        self.write_condition(condition)?;
        self.code.branch(Instruction::Ifeq, else_label);
        self.write_as(then, &result)?;
        self.code.branch(Instruction::Goto, end);
        self.code.place(else_label)?;
        self.write_as(otherwise, &result)?;
        self.code.place(end)?;
        Ok(result)
    }

    fn write_property(&mut self, object: &Expression, property: &str, safe: bool) -> Result<TypeRef> {
        let resolved = self.class_of(object).and_then(|class| {
            self.classes
                .find_property(&class, property)
                .map(|(owner, p)| (owner.to_string(), p.getter_name(), p.ty.clone()))
        });
        let Some((owner, getter_name, property_type)) = resolved else {
            return self.write_dynamic_property(object, property, safe);
        };

        let getter = MethodRef::new(
            owner.clone(),
            getter_name,
            MethodDescriptor::new(vec![], property_type.clone()),
            InvokeKind::Virtual,
        );
        let object_type = self.write(object)?;
        self.convert_receiver(&object_type, &owner)?;
        if !safe {
            self.invoke(&getter)?;
            return Ok(property_type);
        }

        let present = self.code.new_label();
        let end = self.code.new_label();
        self.code.emit(Instruction::Dup);
        self.code.branch(Instruction::Ifnonnull, present);
        self.code.emit(Instruction::Pop);
        self.code.emit(Instruction::Aconst_null);
        self.code.branch(Instruction::Goto, end);
        self.code.place(present)?;
        self.invoke(&getter)?;
        convert(self.code, self.pool, &property_type, &TypeRef::object())?;
        self.code.place(end)?;
        Ok(TypeRef::object())
    }

    /// Class whose properties `object` exposes; `this` is the class being compiled.
    fn class_of(&self, object: &Expression) -> Option<String> {
        if matches!(object.kind, ExprKind::This) && object.metadata.inferred_type().is_none() {
            return Some(self.sender.to_string());
        }
        object
            .static_type()
            .and_then(|ty| ty.class_name().map(str::to_string))
    }

    fn write_dynamic_property(&mut self, object: &Expression, property: &str, safe: bool) -> Result<TypeRef> {
        self.load_sender_class()?;
        self.write_as(object, &TypeRef::object())?;
        self.load_string(property)?;
        self.invoke_adapter(if safe { "getPropertySafe" } else { "getProperty" })
    }

    fn write_binary(&mut self, left: &Expression, op: BinaryOp, right: &Expression) -> Result<TypeRef> {
        if op == BinaryOp::Assign {
            return self.write_assignment(left, right);
        }
        if let Some(base) = op.compound_base() {
            // not bound to an operator method: `a op= b` is `a = a op b`
            let value = Expression::binary(left.clone(), base, right.clone());
            return self.write_assignment(left, &value);
        }
        match op {
            BinaryOp::Index => self.write_index(left, right),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                self.write_logical(left, op == BinaryOp::LogicalAnd, right)?;
                Ok(TypeRef::boolean())
            }
            op if op.is_comparison() || op == BinaryOp::CompareTo => {
                self.write_comparison(left, op, right)
            }
            _ => self.write_arithmetic(left, op, right),
        }
    }

    fn write_logical(&mut self, left: &Expression, and: bool, right: &Expression) -> Result<()> {
        let short_circuit = self.code.new_label();
        let end = self.code.new_label();
        let branch: fn(u16) -> Instruction = if and {
            Instruction::Ifeq
        } else {
            Instruction::Ifne
        };
        self.write_condition(left)?;
        self.code.branch(branch, short_circuit);
        self.write_condition(right)?;
        self.code.branch(branch, short_circuit);
        self.code
            .emit(if and { Instruction::Iconst_1 } else { Instruction::Iconst_0 });
        self.code.branch(Instruction::Goto, end);
        self.code.place(short_circuit)?;
        self.code
            .emit(if and { Instruction::Iconst_0 } else { Instruction::Iconst_1 });
        self.code.place(end)?;
        Ok(())
    }

    /// Operand kinds when both sides are primitives that compare directly.
    fn primitive_operands(left: &Expression, right: &Expression) -> Option<(PrimitiveKind, PrimitiveKind)> {
        let l = left.static_type()?.primitive_kind()?;
        let r = right.static_type()?.primitive_kind()?;
        if l == PrimitiveKind::Void || r == PrimitiveKind::Void {
            return None;
        }
        // booleans only compare with booleans
        ((l == PrimitiveKind::Boolean) == (r == PrimitiveKind::Boolean)).then_some((l, r))
    }

    fn write_comparison(&mut self, left: &Expression, op: BinaryOp, right: &Expression) -> Result<TypeRef> {
        if let (Some((l, r)), true) = (Self::primitive_operands(left, right), op.is_comparison()) {
            let kind = promote(l, r);
            self.write_as(left, &primitive(kind))?;
            self.write_as(right, &primitive(kind))?;
            let compare = match kind {
                PrimitiveKind::Long => Some(Instruction::Lcmp),
                // NaN must make every ordering test fail
                PrimitiveKind::Float if matches!(op, BinaryOp::LessThan | BinaryOp::LessThanEqual) => {
                    Some(Instruction::Fcmpg)
                }
                PrimitiveKind::Float => Some(Instruction::Fcmpl),
                PrimitiveKind::Double if matches!(op, BinaryOp::LessThan | BinaryOp::LessThanEqual) => {
                    Some(Instruction::Dcmpg)
                }
                PrimitiveKind::Double => Some(Instruction::Dcmpl),
                _ => None,
            };
            let int_operands = compare.is_none();
            if let Some(compare) = compare {
                self.code.emit(compare);
            }
            let branch = comparison_branch(op, int_operands).ok_or_else(|| {
                CompileError::internal("comparison", format!("no branch for {}", op.symbol()))
            })?;
            self.push_branch_result(branch)?;
            return Ok(TypeRef::boolean());
        }

        let adapter = comparison_adapter(op)?.ok_or_else(|| {
            CompileError::internal("comparison", format!("no runtime helper for {}", op.symbol()))
        })?;
        self.write_as(left, &TypeRef::object())?;
        self.write_as(right, &TypeRef::object())?;
        self.invoke(&adapter)?;
        Ok(adapter.descriptor.ret)
    }

    fn write_arithmetic(&mut self, left: &Expression, op: BinaryOp, right: &Expression) -> Result<TypeRef> {
        if let Some((l, r)) = Self::primitive_operands(left, right) {
            let shift = matches!(op, BinaryOp::LeftShift | BinaryOp::RightShift);
            let kind = if shift { promote(l, PrimitiveKind::Int) } else { promote(l, r) };
            let right_kind = if shift { PrimitiveKind::Int } else { kind };
            let integral = !shift || r.is_int_width();
            let usable = l != PrimitiveKind::Boolean && integral;
            if let Some(instruction) = arithmetic_instruction(op, kind).filter(|_| usable) {
                self.write_as(left, &primitive(kind))?;
                self.write_as(right, &primitive(right_kind))?;
                self.code.emit(instruction);
                return Ok(primitive(kind));
            }
        }

        let method = op.operator_method().ok_or_else(|| {
            unsupported("binary operator", format!("no runtime method for {}", op.symbol()))
        })?;
        self.load_sender_class()?;
        self.write_as(left, &TypeRef::object())?;
        self.load_string(method)?;
        self.write_object_array(&[right])?;
        self.invoke_adapter("invokeMethodN")
    }

    fn write_index(&mut self, array: &Expression, index: &Expression) -> Result<TypeRef> {
        let component = array
            .static_type()
            .and_then(|ty| ty.component().cloned());
        let Some(component) = component else {
            self.load_sender_class()?;
            self.write_as(array, &TypeRef::object())?;
            self.load_string("getAt")?;
            self.write_object_array(&[index])?;
            return self.invoke_adapter("invokeMethodN");
        };
        self.write(array)?;
        self.write_as(index, &TypeRef::int())?;
        self.code.emit(array_element_ops(&component).load);
        Ok(component)
    }

    fn write_assignment(&mut self, target: &Expression, value: &Expression) -> Result<TypeRef> {
        match &target.kind {
            ExprKind::Variable(variable) if variable.holder => {
                // holders store boxed values
                self.write_as(value, &variable.ty)?;
                convert(self.code, self.pool, &variable.ty, &TypeRef::object())?;
                self.code.emit(Instruction::Dup);
                store_var(self.code, self.pool, variable)?;
                Ok(TypeRef::object())
            }
            ExprKind::Variable(variable) => {
                self.write_as(value, &variable.ty)?;
                if let Some(dup) = dup_instruction(&variable.ty) {
                    self.code.emit(dup);
                }
                store_var(self.code, self.pool, variable)?;
                Ok(variable.ty.clone())
            }
            ExprKind::Binary {
                left: array,
                op: BinaryOp::Index,
                right: index,
            } => self.write_element_assignment(array, index, value),
            ExprKind::Property {
                object, property, ..
            } => self.write_property_assignment(object, property, value),
            ExprKind::DynamicVariable(name) => {
                let this = Expression::this();
                self.write_property_assignment(&this, name, value)
            }
            other => Err(unsupported(
                "assignment target",
                format!("cannot assign to {:?}", other),
            )),
        }
    }

    fn write_element_assignment(
        &mut self,
        array: &Expression,
        index: &Expression,
        value: &Expression,
    ) -> Result<TypeRef> {
        let component = array
            .static_type()
            .and_then(|ty| ty.component().cloned());
        let Some(component) = component else {
            self.load_sender_class()?;
            self.write_as(array, &TypeRef::object())?;
            self.load_string("putAt")?;
            self.write_object_array(&[index, value])?;
            return self.invoke_adapter("invokeMethodN");
        };
        self.write(array)?;
        self.write_as(index, &TypeRef::int())?;
        self.write_as(value, &component)?;
        // keep the assigned value as the expression result, below array and index
        self.code.emit(if slot_size(&component) == 2 {
            Instruction::Dup2_x2
        } else {
            Instruction::Dup_x2
        });
        self.code.emit(array_element_ops(&component).store);
        Ok(component)
    }

    fn write_property_assignment(
        &mut self,
        object: &Expression,
        property: &str,
        value: &Expression,
    ) -> Result<TypeRef> {
        let resolved = self.class_of(object).and_then(|class| {
            self.classes
                .find_property(&class, property)
                .map(|(owner, p)| (owner.to_string(), p.setter_name(), p.ty.clone()))
        });
        match resolved {
            Some((owner, setter_name, property_type)) => {
                let setter = MethodRef::new(
                    owner.clone(),
                    setter_name,
                    MethodDescriptor::new(vec![property_type.clone()], TypeRef::void()),
                    InvokeKind::Virtual,
                );
                let object_type = self.write(object)?;
                self.convert_receiver(&object_type, &owner)?;
                self.write_as(value, &property_type)?;
                self.code.emit(if slot_size(&property_type) == 2 {
                    Instruction::Dup2_x1
                } else {
                    Instruction::Dup_x1
                });
                self.invoke(&setter)?;
                Ok(property_type)
            }
            None => {
                // setProperty(value, sender, receiver, name)
                self.write_as(value, &TypeRef::object())?;
                self.code.emit(Instruction::Dup);
                self.load_sender_class()?;
                self.write_as(object, &TypeRef::object())?;
                self.load_string(property)?;
                self.invoke_adapter("setProperty")?;
                Ok(TypeRef::object())
            }
        }
    }

    fn write_method_call(&mut self, call: &MethodCall) -> Result<TypeRef> {
        let Some(target) = &call.target else {
            if let ExprKind::ClassRef(owner) = &call.receiver.kind {
                return self.write_dynamic_static_call(owner, &call.name, &call.arguments);
            }
            self.load_sender_class()?;
            self.write_as(&call.receiver, &TypeRef::object())?;
            self.load_string(&call.name)?;
            let arguments: Vec<&Expression> = call.arguments.iter().collect();
            self.write_object_array(&arguments)?;
            return self.invoke_adapter(if call.safe {
                "invokeMethodNSafe"
            } else {
                "invokeMethodN"
            });
        };

        if target.is_static() {
            if !matches!(call.receiver.kind, ExprKind::ClassRef(_) | ExprKind::This) {
                // evaluated for its side effects only
                let ty = self.write(&call.receiver)?;
                if let Some(pop) = pop_instruction(&ty) {
                    self.code.emit(pop);
                }
            }
            self.write_arguments(&call.arguments, &target.descriptor)?;
            self.invoke(target)?;
            return Ok(target.descriptor.ret.clone());
        }

        let receiver_type = self.write(&call.receiver)?;
        self.convert_receiver(&receiver_type, &target.owner)?;
        if !call.safe {
            self.write_arguments(&call.arguments, &target.descriptor)?;
            self.invoke(target)?;
            return Ok(target.descriptor.ret.clone());
        }

        let present = self.code.new_label();
        let end = self.code.new_label();
        self.code.emit(Instruction::Dup);
        self.code.branch(Instruction::Ifnonnull, present);
        self.code.emit(Instruction::Pop);
        self.code.emit(Instruction::Aconst_null);
        self.code.branch(Instruction::Goto, end);
        self.code.place(present)?;
        self.write_arguments(&call.arguments, &target.descriptor)?;
        self.invoke(target)?;
        convert(self.code, self.pool, &target.descriptor.ret, &TypeRef::object())?;
        self.code.place(end)?;
        Ok(TypeRef::object())
    }

    fn write_dynamic_static_call(
        &mut self,
        owner: &TypeRef,
        name: &str,
        arguments: &[Expression],
    ) -> Result<TypeRef> {
        self.load_sender_class()?;
        load_class_literal(self.code, self.pool, owner)?;
        self.load_string(name)?;
        let arguments: Vec<&Expression> = arguments.iter().collect();
        self.write_object_array(&arguments)?;
        self.invoke_adapter("invokeStaticMethodN")
    }

    fn write_constructor_call(
        &mut self,
        ty: &TypeRef,
        arguments: &[Expression],
        target: Option<&MethodRef>,
    ) -> Result<TypeRef> {
        let class_name = internal_name(ty)?;
        match target {
            Some(constructor) => {
                let class_index = self.pool.class(&class_name)?;
                self.code.emit(Instruction::New(class_index));
                self.code.emit(Instruction::Dup);
                self.write_arguments(arguments, &constructor.descriptor)?;
                let descriptor = MethodDescriptor::new(
                    constructor.descriptor.params.clone(),
                    TypeRef::void(),
                )
                .to_descriptor()?;
                let init = self.pool.method_ref(&class_name, "<init>", &descriptor)?;
                self.code.emit(Instruction::Invokespecial(init));
            }
            None => {
                self.load_sender_class()?;
                load_class_literal(self.code, self.pool, ty)?;
                let arguments: Vec<&Expression> = arguments.iter().collect();
                self.write_object_array(&arguments)?;
                self.invoke_adapter("invokeNewN")?;
                convert(self.code, self.pool, &TypeRef::object(), ty)?;
            }
        }
        Ok(ty.clone())
    }

    /// `new T()` into a temporary, one property write per entry, then the
    /// temporary as the result.
    fn write_map_style_constructor(&mut self, ty: &TypeRef, entries: &[PropertyInit]) -> Result<()> {
        let class_name = internal_name(ty)?;
        let class_index = self.pool.class(&class_name)?;
        let init = self.pool.method_ref(&class_name, "<init>", "()V")?;
        self.code.emit(Instruction::New(class_index));
        self.code.emit(Instruction::Dup);
        self.code.emit(Instruction::Invokespecial(init));

        let temp = self.code.allocate_local(1);
        let object = TypeRef::object();
        self.code.emit(store_instruction(&object, temp)?);
        for entry in entries {
            match &entry.setter {
                Some(setter) => {
                    self.code.emit(load_instruction(&object, temp)?);
                    let param = setter.descriptor.params.first().cloned().ok_or_else(|| {
                        CompileError::internal("map-style constructor", "setter without parameter")
                    })?;
                    self.write_as(&entry.value, &param)?;
                    self.invoke(setter)?;
                    if let Some(pop) = pop_instruction(&setter.descriptor.ret) {
                        self.code.emit(pop);
                    }
                }
                None => {
                    self.write_as(&entry.value, &object)?;
                    self.load_sender_class()?;
                    self.code.emit(load_instruction(&object, temp)?);
                    self.load_string(&entry.name)?;
                    self.invoke_adapter("setProperty")?;
                }
            }
        }
        self.code.emit(load_instruction(&object, temp)?);
        self.code.release_local(temp, 1);
        if !ty.is_object() {
            convert(self.code, self.pool, &object, ty)?;
        }
        Ok(())
    }
}
