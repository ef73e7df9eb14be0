//! Operand-stack simulation over emitted instructions.
//!
//! Values are tracked one word at a time: `long` and `double` occupy a value
//! word followed by [`Word::Top`], exactly as the verifier counts them. The
//! simulator computes `max_stack` and rejects sequences that underflow, pop
//! the wrong kind of value, or reach a branch target with two different
//! stack shapes.

use super::descriptor::{OpcodeFamily, opcode_family, parse_field_descriptor, parse_method_descriptor};
use super::pool::{PoolCache, PoolEntry};
use crate::ast::types::TypeRef;
use crate::error::{CompileError, Result};

use ristretto_classfile::attributes::Instruction;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    Int,
    Float,
    Reference,
    Long,
    Double,
    /// Upper half of a `long` or `double`.
    Top,
}

impl Word {
    fn is_category1(self) -> bool {
        matches!(self, Word::Int | Word::Float | Word::Reference)
    }
}

/// Words a value of `ty` occupies, bottom first.
pub fn words_of(ty: &TypeRef) -> Vec<Word> {
    match opcode_family(ty) {
        OpcodeFamily::Int => vec![Word::Int],
        OpcodeFamily::Float => vec![Word::Float],
        OpcodeFamily::Reference => vec![Word::Reference],
        OpcodeFamily::Long => vec![Word::Long, Word::Top],
        OpcodeFamily::Double => vec![Word::Double, Word::Top],
        OpcodeFamily::Void => vec![],
    }
}

pub struct StackSimulator<'a> {
    pool: &'a PoolCache,
    stack: Vec<Word>,
    max_depth: usize,
    // Stack shape recorded for each branch target.
    targets: HashMap<usize, Vec<Word>>,
    reachable: bool,
}

impl<'a> StackSimulator<'a> {
    pub fn new(pool: &'a PoolCache) -> Self {
        StackSimulator {
            pool,
            stack: Vec::new(),
            max_depth: 0,
            targets: HashMap::new(),
            reachable: true,
        }
    }

    /// Starts with values of `types` already on the stack (first is bottom).
    pub fn with_stack(pool: &'a PoolCache, types: &[TypeRef]) -> Self {
        let mut sim = StackSimulator::new(pool);
        for ty in types {
            sim.stack.extend(words_of(ty));
        }
        sim.max_depth = sim.stack.len();
        sim
    }

    pub fn stack(&self) -> &[Word] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Runs the whole instruction sequence.
    pub fn run(&mut self, instructions: &[Instruction]) -> Result<()> {
        for (index, instruction) in instructions.iter().enumerate() {
            match self.targets.get(&index) {
                Some(recorded) if self.reachable => {
                    if *recorded != self.stack {
                        return Err(CompileError::StackMismatch {
                            index,
                            expected: format!("{:?}", recorded),
                            found: format!("{:?}", self.stack),
                        });
                    }
                }
                Some(recorded) => {
                    self.stack = recorded.clone();
                    self.reachable = true;
                }
                None if !self.reachable => continue,
                None => {}
            }
            self.step(index, instruction)?;
        }
        Ok(())
    }

    fn push(&mut self, word: Word) {
        self.stack.push(word);
        self.max_depth = self.max_depth.max(self.stack.len());
    }

    fn push_type(&mut self, ty: &TypeRef) {
        for word in words_of(ty) {
            self.push(word);
        }
    }

    fn pop_word(&mut self, index: usize, instruction: &Instruction) -> Result<Word> {
        self.stack.pop().ok_or_else(|| CompileError::StackUnderflow {
            index,
            instruction: format!("{:?}", instruction),
        })
    }

    fn pop_expect(&mut self, expected: Word, index: usize, instruction: &Instruction) -> Result<()> {
        if matches!(expected, Word::Long | Word::Double) {
            let top = self.pop_word(index, instruction)?;
            if top != Word::Top {
                return Err(mismatch(index, expected, top));
            }
        }
        let found = self.pop_word(index, instruction)?;
        if found != expected {
            return Err(mismatch(index, expected, found));
        }
        Ok(())
    }

    fn pop_type(&mut self, ty: &TypeRef, index: usize, instruction: &Instruction) -> Result<()> {
        for word in words_of(ty).into_iter().rev() {
            if word != Word::Top {
                // pop_expect consumes the Top half itself
                self.pop_expect(word, index, instruction)?;
            }
        }
        Ok(())
    }

    fn pop_category1(&mut self, index: usize, instruction: &Instruction) -> Result<Word> {
        let word = self.pop_word(index, instruction)?;
        if !word.is_category1() {
            return Err(CompileError::StackMismatch {
                index,
                expected: "a category 1 value".into(),
                found: format!("{:?}", word),
            });
        }
        Ok(word)
    }

    fn pop_words(&mut self, count: usize, index: usize, instruction: &Instruction) -> Result<Vec<Word>> {
        if self.stack.len() < count {
            return Err(CompileError::StackUnderflow {
                index,
                instruction: format!("{:?}", instruction),
            });
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    fn extend(&mut self, words: &[Word]) {
        for word in words {
            self.push(*word);
        }
    }

    fn branch_to(&mut self, index: usize, target: u16) -> Result<()> {
        let target = usize::from(target);
        match self.targets.get(&target) {
            Some(recorded) if *recorded != self.stack => Err(CompileError::StackMismatch {
                index,
                expected: format!("{:?}", recorded),
                found: format!("{:?}", self.stack),
            }),
            Some(_) => Ok(()),
            None => {
                self.targets.insert(target, self.stack.clone());
                Ok(())
            }
        }
    }

    fn member_descriptor(&self, pool_index: u16, index: usize) -> Result<&str> {
        self.pool
            .member(pool_index)
            .map(|m| m.descriptor.as_str())
            .ok_or_else(|| {
                CompileError::internal(
                    "stack simulation",
                    format!("instruction {} references unknown member #{}", index, pool_index),
                )
            })
    }

    fn invoke(&mut self, pool_index: u16, has_receiver: bool, index: usize, instruction: &Instruction) -> Result<()> {
        let descriptor = parse_method_descriptor(self.member_descriptor(pool_index, index)?)?;
        for param in descriptor.params.iter().rev() {
            self.pop_type(param, index, instruction)?;
        }
        if has_receiver {
            self.pop_expect(Word::Reference, index, instruction)?;
        }
        self.push_type(&descriptor.ret);
        Ok(())
    }

    fn field_type(&self, pool_index: u16, index: usize) -> Result<TypeRef> {
        parse_field_descriptor(self.member_descriptor(pool_index, index)?)
    }

    fn binary(&mut self, operand: Word, result: Word, index: usize, instruction: &Instruction) -> Result<()> {
        self.pop_expect(operand, index, instruction)?;
        self.pop_expect(operand, index, instruction)?;
        self.push_word_value(result);
        Ok(())
    }

    fn unary(&mut self, from: Word, to: Word, index: usize, instruction: &Instruction) -> Result<()> {
        self.pop_expect(from, index, instruction)?;
        self.push_word_value(to);
        Ok(())
    }

    /// Pushes a value word, adding the Top half for wide kinds.
    fn push_word_value(&mut self, word: Word) {
        self.push(word);
        if matches!(word, Word::Long | Word::Double) {
            self.push(Word::Top);
        }
    }

    fn ret(&mut self, expected: Option<Word>, index: usize, instruction: &Instruction) -> Result<()> {
        if let Some(word) = expected {
            self.pop_expect(word, index, instruction)?;
        }
        self.reachable = false;
        Ok(())
    }

    fn step(&mut self, index: usize, instruction: &Instruction) -> Result<()> {
        use Instruction as JI;
        use Word::{Double, Float, Int, Long, Reference};

        match instruction {
            JI::Nop | JI::Iinc(..) | JI::Iinc_w(..) => {}

            JI::Aconst_null => self.push(Reference),
            JI::Iconst_m1
            | JI::Iconst_0
            | JI::Iconst_1
            | JI::Iconst_2
            | JI::Iconst_3
            | JI::Iconst_4
            | JI::Iconst_5
            | JI::Bipush(_)
            | JI::Sipush(_) => self.push(Int),
            JI::Fconst_0 | JI::Fconst_1 | JI::Fconst_2 => self.push(Float),
            JI::Lconst_0 | JI::Lconst_1 => self.push_word_value(Long),
            JI::Dconst_0 | JI::Dconst_1 => self.push_word_value(Double),
            JI::Ldc(idx) => self.ldc(u16::from(*idx), index)?,
            JI::Ldc_w(idx) => self.ldc(*idx, index)?,
            JI::Ldc2_w(idx) => match self.pool.entry(*idx) {
                Some(PoolEntry::Long(_)) => self.push_word_value(Long),
                Some(PoolEntry::Double(_)) => self.push_word_value(Double),
                other => {
                    return Err(CompileError::internal(
                        "stack simulation",
                        format!("LDC2_W of {:?} at instruction {}", other, index),
                    ));
                }
            },

            JI::Iload(_) | JI::Iload_w(_) | JI::Iload_0 | JI::Iload_1 | JI::Iload_2 | JI::Iload_3 => {
                self.push(Int)
            }
            JI::Fload(_) | JI::Fload_w(_) | JI::Fload_0 | JI::Fload_1 | JI::Fload_2 | JI::Fload_3 => {
                self.push(Float)
            }
            JI::Aload(_) | JI::Aload_w(_) | JI::Aload_0 | JI::Aload_1 | JI::Aload_2 | JI::Aload_3 => {
                self.push(Reference)
            }
            JI::Lload(_) | JI::Lload_w(_) | JI::Lload_0 | JI::Lload_1 | JI::Lload_2 | JI::Lload_3 => {
                self.push_word_value(Long)
            }
            JI::Dload(_) | JI::Dload_w(_) | JI::Dload_0 | JI::Dload_1 | JI::Dload_2 | JI::Dload_3 => {
                self.push_word_value(Double)
            }

            JI::Istore(_) | JI::Istore_w(_) | JI::Istore_0 | JI::Istore_1 | JI::Istore_2 | JI::Istore_3 => {
                self.pop_expect(Int, index, instruction)?
            }
            JI::Fstore(_) | JI::Fstore_w(_) | JI::Fstore_0 | JI::Fstore_1 | JI::Fstore_2 | JI::Fstore_3 => {
                self.pop_expect(Float, index, instruction)?
            }
            JI::Astore(_) | JI::Astore_w(_) | JI::Astore_0 | JI::Astore_1 | JI::Astore_2 | JI::Astore_3 => {
                self.pop_expect(Reference, index, instruction)?
            }
            JI::Lstore(_) | JI::Lstore_w(_) | JI::Lstore_0 | JI::Lstore_1 | JI::Lstore_2 | JI::Lstore_3 => {
                self.pop_expect(Long, index, instruction)?
            }
            JI::Dstore(_) | JI::Dstore_w(_) | JI::Dstore_0 | JI::Dstore_1 | JI::Dstore_2 | JI::Dstore_3 => {
                self.pop_expect(Double, index, instruction)?
            }

            JI::Iaload | JI::Baload | JI::Caload | JI::Saload => self.array_load(Int, index, instruction)?,
            JI::Faload => self.array_load(Float, index, instruction)?,
            JI::Aaload => self.array_load(Reference, index, instruction)?,
            JI::Laload => self.array_load(Long, index, instruction)?,
            JI::Daload => self.array_load(Double, index, instruction)?,
            JI::Iastore | JI::Bastore | JI::Castore | JI::Sastore => {
                self.array_store(Int, index, instruction)?
            }
            JI::Fastore => self.array_store(Float, index, instruction)?,
            JI::Aastore => self.array_store(Reference, index, instruction)?,
            JI::Lastore => self.array_store(Long, index, instruction)?,
            JI::Dastore => self.array_store(Double, index, instruction)?,

            JI::Pop => {
                self.pop_category1(index, instruction)?;
            }
            JI::Pop2 => {
                self.pop_words(2, index, instruction)?;
            }
            JI::Dup => {
                let v = self.pop_category1(index, instruction)?;
                self.extend(&[v, v]);
            }
            JI::Dup_x1 => {
                let v1 = self.pop_category1(index, instruction)?;
                let v2 = self.pop_category1(index, instruction)?;
                self.extend(&[v1, v2, v1]);
            }
            JI::Dup_x2 => {
                let v1 = self.pop_category1(index, instruction)?;
                let under = self.pop_words(2, index, instruction)?;
                self.push(v1);
                self.extend(&under);
                self.push(v1);
            }
            JI::Dup2 => {
                let top = self.pop_words(2, index, instruction)?;
                self.extend(&top);
                self.extend(&top);
            }
            JI::Dup2_x1 => {
                let top = self.pop_words(2, index, instruction)?;
                let under = self.pop_words(1, index, instruction)?;
                self.extend(&top);
                self.extend(&under);
                self.extend(&top);
            }
            JI::Dup2_x2 => {
                let top = self.pop_words(2, index, instruction)?;
                let under = self.pop_words(2, index, instruction)?;
                self.extend(&top);
                self.extend(&under);
                self.extend(&top);
            }
            JI::Swap => {
                let v1 = self.pop_category1(index, instruction)?;
                let v2 = self.pop_category1(index, instruction)?;
                self.extend(&[v1, v2]);
            }

            JI::Iadd | JI::Isub | JI::Imul | JI::Idiv | JI::Irem | JI::Ishl | JI::Ishr | JI::Iushr
            | JI::Iand | JI::Ior | JI::Ixor => self.binary(Int, Int, index, instruction)?,
            JI::Fadd | JI::Fsub | JI::Fmul | JI::Fdiv | JI::Frem => {
                self.binary(Float, Float, index, instruction)?
            }
            JI::Ladd | JI::Lsub | JI::Lmul | JI::Ldiv | JI::Lrem | JI::Land | JI::Lor | JI::Lxor => {
                self.binary(Long, Long, index, instruction)?
            }
            JI::Dadd | JI::Dsub | JI::Dmul | JI::Ddiv | JI::Drem => {
                self.binary(Double, Double, index, instruction)?
            }
            JI::Lshl | JI::Lshr | JI::Lushr => {
                self.pop_expect(Int, index, instruction)?;
                self.unary(Long, Long, index, instruction)?;
            }
            JI::Ineg | JI::I2b | JI::I2c | JI::I2s => self.unary(Int, Int, index, instruction)?,
            JI::Fneg => self.unary(Float, Float, index, instruction)?,
            JI::Lneg => self.unary(Long, Long, index, instruction)?,
            JI::Dneg => self.unary(Double, Double, index, instruction)?,
            JI::I2l => self.unary(Int, Long, index, instruction)?,
            JI::I2f => self.unary(Int, Float, index, instruction)?,
            JI::I2d => self.unary(Int, Double, index, instruction)?,
            JI::L2i => self.unary(Long, Int, index, instruction)?,
            JI::L2f => self.unary(Long, Float, index, instruction)?,
            JI::L2d => self.unary(Long, Double, index, instruction)?,
            JI::F2i => self.unary(Float, Int, index, instruction)?,
            JI::F2l => self.unary(Float, Long, index, instruction)?,
            JI::F2d => self.unary(Float, Double, index, instruction)?,
            JI::D2i => self.unary(Double, Int, index, instruction)?,
            JI::D2l => self.unary(Double, Long, index, instruction)?,
            JI::D2f => self.unary(Double, Float, index, instruction)?,
            JI::Lcmp => self.binary(Long, Int, index, instruction)?,
            JI::Fcmpl | JI::Fcmpg => self.binary(Float, Int, index, instruction)?,
            JI::Dcmpl | JI::Dcmpg => self.binary(Double, Int, index, instruction)?,

            JI::Ifeq(target)
            | JI::Ifne(target)
            | JI::Iflt(target)
            | JI::Ifge(target)
            | JI::Ifgt(target)
            | JI::Ifle(target) => {
                self.pop_expect(Int, index, instruction)?;
                self.branch_to(index, *target)?;
            }
            JI::If_icmpeq(target)
            | JI::If_icmpne(target)
            | JI::If_icmplt(target)
            | JI::If_icmpge(target)
            | JI::If_icmpgt(target)
            | JI::If_icmple(target) => {
                self.pop_expect(Int, index, instruction)?;
                self.pop_expect(Int, index, instruction)?;
                self.branch_to(index, *target)?;
            }
            JI::If_acmpeq(target) | JI::If_acmpne(target) => {
                self.pop_expect(Reference, index, instruction)?;
                self.pop_expect(Reference, index, instruction)?;
                self.branch_to(index, *target)?;
            }
            JI::Ifnull(target) | JI::Ifnonnull(target) => {
                self.pop_expect(Reference, index, instruction)?;
                self.branch_to(index, *target)?;
            }
            JI::Goto(target) => {
                self.branch_to(index, *target)?;
                self.reachable = false;
            }

            JI::Ireturn => self.ret(Some(Int), index, instruction)?,
            JI::Freturn => self.ret(Some(Float), index, instruction)?,
            JI::Areturn => self.ret(Some(Reference), index, instruction)?,
            JI::Lreturn => self.ret(Some(Long), index, instruction)?,
            JI::Dreturn => self.ret(Some(Double), index, instruction)?,
            JI::Return => self.ret(None, index, instruction)?,
            JI::Athrow => self.ret(Some(Reference), index, instruction)?,

            JI::Getstatic(idx) => {
                let ty = self.field_type(*idx, index)?;
                self.push_type(&ty);
            }
            JI::Putstatic(idx) => {
                let ty = self.field_type(*idx, index)?;
                self.pop_type(&ty, index, instruction)?;
            }
            JI::Getfield(idx) => {
                let ty = self.field_type(*idx, index)?;
                self.pop_expect(Reference, index, instruction)?;
                self.push_type(&ty);
            }
            JI::Putfield(idx) => {
                let ty = self.field_type(*idx, index)?;
                self.pop_type(&ty, index, instruction)?;
                self.pop_expect(Reference, index, instruction)?;
            }
            JI::Invokevirtual(idx) | JI::Invokespecial(idx) => {
                self.invoke(*idx, true, index, instruction)?
            }
            JI::Invokeinterface(idx, _) => self.invoke(*idx, true, index, instruction)?,
            JI::Invokestatic(idx) => self.invoke(*idx, false, index, instruction)?,

            JI::New(_) => self.push(Reference),
            JI::Newarray(_) | JI::Anewarray(_) => self.unary(Int, Reference, index, instruction)?,
            JI::Arraylength => self.unary(Reference, Int, index, instruction)?,
            JI::Checkcast(_) => self.unary(Reference, Reference, index, instruction)?,
            JI::Instanceof(_) => self.unary(Reference, Int, index, instruction)?,

            other => {
                return Err(CompileError::internal(
                    "stack simulation",
                    format!("unsupported instruction {:?} at {}", other, index),
                ));
            }
        }
        Ok(())
    }

    fn ldc(&mut self, pool_index: u16, index: usize) -> Result<()> {
        match self.pool.entry(pool_index) {
            Some(PoolEntry::Integer(_)) => self.push(Word::Int),
            Some(PoolEntry::Float(_)) => self.push(Word::Float),
            Some(PoolEntry::String(_)) | Some(PoolEntry::Class(_)) => self.push(Word::Reference),
            other => {
                return Err(CompileError::internal(
                    "stack simulation",
                    format!("LDC of {:?} at instruction {}", other, index),
                ));
            }
        }
        Ok(())
    }

    fn array_load(&mut self, element: Word, index: usize, instruction: &Instruction) -> Result<()> {
        self.pop_expect(Word::Int, index, instruction)?;
        self.pop_expect(Word::Reference, index, instruction)?;
        self.push_word_value(element);
        Ok(())
    }

    fn array_store(&mut self, element: Word, index: usize, instruction: &Instruction) -> Result<()> {
        self.pop_expect(element, index, instruction)?;
        self.pop_expect(Word::Int, index, instruction)?;
        self.pop_expect(Word::Reference, index, instruction)?;
        Ok(())
    }
}

fn mismatch(index: usize, expected: Word, found: Word) -> CompileError {
    CompileError::StackMismatch {
        index,
        expected: format!("{:?}", expected),
        found: format!("{:?}", found),
    }
}

/// `max_stack` of a complete method body.
pub fn max_stack(instructions: &[Instruction], pool: &PoolCache) -> Result<u16> {
    let mut sim = StackSimulator::new(pool);
    sim.run(instructions)?;
    u16::try_from(sim.max_depth())
        .map_err(|_| CompileError::internal("max_stack", "operand stack deeper than 65535 words"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::PrimitiveKind;
    use crate::bytecode::code::CodeBuilder;
    use crate::bytecode::helpers::{box_value, unbox_value};

    fn run_with(initial: &[TypeRef], f: impl FnOnce(&mut CodeBuilder, &mut PoolCache)) -> Vec<Word> {
        let mut code = CodeBuilder::new(0);
        let mut pool = PoolCache::new();
        f(&mut code, &mut pool);
        let (instructions, _) = code.finish().unwrap();
        let mut sim = StackSimulator::with_stack(&pool, initial);
        sim.run(&instructions).unwrap();
        sim.stack().to_vec()
    }

    #[test]
    fn boxing_replaces_the_primitive_with_one_reference() {
        for kind in PrimitiveKind::ALL {
            if kind == PrimitiveKind::Void {
                continue;
            }
            let prim = TypeRef::Primitive(kind);
            let after_box = run_with(&[TypeRef::object(), prim.clone()], |code, pool| {
                box_value(code, pool, &prim).unwrap();
            });
            assert_eq!(after_box, vec![Word::Reference, Word::Reference], "{:?}", kind);
        }
    }

    #[test]
    fn box_then_unbox_restores_the_original_shape() {
        for kind in [PrimitiveKind::Long, PrimitiveKind::Double, PrimitiveKind::Int, PrimitiveKind::Char] {
            let prim = TypeRef::Primitive(kind);
            let after = run_with(&[prim.clone()], |code, pool| {
                box_value(code, pool, &prim).unwrap();
                unbox_value(code, pool, &prim).unwrap();
            });
            assert_eq!(after, words_of(&prim), "{:?}", kind);
        }
    }

    #[test]
    fn wide_values_count_two_words() {
        let pool = PoolCache::new();
        let mut sim = StackSimulator::new(&pool);
        sim.run(&[Instruction::Lconst_1, Instruction::Dconst_0, Instruction::Pop2])
            .unwrap();
        assert_eq!(sim.max_depth(), 4);
        assert_eq!(sim.stack(), &[Word::Long, Word::Top]);
    }

    #[test]
    fn underflow_is_reported() {
        let pool = PoolCache::new();
        let mut sim = StackSimulator::new(&pool);
        let err = sim.run(&[Instruction::Iconst_1, Instruction::Iadd]).unwrap_err();
        assert!(matches!(err, CompileError::StackUnderflow { index: 1, .. }));
    }

    #[test]
    fn popping_half_a_long_is_rejected() {
        let pool = PoolCache::new();
        let mut sim = StackSimulator::new(&pool);
        assert!(sim.run(&[Instruction::Lconst_0, Instruction::Pop]).is_err());
    }

    #[test]
    fn branch_targets_must_agree_on_the_stack() {
        let pool = PoolCache::new();
        // if (x) push 1 else push nothing; join
        let bad = [
            Instruction::Iconst_0,
            Instruction::Ifeq(3),
            Instruction::Iconst_1,
            Instruction::Return,
        ];
        let mut sim = StackSimulator::new(&pool);
        assert!(matches!(
            sim.run(&bad),
            Err(CompileError::StackMismatch { index: 3, .. })
        ));

        let good = [
            Instruction::Iconst_0,
            Instruction::Ifeq(4),
            Instruction::Iconst_1,
            Instruction::Goto(5),
            Instruction::Iconst_0,
            Instruction::Ireturn,
        ];
        let mut sim = StackSimulator::new(&pool);
        sim.run(&good).unwrap();
        assert_eq!(sim.max_depth(), 1);
    }
}
