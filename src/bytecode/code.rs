//! Instruction buffer for a single method body.
//!
//! Branch operands are instruction indices. Branches to labels that are not
//! placed yet are emitted with a placeholder and patched in [`CodeBuilder::finish`].

use crate::error::{CompileError, Result};
use ristretto_classfile::attributes::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Default)]
pub struct CodeBuilder {
    instructions: Vec<Instruction>,
    labels: Vec<Option<u16>>,
    // (instruction index to patch, target label)
    branch_fixups: Vec<(usize, Label)>,
    next_local: u16,
    max_locals: u16,
}

impl CodeBuilder {
    /// `first_free_local` is the first slot not taken by parameters or
    /// analysed locals; temporaries are allocated from there.
    pub fn new(first_free_local: u16) -> Self {
        CodeBuilder {
            next_local: first_free_local,
            max_locals: first_free_local,
            ..CodeBuilder::default()
        }
    }

    pub fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn emit_all(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        self.instructions.extend(instructions);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the next instruction emitted.
    pub fn place(&mut self, label: Label) -> Result<()> {
        let index = u16::try_from(self.instructions.len())
            .map_err(|_| CompileError::internal("place label", "method body too large"))?;
        match self.labels.get_mut(label.0) {
            Some(slot @ None) => {
                *slot = Some(index);
                Ok(())
            }
            Some(Some(_)) => Err(CompileError::internal(
                "place label",
                format!("label {} placed twice", label.0),
            )),
            None => Err(CompileError::internal(
                "place label",
                format!("unknown label {}", label.0),
            )),
        }
    }

    /// Emits `branch(0)` and records it for patching, e.g. `code.branch(Instruction::Ifeq, l)`.
    pub fn branch(&mut self, branch: fn(u16) -> Instruction, target: Label) {
        self.branch_fixups.push((self.instructions.len(), target));
        self.instructions.push(branch(0));
    }

    /// Reserves `size` slots for a temporary and returns the first one.
    pub fn allocate_local(&mut self, size: u16) -> u16 {
        let index = self.next_local;
        self.next_local += size;
        self.max_locals = self.max_locals.max(self.next_local);
        index
    }

    /// Returns a temporary to the pool when it is the most recently allocated.
    pub fn release_local(&mut self, index: u16, size: u16) {
        if index + size == self.next_local {
            self.next_local = index;
        }
    }

    /// Notes that `index..index + size` is used by an analysed variable.
    pub fn touch_local(&mut self, index: u16, size: u16) {
        self.max_locals = self.max_locals.max(index + size);
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// Patches branch targets and returns the code with its `max_locals`.
    pub fn finish(mut self) -> Result<(Vec<Instruction>, u16)> {
        for (instr_index, label) in std::mem::take(&mut self.branch_fixups) {
            let target = self
                .labels
                .get(label.0)
                .copied()
                .flatten()
                .ok_or_else(|| {
                    CompileError::internal("branch fixup", format!("label {} never placed", label.0))
                })?;
            match &mut self.instructions[instr_index] {
                Instruction::Goto(offset)
                | Instruction::Ifnull(offset)
                | Instruction::Ifnonnull(offset)
                | Instruction::Ifeq(offset)
                | Instruction::Ifne(offset)
                | Instruction::Iflt(offset)
                | Instruction::Ifge(offset)
                | Instruction::Ifgt(offset)
                | Instruction::Ifle(offset)
                | Instruction::If_icmpeq(offset)
                | Instruction::If_icmpne(offset)
                | Instruction::If_icmplt(offset)
                | Instruction::If_icmpge(offset)
                | Instruction::If_icmpgt(offset)
                | Instruction::If_icmple(offset)
                | Instruction::If_acmpeq(offset)
                | Instruction::If_acmpne(offset) => {
                    *offset = target;
                }
                other => {
                    return Err(CompileError::internal(
                        "branch fixup",
                        format!(
                            "expected a branch instruction at index {}, found {:?}",
                            instr_index, other
                        ),
                    ));
                }
            }
        }
        Ok((self.instructions, self.max_locals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_branches_are_patched_to_instruction_indices() {
        let mut code = CodeBuilder::new(1);
        let else_label = code.new_label();
        let end = code.new_label();
        code.emit(Instruction::Iload_0);
        code.branch(Instruction::Ifeq, else_label);
        code.emit(Instruction::Iconst_1);
        code.branch(Instruction::Goto, end);
        code.place(else_label).unwrap();
        code.emit(Instruction::Iconst_0);
        code.place(end).unwrap();
        code.emit(Instruction::Ireturn);
        let (instructions, _) = code.finish().unwrap();
        assert_eq!(instructions[1], Instruction::Ifeq(4));
        assert_eq!(instructions[3], Instruction::Goto(5));
    }

    #[test]
    fn unplaced_label_is_an_error() {
        let mut code = CodeBuilder::new(0);
        let label = code.new_label();
        code.branch(Instruction::Goto, label);
        assert!(code.finish().is_err());
    }

    #[test]
    fn temporaries_are_reused_after_release() {
        let mut code = CodeBuilder::new(3);
        let tmp = code.allocate_local(2);
        assert_eq!(tmp, 3);
        code.release_local(tmp, 2);
        assert_eq!(code.allocate_local(1), 3);
        assert_eq!(code.max_locals(), 5);
    }
}
