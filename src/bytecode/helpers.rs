use super::code::CodeBuilder;
use super::descriptor::{OpcodeFamily, internal_name, opcode_family, type_descriptor};
use super::pool::PoolCache;
use crate::ast::Variable;
use crate::ast::types::{NUMBER_CLASS, OBJECT_CLASS, PrimitiveKind, TypeRef, slot_size};
use crate::error::{CompileError, Result};

use ristretto_classfile::attributes::Instruction;

pub const REFERENCE_CLASS: &str = "groovy/lang/Reference";
const BOOLEAN_CLASS: &str = "java/lang/Boolean";
const CHARACTER_CLASS: &str = "java/lang/Character";

/// Gets the appropriate type-specific load instruction.
pub fn load_instruction(ty: &TypeRef, index: u16) -> Result<Instruction> {
    Ok(match opcode_family(ty) {
        OpcodeFamily::Int => match index {
            0 => Instruction::Iload_0,
            1 => Instruction::Iload_1,
            2 => Instruction::Iload_2,
            3 => Instruction::Iload_3,
            _ if index <= u8::MAX as u16 => Instruction::Iload(index as u8),
            _ => Instruction::Iload_w(index),
        },
        OpcodeFamily::Long => match index {
            0 => Instruction::Lload_0,
            1 => Instruction::Lload_1,
            2 => Instruction::Lload_2,
            3 => Instruction::Lload_3,
            _ if index <= u8::MAX as u16 => Instruction::Lload(index as u8),
            _ => Instruction::Lload_w(index),
        },
        OpcodeFamily::Float => match index {
            0 => Instruction::Fload_0,
            1 => Instruction::Fload_1,
            2 => Instruction::Fload_2,
            3 => Instruction::Fload_3,
            _ if index <= u8::MAX as u16 => Instruction::Fload(index as u8),
            _ => Instruction::Fload_w(index),
        },
        OpcodeFamily::Double => match index {
            0 => Instruction::Dload_0,
            1 => Instruction::Dload_1,
            2 => Instruction::Dload_2,
            3 => Instruction::Dload_3,
            _ if index <= u8::MAX as u16 => Instruction::Dload(index as u8),
            _ => Instruction::Dload_w(index),
        },
        OpcodeFamily::Reference => match index {
            0 => Instruction::Aload_0,
            1 => Instruction::Aload_1,
            2 => Instruction::Aload_2,
            3 => Instruction::Aload_3,
            _ if index <= u8::MAX as u16 => Instruction::Aload(index as u8),
            _ => Instruction::Aload_w(index),
        },
        OpcodeFamily::Void => {
            return Err(CompileError::internal("load_instruction", "Cannot load void type"));
        }
    })
}

/// Gets the appropriate type-specific store instruction.
pub fn store_instruction(ty: &TypeRef, index: u16) -> Result<Instruction> {
    Ok(match opcode_family(ty) {
        OpcodeFamily::Int => match index {
            0 => Instruction::Istore_0,
            1 => Instruction::Istore_1,
            2 => Instruction::Istore_2,
            3 => Instruction::Istore_3,
            _ if index <= u8::MAX as u16 => Instruction::Istore(index as u8),
            _ => Instruction::Istore_w(index),
        },
        OpcodeFamily::Long => match index {
            0 => Instruction::Lstore_0,
            1 => Instruction::Lstore_1,
            2 => Instruction::Lstore_2,
            3 => Instruction::Lstore_3,
            _ if index <= u8::MAX as u16 => Instruction::Lstore(index as u8),
            _ => Instruction::Lstore_w(index),
        },
        OpcodeFamily::Float => match index {
            0 => Instruction::Fstore_0,
            1 => Instruction::Fstore_1,
            2 => Instruction::Fstore_2,
            3 => Instruction::Fstore_3,
            _ if index <= u8::MAX as u16 => Instruction::Fstore(index as u8),
            _ => Instruction::Fstore_w(index),
        },
        OpcodeFamily::Double => match index {
            0 => Instruction::Dstore_0,
            1 => Instruction::Dstore_1,
            2 => Instruction::Dstore_2,
            3 => Instruction::Dstore_3,
            _ if index <= u8::MAX as u16 => Instruction::Dstore(index as u8),
            _ => Instruction::Dstore_w(index),
        },
        OpcodeFamily::Reference => match index {
            0 => Instruction::Astore_0,
            1 => Instruction::Astore_1,
            2 => Instruction::Astore_2,
            3 => Instruction::Astore_3,
            _ if index <= u8::MAX as u16 => Instruction::Astore(index as u8),
            _ => Instruction::Astore_w(index),
        },
        OpcodeFamily::Void => {
            return Err(CompileError::internal("store_instruction", "Cannot store void type"));
        }
    })
}

pub fn return_instruction(ty: &TypeRef) -> Instruction {
    match opcode_family(ty) {
        OpcodeFamily::Int => Instruction::Ireturn,
        OpcodeFamily::Long => Instruction::Lreturn,
        OpcodeFamily::Float => Instruction::Freturn,
        OpcodeFamily::Double => Instruction::Dreturn,
        OpcodeFamily::Reference => Instruction::Areturn,
        OpcodeFamily::Void => Instruction::Return,
    }
}

/// Pops a value of `ty` off the stack.
pub fn pop_instruction(ty: &TypeRef) -> Option<Instruction> {
    match slot_size(ty) {
        0 => None,
        2 => Some(Instruction::Pop2),
        _ => Some(Instruction::Pop),
    }
}

/// Duplicates a value of `ty` on top of the stack.
pub fn dup_instruction(ty: &TypeRef) -> Option<Instruction> {
    match slot_size(ty) {
        0 => None,
        2 => Some(Instruction::Dup2),
        _ => Some(Instruction::Dup),
    }
}

/// Loads a variable, going through `Reference.get()` for holders.
pub fn load_var(code: &mut CodeBuilder, pool: &mut PoolCache, var: &Variable) -> Result<()> {
    if var.holder {
        code.touch_local(var.index, 1);
        code.emit(load_instruction(&TypeRef::object(), var.index)?);
        let get = pool.method_ref(REFERENCE_CLASS, "get", "()Ljava/lang/Object;")?;
        code.emit(Instruction::Invokevirtual(get));
    } else {
        code.touch_local(var.index, slot_size(&var.ty));
        code.emit(load_instruction(&var.ty, var.index)?);
    }
    Ok(())
}

/// Stores the value on top of the stack into a variable. A holder expects the
/// value already boxed and writes it through `Reference.set(Object)`.
pub fn store_var(code: &mut CodeBuilder, pool: &mut PoolCache, var: &Variable) -> Result<()> {
    if var.holder {
        code.touch_local(var.index, 1);
        code.emit(load_instruction(&TypeRef::object(), var.index)?);
        code.emit(Instruction::Swap);
        let set = pool.method_ref(REFERENCE_CLASS, "set", "(Ljava/lang/Object;)V")?;
        code.emit(Instruction::Invokevirtual(set));
    } else {
        code.touch_local(var.index, slot_size(&var.ty));
        code.emit(store_instruction(&var.ty, var.index)?);
    }
    Ok(())
}

/// Replaces the primitive on top of the stack by its wrapper. Returns false
/// when `ty` is not a boxable primitive and nothing was emitted.
///
/// The value is already on the stack when the wrapper is allocated, so the
/// two wrapper references are moved beneath it before the constructor runs:
/// `NEW W; DUP; DUP2_X1|DUP2_X2; POP2; INVOKESPECIAL W.<init>`.
pub fn box_value(code: &mut CodeBuilder, pool: &mut PoolCache, ty: &TypeRef) -> Result<bool> {
    let Some(kind) = ty.primitive_kind() else {
        return Ok(false);
    };
    match kind {
        PrimitiveKind::Void => Ok(false),
        PrimitiveKind::Boolean => {
            box_boolean(code, pool)?;
            Ok(true)
        }
        _ => {
            let wrapper = internal_name(&TypeRef::wrapper(kind))?;
            let class_index = pool.class(&wrapper)?;
            let ctor = pool.method_ref(&wrapper, "<init>", &format!("({})V", kind.descriptor()))?;
            code.emit(Instruction::New(class_index));
            code.emit(Instruction::Dup);
            if kind.slot_size() == 2 {
                code.emit(Instruction::Dup2_x2);
            } else {
                code.emit(Instruction::Dup2_x1);
            }
            code.emit(Instruction::Pop2);
            code.emit(Instruction::Invokespecial(ctor));
            Ok(true)
        }
    }
}

/// Boxes the `boolean` on top of the stack to the canonical `Boolean.TRUE`/`FALSE`.
pub fn box_boolean(code: &mut CodeBuilder, pool: &mut PoolCache) -> Result<()> {
    let false_label = code.new_label();
    let end = code.new_label();
    code.branch(Instruction::Ifeq, false_label);
    let true_field = pool.field_ref(BOOLEAN_CLASS, "TRUE", "Ljava/lang/Boolean;")?;
    code.emit(Instruction::Getstatic(true_field));
    code.branch(Instruction::Goto, end);
    code.place(false_label)?;
    let false_field = pool.field_ref(BOOLEAN_CLASS, "FALSE", "Ljava/lang/Boolean;")?;
    code.emit(Instruction::Getstatic(false_field));
    code.place(end)?;
    Ok(())
}

/// Replaces the reference on top of the stack by the primitive `ty`.
/// No-op for reference types and `void`.
pub fn unbox_value(code: &mut CodeBuilder, pool: &mut PoolCache, ty: &TypeRef) -> Result<()> {
    let Some(kind) = ty.primitive_kind() else {
        return Ok(());
    };
    let (owner, method) = match kind {
        PrimitiveKind::Void => return Ok(()),
        PrimitiveKind::Boolean => (BOOLEAN_CLASS.to_string(), "booleanValue"),
        PrimitiveKind::Char => (CHARACTER_CLASS.to_string(), "charValue"),
        PrimitiveKind::Byte => (number_class(), "byteValue"),
        PrimitiveKind::Short => (number_class(), "shortValue"),
        PrimitiveKind::Int => (number_class(), "intValue"),
        PrimitiveKind::Long => (number_class(), "longValue"),
        PrimitiveKind::Float => (number_class(), "floatValue"),
        PrimitiveKind::Double => (number_class(), "doubleValue"),
    };
    let class_index = pool.class(&owner)?;
    let value_method = pool.method_ref(&owner, method, &format!("(){}", kind.descriptor()))?;
    code.emit(Instruction::Checkcast(class_index));
    code.emit(Instruction::Invokevirtual(value_method));
    Ok(())
}

fn number_class() -> String {
    NUMBER_CLASS.replace('.', "/")
}

/// Converts the value on top of the stack from `from` to `to`.
pub fn convert(
    code: &mut CodeBuilder,
    pool: &mut PoolCache,
    from: &TypeRef,
    to: &TypeRef,
) -> Result<()> {
    // 0. Identity
    if from.erasure() == to.erasure() {
        return Ok(());
    }

    // 1. Anything -> void: discard
    if to.is_void() {
        if let Some(pop) = pop_instruction(from) {
            code.emit(pop);
        }
        return Ok(());
    }

    // 2. void -> value: only references can stand in (as null)
    if from.is_void() {
        if to.is_primitive() {
            return Err(CompileError::internal(
                "convert",
                format!("void expression used as {}", to),
            ));
        }
        code.emit(Instruction::Aconst_null);
        return Ok(());
    }

    match (from.primitive_kind(), to.primitive_kind()) {
        // 3. Primitive <-> Primitive
        (Some(src), Some(dest)) => {
            code.emit_all(primitive_to_primitive(src, dest)?);
            Ok(())
        }
        // 4. Primitive -> Reference
        (Some(src), None) => {
            if let Some(dest_kind) = to.unwrapped_kind() {
                if dest_kind != PrimitiveKind::Void {
                    code.emit_all(primitive_to_primitive(src, dest_kind)?);
                    box_value(code, pool, &TypeRef::Primitive(dest_kind))?;
                    return Ok(());
                }
            }
            box_value(code, pool, from)?;
            if !is_wrapper_supertype(to) {
                checkcast(code, pool, to)?;
            }
            Ok(())
        }
        // 5. Reference -> Primitive
        (None, Some(_)) => unbox_value(code, pool, to),
        // 6. Reference -> Reference
        (None, None) => {
            if to.is_object() {
                return Ok(());
            }
            checkcast(code, pool, to)
        }
    }
}

fn is_wrapper_supertype(ty: &TypeRef) -> bool {
    matches!(
        ty.class_name(),
        Some(OBJECT_CLASS)
            | Some(NUMBER_CLASS)
            | Some("java.io.Serializable")
            | Some("java.lang.Comparable")
    )
}

pub fn checkcast(code: &mut CodeBuilder, pool: &mut PoolCache, ty: &TypeRef) -> Result<()> {
    let class_index = pool.class(&internal_name(ty)?)?;
    code.emit(Instruction::Checkcast(class_index));
    Ok(())
}

/// Helper for primitive→primitive casts via a small JVM-opcode graph + narrowing.
pub fn primitive_to_primitive(src: PrimitiveKind, dest: PrimitiveKind) -> Result<Vec<Instruction>> {
    use Instruction as JI;
    use std::collections::{HashMap, HashSet, VecDeque};

    if src == PrimitiveKind::Void || dest == PrimitiveKind::Void {
        return Err(CompileError::internal(
            "primitive_to_primitive",
            format!("No path {}→{}", src.name(), dest.name()),
        ));
    }

    // Normalize smaller ints → int
    fn normalize(kind: PrimitiveKind) -> PrimitiveKind {
        if kind.is_int_width() {
            PrimitiveKind::Int
        } else {
            kind
        }
    }
    // Final narrowing instr for byte/char/short
    fn narrow(dest: PrimitiveKind) -> Option<Instruction> {
        Some(match dest {
            PrimitiveKind::Byte => JI::I2b,
            PrimitiveKind::Char => JI::I2c,
            PrimitiveKind::Short => JI::I2s,
            _ => return None,
        })
    }

    let ns = normalize(src);
    let nd = normalize(dest);

    if ns == nd {
        // int-width to int-width: only a narrowing to a smaller kind changes bits
        if src == dest || dest == PrimitiveKind::Int || dest == PrimitiveKind::Boolean {
            return Ok(vec![]);
        }
        return Ok(narrow(dest).into_iter().collect());
    }

    let graph: HashMap<PrimitiveKind, Vec<(PrimitiveKind, Instruction)>> = [
        (
            PrimitiveKind::Int,
            vec![
                (PrimitiveKind::Long, JI::I2l),
                (PrimitiveKind::Double, JI::I2d),
                (PrimitiveKind::Float, JI::I2f),
            ],
        ),
        (
            PrimitiveKind::Long,
            vec![
                (PrimitiveKind::Int, JI::L2i),
                (PrimitiveKind::Double, JI::L2d),
                (PrimitiveKind::Float, JI::L2f),
            ],
        ),
        (
            PrimitiveKind::Double,
            vec![
                (PrimitiveKind::Int, JI::D2i),
                (PrimitiveKind::Long, JI::D2l),
                (PrimitiveKind::Float, JI::D2f),
            ],
        ),
        (
            PrimitiveKind::Float,
            vec![
                (PrimitiveKind::Int, JI::F2i),
                (PrimitiveKind::Long, JI::F2l),
                (PrimitiveKind::Double, JI::F2d),
            ],
        ),
    ]
    .into_iter()
    .collect();

    // BFS
    let mut queue = VecDeque::new();
    let mut seen = HashSet::new();
    queue.push_back((ns, Vec::<Instruction>::new()));
    seen.insert(ns);

    while let Some((kind, path)) = queue.pop_front() {
        if kind == nd {
            let mut path = path;
            if let Some(n) = narrow(dest) {
                path.push(n);
            }
            return Ok(path);
        }
        if let Some(neighbours) = graph.get(&kind) {
            for (next, op) in neighbours {
                if seen.insert(*next) {
                    let mut extended = path.clone();
                    extended.push(op.clone());
                    queue.push_back((*next, extended));
                }
            }
        }
    }

    Err(CompileError::internal(
        "primitive_to_primitive",
        format!("No path {}→{}", src.name(), dest.name()),
    ))
}

/// Pushes the `Class` object for `ty`; primitives load `Wrapper.TYPE`.
pub fn load_class_literal(code: &mut CodeBuilder, pool: &mut PoolCache, ty: &TypeRef) -> Result<()> {
    match ty.primitive_kind() {
        Some(kind) => {
            let wrapper = internal_name(&TypeRef::wrapper(kind))?;
            let field = pool.field_ref(&wrapper, "TYPE", "Ljava/lang/Class;")?;
            code.emit(Instruction::Getstatic(field));
        }
        None => {
            let class_index = pool.class(&internal_name(ty)?)?;
            code.emit(super::consts::ldc(class_index));
        }
    }
    Ok(())
}

/// Swaps a value of `ty` (on top) with the single-word reference below it.
pub fn swap_with_object(code: &mut CodeBuilder, ty: &TypeRef) {
    if slot_size(ty) == 2 {
        code.emit(Instruction::Dup2_x1);
        code.emit(Instruction::Pop2);
    } else {
        code.emit(Instruction::Swap);
    }
}

/// Swaps a single-word reference (on top) with the value of `ty` below it.
pub fn swap_object_with(code: &mut CodeBuilder, ty: &TypeRef) {
    if slot_size(ty) == 2 {
        code.emit(Instruction::Dup_x2);
        code.emit(Instruction::Pop);
    } else {
        code.emit(Instruction::Swap);
    }
}

/// Flips the 0/1 `boolean` on top of the stack.
pub fn negate_boolean(code: &mut CodeBuilder) {
    code.emit(Instruction::Iconst_1);
    code.emit(Instruction::Ixor);
}

/// Per-element-kind array access: (load, store, boxed class) in one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayElementOps {
    pub load: Instruction,
    pub store: Instruction,
    /// Wrapper class elements are boxed to when read dynamically.
    pub boxed: &'static str,
}

pub fn array_element_ops(component: &TypeRef) -> ArrayElementOps {
    let (load, store) = match component.primitive_kind() {
        Some(PrimitiveKind::Boolean) | Some(PrimitiveKind::Byte) => {
            (Instruction::Baload, Instruction::Bastore)
        }
        Some(PrimitiveKind::Char) => (Instruction::Caload, Instruction::Castore),
        Some(PrimitiveKind::Short) => (Instruction::Saload, Instruction::Sastore),
        Some(PrimitiveKind::Int) => (Instruction::Iaload, Instruction::Iastore),
        Some(PrimitiveKind::Long) => (Instruction::Laload, Instruction::Lastore),
        Some(PrimitiveKind::Float) => (Instruction::Faload, Instruction::Fastore),
        Some(PrimitiveKind::Double) => (Instruction::Daload, Instruction::Dastore),
        Some(PrimitiveKind::Void) | None => (Instruction::Aaload, Instruction::Aastore),
    };
    let boxed = component
        .primitive_kind()
        .map_or(OBJECT_CLASS, PrimitiveKind::wrapper_class);
    ArrayElementOps { load, store, boxed }
}

/// Descriptor of a value, for error messages and member references.
pub fn describe(ty: &TypeRef) -> String {
    type_descriptor(ty).unwrap_or_else(|_| ty.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted(f: impl FnOnce(&mut CodeBuilder, &mut PoolCache)) -> (Vec<Instruction>, PoolCache) {
        let mut code = CodeBuilder::new(0);
        let mut pool = PoolCache::new();
        f(&mut code, &mut pool);
        let (instructions, _) = code.finish().unwrap();
        (instructions, pool)
    }

    #[test]
    fn load_store_choose_width_and_index_form() {
        assert_eq!(load_instruction(&TypeRef::int(), 2).unwrap(), Instruction::Iload_2);
        assert_eq!(
            load_instruction(&TypeRef::boolean(), 9).unwrap(),
            Instruction::Iload(9)
        );
        assert_eq!(
            store_instruction(&TypeRef::long(), 300).unwrap(),
            Instruction::Lstore_w(300)
        );
        assert_eq!(
            load_instruction(&TypeRef::string(), 0).unwrap(),
            Instruction::Aload_0
        );
        assert!(load_instruction(&TypeRef::void(), 0).is_err());
    }

    #[test]
    fn return_uses_the_type_family() {
        assert_eq!(return_instruction(&TypeRef::void()), Instruction::Return);
        assert_eq!(
            return_instruction(&TypeRef::Primitive(PrimitiveKind::Char)),
            Instruction::Ireturn
        );
        assert_eq!(
            return_instruction(&TypeRef::Primitive(PrimitiveKind::Double)),
            Instruction::Dreturn
        );
        assert_eq!(return_instruction(&TypeRef::object()), Instruction::Areturn);
    }

    #[test]
    fn long_boxing_uses_dup2_x2() {
        let (code, pool) = emitted(|c, p| {
            assert!(box_value(c, p, &TypeRef::long()).unwrap());
        });
        assert_eq!(code.len(), 5);
        assert_eq!(code[1], Instruction::Dup);
        assert_eq!(code[2], Instruction::Dup2_x2);
        assert_eq!(code[3], Instruction::Pop2);
        let Instruction::Invokespecial(ctor) = code[4] else {
            panic!("expected constructor call, got {:?}", code[4]);
        };
        assert_eq!(pool.member(ctor).unwrap().descriptor, "(J)V");
    }

    #[test]
    fn int_boxing_uses_dup2_x1() {
        let (code, _) = emitted(|c, p| {
            box_value(c, p, &TypeRef::int()).unwrap();
        });
        assert_eq!(code[2], Instruction::Dup2_x1);
    }

    #[test]
    fn boolean_boxing_loads_canonical_instances() {
        let (code, pool) = emitted(|c, p| {
            box_value(c, p, &TypeRef::boolean()).unwrap();
        });
        assert_eq!(code[0], Instruction::Ifeq(3));
        assert_eq!(code[2], Instruction::Goto(4));
        let names: Vec<String> = code
            .iter()
            .filter_map(|i| match i {
                Instruction::Getstatic(idx) => pool.member(*idx).map(|m| m.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, ["TRUE", "FALSE"]);
    }

    #[test]
    fn references_and_void_are_not_boxed() {
        let (code, _) = emitted(|c, p| {
            assert!(!box_value(c, p, &TypeRef::string()).unwrap());
            assert!(!box_value(c, p, &TypeRef::void()).unwrap());
            unbox_value(c, p, &TypeRef::object()).unwrap();
        });
        assert!(code.is_empty());
    }

    #[test]
    fn char_unboxes_through_character() {
        let (code, pool) = emitted(|c, p| {
            unbox_value(c, p, &TypeRef::Primitive(PrimitiveKind::Char)).unwrap();
        });
        let Instruction::Invokevirtual(m) = code[1] else {
            panic!("expected invokevirtual");
        };
        let member = pool.member(m).unwrap();
        assert_eq!(member.owner, "java/lang/Character");
        assert_eq!(member.name, "charValue");
    }

    #[test]
    fn primitive_conversions_follow_the_graph() {
        use PrimitiveKind::*;
        assert_eq!(primitive_to_primitive(Int, Long).unwrap(), vec![Instruction::I2l]);
        assert_eq!(
            primitive_to_primitive(Double, Byte).unwrap(),
            vec![Instruction::D2i, Instruction::I2b]
        );
        assert!(primitive_to_primitive(Char, Int).unwrap().is_empty());
        assert_eq!(primitive_to_primitive(Int, Short).unwrap(), vec![Instruction::I2s]);
        assert!(primitive_to_primitive(Int, Void).is_err());
    }

    #[test]
    fn int_to_long_wrapper_widens_before_boxing() {
        let (code, pool) = emitted(|c, p| {
            convert(c, p, &TypeRef::int(), &TypeRef::class("java.lang.Long")).unwrap();
        });
        assert_eq!(code[0], Instruction::I2l);
        assert_eq!(code[3], Instruction::Dup2_x2);
        let Instruction::New(class) = code[1] else {
            panic!("expected NEW");
        };
        assert_eq!(
            pool.entry(class),
            Some(&super::super::pool::PoolEntry::Class("java/lang/Long".into()))
        );
    }

    #[test]
    fn swaps_exchange_a_reference_with_a_wide_value() {
        use super::super::stack::{StackSimulator, words_of};
        for ty in [TypeRef::long(), TypeRef::int()] {
            let (below, _) = emitted(|c, _| swap_with_object(c, &ty));
            let (above, pool) = emitted(|c, _| swap_object_with(c, &ty));

            let mut sim = StackSimulator::with_stack(&pool, &[TypeRef::object(), ty.clone()]);
            sim.run(&below).unwrap();
            let mut expected = words_of(&ty);
            expected.extend(words_of(&TypeRef::object()));
            assert_eq!(sim.stack(), expected.as_slice());

            sim.run(&above).unwrap();
            let mut restored = words_of(&TypeRef::object());
            restored.extend(words_of(&ty));
            assert_eq!(sim.stack(), restored.as_slice());
        }
    }

    #[test]
    fn array_table_covers_every_kind() {
        assert_eq!(
            array_element_ops(&TypeRef::boolean()).load,
            Instruction::Baload
        );
        assert_eq!(
            array_element_ops(&TypeRef::Primitive(PrimitiveKind::Char)).store,
            Instruction::Castore
        );
        let strings = array_element_ops(&TypeRef::string());
        assert_eq!(strings.load, Instruction::Aaload);
        assert_eq!(strings.boxed, OBJECT_CLASS);
        assert_eq!(array_element_ops(&TypeRef::int()).boxed, "java.lang.Integer");
    }
}
