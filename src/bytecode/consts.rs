use super::code::CodeBuilder;
use super::descriptor::class_internal_name;
use super::pool::PoolCache;
use crate::ast::Literal;
use crate::ast::types::{PrimitiveKind, TypeRef};
use crate::error::{CompileError, Result};

use num_traits::ToPrimitive;
use ristretto_classfile::attributes::Instruction;

/// `LDC` or `LDC_W` depending on the index width.
pub fn ldc(index: u16) -> Instruction {
    if let Ok(idx8) = u8::try_from(index) {
        Instruction::Ldc(idx8)
    } else {
        Instruction::Ldc_w(index)
    }
}

// Helper to get the appropriate integer constant loading instruction
pub fn int_const_instr(pool: &mut PoolCache, val: i32) -> Result<Instruction> {
    Ok(match val {
        -1 => Instruction::Iconst_m1,
        0 => Instruction::Iconst_0,
        1 => Instruction::Iconst_1,
        2 => Instruction::Iconst_2,
        3 => Instruction::Iconst_3,
        4 => Instruction::Iconst_4,
        5 => Instruction::Iconst_5,
        v @ -128..=-2 | v @ 6..=127 => Instruction::Bipush(v as i8),
        v @ -32768..=-129 | v @ 128..=32767 => Instruction::Sipush(v as i16),
        v => ldc(pool.integer(v)?),
    })
}

pub fn long_const_instr(pool: &mut PoolCache, val: i64) -> Result<Instruction> {
    Ok(match val {
        0 => Instruction::Lconst_0,
        1 => Instruction::Lconst_1,
        _ => Instruction::Ldc2_w(pool.long(val)?),
    })
}

pub fn float_const_instr(pool: &mut PoolCache, val: f32) -> Result<Instruction> {
    Ok(if val.to_bits() == 0.0f32.to_bits() {
        Instruction::Fconst_0
    } else if val == 1.0 {
        Instruction::Fconst_1
    } else if val == 2.0 {
        Instruction::Fconst_2
    } else {
        ldc(pool.float(val)?)
    })
}

pub fn double_const_instr(pool: &mut PoolCache, val: f64) -> Result<Instruction> {
    // bit comparison keeps -0.0 out of DCONST_0
    Ok(if val.to_bits() == 0.0f64.to_bits() {
        Instruction::Dconst_0
    } else if val == 1.0 {
        Instruction::Dconst_1
    } else {
        Instruction::Ldc2_w(pool.double(val)?)
    })
}

fn unsupported(literal: &Literal) -> CompileError {
    CompileError::UnsupportedLiteral {
        value: literal.to_string(),
        class_name: literal.class_name().to_string(),
    }
}

/// Pushes the boxed form of `literal` and returns the type left on the stack
/// (`void` when nothing was pushed).
pub fn load_literal(code: &mut CodeBuilder, pool: &mut PoolCache, literal: &Literal) -> Result<TypeRef> {
    match literal {
        Literal::Null => {
            code.emit(Instruction::Aconst_null);
            Ok(TypeRef::object())
        }
        Literal::String(s) => {
            code.emit(ldc(pool.string(s)?));
            Ok(TypeRef::string())
        }
        Literal::Boolean(value) => {
            let name = if *value { "TRUE" } else { "FALSE" };
            let field = pool.field_ref("java/lang/Boolean", name, "Ljava/lang/Boolean;")?;
            code.emit(Instruction::Getstatic(field));
            Ok(TypeRef::wrapper(PrimitiveKind::Boolean))
        }
        Literal::BigInteger(value) => construct_from_string(code, pool, literal, &value.to_string()),
        Literal::BigDecimal(value) => construct_from_string(code, pool, literal, &value.to_string()),
        Literal::VoidClass => Ok(TypeRef::void()),
        Literal::Opaque { .. } => Err(unsupported(literal)),
        Literal::Char(c) if !fits_utf16_unit(*c) => Err(unsupported(literal)),
        Literal::Char(_)
        | Literal::Byte(_)
        | Literal::Short(_)
        | Literal::Int(_)
        | Literal::Long(_)
        | Literal::Float(_)
        | Literal::Double(_) => {
            let kind = literal.primitive_kind().ok_or_else(|| unsupported(literal))?;
            let wrapper = class_internal_name(kind.wrapper_class());
            let class_index = pool.class(&wrapper)?;
            let ctor = pool.method_ref(&wrapper, "<init>", &format!("({})V", kind.descriptor()))?;
            code.emit(Instruction::New(class_index));
            code.emit(Instruction::Dup);
            load_literal_as(code, pool, literal, kind)?;
            code.emit(Instruction::Invokespecial(ctor));
            Ok(TypeRef::wrapper(kind))
        }
    }
}

fn construct_from_string(
    code: &mut CodeBuilder,
    pool: &mut PoolCache,
    literal: &Literal,
    text: &str,
) -> Result<TypeRef> {
    let class_name = class_internal_name(literal.class_name());
    let class_index = pool.class(&class_name)?;
    let ctor = pool.method_ref(&class_name, "<init>", "(Ljava/lang/String;)V")?;
    code.emit(Instruction::New(class_index));
    code.emit(Instruction::Dup);
    code.emit(ldc(pool.string(text)?));
    code.emit(Instruction::Invokespecial(ctor));
    Ok(TypeRef::class(literal.class_name()))
}

/// A JVM `char` holds one UTF-16 code unit.
fn fits_utf16_unit(c: char) -> bool {
    c.len_utf16() == 1
}

enum Numeric {
    Integral(i64),
    Floating(f64),
}

fn numeric_value(literal: &Literal) -> Option<Numeric> {
    Some(match literal {
        Literal::Char(c) => Numeric::Integral(i64::from(u32::from(*c))),
        Literal::Byte(v) => Numeric::Integral(i64::from(*v)),
        Literal::Short(v) => Numeric::Integral(i64::from(*v)),
        Literal::Int(v) => Numeric::Integral(i64::from(*v)),
        Literal::Long(v) => Numeric::Integral(*v),
        Literal::Float(v) => Numeric::Floating(f64::from(*v)),
        Literal::Double(v) => Numeric::Floating(*v),
        Literal::BigInteger(v) => Numeric::Integral(v.to_i64()?),
        Literal::BigDecimal(v) => Numeric::Floating(v.to_f64()?),
        _ => return None,
    })
}

/// Pushes `literal` as an unboxed value of `kind`, applying the usual
/// numeric conversions. Non-numeric literals only load into their own kind.
pub fn load_literal_as(
    code: &mut CodeBuilder,
    pool: &mut PoolCache,
    literal: &Literal,
    kind: PrimitiveKind,
) -> Result<()> {
    if let Literal::Boolean(value) = literal {
        if kind != PrimitiveKind::Boolean {
            return Err(unsupported(literal));
        }
        code.emit(if *value {
            Instruction::Iconst_1
        } else {
            Instruction::Iconst_0
        });
        return Ok(());
    }
    if matches!(literal, Literal::Char(c) if !fits_utf16_unit(*c)) {
        return Err(unsupported(literal));
    }
    let value = numeric_value(literal).ok_or_else(|| unsupported(literal))?;
    let instruction = match (kind, value) {
        (PrimitiveKind::Boolean | PrimitiveKind::Void, _) => return Err(unsupported(literal)),
        (PrimitiveKind::Long, Numeric::Integral(v)) => long_const_instr(pool, v)?,
        (PrimitiveKind::Long, Numeric::Floating(v)) => long_const_instr(pool, v as i64)?,
        (PrimitiveKind::Float, Numeric::Integral(v)) => float_const_instr(pool, v as f32)?,
        (PrimitiveKind::Float, Numeric::Floating(v)) => float_const_instr(pool, v as f32)?,
        (PrimitiveKind::Double, Numeric::Integral(v)) => double_const_instr(pool, v as f64)?,
        (PrimitiveKind::Double, Numeric::Floating(v)) => double_const_instr(pool, v)?,
        (int_kind, value) => {
            let wide = match value {
                Numeric::Integral(v) => v as i32,
                Numeric::Floating(v) => v as i32,
            };
            let narrowed = match int_kind {
                PrimitiveKind::Byte => i32::from(wide as i8),
                PrimitiveKind::Short => i32::from(wide as i16),
                PrimitiveKind::Char => i32::from(wide as u16),
                _ => wide,
            };
            int_const_instr(pool, narrowed)?
        }
    };
    code.emit(instruction);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::pool::PoolEntry;
    use bigdecimal::BigDecimal;
    use num_bigint::BigInt;
    use std::str::FromStr;

    fn load(literal: &Literal) -> Result<(Vec<Instruction>, PoolCache, TypeRef)> {
        let mut code = CodeBuilder::new(0);
        let mut pool = PoolCache::new();
        let ty = load_literal(&mut code, &mut pool, literal)?;
        let (instructions, _) = code.finish()?;
        Ok((instructions, pool, ty))
    }

    #[test]
    fn null_is_a_single_push() {
        let (code, _, _) = load(&Literal::Null).unwrap();
        assert_eq!(code, vec![Instruction::Aconst_null]);
    }

    #[test]
    fn unsupported_literal_is_fatal_and_names_the_value() {
        let literal = Literal::Opaque {
            class_name: "java.io.FileInputStream".into(),
            value: "/tmp/x".into(),
        };
        let err = load(&literal).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot generate bytecode for constant: /tmp/x of type: java.io.FileInputStream"
        );
    }

    #[test]
    fn void_class_marker_emits_nothing() {
        let (code, _, ty) = load(&Literal::VoidClass).unwrap();
        assert!(code.is_empty());
        assert!(ty.is_void());
    }

    #[test]
    fn character_uses_the_char_constructor() {
        let (code, pool, ty) = load(&Literal::Char('a')).unwrap();
        assert_eq!(code[2], Instruction::Bipush(97));
        let Instruction::Invokespecial(ctor) = code[3] else {
            panic!("expected constructor");
        };
        assert_eq!(pool.member(ctor).unwrap().descriptor, "(C)V");
        assert!(ty.is_class("java.lang.Character"));
    }

    #[test]
    fn supplementary_character_is_rejected_not_truncated() {
        let emoji = Literal::Char('\u{1F600}');
        let mut code = CodeBuilder::new(0);
        let mut pool = PoolCache::new();
        assert!(matches!(
            load_literal(&mut code, &mut pool, &emoji),
            Err(CompileError::UnsupportedLiteral { .. })
        ));
        assert!(matches!(
            load_literal_as(&mut code, &mut pool, &emoji, PrimitiveKind::Char),
            Err(CompileError::UnsupportedLiteral { .. })
        ));
        assert!(code.is_empty());

        load_literal_as(&mut code, &mut pool, &Literal::Char('\u{FFFF}'), PrimitiveKind::Char).unwrap();
        let (instructions, _) = code.finish().unwrap();
        let Instruction::Ldc(index) = instructions[0] else {
            panic!("expected LDC for a large char");
        };
        assert_eq!(pool.entry(u16::from(index)), Some(&PoolEntry::Integer(0xFFFF)));
    }

    #[test]
    fn big_numbers_are_built_from_their_text() {
        let big = Literal::BigInteger(BigInt::from_str("123456789012345678901234567890").unwrap());
        let (code, pool, _) = load(&big).unwrap();
        let Instruction::Ldc(s) = code[2] else {
            panic!("expected LDC");
        };
        assert_eq!(
            pool.entry(u16::from(s)),
            Some(&PoolEntry::String("123456789012345678901234567890".into()))
        );
        let dec = Literal::BigDecimal(BigDecimal::from_str("1.50").unwrap());
        let (code, pool, ty) = load(&dec).unwrap();
        let Instruction::Invokespecial(ctor) = code[3] else {
            panic!("expected constructor");
        };
        assert_eq!(pool.member(ctor).unwrap().descriptor, "(Ljava/lang/String;)V");
        assert!(ty.is_class("java.math.BigDecimal"));
    }

    #[test]
    fn booleans_load_canonical_fields() {
        let (code, pool, _) = load(&Literal::Boolean(false)).unwrap();
        let Instruction::Getstatic(field) = code[0] else {
            panic!("expected GETSTATIC");
        };
        assert_eq!(pool.member(field).unwrap().name, "FALSE");
        assert_eq!(code.len(), 1);
    }

    #[test]
    fn long_uses_ldc2_outside_the_const_range() {
        let (code, _, _) = load(&Literal::Long(42)).unwrap();
        assert!(matches!(code[2], Instruction::Ldc2_w(_)));
        let (code, _, _) = load(&Literal::Long(1)).unwrap();
        assert_eq!(code[2], Instruction::Lconst_1);
    }

    #[test]
    fn primitive_mode_converts_numeric_literals() {
        let mut code = CodeBuilder::new(0);
        let mut pool = PoolCache::new();
        load_literal_as(&mut code, &mut pool, &Literal::Int(3), PrimitiveKind::Double).unwrap();
        load_literal_as(&mut code, &mut pool, &Literal::Int(300), PrimitiveKind::Byte).unwrap();
        load_literal_as(&mut code, &mut pool, &Literal::Boolean(true), PrimitiveKind::Boolean)
            .unwrap();
        assert!(
            load_literal_as(&mut code, &mut pool, &Literal::String("x".into()), PrimitiveKind::Int)
                .is_err()
        );
        let (instructions, _) = code.finish().unwrap();
        assert!(matches!(instructions[0], Instruction::Ldc2_w(_)));
        assert_eq!(instructions[1], Instruction::Bipush(44));
        assert_eq!(instructions[2], Instruction::Iconst_1);
    }
}
