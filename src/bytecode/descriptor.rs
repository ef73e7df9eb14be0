//! Type descriptors, internal names and opcode families.

use crate::ast::types::{ClassType, MethodDescriptor, PrimitiveKind, TypeRef};
use crate::error::{CompileError, Result};

/// Slash-separated internal form of a dotted class name.
pub fn class_internal_name(dotted: &str) -> String {
    dotted.replace('.', "/")
}

/// Field descriptor of `ty`: `I`, `Ljava/lang/String;`, `[[I` and so on.
pub fn type_descriptor(ty: &TypeRef) -> Result<String> {
    let mut out = String::new();
    write_descriptor(&mut out, ty)?;
    Ok(out)
}

fn write_descriptor(out: &mut String, ty: &TypeRef) -> Result<()> {
    match ty.redirect() {
        TypeRef::Primitive(kind) => out.push(kind.descriptor()),
        TypeRef::Class(ClassType { name, .. }) => {
            out.push('L');
            out.push_str(&class_internal_name(name));
            out.push(';');
        }
        TypeRef::Array(component) => {
            out.push('[');
            write_descriptor(out, component)?;
        }
        TypeRef::Placeholder { erasure, .. } => write_descriptor(out, erasure)?,
        TypeRef::Alias { target, .. } => write_descriptor(out, target)?,
        TypeRef::Union(_) => {
            return Err(CompileError::UnsupportedType {
                ty: ty.to_string(),
                context: "type descriptor".into(),
            });
        }
    }
    Ok(())
}

/// Internal name as used by `NEW`, `CHECKCAST` and class constants.
/// Arrays use their descriptor, as the class-file format requires.
pub fn internal_name(ty: &TypeRef) -> Result<String> {
    match ty.redirect() {
        TypeRef::Class(class) => Ok(class_internal_name(&class.name)),
        TypeRef::Array(_) => type_descriptor(ty),
        TypeRef::Placeholder { erasure, .. } => internal_name(erasure),
        TypeRef::Primitive(kind) => Err(CompileError::UnsupportedType {
            ty: kind.name().into(),
            context: "internal class name of a primitive".into(),
        }),
        _ => Err(CompileError::UnsupportedType {
            ty: ty.to_string(),
            context: "internal class name".into(),
        }),
    }
}

/// Name as `Class.forName` expects it: dotted, arrays in descriptor form.
pub fn class_loading_name(ty: &TypeRef) -> Result<String> {
    match ty.redirect() {
        TypeRef::Primitive(kind) => Ok(kind.name().to_string()),
        TypeRef::Array(_) => Ok(type_descriptor(ty)?.replace('/', ".")),
        _ => Ok(internal_name(ty)?.replace('/', ".")),
    }
}

/// `"(" + params + ")" + return`.
pub fn method_descriptor(params: &[TypeRef], ret: &TypeRef) -> Result<String> {
    let mut out = String::from("(");
    for param in params {
        write_descriptor(&mut out, param)?;
    }
    out.push(')');
    write_descriptor(&mut out, ret)?;
    Ok(out)
}

impl MethodDescriptor {
    pub fn to_descriptor(&self) -> Result<String> {
        method_descriptor(&self.params, &self.ret)
    }
}

/// Parses a single field descriptor back into a type.
pub fn parse_field_descriptor(descriptor: &str) -> Result<TypeRef> {
    let (ty, rest) = parse_one(descriptor, descriptor)?;
    if !rest.is_empty() {
        return Err(malformed(descriptor, "trailing characters"));
    }
    Ok(ty)
}

/// Parses a method descriptor such as `(ILjava/lang/Object;)Z`.
pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor> {
    let mut rest = descriptor
        .strip_prefix('(')
        .ok_or_else(|| malformed(descriptor, "descriptor must start with '('"))?;
    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(malformed(descriptor, "descriptor missing ')'"));
        }
        let (ty, after) = parse_one(rest, descriptor)?;
        params.push(ty);
        rest = after;
    }
    let ret = parse_field_descriptor(rest)?;
    Ok(MethodDescriptor::new(params, ret))
}

fn parse_one<'a>(input: &'a str, whole: &str) -> Result<(TypeRef, &'a str)> {
    let mut chars = input.chars();
    match chars.next() {
        Some('[') => {
            let (component, rest) = parse_one(&input[1..], whole)?;
            Ok((TypeRef::array_of(component), rest))
        }
        Some('L') => {
            let end = input
                .find(';')
                .ok_or_else(|| malformed(whole, "unterminated object type (missing `;`)"))?;
            let name = input[1..end].replace('/', ".");
            Ok((TypeRef::class(name), &input[end + 1..]))
        }
        Some(c) => match PrimitiveKind::from_descriptor(c) {
            Some(kind) => Ok((TypeRef::Primitive(kind), &input[1..])),
            None => Err(malformed(whole, &format!("invalid descriptor character '{}'", c))),
        },
        None => Err(malformed(whole, "empty type")),
    }
}

fn malformed(descriptor: &str, message: &str) -> CompileError {
    CompileError::internal(format!("descriptor {}", descriptor), message)
}

/// The width-specific load/store/return opcode family of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeFamily {
    Int,
    Long,
    Float,
    Double,
    Reference,
    Void,
}

pub fn opcode_family(ty: &TypeRef) -> OpcodeFamily {
    match ty.primitive_kind() {
        Some(PrimitiveKind::Double) => OpcodeFamily::Double,
        Some(PrimitiveKind::Float) => OpcodeFamily::Float,
        Some(PrimitiveKind::Long) => OpcodeFamily::Long,
        Some(PrimitiveKind::Void) => OpcodeFamily::Void,
        Some(_) => OpcodeFamily::Int,
        None => OpcodeFamily::Reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::GenericBinding;

    #[test]
    fn primitive_table_is_exact_and_unique() {
        let descriptors: Vec<String> = PrimitiveKind::ALL
            .iter()
            .map(|k| type_descriptor(&TypeRef::Primitive(*k)).unwrap())
            .collect();
        assert_eq!(descriptors, ["Z", "B", "C", "S", "I", "J", "F", "D", "V"]);
    }

    #[test]
    fn arrays_prefix_each_dimension() {
        let int2 = TypeRef::array_of(TypeRef::array_of(TypeRef::int()));
        assert_eq!(type_descriptor(&int2).unwrap(), "[[I");
        let strings = TypeRef::array_of(TypeRef::string());
        assert_eq!(type_descriptor(&strings).unwrap(), "[Ljava/lang/String;");
        assert_eq!(internal_name(&strings).unwrap(), "[Ljava/lang/String;");
        assert_eq!(class_loading_name(&strings).unwrap(), "[Ljava.lang.String;");
    }

    #[test]
    fn generics_and_placeholders_erase() {
        let list = TypeRef::parameterized(
            TypeRef::interface("java.util.List"),
            vec![GenericBinding::concrete(TypeRef::string())],
        );
        assert_eq!(type_descriptor(&list).unwrap(), "Ljava/util/List;");
        assert_eq!(
            type_descriptor(&TypeRef::placeholder("T")).unwrap(),
            "Ljava/lang/Object;"
        );
    }

    #[test]
    fn union_types_are_fatal() {
        let union = TypeRef::Union(vec![TypeRef::string(), TypeRef::class("java.lang.Integer")]);
        assert!(matches!(
            type_descriptor(&union),
            Err(CompileError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn method_descriptor_round_trips_through_the_parser() {
        let text = "(I[JLjava/lang/Object;)Ljava/lang/Integer;";
        let parsed = parse_method_descriptor(text).unwrap();
        assert_eq!(parsed.params.len(), 3);
        assert_eq!(parsed.to_descriptor().unwrap(), text);
        assert!(parse_method_descriptor("(Ljava/lang/Object").is_err());
    }

    #[test]
    fn opcode_families_share_the_int_form() {
        for kind in [
            PrimitiveKind::Boolean,
            PrimitiveKind::Byte,
            PrimitiveKind::Char,
            PrimitiveKind::Short,
            PrimitiveKind::Int,
        ] {
            assert_eq!(opcode_family(&TypeRef::Primitive(kind)), OpcodeFamily::Int);
        }
        assert_eq!(opcode_family(&TypeRef::array_of(TypeRef::int())), OpcodeFamily::Reference);
        assert_eq!(opcode_family(&TypeRef::void()), OpcodeFamily::Void);
    }
}
