//! Class-file assembly: fields, accessors, method bodies and attributes.

use super::code::CodeBuilder;
use super::consts::{double_const_instr, float_const_instr, int_const_instr, long_const_instr};
use super::descriptor::{class_internal_name, internal_name, type_descriptor};
use super::helpers::{load_instruction, return_instruction};
use super::pool::PoolCache;
use super::signature::{class_signature, method_signature, type_bounds_signature};
use super::stack;
use super::writer::ExpressionWriter;
use crate::ast::class::{ClassNode, ClassTable, Modifiers, PropertyNode};
use crate::ast::types::{ClassKind, MethodDescriptor, PrimitiveKind, TypeRef, slot_size};
use crate::ast::{MethodNode, Statement};
use crate::config::CompilerOptions;
use crate::error::{CompileError, Result};
use crate::transform::StaticCompilationTransformer;

use ristretto_classfile::{
    self as jvm, BaseType, ClassAccessFlags, ClassFile, FieldAccessFlags, MethodAccessFlags,
    attributes::{Attribute, Instruction},
};

const LOG_CHANNEL: &str = "bytecode-gen";

/// Emitted body of one method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCode {
    pub instructions: Vec<Instruction>,
    pub max_stack: u16,
    pub max_locals: u16,
}

/// Converts a type to a Ristretto FieldType for field definitions.
fn field_type(ty: &TypeRef) -> Result<jvm::FieldType> {
    if let Some(kind) = ty.primitive_kind() {
        let base = match kind {
            PrimitiveKind::Boolean => BaseType::Boolean,
            PrimitiveKind::Byte => BaseType::Byte,
            PrimitiveKind::Char => BaseType::Char,
            PrimitiveKind::Short => BaseType::Short,
            PrimitiveKind::Int => BaseType::Int,
            PrimitiveKind::Long => BaseType::Long,
            PrimitiveKind::Float => BaseType::Float,
            PrimitiveKind::Double => BaseType::Double,
            PrimitiveKind::Void => {
                return Err(CompileError::internal("field type", "void type cannot be used as a field type"));
            }
        };
        return Ok(jvm::FieldType::Base(base));
    }
    match ty.component() {
        Some(component) => Ok(jvm::FieldType::Array(Box::new(field_type(component)?))),
        None => Ok(jvm::FieldType::Object(internal_name(ty)?)),
    }
}

/// Pushes the zero value of `ty`, `null` for references.
fn push_default(code: &mut CodeBuilder, pool: &mut PoolCache, ty: &TypeRef) -> Result<()> {
    let instruction = match ty.primitive_kind() {
        None => Instruction::Aconst_null,
        Some(PrimitiveKind::Void) => return Ok(()),
        Some(PrimitiveKind::Long) => long_const_instr(pool, 0)?,
        Some(PrimitiveKind::Float) => float_const_instr(pool, 0.0)?,
        Some(PrimitiveKind::Double) => double_const_instr(pool, 0.0)?,
        Some(_) => int_const_instr(pool, 0)?,
    };
    code.emit(instruction);
    Ok(())
}

fn signature_attribute(pool: &mut PoolCache, signature: &str) -> Result<Attribute> {
    Ok(Attribute::Signature {
        name_index: pool.utf8("Signature")?,
        signature_index: pool.utf8(signature)?,
    })
}

/// Emits the body of an already transformed method.
///
/// Locals are numbered by the earlier analysis: `this` (for instance
/// methods) and parameters come first, temporaries are placed above the
/// highest slot the body references.
pub fn emit_method_body(
    class: &ClassNode,
    method: &MethodNode,
    classes: &ClassTable,
    pool: &mut PoolCache,
) -> Result<MethodCode> {
    if !method.has_code() {
        return Err(CompileError::internal(
            "method body",
            format!("{}.{} is abstract or native", class.name, method.name),
        ));
    }
    let descriptor = method.descriptor();
    let receiver_slots = u16::from(!method.is_static());
    let body_locals = method
        .body
        .iter()
        .filter_map(Statement::expression)
        .map(|e| e.max_local_slot())
        .max()
        .unwrap_or(0);
    let first_free = (receiver_slots + descriptor.param_slots()).max(body_locals);

    let mut code = CodeBuilder::new(first_free);
    if method.name == "<init>" {
        let super_init = pool.method_ref(&internal_name(&class.superclass)?, "<init>", "()V")?;
        code.emit(Instruction::Aload_0);
        code.emit(Instruction::Invokespecial(super_init));
    }
    {
        let mut writer = ExpressionWriter::new(&mut code, pool, classes, &class.name);
        for statement in &method.body {
            writer.write_statement(statement, &method.return_type)?;
        }
    }
    if !matches!(method.body.last(), Some(Statement::Return(_))) {
        push_default(&mut code, pool, &method.return_type)?;
        code.emit(return_instruction(&method.return_type));
    }

    let (instructions, max_locals) = code.finish()?;
    let max_stack = stack::max_stack(&instructions, pool)?;
    Ok(MethodCode {
        instructions,
        max_stack,
        max_locals,
    })
}

fn assemble_method(
    pool: &mut PoolCache,
    modifiers: Modifiers,
    name: &str,
    descriptor: &MethodDescriptor,
    code: Option<MethodCode>,
    extra: Vec<Attribute>,
) -> Result<jvm::Method> {
    let mut method = jvm::Method::default();
    method.access_flags = MethodAccessFlags::from_bits_truncate(modifiers.0);
    method.name_index = pool.utf8(name)?;
    method.descriptor_index = pool.utf8(&descriptor.to_descriptor()?)?;
    if let Some(code) = code {
        method.attributes.push(Attribute::Code {
            name_index: pool.utf8("Code")?,
            max_stack: code.max_stack,
            max_locals: code.max_locals,
            code: code.instructions,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        });
    }
    method.attributes.extend(extra);
    Ok(method)
}

/// Compiles one method of `class`; the body must already be transformed.
pub fn compile_method(
    class: &ClassNode,
    method: &MethodNode,
    classes: &ClassTable,
    options: &CompilerOptions,
    pool: &mut PoolCache,
) -> Result<jvm::Method> {
    let code = if method.has_code() {
        Some(emit_method_body(class, method, classes, pool)?)
    } else {
        None
    };
    let mut extra = Vec::new();

    // Preserve parameter names
    if method.name != "<init>" && !method.parameters.is_empty() {
        let mut parameters = Vec::with_capacity(method.parameters.len());
        for parameter in &method.parameters {
            parameters.push(jvm::attributes::MethodParameter {
                name_index: pool.utf8(&parameter.name)?,
                access_flags: MethodAccessFlags::empty(),
            });
        }
        extra.push(Attribute::MethodParameters {
            name_index: pool.utf8("MethodParameters")?,
            parameters,
        });
    }
    if options.generic_signatures {
        if let Some(signature) = method_signature(method)? {
            extra.push(signature_attribute(pool, &signature)?);
        }
    }

    breadcrumbs::log!(
        breadcrumbs::LogLevel::Info,
        LOG_CHANNEL,
        match &code {
            Some(code) => format!(
                "Emitted {}.{} ({} instructions, max_stack {})",
                class.name,
                method.name,
                code.instructions.len(),
                code.max_stack
            ),
            None => format!("Emitted {}.{} without code", class.name, method.name),
        }
    );
    assemble_method(pool, method.modifiers, &method.name, &method.descriptor(), code, extra)
}

fn declares(class: &ClassNode, name: &str, arity: usize) -> bool {
    class
        .methods
        .iter()
        .any(|m| m.name == name && m.parameters.len() == arity)
}

fn accessor(pool: &mut PoolCache, class: &ClassNode, property: &PropertyNode, setter: bool) -> Result<jvm::Method> {
    let owner = class_internal_name(&class.name);
    let field = pool.field_ref(&owner, &property.name, &type_descriptor(&property.ty)?)?;
    let mut code = CodeBuilder::new(1 + if setter { slot_size(&property.ty) } else { 0 });
    code.emit(Instruction::Aload_0);
    let (name, descriptor) = if setter {
        code.emit(load_instruction(&property.ty, 1)?);
        code.emit(Instruction::Putfield(field));
        code.emit(Instruction::Return);
        (
            property.setter_name(),
            MethodDescriptor::new(vec![property.ty.clone()], TypeRef::void()),
        )
    } else {
        code.emit(Instruction::Getfield(field));
        code.emit(return_instruction(&property.ty));
        (property.getter_name(), MethodDescriptor::new(vec![], property.ty.clone()))
    };
    let (instructions, max_locals) = code.finish()?;
    let max_stack = stack::max_stack(&instructions, pool)?;
    let body = MethodCode {
        instructions,
        max_stack,
        max_locals,
    };
    assemble_method(pool, Modifiers::public(), &name, &descriptor, Some(body), Vec::new())
}

/// Creates a default constructor `<init>()V` that just calls `super()`.
fn default_constructor(pool: &mut PoolCache, class: &ClassNode) -> Result<jvm::Method> {
    let super_init = pool.method_ref(&internal_name(&class.superclass)?, "<init>", "()V")?;
    let body = MethodCode {
        instructions: vec![
            Instruction::Aload_0,
            Instruction::Invokespecial(super_init),
            Instruction::Return,
        ],
        max_stack: 1,
        max_locals: 1,
    };
    let descriptor = MethodDescriptor::new(vec![], TypeRef::void());
    assemble_method(pool, Modifiers::public(), "<init>", &descriptor, Some(body), Vec::new())
}

fn class_access_flags(class: &ClassNode) -> ClassAccessFlags {
    let declared = ClassAccessFlags::from_bits_truncate(class.modifiers.0 & !Modifiers::STATIC);
    match class.kind {
        ClassKind::Class => declared | ClassAccessFlags::SUPER,
        ClassKind::Interface => declared | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        ClassKind::Enum => declared | ClassAccessFlags::SUPER | ClassAccessFlags::ENUM,
    }
}

/// Transforms every method of `class` and serialises the resulting class file.
pub fn compile_class(class: &ClassNode, classes: &ClassTable, options: &CompilerOptions) -> Result<Vec<u8>> {
    let transformer = StaticCompilationTransformer::new(classes, options);
    let mut class = class.clone();
    for method in &mut class.methods {
        // bodiless instance methods of an interface are implicitly public abstract
        if class.kind == ClassKind::Interface && !method.is_static() && method.body.is_empty() {
            method.modifiers = method.modifiers.with(Modifiers::PUBLIC | Modifiers::ABSTRACT);
        }
        transformer.transform_method(method)?;
    }

    let mut pool = PoolCache::new();
    let this_class = pool.class(&class_internal_name(&class.name))?;
    let super_class = pool.class(&internal_name(&class.superclass)?)?;
    let mut interfaces = Vec::with_capacity(class.interfaces.len());
    for interface in &class.interfaces {
        interfaces.push(pool.class(&internal_name(interface)?)?);
    }

    // --- Fields backing the properties ---
    let mut fields = Vec::with_capacity(class.properties.len());
    for property in &class.properties {
        let mut attributes = Vec::new();
        if options.generic_signatures {
            if let Some(signature) = type_bounds_signature(&property.ty)? {
                attributes.push(signature_attribute(&mut pool, &signature)?);
            }
        }
        let static_bit = property.modifiers.0 & Modifiers::STATIC;
        fields.push(jvm::Field {
            access_flags: FieldAccessFlags::from_bits_truncate(Modifiers::PRIVATE | static_bit),
            name_index: pool.utf8(&property.name)?,
            descriptor_index: pool.utf8(&type_descriptor(&property.ty)?)?,
            field_type: field_type(&property.ty)?,
            attributes,
        });
    }

    // --- Methods ---
    let mut methods = Vec::new();
    for method in &class.methods {
        methods.push(compile_method(&class, method, classes, options, &mut pool)?);
    }
    for property in class.properties.iter().filter(|p| !p.modifiers.is_static()) {
        if !declares(&class, &property.getter_name(), 0) {
            methods.push(accessor(&mut pool, &class, property, false)?);
        }
        if !property.modifiers.is_final() && !declares(&class, &property.setter_name(), 1) {
            methods.push(accessor(&mut pool, &class, property, true)?);
        }
    }
    let has_constructor = class.methods.iter().any(|m| m.name == "<init>");
    if !has_constructor && class.kind != ClassKind::Interface {
        methods.push(default_constructor(&mut pool, &class)?);
    }

    // --- Class attributes ---
    let mut attributes = Vec::new();
    if let Some(source_file) = &options.source_file {
        attributes.push(Attribute::SourceFile {
            name_index: pool.utf8("SourceFile")?,
            source_file_index: pool.utf8(source_file)?,
        });
    }
    if options.generic_signatures {
        if let Some(signature) = class_signature(&class)? {
            attributes.push(signature_attribute(&mut pool, &signature)?);
        }
    }

    let class_file = ClassFile {
        version: options.target.class_file_version(),
        constant_pool: pool.into_inner(),
        access_flags: class_access_flags(&class),
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    };

    let mut byte_vector = Vec::new();
    class_file.to_bytes(&mut byte_vector)?;

    breadcrumbs::log!(
        breadcrumbs::LogLevel::Info,
        LOG_CHANNEL,
        format!("Generated class: {} ({} bytes)", class.name, byte_vector.len())
    );
    Ok(byte_vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::class::Parameter;
    use crate::ast::{BinaryOp, Expression, Variable};
    use crate::ast::types::GenericBinding;

    fn point() -> ClassNode {
        ClassNode {
            properties: vec![
                PropertyNode {
                    name: "x".into(),
                    ty: TypeRef::int(),
                    modifiers: Modifiers::public(),
                },
                PropertyNode {
                    name: "id".into(),
                    ty: TypeRef::long(),
                    modifiers: Modifiers::public().with(Modifiers::FINAL),
                },
            ],
            ..ClassNode::new("geo.Point")
        }
    }

    #[test]
    fn instance_method_locals_start_after_parameters() {
        let class = point();
        let mut method = MethodNode::new(
            "shift",
            vec![Parameter::new("dx", TypeRef::long())],
            TypeRef::long(),
        );
        let dx = Expression::variable(Variable::new("dx", TypeRef::long(), 1));
        method.body = vec![Statement::Return(Some(Expression::binary(
            dx.clone(),
            BinaryOp::Plus,
            dx,
        )))];
        let mut pool = PoolCache::new();
        let code = emit_method_body(&class, &method, &ClassTable::new(), &mut pool).unwrap();
        assert_eq!(
            code.instructions,
            vec![
                Instruction::Lload_1,
                Instruction::Lload_1,
                Instruction::Ladd,
                Instruction::Lreturn
            ]
        );
        assert_eq!(code.max_locals, 3);
        assert_eq!(code.max_stack, 4);
    }

    #[test]
    fn missing_return_yields_the_zero_value() {
        let class = point();
        let method = MethodNode::new("zero", vec![], TypeRef::primitive(PrimitiveKind::Double));
        let mut pool = PoolCache::new();
        let code = emit_method_body(&class, &method, &ClassTable::new(), &mut pool).unwrap();
        assert_eq!(code.instructions, vec![Instruction::Dconst_0, Instruction::Dreturn]);
    }

    #[test]
    fn declared_constructor_calls_super_first() {
        let class = point();
        let init = MethodNode::new("<init>", vec![], TypeRef::void());
        let mut pool = PoolCache::new();
        let code = emit_method_body(&class, &init, &ClassTable::new(), &mut pool).unwrap();
        assert_eq!(code.instructions[0], Instruction::Aload_0);
        assert!(matches!(code.instructions[1], Instruction::Invokespecial(_)));
        assert_eq!(code.instructions[2], Instruction::Return);
    }

    #[test]
    fn abstract_methods_have_no_code() {
        let mut shape = ClassNode::new("geo.Shape");
        shape.kind = ClassKind::Interface;
        shape.modifiers = Modifiers::public().with(Modifiers::ABSTRACT);
        shape.methods = vec![MethodNode::new("area", vec![], TypeRef::primitive(PrimitiveKind::Double))];
        let bytes = compile_class(&shape, &ClassTable::new(), &CompilerOptions::default()).unwrap();
        let parsed = ClassFile::from_bytes(&mut std::io::Cursor::new(bytes)).unwrap();
        assert!(parsed.access_flags.contains(ClassAccessFlags::INTERFACE));
        // no default constructor for an interface
        assert_eq!(parsed.methods.len(), 1);
        let area = &parsed.methods[0];
        assert!(area.access_flags.contains(MethodAccessFlags::ABSTRACT));
        assert!(!area.attributes.iter().any(|a| matches!(a, Attribute::Code { .. })));

        let mut native = MethodNode::new("hash", vec![], TypeRef::int());
        native.modifiers = Modifiers::public().with(Modifiers::NATIVE);
        let mut pool = PoolCache::new();
        assert!(emit_method_body(&point(), &native, &ClassTable::new(), &mut pool).is_err());
        let method = compile_method(&point(), &native, &ClassTable::new(), &CompilerOptions::default(), &mut pool)
            .unwrap();
        assert!(method.attributes.is_empty());
    }

    #[test]
    fn field_types_follow_the_descriptor() {
        assert_eq!(field_type(&TypeRef::int()).unwrap(), jvm::FieldType::Base(BaseType::Int));
        assert_eq!(
            field_type(&TypeRef::array_of(TypeRef::string())).unwrap(),
            jvm::FieldType::Array(Box::new(jvm::FieldType::Object("java/lang/String".into())))
        );
        assert!(field_type(&TypeRef::void()).is_err());
    }

    #[test]
    fn class_bytes_start_with_the_magic_number() {
        let mut class = point();
        class.generics = Some(vec![GenericBinding::placeholder("T", vec![])]);
        let options = CompilerOptions {
            source_file: Some("Point.groovy".into()),
            ..CompilerOptions::default()
        };
        let bytes = compile_class(&class, &ClassTable::from_classes(&[point()]), &options).unwrap();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);

        let parsed = ClassFile::from_bytes(&mut std::io::Cursor::new(bytes)).unwrap();
        // getX, setX, getId and the default constructor
        assert_eq!(parsed.methods.len(), 4);
        assert_eq!(parsed.fields.len(), 2);
        assert_eq!(parsed.attributes.len(), 2);
    }
}
