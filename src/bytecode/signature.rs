//! `Signature` attribute strings (JVMS §4.7.9.1) for classes, methods and fields.
//!
//! Every builder returns `Ok(None)` when the declaration uses no generics at
//! all, which is by far the common case.

use super::descriptor::class_internal_name;
use crate::ast::types::{BindingKind, Bounds, GenericBinding, TypeRef};
use crate::ast::{ClassNode, MethodNode};
use crate::error::{CompileError, Result};

fn malformed(ty: &TypeRef, context: &str) -> CompileError {
    CompileError::MalformedGenerics {
        ty: ty.to_string(),
        context: context.to_string(),
    }
}

fn declared(generics: Option<&[GenericBinding]>) -> Option<&[GenericBinding]> {
    generics.filter(|g| !g.is_empty())
}

pub fn method_signature(method: &MethodNode) -> Result<Option<String>> {
    let params: Vec<TypeRef> = method.parameters.iter().map(|p| p.ty.clone()).collect();
    method_signature_of(method.generics.as_deref(), &params, &method.return_type)
}

/// Signature of a method with the given type parameters, parameters and return type.
pub fn method_signature_of(
    generics: Option<&[GenericBinding]>,
    params: &[TypeRef],
    ret: &TypeRef,
) -> Result<Option<String>> {
    let generics = declared(generics);
    if generics.is_none() && !params.iter().any(TypeRef::uses_generics) && !ret.uses_generics() {
        return Ok(None);
    }
    let mut out = String::with_capacity(100);
    write_type_parameters(&mut out, generics)?;
    let param_bindings: Vec<GenericBinding> = params.iter().map(binding_for).collect();
    add_sub_types(&mut out, &param_bindings, "(", ")")?;
    add_sub_types(&mut out, &[binding_for(ret)], "", "")?;
    Ok(Some(out))
}

pub fn class_signature(class: &ClassNode) -> Result<Option<String>> {
    let generics = declared(class.generics.as_deref());
    if generics.is_none()
        && !class.superclass.uses_generics()
        && !class.interfaces.iter().any(TypeRef::uses_generics)
    {
        return Ok(None);
    }
    let mut out = String::with_capacity(100);
    write_type_parameters(&mut out, generics)?;
    require_class(&class.superclass, &class.name)?;
    write_bound_type(&mut out, &class.superclass, true)?;
    for interface in &class.interfaces {
        require_class(interface, &class.name)?;
        write_bound_type(&mut out, interface, false)?;
    }
    Ok(Some(out))
}

/// Signature of a field or local of type `ty`.
pub fn type_bounds_signature(ty: &TypeRef) -> Result<Option<String>> {
    if !ty.uses_generics() {
        return Ok(None);
    }
    let mut out = String::with_capacity(100);
    add_sub_types(&mut out, &[binding_for(ty)], "", "")?;
    Ok(Some(out))
}

fn require_class(ty: &TypeRef, owner: &str) -> Result<()> {
    match ty.redirect() {
        TypeRef::Class(_) => Ok(()),
        _ => Err(malformed(ty, &format!("supertype of {}", owner))),
    }
}

/// Binding standing for a use of `ty` in a parameter or return position.
fn binding_for(ty: &TypeRef) -> GenericBinding {
    match ty.redirect() {
        TypeRef::Placeholder { name, .. } => GenericBinding {
            name: name.clone(),
            ty: ty.redirect().clone(),
            bounds: Bounds::None,
            kind: BindingKind::Placeholder,
        },
        _ => GenericBinding::concrete(ty.redirect().clone()),
    }
}

/// `<T:bound;U::iface;>`
fn write_type_parameters(out: &mut String, generics: Option<&[GenericBinding]>) -> Result<()> {
    let Some(generics) = generics else {
        return Ok(());
    };
    out.push('<');
    for binding in generics {
        if binding.is_wildcard() {
            return Err(malformed(&binding.ty, "type parameter declaration"));
        }
        out.push_str(&binding.name);
        out.push(':');
        match &binding.bounds {
            Bounds::None => write_bound_type(out, &binding.ty.erasure(), true)?,
            _ => write_bounds(out, binding, true)?,
        }
    }
    out.push('>');
    Ok(())
}

fn write_bounds(out: &mut String, binding: &GenericBinding, interface_marker: bool) -> Result<()> {
    match &binding.bounds {
        Bounds::Upper(bounds) => {
            for bound in bounds {
                write_bound_type(out, bound, interface_marker)?;
            }
        }
        Bounds::Lower(bound) => write_bound_type(out, bound, interface_marker)?,
        Bounds::None => write_bound_type(out, &binding.ty, interface_marker)?,
    }
    Ok(())
}

fn write_bound_type(out: &mut String, ty: &TypeRef, interface_marker: bool) -> Result<()> {
    if interface_marker && ty.is_interface() {
        out.push(':');
    }
    match ty.redirect() {
        TypeRef::Placeholder { name, .. } => {
            out.push('T');
            out.push_str(name);
            out.push(';');
        }
        TypeRef::Primitive(kind) => out.push(kind.descriptor()),
        TypeRef::Class(class) => {
            out.push('L');
            out.push_str(&class_internal_name(&class.name));
            if let Some(arguments) = &class.generics {
                add_sub_types(out, arguments, "<", ">")?;
            }
            out.push(';');
        }
        TypeRef::Array(component) => {
            out.push('[');
            write_bound_type(out, component, false)?;
        }
        TypeRef::Alias { .. } | TypeRef::Union(_) => {
            return Err(malformed(ty, "generic bound"));
        }
    }
    Ok(())
}

fn add_sub_types(out: &mut String, types: &[GenericBinding], start: &str, end: &str) -> Result<()> {
    out.push_str(start);
    for binding in types {
        if let (BindingKind::Concrete, Some(component)) = (binding.kind, binding.ty.component()) {
            out.push('[');
            add_sub_types(out, &[binding_for(component)], "", "")?;
            continue;
        }
        match binding.kind {
            BindingKind::Placeholder => {
                out.push('T');
                out.push_str(&binding.name);
                out.push(';');
            }
            BindingKind::Wildcard => match &binding.bounds {
                Bounds::Upper(_) => {
                    out.push('+');
                    write_bounds(out, binding, false)?;
                }
                Bounds::Lower(_) => {
                    out.push('-');
                    write_bounds(out, binding, false)?;
                }
                Bounds::None => out.push('*'),
            },
            BindingKind::Concrete => write_bounds(out, binding, false)?,
        }
    }
    out.push_str(end);
    Ok(())
}
