//! Semantic types of the compiled language.
//!
//! A [`TypeRef`] is a resolved type as the type checker hands it over:
//! a primitive, a (possibly parameterized) class, an array, a generics
//! placeholder, an alias redirecting to another type, or a union pseudo-type
//! that only exists during inference and can never reach the class file.

use std::fmt;

pub const OBJECT_CLASS: &str = "java.lang.Object";
pub const STRING_CLASS: &str = "java.lang.String";
pub const NUMBER_CLASS: &str = "java.lang.Number";
pub const CLASS_CLASS: &str = "java.lang.Class";
pub const MAP_CLASS: &str = "java.util.Map";
pub const LIST_CLASS: &str = "java.util.List";
pub const BIG_INTEGER_CLASS: &str = "java.math.BigInteger";
pub const BIG_DECIMAL_CLASS: &str = "java.math.BigDecimal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Void,
    ];

    pub fn descriptor(self) -> char {
        match self {
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
            PrimitiveKind::Void => 'V',
        }
    }

    pub fn from_descriptor(c: char) -> Option<Self> {
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.descriptor() == c)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Void => "void",
        }
    }

    /// Dotted name of the wrapper class.
    pub fn wrapper_class(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "java.lang.Boolean",
            PrimitiveKind::Byte => "java.lang.Byte",
            PrimitiveKind::Char => "java.lang.Character",
            PrimitiveKind::Short => "java.lang.Short",
            PrimitiveKind::Int => "java.lang.Integer",
            PrimitiveKind::Long => "java.lang.Long",
            PrimitiveKind::Float => "java.lang.Float",
            PrimitiveKind::Double => "java.lang.Double",
            PrimitiveKind::Void => "java.lang.Void",
        }
    }

    pub fn from_wrapper(class_name: &str) -> Option<Self> {
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.wrapper_class() == class_name)
    }

    /// Local-variable slots / operand-stack words occupied by a value.
    pub fn slot_size(self) -> u16 {
        match self {
            PrimitiveKind::Void => 0,
            PrimitiveKind::Long | PrimitiveKind::Double => 2,
            _ => 1,
        }
    }

    /// Kinds the VM represents as a plain `int` on the operand stack.
    pub fn is_int_width(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Boolean
                | PrimitiveKind::Byte
                | PrimitiveKind::Char
                | PrimitiveKind::Short
                | PrimitiveKind::Int
        )
    }

    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Boolean | PrimitiveKind::Char | PrimitiveKind::Void
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Enum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassType {
    /// Dotted binary name, e.g. `java.util.Map$Entry`.
    pub name: String,
    /// Type arguments; `None` for a raw or non-generic use.
    pub generics: Option<Vec<GenericBinding>>,
    pub kind: ClassKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Primitive(PrimitiveKind),
    Class(ClassType),
    Array(Box<TypeRef>),
    /// A use of a type variable such as `T`.
    Placeholder { name: String, erasure: Box<TypeRef> },
    /// Alias indirection; owns its target so a redirect chain always ends.
    Alias { name: String, target: Box<TypeRef> },
    /// Inference-only union / lowest-upper-bound type.
    Union(Vec<TypeRef>),
}

impl TypeRef {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        TypeRef::Primitive(kind)
    }

    pub fn boolean() -> Self {
        TypeRef::Primitive(PrimitiveKind::Boolean)
    }

    pub fn int() -> Self {
        TypeRef::Primitive(PrimitiveKind::Int)
    }

    pub fn long() -> Self {
        TypeRef::Primitive(PrimitiveKind::Long)
    }

    pub fn void() -> Self {
        TypeRef::Primitive(PrimitiveKind::Void)
    }

    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class(ClassType {
            name: name.into(),
            generics: None,
            kind: ClassKind::Class,
        })
    }

    pub fn interface(name: impl Into<String>) -> Self {
        TypeRef::Class(ClassType {
            name: name.into(),
            generics: None,
            kind: ClassKind::Interface,
        })
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        TypeRef::Class(ClassType {
            name: name.into(),
            generics: None,
            kind: ClassKind::Enum,
        })
    }

    pub fn parameterized(base: TypeRef, arguments: Vec<GenericBinding>) -> Self {
        match base {
            TypeRef::Class(mut class) => {
                class.generics = Some(arguments);
                TypeRef::Class(class)
            }
            other => other,
        }
    }

    pub fn object() -> Self {
        TypeRef::class(OBJECT_CLASS)
    }

    pub fn string() -> Self {
        TypeRef::class(STRING_CLASS)
    }

    pub fn array_of(component: TypeRef) -> Self {
        TypeRef::Array(Box::new(component))
    }

    pub fn placeholder(name: impl Into<String>) -> Self {
        TypeRef::Placeholder {
            name: name.into(),
            erasure: Box::new(TypeRef::object()),
        }
    }

    pub fn alias(name: impl Into<String>, target: TypeRef) -> Self {
        TypeRef::Alias {
            name: name.into(),
            target: Box::new(target),
        }
    }

    pub fn wrapper(kind: PrimitiveKind) -> Self {
        TypeRef::class(kind.wrapper_class())
    }

    /// Follows alias indirections to the type they stand for.
    pub fn redirect(&self) -> &TypeRef {
        let mut current = self;
        while let TypeRef::Alias { target, .. } = current {
            current = target;
        }
        current
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.redirect() {
            TypeRef::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive_kind().is_some()
    }

    pub fn is_void(&self) -> bool {
        self.primitive_kind() == Some(PrimitiveKind::Void)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.redirect(), TypeRef::Array(_))
    }

    pub fn component(&self) -> Option<&TypeRef> {
        match self.redirect() {
            TypeRef::Array(component) => Some(component),
            _ => None,
        }
    }

    pub fn is_primitive_array(&self) -> bool {
        self.component().is_some_and(TypeRef::is_primitive)
    }

    /// Dotted class name of a class type, or of a placeholder's erasure.
    pub fn class_name(&self) -> Option<&str> {
        match self.redirect() {
            TypeRef::Class(class) => Some(&class.name),
            TypeRef::Placeholder { erasure, .. } => erasure.class_name(),
            _ => None,
        }
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.class_name() == Some(name)
    }

    pub fn is_object(&self) -> bool {
        self.is_class(OBJECT_CLASS)
    }

    pub fn class_kind(&self) -> Option<ClassKind> {
        match self.redirect() {
            TypeRef::Class(class) => Some(class.kind),
            TypeRef::Placeholder { erasure, .. } => erasure.class_kind(),
            _ => None,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.class_kind() == Some(ClassKind::Interface)
    }

    pub fn is_enum(&self) -> bool {
        self.class_kind() == Some(ClassKind::Enum)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.redirect(), TypeRef::Placeholder { .. })
    }

    pub fn generics(&self) -> Option<&[GenericBinding]> {
        match self.redirect() {
            TypeRef::Class(class) => class.generics.as_deref(),
            _ => None,
        }
    }

    /// Primitive kind a wrapper type unboxes to.
    pub fn unwrapped_kind(&self) -> Option<PrimitiveKind> {
        self.class_name().and_then(PrimitiveKind::from_wrapper)
    }

    /// Whether the type mentions generics anywhere a signature would show it.
    pub fn uses_generics(&self) -> bool {
        match self.redirect() {
            TypeRef::Array(component) => component.uses_generics(),
            TypeRef::Class(class) => class.generics.is_some(),
            TypeRef::Placeholder { .. } => true,
            _ => false,
        }
    }

    /// The type with generics and placeholders removed.
    pub fn erasure(&self) -> TypeRef {
        match self.redirect() {
            TypeRef::Class(class) => TypeRef::Class(ClassType {
                name: class.name.clone(),
                generics: None,
                kind: class.kind,
            }),
            TypeRef::Array(component) => TypeRef::array_of(component.erasure()),
            TypeRef::Placeholder { erasure, .. } => erasure.erasure(),
            other => other.clone(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(kind) => write!(f, "{}", kind.name()),
            TypeRef::Class(class) => {
                write!(f, "{}", class.name)?;
                if let Some(generics) = &class.generics {
                    let args: Vec<String> = generics.iter().map(|g| g.to_string()).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                Ok(())
            }
            TypeRef::Array(component) => write!(f, "{}[]", component),
            TypeRef::Placeholder { name, .. } => write!(f, "{}", name),
            TypeRef::Alias { target, .. } => write!(f, "{}", target),
            TypeRef::Union(members) => {
                let names: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "({})", names.join(" & "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Bounds {
    None,
    Upper(Vec<TypeRef>),
    Lower(Box<TypeRef>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Concrete,
    Placeholder,
    Wildcard,
}

/// A type parameter declaration or a type argument.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericBinding {
    pub name: String,
    pub ty: TypeRef,
    pub bounds: Bounds,
    pub kind: BindingKind,
}

impl GenericBinding {
    /// A concrete type argument, as in `List<String>`.
    pub fn concrete(ty: TypeRef) -> Self {
        GenericBinding {
            name: ty.to_string(),
            ty,
            bounds: Bounds::None,
            kind: BindingKind::Concrete,
        }
    }

    /// A type variable, either declared (`<T extends Number>`) or used as an argument.
    pub fn placeholder(name: impl Into<String>, upper: Vec<TypeRef>) -> Self {
        let name = name.into();
        let erasure = upper.first().map(TypeRef::erasure).unwrap_or_else(TypeRef::object);
        GenericBinding {
            ty: TypeRef::Placeholder {
                name: name.clone(),
                erasure: Box::new(erasure),
            },
            name,
            bounds: upper_bounds(upper),
            kind: BindingKind::Placeholder,
        }
    }

    pub fn wildcard() -> Self {
        GenericBinding {
            name: "?".to_string(),
            ty: TypeRef::object(),
            bounds: Bounds::None,
            kind: BindingKind::Wildcard,
        }
    }

    pub fn wildcard_extends(upper: Vec<TypeRef>) -> Self {
        GenericBinding {
            bounds: upper_bounds(upper),
            ..GenericBinding::wildcard()
        }
    }

    pub fn wildcard_super(lower: TypeRef) -> Self {
        GenericBinding {
            bounds: Bounds::Lower(Box::new(lower)),
            ..GenericBinding::wildcard()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == BindingKind::Placeholder
    }

    pub fn is_wildcard(&self) -> bool {
        self.kind == BindingKind::Wildcard
    }
}

fn upper_bounds(upper: Vec<TypeRef>) -> Bounds {
    if upper.is_empty() {
        Bounds::None
    } else {
        Bounds::Upper(upper)
    }
}

impl fmt::Display for GenericBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.bounds) {
            (BindingKind::Concrete, _) => write!(f, "{}", self.ty),
            (BindingKind::Wildcard, Bounds::None) => write!(f, "?"),
            (_, Bounds::None) => write!(f, "{}", self.name),
            (_, Bounds::Upper(bounds)) => {
                let names: Vec<String> = bounds.iter().map(|b| b.to_string()).collect();
                write!(f, "{} extends {}", self.name, names.join(" & "))
            }
            (_, Bounds::Lower(bound)) => write!(f, "{} super {}", self.name, bound),
        }
    }
}

/// Formal parameter types plus return type of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
}

impl MethodDescriptor {
    pub fn new(params: Vec<TypeRef>, ret: TypeRef) -> Self {
        MethodDescriptor { params, ret }
    }

    /// Local slots taken by the parameters.
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(slot_size).sum()
    }
}

/// Slots a value of `ty` occupies (0 for void, 2 for long/double, else 1).
pub fn slot_size(ty: &TypeRef) -> u16 {
    ty.primitive_kind().map_or(1, PrimitiveKind::slot_size)
}
