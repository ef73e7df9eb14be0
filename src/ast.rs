//! The expression tree handed over by the type checker.
//!
//! Only the node kinds touched by the static compilation rewrite and the
//! expression writer are modelled. Each node carries its source position and
//! an open metadata map filled in by earlier phases.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use std::collections::HashMap;
use std::fmt;

pub mod class;
pub mod types;

pub use class::{
    ClassInfo, ClassNode, ClassTable, MethodNode, Modifiers, Parameter, PropertyNode, TruthMethod,
};
pub use types::{
    BindingKind, Bounds, ClassKind, ClassType, GenericBinding, LIST_CLASS, MAP_CLASS,
    MethodDescriptor, PrimitiveKind, TypeRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
}

impl SourcePosition {
    pub fn at(line: u32, column: u32) -> Self {
        SourcePosition {
            line,
            column,
            end_line: None,
            end_column: None,
        }
    }
}

/// Well-known metadata keys written by the type checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetaKey {
    DirectCallTarget,
    InferredType,
    /// Dotted receiver path (`owner`, `delegate`, `owner.delegate`) of a variable
    /// that actually resolves to a property of an enclosing object.
    ImplicitReceiver,
    BinaryOperatorTarget,
    /// Declaring class of the property an implicit receiver points at.
    PropertyOwner,
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Method(MethodRef),
    Type(TypeRef),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(HashMap<MetaKey, MetaValue>);

impl Metadata {
    pub fn get(&self, key: &MetaKey) -> Option<&MetaValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: MetaKey, value: MetaValue) {
        self.0.insert(key, value);
    }

    pub fn remove(&mut self, key: &MetaKey) -> Option<MetaValue> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &MetaKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every entry of `other`, overwriting existing keys.
    pub fn copy_from(&mut self, other: &Metadata) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn direct_call_target(&self) -> Option<&MethodRef> {
        match self.get(&MetaKey::DirectCallTarget) {
            Some(MetaValue::Method(m)) => Some(m),
            _ => None,
        }
    }

    pub fn binary_operator_target(&self) -> Option<&MethodRef> {
        match self.get(&MetaKey::BinaryOperatorTarget) {
            Some(MetaValue::Method(m)) => Some(m),
            _ => None,
        }
    }

    pub fn inferred_type(&self) -> Option<&TypeRef> {
        match self.get(&MetaKey::InferredType) {
            Some(MetaValue::Type(t)) => Some(t),
            _ => None,
        }
    }

    pub fn property_owner(&self) -> Option<&TypeRef> {
        match self.get(&MetaKey::PropertyOwner) {
            Some(MetaValue::Type(t)) => Some(t),
            _ => None,
        }
    }

    pub fn implicit_receiver(&self) -> Option<&str> {
        match self.get(&MetaKey::ImplicitReceiver) {
            Some(MetaValue::Text(path)) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Interface,
    Static,
    Special,
}

/// A statically resolved method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    /// Dotted name of the declaring class.
    pub owner: String,
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub invoke: InvokeKind,
    /// Generated by the type checker rather than declared in source.
    pub synthetic: bool,
}

impl MethodRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: MethodDescriptor,
        invoke: InvokeKind,
    ) -> Self {
        MethodRef {
            owner: owner.into(),
            name: name.into(),
            descriptor,
            invoke,
            synthetic: false,
        }
    }

    pub fn is_static(&self) -> bool {
        self.invoke == InvokeKind::Static
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    String(String),
    Char(char),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInteger(BigInt),
    BigDecimal(BigDecimal),
    Boolean(bool),
    /// The `java.lang.Void` class marker in a void expression position.
    VoidClass,
    /// A value of a runtime class the loader has no encoding for.
    Opaque { class_name: String, value: String },
}

impl Literal {
    /// Dotted runtime class of the boxed value.
    pub fn class_name(&self) -> &str {
        match self {
            Literal::Null => "null",
            Literal::String(_) => types::STRING_CLASS,
            Literal::Char(_) => PrimitiveKind::Char.wrapper_class(),
            Literal::Byte(_) => PrimitiveKind::Byte.wrapper_class(),
            Literal::Short(_) => PrimitiveKind::Short.wrapper_class(),
            Literal::Int(_) => PrimitiveKind::Int.wrapper_class(),
            Literal::Long(_) => PrimitiveKind::Long.wrapper_class(),
            Literal::Float(_) => PrimitiveKind::Float.wrapper_class(),
            Literal::Double(_) => PrimitiveKind::Double.wrapper_class(),
            Literal::BigInteger(_) => types::BIG_INTEGER_CLASS,
            Literal::BigDecimal(_) => types::BIG_DECIMAL_CLASS,
            Literal::Boolean(_) => PrimitiveKind::Boolean.wrapper_class(),
            Literal::VoidClass => types::CLASS_CLASS,
            Literal::Opaque { class_name, .. } => class_name,
        }
    }

    /// Primitive kind the literal unboxes to, if any.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        PrimitiveKind::from_wrapper(self.class_name())
    }

    pub fn static_type(&self) -> TypeRef {
        match self {
            Literal::Null | Literal::Opaque { .. } => TypeRef::object(),
            Literal::VoidClass => TypeRef::void(),
            other => TypeRef::class(other.class_name()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::String(s) => write!(f, "{}", s),
            Literal::Char(c) => write!(f, "{}", c),
            Literal::Byte(v) => write!(f, "{}", v),
            Literal::Short(v) => write!(f, "{}", v),
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Long(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::Double(v) => write!(f, "{}", v),
            Literal::BigInteger(v) => write!(f, "{}", v),
            Literal::BigDecimal(v) => write!(f, "{}", v),
            Literal::Boolean(v) => write!(f, "{}", v),
            Literal::VoidClass => write!(f, "class java.lang.Void"),
            Literal::Opaque { value, .. } => write!(f, "{}", value),
        }
    }
}

/// A local slot as allocated by the method-body analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: TypeRef,
    pub index: u16,
    /// Captured by a closure and stored inside a `groovy.lang.Reference`.
    pub holder: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: TypeRef, index: u16) -> Self {
        Variable {
            name: name.into(),
            ty,
            index,
            holder: false,
        }
    }

    pub fn holder(name: impl Into<String>, ty: TypeRef, index: u16) -> Self {
        Variable {
            holder: true,
            ..Variable::new(name, ty, index)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Assign,
    PlusAssign,
    MinusAssign,
    MultiplyAssign,
    DivideAssign,
    ModAssign,
    PowerAssign,
    LeftShiftAssign,
    RightShiftAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    Plus,
    Minus,
    Multiply,
    Divide,
    Mod,
    Power,
    LeftShift,
    RightShift,
    BitAnd,
    BitOr,
    BitXor,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    CompareTo,
    LogicalAnd,
    LogicalOr,
    /// Subscript, `a[i]`.
    Index,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::PlusAssign => "+=",
            BinaryOp::MinusAssign => "-=",
            BinaryOp::MultiplyAssign => "*=",
            BinaryOp::DivideAssign => "/=",
            BinaryOp::ModAssign => "%=",
            BinaryOp::PowerAssign => "**=",
            BinaryOp::LeftShiftAssign => "<<=",
            BinaryOp::RightShiftAssign => ">>=",
            BinaryOp::AndAssign => "&=",
            BinaryOp::OrAssign => "|=",
            BinaryOp::XorAssign => "^=",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Power => "**",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanEqual => ">=",
            BinaryOp::CompareTo => "<=>",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Index => "[",
        }
    }

    /// The plain operator a compound assignment applies before storing back.
    pub fn compound_base(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::PlusAssign => BinaryOp::Plus,
            BinaryOp::MinusAssign => BinaryOp::Minus,
            BinaryOp::MultiplyAssign => BinaryOp::Multiply,
            BinaryOp::DivideAssign => BinaryOp::Divide,
            BinaryOp::ModAssign => BinaryOp::Mod,
            BinaryOp::PowerAssign => BinaryOp::Power,
            BinaryOp::LeftShiftAssign => BinaryOp::LeftShift,
            BinaryOp::RightShiftAssign => BinaryOp::RightShift,
            BinaryOp::AndAssign => BinaryOp::BitAnd,
            BinaryOp::OrAssign => BinaryOp::BitOr,
            BinaryOp::XorAssign => BinaryOp::BitXor,
            _ => return None,
        })
    }

    pub fn is_assignment(self) -> bool {
        self == BinaryOp::Assign || self.compound_base().is_some()
    }

    /// Operators producing a `boolean`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanEqual
        )
    }

    /// Runtime method name implementing an arithmetic operator.
    pub fn operator_method(self) -> Option<&'static str> {
        Some(match self {
            BinaryOp::Plus => "plus",
            BinaryOp::Minus => "minus",
            BinaryOp::Multiply => "multiply",
            BinaryOp::Divide => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Power => "power",
            BinaryOp::LeftShift => "leftShift",
            BinaryOp::RightShift => "rightShift",
            BinaryOp::BitAnd => "and",
            BinaryOp::BitOr => "or",
            BinaryOp::BitXor => "xor",
            BinaryOp::Index => "getAt",
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub receiver: Box<Expression>,
    pub name: String,
    pub arguments: Vec<Expression>,
    pub implicit_this: bool,
    /// `?.` navigation.
    pub safe: bool,
    /// Bound target; `None` means the call is dispatched at runtime.
    pub target: Option<MethodRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: Expression,
    pub value: Expression,
}

/// One `name: value` initialiser of a map-style construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInit {
    pub name: String,
    pub value: Expression,
    /// Resolved setter; `None` falls back to a runtime property write.
    pub setter: Option<MethodRef>,
}

/// How a value of a known static type is reduced to a truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruthStrategy {
    /// Value is already a primitive of this kind.
    Primitive(PrimitiveKind),
    /// Value is the wrapper of this kind; unbox null-safely first.
    Boxed(PrimitiveKind),
    /// Inline `value != null`.
    NullCheck,
    /// Call the runtime truth conversion.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(Literal),
    Variable(Variable),
    /// A name the analysis could not bind to a local slot.
    DynamicVariable(String),
    This,
    Property {
        object: Box<Expression>,
        property: String,
        safe: bool,
        implicit_this: bool,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    MethodCall(MethodCall),
    StaticMethodCall {
        owner: TypeRef,
        name: String,
        arguments: Vec<Expression>,
    },
    ConstructorCall {
        ty: TypeRef,
        arguments: Vec<Expression>,
    },
    Closure {
        parameters: Vec<Parameter>,
        body: Vec<Statement>,
    },
    /// A condition position, converted with the language's truth rules.
    Boolean(Box<Expression>),
    Not(Box<Expression>),
    Ternary {
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
    List(Vec<Expression>),
    Map(Vec<MapEntry>),
    ClassRef(TypeRef),
    Cast {
        ty: TypeRef,
        expr: Box<Expression>,
    },
    TruthTest {
        expr: Box<Expression>,
        strategy: TruthStrategy,
    },
    CompareToNull {
        expr: Box<Expression>,
        equal: bool,
    },
    MapStyleConstructor {
        ty: TypeRef,
        entries: Vec<PropertyInit>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub position: SourcePosition,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Return(Option<Expression>),
}

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Expression {
            kind,
            position: SourcePosition::default(),
            metadata: Metadata::default(),
        }
    }

    pub fn at(mut self, position: SourcePosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_meta(mut self, key: MetaKey, value: MetaValue) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_type(self, ty: TypeRef) -> Self {
        self.with_meta(MetaKey::InferredType, MetaValue::Type(ty))
    }

    pub fn constant(literal: Literal) -> Self {
        Expression::new(ExprKind::Constant(literal))
    }

    pub fn null() -> Self {
        Expression::constant(Literal::Null)
    }

    pub fn variable(variable: Variable) -> Self {
        Expression::new(ExprKind::Variable(variable))
    }

    pub fn this() -> Self {
        Expression::new(ExprKind::This)
    }

    pub fn class_ref(ty: TypeRef) -> Self {
        Expression::new(ExprKind::ClassRef(ty))
    }

    pub fn property(object: Expression, property: impl Into<String>) -> Self {
        Expression::new(ExprKind::Property {
            object: Box::new(object),
            property: property.into(),
            safe: false,
            implicit_this: false,
        })
    }

    pub fn binary(left: Expression, op: BinaryOp, right: Expression) -> Self {
        Expression::new(ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn method_call(receiver: Expression, name: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Expression::new(ExprKind::MethodCall(MethodCall {
            receiver: Box::new(receiver),
            name: name.into(),
            arguments,
            implicit_this: false,
            safe: false,
            target: None,
        }))
    }

    pub fn boolean(expr: Expression) -> Self {
        Expression::new(ExprKind::Boolean(Box::new(expr)))
    }

    pub fn not(expr: Expression) -> Self {
        Expression::new(ExprKind::Not(Box::new(expr)))
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(Literal::Null))
    }

    /// Best static type knowledge: the inferred type, else what the node itself implies.
    pub fn static_type(&self) -> Option<TypeRef> {
        if let Some(ty) = self.metadata.inferred_type() {
            return Some(ty.clone());
        }
        match &self.kind {
            ExprKind::Constant(literal) => Some(literal.static_type()),
            ExprKind::Variable(v) => Some(v.ty.clone()),
            ExprKind::MethodCall(call) => call.target.as_ref().map(|m| m.descriptor.ret.clone()),
            ExprKind::ConstructorCall { ty, .. }
            | ExprKind::Cast { ty, .. }
            | ExprKind::MapStyleConstructor { ty, .. } => Some(ty.clone()),
            ExprKind::ClassRef(_) => Some(TypeRef::class(types::CLASS_CLASS)),
            ExprKind::Boolean(_)
            | ExprKind::Not(_)
            | ExprKind::TruthTest { .. }
            | ExprKind::CompareToNull { .. } => Some(TypeRef::boolean()),
            ExprKind::Binary { op, .. } if op.is_comparison() => Some(TypeRef::boolean()),
            ExprKind::List(_) => Some(TypeRef::interface(LIST_CLASS)),
            ExprKind::Map(_) => Some(TypeRef::interface(MAP_CLASS)),
            _ => None,
        }
    }

    /// Highest local slot (exclusive) referenced by variables in this tree.
    /// Closure bodies are compiled separately and not included.
    pub fn max_local_slot(&self) -> u16 {
        let mut max = 0;
        self.visit(&mut |e| {
            if let ExprKind::Variable(v) = &e.kind {
                max = max.max(v.index + types::slot_size(&v.ty).max(1));
            }
        });
        max
    }

    /// Pre-order walk over this node and its children, not entering closures.
    pub fn visit(&self, f: &mut dyn FnMut(&Expression)) {
        f(self);
        match &self.kind {
            ExprKind::Property { object, .. } => object.visit(f),
            ExprKind::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            ExprKind::MethodCall(call) => {
                call.receiver.visit(f);
                call.arguments.iter().for_each(|a| a.visit(f));
            }
            ExprKind::StaticMethodCall { arguments, .. }
            | ExprKind::ConstructorCall { arguments, .. }
            | ExprKind::List(arguments) => arguments.iter().for_each(|a| a.visit(f)),
            ExprKind::Boolean(inner)
            | ExprKind::Not(inner)
            | ExprKind::Cast { expr: inner, .. }
            | ExprKind::TruthTest { expr: inner, .. }
            | ExprKind::CompareToNull { expr: inner, .. } => inner.visit(f),
            ExprKind::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
            ExprKind::Map(entries) => {
                for entry in entries {
                    entry.key.visit(f);
                    entry.value.visit(f);
                }
            }
            ExprKind::MapStyleConstructor { entries, .. } => {
                entries.iter().for_each(|e| e.value.visit(f));
            }
            ExprKind::Constant(_)
            | ExprKind::Variable(_)
            | ExprKind::DynamicVariable(_)
            | ExprKind::This
            | ExprKind::ClassRef(_)
            | ExprKind::Closure { .. } => {}
        }
    }
}

impl Statement {
    pub fn expression(&self) -> Option<&Expression> {
        match self {
            Statement::Expression(e) => Some(e),
            Statement::Return(e) => e.as_ref(),
        }
    }
}
