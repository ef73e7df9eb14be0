//! Class-level declarations and the per-compilation class table.

use super::types::{ClassKind, GenericBinding, MethodDescriptor, OBJECT_CLASS, TypeRef};
use super::{Expression, Statement};
use std::collections::HashMap;

/// Modifier bits, using the same values as the class-file access flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers(pub u16);

impl Modifiers {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const NATIVE: u16 = 0x0100;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;

    pub fn public() -> Self {
        Modifiers(Self::PUBLIC)
    }

    pub fn with(self, bits: u16) -> Self {
        Modifiers(self.0 | bits)
    }

    pub fn has(self, bits: u16) -> bool {
        self.0 & bits == bits
    }

    pub fn is_final(self) -> bool {
        self.has(Self::FINAL)
    }

    pub fn is_private(self) -> bool {
        self.has(Self::PRIVATE)
    }

    pub fn is_static(self) -> bool {
        self.has(Self::STATIC)
    }

    pub fn is_abstract(self) -> bool {
        self.has(Self::ABSTRACT)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
    pub default_value: Option<Expression>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Parameter {
            name: name.into(),
            ty,
            default_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub name: String,
    pub modifiers: Modifiers,
    pub generics: Option<Vec<GenericBinding>>,
    pub parameters: Vec<Parameter>,
    pub return_type: TypeRef,
    pub body: Vec<Statement>,
}

impl MethodNode {
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>, return_type: TypeRef) -> Self {
        MethodNode {
            name: name.into(),
            modifiers: Modifiers::public(),
            generics: None,
            parameters,
            return_type,
            body: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> MethodDescriptor {
        MethodDescriptor::new(
            self.parameters.iter().map(|p| p.ty.clone()).collect(),
            self.return_type.clone(),
        )
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    /// Abstract and native methods carry no code.
    pub fn has_code(&self) -> bool {
        !self.modifiers.is_abstract() && !self.modifiers.has(Modifiers::NATIVE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyNode {
    pub name: String,
    pub ty: TypeRef,
    pub modifiers: Modifiers,
}

impl PropertyNode {
    pub fn getter_name(&self) -> String {
        accessor_name("get", &self.name)
    }

    pub fn setter_name(&self) -> String {
        accessor_name("set", &self.name)
    }
}

fn accessor_name(prefix: &str, property: &str) -> String {
    let mut chars = property.chars();
    match chars.next() {
        Some(first) => format!("{}{}{}", prefix, first.to_uppercase(), chars.as_str()),
        None => prefix.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassNode {
    /// Dotted binary name.
    pub name: String,
    pub modifiers: Modifiers,
    pub kind: ClassKind,
    pub generics: Option<Vec<GenericBinding>>,
    pub superclass: TypeRef,
    pub interfaces: Vec<TypeRef>,
    /// Enclosing class for inner classes.
    pub outer: Option<String>,
    pub properties: Vec<PropertyNode>,
    pub methods: Vec<MethodNode>,
}

impl ClassNode {
    pub fn new(name: impl Into<String>) -> Self {
        ClassNode {
            name: name.into(),
            modifiers: Modifiers::public(),
            kind: ClassKind::Class,
            generics: None,
            superclass: TypeRef::object(),
            interfaces: Vec::new(),
            outer: None,
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn as_type(&self) -> TypeRef {
        match self.kind {
            ClassKind::Class => TypeRef::class(&self.name),
            ClassKind::Interface => TypeRef::interface(&self.name),
            ClassKind::Enum => TypeRef::enumeration(&self.name),
        }
    }
}

/// Declaration summary of a class visible to the compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub name: String,
    pub modifiers: Modifiers,
    pub kind: ClassKind,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub outer: Option<String>,
    pub methods: Vec<(String, MethodDescriptor)>,
    pub properties: Vec<PropertyNode>,
}

impl ClassInfo {
    pub fn from_node(node: &ClassNode) -> Self {
        ClassInfo {
            name: node.name.clone(),
            modifiers: node.modifiers,
            kind: node.kind,
            superclass: node.superclass.class_name().map(str::to_string),
            interfaces: node
                .interfaces
                .iter()
                .filter_map(|i| i.class_name().map(str::to_string))
                .collect(),
            outer: node.outer.clone(),
            methods: node
                .methods
                .iter()
                .map(|m| (m.name.clone(), m.descriptor()))
                .collect(),
            properties: node.properties.clone(),
        }
    }

    fn declares_method(&self, name: &str, arity: usize) -> bool {
        self.methods
            .iter()
            .any(|(n, desc)| n == name && desc.params.len() == arity)
    }
}

/// Where an `asBoolean()` candidate comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TruthMethod {
    /// Declared on a class (or one of its superclasses) in the table.
    Declared(String),
    /// Extension method whose receiver is the named class.
    Extension(String),
}

/// Receivers of the runtime's built-in `asBoolean` extension methods.
const ASBOOLEAN_EXTENSIONS: &[&str] = &[
    OBJECT_CLASS,
    "java.lang.Boolean",
    "java.lang.Character",
    "java.lang.Number",
    "java.lang.CharSequence",
    "java.util.Collection",
    "java.util.Map",
    "java.util.Iterator",
    "java.util.Enumeration",
    "java.util.regex.Matcher",
];

/// Classes known to the current compilation run.
#[derive(Debug, Clone)]
pub struct ClassTable {
    classes: HashMap<String, ClassInfo>,
    truth_extensions: Vec<String>,
}

impl Default for ClassTable {
    fn default() -> Self {
        ClassTable::new()
    }
}

impl ClassTable {
    pub fn new() -> Self {
        ClassTable {
            classes: HashMap::new(),
            truth_extensions: ASBOOLEAN_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_classes<'a>(nodes: impl IntoIterator<Item = &'a ClassNode>) -> Self {
        let mut table = ClassTable::new();
        for node in nodes {
            table.register(ClassInfo::from_node(node));
        }
        table
    }

    pub fn register(&mut self, info: ClassInfo) {
        self.classes.insert(info.name.clone(), info);
    }

    /// Registers an extra `asBoolean` extension method for `receiver`.
    pub fn register_truth_extension(&mut self, receiver: impl Into<String>) {
        self.truth_extensions.push(receiver.into());
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Superclass chain of `name`, starting with `name` itself.
    pub fn superclasses<'a>(&'a self, name: &'a str) -> Vec<&'a str> {
        let mut chain = vec![name];
        let mut current = name;
        while let Some(parent) = self.get(current).and_then(|c| c.superclass.as_deref()) {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        if !chain.contains(&OBJECT_CLASS) {
            chain.push(OBJECT_CLASS);
        }
        chain
    }

    /// Distance from `name` to `target` in the type hierarchy, if assignable.
    /// `Object` is always the farthest ancestor of anything but itself.
    pub fn distance(&self, name: &str, target: &str) -> Option<usize> {
        if target == OBJECT_CLASS {
            return Some(if name == OBJECT_CLASS { 0 } else { usize::MAX });
        }
        let mut best: Option<usize> = None;
        let mut frontier = vec![(name.to_string(), 0usize)];
        let mut seen: Vec<String> = Vec::new();
        while let Some((current, depth)) = frontier.pop() {
            if current == target {
                best = Some(best.map_or(depth, |b| b.min(depth)));
                continue;
            }
            if seen.contains(&current) {
                continue;
            }
            seen.push(current.clone());
            match self.get(&current) {
                Some(info) => {
                    if let Some(parent) = &info.superclass {
                        frontier.push((parent.clone(), depth + 1));
                    }
                    for interface in &info.interfaces {
                        frontier.push((interface.clone(), depth + 1));
                    }
                }
                None if current != OBJECT_CLASS => {
                    frontier.push((OBJECT_CLASS.to_string(), depth + 1));
                }
                None => {}
            }
        }
        best
    }

    /// The most specific zero-argument `asBoolean` methods applicable to `name`.
    pub fn truth_methods(&self, name: &str) -> Vec<TruthMethod> {
        for class in self.superclasses(name) {
            if self.get(class).is_some_and(|c| c.declares_method("asBoolean", 0)) {
                return vec![TruthMethod::Declared(class.to_string())];
            }
        }
        let candidates: Vec<(usize, &String)> = self
            .truth_extensions
            .iter()
            .filter_map(|receiver| self.distance(name, receiver).map(|d| (d, receiver)))
            .collect();
        let Some(closest) = candidates.iter().map(|(d, _)| *d).min() else {
            return Vec::new();
        };
        candidates
            .into_iter()
            .filter(|(d, _)| *d == closest)
            .map(|(_, receiver)| TruthMethod::Extension(receiver.clone()))
            .collect()
    }

    /// Whether every superclass and interface reachable from `name` is in the
    /// table (`Object` excepted), so no unseen supertype can supply behaviour.
    pub fn is_hierarchy_resolved(&self, name: &str) -> bool {
        let mut pending = vec![name];
        let mut seen: Vec<&str> = Vec::new();
        while let Some(current) = pending.pop() {
            if current == OBJECT_CLASS || seen.contains(&current) {
                continue;
            }
            seen.push(current);
            let Some(info) = self.get(current) else {
                return false;
            };
            pending.extend(info.superclass.as_deref());
            pending.extend(info.interfaces.iter().map(String::as_str));
        }
        true
    }

    /// Whether another inner class of the same outer class extends `name`.
    pub fn is_extended_within_outer(&self, name: &str) -> bool {
        let Some(outer) = self.get(name).and_then(|c| c.outer.as_deref()) else {
            return false;
        };
        self.classes.values().any(|c| {
            c.outer.as_deref() == Some(outer) && c.superclass.as_deref() == Some(name)
        })
    }

    /// Finds a declared property on `name` or its superclasses.
    pub fn find_property(&self, name: &str, property: &str) -> Option<(&str, &PropertyNode)> {
        self.superclasses(name).into_iter().find_map(|class| {
            self.get(class).and_then(|info| {
                info.properties
                    .iter()
                    .find(|p| p.name == property)
                    .map(|p| (info.name.as_str(), p))
            })
        })
    }

    pub fn declares_constructor(&self, name: &str, descriptor: &MethodDescriptor) -> bool {
        self.get(name).is_some_and(|info| {
            info.methods
                .iter()
                .any(|(n, desc)| n == "<init>" && desc.params == descriptor.params)
        })
    }
}
