//! Node classes and the inheritance merge.
//!
//! A class is defined once as a [`ClassDef`] and built into a
//! [`NodeClass`] with every ancestor already merged in. Extending a
//! class re-runs the merge against the parent's built tables, so
//! neither instantiation nor dispatch ever walks the ancestor chain.
//!
//! # Merge Rules
//!
//! | Table | Rule |
//! |-------|------|
//! | `required` | union per pin, deduplicated, parent order first |
//! | `defaults` | layered per pin, definition shadows parent |
//! | handler tables | layered per pin, definition shadows parent |
//! | mode tables | layered per mode and pin |
//! | output schema | definition replaces parent's when present |
//!
//! # Example
//!
//! ```
//! use patchbay_node::{handler, ClassDef, NodeClass, Pin};
//!
//! let base = NodeClass::define(
//!     ClassDef::named("Relay")
//!         .require(Pin::In, "onFire")
//!         .with_default(Pin::In, "onFire", handler(|_, _| Ok(()))),
//! )
//! .expect("base class");
//!
//! let sub = base
//!     .extend(ClassDef::named("LoudRelay"))
//!     .expect("subclass");
//!
//! // The subclass inherits the default, so the contract still holds.
//! assert!(sub.has_handler(Pin::In, "onFire"));
//! assert_eq!(sub.inheritance_chain(), vec!["Relay", "LoudRelay"]);
//! ```

use crate::error::NodeError;
use crate::handler::{Handler, HandlerTable};
use crate::pin::Pin;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Signals a class declares it may emit.
///
/// Advisory only: emission outside the schema is routed normally and
/// logged at debug level. The schema exists so wiring can be written
/// against a stated surface instead of reading handler bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    signals: Vec<String>,
}

impl OutputSchema {
    /// Declares a set of emitted signal names.
    #[must_use]
    pub fn new<I, S>(signals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            signals: signals.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if the signal is declared.
    #[must_use]
    pub fn declares(&self, signal: &str) -> bool {
        self.signals.iter().any(|s| s == signal)
    }

    /// Iterates declared signal names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signals.iter().map(String::as_str)
    }

    /// Number of declared signals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// One class definition, before the inheritance merge.
///
/// Built fluently and consumed by [`NodeClass::define`] or
/// [`NodeClass::extend`].
// NOTE: ClassDef does not implement Default intentionally.
// A definition without a name can never build, so construction
// starts at `named`.
#[derive(Clone)]
pub struct ClassDef {
    name: String,
    domain: Option<String>,
    required: HashMap<Pin, Vec<String>>,
    defaults: HashMap<Pin, HandlerTable>,
    lifecycle: HandlerTable,
    input: HandlerTable,
    output: Option<OutputSchema>,
    mode_pins: BTreeMap<String, HashMap<Pin, HandlerTable>>,
}

impl ClassDef {
    /// Starts a definition with the given class name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: None,
            required: HashMap::new(),
            defaults: HashMap::new(),
            lifecycle: HandlerTable::new(),
            input: HandlerTable::new(),
            output: None,
            mode_pins: BTreeMap::new(),
        }
    }

    /// Tags the class with an informational domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Declares that a handler name must be resolvable on the built
    /// class for registration to succeed.
    #[must_use]
    pub fn require(mut self, pin: Pin, name: impl Into<String>) -> Self {
        self.required.entry(pin).or_default().push(name.into());
        self
    }

    /// Registers a default handler, used when neither this class nor a
    /// subclass supplies its own under the same name.
    #[must_use]
    pub fn with_default(mut self, pin: Pin, name: impl Into<String>, handler: Handler) -> Self {
        self.defaults
            .entry(pin)
            .or_insert_with(HandlerTable::new)
            .insert(name, handler);
        self
    }

    /// Registers a lifecycle pin handler.
    #[must_use]
    pub fn on_lifecycle(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.lifecycle.insert(name, handler);
        self
    }

    /// Registers an input pin handler.
    #[must_use]
    pub fn on_input(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.input.insert(name, handler);
        self
    }

    /// Declares the signals this class emits.
    #[must_use]
    pub fn with_output(mut self, schema: OutputSchema) -> Self {
        self.output = Some(schema);
        self
    }

    /// Registers a handler that applies only while the named mode is
    /// active, shadowing the unmoded table for that pin.
    #[must_use]
    pub fn mode_handler(
        mut self,
        mode: impl Into<String>,
        pin: Pin,
        name: impl Into<String>,
        handler: Handler,
    ) -> Self {
        self.mode_pins
            .entry(mode.into())
            .or_default()
            .entry(pin)
            .or_insert_with(HandlerTable::new)
            .insert(name, handler);
        self
    }

    /// The class name this definition will build as.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("lifecycle", &self.lifecycle)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

/// A built class: one definition with its full ancestor chain merged.
///
/// Classes are immutable and shared via `Arc`; instances hold a
/// reference and deep-copy only the tables they may change.
// NOTE: NodeClass does not implement Clone intentionally. It is shared
// via Arc, and extend() is the only way to derive a new class.
#[derive(Debug)]
pub struct NodeClass {
    name: String,
    domain: Option<String>,
    parent: Option<Arc<NodeClass>>,
    required: HashMap<Pin, Vec<String>>,
    defaults: HashMap<Pin, HandlerTable>,
    lifecycle: HandlerTable,
    input: HandlerTable,
    output: Option<OutputSchema>,
    mode_pins: BTreeMap<String, HashMap<Pin, HandlerTable>>,
}

impl NodeClass {
    /// Builds a root class from a definition.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::MissingClassName`] if the definition's name
    /// is empty.
    pub fn define(def: ClassDef) -> Result<Arc<Self>, NodeError> {
        Self::build(None, def)
    }

    /// Builds a subclass, merging this class's tables under the
    /// definition's own.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::MissingClassName`] if the definition's name
    /// is empty.
    pub fn extend(self: &Arc<Self>, def: ClassDef) -> Result<Arc<Self>, NodeError> {
        Self::build(Some(Arc::clone(self)), def)
    }

    fn build(parent: Option<Arc<Self>>, def: ClassDef) -> Result<Arc<Self>, NodeError> {
        if def.name.is_empty() {
            return Err(NodeError::MissingClassName);
        }

        let (mut required, mut defaults, lifecycle, input, mut output, mut mode_pins) =
            match &parent {
                Some(p) => (
                    p.required.clone(),
                    p.defaults.clone(),
                    p.lifecycle.clone(),
                    p.input.clone(),
                    p.output.clone(),
                    p.mode_pins.clone(),
                ),
                None => (
                    HashMap::new(),
                    HashMap::new(),
                    HandlerTable::new(),
                    HandlerTable::new(),
                    None,
                    BTreeMap::new(),
                ),
            };

        for (pin, names) in def.required {
            let merged = required.entry(pin).or_default();
            for name in names {
                if !merged.contains(&name) {
                    merged.push(name);
                }
            }
        }
        for (pin, table) in def.defaults {
            let merged = defaults.entry(pin).or_insert_with(HandlerTable::new);
            *merged = HandlerTable::layered(merged, &table);
        }
        let lifecycle = HandlerTable::layered(&lifecycle, &def.lifecycle);
        let input = HandlerTable::layered(&input, &def.input);
        if def.output.is_some() {
            output = def.output;
        }
        for (mode, pins) in def.mode_pins {
            let merged_mode = mode_pins.entry(mode).or_default();
            for (pin, table) in pins {
                let merged = merged_mode.entry(pin).or_insert_with(HandlerTable::new);
                *merged = HandlerTable::layered(merged, &table);
            }
        }

        Ok(Arc::new(Self {
            name: def.name,
            domain: def.domain,
            parent,
            required,
            defaults,
            lifecycle,
            input,
            output,
            mode_pins,
        }))
    }

    /// The class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The informational domain tag, if any.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// The parent class, if this is not a root.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<NodeClass>> {
        self.parent.as_ref()
    }

    /// Ancestor names oldest-first, ending with this class.
    #[must_use]
    pub fn inheritance_chain(&self) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut cursor = Some(self);
        while let Some(class) = cursor {
            chain.push(class.name.as_str());
            cursor = class.parent.as_deref();
        }
        chain.reverse();
        chain
    }

    /// Returns `true` if the name is registered on the pin, either as
    /// an own handler or as a default.
    ///
    /// Ancestor tables are already merged in, so this is a flat check.
    #[must_use]
    pub fn has_handler(&self, pin: Pin, name: &str) -> bool {
        self.handlers(pin).contains(name)
            || self
                .defaults
                .get(&pin)
                .map_or(false, |table| table.contains(name))
    }

    /// Required handler names for one pin, parent declarations first.
    #[must_use]
    pub fn required(&self, pin: Pin) -> &[String] {
        self.required.get(&pin).map_or(&[], Vec::as_slice)
    }

    /// Required handler names that no own or default handler satisfies.
    ///
    /// An empty result means the class passes contract validation.
    #[must_use]
    pub fn unresolved(&self) -> Vec<(Pin, String)> {
        let mut missing = Vec::new();
        let mut pins: Vec<&Pin> = self.required.keys().collect();
        pins.sort_unstable();
        for pin in pins {
            for name in &self.required[pin] {
                if !self.has_handler(*pin, name) {
                    missing.push((*pin, name.clone()));
                }
            }
        }
        missing
    }

    /// The merged own handler table for one pin.
    #[must_use]
    pub fn handlers(&self, pin: Pin) -> &HandlerTable {
        match pin {
            Pin::Lifecycle => &self.lifecycle,
            Pin::In => &self.input,
        }
    }

    /// The merged default table for one pin, if any defaults exist.
    #[must_use]
    pub fn defaults(&self, pin: Pin) -> Option<&HandlerTable> {
        self.defaults.get(&pin)
    }

    /// The declared output schema, if any.
    #[must_use]
    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.output.as_ref()
    }

    /// Mode-specific pin tables, keyed by mode name.
    #[must_use]
    pub fn mode_pins(&self) -> &BTreeMap<String, HashMap<Pin, HandlerTable>> {
        &self.mode_pins
    }

    /// The table an instance starts with for one pin: defaults layered
    /// under the class's own handlers.
    #[must_use]
    pub fn instance_table(&self, pin: Pin) -> HandlerTable {
        match self.defaults.get(&pin) {
            Some(defaults) => HandlerTable::layered(defaults, self.handlers(pin)),
            None => self.handlers(pin).clone(),
        }
    }
}
