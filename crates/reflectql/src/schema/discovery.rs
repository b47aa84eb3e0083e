//! Object graph discovery.
//!
//! Before any schema type is constructed, the discoverer walks every bound
//! method of every root and custom object and collects the complete,
//! transitive set of struct types needed as outputs and as inputs. The walk
//! uses a work queue and stops at a fixed point; a type is queued only if it
//! has not been discovered yet, which keeps cycles finite.

use std::collections::VecDeque;

use indexmap::IndexMap;
use tracing::{debug, info, trace};

use crate::resolvers::handler::Signature;
use crate::types::{ScalarTable, StructDescriptor, TypeDescriptor, TypeKey};

/// Where a discovered type is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Output,
    Input,
}

/// Result of a discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Struct types used as outputs, in discovery order.
    pub outputs: IndexMap<TypeKey, StructDescriptor>,
    /// Struct types used as inputs, in discovery order.
    pub inputs: IndexMap<TypeKey, StructDescriptor>,
}

impl Discovery {
    /// Returns whether `key` was discovered as an output.
    #[must_use]
    pub fn has_output(&self, key: TypeKey) -> bool {
        self.outputs.contains_key(&key)
    }

    /// Returns whether `key` was discovered as an input.
    #[must_use]
    pub fn has_input(&self, key: TypeKey) -> bool {
        self.inputs.contains_key(&key)
    }
}

/// Collects output and input struct types reachable from bound methods.
#[derive(Debug)]
pub struct ObjectGraphDiscoverer<'a> {
    scalars: &'a ScalarTable,
    discovery: Discovery,
    pending: VecDeque<(Position, StructDescriptor)>,
}

impl<'a> ObjectGraphDiscoverer<'a> {
    /// Creates a discoverer. Structs named in `scalars` are treated as leaves.
    #[must_use]
    pub fn new(scalars: &'a ScalarTable) -> Self {
        Self {
            scalars,
            discovery: Discovery::default(),
            pending: VecDeque::new(),
        }
    }

    /// Adds a custom object prototype. Prototypes are always outputs.
    pub fn add_prototype(&mut self, prototype: &StructDescriptor) {
        self.queue_if_needed(Position::Output, prototype);
    }

    /// Adds the types of a bound method.
    ///
    /// The result type is an output. The argument struct is flattened into
    /// field arguments, so only the types of its fields become inputs.
    pub fn add_signature(&mut self, signature: &Signature) {
        if let Some(output) = signature.output.actual().as_struct() {
            self.queue_if_needed(Position::Output, output);
        }
        if let Some(receiver) = signature.receiver.as_ref().and_then(|r| r.actual().as_struct()) {
            self.queue_if_needed(Position::Output, receiver);
        }
        if let Some(args) = signature.args.as_ref().and_then(TypeDescriptor::as_struct) {
            for field in args.fields() {
                if let Some(input) = field.ty().actual().as_struct() {
                    self.queue_if_needed(Position::Input, input);
                }
            }
        }
    }

    /// Runs the queue to a fixed point.
    #[must_use]
    pub fn finish(mut self) -> Discovery {
        debug!(queued = self.pending.len(), "Starting object graph discovery");

        while let Some((position, current)) = self.pending.pop_front() {
            trace!(type_name = current.path(), ?position, "Walking struct fields");
            for field in current.fields() {
                if let Some(nested) = field.ty().actual().as_struct() {
                    self.queue_if_needed(position, nested);
                }
            }
        }

        info!(
            inputs = self.discovery.inputs.len(),
            outputs = self.discovery.outputs.len(),
            "Found {} inputs and {} outputs",
            self.discovery.inputs.len(),
            self.discovery.outputs.len()
        );
        self.discovery
    }

    fn queue_if_needed(&mut self, position: Position, ty: &StructDescriptor) {
        if self.scalars.contains(ty.name()) {
            return;
        }
        let set = match position {
            Position::Output => &mut self.discovery.outputs,
            Position::Input => &mut self.discovery.inputs,
        };
        if set.contains_key(&ty.key()) {
            return;
        }
        set.insert(ty.key(), *ty);
        self.pending.push_back((position, *ty));
    }
}
