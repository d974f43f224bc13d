//! User function calls.

use std::rc::Rc;

use hbl_formula::{EvalError, Value, VarId};
use hbl_ir::{FunctionClass, ParameterKind};

use crate::{ExecError, Session};

impl Session {
    /// Call the function in registry `slot`.
    ///
    /// Parameters are bound to their (qualified) variables for the duration
    /// of the call and restored afterwards. An `lfunction` additionally
    /// stashes every variable of its private namespace so recursive calls
    /// see fresh locals. By-reference parameters copy their final value
    /// into the caller's variable once the scope is restored.
    pub(crate) fn call(
        &mut self,
        slot: usize,
        args: Vec<Value>,
        refs: &[Option<VarId>],
    ) -> Result<Value, ExecError> {
        let Some(entry) = self.registry.get(slot) else {
            return Err(EvalError::StaleFunction(slot).into());
        };
        if args.len() != entry.parameters.len() {
            return Err(ExecError::Arity {
                name: entry.name.clone(),
                expected: entry.parameters.len(),
                found: args.len(),
            });
        }
        if self.depth >= self.config.max_call_depth {
            return Err(ExecError::CallDepth(self.config.max_call_depth));
        }

        let body = Rc::clone(&entry.body);
        let parameters = entry.parameters.clone();
        let kinds = entry.kinds.clone();
        let local_namespace = (entry.class == FunctionClass::Local)
            .then(|| body.namespace().map(str::to_string))
            .flatten();
        tracing::trace!(function = %entry.name, depth = self.depth, "call");

        let stash: Vec<(VarId, Value)> = match &local_namespace {
            Some(ns) => self
                .variables
                .in_namespace(ns)
                .into_iter()
                .map(|id| (id, self.variables.take(id)))
                .collect(),
            None => Vec::new(),
        };

        let ids: Vec<VarId> = parameters.iter().map(|p| self.variables.intern(p)).collect();
        let saved: Vec<Value> = ids.iter().map(|&id| self.variables.take(id)).collect();
        for (&id, value) in ids.iter().zip(args) {
            self.variables.set(id, value);
        }

        let caller = self.call_stack.last();
        body.set_error_mode(caller.map_or(self.config.error_mode, |list| list.error_mode()));
        body.set_input(caller.and_then(|list| list.input()));

        self.depth += 1;
        let outcome = self.execute_list(&body);
        self.depth -= 1;

        let written_back: Vec<(VarId, Value)> = kinds
            .iter()
            .enumerate()
            .filter(|(_, kind)| **kind == ParameterKind::Reference)
            .filter_map(|(i, _)| {
                let target = refs.get(i).copied().flatten()?;
                Some((target, self.variables.get(ids[i]).clone()))
            })
            .collect();

        for (&id, value) in ids.iter().zip(saved) {
            self.variables.set(id, value);
        }
        if let Some(ns) = &local_namespace {
            for id in self.variables.in_namespace(ns) {
                self.variables.set(id, Value::Undefined);
            }
            for (id, value) in stash {
                self.variables.set(id, value);
            }
        }
        for (target, value) in written_back {
            self.variables.set(target, value);
        }

        outcome
    }
}
