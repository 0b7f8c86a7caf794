/// Compartments — isolated globals and lexical records over one realm.
///
/// A compartment owns its `globalThis` and a heap-resident lexical record
/// (a `Scope`-class object whose properties are the lexical bindings, with
/// the `writable` attribute modeling const-ness). Intrinsics are shared by
/// reference with every other compartment; lockdown is the only defense
/// against cross-compartment prototype pollution.
///
/// Script scope chains bottom out at the lexical record, so `let`/`const`
/// declared at the top level of one `evaluate` call are visible to the
/// next, while `var` and function declarations land on `globalThis`.
use crate::atom::well_known;
use crate::context::Context;
use crate::errors::JsError;
use crate::heap::Ref;
use crate::object::{JsClass, PropKind, Property};
use crate::parser::Parser;
use crate::value::Value;

pub struct Compartment {
    pub global: Ref,
    pub lexicals: Ref,
    /// Whether the compartment was created with at least one lexical
    /// binding; decides the top-level `this` (globalThis vs null).
    pub has_lexicals: bool,
    /// Creating compartment, if any. Informational.
    pub parent: Option<usize>,
}

impl Context {
    /// Create a compartment from a script-side options bag (`undefined`
    /// for none). Recognized keys: `globals`, `globalLexicals`; everything
    /// else is ignored.
    pub fn new_compartment(
        &mut self,
        options: Value,
        parent: Option<usize>,
    ) -> Result<usize, JsError> {
        let base = self.heap.root_len();
        let oi = self.heap.root_push(options);

        let global = self.alloc_object(JsClass::Ordinary)?;
        let gi = self.heap.root_push(global);
        let lexicals = self.alloc_object_with_proto(JsClass::Scope, None)?;
        let li = self.heap.root_push(lexicals);

        crate::intrinsics::setup_global(self, gi)?;

        let mut has_lexicals = false;
        let options = self.heap.root_get(oi);
        if options.is_object(&self.heap) {
            self.copy_option_globals(oi, gi)?;
            has_lexicals = self.copy_option_lexicals(oi, li)?;
        }

        let global = self.heap.root_get(gi).as_ref();
        let lexicals = self.heap.root_get(li).as_ref();
        self.heap.root_truncate(base);

        self.compartments.push(Compartment {
            global,
            lexicals,
            has_lexicals,
            parent,
        });
        Ok(self.compartments.len() - 1)
    }

    /// `globals`: each own enumerable string-keyed property becomes a
    /// writable, enumerable, configurable data property on the new global.
    fn copy_option_globals(&mut self, oi: usize, gi: usize) -> Result<(), JsError> {
        let options = self.heap.root_get(oi);
        let source = self.get_prop(options, well_known::GLOBALS)?;
        if !source.is_object(&self.heap) {
            return Ok(());
        }
        let si = self.heap.root_push(source);
        let keys = self.own_enumerable_keys(source.as_ref());
        for key in keys {
            let source = self.heap.root_get(si);
            let value = self.get_prop(source, key)?;
            let global = self.heap.root_get(gi);
            self.heap
                .define_property(&self.atoms, global.as_ref(), key, Property::field(value))?;
        }
        self.heap.root_pop();
        Ok(())
    }

    /// `globalLexicals`: same enumeration, but entries become lexical
    /// bindings. A non-writable source descriptor yields an immutable
    /// binding.
    fn copy_option_lexicals(&mut self, oi: usize, li: usize) -> Result<bool, JsError> {
        let options = self.heap.root_get(oi);
        let source = self.get_prop(options, well_known::GLOBAL_LEXICALS)?;
        if !source.is_object(&self.heap) {
            return Ok(false);
        }
        let si = self.heap.root_push(source);
        let keys = self.own_enumerable_keys(source.as_ref());
        let mut any = false;
        for key in keys {
            let source = self.heap.root_get(si);
            let writable = match self.heap.get_own(source.as_ref(), key) {
                Some(Property {
                    kind: PropKind::Data { writable, .. },
                    ..
                }) => *writable,
                _ => true,
            };
            let value = self.get_prop(source, key)?;
            let lex = self.heap.root_get(li);
            self.heap.define_property(
                &self.atoms,
                lex.as_ref(),
                key,
                Property::data(value, writable, true, true),
            )?;
            any = true;
        }
        self.heap.root_pop();
        Ok(any)
    }

    /// Parse and run a script inside a compartment; returns the completion
    /// value (the last top-level expression statement), or undefined for
    /// declaration-only scripts.
    pub fn eval_in_compartment(&mut self, comp: usize, source: &str) -> Result<Value, JsError> {
        let stmts = Parser::new(source, &mut self.atoms)?.parse()?;

        let lexicals = self.compartments[comp].lexicals;
        let scope = self.alloc_object_with_proto(JsClass::Scope, Some(lexicals))?;
        let si = self.heap.root_push(scope);

        // Top-level `this` mirrors the reference behavior: globalThis when
        // the compartment carries lexical bindings, null otherwise.
        let this_v = if self.compartments[comp].has_lexicals {
            Value::from_ref(self.compartments[comp].global)
        } else {
            Value::null()
        };
        let scope = self.heap.root_get(si);
        self.heap.define_property(
            &self.atoms,
            scope.as_ref(),
            well_known::THIS,
            Property::data(this_v, false, false, false),
        )?;

        let saved = self.current_compartment;
        self.current_compartment = comp;
        let result = self.exec_script(comp, si, &stmts);
        self.current_compartment = saved;
        self.heap.root_truncate(si);
        result
    }
}
