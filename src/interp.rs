/// Tree-walking evaluator.
///
/// ARCHITECTURE:
///   Scope records        — environment frames are heap objects of class
///                          Scope; bindings are properties (the `writable`
///                          attribute models const). The chain runs through
///                          the prototype link and bottoms out at the
///                          compartment's lexical record. `var` and
///                          top-level function declarations go to the
///                          compartment's global object instead.
///   Frames               — a frame carries the compartment id, the ROOT
///                          STACK INDEX of its scope record (never a bare
///                          `Ref`), and whether it is the script top level.
///   Rooting discipline   — every value held across a potentially
///                          allocating step is parked on the heap's root
///                          stack and re-read afterwards. Evaluating any
///                          expression may allocate, so binary operands,
///                          receivers, callees and argument lists are all
///                          rooted before the next sub-evaluation runs.
///
/// Declarations are hoisted the way the runtime entry points do it: one
/// pass defining function declarations, then sequential execution.
use crate::ast::{BinOp, DeclKind, Expr, FuncLit, LogicalOp, Stmt, UnaryOp};
use crate::atom::{well_known, Atom};
use crate::context::Context;
use crate::errors::JsError;
use crate::heap::Slot;
use crate::object::{Extra, FnKind, JsClass, JsObject, PropKind, Property, ScriptFn};
use crate::value::Value;

#[derive(Clone, Copy)]
pub(crate) struct Frame {
    comp: usize,
    /// Root-stack index of the current scope record.
    scope: usize,
    /// Top level of an `evaluate` call: declarations target the
    /// compartment (lexical record / global) instead of the local scope.
    top: bool,
}

pub(crate) enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

impl Context {
    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Run a parsed script. `scope_idx` roots the fresh script scope.
    pub(crate) fn exec_script(
        &mut self,
        comp: usize,
        scope_idx: usize,
        stmts: &[Stmt],
    ) -> Result<Value, JsError> {
        let f = Frame {
            comp,
            scope: scope_idx,
            top: true,
        };
        let completion = self.heap.root_push(Value::undefined());

        self.hoist_functions(&f, stmts)?;
        let mut out = Ok(());
        for stmt in stmts {
            if let Stmt::Expr(e) = stmt {
                match self.eval_expr(&f, e) {
                    Ok(v) => self.heap.root_set(completion, v),
                    Err(e) => {
                        out = Err(e);
                        break;
                    }
                }
                continue;
            }
            match self.exec_stmt(&f, stmt) {
                Ok(Completion::Normal) => {}
                Ok(_) => {
                    out = Err(JsError::Syntax(
                        "return/break/continue outside of a function or loop".into(),
                    ));
                    break;
                }
                Err(e) => {
                    out = Err(e);
                    break;
                }
            }
        }
        // read through the root slot and truncate: an error unwind may have
        // left temporaries above the completion slot
        let value = self.heap.root_get(completion);
        self.heap.root_truncate(completion);
        out.map(|_| value)
    }

    /// Body execution for a script function; the caller (call protocol)
    /// has rooted callee, receiver and arguments.
    pub(crate) fn call_script_function(
        &mut self,
        sf: ScriptFn,
        args: crate::context::CallArgs,
    ) -> Result<Value, JsError> {
        let parent = sf
            .scope
            .unwrap_or(self.compartments[sf.compartment].lexicals);
        let scope_v = self.alloc_object_with_proto(JsClass::Scope, Some(parent))?;
        let si = self.heap.root_push(scope_v);

        if !sf.is_arrow {
            let this_v = args.this(self);
            let scope = self.heap.root_get(si);
            self.heap.define_property(
                &self.atoms,
                scope.as_ref(),
                well_known::THIS,
                Property::data(this_v, false, false, false),
            )?;

            let vals: Vec<Value> = (0..args.argc()).map(|i| args.arg(self, i)).collect();
            let mut aobj = JsObject::new(JsClass::Arguments, Some(self.realm.array_proto));
            aobj.extra = Extra::Elements(vals);
            let av = self.alloc_slot(Slot::Object(aobj))?;
            let scope = self.heap.root_get(si);
            self.heap.define_property(
                &self.atoms,
                scope.as_ref(),
                well_known::ARGUMENTS,
                Property::data(av, true, false, false),
            )?;
        }

        for (i, p) in sf.params.iter().enumerate() {
            let v = args.arg(self, i);
            let scope = self.heap.root_get(si);
            self.heap.define_property(
                &self.atoms,
                scope.as_ref(),
                *p,
                Property::data(v, true, true, true),
            )?;
        }

        let f = Frame {
            comp: sf.compartment,
            scope: si,
            top: false,
        };
        let saved = self.current_compartment;
        self.current_compartment = sf.compartment;

        let mut out = Ok(Value::undefined());
        if let Err(e) = self.hoist_functions(&f, &sf.body) {
            out = Err(e);
        } else {
            for stmt in sf.body.iter() {
                match self.exec_stmt(&f, stmt) {
                    Ok(Completion::Normal) => {}
                    Ok(Completion::Return(v)) => {
                        out = Ok(v);
                        break;
                    }
                    Ok(_) => {
                        out = Err(JsError::Syntax("break/continue outside of a loop".into()));
                        break;
                    }
                    Err(e) => {
                        out = Err(e);
                        break;
                    }
                }
            }
        }

        self.current_compartment = saved;
        self.heap.root_truncate(si);
        out
    }

    fn hoist_functions(&mut self, f: &Frame, stmts: &[Stmt]) -> Result<(), JsError> {
        for stmt in stmts {
            if let Stmt::FuncDecl(lit) = stmt {
                self.define_function_decl(f, lit)?;
            }
        }
        Ok(())
    }

    fn define_function_decl(&mut self, f: &Frame, lit: &FuncLit) -> Result<(), JsError> {
        let fv = self.make_function(f, lit)?;
        let name = lit
            .name
            .unwrap_or_else(|| unreachable!("function declaration without a name"));
        if f.top {
            let g = self.compartments[f.comp].global;
            self.heap
                .define_property(&self.atoms, g, name, Property::field(fv))?;
        } else {
            let scope = self.heap.root_get(f.scope);
            self.heap.define_property(
                &self.atoms,
                scope.as_ref(),
                name,
                Property::data(fv, true, true, true),
            )?;
        }
        Ok(())
    }

    fn make_function(&mut self, f: &Frame, lit: &FuncLit) -> Result<Value, JsError> {
        let scope_ref = self.heap.root_get(f.scope).as_ref();
        let mut obj = JsObject::new(JsClass::Function, Some(self.realm.function_proto));
        obj.extra = Extra::Function(FnKind::Script(ScriptFn {
            params: lit.params.clone(),
            body: lit.body.clone(),
            scope: Some(scope_ref),
            compartment: f.comp,
            is_arrow: lit.is_arrow,
        }));
        self.alloc_slot(Slot::Object(obj))
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn exec_stmt(&mut self, f: &Frame, stmt: &Stmt) -> Result<Completion, JsError> {
        match stmt {
            Stmt::Empty => Ok(Completion::Normal),
            Stmt::Expr(e) => {
                self.eval_expr(f, e)?;
                Ok(Completion::Normal)
            }
            Stmt::Decl { kind, bindings } => {
                for (name, init) in bindings {
                    let value = match init {
                        Some(e) => self.eval_expr(f, e)?,
                        None => Value::undefined(),
                    };
                    self.declare_binding(f, *kind, *name, value)?;
                }
                Ok(Completion::Normal)
            }
            Stmt::FuncDecl(lit) => {
                // already defined by hoisting when this is a direct child
                // of the body; nested blocks define at execution
                self.define_function_decl(f, lit)?;
                Ok(Completion::Normal)
            }
            Stmt::Block(stmts) => self.exec_stmts(f, stmts),
            Stmt::If { cond, cons, alt } => {
                let c = self.eval_expr(f, cond)?;
                if self.to_boolean(c) {
                    self.exec_stmt(f, cons)
                } else if let Some(alt) = alt {
                    self.exec_stmt(f, alt)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::While { cond, body } => loop {
                let c = self.eval_expr(f, cond)?;
                if !self.to_boolean(c) {
                    return Ok(Completion::Normal);
                }
                match self.exec_stmt(f, body)? {
                    Completion::Normal | Completion::Continue => {}
                    Completion::Break => return Ok(Completion::Normal),
                    r @ Completion::Return(_) => return Ok(r),
                }
            },
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.exec_stmt(f, init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        let c = self.eval_expr(f, cond)?;
                        if !self.to_boolean(c) {
                            return Ok(Completion::Normal);
                        }
                    }
                    match self.exec_stmt(f, body)? {
                        Completion::Normal | Completion::Continue => {}
                        Completion::Break => return Ok(Completion::Normal),
                        r @ Completion::Return(_) => return Ok(r),
                    }
                    if let Some(update) = update {
                        self.eval_expr(f, update)?;
                    }
                }
            }
            Stmt::ForIn {
                kind,
                name,
                object,
                body,
            } => {
                let ov = self.eval_expr(f, object)?;
                if !ov.is_object(&self.heap) {
                    return Ok(Completion::Normal);
                }
                // own keys only, snapshot before the first iteration
                let keys = self.own_enumerable_keys(ov.as_ref());
                for key in keys {
                    let text = self.atoms.name(key).to_string();
                    let kv = self.alloc_string(text)?;
                    self.bind_loop_var(f, *kind, *name, kv)?;
                    match self.exec_stmt(f, body)? {
                        Completion::Normal | Completion::Continue => {}
                        Completion::Break => return Ok(Completion::Normal),
                        r @ Completion::Return(_) => return Ok(r),
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
            } => {
                let ov = self.eval_expr(f, iterable)?;
                let is_array = ov.is_object(&self.heap)
                    && matches!(
                        self.heap.object(ov.as_ref()).class,
                        JsClass::Array | JsClass::Arguments
                    );
                if !is_array {
                    return Err(JsError::Type(
                        "for...of is only supported over arrays".into(),
                    ));
                }
                let oi = self.heap.root_push(ov);
                let mut i = 0usize;
                let r = loop {
                    let ov = self.heap.root_get(oi);
                    let len = self.heap.object(ov.as_ref()).elements().map_or(0, |e| e.len());
                    if i >= len {
                        break Ok(Completion::Normal);
                    }
                    let item = self.heap.object(ov.as_ref()).elements().map_or(
                        Value::undefined(),
                        |e| e[i],
                    );
                    if let Err(e) = self.bind_loop_var(f, *kind, *name, item) {
                        break Err(e);
                    }
                    match self.exec_stmt(f, body) {
                        Ok(Completion::Normal) | Ok(Completion::Continue) => {}
                        Ok(Completion::Break) => break Ok(Completion::Normal),
                        Ok(r @ Completion::Return(_)) => break Ok(r),
                        Err(e) => break Err(e),
                    }
                    i += 1;
                };
                self.heap.root_truncate(oi);
                r
            }
            Stmt::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(f, e)?,
                    None => Value::undefined(),
                };
                Ok(Completion::Return(v))
            }
            Stmt::Throw(e) => {
                let v = self.eval_expr(f, e)?;
                Err(JsError::Thrown(v))
            }
            Stmt::Break => Ok(Completion::Break),
            Stmt::Continue => Ok(Completion::Continue),
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => self.exec_try(f, block, param, handler, finalizer),
        }
    }

    fn exec_stmts(&mut self, f: &Frame, stmts: &[Stmt]) -> Result<Completion, JsError> {
        for stmt in stmts {
            match self.exec_stmt(f, stmt)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn declare_binding(
        &mut self,
        f: &Frame,
        kind: DeclKind,
        name: Atom,
        value: Value,
    ) -> Result<(), JsError> {
        if f.top {
            match kind {
                DeclKind::Var => {
                    let g = self.compartments[f.comp].global;
                    self.heap
                        .define_property(&self.atoms, g, name, Property::field(value))
                }
                DeclKind::Let | DeclKind::Const => {
                    let lex = self.compartments[f.comp].lexicals;
                    self.heap.define_property(
                        &self.atoms,
                        lex,
                        name,
                        Property::data(value, kind != DeclKind::Const, true, false),
                    )
                }
            }
        } else {
            let scope = self.heap.root_get(f.scope);
            self.heap.define_property(
                &self.atoms,
                scope.as_ref(),
                name,
                Property::data(value, kind != DeclKind::Const, true, true),
            )
        }
    }

    fn bind_loop_var(
        &mut self,
        f: &Frame,
        kind: Option<DeclKind>,
        name: Atom,
        value: Value,
    ) -> Result<(), JsError> {
        match kind {
            // per-iteration rebinding in the current scope; loop variables
            // stay out of the persistent compartment records
            Some(k) => {
                let scope = self.heap.root_get(f.scope);
                self.heap.define_property(
                    &self.atoms,
                    scope.as_ref(),
                    name,
                    Property::data(value, k != DeclKind::Const, true, true),
                )
            }
            None => self.assign_ident(f, name, value),
        }
    }

    fn exec_try(
        &mut self,
        f: &Frame,
        block: &[Stmt],
        param: &Option<Atom>,
        handler: &Option<Vec<Stmt>>,
        finalizer: &Option<Vec<Stmt>>,
    ) -> Result<Completion, JsError> {
        let mut outcome = self.exec_stmts(f, block);

        let caught = match (&outcome, handler) {
            (Err(e), Some(_)) => Some(e.clone()),
            _ => None,
        };
        if let (Some(e), Some(hstmts)) = (caught, handler) {
            outcome = self.run_catch(f, param, hstmts, e);
        }

        if let Some(fin) = finalizer {
            outcome = match outcome {
                Ok(Completion::Return(v)) => {
                    let ri = self.heap.root_push(v);
                    let fres = self.exec_stmts(f, fin);
                    let v = self.heap.root_get(ri);
                    self.heap.root_truncate(ri);
                    match fres {
                        Ok(Completion::Normal) => Ok(Completion::Return(v)),
                        other => other,
                    }
                }
                Err(JsError::Thrown(v)) => {
                    let ri = self.heap.root_push(v);
                    let fres = self.exec_stmts(f, fin);
                    let v = self.heap.root_get(ri);
                    self.heap.root_truncate(ri);
                    match fres {
                        Ok(Completion::Normal) => Err(JsError::Thrown(v)),
                        other => other,
                    }
                }
                other => {
                    let fres = self.exec_stmts(f, fin);
                    match fres {
                        Ok(Completion::Normal) => other,
                        abrupt => abrupt,
                    }
                }
            };
        }
        outcome
    }

    fn run_catch(
        &mut self,
        f: &Frame,
        param: &Option<Atom>,
        body: &[Stmt],
        e: JsError,
    ) -> Result<Completion, JsError> {
        let ev = self.error_value(&e)?;
        let ei = self.heap.root_push(ev);
        let cur = self.heap.root_get(f.scope);
        let scope = self.alloc_object_with_proto(JsClass::Scope, Some(cur.as_ref()))?;
        let si = self.heap.root_push(scope);
        if let Some(p) = param {
            let ev = self.heap.root_get(ei);
            let scope = self.heap.root_get(si);
            self.heap.define_property(
                &self.atoms,
                scope.as_ref(),
                *p,
                Property::data(ev, true, true, true),
            )?;
        }
        let sub = Frame {
            comp: f.comp,
            scope: si,
            top: false,
        };
        let r = self.exec_stmts(&sub, body);
        self.heap.root_truncate(ei);
        r
    }

    // -----------------------------------------------------------------------
    // Identifier resolution
    // -----------------------------------------------------------------------

    /// Walk the scope chain (all Scope-class records) looking for an own
    /// binding; fall back to the compartment global.
    fn resolve_ident(&mut self, f: &Frame, name: Atom) -> Result<Value, JsError> {
        match self.resolve_quiet(f, name)? {
            Some(v) => Ok(v),
            None => Err(JsError::Reference(format!(
                "{} is not defined",
                self.atoms.name(name)
            ))),
        }
    }

    fn resolve_quiet(&mut self, f: &Frame, name: Atom) -> Result<Option<Value>, JsError> {
        let mut cur = Some(self.heap.root_get(f.scope).as_ref());
        while let Some(r) = cur {
            if let Some(p) = self.heap.get_own(r, name) {
                if let PropKind::Data { value, .. } = p.kind {
                    return Ok(Some(value));
                }
            }
            cur = self.heap.object(r).proto;
        }
        let g = self.compartments[f.comp].global;
        if self.heap.lookup(g, name).is_some() {
            return self.get_prop(Value::from_ref(g), name).map(Some);
        }
        Ok(None)
    }

    fn assign_ident(&mut self, f: &Frame, name: Atom, value: Value) -> Result<(), JsError> {
        let mut cur = Some(self.heap.root_get(f.scope).as_ref());
        while let Some(r) = cur {
            if let Some(p) = self.heap.get_own(r, name) {
                if let PropKind::Data { writable, .. } = p.kind {
                    if !writable {
                        return Err(JsError::Type(format!(
                            "assignment to constant variable '{}'",
                            self.atoms.name(name)
                        )));
                    }
                    let obj = self.heap.object_mut(r);
                    if let Some((_, prop)) = obj.props.iter_mut().find(|(k, _)| *k == name) {
                        prop.kind = PropKind::Data {
                            value,
                            writable: true,
                        };
                    }
                    return Ok(());
                }
            }
            cur = self.heap.object(r).proto;
        }
        let g = self.compartments[f.comp].global;
        if self.heap.has_property(g, name) {
            self.set_prop(Value::from_ref(g), name, value)
        } else {
            // strict mode: assignment never creates implicit globals
            Err(JsError::Reference(format!(
                "{} is not defined",
                self.atoms.name(name)
            )))
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn eval_expr(&mut self, f: &Frame, e: &Expr) -> Result<Value, JsError> {
        match e {
            Expr::Num(n) => Ok(Value::number(*n)),
            Expr::Bool(b) => Ok(Value::bool_val(*b)),
            Expr::Null => Ok(Value::null()),
            Expr::Str(s) => self.alloc_string(s.clone()),
            Expr::This => Ok(self
                .resolve_quiet(f, well_known::THIS)?
                .unwrap_or(Value::undefined())),
            Expr::Ident(name) => self.resolve_ident(f, *name),

            Expr::ArrayLit(items) => {
                let base = self.heap.root_len();
                for item in items {
                    let v = self.eval_expr(f, item)?;
                    self.heap.root_push(v);
                }
                let elements: Vec<Value> =
                    (0..items.len()).map(|i| self.heap.root_get(base + i)).collect();
                let arr = self.alloc_array(elements);
                self.heap.root_truncate(base);
                arr
            }

            Expr::ObjectLit(props) => {
                let ov = self.alloc_object(JsClass::Ordinary)?;
                let oi = self.heap.root_push(ov);
                for (key, vexpr) in props {
                    let v = self.eval_expr(f, vexpr)?;
                    let ov = self.heap.root_get(oi);
                    self.heap
                        .define_property(&self.atoms, ov.as_ref(), *key, Property::field(v))?;
                }
                Ok(self.heap.root_pop())
            }

            Expr::Member { obj, prop } => {
                let ov = self.eval_expr(f, obj)?;
                self.get_prop(ov, *prop)
            }

            Expr::Index { obj, index } => {
                let ov = self.eval_expr(f, obj)?;
                let oi = self.heap.root_push(ov);
                let iv = self.eval_expr(f, index)?;
                let ov = self.heap.root_pop();
                self.get_element(ov, iv)
            }

            Expr::Call { callee, args } => self.eval_call(f, callee, args, false),
            Expr::New { callee, args } => self.eval_call(f, callee, args, true),

            Expr::Assign { op, target, value } => self.eval_assign(f, *op, target, value),

            Expr::Binary { op, left, right } => {
                let l = self.eval_expr(f, left)?;
                let li = self.heap.root_push(l);
                let r = self.eval_expr(f, right)?;
                let l = self.heap.root_get(li);
                self.heap.root_truncate(li);
                self.binary_op(*op, l, r)
            }

            Expr::Logical { op, left, right } => {
                let l = self.eval_expr(f, left)?;
                let lb = self.to_boolean(l);
                match op {
                    LogicalOp::And => {
                        if lb {
                            self.eval_expr(f, right)
                        } else {
                            Ok(l)
                        }
                    }
                    LogicalOp::Or => {
                        if lb {
                            Ok(l)
                        } else {
                            self.eval_expr(f, right)
                        }
                    }
                }
            }

            Expr::Unary { op, operand } => self.eval_unary(f, *op, operand),

            Expr::Update {
                inc,
                prefix,
                target,
            } => self.eval_update(f, *inc, *prefix, target),

            Expr::Cond { cond, cons, alt } => {
                let c = self.eval_expr(f, cond)?;
                if self.to_boolean(c) {
                    self.eval_expr(f, cons)
                } else {
                    self.eval_expr(f, alt)
                }
            }

            Expr::Delete(operand) => match &**operand {
                Expr::Member { obj, prop } => {
                    let ov = self.eval_expr(f, obj)?;
                    self.delete_prop(ov, *prop).map(Value::bool_val)
                }
                Expr::Index { obj, index } => {
                    let ov = self.eval_expr(f, obj)?;
                    let oi = self.heap.root_push(ov);
                    let iv = self.eval_expr(f, index)?;
                    let ov = self.heap.root_pop();
                    let key = self.to_atom_key(iv);
                    self.delete_prop(ov, key).map(Value::bool_val)
                }
                _ => Ok(Value::bool_val(true)),
            },

            Expr::Func(lit) => self.make_function(f, lit),
        }
    }

    fn eval_call(
        &mut self,
        f: &Frame,
        callee: &Expr,
        args: &[Expr],
        construct: bool,
    ) -> Result<Value, JsError> {
        let ti = self.heap.root_push(Value::undefined());
        let fi = self.heap.root_push(Value::undefined());

        let prepared = (|| -> Result<(), JsError> {
            match callee {
                Expr::Member { obj, prop } => {
                    let ov = self.eval_expr(f, obj)?;
                    self.heap.root_set(ti, ov);
                    let fv = self.get_prop(self.heap.root_get(ti), *prop)?;
                    self.heap.root_set(fi, fv);
                }
                Expr::Index { obj, index } => {
                    let ov = self.eval_expr(f, obj)?;
                    self.heap.root_set(ti, ov);
                    let iv = self.eval_expr(f, index)?;
                    let ov = self.heap.root_get(ti);
                    let fv = self.get_element(ov, iv)?;
                    self.heap.root_set(fi, fv);
                }
                other => {
                    let fv = self.eval_expr(f, other)?;
                    self.heap.root_set(fi, fv);
                }
            }
            Ok(())
        })();
        if let Err(e) = prepared {
            self.heap.root_truncate(ti);
            return Err(e);
        }

        let abase = self.heap.root_len();
        for a in args {
            match self.eval_expr(f, a) {
                Ok(v) => {
                    self.heap.root_push(v);
                }
                Err(e) => {
                    self.heap.root_truncate(ti);
                    return Err(e);
                }
            }
        }
        let argv: Vec<Value> = (0..args.len())
            .map(|i| self.heap.root_get(abase + i))
            .collect();
        let fv = self.heap.root_get(fi);
        let tv = self.heap.root_get(ti);

        let result = if construct {
            self.construct(fv, &argv)
        } else {
            self.call_value(fv, tv, &argv)
        };
        self.heap.root_truncate(ti);
        result
    }

    fn eval_assign(
        &mut self,
        f: &Frame,
        op: Option<BinOp>,
        target: &Expr,
        value: &Expr,
    ) -> Result<Value, JsError> {
        match target {
            Expr::Ident(name) => {
                let nv = match op {
                    None => self.eval_expr(f, value)?,
                    Some(bop) => {
                        let cur = self.resolve_ident(f, *name)?;
                        let ci = self.heap.root_push(cur);
                        let rv = self.eval_expr(f, value)?;
                        let cur = self.heap.root_get(ci);
                        self.heap.root_truncate(ci);
                        self.binary_op(bop, cur, rv)?
                    }
                };
                self.assign_ident(f, *name, nv)?;
                Ok(nv)
            }
            Expr::Member { obj, prop } => {
                let ov = self.eval_expr(f, obj)?;
                let oi = self.heap.root_push(ov);
                let nv = match op {
                    None => self.eval_expr(f, value)?,
                    Some(bop) => {
                        let cur = self.get_prop(self.heap.root_get(oi), *prop)?;
                        let ci = self.heap.root_push(cur);
                        let rv = self.eval_expr(f, value)?;
                        let cur = self.heap.root_get(ci);
                        self.heap.root_truncate(ci);
                        self.binary_op(bop, cur, rv)?
                    }
                };
                let ni = self.heap.root_push(nv);
                let ov = self.heap.root_get(oi);
                let nv = self.heap.root_get(ni);
                let r = self.set_prop(ov, *prop, nv);
                let nv = self.heap.root_get(ni);
                self.heap.root_truncate(oi);
                r.map(|_| nv)
            }
            Expr::Index { obj, index } => {
                let ov = self.eval_expr(f, obj)?;
                let oi = self.heap.root_push(ov);
                let iv = self.eval_expr(f, index)?;
                let ii = self.heap.root_push(iv);
                let nv = match op {
                    None => self.eval_expr(f, value)?,
                    Some(bop) => {
                        let cur =
                            self.get_element(self.heap.root_get(oi), self.heap.root_get(ii))?;
                        let ci = self.heap.root_push(cur);
                        let rv = self.eval_expr(f, value)?;
                        let cur = self.heap.root_get(ci);
                        self.heap.root_truncate(ci);
                        self.binary_op(bop, cur, rv)?
                    }
                };
                let ni = self.heap.root_push(nv);
                let ov = self.heap.root_get(oi);
                let iv = self.heap.root_get(ii);
                let nv = self.heap.root_get(ni);
                let r = self.set_element_value(ov, iv, nv);
                let nv = self.heap.root_get(ni);
                self.heap.root_truncate(oi);
                r.map(|_| nv)
            }
            _ => Err(JsError::Syntax("invalid assignment target".into())),
        }
    }

    fn eval_unary(&mut self, f: &Frame, op: UnaryOp, operand: &Expr) -> Result<Value, JsError> {
        if op == UnaryOp::TypeOf {
            // typeof tolerates unresolved identifiers
            let v = match operand {
                Expr::Ident(name) => self.resolve_quiet(f, *name)?.unwrap_or(Value::undefined()),
                other => self.eval_expr(f, other)?,
            };
            let text = self.typeof_str(v);
            return self.alloc_string(text);
        }
        let v = self.eval_expr(f, operand)?;
        Ok(match op {
            UnaryOp::Neg => Value::number(-self.to_number(v)),
            UnaryOp::Plus => Value::number(self.to_number(v)),
            UnaryOp::Not => Value::bool_val(!self.to_boolean(v)),
            UnaryOp::BitNot => Value::number(!to_int32(self.to_number(v)) as f64),
            UnaryOp::Void => Value::undefined(),
            UnaryOp::TypeOf => unreachable!("handled above"),
        })
    }

    fn eval_update(
        &mut self,
        f: &Frame,
        inc: bool,
        prefix: bool,
        target: &Expr,
    ) -> Result<Value, JsError> {
        let delta = if inc { 1.0 } else { -1.0 };
        match target {
            Expr::Ident(name) => {
                let cv = self.resolve_ident(f, *name)?;
                let cur = self.to_number(cv);
                let next = Value::number(cur + delta);
                self.assign_ident(f, *name, next)?;
                Ok(if prefix { next } else { Value::number(cur) })
            }
            Expr::Member { obj, prop } => {
                let ov = self.eval_expr(f, obj)?;
                let oi = self.heap.root_push(ov);
                let cv = self.get_prop(self.heap.root_get(oi), *prop)?;
                let cur = self.to_number(cv);
                let next = Value::number(cur + delta);
                let ov = self.heap.root_get(oi);
                self.heap.root_truncate(oi);
                self.set_prop(ov, *prop, next)?;
                Ok(if prefix { next } else { Value::number(cur) })
            }
            Expr::Index { obj, index } => {
                let ov = self.eval_expr(f, obj)?;
                let oi = self.heap.root_push(ov);
                let iv = self.eval_expr(f, index)?;
                let ii = self.heap.root_push(iv);
                let cv =
                    self.get_element(self.heap.root_get(oi), self.heap.root_get(ii))?;
                let cur = self.to_number(cv);
                let next = Value::number(cur + delta);
                let ov = self.heap.root_get(oi);
                let iv = self.heap.root_get(ii);
                self.heap.root_truncate(oi);
                self.set_element_value(ov, iv, next)?;
                Ok(if prefix { next } else { Value::number(cur) })
            }
            _ => Err(JsError::Syntax("invalid update target".into())),
        }
    }

    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    pub(crate) fn binary_op(&mut self, op: BinOp, l: Value, r: Value) -> Result<Value, JsError> {
        match op {
            BinOp::Add => {
                let stringy = l.is_string(&self.heap)
                    || r.is_string(&self.heap)
                    || l.is_object(&self.heap)
                    || r.is_object(&self.heap);
                if stringy {
                    let text = format!("{}{}", self.to_display(l), self.to_display(r));
                    self.alloc_string(text)
                } else {
                    Ok(Value::number(self.to_number(l) + self.to_number(r)))
                }
            }
            BinOp::Sub => Ok(Value::number(self.to_number(l) - self.to_number(r))),
            BinOp::Mul => Ok(Value::number(self.to_number(l) * self.to_number(r))),
            BinOp::Div => Ok(Value::number(self.to_number(l) / self.to_number(r))),
            BinOp::Rem => Ok(Value::number(self.to_number(l) % self.to_number(r))),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let result = match (l.string_chars(&self.heap), r.string_chars(&self.heap)) {
                    (Some(a), Some(b)) => match op {
                        BinOp::Lt => a < b,
                        BinOp::Le => a <= b,
                        BinOp::Gt => a > b,
                        _ => a >= b,
                    },
                    _ => {
                        let (a, b) = (self.to_number(l), self.to_number(r));
                        if a.is_nan() || b.is_nan() {
                            false
                        } else {
                            match op {
                                BinOp::Lt => a < b,
                                BinOp::Le => a <= b,
                                BinOp::Gt => a > b,
                                _ => a >= b,
                            }
                        }
                    }
                };
                Ok(Value::bool_val(result))
            }
            BinOp::StrictEq => Ok(Value::bool_val(l.strict_eq(r, &self.heap))),
            BinOp::StrictNotEq => Ok(Value::bool_val(!l.strict_eq(r, &self.heap))),
            BinOp::EqEq => Ok(Value::bool_val(self.loose_eq(l, r))),
            BinOp::NotEq => Ok(Value::bool_val(!self.loose_eq(l, r))),
            BinOp::BitAnd => Ok(Value::number(
                (to_int32(self.to_number(l)) & to_int32(self.to_number(r))) as f64,
            )),
            BinOp::BitOr => Ok(Value::number(
                (to_int32(self.to_number(l)) | to_int32(self.to_number(r))) as f64,
            )),
            BinOp::BitXor => Ok(Value::number(
                (to_int32(self.to_number(l)) ^ to_int32(self.to_number(r))) as f64,
            )),
            BinOp::Shl => Ok(Value::number(
                (to_int32(self.to_number(l)) << (to_uint32(self.to_number(r)) & 31)) as f64,
            )),
            BinOp::Shr => Ok(Value::number(
                (to_int32(self.to_number(l)) >> (to_uint32(self.to_number(r)) & 31)) as f64,
            )),
            BinOp::UShr => Ok(Value::number(
                (to_uint32(self.to_number(l)) >> (to_uint32(self.to_number(r)) & 31)) as f64,
            )),
            BinOp::In => {
                let key = self.to_atom_key(l);
                self.has_prop(r, key).map(Value::bool_val)
            }
        }
    }

    fn loose_eq(&self, l: Value, r: Value) -> bool {
        if l.strict_eq(r, &self.heap) {
            return true;
        }
        if l.is_nullish() && r.is_nullish() {
            return true;
        }
        // numeric coercion across number / string / boolean operands;
        // objects never loosely equal primitives in this dialect
        let coercible = |v: Value| {
            v.is_number() || v.is_bool() || v.is_string(&self.heap)
        };
        if coercible(l) && coercible(r) {
            let (a, b) = (self.to_number(l), self.to_number(r));
            return !a.is_nan() && !b.is_nan() && a == b;
        }
        false
    }
}

pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let m = n.trunc().rem_euclid(4294967296.0);
    m as u32 as i32
}

pub(crate) fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}
