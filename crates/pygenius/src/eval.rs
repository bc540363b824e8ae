//! Tree-walking evaluator for learner snippets.
//!
//! The evaluator executes parsed statements against a global [`Namespace`],
//! routes program output into [`Streams`], and keeps a stack of call frames
//! so a raised exception can be reported with a Python-style traceback.
//!
//! Scoping follows Python closely enough for teaching code:
//!
//! - module code reads and writes the globals;
//! - function code writes its own locals unless a name is declared `global`,
//!   and a name the body assigns anywhere is local for the whole call;
//! - nested functions see a snapshot of the enclosing locals taken at `def`
//!   time, and can always see themselves (so nested recursion works);
//! - comprehension targets do not leak into the surrounding scope.
//!
//! Lists, dicts and sets are shared, so mutating one through any name or
//! argument is visible through all of them.

use std::rc::Rc;
use std::sync::Arc;

use rustpython_parser::ast::{
    self, BoolOp, Comprehension, Constant, ConversionFlag, ExceptHandler, Expr, Operator,
    Ranged, Stmt, UnaryOp,
};
use tracing::trace;

use crate::args::{Args, arg_int, arg_str};
use crate::array::NdArray;
use crate::builtins::{self, Interpreter};
use crate::config::EngineConfig;
use crate::error::{Error, Exception, Result};
use crate::methods;
use crate::modules;
use crate::namespace::Namespace;
use crate::operators::{apply_binop, apply_cmpop};
use crate::output::Streams;
use crate::slice::SliceSpec;
use crate::traceback::{SourceCode, Traceback};
use crate::value::{FunctionBody, Param, PyValue, Stream, UserFunction};

/// Below this much free stack, a call continues on a freshly allocated segment.
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

/// How a block of statements finished.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(PyValue),
}

/// One activation on the call stack.
struct Frame {
    /// `<module>` or the function name, as shown in tracebacks.
    function: String,
    func: Option<Rc<UserFunction>>,
    /// `None` for module code, which binds straight into the globals.
    locals: Option<Namespace>,
    /// Names declared with a `global` statement in this frame.
    declared_globals: Vec<String>,
    line: usize,
    source: Arc<SourceCode>,
}

impl Frame {
    fn module(source: Arc<SourceCode>) -> Self {
        Self {
            function: "<module>".to_string(),
            func: None,
            locals: None,
            declared_globals: Vec::new(),
            line: 1,
            source,
        }
    }

    fn is_global(&self, name: &str) -> bool {
        self.locals.is_none() || self.declared_globals.iter().any(|g| g == name)
    }

    /// A local the body assigns somewhere but which has no value yet.
    fn is_unbound_local(&self, name: &str) -> bool {
        let Some(locals) = &self.locals else {
            return false;
        };
        !locals.contains(name)
            && !self.is_global(name)
            && self
                .func
                .as_ref()
                .is_some_and(|func| func.assigned.iter().any(|n| n == name))
    }
}

/// Executes statements and expressions for one snippet.
pub struct Evaluator<'a, 'o> {
    globals: &'a mut Namespace,
    streams: &'a mut Streams<'o>,
    config: &'a EngineConfig,
    module: Frame,
    calls: Vec<Frame>,
    /// Exceptions whose handlers are currently running, for bare `raise`.
    handling: Vec<Exception>,
}

impl<'a, 'o> Evaluator<'a, 'o> {
    pub fn new(
        globals: &'a mut Namespace,
        streams: &'a mut Streams<'o>,
        config: &'a EngineConfig,
        source: Arc<SourceCode>,
    ) -> Self {
        Self {
            globals,
            streams,
            config,
            module: Frame::module(source),
            calls: Vec::new(),
            handling: Vec::new(),
        }
    }

    /// Run a module body.
    ///
    /// Returns the value of the final statement when it is a bare
    /// expression, and `None` otherwise.
    pub fn run_module(&mut self, body: &[Stmt]) -> Result<PyValue> {
        check_structure(body, &self.module.source)?;
        let mut last = PyValue::None;
        for stmt in body {
            last = PyValue::None;
            if let Stmt::Expr(expr) = stmt {
                self.mark(stmt);
                last = self
                    .eval_expr(&expr.value)
                    .map_err(|err| self.attach_traceback(err))?;
            } else {
                self.exec_stmt(stmt)?;
            }
        }
        Ok(last)
    }

    /// Evaluate a single expression at module level.
    pub fn eval_expression(&mut self, expr: &Expr) -> Result<PyValue> {
        self.mark(expr);
        self.eval_expr(expr).map_err(|err| self.attach_traceback(err))
    }

    // === Frames and tracebacks ===

    fn frame(&self) -> &Frame {
        self.calls.last().unwrap_or(&self.module)
    }

    fn mark(&mut self, node: &impl Ranged) {
        let offset = node.range().start().to_usize();
        let frame = match self.calls.last_mut() {
            Some(frame) => frame,
            None => &mut self.module,
        };
        frame.line = frame.source.line_of(offset);
        trace!(line = frame.line, function = %frame.function, "executing");
    }

    /// Turn any runtime failure into an exception carrying the current stack.
    ///
    /// The innermost statement attaches first; outer frames leave an
    /// existing traceback alone.
    fn attach_traceback(&self, err: Error) -> Error {
        if err.is_syntax() {
            return err;
        }
        let mut exc = err.into_exception();
        if exc.traceback.is_empty() {
            exc.traceback = Traceback {
                frames: std::iter::once(&self.module)
                    .chain(&self.calls)
                    .map(|frame| frame.source.frame(&frame.function, frame.line))
                    .collect(),
            };
        }
        Error::Exception(Box::new(exc))
    }

    // === Names ===

    fn name_ref(&self, name: &str) -> Option<&PyValue> {
        let frame = self.frame();
        if let Some(locals) = &frame.locals
            && !frame.is_global(name)
        {
            if let Some(value) = locals.get(name) {
                return Some(value);
            }
            if frame.is_unbound_local(name) {
                return None;
            }
            if let Some(func) = &frame.func
                && let Some((_, value)) = func.closure.iter().find(|(k, _)| k == name)
            {
                return Some(value);
            }
        }
        self.globals.get(name)
    }

    fn lookup_name(&self, name: &str) -> Result<PyValue> {
        if let Some(value) = self.name_ref(name) {
            return Ok(value.clone());
        }
        if self.frame().is_unbound_local(name) {
            return Err(Error::raise(
                "UnboundLocalError",
                format!(
                    "cannot access local variable '{}' where it is not associated with a value",
                    name
                ),
            ));
        }
        if let Some(func) = &self.frame().func
            && func.name == name
        {
            return Ok(PyValue::Function(func.clone()));
        }
        builtins::lookup(name).ok_or_else(|| Error::NameError(name.to_string()))
    }

    fn store_name(&mut self, name: &str, value: PyValue) {
        let frame = match self.calls.last_mut() {
            Some(frame) => frame,
            None => &mut self.module,
        };
        let global = frame.is_global(name);
        match frame.locals.as_mut() {
            Some(locals) if !global => locals.set(name, value),
            _ => self.globals.set(name, value),
        }
    }

    fn delete_name(&mut self, name: &str) -> Result<()> {
        let frame = match self.calls.last_mut() {
            Some(frame) => frame,
            None => &mut self.module,
        };
        let global = frame.is_global(name);
        let removed = match frame.locals.as_mut() {
            Some(locals) if !global => locals.remove(name),
            _ => self.globals.remove(name),
        };
        removed
            .map(|_| ())
            .ok_or_else(|| Error::NameError(name.to_string()))
    }

    /// The binding of `name` in the current scope only.
    fn scope_binding(&self, name: &str) -> Option<PyValue> {
        let frame = self.frame();
        match &frame.locals {
            Some(locals) if !frame.is_global(name) => locals.get(name).cloned(),
            _ => self.globals.get(name).cloned(),
        }
    }

    // === Statements ===

    fn exec_block(&mut self, body: &[Stmt]) -> Result<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.mark(stmt);
        self.exec_stmt_inner(stmt)
            .map_err(|err| self.attach_traceback(err))
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(&expr.value)?;
                Ok(Flow::Normal)
            }
            Stmt::Assign(assign) => {
                let value = self.eval_expr(&assign.value)?;
                for target in &assign.targets {
                    self.assign_target(target, value.clone())?;
                }
                Ok(Flow::Normal)
            }
            Stmt::AugAssign(aug) => self.exec_aug_assign(aug),
            Stmt::AnnAssign(ann) => {
                if let Some(value) = &ann.value {
                    let value = self.eval_expr(value)?;
                    self.assign_target(&ann.target, value)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::If(if_stmt) => {
                if self.eval_expr(&if_stmt.test)?.is_truthy() {
                    self.exec_block(&if_stmt.body)
                } else {
                    self.exec_block(&if_stmt.orelse)
                }
            }
            Stmt::For(for_stmt) => self.exec_for(for_stmt),
            Stmt::While(while_stmt) => self.exec_while(while_stmt),
            Stmt::FunctionDef(def) => self.exec_function_def(def),
            Stmt::Return(ret) => {
                let value = match &ret.value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => PyValue::None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Pass(_) => Ok(Flow::Normal),
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            Stmt::Delete(delete) => {
                for target in &delete.targets {
                    self.delete_target(target)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Global(global) => {
                if let Some(frame) = self.calls.last_mut() {
                    frame
                        .declared_globals
                        .extend(global.names.iter().map(|name| name.to_string()));
                }
                Ok(Flow::Normal)
            }
            Stmt::Import(import) => self.exec_import(import),
            Stmt::ImportFrom(import) => self.exec_import_from(import),
            Stmt::Raise(raise) => Err(self.exec_raise(raise)?),
            Stmt::Try(try_stmt) => self.exec_try(try_stmt),
            Stmt::Assert(assert) => {
                if !self.eval_expr(&assert.test)?.is_truthy() {
                    let message = match &assert.msg {
                        Some(msg) => self.eval_expr(msg)?.to_print_string(),
                        None => String::new(),
                    };
                    return Err(Error::raise("AssertionError", message));
                }
                Ok(Flow::Normal)
            }
            Stmt::ClassDef(_) => Err(Error::Unsupported("class definition".to_string())),
            Stmt::With(_) => Err(Error::Unsupported("the with statement".to_string())),
            Stmt::Nonlocal(_) => Err(Error::Unsupported("the nonlocal declaration".to_string())),
            Stmt::AsyncFunctionDef(_) | Stmt::AsyncFor(_) | Stmt::AsyncWith(_) => {
                Err(Error::Unsupported("async code".to_string()))
            }
            Stmt::Match(_) => Err(Error::Unsupported("the match statement".to_string())),
            _ => Err(Error::Unsupported("this statement".to_string())),
        }
    }

    fn exec_for(&mut self, for_stmt: &ast::StmtFor) -> Result<Flow> {
        let iterable = self.eval_expr(&for_stmt.iter)?;
        for item in builtins::iterate(&iterable)? {
            self.assign_target(&for_stmt.target, item)?;
            match self.exec_block(&for_stmt.body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        self.exec_block(&for_stmt.orelse)
    }

    fn exec_while(&mut self, while_stmt: &ast::StmtWhile) -> Result<Flow> {
        loop {
            self.mark(while_stmt);
            if !self.eval_expr(&while_stmt.test)?.is_truthy() {
                break;
            }
            match self.exec_block(&while_stmt.body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        self.exec_block(&while_stmt.orelse)
    }

    /// `target op= value`. The container and key of a subscript target are
    /// evaluated once.
    fn exec_aug_assign(&mut self, aug: &ast::StmtAugAssign) -> Result<Flow> {
        match aug.target.as_ref() {
            Expr::Name(name) => {
                let current = self.lookup_name(name.id.as_str())?;
                let right = self.eval_expr(&aug.value)?;
                let result = augmented(&aug.op, &current, &right)?;
                self.store_name(name.id.as_str(), result);
            }
            Expr::Subscript(sub) if !matches!(sub.slice.as_ref(), Expr::Slice(_)) => {
                let mut container = self.eval_expr(&sub.value)?;
                let key = self.eval_expr(&sub.slice)?;
                let current = methods::get_item(&container, &key)?;
                let right = self.eval_expr(&aug.value)?;
                let result = augmented(&aug.op, &current, &right)?;
                methods::set_item(&mut container, key, result)?;
                self.store_frame(&sub.value, container)?;
            }
            _ => {
                return Err(Error::Unsupported(
                    "augmented assignment to this target".to_string(),
                ));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_function_def(&mut self, def: &ast::StmtFunctionDef) -> Result<Flow> {
        if !def.decorator_list.is_empty() {
            return Err(Error::Unsupported("a decorator".to_string()));
        }
        let func = self.make_function(
            def.name.as_str(),
            &def.args,
            FunctionBody::Block(def.body.clone()),
        )?;
        self.store_name(def.name.as_str(), func);
        Ok(Flow::Normal)
    }

    fn make_function(
        &mut self,
        name: &str,
        args: &ast::Arguments,
        body: FunctionBody,
    ) -> Result<PyValue> {
        let mut params = self.params(&args.posonlyargs)?;
        params.extend(self.params(&args.args)?);
        let kwonly = self.params(&args.kwonlyargs)?;
        let assigned = match &body {
            FunctionBody::Block(stmts) => assigned_names(stmts),
            FunctionBody::Lambda(_) => Vec::new(),
        };
        Ok(PyValue::Function(Rc::new(UserFunction {
            name: name.to_string(),
            params,
            vararg: args.vararg.as_ref().map(|arg| arg.arg.to_string()),
            kwonly,
            kwarg: args.kwarg.as_ref().map(|arg| arg.arg.to_string()),
            assigned,
            body,
            closure: self.capture_closure(),
            source: self.frame().source.clone(),
        })))
    }

    fn params(&mut self, list: &[ast::ArgWithDefault]) -> Result<Vec<Param>> {
        list.iter()
            .map(|arg| {
                let default = match &arg.default {
                    Some(expr) => Some(self.eval_expr(expr)?),
                    None => None,
                };
                Ok(Param {
                    name: arg.def.arg.to_string(),
                    default,
                })
            })
            .collect()
    }

    fn capture_closure(&self) -> Vec<(String, PyValue)> {
        let frame = self.frame();
        let Some(locals) = &frame.locals else {
            return Vec::new();
        };
        let mut captured: Vec<(String, PyValue)> = locals
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        if let Some(func) = &frame.func {
            for (name, value) in &func.closure {
                if !locals.contains(name) {
                    captured.push((name.clone(), value.clone()));
                }
            }
        }
        captured
    }

    fn delete_target(&mut self, target: &Expr) -> Result<()> {
        match target {
            Expr::Name(name) => self.delete_name(name.id.as_str()),
            Expr::Tuple(tuple) => {
                for elt in &tuple.elts {
                    self.delete_target(elt)?;
                }
                Ok(())
            }
            Expr::Subscript(sub) => {
                let container = self.eval_expr(&sub.value)?;
                match sub.slice.as_ref() {
                    Expr::Slice(slice) => self.slice_spec(slice)?.delete(&container),
                    key => {
                        let key = self.eval_expr(key)?;
                        methods::del_item(&container, &key)
                    }
                }
            }
            _ => Err(Error::Unsupported("deleting this target".to_string())),
        }
    }

    fn exec_import(&mut self, import: &ast::StmtImport) -> Result<Flow> {
        for alias in &import.names {
            let full = alias.name.as_str();
            let module = load_module(full)?;
            match &alias.asname {
                Some(asname) => self.store_name(asname.as_str(), module),
                None => {
                    let top = full.split('.').next().unwrap_or(full);
                    let module = if top == full {
                        module
                    } else {
                        load_module(top)?
                    };
                    self.store_name(top, module);
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_import_from(&mut self, import: &ast::StmtImportFrom) -> Result<Flow> {
        let module_name = import.module.as_ref().map_or("", |m| m.as_str());
        let module = load_module(module_name)?;
        let PyValue::Module(module) = module else {
            return Err(Error::raise(
                "ImportError",
                format!("cannot import from '{}'", module_name),
            ));
        };
        for alias in &import.names {
            let name = alias.name.as_str();
            if name == "*" {
                for (attr, value) in &module.attrs {
                    if !attr.starts_with('_') {
                        self.store_name(attr, value.clone());
                    }
                }
                continue;
            }
            let value = module
                .get(name)
                .cloned()
                .or_else(|| modules::load(&format!("{}.{}", module_name, name)))
                .ok_or_else(|| {
                    Error::raise(
                        "ImportError",
                        format!("cannot import name '{}' from '{}'", name, module_name),
                    )
                })?;
            let bound = alias.asname.as_ref().map_or(name, |a| a.as_str());
            self.store_name(bound, value);
        }
        Ok(Flow::Normal)
    }

    /// Build the error a `raise` statement throws.
    fn exec_raise(&mut self, raise: &ast::StmtRaise) -> Result<Error> {
        let Some(exc) = &raise.exc else {
            return Ok(match self.handling.last() {
                Some(active) => Error::Exception(Box::new(active.clone())),
                None => Error::raise("RuntimeError", "No active exception to reraise"),
            });
        };
        Ok(match self.eval_expr(exc)? {
            PyValue::Type(name) if builtins::is_exception_type(name) => {
                match builtins::call_type(name, Args::default())? {
                    PyValue::Exception(exc) => Error::Exception(exc),
                    _ => Error::raise(name, ""),
                }
            }
            PyValue::Exception(exc) => Error::Exception(exc),
            _ => Error::raise("TypeError", "exceptions must derive from BaseException"),
        })
    }

    fn exec_try(&mut self, try_stmt: &ast::StmtTry) -> Result<Flow> {
        let outcome = match self.exec_block(&try_stmt.body) {
            Ok(Flow::Normal) => self.exec_block(&try_stmt.orelse),
            Ok(flow) => Ok(flow),
            Err(err) if err.is_syntax() => Err(err),
            Err(err) => self.handle_exception(&try_stmt.handlers, err),
        };
        if try_stmt.finalbody.is_empty() {
            return outcome;
        }
        match self.exec_block(&try_stmt.finalbody)? {
            Flow::Normal => outcome,
            flow => Ok(flow),
        }
    }

    fn handle_exception(&mut self, handlers: &[ExceptHandler], err: Error) -> Result<Flow> {
        let exc = err.into_exception();
        for handler in handlers {
            let ExceptHandler::ExceptHandler(handler) = handler;
            if let Some(class) = &handler.type_ {
                let class = self.eval_expr(class)?;
                if !handler_matches(&class, &exc.kind)? {
                    continue;
                }
            }
            if let Some(name) = &handler.name {
                self.store_name(name.as_str(), PyValue::Exception(Box::new(exc.clone())));
            }
            self.handling.push(exc);
            let result = self.exec_block(&handler.body);
            self.handling.pop();
            if let Some(name) = &handler.name {
                let _ = self.delete_name(name.as_str());
            }
            return result;
        }
        Err(Error::Exception(Box::new(exc)))
    }

    // === Assignment ===

    fn assign_target(&mut self, target: &Expr, value: PyValue) -> Result<()> {
        match target {
            Expr::Name(name) => {
                self.store_name(name.id.as_str(), value);
                Ok(())
            }
            Expr::Tuple(tuple) => self.unpack(&tuple.elts, value),
            Expr::List(list) => self.unpack(&list.elts, value),
            Expr::Subscript(sub) => self.assign_subscript(sub, value),
            Expr::Attribute(_) => Err(Error::Unsupported("attribute assignment".to_string())),
            _ => Err(Error::Unsupported("this assignment target".to_string())),
        }
    }

    fn assign_subscript(&mut self, sub: &ast::ExprSubscript, value: PyValue) -> Result<()> {
        let mut container = self.eval_expr(&sub.value)?;
        if let Expr::Slice(slice) = sub.slice.as_ref() {
            let spec = self.slice_spec(slice)?;
            return spec.write(&container, builtins::iterate(&value)?);
        }
        let key = self.eval_expr(&sub.slice)?;
        methods::set_item(&mut container, key, value)?;
        self.store_frame(&sub.value, container)
    }

    /// Data frames are plain values: after `df[col] = ...` the edited copy
    /// goes back to the name or item it was read from.
    fn store_frame(&mut self, source: &Expr, container: PyValue) -> Result<()> {
        let named = matches!(source, Expr::Name(_) | Expr::Subscript(_));
        if named && matches!(container, PyValue::DataFrame(_)) {
            return self.assign_target(source, container);
        }
        Ok(())
    }

    fn unpack(&mut self, targets: &[Expr], value: PyValue) -> Result<()> {
        let mut items = match &value {
            PyValue::List(_)
            | PyValue::Tuple(_)
            | PyValue::Set(_)
            | PyValue::Dict(_)
            | PyValue::Str(_)
            | PyValue::Array(_)
            | PyValue::Series(_) => builtins::iterate(&value)?,
            other => {
                return Err(Error::raise(
                    "TypeError",
                    format!(
                        "cannot unpack non-iterable {} object",
                        other.type_name()
                    ),
                ));
            }
        };
        let Some(star) = targets.iter().position(|t| matches!(t, Expr::Starred(_))) else {
            if items.len() < targets.len() {
                return Err(Error::raise(
                    "ValueError",
                    format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    ),
                ));
            }
            if items.len() > targets.len() {
                return Err(Error::raise(
                    "ValueError",
                    format!("too many values to unpack (expected {})", targets.len()),
                ));
            }
            for (target, item) in targets.iter().zip(items) {
                self.assign_target(target, item)?;
            }
            return Ok(());
        };

        let required = targets.len() - 1;
        if items.len() < required {
            return Err(Error::raise(
                "ValueError",
                format!(
                    "not enough values to unpack (expected at least {}, got {})",
                    required,
                    items.len()
                ),
            ));
        }
        let after = targets.len() - star - 1;
        let tail = items.split_off(items.len() - after);
        let middle = items.split_off(star);
        for (target, item) in targets[..star].iter().zip(items) {
            self.assign_target(target, item)?;
        }
        if let Expr::Starred(starred) = &targets[star] {
            self.assign_target(&starred.value, PyValue::list(middle))?;
        }
        for (target, item) in targets[star + 1..].iter().zip(tail) {
            self.assign_target(target, item)?;
        }
        Ok(())
    }

    // === Expressions ===

    fn eval_expr(&mut self, expr: &Expr) -> Result<PyValue> {
        match expr {
            Expr::Constant(constant) => constant_value(&constant.value),
            Expr::Name(name) => self.lookup_name(name.id.as_str()),
            Expr::List(list) => self.eval_elements(&list.elts).map(PyValue::list),
            Expr::Tuple(tuple) => self.eval_elements(&tuple.elts).map(PyValue::Tuple),
            Expr::Set(set) => {
                let items = self.eval_elements(&set.elts)?;
                builtins::call_type("set", Args::new(vec![PyValue::list(items)]))
            }
            Expr::Dict(dict) => self.eval_dict(dict),
            Expr::BinOp(binop) => {
                let left = self.eval_expr(&binop.left)?;
                let right = self.eval_expr(&binop.right)?;
                apply_binop(&binop.op, &left, &right)
            }
            Expr::UnaryOp(unary) => {
                let operand = self.eval_expr(&unary.operand)?;
                unary_op(&unary.op, operand)
            }
            Expr::BoolOp(boolop) => self.eval_boolop(boolop),
            Expr::Compare(compare) => self.eval_compare(compare),
            Expr::IfExp(ifexp) => {
                if self.eval_expr(&ifexp.test)?.is_truthy() {
                    self.eval_expr(&ifexp.body)
                } else {
                    self.eval_expr(&ifexp.orelse)
                }
            }
            Expr::Call(call) => self.eval_call(call),
            Expr::Attribute(attr) => self.eval_attribute(attr),
            Expr::Subscript(sub) => self.eval_subscript(sub),
            Expr::JoinedStr(joined) => self.eval_joined_str(joined),
            Expr::FormattedValue(formatted) => self.eval_formatted(formatted).map(PyValue::Str),
            Expr::Lambda(lambda) => self.make_function(
                "<lambda>",
                &lambda.args,
                FunctionBody::Lambda(lambda.body.clone()),
            ),
            Expr::ListComp(comp) => {
                let mut items = Vec::new();
                self.run_comprehension(&comp.generators, &mut |ev| {
                    items.push(ev.eval_expr(&comp.elt)?);
                    Ok(())
                })?;
                Ok(PyValue::list(items))
            }
            // Generators are materialized eagerly.
            Expr::GeneratorExp(comp) => {
                let mut items = Vec::new();
                self.run_comprehension(&comp.generators, &mut |ev| {
                    items.push(ev.eval_expr(&comp.elt)?);
                    Ok(())
                })?;
                Ok(PyValue::list(items))
            }
            Expr::SetComp(comp) => {
                let mut items = Vec::new();
                self.run_comprehension(&comp.generators, &mut |ev| {
                    items.push(ev.eval_expr(&comp.elt)?);
                    Ok(())
                })?;
                builtins::call_type("set", Args::new(vec![PyValue::list(items)]))
            }
            Expr::DictComp(comp) => {
                let mut dict = PyValue::dict(Vec::new());
                self.run_comprehension(&comp.generators, &mut |ev| {
                    let key = ev.eval_expr(&comp.key)?;
                    let value = ev.eval_expr(&comp.value)?;
                    methods::set_item(&mut dict, key, value)
                })?;
                Ok(dict)
            }
            Expr::NamedExpr(named) => {
                let value = self.eval_expr(&named.value)?;
                self.assign_target(&named.target, value.clone())?;
                Ok(value)
            }
            Expr::Starred(_) => Err(Error::Unsupported(
                "a starred expression in this position".to_string(),
            )),
            Expr::Slice(_) => Err(Error::Unsupported(
                "a slice outside of a subscript".to_string(),
            )),
            Expr::Await(_) => Err(Error::Unsupported("await".to_string())),
            Expr::Yield(_) | Expr::YieldFrom(_) => Err(Error::Unsupported("yield".to_string())),
        }
    }

    fn eval_elements(&mut self, elts: &[Expr]) -> Result<Vec<PyValue>> {
        let mut items = Vec::with_capacity(elts.len());
        for elt in elts {
            match elt {
                Expr::Starred(starred) => {
                    let value = self.eval_expr(&starred.value)?;
                    items.extend(builtins::iterate(&value)?);
                }
                other => items.push(self.eval_expr(other)?),
            }
        }
        Ok(items)
    }

    fn eval_dict(&mut self, dict: &ast::ExprDict) -> Result<PyValue> {
        let mut result = PyValue::dict(Vec::with_capacity(dict.values.len()));
        for (key, value) in dict.keys.iter().zip(&dict.values) {
            match key {
                Some(key) => {
                    let key = self.eval_expr(key)?;
                    let value = self.eval_expr(value)?;
                    methods::set_item(&mut result, key, value)?;
                }
                None => match self.eval_expr(value)? {
                    PyValue::Dict(pairs) => {
                        for (k, v) in pairs.snapshot() {
                            methods::set_item(&mut result, k, v)?;
                        }
                    }
                    other => {
                        return Err(Error::raise(
                            "TypeError",
                            format!("'{}' object is not a mapping", other.type_name()),
                        ));
                    }
                },
            }
        }
        Ok(result)
    }

    fn eval_boolop(&mut self, boolop: &ast::ExprBoolOp) -> Result<PyValue> {
        let mut result = PyValue::None;
        for value in &boolop.values {
            result = self.eval_expr(value)?;
            let settled = match boolop.op {
                BoolOp::And => !result.is_truthy(),
                BoolOp::Or => result.is_truthy(),
            };
            if settled {
                break;
            }
        }
        Ok(result)
    }

    fn eval_compare(&mut self, compare: &ast::ExprCompare) -> Result<PyValue> {
        let mut left = self.eval_expr(&compare.left)?;
        for (op, right) in compare.ops.iter().zip(&compare.comparators) {
            let right = self.eval_expr(right)?;
            if !apply_cmpop(op, &left, &right)? {
                return Ok(PyValue::Bool(false));
            }
            left = right;
        }
        Ok(PyValue::Bool(true))
    }

    fn eval_attribute(&mut self, attr: &ast::ExprAttribute) -> Result<PyValue> {
        if let Expr::Name(name) = attr.value.as_ref()
            && let Some(value) = self.name_ref(name.id.as_str())
        {
            return methods::get_attribute(value, attr.attr.as_str());
        }
        let value = self.eval_expr(&attr.value)?;
        methods::get_attribute(&value, attr.attr.as_str())
    }

    fn eval_subscript(&mut self, sub: &ast::ExprSubscript) -> Result<PyValue> {
        let value = self.eval_expr(&sub.value)?;
        if let Expr::Slice(slice) = sub.slice.as_ref() {
            let spec = self.slice_spec(slice)?;
            return match &value {
                PyValue::Array(arr) if arr.ndim() == 1 => {
                    let sliced = spec.read(&PyValue::list(arr.to_values()))?;
                    Ok(PyValue::Array(
                        NdArray::from_value(&sliced)?.astype(arr.dtype()),
                    ))
                }
                other => spec.read(other),
            };
        }
        let key = self.eval_expr(&sub.slice)?;
        methods::get_item(&value, &key)
    }

    fn slice_spec(&mut self, slice: &ast::ExprSlice) -> Result<SliceSpec> {
        Ok(SliceSpec::new(
            self.slice_bound(&slice.lower)?,
            self.slice_bound(&slice.upper)?,
            self.slice_bound(&slice.step)?,
        ))
    }

    fn slice_bound(&mut self, bound: &Option<Box<Expr>>) -> Result<Option<i64>> {
        let Some(expr) = bound else {
            return Ok(None);
        };
        match self.eval_expr(expr)? {
            PyValue::None => Ok(None),
            value => arg_int(&value).map(Some).map_err(|_| {
                Error::raise(
                    "TypeError",
                    "slice indices must be integers or None or have an __index__ method",
                )
            }),
        }
    }

    fn eval_joined_str(&mut self, joined: &ast::ExprJoinedStr) -> Result<PyValue> {
        let mut out = String::new();
        for part in &joined.values {
            match part {
                Expr::Constant(constant) => {
                    if let Constant::Str(s) = &constant.value {
                        out.push_str(s);
                    }
                }
                Expr::FormattedValue(formatted) => out.push_str(&self.eval_formatted(formatted)?),
                other => out.push_str(&self.eval_expr(other)?.to_print_string()),
            }
        }
        Ok(PyValue::Str(out))
    }

    fn eval_formatted(&mut self, formatted: &ast::ExprFormattedValue) -> Result<String> {
        let value = self.eval_expr(&formatted.value)?;
        let value = match formatted.conversion {
            ConversionFlag::Repr | ConversionFlag::Ascii => PyValue::Str(value.to_string()),
            ConversionFlag::Str => PyValue::Str(value.to_print_string()),
            ConversionFlag::None => value,
        };
        let spec = match &formatted.format_spec {
            Some(spec) => self.eval_expr(spec)?.to_print_string(),
            None => String::new(),
        };
        methods::format_with_spec(&value, &spec)
    }

    // === Comprehensions ===

    /// Run `emit` once per combination of the generators' items.
    ///
    /// Target names are restored afterwards so they do not leak.
    fn run_comprehension(
        &mut self,
        generators: &[Comprehension],
        emit: &mut dyn FnMut(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let mut names = Vec::new();
        for generator in generators {
            target_names(&generator.target, &mut names);
        }
        let saved: Vec<(String, Option<PyValue>)> = names
            .into_iter()
            .map(|name| {
                let value = self.scope_binding(&name);
                (name, value)
            })
            .collect();

        let result = self.comprehension_level(generators, emit);

        for (name, value) in saved {
            match value {
                Some(value) => self.store_name(&name, value),
                None => {
                    let _ = self.delete_name(&name);
                }
            }
        }
        result
    }

    fn comprehension_level(
        &mut self,
        generators: &[Comprehension],
        emit: &mut dyn FnMut(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let Some((generator, rest)) = generators.split_first() else {
            return emit(self);
        };
        if generator.is_async {
            return Err(Error::Unsupported("an async comprehension".to_string()));
        }
        let iterable = self.eval_expr(&generator.iter)?;
        'items: for item in builtins::iterate(&iterable)? {
            self.assign_target(&generator.target, item)?;
            for condition in &generator.ifs {
                if !self.eval_expr(condition)?.is_truthy() {
                    continue 'items;
                }
            }
            self.comprehension_level(rest, emit)?;
        }
        Ok(())
    }

    // === Calls ===

    fn eval_call(&mut self, call: &ast::ExprCall) -> Result<PyValue> {
        if let Expr::Attribute(attr) = call.func.as_ref() {
            return self.eval_method_call(attr, call);
        }
        let func = self.eval_expr(&call.func)?;
        let args = self.eval_args(&call.args, &call.keywords)?;
        self.call_value(&func, args)
    }

    fn eval_args(&mut self, args: &[Expr], keywords: &[ast::Keyword]) -> Result<Args> {
        let positional = self.eval_elements(args)?;
        let mut named = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let value = self.eval_expr(&keyword.value)?;
            match &keyword.arg {
                Some(name) => named.push((name.to_string(), value)),
                None => match value {
                    PyValue::Dict(pairs) => {
                        for (key, value) in pairs.snapshot() {
                            let PyValue::Str(key) = key else {
                                return Err(Error::raise("TypeError", "keywords must be strings"));
                            };
                            named.push((key, value));
                        }
                    }
                    other => {
                        return Err(Error::raise(
                            "TypeError",
                            format!(
                                "argument after ** must be a mapping, not {}",
                                other.type_name()
                            ),
                        ));
                    }
                },
            }
        }
        Ok(Args::with_keywords(positional, named))
    }

    /// `receiver.method(...)`. The receiver may be any expression; list,
    /// dict and set methods edit the shared container in place.
    fn eval_method_call(
        &mut self,
        attr: &ast::ExprAttribute,
        call: &ast::ExprCall,
    ) -> Result<PyValue> {
        let method = attr.attr.as_str();
        let receiver = self.eval_expr(&attr.value)?;
        let args = self.eval_args(&call.args, &call.keywords)?;
        match &receiver {
            PyValue::List(list)
                if method == "sort" && args.keyword("key").is_some_and(|key| !key.is_none()) =>
            {
                args.expect("sort", 0, 0)?;
                let reverse = args.keyword("reverse").is_some_and(PyValue::is_truthy);
                let sorted =
                    builtins::sorted_with(self, list.snapshot(), args.keyword("key"), reverse)?;
                *list.borrow_mut() = sorted;
                Ok(PyValue::None)
            }
            PyValue::Module(_) => {
                let func = methods::get_attribute(&receiver, method)?;
                self.call_value(&func, args)
            }
            PyValue::Stream(stream) if method == "write" => {
                args.expect("write", 1, 1)?;
                let text = arg_str(&args.positional[0])?;
                self.streams.write(*stream, text);
                Ok(PyValue::Int(text.chars().count() as i64))
            }
            PyValue::Stream(_) if method == "flush" => Ok(PyValue::None),
            _ => methods::call_method(&receiver, method, args),
        }
    }

    /// Call any callable value.
    pub fn call_value(&mut self, func: &PyValue, args: Args) -> Result<PyValue> {
        match func {
            PyValue::Function(func) => self.call_function(func, args),
            PyValue::Builtin(name) => builtins::call_builtin(self, name, args),
            PyValue::Type(name) => builtins::call_type(name, args),
            PyValue::NativeFunction(native) => (native.func)(args),
            other => Err(Error::raise(
                "TypeError",
                format!("'{}' object is not callable", other.type_name()),
            )),
        }
    }

    fn call_function(&mut self, func: &Rc<UserFunction>, args: Args) -> Result<PyValue> {
        if self.calls.len() >= self.config.recursion_limit {
            return Err(Error::raise(
                "RecursionError",
                "maximum recursion depth exceeded",
            ));
        }
        let locals = bind_arguments(func, args)?;
        self.calls.push(Frame {
            function: func.name.clone(),
            func: Some(func.clone()),
            locals: Some(locals),
            declared_globals: Vec::new(),
            line: 0,
            source: func.source.clone(),
        });
        // Deep recursion continues on heap-allocated stack segments, so the
        // recursion limit trips before the host thread's stack runs out.
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || match &func.body {
            FunctionBody::Block(body) => self.exec_block(body).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => PyValue::None,
            }),
            FunctionBody::Lambda(expr) => {
                self.mark(expr.as_ref());
                self.eval_expr(expr)
                    .map_err(|err| self.attach_traceback(err))
            }
        });
        self.calls.pop();
        result
    }
}

impl Interpreter for Evaluator<'_, '_> {
    fn call(&mut self, func: &PyValue, args: Args) -> Result<PyValue> {
        self.call_value(func, args)
    }

    fn write(&mut self, stream: Stream, text: &str) {
        self.streams.write(stream, text);
    }
}

fn load_module(name: &str) -> Result<PyValue> {
    modules::load(name).ok_or_else(|| {
        Error::raise(
            "ModuleNotFoundError",
            format!("No module named '{}'", name),
        )
    })
}

fn handler_matches(class: &PyValue, kind: &str) -> Result<bool> {
    match class {
        PyValue::Type(name) if builtins::is_exception_type(name) => {
            Ok(builtins::exception_matches(kind, name))
        }
        PyValue::Tuple(classes) => {
            for class in classes {
                if handler_matches(class, kind)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Error::raise(
            "TypeError",
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}

fn target_names(target: &Expr, names: &mut Vec<String>) {
    match target {
        Expr::Name(name) => names.push(name.id.to_string()),
        Expr::Tuple(tuple) => tuple.elts.iter().for_each(|elt| target_names(elt, names)),
        Expr::List(list) => list.elts.iter().for_each(|elt| target_names(elt, names)),
        Expr::Starred(starred) => target_names(&starred.value, names),
        _ => {}
    }
}

/// `left op= right`. A list extends in place and a set or dict updates in
/// place, so every alias sees the change. Anything else rebinds.
fn augmented(op: &Operator, left: &PyValue, right: &PyValue) -> Result<PyValue> {
    match (op, left) {
        (Operator::Add, PyValue::List(items)) => {
            let extra = builtins::iterate(right)?;
            items.borrow_mut().extend(extra);
            Ok(left.clone())
        }
        (
            Operator::BitOr | Operator::BitAnd | Operator::BitXor | Operator::Sub,
            PyValue::Set(items),
        ) => match apply_binop(op, left, right)? {
            PyValue::Set(result) => {
                let result = result.snapshot();
                *items.borrow_mut() = result;
                Ok(left.clone())
            }
            other => Ok(other),
        },
        (Operator::BitOr, PyValue::Dict(pairs)) => match apply_binop(op, left, right)? {
            PyValue::Dict(result) => {
                let result = result.snapshot();
                *pairs.borrow_mut() = result;
                Ok(left.clone())
            }
            other => Ok(other),
        },
        _ => apply_binop(op, left, right),
    }
}

/// Names a function body binds, minus those it declares `global`.
///
/// Nested function bodies are their own scope and are not entered.
fn assigned_names(body: &[Stmt]) -> Vec<String> {
    let mut names = Vec::new();
    let mut globals = Vec::new();
    collect_bindings(body, &mut names, &mut globals);
    names.retain(|name| !globals.contains(name));
    names.sort();
    names.dedup();
    names
}

fn collect_bindings(body: &[Stmt], names: &mut Vec<String>, globals: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Stmt::Assign(s) => s.targets.iter().for_each(|t| target_names(t, names)),
            Stmt::AugAssign(s) => target_names(&s.target, names),
            Stmt::AnnAssign(s) => target_names(&s.target, names),
            Stmt::Delete(s) => s.targets.iter().for_each(|t| target_names(t, names)),
            Stmt::FunctionDef(def) => names.push(def.name.to_string()),
            Stmt::ClassDef(class) => names.push(class.name.to_string()),
            Stmt::Import(import) => {
                for alias in &import.names {
                    let full = alias.name.as_str();
                    let bound = match &alias.asname {
                        Some(asname) => asname.as_str(),
                        None => full.split('.').next().unwrap_or(full),
                    };
                    names.push(bound.to_string());
                }
            }
            Stmt::ImportFrom(import) => {
                for alias in import.names.iter().filter(|a| a.name.as_str() != "*") {
                    names.push(alias.asname.as_ref().unwrap_or(&alias.name).to_string());
                }
            }
            Stmt::Global(global) => globals.extend(global.names.iter().map(|n| n.to_string())),
            Stmt::For(s) => {
                target_names(&s.target, names);
                collect_bindings(&s.body, names, globals);
                collect_bindings(&s.orelse, names, globals);
            }
            Stmt::While(s) => {
                collect_bindings(&s.body, names, globals);
                collect_bindings(&s.orelse, names, globals);
            }
            Stmt::If(s) => {
                collect_bindings(&s.body, names, globals);
                collect_bindings(&s.orelse, names, globals);
            }
            Stmt::With(s) => {
                for item in &s.items {
                    if let Some(vars) = &item.optional_vars {
                        target_names(vars, names);
                    }
                }
                collect_bindings(&s.body, names, globals);
            }
            Stmt::Try(s) => {
                collect_bindings(&s.body, names, globals);
                for handler in &s.handlers {
                    let ExceptHandler::ExceptHandler(handler) = handler;
                    if let Some(name) = &handler.name {
                        names.push(name.to_string());
                    }
                    collect_bindings(&handler.body, names, globals);
                }
                collect_bindings(&s.orelse, names, globals);
                collect_bindings(&s.finalbody, names, globals);
            }
            _ => {}
        }
    }
}

fn constant_value(constant: &Constant) -> Result<PyValue> {
    Ok(match constant {
        Constant::None | Constant::Ellipsis => PyValue::None,
        Constant::Bool(b) => PyValue::Bool(*b),
        Constant::Str(s) => PyValue::Str(s.clone()),
        Constant::Int(i) => PyValue::Int(i.try_into().map_err(|_| {
            Error::raise("OverflowError", "integer literal is too large")
        })?),
        Constant::Float(f) => PyValue::Float(*f),
        Constant::Tuple(items) => PyValue::Tuple(
            items
                .iter()
                .map(constant_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        Constant::Bytes(_) => return Err(Error::Unsupported("a bytes literal".to_string())),
        Constant::Complex { .. } => {
            return Err(Error::Unsupported("a complex number".to_string()));
        }
    })
}

fn unary_op(op: &UnaryOp, operand: PyValue) -> Result<PyValue> {
    let symbol = match op {
        UnaryOp::Not => return Ok(PyValue::Bool(!operand.is_truthy())),
        UnaryOp::USub => "-",
        UnaryOp::UAdd => "+",
        UnaryOp::Invert => "~",
    };
    match (op, operand) {
        (UnaryOp::USub, PyValue::Int(i)) => i
            .checked_neg()
            .map(PyValue::Int)
            .ok_or_else(|| Error::raise("OverflowError", "integer overflow")),
        (UnaryOp::USub, PyValue::Bool(b)) => Ok(PyValue::Int(-(b as i64))),
        (UnaryOp::USub, PyValue::Float(f)) => Ok(PyValue::Float(-f)),
        (UnaryOp::USub, PyValue::Array(arr)) => {
            Ok(PyValue::Array(arr.map(|v| -v).astype(arr.dtype())))
        }
        (UnaryOp::UAdd, PyValue::Bool(b)) => Ok(PyValue::Int(b as i64)),
        (UnaryOp::UAdd, value @ (PyValue::Int(_) | PyValue::Float(_) | PyValue::Array(_))) => {
            Ok(value)
        }
        (UnaryOp::Invert, PyValue::Int(i)) => Ok(PyValue::Int(!i)),
        (UnaryOp::Invert, PyValue::Bool(b)) => Ok(PyValue::Int(!(b as i64))),
        (_, other) => Err(Error::raise(
            "TypeError",
            format!(
                "bad operand type for unary {}: '{}'",
                symbol,
                other.type_name()
            ),
        )),
    }
}

/// Bind call arguments to a function's parameters, Python style.
fn bind_arguments(func: &UserFunction, args: Args) -> Result<Namespace> {
    let mut locals = Namespace::new();
    let mut positional = args.positional.into_iter();

    for param in &func.params {
        match positional.next() {
            Some(value) => locals.set(param.name.clone(), value),
            None => break,
        }
    }
    let extra: Vec<PyValue> = positional.collect();
    match &func.vararg {
        Some(name) => locals.set(name.clone(), PyValue::Tuple(extra)),
        None if !extra.is_empty() => {
            let expected = func.params.len();
            let given = expected + extra.len();
            return Err(Error::raise(
                "TypeError",
                format!(
                    "{}() takes {} positional argument{} but {} {} given",
                    func.name,
                    expected,
                    if expected == 1 { "" } else { "s" },
                    given,
                    if given == 1 { "was" } else { "were" }
                ),
            ));
        }
        None => {}
    }

    let mut extra_keywords = Vec::new();
    for (name, value) in args.keywords {
        let known = func
            .params
            .iter()
            .chain(&func.kwonly)
            .any(|param| param.name == name);
        if known {
            if locals.contains(&name) {
                return Err(Error::raise(
                    "TypeError",
                    format!(
                        "{}() got multiple values for argument '{}'",
                        func.name, name
                    ),
                ));
            }
            locals.set(name, value);
        } else if func.kwarg.is_some() {
            extra_keywords.push((PyValue::Str(name), value));
        } else {
            return Err(Error::raise(
                "TypeError",
                format!(
                    "{}() got an unexpected keyword argument '{}'",
                    func.name, name
                ),
            ));
        }
    }
    if let Some(name) = &func.kwarg {
        locals.set(name.clone(), PyValue::dict(extra_keywords));
    }

    fill_defaults(func, &func.params, "positional", &mut locals)?;
    fill_defaults(func, &func.kwonly, "keyword-only", &mut locals)?;
    Ok(locals)
}

fn fill_defaults(
    func: &UserFunction,
    params: &[Param],
    kind: &str,
    locals: &mut Namespace,
) -> Result<()> {
    let mut missing = Vec::new();
    for param in params {
        if locals.contains(&param.name) {
            continue;
        }
        match &param.default {
            Some(default) => locals.set(param.name.clone(), default.clone()),
            None => missing.push(format!("'{}'", param.name)),
        }
    }
    let listed = match missing.as_slice() {
        [] => return Ok(()),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    };
    Err(Error::raise(
        "TypeError",
        format!(
            "{}() missing {} required {} argument{}: {}",
            func.name,
            missing.len(),
            kind,
            if missing.len() == 1 { "" } else { "s" },
            listed
        ),
    ))
}

/// Reject `return`, `break` and `continue` where Python's compiler would,
/// before any statement runs.
pub fn check_structure(body: &[Stmt], source: &SourceCode) -> Result<()> {
    walk_structure(body, false, false, source)
}

fn walk_structure(
    body: &[Stmt],
    in_function: bool,
    in_loop: bool,
    source: &SourceCode,
) -> Result<()> {
    for stmt in body {
        let misplaced = match stmt {
            Stmt::Return(_) if !in_function => Some("'return' outside function"),
            Stmt::Break(_) if !in_loop => Some("'break' outside loop"),
            Stmt::Continue(_) if !in_loop => Some("'continue' not properly in loop"),
            _ => None,
        };
        if let Some(message) = misplaced {
            return Err(Error::Syntax {
                message: message.to_string(),
                line: source.line_of(stmt.range().start().to_usize()),
            });
        }
        match stmt {
            Stmt::FunctionDef(def) => walk_structure(&def.body, true, false, source)?,
            Stmt::ClassDef(class) => walk_structure(&class.body, false, false, source)?,
            Stmt::For(s) => {
                walk_structure(&s.body, in_function, true, source)?;
                walk_structure(&s.orelse, in_function, in_loop, source)?;
            }
            Stmt::While(s) => {
                walk_structure(&s.body, in_function, true, source)?;
                walk_structure(&s.orelse, in_function, in_loop, source)?;
            }
            Stmt::If(s) => {
                walk_structure(&s.body, in_function, in_loop, source)?;
                walk_structure(&s.orelse, in_function, in_loop, source)?;
            }
            Stmt::With(s) => walk_structure(&s.body, in_function, in_loop, source)?,
            Stmt::Try(s) => {
                walk_structure(&s.body, in_function, in_loop, source)?;
                for handler in &s.handlers {
                    let ExceptHandler::ExceptHandler(handler) = handler;
                    walk_structure(&handler.body, in_function, in_loop, source)?;
                }
                walk_structure(&s.orelse, in_function, in_loop, source)?;
                walk_structure(&s.finalbody, in_function, in_loop, source)?;
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rustpython_parser::{Mode, parse};

    use super::*;

    fn run(code: &str) -> (Result<PyValue>, String) {
        let config = EngineConfig::default().with_recursion_limit(50);
        let mut globals = Namespace::new();
        let mut streams = Streams::new(None);
        let result = {
            let source = Arc::new(SourceCode::new(code));
            let parsed = parse(code, Mode::Module, "<string>").unwrap();
            let ast::Mod::Module(module) = parsed else {
                panic!("expected a module");
            };
            let mut evaluator = Evaluator::new(&mut globals, &mut streams, &config, source);
            evaluator.run_module(&module.body)
        };
        (result, streams.stdout.getvalue())
    }

    fn output(code: &str) -> String {
        let (result, out) = run(code);
        result.unwrap();
        out
    }

    #[test]
    fn test_closure_and_nested_recursion() {
        let code = "\
def outer(n):
    def fact(k):
        return 1 if k <= 1 else k * fact(k - 1)
    return fact(n)
print(outer(5))
";
        assert_eq!(output(code), "120\n");
    }

    #[test]
    fn test_nested_mutation_in_place() {
        let code = "\
grid = [[0, 0], [0, 0]]
grid[1][0] = 5
grid[0].append(9)
counts = {}
counts['a'] = counts.get('a', 0) + 1
counts['a'] += 1
print(grid, counts)
";
        assert_eq!(output(code), "[[0, 0, 9], [5, 0]] {'a': 2}\n");
    }

    #[test]
    fn test_global_list_mutated_from_function() {
        let code = "\
items = []
def add(x):
    items.append(x)
add(1)
add(2)
print(items)
";
        assert_eq!(output(code), "[1, 2]\n");
    }

    #[test]
    fn test_augmented_assignment_keeps_identity() {
        let code = "\
s = {1}
t = s
s |= {2}
xs = [1]
ys = xs
xs += 'ab'
n = 1
m = n
n += 1
print(t, ys, s is t, m)
";
        assert_eq!(output(code), "{1, 2} [1, 'a', 'b'] True 1\n");
    }

    #[test]
    fn test_assigned_names() {
        let code = "\
def f(a):
    global g
    g = 1
    x = a
    for i, (j, k) in []:
        pass
    try:
        pass
    except ValueError as err:
        del x
    import os.path
    def inner():
        hidden = 1
";
        let ast::Mod::Module(module) = parse(code, Mode::Module, "<string>").unwrap() else {
            panic!("expected a module");
        };
        let Stmt::FunctionDef(def) = &module.body[0] else {
            panic!("expected a def");
        };
        assert_eq!(
            assigned_names(&def.body),
            vec!["err", "i", "inner", "j", "k", "os", "x"]
        );
    }

    #[test]
    fn test_global_declaration() {
        let code = "\
total = 0
def bump():
    global total
    total += 10
bump()
print(total)
";
        assert_eq!(output(code), "10\n");
    }

    #[test]
    fn test_comprehension_does_not_leak() {
        let code = "\
x = 'kept'
squares = [x * x for x in range(4)]
print(squares, x)
";
        assert_eq!(output(code), "[0, 1, 4, 9] kept\n");
    }

    #[test]
    fn test_try_except_finally() {
        let code = "\
try:
    1 / 0
except (KeyError, ZeroDivisionError) as e:
    print('caught', e)
finally:
    print('done')
";
        assert_eq!(output(code), "caught division by zero\ndone\n");
    }

    #[test]
    fn test_unpacking() {
        let code = "\
first, *rest = [1, 2, 3]
(a, b), c = (1, 2), 3
print(first, rest, a, b)
";
        assert_eq!(output(code), "1 [2, 3] 1 2\n");

        let (result, _) = run("a, b, c = [1, 2]");
        assert_eq!(
            result.unwrap_err().to_string(),
            "ValueError: not enough values to unpack (expected 3, got 2)"
        );
    }

    #[test]
    fn test_argument_binding_errors() {
        let (result, _) = run("def f(a, b):\n    return a\nf(1)\n");
        assert_eq!(
            result.unwrap_err().to_string(),
            "TypeError: f() missing 1 required positional argument: 'b'"
        );

        let (result, _) = run("def f(a):\n    return a\nf(1, 2)\n");
        assert_eq!(
            result.unwrap_err().to_string(),
            "TypeError: f() takes 1 positional argument but 2 were given"
        );
    }

    #[test]
    fn test_traceback_frames() {
        let code = "\
def divide(a, b):
    return a / b
divide(1, 0)
";
        let (result, _) = run(code);
        let Error::Exception(exc) = result.unwrap_err() else {
            panic!("expected an exception");
        };
        let lines: Vec<(String, usize)> = exc
            .traceback
            .frames
            .iter()
            .map(|frame| (frame.function.clone(), frame.line))
            .collect();
        assert_eq!(
            lines,
            vec![("<module>".to_string(), 3), ("divide".to_string(), 2)]
        );
    }

    #[test]
    fn test_recursion_limit() {
        let (result, _) = run("def f(n):\n    return f(n + 1)\nf(0)\n");
        assert_eq!(
            result.unwrap_err().to_string(),
            "RecursionError: maximum recursion depth exceeded"
        );
    }

    #[test]
    fn test_return_outside_function_is_syntax_error() {
        let (result, out) = run("print('never')\nreturn 5\n");
        assert_eq!(
            result.unwrap_err().to_string(),
            "SyntaxError: 'return' outside function at line 2"
        );
        assert_eq!(out, "");
    }

    #[test]
    fn test_last_expression_value() {
        let (result, _) = run("x = 2\nx * 21");
        assert_eq!(result.unwrap(), PyValue::Int(42));
        let (result, _) = run("x = 2");
        assert_eq!(result.unwrap(), PyValue::None);
    }
}
