// src/eval/rhai_sandbox.rs

//! [`Sandbox`] backed by an embedded `rhai` engine.
//!
//! Every execution builds a fresh engine with a restricted surface:
//! - no module imports and no `eval`
//! - operation, call depth and data size budgets
//! - a wall-clock deadline checked from the progress callback
//! - `console` (and `print`/`debug`) captured into an ordered log
//! - in DOM mode, `document` bound to a private copy of the template
//!
//! `console` and `document` are served by the variable resolver so they are
//! visible inside script functions as well as at the top level.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{AST, Array, Dynamic, Engine, EvalAltResult};
use tracing::{debug, trace};

use super::sandbox::{Sandbox, SandboxLimits, ScriptError, ScriptOutcome, ScriptValue};
use crate::dom::{Document, NodeId};

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Production sandbox. Cheap to clone; holds only its limits.
#[derive(Debug, Clone, Default)]
pub struct RhaiSandbox {
    limits: SandboxLimits,
}

impl RhaiSandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    fn engine(&self, console: &Console, document: Option<&DocumentHandle>) -> Engine {
        let mut engine = Engine::new();
        engine.set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");
        engine.disable_symbol("import");

        engine
            .set_max_operations(self.limits.max_operations)
            .set_max_call_levels(self.limits.max_call_depth)
            .set_max_string_size(self.limits.max_string_size)
            .set_max_array_size(self.limits.max_array_size)
            .set_max_map_size(self.limits.max_map_size);

        let deadline = Instant::now() + self.limits.timeout;
        engine.on_progress(move |ops| {
            if ops % 512 == 0 && Instant::now() >= deadline {
                Some(Dynamic::from("deadline"))
            } else {
                None
            }
        });

        let out = console.clone();
        engine.on_print(move |line| out.push(line.to_string()));
        let out = console.clone();
        engine.on_debug(move |line, _source, _pos| out.push(line.to_string()));

        register_console(&mut engine);
        if document.is_some() {
            register_dom(&mut engine);
        }

        bind_globals(&mut engine, console.clone(), document.cloned());
        engine
    }

    fn execute(
        &self,
        code: &str,
        follow_up: Option<&str>,
        document: Option<DocumentHandle>,
    ) -> ScriptOutcome {
        let console = Console::default();
        let started = Instant::now();

        let result = {
            let engine = self.engine(&console, document.as_ref());
            compile_program(&engine, code, follow_up).and_then(|ast| {
                engine
                    .eval_ast::<Dynamic>(&ast)
                    .map(script_value)
                    .map_err(|err| self.classify(&err))
            })
        };

        let logs = console.take();
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            log_lines = logs.len(),
            "sandbox execution finished"
        );
        trace!(?logs, "captured console output");

        ScriptOutcome {
            result,
            logs,
            document: document.map(|d| d.0.borrow().clone()),
        }
    }

    fn classify(&self, err: &EvalAltResult) -> ScriptError {
        match err {
            EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => self.classify(inner),
            EvalAltResult::ErrorRuntime(value, _) => ScriptError::Thrown(value.to_string()),
            EvalAltResult::ErrorTerminated(_, _) => ScriptError::Timeout(self.limits.timeout),
            EvalAltResult::ErrorTooManyOperations(_) => ScriptError::BudgetExceeded(format!(
                "operation budget of {} exceeded",
                self.limits.max_operations
            )),
            EvalAltResult::ErrorStackOverflow(_) => ScriptError::BudgetExceeded(format!(
                "call depth limit of {} exceeded",
                self.limits.max_call_depth
            )),
            EvalAltResult::ErrorDataTooLarge(what, _) => {
                ScriptError::BudgetExceeded(format!("{what} exceeds the sandbox size limit"))
            }
            other => ScriptError::Runtime(other.to_string()),
        }
    }
}

impl Sandbox for RhaiSandbox {
    fn run_pure(&self, code: &str, follow_up: Option<&str>) -> ScriptOutcome {
        self.execute(code, follow_up, None)
    }

    fn run_with_document(
        &self,
        code: &str,
        follow_up: Option<&str>,
        document: Document,
    ) -> ScriptOutcome {
        self.execute(code, follow_up, Some(DocumentHandle::new(document)))
    }

    fn declared_functions(&self, code: &str) -> Result<Vec<String>, ScriptError> {
        let engine = self.engine(&Console::default(), None);
        let ast = engine
            .compile(code)
            .map_err(|e| ScriptError::Compile(e.to_string()))?;
        Ok(ast.iter_functions().map(|f| f.name.to_string()).collect())
    }
}

// `on_var` is flagged as a volatile API upstream.
#[allow(deprecated)]
fn bind_globals(engine: &mut Engine, console: Console, document: Option<DocumentHandle>) {
    engine.on_var(move |name, _index, _context| {
        Ok(match name {
            "console" => Some(Dynamic::from(console.clone())),
            "document" => document.as_ref().map(|d| Dynamic::from(d.clone())),
            _ => None,
        })
    });
}

fn compile_program(
    engine: &Engine,
    code: &str,
    follow_up: Option<&str>,
) -> Result<AST, ScriptError> {
    let ast = engine
        .compile(code)
        .map_err(|e| ScriptError::Compile(e.to_string()))?;
    match follow_up {
        Some(extra) => {
            let extra = engine
                .compile(extra)
                .map_err(|e| ScriptError::Compile(e.to_string()))?;
            Ok(ast.merge(&extra))
        }
        None => Ok(ast),
    }
}

fn script_value(value: Dynamic) -> ScriptValue {
    if value.is_unit() {
        ScriptValue::Unit
    } else if let Ok(b) = value.as_bool() {
        ScriptValue::Bool(b)
    } else {
        ScriptValue::Text(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// console

#[derive(Debug, Clone, Default)]
struct Console {
    lines: Rc<RefCell<Vec<String>>>,
}

impl Console {
    fn push(&self, line: String) {
        self.lines.borrow_mut().push(line);
    }

    fn push_parts(&self, parts: &[Dynamic]) {
        let line = parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.push(line);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }
}

fn register_console(engine: &mut Engine) {
    engine.register_type_with_name::<Console>("Console");
    for name in ["log", "info", "warn", "error"] {
        engine
            .register_fn(name, |c: Console| c.push(String::new()))
            .register_fn(name, |c: Console, a: Dynamic| c.push_parts(&[a]))
            .register_fn(name, |c: Console, a: Dynamic, b: Dynamic| {
                c.push_parts(&[a, b])
            })
            .register_fn(name, |c: Console, a: Dynamic, b: Dynamic, d: Dynamic| {
                c.push_parts(&[a, b, d])
            });
    }
}

// ---------------------------------------------------------------------------
// document bindings

#[derive(Debug, Clone)]
struct DocumentHandle(Rc<RefCell<Document>>);

impl DocumentHandle {
    fn new(document: Document) -> Self {
        Self(Rc::new(RefCell::new(document)))
    }

    fn element(&self, id: Option<NodeId>) -> Dynamic {
        match id {
            Some(id) => Dynamic::from(ElementHandle {
                doc: Rc::clone(&self.0),
                id,
            }),
            None => Dynamic::UNIT,
        }
    }

    fn root(&self) -> NodeId {
        self.0.borrow().root()
    }
}

#[derive(Debug, Clone)]
struct ElementHandle {
    doc: Rc<RefCell<Document>>,
    id: NodeId,
}

impl ElementHandle {
    fn handle(&self) -> DocumentHandle {
        DocumentHandle(Rc::clone(&self.doc))
    }

    fn read<R>(&self, f: impl FnOnce(&Document, NodeId) -> R) -> R {
        f(&self.doc.borrow(), self.id)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Document, NodeId) -> R) -> R {
        f(&mut self.doc.borrow_mut(), self.id)
    }
}

#[derive(Debug, Clone)]
struct ClassList(ElementHandle);

fn query_one(doc: &DocumentHandle, scope: NodeId, selector: &str) -> ScriptResult<Dynamic> {
    let found = doc
        .0
        .borrow()
        .query_selector(scope, selector)
        .map_err(|e| e.to_string())?;
    Ok(doc.element(found))
}

fn query_all(doc: &DocumentHandle, scope: NodeId, selector: &str) -> ScriptResult<Array> {
    let found = doc
        .0
        .borrow()
        .query_selector_all(scope, selector)
        .map_err(|e| e.to_string())?;
    Ok(found.into_iter().map(|id| doc.element(Some(id))).collect())
}

fn register_dom(engine: &mut Engine) {
    engine
        .register_type_with_name::<DocumentHandle>("Document")
        .register_type_with_name::<ElementHandle>("Element")
        .register_type_with_name::<ClassList>("ClassList");

    register_document_api(engine);
    register_element_api(engine);
    register_class_list_api(engine);
}

fn register_document_api(engine: &mut Engine) {
    for name in ["query_selector", "querySelector"] {
        engine.register_fn(name, |d: DocumentHandle, selector: &str| {
            let root = d.root();
            query_one(&d, root, selector)
        });
    }
    for name in ["query_selector_all", "querySelectorAll"] {
        engine.register_fn(name, |d: DocumentHandle, selector: &str| {
            let root = d.root();
            query_all(&d, root, selector)
        });
    }
    for name in ["get_element_by_id", "getElementById"] {
        engine.register_fn(name, |d: DocumentHandle, id: &str| {
            let found = d.0.borrow().get_element_by_id(id);
            d.element(found)
        });
    }
    for name in ["create_element", "createElement"] {
        engine.register_fn(name, |d: DocumentHandle, tag: &str| {
            let id = d.0.borrow_mut().create_element(tag);
            d.element(Some(id))
        });
    }
    engine
        .register_get("body", |d: &mut DocumentHandle| {
            let body = d.0.borrow().body();
            d.element(body)
        })
        .register_get("head", |d: &mut DocumentHandle| {
            let head = d.0.borrow().head();
            d.element(head)
        });
}

fn register_element_api(engine: &mut Engine) {
    for name in ["tag_name", "tagName"] {
        engine.register_get(name, |e: &mut ElementHandle| {
            e.read(|doc, id| doc.tag_name(id).unwrap_or_default().to_ascii_uppercase())
        });
    }
    for name in ["text_content", "textContent", "inner_text", "innerText"] {
        engine
            .register_get(name, |e: &mut ElementHandle| e.read(|doc, id| doc.text_content(id)))
            .register_set(name, |e: &mut ElementHandle, value: Dynamic| {
                e.write(|doc, id| doc.set_text_content(id, &value.to_string()))
            });
    }
    for name in ["outer_html", "outerHTML"] {
        engine.register_get(name, |e: &mut ElementHandle| e.read(|doc, id| doc.outer_html(id)));
    }
    for name in ["inner_html", "innerHTML"] {
        engine
            .register_get(name, |e: &mut ElementHandle| e.read(|doc, id| doc.inner_html(id)))
            .register_set(name, |e: &mut ElementHandle, value: Dynamic| {
                e.write(|doc, id| doc.set_inner_html(id, &value.to_string()))
            });
    }
    engine
        .register_get("id", |e: &mut ElementHandle| {
            e.read(|doc, id| doc.attribute(id, "id").unwrap_or_default().to_string())
        })
        .register_set("id", |e: &mut ElementHandle, value: Dynamic| {
            e.write(|doc, id| doc.set_attribute(id, "id", &value.to_string()))
        });
    for name in ["class_name", "className"] {
        engine
            .register_get(name, |e: &mut ElementHandle| {
                e.read(|doc, id| doc.attribute(id, "class").unwrap_or_default().to_string())
            })
            .register_set(name, |e: &mut ElementHandle, value: Dynamic| {
                e.write(|doc, id| doc.set_attribute(id, "class", &value.to_string()))
            });
    }
    for name in ["class_list", "classList"] {
        engine.register_get(name, |e: &mut ElementHandle| ClassList(e.clone()));
    }
    engine.register_get("children", |e: &mut ElementHandle| {
        let handle = e.handle();
        let children = e.read(|doc, id| doc.element_children(id));
        children
            .into_iter()
            .map(|c| handle.element(Some(c)))
            .collect::<Array>()
    });
    for name in ["parent_element", "parentElement"] {
        engine.register_get(name, |e: &mut ElementHandle| {
            let parent = e.read(|doc, id| doc.parent_element(id));
            e.handle().element(parent)
        });
    }

    for name in ["get_attribute", "getAttribute"] {
        engine.register_fn(name, |e: ElementHandle, attr: &str| {
            e.read(|doc, id| match doc.attribute(id, attr) {
                Some(v) => Dynamic::from(v.to_string()),
                None => Dynamic::UNIT,
            })
        });
    }
    for name in ["set_attribute", "setAttribute"] {
        engine.register_fn(name, |e: ElementHandle, attr: &str, value: Dynamic| {
            e.write(|doc, id| doc.set_attribute(id, attr, &value.to_string()))
        });
    }
    for name in ["remove_attribute", "removeAttribute"] {
        engine.register_fn(name, |e: ElementHandle, attr: &str| {
            e.write(|doc, id| doc.remove_attribute(id, attr))
        });
    }
    for name in ["has_attribute", "hasAttribute"] {
        engine.register_fn(name, |e: ElementHandle, attr: &str| {
            e.read(|doc, id| doc.attribute(id, attr).is_some())
        });
    }
    for name in ["append_child", "appendChild", "append"] {
        engine.register_fn(
            name,
            |parent: ElementHandle, child: ElementHandle| -> ScriptResult<ElementHandle> {
                if !Rc::ptr_eq(&parent.doc, &child.doc) {
                    return Err("cannot move an element between documents".into());
                }
                if !parent.write(|doc, id| doc.append_child(id, child.id)) {
                    return Err("cannot append an element inside itself".into());
                }
                Ok(child)
            },
        );
    }
    engine.register_fn("remove", |e: ElementHandle| e.write(|doc, id| doc.detach(id)));
    for name in ["query_selector", "querySelector"] {
        engine.register_fn(name, |e: ElementHandle, selector: &str| {
            query_one(&e.handle(), e.id, selector)
        });
    }
    for name in ["query_selector_all", "querySelectorAll"] {
        engine.register_fn(name, |e: ElementHandle, selector: &str| {
            query_all(&e.handle(), e.id, selector)
        });
    }

    engine
        .register_fn("==", |a: ElementHandle, b: ElementHandle| {
            Rc::ptr_eq(&a.doc, &b.doc) && a.id == b.id
        })
        .register_fn("!=", |a: ElementHandle, b: ElementHandle| {
            !(Rc::ptr_eq(&a.doc, &b.doc) && a.id == b.id)
        })
        .register_fn("to_string", |e: &mut ElementHandle| {
            e.read(|doc, id| format!("<{}>", doc.tag_name(id).unwrap_or_default()))
        });
}

fn register_class_list_api(engine: &mut Engine) {
    engine
        .register_fn("add", |c: ClassList, class: &str| {
            c.0.write(|doc, id| doc.add_class(id, class))
        })
        .register_fn("remove", |c: ClassList, class: &str| {
            c.0.write(|doc, id| doc.remove_class(id, class))
        })
        .register_fn("toggle", |c: ClassList, class: &str| {
            c.0.write(|doc, id| doc.toggle_class(id, class))
        })
        .register_fn("contains", |c: ClassList, class: &str| {
            c.0.read(|doc, id| doc.has_class(id, class))
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sandbox() -> RhaiSandbox {
        RhaiSandbox::new(SandboxLimits {
            timeout: Duration::from_millis(500),
            ..SandboxLimits::default()
        })
    }

    #[test]
    fn thrown_value_inside_function_is_reported_verbatim() {
        let out = sandbox().run_pure(r#"fn f() { throw "x"; }"#, Some("f()"));
        assert_eq!(out.result, Err(ScriptError::Thrown("x".to_string())));
    }

    #[test]
    fn console_output_is_captured_in_order() {
        let out = sandbox().run_pure(
            r#"console.log("hello", 42); print("plain"); console.warn("careful");"#,
            None,
        );
        assert!(out.result.is_ok());
        assert_eq!(out.logs, vec!["hello 42", "plain", "careful"]);
    }

    #[test]
    fn infinite_loop_is_stopped() {
        let out = sandbox().run_pure("loop { }", None);
        assert!(matches!(
            out.result,
            Err(ScriptError::BudgetExceeded(_)) | Err(ScriptError::Timeout(_))
        ));
    }

    #[test]
    fn eval_and_imports_are_unavailable() {
        assert!(sandbox().run_pure(r#"eval("40 + 2")"#, None).result.is_err());
        assert!(sandbox().run_pure(r#"import "fs" as fs;"#, None).result.is_err());
    }

    #[test]
    fn document_is_private_and_visible_inside_functions() {
        let template = Document::parse(r#"<div id="app"><h1 id="title">Loading</h1></div>"#);
        let out = sandbox().run_with_document(
            r##"
            fn render() {
                let title = document.query_selector("#title");
                title.text_content = "Upgrade your skills today";
                document.getElementById("app").classList.toggle("dark");
            }
            render();
            "##,
            Some(r##"document.query_selector("#app").class_list.contains("dark")"##),
            template.clone(),
        );
        assert_eq!(out.result, Ok(ScriptValue::Bool(true)));

        let after = out.document.unwrap();
        let title = after.get_element_by_id("title").unwrap();
        assert_eq!(after.text_content(title), "Upgrade your skills today");
        // The template itself is untouched.
        let original = template.get_element_by_id("title").unwrap();
        assert_eq!(template.text_content(original), "Loading");
    }

    #[test]
    fn outer_html_includes_the_element_itself() {
        let out = sandbox().run_with_document(
            r#"document.query_selector("p").outerHTML"#,
            None,
            Document::parse(r#"<main><p class="lead">Hi</p></main>"#),
        );
        assert_eq!(
            out.result,
            Ok(ScriptValue::Text(r#"<p class="lead">Hi</p>"#.to_string()))
        );
    }

    #[test]
    fn document_is_absent_in_pure_mode() {
        let out = sandbox().run_pure(r#"document.query_selector("p")"#, None);
        assert!(out.result.is_err());
    }

    #[test]
    fn missing_element_is_unit() {
        let out = sandbox().run_with_document(
            r#"document.query_selector(".nope") == ()"#,
            None,
            Document::parse("<p></p>"),
        );
        assert_eq!(out.result, Ok(ScriptValue::Bool(true)));
    }

    #[test]
    fn declared_functions_lists_names() {
        let names = sandbox()
            .declared_functions("fn render_hero() {}\nfn toggle_theme(x) { x }")
            .unwrap();
        assert!(names.contains(&"render_hero".to_string()));
        assert!(names.contains(&"toggle_theme".to_string()));
        assert!(matches!(
            sandbox().declared_functions("fn ("),
            Err(ScriptError::Compile(_))
        ));
    }
}
