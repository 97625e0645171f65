//! Per-page post-processing scripts.
//!
//! A page can carry `<script type="text/x-postproc">` elements holding Lua.
//! Each one runs against the page through a `page` handle and is then
//! removed, so it never reaches the published HTML:
//!
//! ```lua
//! for _, id in ipairs(page:query("table")) do
//!   page:set_attr(id, "class", "wide")
//! end
//! page:insert(page:query("h1")[1], "afterend", "<p class=\"lede\">...</p>")
//! ```
//!
//! Every page gets a fresh interpreter with only the `string`, `table`,
//! `math` and `utf8` libraries loaded. There is no file, OS or module
//! access. A script that runs past its instruction limit is stopped and
//! fails the page.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mlua::{HookTriggers, Lua, LuaOptions, StdLib, UserData, UserDataMethods, VmState};

use crate::dom::{Document, NodeId, Selector};
use crate::error::Result;

/// Where [`insert`](PageHandle) puts new markup relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeBegin,
    AfterBegin,
    BeforeEnd,
    AfterEnd,
}

impl Position {
    fn parse(s: &str) -> mlua::Result<Self> {
        match s {
            "beforebegin" => Ok(Self::BeforeBegin),
            "afterbegin" => Ok(Self::AfterBegin),
            "beforeend" => Ok(Self::BeforeEnd),
            "afterend" => Ok(Self::AfterEnd),
            other => Err(mlua::Error::RuntimeError(format!(
                "invalid insert position `{other}`"
            ))),
        }
    }
}

/// The `page` global scripts see.
struct PageHandle {
    doc: Rc<RefCell<Document>>,
    path: String,
}

impl PageHandle {
    /// Resolve a script-supplied id to a live element.
    fn element(doc: &Document, id: u32) -> mlua::Result<NodeId> {
        let node = NodeId(id);
        if doc.tree().is_element(node) && doc.tree().is_attached(node) {
            Ok(node)
        } else {
            Err(mlua::Error::RuntimeError(format!("no element with id {id}")))
        }
    }
}

impl UserData for PageHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("path", |_, this, ()| Ok(this.path.clone()));

        methods.add_method("query", |lua, this, selector: String| {
            let selector = Selector::parse(&selector)
                .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
            let ids = this.doc.borrow().select(&selector).into_iter().map(|n| n.0);
            lua.create_sequence_from(ids)
        });

        methods.add_method("attr", |_, this, (id, name): (u32, String)| {
            let doc = this.doc.borrow();
            let node = Self::element(&doc, id)?;
            Ok(doc.tree().get_attr(node, &name).map(str::to_string))
        });

        methods.add_method(
            "set_attr",
            |_, this, (id, name, value): (u32, String, Option<String>)| {
                let mut doc = this.doc.borrow_mut();
                let node = Self::element(&doc, id)?;
                match value {
                    Some(value) => doc.tree_mut().set_attr(node, &name, &value),
                    None => doc.tree_mut().remove_attr(node, &name),
                }
                Ok(())
            },
        );

        methods.add_method("text", |_, this, id: u32| {
            let doc = this.doc.borrow();
            let node = Self::element(&doc, id)?;
            Ok(doc.tree().text_content(node))
        });

        methods.add_method("set_text", |_, this, (id, text): (u32, String)| {
            let mut doc = this.doc.borrow_mut();
            let node = Self::element(&doc, id)?;
            doc.tree_mut().set_text_content(node, &text);
            Ok(())
        });

        methods.add_method("remove", |_, this, id: u32| {
            let mut doc = this.doc.borrow_mut();
            let node = Self::element(&doc, id)?;
            doc.tree_mut().detach(node);
            Ok(())
        });

        methods.add_method(
            "insert",
            |_, this, (id, position, html): (u32, String, String)| {
                let position = Position::parse(&position)?;
                let mut doc = this.doc.borrow_mut();
                let target = Self::element(&doc, id)?;
                let nodes = doc.parse_synthetic(&html);
                let tree = doc.tree_mut();
                match position {
                    Position::BeforeBegin => {
                        for node in nodes {
                            tree.insert_before(target, node);
                        }
                    }
                    Position::AfterBegin => {
                        for node in nodes.into_iter().rev() {
                            tree.prepend(target, node);
                        }
                    }
                    Position::BeforeEnd => {
                        for node in nodes {
                            tree.append(target, node);
                        }
                    }
                    Position::AfterEnd => {
                        let mut after = target;
                        for node in nodes {
                            tree.insert_after(after, node);
                            after = node;
                        }
                    }
                }
                Ok(())
            },
        );
    }
}

/// Instructions between two checks of the limit.
const HOOK_INTERVAL: u32 = 1000;

/// Run and remove every script element matching `selector`. Returns the
/// number of scripts run. The first failing script aborts the page.
///
/// `instruction_limit` bounds the Lua instructions all of the page's scripts
/// may execute together; zero means no limit.
pub fn run_scripts(
    doc: &mut Document,
    selector: &Selector,
    path: &str,
    instruction_limit: u64,
) -> Result<usize> {
    let scripts = doc.select(selector);
    if scripts.is_empty() {
        return Ok(0);
    }

    let shared = Rc::new(RefCell::new(std::mem::take(doc)));
    let result = execute(&shared, &scripts, path, instruction_limit);
    *doc = match Rc::try_unwrap(shared) {
        Ok(cell) => cell.into_inner(),
        Err(shared) => shared.borrow().clone(),
    };
    result
}

fn execute(
    doc: &Rc<RefCell<Document>>,
    scripts: &[NodeId],
    path: &str,
    instruction_limit: u64,
) -> Result<usize> {
    let lua = Lua::new_with(
        StdLib::STRING | StdLib::TABLE | StdLib::MATH | StdLib::UTF8,
        LuaOptions::default(),
    )?;
    if instruction_limit > 0 {
        let executed = Cell::new(0u64);
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
            move |_, _| {
                executed.set(executed.get() + u64::from(HOOK_INTERVAL));
                if executed.get() > instruction_limit {
                    return Err(mlua::Error::runtime(format!(
                        "script exceeded its limit of {instruction_limit} instructions"
                    )));
                }
                Ok(VmState::Continue)
            },
        )?;
    }
    lua.globals().set(
        "page",
        PageHandle {
            doc: Rc::clone(doc),
            path: path.to_string(),
        },
    )?;

    let mut ran = 0;
    for (n, &script) in scripts.iter().enumerate() {
        let source = {
            let doc = doc.borrow();
            // Removed by an earlier script.
            if !doc.tree().is_attached(script) {
                continue;
            }
            doc.tree().text_content(script)
        };

        tracing::debug!(script = n + 1, "Running page script");
        lua.load(source.as_str())
            .set_name(format!("{path}: script {}", n + 1))
            .exec()?;
        doc.borrow_mut().tree_mut().detach(script);
        ran += 1;
    }
    Ok(ran)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn run_limited(src: &str, instruction_limit: u64) -> (Document, Result<usize>) {
        let mut doc = Document::parse(src);
        let selector = Selector::parse(r#"script[type="text/x-postproc"]"#).unwrap();
        let result = run_scripts(&mut doc, &selector, "2024/post/index.html", instruction_limit);
        (doc, result)
    }

    fn run(src: &str) -> (Document, Result<usize>) {
        run_limited(src, 1_000_000)
    }

    #[test]
    fn test_script_mutates_and_is_removed() {
        let (doc, result) = run(
            r##"<h1 id="t">Title</h1><p class="x">a</p><p class="x">b</p><script type="text/x-postproc">
for _, id in ipairs(page:query("p.x")) do
  page:set_attr(id, "data-n", page:text(id))
end
page:set_text(page:query("#t")[1], page:path())
</script>"##,
        );
        assert_eq!(result.unwrap(), 1);
        assert_eq!(
            doc.to_html(),
            r#"<h1 id="t">2024/post/index.html</h1><p class="x" data-n="a">a</p><p class="x" data-n="b">b</p>"#
        );
    }

    #[test]
    fn test_insert_positions() {
        let (doc, result) = run(
            r##"<div id="d"><b>mid</b></div><script type="text/x-postproc">
local d = page:query("#d")[1]
page:insert(d, "beforebegin", "<i>1</i>")
page:insert(d, "afterbegin", "<i>2</i><i>3</i>")
page:insert(d, "beforeend", "<i>4</i>")
page:insert(d, "afterend", "<i>5</i><i>6</i>")
</script>"##,
        );
        result.unwrap();
        assert_eq!(
            doc.to_html(),
            "<i>1</i><div id=\"d\"><i>2</i><i>3</i><b>mid</b><i>4</i></div><i>5</i><i>6</i>"
        );
    }

    #[test]
    fn test_set_attr_nil_removes_and_remove_detaches() {
        let (doc, result) = run(
            r##"<p id="a" title="t">x</p><p id="b">y</p><script type="text/x-postproc">
page:set_attr(page:query("#a")[1], "title", nil)
page:remove(page:query("#b")[1])
</script>"##,
        );
        result.unwrap();
        assert_eq!(doc.to_html(), r#"<p id="a">x</p>"#);
    }

    #[test]
    fn test_other_scripts_untouched() {
        let src = r#"<script>var x = 1;</script><script type="text/x-postproc">local a = 1</script>"#;
        let (doc, result) = run(src);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(doc.to_html(), "<script>var x = 1;</script>");
    }

    #[test]
    fn test_script_error_aborts() {
        let (_, result) = run(r#"<script type="text/x-postproc">error("boom")</script>"#);
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Script(_)));
        assert!(err.is_page_fatal());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_sandbox_has_no_io() {
        let (_, result) = run(r#"<script type="text/x-postproc">io.open("/etc/passwd")</script>"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_runaway_script_is_stopped() {
        let (_, result) = run_limited(
            r#"<p>x</p><script type="text/x-postproc">while true do end</script>"#,
            100_000,
        );
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Script(_)));
        assert!(err.is_page_fatal());
        assert!(err.to_string().contains("limit of 100000 instructions"));
    }

    #[test]
    fn test_limit_is_shared_by_the_page_scripts() {
        let busy = r#"<script type="text/x-postproc">for i = 1, 20000 do local x = i * 2 end</script>"#;
        let (_, result) = run_limited(&busy.repeat(2), 10_000_000);
        assert_eq!(result.unwrap(), 2);
        let (_, result) = run_limited(&busy.repeat(50), 200_000);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_id_is_an_error() {
        let (_, result) = run(r#"<script type="text/x-postproc">page:text(99999)</script>"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_script_removed_by_earlier_script_is_skipped() {
        let (doc, result) = run(
            r##"<script type="text/x-postproc">page:remove(page:query("#second")[1])</script><script id="second" type="text/x-postproc">error("never")</script><p>ok</p>"##,
        );
        assert_eq!(result.unwrap(), 1);
        assert_eq!(doc.to_html(), "<p>ok</p>");
    }
}
