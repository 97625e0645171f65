//! Math rendering.
//!
//! `<code class="language-math">` blocks are rendered in display mode and
//! replace their wrapping `<pre>`; inline code whose text is `$...$` is
//! rendered inline and replaces just the `<code>`. The renderer itself is a
//! [`MathEngine`]; production runs use the KaTeX command line through
//! [`KatexCommand`].

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::config::MathConfig;
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};

/// What went wrong in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathErrorKind {
    /// A character or command the engine has no glyph for.
    UnknownSymbol,
    /// Malformed TeX.
    Parse,
    /// The engine could not run or produced unusable output.
    Engine,
}

impl fmt::Display for MathErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MathErrorKind::UnknownSymbol => "unknown symbol",
            MathErrorKind::Parse => "parse error",
            MathErrorKind::Engine => "engine error",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct MathError {
    pub kind: MathErrorKind,
    pub message: String,
}

impl MathError {
    pub fn new(kind: MathErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// How to react to a class of rendering error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Render best-effort without comment.
    Ignore,
    /// Render best-effort and log a warning.
    Warn,
    /// Abort the page.
    Fail,
}

pub type StrictPolicy = fn(MathErrorKind) -> Strictness;

/// Unknown symbols are ignored, everything else warns. Nothing fails a page.
pub fn default_policy(kind: MathErrorKind) -> Strictness {
    match kind {
        MathErrorKind::UnknownSymbol => Strictness::Ignore,
        MathErrorKind::Parse | MathErrorKind::Engine => Strictness::Warn,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub display_mode: bool,
    /// When false the engine renders errors in place instead of failing.
    pub throw_on_error: bool,
    pub strict: StrictPolicy,
}

impl RenderOptions {
    pub fn display(strict: StrictPolicy) -> Self {
        Self {
            display_mode: true,
            throw_on_error: true,
            strict,
        }
    }

    pub fn inline(strict: StrictPolicy) -> Self {
        Self {
            display_mode: false,
            ..Self::display(strict)
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::inline(default_policy)
    }
}

/// TeX to HTML.
pub trait MathEngine {
    fn render(&self, tex: &str, options: &RenderOptions) -> std::result::Result<String, MathError>;
}

/// Runs the KaTeX CLI once per formula.
#[derive(Debug, Clone)]
pub struct KatexCommand {
    program: String,
    args: Vec<String>,
}

impl KatexCommand {
    /// `command` is the program followed by any leading arguments.
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::InvalidConfig("math.command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl MathEngine for KatexCommand {
    fn render(&self, tex: &str, options: &RenderOptions) -> std::result::Result<String, MathError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if options.display_mode {
            command.arg("--display-mode");
        }
        if options.throw_on_error {
            // Strict mode turns LaTeX-incompatible input into errors we can
            // classify; the lenient retry drops it.
            command.arg("--strict");
        } else {
            command.arg("--no-throw-on-error");
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MathError::new(
                    MathErrorKind::Engine,
                    format!("failed to run {}: {e}", self.program),
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(tex.as_bytes())
                .map_err(|e| MathError::new(MathErrorKind::Engine, e.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| MathError::new(MathErrorKind::Engine, e.to_string()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)))
        }
    }
}

/// Sort a KaTeX error message into a [`MathErrorKind`].
fn classify_stderr(stderr: &str) -> MathError {
    let message = stderr
        .lines()
        .find(|l| l.contains("Error") || l.contains("error"))
        .unwrap_or(stderr)
        .trim();
    let kind = if stderr.contains("[unknownSymbol]") || stderr.contains("Unrecognized Unicode") {
        MathErrorKind::UnknownSymbol
    } else if stderr.contains("ParseError") || stderr.contains("parse error") {
        MathErrorKind::Parse
    } else {
        MathErrorKind::Engine
    };
    MathError::new(kind, message)
}

/// Render every math node in the page with `engine`. Returns the number of
/// nodes replaced.
pub fn render_math(doc: &mut Document, engine: &dyn MathEngine, strict: StrictPolicy) -> Result<usize> {
    let codes = doc.tree().elements_by_tag(doc.root(), "code");
    let mut rendered = 0;

    for code in codes {
        if !doc.tree().is_attached(code) {
            continue;
        }
        let text = doc.tree().text_content(code);

        let (target, wrapper, html) = if doc.tree().has_class(code, "language-math") {
            let Some(html) = render_with_policy(engine, &text, RenderOptions::display(strict))?
            else {
                continue;
            };
            let target = doc
                .tree()
                .parent(code)
                .filter(|&p| doc.tree().is_element_named(p, "pre"))
                .unwrap_or(code);
            (target, "p", html)
        } else if let Some(tex) = inline_tex(&text) {
            let Some(html) = render_with_policy(engine, tex, RenderOptions::inline(strict))? else {
                continue;
            };
            (code, "span", html)
        } else {
            continue;
        };

        replace_with_rendered(doc, target, wrapper, &html);
        rendered += 1;
    }
    Ok(rendered)
}

/// The TeX inside `$...$`, if the trimmed text is exactly that on one line.
fn inline_tex(text: &str) -> Option<&str> {
    let tex = text.trim().strip_prefix('$')?.strip_suffix('$')?;
    (!tex.is_empty() && !tex.contains('\n')).then_some(tex)
}

/// Render, consulting the policy on failure. `Ok(None)` means the node
/// should be left as it is.
fn render_with_policy(
    engine: &dyn MathEngine,
    tex: &str,
    options: RenderOptions,
) -> Result<Option<String>> {
    let err = match engine.render(tex, &options) {
        Ok(html) => return Ok(Some(html)),
        Err(err) => err,
    };

    match (options.strict)(err.kind) {
        Strictness::Fail => return Err(err.into()),
        Strictness::Warn => tracing::warn!(kind = %err.kind, tex, "{}", err.message),
        Strictness::Ignore => tracing::debug!(kind = %err.kind, tex, "{}", err.message),
    }

    let lenient = RenderOptions {
        throw_on_error: false,
        ..options
    };
    match engine.render(tex, &lenient) {
        Ok(html) => Ok(Some(html)),
        Err(err) => {
            tracing::warn!(tex, "Math left unrendered: {err}");
            Ok(None)
        }
    }
}

fn replace_with_rendered(doc: &mut Document, target: NodeId, wrapper: &str, html: &str) {
    let nodes = doc.parse_synthetic(html);
    let tree = doc.tree_mut();
    let container = tree.create_html_element(wrapper, &[]);
    for node in nodes {
        tree.append(container, node);
    }
    tree.replace(target, container);
}

/// The stylesheet rendered math depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    pub href: String,
    pub integrity: Option<String>,
}

impl Stylesheet {
    /// `None` when the configured href is empty.
    pub fn from_config(config: &MathConfig) -> Option<Self> {
        (!config.stylesheet.is_empty()).then(|| Self {
            href: config.stylesheet.clone(),
            integrity: config.stylesheet_integrity.clone(),
        })
    }
}

/// Append a `<link rel="stylesheet">` for `sheet` to the page's `head`,
/// unless one with the same href is already there. Returns whether a link
/// was added.
pub fn link_stylesheet(doc: &mut Document, sheet: &Stylesheet) -> bool {
    let tree = doc.tree();
    let Some(&head) = tree.elements_by_tag(tree.root(), "head").first() else {
        tracing::debug!("No head to link the math stylesheet from");
        return false;
    };
    let linked = tree.elements_by_tag(head, "link").into_iter().any(|link| {
        tree.get_attr(link, "href") == Some(sheet.href.as_str())
            && tree
                .get_attr(link, "rel")
                .is_some_and(|rel| rel.eq_ignore_ascii_case("stylesheet"))
    });
    if linked {
        return false;
    }

    let mut attrs = vec![("rel", "stylesheet"), ("href", sheet.href.as_str())];
    if let Some(integrity) = &sheet.integrity {
        attrs.push(("integrity", integrity.as_str()));
        attrs.push(("crossorigin", "anonymous"));
    }
    let tree = doc.tree_mut();
    let link = tree.create_html_element("link", &attrs);
    tree.append(head, link);
    true
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Wraps the TeX in a marker element; fails on TeX containing `\bad`
    /// unless errors are rendered in place.
    #[derive(Default)]
    pub(crate) struct StubEngine {
        pub calls: RefCell<Vec<(String, bool, bool)>>,
        pub fail_kind: Option<MathErrorKind>,
    }

    impl MathEngine for StubEngine {
        fn render(
            &self,
            tex: &str,
            options: &RenderOptions,
        ) -> std::result::Result<String, MathError> {
            self.calls.borrow_mut().push((
                tex.to_string(),
                options.display_mode,
                options.throw_on_error,
            ));
            if tex.contains("\\bad") && options.throw_on_error {
                return Err(MathError::new(
                    self.fail_kind.unwrap_or(MathErrorKind::Parse),
                    "Undefined control sequence",
                ));
            }
            let mode = if options.display_mode { "display" } else { "inline" };
            Ok(format!(r#"<span class="katex {mode}">{tex}</span>"#))
        }
    }

    #[test]
    fn test_display_math_replaces_pre() {
        let mut doc = Document::parse(
            r#"<div><pre><code class="language-math">x^2</code></pre></div>"#,
        );
        let engine = StubEngine::default();
        assert_eq!(render_math(&mut doc, &engine, default_policy).unwrap(), 1);
        assert_eq!(
            doc.to_html(),
            r#"<div><p><span class="katex display">x^2</span></p></div>"#
        );
    }

    #[test]
    fn test_inline_math_replaces_code() {
        let mut doc = Document::parse("<p>Let <code> $x^2$ </code> and <code>$</code> and <code>$a\nb$</code>.</p>");
        let engine = StubEngine::default();
        assert_eq!(render_math(&mut doc, &engine, default_policy).unwrap(), 1);
        assert_eq!(
            doc.to_html(),
            "<p>Let <span><span class=\"katex inline\">x^2</span></span> and <code>$</code> and <code>$a\nb$</code>.</p>"
        );
    }

    #[test]
    fn test_warn_retries_without_throwing() {
        let mut doc = Document::parse(r#"<p><code>$\bad$</code></p>"#);
        let engine = StubEngine::default();
        render_math(&mut doc, &engine, default_policy).unwrap();
        let calls = engine.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].2);
        assert!(!calls[1].2);
        assert!(doc.to_html().contains("katex inline"));
    }

    #[test]
    fn test_fail_policy_aborts() {
        fn strict(_: MathErrorKind) -> Strictness {
            Strictness::Fail
        }
        let mut doc = Document::parse(r#"<pre><code class="language-math">\bad</code></pre>"#);
        let engine = StubEngine::default();
        let err = render_math(&mut doc, &engine, strict).unwrap_err();
        assert!(matches!(err, Error::Math(_)));
        assert!(err.is_page_fatal());
    }

    #[test]
    fn test_rendered_nodes_are_synthetic() {
        let mut doc = Document::parse(r#"<p><code>$y$</code></p>"#);
        render_math(&mut doc, &StubEngine::default(), default_policy).unwrap();
        let span = doc.tree().elements_by_tag(doc.root(), "span")[0];
        assert!(doc.location_of(span).is_none());
    }

    #[test]
    fn test_link_stylesheet_once() {
        let sheet = Stylesheet {
            href: "/katex.css".into(),
            integrity: Some("sha384-abc".into()),
        };
        let mut doc = Document::parse("<html><head><title>T</title></head><body></body></html>");
        assert!(link_stylesheet(&mut doc, &sheet));
        assert!(!link_stylesheet(&mut doc, &sheet));
        assert_eq!(
            doc.to_html(),
            "<html><head><title>T</title><link rel=\"stylesheet\" href=\"/katex.css\" \
             integrity=\"sha384-abc\" crossorigin=\"anonymous\"></head><body></body></html>"
        );
    }

    #[test]
    fn test_link_stylesheet_needs_head() {
        let sheet = Stylesheet {
            href: "/katex.css".into(),
            integrity: None,
        };
        let mut doc = Document::parse("<p>x</p>");
        assert!(!link_stylesheet(&mut doc, &sheet));
        assert_eq!(doc.to_html(), "<p>x</p>");
    }

    #[test]
    fn test_stylesheet_from_config() {
        let mut config = MathConfig::default();
        assert!(Stylesheet::from_config(&config).is_some());
        config.stylesheet.clear();
        assert!(Stylesheet::from_config(&config).is_none());
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(default_policy(MathErrorKind::UnknownSymbol), Strictness::Ignore);
        assert_eq!(default_policy(MathErrorKind::Parse), Strictness::Warn);
        assert_eq!(default_policy(MathErrorKind::Engine), Strictness::Warn);
    }

    #[test]
    fn test_classify_stderr() {
        let err = classify_stderr(
            "LaTeX-incompatible input and strict mode is set to 'error': \
             Unrecognized Unicode character \"é\" [unknownSymbol]",
        );
        assert_eq!(err.kind, MathErrorKind::UnknownSymbol);
        let err = classify_stderr("ParseError: KaTeX parse error: Undefined control sequence: \\bad");
        assert_eq!(err.kind, MathErrorKind::Parse);
        assert_eq!(classify_stderr("node: not found").kind, MathErrorKind::Engine);
    }

    #[test]
    fn test_missing_program_is_an_engine_error() {
        let engine = KatexCommand::new(&["/nonexistent/katex-binary".to_string()]).unwrap();
        let err = engine.render("x", &RenderOptions::default()).unwrap_err();
        assert_eq!(err.kind, MathErrorKind::Engine);
        assert!(KatexCommand::new(&[]).is_err());
    }
}
