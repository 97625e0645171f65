//! Untouched pages must serialize back to what the generator wrote, up to
//! character references the serializer spells differently.

use sitepost::Document;

const PAGE: &str = r##"<!DOCTYPE html>
<html lang="en" class="light">
<head>
<meta charset="UTF-8">
<meta name="description" content="Notes on caf&eacute; culture &amp; &lt;code&gt;">
<title>Caf&eacute; &amp; Co - Example Blog</title>
<link rel="stylesheet" href="css/chrome.css?v=1&amp;t=2">
<style>.x > p { content: "&amp;"; }</style>
<script>if (a < b && c) { window.x = "</p>"; }</script>
<noscript>&lt;p&gt;Enable JavaScript&lt;/p&gt;<style>.sidebar { display: none; }</style></noscript>
</head>
<body>
<nav id="sidebar"><ol class="chapter"><li><a href="index.html" class="active">Home</a></li></ol></nav>
<main>
<h1 id="a-title">&Sigma; &alpha;&rarr;&beta; &check; na&iuml;ve&nbsp;text&#8212;done</h1>
<p>Tom &amp; Jerry: 1 &lt; 2 &gt; 0 &quot;quoted&quot;</p>
<svg viewBox="0 0 16 16" width="16"><defs><linearGradient id="g"></linearGradient></defs><path d="M0 0h16v16H0z"></path></svg>
<pre><code class="language-rust">fn main() {}
</code></pre>
<!-- generated -->
</main>
</body>
</html>
"##;

const NORMALIZED: &str = r##"<!DOCTYPE html>
<html lang="en" class="light">
<head>
<meta charset="UTF-8">
<meta name="description" content="Notes on café culture &amp; &lt;code&gt;">
<title>Café &amp; Co - Example Blog</title>
<link rel="stylesheet" href="css/chrome.css?v=1&amp;t=2">
<style>.x > p { content: "&amp;"; }</style>
<script>if (a < b && c) { window.x = "</p>"; }</script>
<noscript>&lt;p&gt;Enable JavaScript&lt;/p&gt;<style>.sidebar { display: none; }</style></noscript>
</head>
<body>
<nav id="sidebar"><ol class="chapter"><li><a href="index.html" class="active">Home</a></li></ol></nav>
<main>
<h1 id="a-title">Σ α→β ✓ naïve&nbsp;text—done</h1>
<p>Tom &amp; Jerry: 1 &lt; 2 &gt; 0 "quoted"</p>
<svg viewBox="0 0 16 16" width="16"><defs><linearGradient id="g"></linearGradient></defs><path d="M0 0h16v16H0z"></path></svg>
<pre><code class="language-rust">fn main() {}
</code></pre>
<!-- generated -->
</main>
</body>
</html>
"##;

#[test]
fn test_generator_page_round_trips() {
    assert_eq!(Document::parse(PAGE).to_html(), NORMALIZED);
}

#[test]
fn test_serialized_page_is_a_fixed_point() {
    let once = Document::parse(PAGE).to_html();
    assert_eq!(Document::parse(once.as_str()).to_html(), once);
}

#[test]
fn test_unknown_references_survive() {
    let src = "<p>&notanentity; &amp;eacute; &#x1F600; AT&T</p>";
    assert_eq!(
        Document::parse(src).to_html(),
        "<p>&amp;notanentity; &amp;eacute; \u{1F600} AT&amp;T</p>"
    );
}
