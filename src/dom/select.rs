//! CSS selector matching against the page tree.
//!
//! Configuration names page regions with selectors (`.right-buttons`,
//! `input#searchbar`, ...) and page scripts query with them, so this module
//! wires the `selectors` crate up to [`NodeArena`].

use std::fmt;
use std::str::FromStr;

use cssparser::{CowRcStr, ParseError, SourceLocation};
use html5ever::{LocalName, Namespace};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::context::{
    MatchingContext, MatchingForInvalidation, MatchingMode, NeedsSelectorFlags, QuirksMode,
    SelectorCaches,
};
use selectors::matching::ElementSelectorFlags;
use selectors::parser::{ParseRelative, SelectorList, SelectorParseErrorKind};
use selectors::{OpaqueElement, SelectorImpl};

use super::arena::{NodeArena, NodeData, NodeId};
use crate::error::{Error, Result};

/// Selector implementation for page trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelectors;

/// Identifier string type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct IdentStr(pub String);

impl precomputed_hash::PrecomputedHash for IdentStr {
    fn precomputed_hash(&self) -> u32 {
        self.0
            .bytes()
            .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
    }
}

impl AsRef<str> for IdentStr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for IdentStr {
    fn from(s: &'a str) -> Self {
        Self(s.to_string())
    }
}

impl cssparser::ToCss for IdentStr {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

/// LocalName that implements ToCss.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CssLocalName(pub LocalName);

impl precomputed_hash::PrecomputedHash for CssLocalName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl cssparser::ToCss for CssLocalName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

impl<'a> From<&'a str> for CssLocalName {
    fn from(s: &'a str) -> Self {
        Self(LocalName::from(s))
    }
}

impl AsRef<str> for CssLocalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Namespace that implements ToCss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CssNamespace(pub Namespace);

impl precomputed_hash::PrecomputedHash for CssNamespace {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl cssparser::ToCss for CssNamespace {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

impl<'a> From<&'a str> for CssNamespace {
    fn from(s: &'a str) -> Self {
        Self(Namespace::from(s))
    }
}

/// Pseudo-elements never match a static tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PseudoElement {}

impl cssparser::ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

impl selectors::parser::PseudoElement for PseudoElement {
    type Impl = PageSelectors;

    fn accepts_state_pseudo_classes(&self) -> bool {
        false
    }

    fn valid_after_slotted(&self) -> bool {
        false
    }
}

/// The only non-tree-structural pseudo-class with meaning in a static page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NonTSPseudoClass {
    AnyLink,
}

impl selectors::parser::NonTSPseudoClass for NonTSPseudoClass {
    type Impl = PageSelectors;

    fn is_active_or_hover(&self) -> bool {
        false
    }

    fn is_user_action_state(&self) -> bool {
        false
    }
}

impl cssparser::ToCss for NonTSPseudoClass {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        match self {
            Self::AnyLink => dest.write_str(":any-link"),
        }
    }
}

impl SelectorImpl for PageSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = IdentStr;
    type Identifier = IdentStr;
    type LocalName = CssLocalName;
    type NamespaceUrl = CssNamespace;
    type NamespacePrefix = IdentStr;
    type BorrowedLocalName = CssLocalName;
    type BorrowedNamespaceUrl = CssNamespace;
    type NonTSPseudoClass = NonTSPseudoClass;
    type PseudoElement = PseudoElement;
}

impl<'i> selectors::parser::Parser<'i> for PageSelectors {
    type Impl = PageSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_non_ts_pseudo_class(
        &self,
        location: SourceLocation,
        name: CowRcStr<'i>,
    ) -> std::result::Result<NonTSPseudoClass, ParseError<'i, SelectorParseErrorKind<'i>>> {
        if name.eq_ignore_ascii_case("link") || name.eq_ignore_ascii_case("any-link") {
            Ok(NonTSPseudoClass::AnyLink)
        } else {
            Err(location.new_custom_error(
                SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name),
            ))
        }
    }
}

/// A parsed, comma-separated selector list.
#[derive(Clone)]
pub struct Selector {
    source: String,
    list: SelectorList<PageSelectors>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let mut input = cssparser::ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&PageSelectors, &mut parser, ParseRelative::No)
            .map_err(|e| Error::Selector {
                selector: source.to_string(),
                message: format!("{:?}", e.kind),
            })?;
        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether element `id` matches any selector in the list.
    pub fn matches(&self, arena: &NodeArena, id: NodeId) -> bool {
        if !arena.is_element(id) {
            return false;
        }
        let elem = ElementRef::new(arena, id);
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        self.list
            .slice()
            .iter()
            .any(|s| selectors::matching::matches_selector(s, 0, None, &elem, &mut context))
    }

    /// Matching descendants of `scope`, in document order.
    pub fn select(&self, arena: &NodeArena, scope: NodeId) -> Vec<NodeId> {
        arena
            .descendants(scope)
            .into_iter()
            .filter(|&id| self.matches(arena, id))
            .collect()
    }

    pub fn select_first(&self, arena: &NodeArena, scope: NodeId) -> Option<NodeId> {
        arena
            .descendants(scope)
            .into_iter()
            .find(|&id| self.matches(arena, id))
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

/// Element handle for selector matching.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    arena: &'a NodeArena,
    id: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn new(arena: &'a NodeArena, id: NodeId) -> Self {
        Self { arena, id }
    }

    fn element(&self, id: Option<NodeId>) -> Option<Self> {
        id.filter(|&id| self.arena.is_element(id))
            .map(|id| Self::new(self.arena, id))
    }

    fn is_link_element(&self) -> bool {
        matches!(
            self.arena.element_name(self.id).map(|n| n.as_ref()),
            Some("a" | "area" | "link")
        ) && self.arena.get_attr(self.id, "href").is_some()
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id)
            .field("name", &self.arena.element_name(self.id))
            .finish()
    }
}

impl selectors::Element for ElementRef<'_> {
    type Impl = PageSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self)
    }

    fn parent_element(&self) -> Option<Self> {
        self.element(self.arena.parent(self.id))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let mut current = self.arena.node(self.id)?.prev_sibling;
        while let Some(id) = current {
            if self.arena.is_element(id) {
                return Some(Self::new(self.arena, id));
            }
            current = self.arena.node(id)?.prev_sibling;
        }
        None
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let mut current = self.arena.next_sibling(self.id);
        while let Some(id) = current {
            if self.arena.is_element(id) {
                return Some(Self::new(self.arena, id));
            }
            current = self.arena.next_sibling(id);
        }
        None
    }

    fn first_element_child(&self) -> Option<Self> {
        self.arena
            .children(self.id)
            .find(|&c| self.arena.is_element(c))
            .map(|c| Self::new(self.arena, c))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        self.arena
            .element_namespace(self.id)
            .is_some_and(|ns| *ns == html5ever::ns!(html))
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.arena
            .element_name(self.id)
            .is_some_and(|n| *n == name.0)
    }

    fn has_namespace(&self, ns: &CssNamespace) -> bool {
        self.arena
            .element_namespace(self.id)
            .is_some_and(|n| *n == ns.0)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.arena.qual_name(self.id) == other.arena.qual_name(other.id)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssNamespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&IdentStr>,
    ) -> bool {
        let Some(NodeData::Element { attrs, .. }) = self.arena.node(self.id).map(|n| &n.data)
        else {
            return false;
        };

        attrs
            .iter()
            .filter(|attr| match ns {
                NamespaceConstraint::Any => true,
                NamespaceConstraint::Specific(ns) => attr.name.ns == ns.0,
            })
            .find(|attr| attr.name.local == local_name.0)
            .is_some_and(|attr| operation.eval_str(&attr.value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        match pc {
            NonTSPseudoClass::AnyLink => self.is_link_element(),
        }
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn is_link(&self) -> bool {
        self.is_link_element()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.arena
            .element_id(self.id)
            .is_some_and(|own| case_sensitivity.eq(own.as_bytes(), id.0.as_bytes()))
    }

    fn has_class(&self, name: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.arena
            .element_classes(self.id)
            .iter()
            .any(|c| case_sensitivity.eq(c.as_bytes(), name.0.as_bytes()))
    }

    fn imported_part(&self, _name: &IdentStr) -> Option<IdentStr> {
        None
    }

    fn is_part(&self, _name: &IdentStr) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.arena.children(self.id).all(|c| match self.arena.node(c).map(|n| &n.data) {
            Some(NodeData::Element { .. }) => false,
            Some(NodeData::Text(t)) => t.is_empty(),
            _ => true,
        })
    }

    fn is_root(&self) -> bool {
        self.arena
            .parent(self.id)
            .and_then(|p| self.arena.node(p))
            .is_some_and(|p| matches!(p.data, NodeData::Document))
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn add_element_unique_hashes(&self, _filter: &mut selectors::bloom::BloomFilter) -> bool {
        false
    }

    fn has_custom_state(&self, _name: &IdentStr) -> bool {
        false
    }
}
