use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::bail;
use serde::Serialize;
use tracing::trace;

use crate::comment::{Comment, extract_comments};
use crate::config::WikiConfig;
use crate::diagnostics::Diagnostics;
use crate::external_link::{ExternalLink, extract_external_links};
use crate::identifier::{Identifier, IdentifierKind, extract_identifiers};
use crate::link::{Image, InternalLink, extract_images, extract_internal_links};
use crate::namespace::namespace_from_title;
use crate::span::{Span, find_containing};
use crate::tag::{Tag, TagKind, extract_tags, opaque_regions};
use crate::template::{Template, extract_templates, normalize_template_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    Comment,
    Tag,
    Template,
    InternalLink,
    Image,
    ExternalLink,
    Isbn,
    Issn,
}

impl ElementCategory {
    pub const ALL: [ElementCategory; 8] = [
        ElementCategory::Comment,
        ElementCategory::Tag,
        ElementCategory::Template,
        ElementCategory::InternalLink,
        ElementCategory::Image,
        ElementCategory::ExternalLink,
        ElementCategory::Isbn,
        ElementCategory::Issn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementCategory::Comment => "comment",
            ElementCategory::Tag => "tag",
            ElementCategory::Template => "template",
            ElementCategory::InternalLink => "internal_link",
            ElementCategory::Image => "image",
            ElementCategory::ExternalLink => "external_link",
            ElementCategory::Isbn => "isbn",
            ElementCategory::Issn => "issn",
        }
    }
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ElementCategory {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        for category in Self::ALL {
            if category.as_str() == normalized {
                return Ok(category);
            }
        }
        bail!("unknown element category `{value}`")
    }
}

/// One element of any category, borrowed from the analysis cache.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ElementRef<'e> {
    Comment(&'e Comment),
    Tag(&'e Tag),
    Template(&'e Template),
    InternalLink(&'e InternalLink),
    Image(&'e Image),
    ExternalLink(&'e ExternalLink),
    Isbn(&'e Identifier),
    Issn(&'e Identifier),
}

impl ElementRef<'_> {
    pub fn category(&self) -> ElementCategory {
        match self {
            ElementRef::Comment(_) => ElementCategory::Comment,
            ElementRef::Tag(_) => ElementCategory::Tag,
            ElementRef::Template(_) => ElementCategory::Template,
            ElementRef::InternalLink(_) => ElementCategory::InternalLink,
            ElementRef::Image(_) => ElementCategory::Image,
            ElementRef::ExternalLink(_) => ElementCategory::ExternalLink,
            ElementRef::Isbn(_) => ElementCategory::Isbn,
            ElementRef::Issn(_) => ElementCategory::Issn,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ElementRef::Comment(comment) => comment.span,
            ElementRef::Tag(tag) => tag.span,
            ElementRef::Template(template) => template.span,
            ElementRef::InternalLink(link) => link.span,
            ElementRef::Image(image) => image.span,
            ElementRef::ExternalLink(link) => link.span,
            ElementRef::Isbn(identifier) | ElementRef::Issn(identifier) => identifier.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub title: String,
    pub namespace: i32,
}

/// Structural view of one page. Each element category is extracted on first
/// use and cached for the lifetime of the analysis; the text never changes.
#[derive(Debug)]
pub struct PageAnalysis<'a> {
    contents: String,
    config: &'a WikiConfig,
    page: Option<PageInfo>,
    diagnostics: Diagnostics,
    comments: OnceLock<Vec<Comment>>,
    tags: OnceLock<Vec<Tag>>,
    opaque: OnceLock<Vec<Span>>,
    templates: OnceLock<Vec<Template>>,
    internal_links: OnceLock<Vec<InternalLink>>,
    images: OnceLock<Vec<Image>>,
    external_links: OnceLock<Vec<ExternalLink>>,
    isbns: OnceLock<Vec<Identifier>>,
    issns: OnceLock<Vec<Identifier>>,
}

impl<'a> PageAnalysis<'a> {
    pub fn new(contents: impl Into<String>, config: &'a WikiConfig) -> Self {
        Self {
            contents: contents.into(),
            config,
            page: None,
            diagnostics: Diagnostics::default(),
            comments: OnceLock::new(),
            tags: OnceLock::new(),
            opaque: OnceLock::new(),
            templates: OnceLock::new(),
            internal_links: OnceLock::new(),
            images: OnceLock::new(),
            external_links: OnceLock::new(),
            isbns: OnceLock::new(),
            issns: OnceLock::new(),
        }
    }

    pub fn with_page(mut self, title: impl Into<String>, namespace: i32) -> Self {
        self.page = Some(PageInfo {
            title: title.into(),
            namespace,
        });
        self
    }

    /// Attach page information, deriving the namespace from the title.
    pub fn with_title(self, title: impl Into<String>) -> Self {
        let title = title.into();
        let namespace = namespace_from_title(&title, self.config);
        self.with_page(title, namespace)
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn config(&self) -> &'a WikiConfig {
        self.config
    }

    pub fn page(&self) -> Option<&PageInfo> {
        self.page.as_ref()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    fn cached<'s, T>(
        &'s self,
        cell: &'s OnceLock<Vec<T>>,
        label: &'static str,
        compute: impl FnOnce() -> Vec<T>,
    ) -> &'s [T] {
        cell.get_or_init(|| {
            let stopwatch = self.diagnostics.start(label);
            let elements = compute();
            trace!(category = label, count = elements.len(), "extracted elements");
            stopwatch.finish(&format!("{} found", elements.len()));
            elements
        })
    }

    pub fn comments(&self) -> &[Comment] {
        self.cached(&self.comments, "comments", || extract_comments(&self.contents))
    }

    pub fn tags(&self) -> &[Tag] {
        self.cached(&self.tags, "tags", || {
            extract_tags(&self.contents, self.comments())
        })
    }

    /// Comments and unparsed-content tags, merged and sorted.
    pub fn opaque_regions(&self) -> &[Span] {
        self.cached(&self.opaque, "opaque regions", || {
            opaque_regions(self.comments(), self.tags())
        })
    }

    pub fn templates(&self) -> &[Template] {
        self.cached(&self.templates, "templates", || {
            extract_templates(&self.contents, self.opaque_regions())
        })
    }

    pub fn internal_links(&self) -> &[InternalLink] {
        self.cached(&self.internal_links, "internal links", || {
            extract_internal_links(
                &self.contents,
                self.opaque_regions(),
                &self.config.wiki.image_namespaces,
            )
        })
    }

    pub fn images(&self) -> &[Image] {
        self.cached(&self.images, "images", || {
            extract_images(
                &self.contents,
                self.opaque_regions(),
                &self.config.wiki.image_namespaces,
            )
        })
    }

    pub fn external_links(&self) -> &[ExternalLink] {
        self.cached(&self.external_links, "external links", || {
            extract_external_links(&self.contents, self.opaque_regions())
        })
    }

    pub fn isbns(&self) -> &[Identifier] {
        self.cached(&self.isbns, "isbns", || {
            extract_identifiers(self, IdentifierKind::Isbn)
        })
    }

    pub fn issns(&self) -> &[Identifier] {
        self.cached(&self.issns, "issns", || {
            extract_identifiers(self, IdentifierKind::Issn)
        })
    }

    pub fn identifiers(&self, kind: IdentifierKind) -> &[Identifier] {
        match kind {
            IdentifierKind::Isbn => self.isbns(),
            IdentifierKind::Issn => self.issns(),
        }
    }

    pub fn elements(&self, category: ElementCategory) -> Vec<ElementRef<'_>> {
        match category {
            ElementCategory::Comment => self.comments().iter().map(ElementRef::Comment).collect(),
            ElementCategory::Tag => self.tags().iter().map(ElementRef::Tag).collect(),
            ElementCategory::Template => self.templates().iter().map(ElementRef::Template).collect(),
            ElementCategory::InternalLink => self
                .internal_links()
                .iter()
                .map(ElementRef::InternalLink)
                .collect(),
            ElementCategory::Image => self.images().iter().map(ElementRef::Image).collect(),
            ElementCategory::ExternalLink => self
                .external_links()
                .iter()
                .map(ElementRef::ExternalLink)
                .collect(),
            ElementCategory::Isbn => self.isbns().iter().map(ElementRef::Isbn).collect(),
            ElementCategory::Issn => self.issns().iter().map(ElementRef::Issn).collect(),
        }
    }

    /// Element of `category` containing `offset`; the innermost one for
    /// categories that nest.
    pub fn locate(&self, offset: usize, category: ElementCategory) -> Option<ElementRef<'_>> {
        match category {
            ElementCategory::Comment => self.is_in_comment(offset).map(ElementRef::Comment),
            ElementCategory::Tag => self.is_in_tag(offset).map(ElementRef::Tag),
            ElementCategory::Template => self.is_in_template(offset).map(ElementRef::Template),
            ElementCategory::InternalLink => self.is_in_internal_link(offset).map(ElementRef::InternalLink),
            ElementCategory::Image => self.is_in_image(offset).map(ElementRef::Image),
            ElementCategory::ExternalLink => self.is_in_external_link(offset).map(ElementRef::ExternalLink),
            ElementCategory::Isbn => self.is_in_isbn(offset).map(ElementRef::Isbn),
            ElementCategory::Issn => self.is_in_issn(offset).map(ElementRef::Issn),
        }
    }

    pub fn is_in_comment(&self, offset: usize) -> Option<&Comment> {
        let comments = self.comments();
        find_containing(comments, offset, |comment| comment.span).map(|index| &comments[index])
    }

    /// Tag whose own markup (`<...>`) contains the offset.
    pub fn is_in_tag(&self, offset: usize) -> Option<&Tag> {
        let tags = self.tags();
        find_containing(tags, offset, |tag| tag.span).map(|index| &tags[index])
    }

    /// Innermost `name` tag whose extent (open through close) contains the
    /// offset. An unclosed open tag only covers itself.
    pub fn surrounding_tag(&self, name: &str, offset: usize) -> Option<&Tag> {
        self.tags()
            .iter()
            .filter(|tag| !tag.is_closing() && tag.is_named(name) && tag.complete_span.contains(offset))
            .max_by_key(|tag| tag.complete_span.begin)
    }

    pub fn is_in_template(&self, offset: usize) -> Option<&Template> {
        innermost(self.templates(), offset, |template| template.span)
    }

    pub fn is_in_internal_link(&self, offset: usize) -> Option<&InternalLink> {
        let links = self.internal_links();
        find_containing(links, offset, |link| link.span).map(|index| &links[index])
    }

    pub fn is_in_image(&self, offset: usize) -> Option<&Image> {
        innermost(self.images(), offset, |image| image.span)
    }

    pub fn is_in_external_link(&self, offset: usize) -> Option<&ExternalLink> {
        let links = self.external_links();
        find_containing(links, offset, |link| link.span).map(|index| &links[index])
    }

    pub fn is_in_isbn(&self, offset: usize) -> Option<&Identifier> {
        let isbns = self.isbns();
        find_containing(isbns, offset, |isbn| isbn.span).map(|index| &isbns[index])
    }

    pub fn is_in_issn(&self, offset: usize) -> Option<&Identifier> {
        let issns = self.issns();
        find_containing(issns, offset, |issn| issn.span).map(|index| &issns[index])
    }

    /// Tags of one name as whole units: self-closing tags, open tags (paired
    /// or not) and close tags without an opening.
    pub fn complete_tags(&self, name: &str) -> Vec<&Tag> {
        self.tags()
            .iter()
            .filter(|tag| tag.is_named(name))
            .filter(|tag| match tag.kind {
                TagKind::Full | TagKind::Open => true,
                TagKind::Close => tag.matching.is_none(),
            })
            .collect()
    }

    pub fn templates_named(&self, name: &str) -> Vec<&Template> {
        let wanted = normalize_template_name(name);
        self.templates()
            .iter()
            .filter(|template| template.normalized_name() == wanted)
            .collect()
    }

    /// Template whose span is exactly `span`.
    pub fn template_at(&self, span: Span) -> Option<&Template> {
        self.templates().iter().find(|template| template.span == span)
    }
}

fn innermost<T>(items: &[T], offset: usize, span: impl Fn(&T) -> Span) -> Option<&T> {
    items
        .iter()
        .filter(|item| span(item).contains(offset))
        .max_by_key(|item| span(item).begin)
}
