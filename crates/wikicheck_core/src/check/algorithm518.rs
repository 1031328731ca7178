use std::collections::BTreeMap;

use crate::analysis::PageAnalysis;
use crate::check::{CheckContext, CheckErrorAlgorithm, CheckErrorResult, parameter};
use crate::namespace::parse_namespace_list;
use crate::tag::{TAG_NOWIKI, Tag};

const NUMBER: u32 = 518;
const DEFAULT_NAMESPACES: &str = "0";

/// Characters `<nowiki>` may be protecting; text without them renders the
/// same once unwrapped.
const MARKUP: &[char] = &['[', ']', '{', '}', '<', '>', '\'', '|', '=', '*', '#', ':', ';', '~', '&', '_'];

/// `<nowiki>` tags left in article text.
pub struct NowikiTags {
    context: CheckContext,
}

impl NowikiTags {
    pub fn new(context: CheckContext) -> Self {
        Self { context }
    }

    fn applies_to(analysis: &PageAnalysis<'_>) -> bool {
        let Some(page) = analysis.page() else {
            return false;
        };
        let namespaces = parameter(analysis, NUMBER, "namespaces").unwrap_or(DEFAULT_NAMESPACES);
        parse_namespace_list(namespaces).contains(&page.namespace)
    }

    fn result(&self, analysis: &PageAnalysis<'_>, tag: &Tag) -> CheckErrorResult {
        let contents = analysis.contents();
        let mut result = CheckErrorResult::new(NUMBER, tag.complete_span);
        if tag.is_full_tag() {
            result.add_replacement(" ", "Replace with a space", false);
            result.add_replacement("", "Remove", false);
            return result;
        }
        match tag.value_span.filter(|_| tag.is_complete()) {
            Some(value) => {
                let mut inner = value.slice(contents);
                let starts_line = tag.span.begin > 0 && contents.as_bytes()[tag.span.begin - 1] == b'\n';
                if starts_line {
                    inner = inner.trim_start_matches(' ');
                }
                let automatic = !inner.contains(MARKUP);
                let description = self.context.format("Replace with {0}", &[inner]);
                result.add_replacement(inner, description, automatic);
            }
            None => {
                result.add_replacement("", "Remove", false);
            }
        }
        result
    }
}

impl CheckErrorAlgorithm for NowikiTags {
    fn error_number(&self) -> u32 {
        NUMBER
    }

    fn short_description(&self) -> &str {
        "nowiki tags in main namespace"
    }

    fn parameters(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([("namespaces", "Namespaces where nowiki tags are reported (comma separated)")])
    }

    fn analyze(
        &self,
        analysis: &PageAnalysis<'_>,
        mut errors: Option<&mut Vec<CheckErrorResult>>,
        only_automatic: bool,
    ) -> bool {
        if !Self::applies_to(analysis) {
            return false;
        }
        let mut found = false;
        for tag in analysis.complete_tags(TAG_NOWIKI) {
            let result = self.result(analysis, tag);
            if only_automatic && !result.is_automatic() {
                continue;
            }
            found = true;
            let Some(errors) = errors.as_deref_mut() else {
                return true;
            };
            errors.push(result);
        }
        found
    }
}
