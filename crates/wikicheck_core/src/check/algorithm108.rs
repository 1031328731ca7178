use std::collections::BTreeMap;

use crate::analysis::PageAnalysis;
use crate::check::identifier::{CHECKSUM_MESSAGE, Candidates, Finding, checksum_reason, suggested_forms};
use crate::check::{CheckContext, CheckErrorAlgorithm, CheckErrorResult};
use crate::checksum::{ISSN_LENGTH, issn_checksum};
use crate::identifier::Identifier;
use crate::span::Span;

const NUMBER: u32 = 108;

/// ISSN whose check character does not match.
pub struct IssnChecksum {
    context: CheckContext,
}

impl IssnChecksum {
    pub fn new(context: CheckContext) -> Self {
        Self { context }
    }

    fn mismatch(number: &str) -> Option<(char, char)> {
        if number.len() != ISSN_LENGTH {
            return None;
        }
        let found = number.chars().last()?.to_ascii_uppercase();
        let computed = issn_checksum(number)?;
        (computed != found).then_some((found, computed))
    }

    fn finding<'i>(&self, analysis: &PageAnalysis<'_>, issn: &'i Identifier, found: char, computed: char) -> Finding<'i> {
        let number = issn.value.as_str();
        let corrected = format!("{}{computed}", &number[..ISSN_LENGTH - 1]);

        let mut candidates = Candidates::new(number, issn_checksum);
        candidates.add(corrected.clone());
        candidates.add_transpositions();
        candidates.add_substitutions();

        let extra = suggested_forms(analysis, issn, &corrected)
            .into_iter()
            .map(|form| (form.clone(), form))
            .collect();

        Finding {
            identifier: issn,
            message: self
                .context
                .format(CHECKSUM_MESSAGE, &[found.to_string().as_str(), computed.to_string().as_str()]),
            corrected: Some(corrected),
            candidates: candidates.values().to_vec(),
            extra,
            reason: checksum_reason(analysis, &self.context, NUMBER, computed, found),
        }
    }
}

impl CheckErrorAlgorithm for IssnChecksum {
    fn error_number(&self) -> u32 {
        NUMBER
    }

    fn short_description(&self) -> &str {
        "ISSN wrong checksum"
    }

    fn parameters(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([
            ("reason", "An explanation of the problem"),
            ("reason_checksum", "An explanation of the problem (incorrect checksum)"),
        ])
    }

    fn reason(&self, analysis: &PageAnalysis<'_>, span: Span) -> Option<String> {
        let issn = analysis.issns().iter().find(|issn| issn.span == span)?;
        let (found, computed) = Self::mismatch(&issn.value)?;
        checksum_reason(analysis, &self.context, NUMBER, computed, found)
    }

    fn analyze(
        &self,
        analysis: &PageAnalysis<'_>,
        mut errors: Option<&mut Vec<CheckErrorResult>>,
        only_automatic: bool,
    ) -> bool {
        let mut found_any = false;
        for issn in analysis.issns() {
            let Some((found, computed)) = Self::mismatch(&issn.value) else {
                continue;
            };
            let finding = self.finding(analysis, issn, found, computed);
            if only_automatic && !finding.is_automatic() {
                continue;
            }
            found_any = true;
            let Some(errors) = errors.as_deref_mut() else {
                return true;
            };
            errors.push(finding.into_result(analysis, NUMBER));
        }
        found_any
    }
}
