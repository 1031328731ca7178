use std::collections::BTreeMap;
use std::thread;

use serde::Serialize;
use tracing::{debug, warn};

use crate::analysis::PageAnalysis;
use crate::check::{
    CheckContext, CheckErrorAlgorithm, CheckErrorResult, IsbnChecksum10, IsbnChecksum13, IsbnWrongLength,
    IssnChecksum, NowikiTags,
};
use crate::config::WikiConfig;
use crate::diagnostics::Diagnostics;

struct Entry {
    algorithm: Box<dyn CheckErrorAlgorithm>,
    enabled: bool,
}

/// Outcome of one algorithm over one page.
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmReport {
    pub error_number: u32,
    pub short_description: String,
    pub found: bool,
    pub errors: Vec<CheckErrorResult>,
}

/// Registered algorithms keyed by error number.
#[derive(Default)]
pub struct AlgorithmCatalog {
    entries: BTreeMap<u32, Entry>,
    diagnostics: Diagnostics,
}

impl AlgorithmCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in algorithm, enabled according to `config`.
    pub fn with_builtins(config: &WikiConfig, context: CheckContext) -> Self {
        let mut catalog = Self::new();
        catalog.register(Box::new(IsbnWrongLength::new(context.clone())));
        catalog.register(Box::new(IsbnChecksum10::new(context.clone())));
        catalog.register(Box::new(IsbnChecksum13::new(context.clone())));
        catalog.register(Box::new(IssnChecksum::new(context.clone())));
        catalog.register(Box::new(NowikiTags::new(context)));
        let numbers = catalog.entries.keys().copied().collect::<Vec<_>>();
        for number in numbers {
            catalog.set_enabled(number, config.is_algorithm_enabled(number));
        }
        catalog
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Add an algorithm, replacing any registered under the same number.
    pub fn register(&mut self, algorithm: Box<dyn CheckErrorAlgorithm>) {
        let number = algorithm.error_number();
        if self
            .entries
            .insert(
                number,
                Entry {
                    algorithm,
                    enabled: true,
                },
            )
            .is_some()
        {
            debug!(number, "replaced registered algorithm");
        }
    }

    /// Returns false when no algorithm has that number.
    pub fn set_enabled(&mut self, number: u32, enabled: bool) -> bool {
        match self.entries.get_mut(&number) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, number: u32) -> Option<&dyn CheckErrorAlgorithm> {
        self.entries.get(&number).map(|entry| entry.algorithm.as_ref())
    }

    pub fn is_enabled(&self, number: u32) -> bool {
        self.entries.get(&number).is_some_and(|entry| entry.enabled)
    }

    /// All registered algorithms in ascending number, with their state.
    pub fn algorithms(&self) -> impl Iterator<Item = (&dyn CheckErrorAlgorithm, bool)> {
        self.entries
            .values()
            .map(|entry| (entry.algorithm.as_ref(), entry.enabled))
    }

    fn enabled(&self) -> impl Iterator<Item = &dyn CheckErrorAlgorithm> {
        self.entries
            .values()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.algorithm.as_ref())
    }

    /// Run every enabled algorithm in ascending number order.
    pub fn analyze(&self, analysis: &PageAnalysis<'_>, only_automatic: bool) -> Vec<AlgorithmReport> {
        self.enabled()
            .map(|algorithm| self.run(algorithm, analysis, only_automatic))
            .collect()
    }

    /// Same reports as [`Self::analyze`], with algorithms spread over scoped
    /// threads sharing the analysis.
    pub fn analyze_parallel(&self, analysis: &PageAnalysis<'_>, only_automatic: bool) -> Vec<AlgorithmReport> {
        thread::scope(|scope| {
            let handles = self
                .enabled()
                .map(|algorithm| scope.spawn(move || self.run(algorithm, analysis, only_automatic)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .filter_map(|handle| match handle.join() {
                    Ok(report) => Some(report),
                    Err(_) => {
                        warn!("check algorithm panicked");
                        None
                    }
                })
                .collect()
        })
    }

    /// Run one algorithm regardless of its enabled state.
    pub fn analyze_one(
        &self,
        number: u32,
        analysis: &PageAnalysis<'_>,
        only_automatic: bool,
    ) -> Option<AlgorithmReport> {
        let algorithm = self.get(number)?;
        Some(self.run(algorithm, analysis, only_automatic))
    }

    /// Numbers of the enabled algorithms that find something, without
    /// collecting results.
    pub fn detect(&self, analysis: &PageAnalysis<'_>) -> Vec<u32> {
        self.enabled()
            .filter(|algorithm| {
                let stopwatch = self
                    .diagnostics
                    .start(format!("detect {}", algorithm.error_number()));
                let found = algorithm.analyze(analysis, None, false);
                stopwatch.finish(if found { "found" } else { "clean" });
                found
            })
            .map(|algorithm| algorithm.error_number())
            .collect()
    }

    fn run(
        &self,
        algorithm: &dyn CheckErrorAlgorithm,
        analysis: &PageAnalysis<'_>,
        only_automatic: bool,
    ) -> AlgorithmReport {
        let number = algorithm.error_number();
        let stopwatch = self.diagnostics.start(format!("algorithm {number}"));
        let mut errors = Vec::new();
        let found = algorithm.analyze(analysis, Some(&mut errors), only_automatic);
        let errors = normalize_results(analysis, number, errors);
        stopwatch.finish(&format!("{} errors", errors.len()));
        debug!(number, found, errors = errors.len(), "algorithm finished");
        AlgorithmReport {
            error_number: number,
            short_description: algorithm.short_description().to_string(),
            found,
            errors,
        }
    }
}

/// Sort by span, keep the first result of each span and drop spans that do
/// not fit the page.
fn normalize_results(
    analysis: &PageAnalysis<'_>,
    number: u32,
    mut errors: Vec<CheckErrorResult>,
) -> Vec<CheckErrorResult> {
    errors.retain(|error| {
        let valid = error.span.is_valid_for(analysis.contents());
        if !valid {
            warn!(number, begin = error.span.begin, end = error.span.end, "dropping result outside the page");
        }
        valid
    });
    errors.sort_by_key(|error| error.span);
    errors.dedup_by_key(|error| error.span);
    errors
}

#[cfg(test)]
mod tests {
    use super::{AlgorithmCatalog, normalize_results};
    use crate::analysis::PageAnalysis;
    use crate::check::{CheckContext, CheckErrorAlgorithm, CheckErrorResult};
    use crate::config::{AlgorithmSettings, WikiConfig};
    use crate::namespace::MAIN;
    use crate::span::Span;

    const PAGE: &str = "ISBN 978-0-306-40615-1, ISBN 0-306-40615-3, ISBN 12345, \
ISSN 0378-5954 and <nowiki>plain</nowiki>.";

    struct Fixed;

    impl CheckErrorAlgorithm for Fixed {
        fn error_number(&self) -> u32 {
            900
        }

        fn short_description(&self) -> &str {
            "fixed"
        }

        fn analyze(
            &self,
            _analysis: &PageAnalysis<'_>,
            errors: Option<&mut Vec<CheckErrorResult>>,
            _only_automatic: bool,
        ) -> bool {
            if let Some(errors) = errors {
                errors.push(CheckErrorResult::new(900, Span::new(5, 9)));
                errors.push(CheckErrorResult::new(900, Span::new(0, 4)));
                errors.push(CheckErrorResult::new(900, Span::new(0, 4)));
            }
            true
        }
    }

    #[test]
    fn builtins_run_in_number_order() {
        let config = WikiConfig::default();
        let catalog = AlgorithmCatalog::with_builtins(&config, CheckContext::default());
        let analysis = PageAnalysis::new(PAGE, &config).with_page("Article", MAIN);
        let reports = catalog.analyze(&analysis, false);
        let numbers = reports.iter().map(|report| report.error_number).collect::<Vec<_>>();
        assert_eq!(numbers, vec![70, 72, 73, 108, 518]);
        assert!(reports.iter().all(|report| report.found));
        assert!(reports.iter().all(|report| report.errors.len() == 1));
        assert_eq!(catalog.detect(&analysis), vec![70, 72, 73, 108, 518]);
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let config = WikiConfig::default();
        let catalog = AlgorithmCatalog::with_builtins(&config, CheckContext::default());
        let analysis = PageAnalysis::new(PAGE, &config).with_page("Article", MAIN);
        let sequential = catalog.analyze(&analysis, false);
        let parallel = catalog.analyze_parallel(&analysis, false);
        assert_eq!(sequential.len(), parallel.len());
        for (left, right) in sequential.iter().zip(&parallel) {
            assert_eq!(left.error_number, right.error_number);
            assert_eq!(left.errors, right.errors);
        }
    }

    #[test]
    fn disabled_algorithms_are_skipped() {
        let mut config = WikiConfig::default();
        config.algorithms.insert(
            "73".to_string(),
            AlgorithmSettings {
                enabled: false,
                ..AlgorithmSettings::default()
            },
        );
        let mut catalog = AlgorithmCatalog::with_builtins(&config, CheckContext::default());
        assert!(!catalog.is_enabled(73));
        let analysis = PageAnalysis::new(PAGE, &config);
        assert_eq!(catalog.detect(&analysis), vec![70, 72, 108]);

        let report = catalog.analyze_one(73, &analysis, false).expect("registered");
        assert!(report.found);
        assert!(catalog.set_enabled(73, true));
        assert!(!catalog.set_enabled(1, true));
        assert_eq!(catalog.detect(&analysis), vec![70, 72, 73, 108]);
    }

    #[test]
    fn results_are_sorted_and_deduplicated() {
        let config = WikiConfig::default();
        let mut catalog = AlgorithmCatalog::new();
        catalog.register(Box::new(Fixed));
        let analysis = PageAnalysis::new("abcd efgh", &config);
        let reports = catalog.analyze(&analysis, false);
        let spans = reports[0].errors.iter().map(|error| error.span).collect::<Vec<_>>();
        assert_eq!(spans, vec![Span::new(0, 4), Span::new(5, 9)]);

        let errors = normalize_results(&analysis, 900, vec![CheckErrorResult::new(900, Span::new(3, 40))]);
        assert!(errors.is_empty());
    }
}
