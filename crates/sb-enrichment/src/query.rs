//! Deterministic query generation and translation-based expansion.

use std::sync::Arc;

use crate::translate::TranslationClient;

/// Inputs available when generating candidate evidence queries for one item.
#[derive(Debug, Clone, Default)]
pub struct QueryContext<'a> {
    pub summary: &'a str,
    pub full_text: &'a str,
    pub topic: &'a str,
    pub channel_title: &'a str,
    pub resolved_link_titles: &'a [String],
}

/// Produce 1..=N deterministic candidate query strings from item context.
///
/// Order is stable: summary, topic, channel title, then resolved link
/// titles; empty fields are skipped and duplicates are dropped.
#[must_use]
pub fn generate_queries(ctx: &QueryContext<'_>, max_candidates: usize) -> Vec<String> {
    let mut candidates = Vec::new();

    if !ctx.summary.is_empty() {
        candidates.push(ctx.summary.to_owned());
    }
    if !ctx.topic.is_empty() {
        candidates.push(format!("{} {}", ctx.topic, ctx.channel_title).trim().to_owned());
    }
    for title in ctx.resolved_link_titles {
        if !title.is_empty() {
            candidates.push(title.clone());
        }
    }
    if candidates.is_empty() && !ctx.full_text.is_empty() {
        candidates.push(first_words(ctx.full_text, 20));
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|q| seen.insert(q.clone()));
    candidates.truncate(max_candidates.max(1));
    candidates
}

fn first_words(text: &str, count: usize) -> String {
    text.split_whitespace().take(count).collect::<Vec<_>>().join(" ")
}

/// Expand a base set of queries with one translated variant per target
/// language, skipping languages that equal the source language.
pub async fn expand_with_translations(
    base_queries: &[String],
    target_languages: &[String],
    source_language: &str,
    translator: &Arc<dyn TranslationClient>,
) -> Vec<String> {
    let mut expanded = base_queries.to_vec();

    for query in base_queries {
        for language in target_languages {
            if language.eq_ignore_ascii_case(source_language) {
                continue;
            }
            match translator.translate(query, language).await {
                Ok(translated) if !translated.is_empty() => expanded.push(translated),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, language = %language, "query translation failed, skipping variant");
                }
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    expanded.retain(|q| seen.insert(q.clone()));
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnrichmentError;
    use async_trait::async_trait;

    struct UppercaseTranslator;

    #[async_trait]
    impl TranslationClient for UppercaseTranslator {
        async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError> {
            Ok(format!("{}::{}", target_language, text.to_uppercase()))
        }
    }

    #[test]
    fn generates_from_summary_topic_and_links() {
        let ctx = QueryContext {
            summary: "a summary",
            full_text: "irrelevant",
            topic: "politics",
            channel_title: "Channel",
            resolved_link_titles: &["Article One".into()],
        };
        let queries = generate_queries(&ctx, 10);
        assert_eq!(queries, vec!["a summary", "politics Channel", "Article One"]);
    }

    #[test]
    fn falls_back_to_full_text_when_nothing_else_present() {
        let ctx = QueryContext {
            full_text: "one two three four five",
            ..Default::default()
        };
        let queries = generate_queries(&ctx, 10);
        assert_eq!(queries, vec!["one two three four five"]);
    }

    #[test]
    fn truncates_to_max_candidates() {
        let ctx = QueryContext {
            summary: "s",
            topic: "t",
            channel_title: "c",
            resolved_link_titles: &["a".into(), "b".into()],
            ..Default::default()
        };
        let queries = generate_queries(&ctx, 2);
        assert_eq!(queries.len(), 2);
    }

    #[tokio::test]
    async fn expands_with_translated_variants_skipping_source_language() {
        let translator: Arc<dyn TranslationClient> = Arc::new(UppercaseTranslator);
        let expanded = expand_with_translations(
            &["hello".to_owned()],
            &["en".to_owned(), "ru".to_owned()],
            "en",
            &translator,
        )
        .await;
        assert_eq!(expanded, vec!["hello", "ru::HELLO"]);
    }
}
