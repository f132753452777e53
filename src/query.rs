//! The Query Engine: free text → filtered k-NN search → ranked hits.
//!
//! A best-effort read path: nothing here returns `Err`. Misconfiguration,
//! an unembeddable query, a transport failure, or a response without the
//! expected hit structure all log and come back as empty [`SearchHits`] —
//! never a crash, and never partially parsed data.
//!
//! ## The shape of the request
//!
//! One `bool.must` with two clauses: a `term` filter on `image_type`
//! (selected by [`SearchMode`]) and a `knn` clause on `content_vector`.
//! `size` bounds the hits returned; the `k` inside the knn clause is the
//! fixed [`KNN_K`] — see the constant for why they are decoupled.

use crate::config::{PipelineConfig, SearchMode};
use crate::embed::Embedder;
use crate::search::{OpenSearchIndex, SearchIndex};
use serde_json::{json, Value};
use tracing::{debug, error, info};

/// Number of nearest neighbours the knn clause considers.
///
/// Fixed at 5 regardless of the caller's `result_count`, which only bounds
/// the hits returned (`size`). The decoupling is part of the wire contract
/// this engine reproduces; asking for more than 5 results therefore cannot
/// surface more than 5 vector matches per query.
pub const KNN_K: usize = 5;

/// Ranked query results: two parallel sequences ordered by descending
/// relevance score, one base64 image payload and one caption per hit.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SearchHits {
    pub images: Vec<String>,
    pub contents: Vec<String>,
}

impl SearchHits {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Search the configured index.
///
/// If the endpoint or index name is unset this logs the misconfiguration
/// and returns empty hits instead of raising — the read path must stay
/// usable in half-configured environments (demo notebooks, CI).
pub async fn search(
    config: &PipelineConfig,
    embedder: &dyn Embedder,
    query_text: &str,
    mode: SearchMode,
    result_count: usize,
) -> SearchHits {
    if let Err(e) = config.require_index() {
        error!("Search not attempted: {e}");
        return SearchHits::default();
    }

    let index = match OpenSearchIndex::from_config(config) {
        Ok(i) => i,
        Err(e) => {
            error!("Search client construction failed: {e}");
            return SearchHits::default();
        }
    };

    search_with_index(&index, embedder, query_text, mode, result_count).await
}

/// Core of the Query Engine, generic over the index handle.
pub async fn search_with_index(
    index: &dyn SearchIndex,
    embedder: &dyn Embedder,
    query_text: &str,
    mode: SearchMode,
    result_count: usize,
) -> SearchHits {
    info!(
        "Searching ({mode}) for {query_text:?}, result_count={result_count}"
    );

    let Some(vector) = embedder.embed(query_text).await else {
        error!("Query text produced no embedding; returning empty hits");
        return SearchHits::default();
    };
    debug!("Query vector: {} dimensions", vector.len());

    let body = build_query_body(&vector, mode, result_count);

    let response = match index.query(&body).await {
        Ok(r) => r,
        Err(e) => {
            error!("Search request failed: {e}");
            return SearchHits::default();
        }
    };

    let hits = parse_hits(&response);
    info!("Retrieved {} hits", hits.len());
    hits
}

/// Build the filtered k-NN request body.
///
/// `_source.excludes` keeps `content_vector` out of every hit — the vector
/// is write/search-only and is never read back.
fn build_query_body(vector: &[f32], mode: SearchMode, result_count: usize) -> Value {
    json!({
        "size": result_count,
        "_source": { "excludes": ["content_vector"] },
        "query": {
            "bool": {
                "must": [
                    {
                        "term": { "image_type": mode.filter_value() }
                    },
                    {
                        "knn": {
                            "content_vector": {
                                "vector": vector,
                                "k": KNN_K
                            }
                        }
                    }
                ]
            }
        }
    })
}

/// Extract the parallel image/content sequences from an engine response.
///
/// All-or-nothing: a response without `hits.hits`, or with any hit missing
/// `_source.image` / `_source.text`, is a query failure and yields empty
/// hits rather than a partial, misaligned pair.
fn parse_hits(response: &Value) -> SearchHits {
    let Some(hit_list) = response
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
    else {
        error!("Search response has no hits.hits structure: {response}");
        return SearchHits::default();
    };

    let mut hits = SearchHits::default();
    for hit in hit_list {
        let source = hit.get("_source");
        let image = source
            .and_then(|s| s.get("image"))
            .and_then(Value::as_str);
        let text = source.and_then(|s| s.get("text")).and_then(Value::as_str);

        match (image, text) {
            (Some(image), Some(text)) => {
                hits.images.push(image.to_string());
                hits.contents.push(text.to_string());
            }
            _ => {
                error!("Malformed hit in search response: {hit}");
                return SearchHits::default();
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_uses_fixed_k_and_caller_size() {
        let body = build_query_body(&[0.5, 0.5], SearchMode::Content, 12);
        assert_eq!(body["size"], 12);
        assert_eq!(body["query"]["bool"]["must"][1]["knn"]["content_vector"]["k"], 5);
    }

    #[test]
    fn body_filters_sub_for_image_mode_and_main_for_content() {
        let image = build_query_body(&[1.0], SearchMode::Image, 5);
        assert_eq!(image["query"]["bool"]["must"][0]["term"]["image_type"], "sub");

        let content = build_query_body(&[1.0], SearchMode::Content, 5);
        assert_eq!(
            content["query"]["bool"]["must"][0]["term"]["image_type"],
            "main"
        );
    }

    #[test]
    fn body_excludes_the_vector_from_sources() {
        let body = build_query_body(&[1.0], SearchMode::Image, 5);
        assert_eq!(body["_source"]["excludes"][0], "content_vector");
    }

    #[test]
    fn parse_well_formed_response() {
        let response = json!({
            "hits": { "hits": [
                { "_score": 0.92, "_source": { "image": "aW1nMQ==", "text": "first" } },
                { "_score": 0.71, "_source": { "image": "aW1nMg==", "text": "second" } }
            ]}
        });
        let hits = parse_hits(&response);
        assert_eq!(hits.images, vec!["aW1nMQ==", "aW1nMg=="]);
        assert_eq!(hits.contents, vec!["first", "second"]);
    }

    #[test]
    fn parse_missing_hits_structure_yields_empty() {
        assert!(parse_hits(&json!({ "error": "index_not_found" })).is_empty());
        assert!(parse_hits(&json!({ "hits": {} })).is_empty());
        assert!(parse_hits(&json!({})).is_empty());
    }

    #[test]
    fn parse_never_returns_partial_pairs() {
        // Second hit lacks `text`: the whole response is rejected.
        let response = json!({
            "hits": { "hits": [
                { "_source": { "image": "aW1nMQ==", "text": "ok" } },
                { "_source": { "image": "aW1nMg==" } }
            ]}
        });
        let hits = parse_hits(&response);
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_hit_list_is_a_valid_empty_result() {
        let hits = parse_hits(&json!({ "hits": { "hits": [] } }));
        assert!(hits.is_empty());
    }
}
