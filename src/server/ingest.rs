//! Source ingestion: URL fetch, HTML cleanup, claim extraction.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::claims::{Claim, ClaimKind};
use crate::error::{Error, Result};
use crate::oracle::Oracle;

static SCRIPT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("Invalid regex")
});

static STYLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("Invalid regex")
});

static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("Invalid regex")
});

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid regex"));

static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

static CODE_FENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json?\s*|\s*```").expect("Invalid regex"));

const CLAIM_EXTRACTION_PROMPT: &str = "\
Extract 3-7 key claims from source material.

Return ONLY valid JSON array:
[
  {
    \"id\": \"CLAIM-1\",
    \"text\": \"Summary (1-2 sentences)\",
    \"type\": \"core_thesis|framework|meta|counter\",
    \"snippet\": \"Exact verbatim quote\"
  }
]";

/// Characters of source text handed to the claim extractor.
const SOURCE_TEXT_CAP: usize = 8000;

/// Fetch a URL and reduce it to plain text plus its title.
pub async fn fetch_url(url: &str) -> Result<(String, String)> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("Mozilla/5.0 (compatible; dialectic-harness)")
        .build()
        .map_err(|e| Error::Ingest(format!("HTTP client build failed: {}", e)))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Ingest(format!("Fetch failed for {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::Ingest(format!(
            "Fetch failed for {}: HTTP {}",
            url,
            response.status()
        )));
    }

    let html = response
        .text()
        .await
        .map_err(|e| Error::Ingest(format!("Body read failed: {}", e)))?;

    Ok(clean_html(&html))
}

/// Strip scripts, styles, and tags; pull the title; collapse whitespace.
pub(crate) fn clean_html(html: &str) -> (String, String) {
    let without_scripts = SCRIPT_PATTERN.replace_all(html, "");
    let without_styles = STYLE_PATTERN.replace_all(&without_scripts, "");

    let title = TITLE_PATTERN
        .captures(&without_styles)
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let text = TAG_PATTERN.replace_all(&without_styles, " ");
    let text = WHITESPACE_PATTERN.replace_all(&text, " ").trim().to_string();

    (text, title)
}

#[derive(Debug, Deserialize)]
struct RawClaim {
    #[serde(default)]
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    snippet: String,
}

/// Extract claims from source text with one oracle call.
///
/// Malformed entries are skipped; if nothing usable survives, the session
/// fails with a claim-extraction error.
pub async fn extract_claims(
    oracle: &dyn Oracle,
    text: &str,
    title: &str,
) -> Result<Vec<Claim>> {
    let source: String = text.chars().take(SOURCE_TEXT_CAP).collect();
    let user = format!("# {}\n\n{}", title, source);

    let reply = oracle.invoke(CLAIM_EXTRACTION_PROMPT, &user, 2048).await?;
    let json_str = CODE_FENCE_PATTERN.replace_all(&reply.text, "");
    let json_str = json_str.trim();

    let entries: Vec<serde_json::Value> = serde_json::from_str(json_str)
        .map_err(|e| Error::ClaimExtraction(format!("claim JSON did not parse: {}", e)))?;

    let mut claims = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let raw: RawClaim = match serde_json::from_value(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(index, error = %e, "skipping malformed claim entry");
                continue;
            }
        };
        if raw.text.is_empty() {
            warn!(index, "skipping claim with empty text");
            continue;
        }

        let id = if raw.id.is_empty() {
            format!("CLAIM-{}", index + 1)
        } else {
            raw.id
        };
        let kind: ClaimKind = raw.kind.parse().unwrap_or_default();

        let mut claim = Claim::new(id, kind, raw.text, raw.snippet.clone());
        if !raw.snippet.is_empty() {
            if let Some(start) = text.find(&raw.snippet) {
                claim = claim.with_offsets(start, start + raw.snippet.len());
            }
        }
        claims.push(claim);
    }

    if claims.is_empty() {
        return Err(Error::ClaimExtraction(
            "no usable claims extracted from source".to_string(),
        ));
    }
    debug!(count = claims.len(), "claims extracted");
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleReply;
    use async_trait::async_trait;

    struct FixedOracle(String);

    #[async_trait]
    impl Oracle for FixedOracle {
        async fn invoke(&self, _s: &str, _u: &str, _m: u32) -> Result<OracleReply> {
            Ok(OracleReply {
                text: self.0.clone(),
                output_tokens: 10,
            })
        }
    }

    #[test]
    fn test_clean_html() {
        let html = "<html><head><title>A Page</title><style>body{}</style>\
                    <script>var x = 1;</script></head>\
                    <body><h1>Header</h1><p>Body   text</p></body></html>";
        let (text, title) = clean_html(html);
        assert_eq!(title, "A Page");
        assert!(text.contains("Header"));
        assert!(text.contains("Body text"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("body{}"));
    }

    #[test]
    fn test_clean_html_untitled() {
        let (_, title) = clean_html("<p>no title here</p>");
        assert_eq!(title, "Untitled");
    }

    #[tokio::test]
    async fn test_extract_claims_with_fences_and_offsets() {
        let reply = "```json\n[\
            {\"id\": \"CLAIM-1\", \"text\": \"The thesis\", \"type\": \"core_thesis\", \"snippet\": \"exact quote\"}\
        ]\n```";
        let oracle = FixedOracle(reply.to_string());
        let claims = extract_claims(&oracle, "prefix exact quote suffix", "T")
            .await
            .unwrap();

        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].kind, ClaimKind::CoreThesis);
        assert_eq!(claims[0].offsets, Some((7, 18)));
    }

    #[tokio::test]
    async fn test_malformed_entries_are_skipped() {
        let reply = r#"[
            {"id": "CLAIM-1", "text": "Good claim", "type": "claim", "snippet": ""},
            "just a string",
            {"id": "CLAIM-3", "text": "", "type": "claim", "snippet": ""}
        ]"#;
        let oracle = FixedOracle(reply.to_string());
        let claims = extract_claims(&oracle, "source", "T").await.unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].text, "Good claim");
    }

    #[tokio::test]
    async fn test_zero_usable_claims_is_an_error() {
        let oracle = FixedOracle("[]".to_string());
        let err = extract_claims(&oracle, "source", "T").await.unwrap_err();
        assert!(matches!(err, Error::ClaimExtraction(_)));
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_an_error() {
        let oracle = FixedOracle("I refuse to emit JSON".to_string());
        let err = extract_claims(&oracle, "source", "T").await.unwrap_err();
        assert!(matches!(err, Error::ClaimExtraction(_)));
    }

    #[tokio::test]
    async fn test_unknown_claim_type_defaults() {
        let reply = r#"[{"id": "CLAIM-1", "text": "t", "type": "exotic", "snippet": ""}]"#;
        let oracle = FixedOracle(reply.to_string());
        let claims = extract_claims(&oracle, "s", "T").await.unwrap();
        assert_eq!(claims[0].kind, ClaimKind::Claim);
    }
}
