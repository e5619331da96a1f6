//! Utility functions for loading proxy lists.

use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;

/// Read the raw proxy list from a URL or file path.
///
/// URL fetches give up after `timeout`.
pub(crate) async fn read_proxy_source(source: &str, timeout: Duration) -> Result<String, String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())?;
        let response = client
            .get(source)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        response.text().await.map_err(|e| e.to_string())
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Parse newline-delimited endpoints.
///
/// Blank lines and `#` comments are skipped; duplicates keep their first position.
pub(crate) fn parse_proxy_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_lines() {
        let list = parse_proxy_list("a:1\n\n   \n# spare\n  b:2  \nc:3\n");
        assert_eq!(list, vec!["a:1", "b:2", "c:3"]);
    }

    #[test]
    fn duplicates_keep_first_position() {
        let list = parse_proxy_list("b:2\na:1\nb:2\n");
        assert_eq!(list, vec!["b:2", "a:1"]);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let err = read_proxy_source("/definitely/not/here/proxies.txt", Duration::from_secs(1)).await;
        assert!(err.is_err());
    }
}
