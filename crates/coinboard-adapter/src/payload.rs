/*
[INPUT]:  RawDocument (server-rendered HTML)
[OUTPUT]: ParsedPayload (JSON tree of the embedded initial state)
[POS]:    Extraction layer - locates and parses the embedded state script
[UPDATE]: When the page changes how it embeds its initial state
*/

use scraper::{Html, Selector};
use tracing::debug;

use crate::http::{CoinboardError, Result};
use crate::types::{ParsedPayload, RawDocument};

pub const DEFAULT_PAYLOAD_ELEMENT_ID: &str = "__NEXT_DATA__";
pub const DEFAULT_PAYLOAD_MIME_TYPE: &str = "application/json";

/// Identifies the `<script>` element carrying the page state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadLocator {
    pub element_id: String,
    pub mime_type: String,
}

impl Default for PayloadLocator {
    fn default() -> Self {
        Self {
            element_id: DEFAULT_PAYLOAD_ELEMENT_ID.to_string(),
            mime_type: DEFAULT_PAYLOAD_MIME_TYPE.to_string(),
        }
    }
}

impl PayloadLocator {
    /// Extract the embedded payload from `doc`.
    ///
    /// The parsed HTML tree is dropped before returning; only the JSON value
    /// leaves this function.
    pub fn extract(&self, doc: &RawDocument) -> Result<ParsedPayload> {
        let text = self.script_text(&doc.body)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(CoinboardError::MalformedPayload {
                reason: format!("script `{}` is empty", self.element_id),
            });
        }

        let value = serde_json::from_str(text).map_err(|err| CoinboardError::MalformedPayload {
            reason: err.to_string(),
        })?;
        debug!(url = %doc.url, bytes = text.len(), "embedded payload parsed");
        Ok(ParsedPayload::new(value))
    }

    fn script_text(&self, html: &str) -> Result<String> {
        let document = Html::parse_document(html);
        let scripts = Selector::parse("script")
            .map_err(|err| CoinboardError::Config(format!("script selector: {err}")))?;

        document
            .select(&scripts)
            .find(|element| {
                let value = element.value();
                value.id() == Some(self.element_id.as_str())
                    && value
                        .attr("type")
                        .is_some_and(|kind| kind.trim().eq_ignore_ascii_case(&self.mime_type))
            })
            .map(|element| element.text().collect::<String>())
            .ok_or_else(|| CoinboardError::MissingPayload {
                element_id: self.element_id.clone(),
            })
    }
}

/// Extract with the default locator (`<script id="__NEXT_DATA__" type="application/json">`).
pub fn extract(doc: &RawDocument) -> Result<ParsedPayload> {
    PayloadLocator::default().extract(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ErrorKind;

    fn page(script: &str) -> RawDocument {
        let body = format!(
            "<!DOCTYPE html><html><head><title>Prices</title></head><body>\
             <div id=\"__next\"></div>{script}</body></html>"
        );
        RawDocument::new("https://coinmarketcap.com/", 200, body)
    }

    #[test]
    fn test_extract_next_data() {
        let doc = page(
            r#"<script id="__NEXT_DATA__" type="application/json">{"props":{"page":"/"}}</script>"#,
        );
        let payload = extract(&doc).expect("payload");
        assert_eq!(payload.root()["props"]["page"], "/");
    }

    #[test]
    fn test_extract_ignores_other_scripts() {
        let doc = page(concat!(
            r#"<script>window.foo = {"not": "it"};</script>"#,
            r#"<script id="__NEXT_DATA__" type="text/javascript">{"wrong": "type"}</script>"#,
            r#"<script id="__NEXT_DATA__" type="application/json">{"right": true}</script>"#,
        ));
        let payload = extract(&doc).expect("payload");
        assert_eq!(payload.root()["right"], true);
    }

    #[test]
    fn test_missing_element() {
        let doc = page(r#"<script id="other" type="application/json">{}</script>"#);
        let err = extract(&doc).expect_err("missing element");
        assert_eq!(err.kind(), ErrorKind::MissingPayload);
        assert!(err.to_string().contains("__NEXT_DATA__"));
    }

    #[test]
    fn test_malformed_json() {
        let doc = page(r#"<script id="__NEXT_DATA__" type="application/json">{"props": </script>"#);
        let err = extract(&doc).expect_err("malformed");
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn test_empty_script_is_malformed() {
        let doc = page(r#"<script id="__NEXT_DATA__" type="application/json">   </script>"#);
        let err = extract(&doc).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn test_custom_locator() {
        let locator = PayloadLocator {
            element_id: "initial-state".to_string(),
            mime_type: "application/ld+json".to_string(),
        };
        let doc = page(r#"<script id="initial-state" type="application/ld+json">[1, 2]</script>"#);
        let payload = locator.extract(&doc).expect("payload");
        assert_eq!(payload.root().as_array().map(Vec::len), Some(2));
    }
}
