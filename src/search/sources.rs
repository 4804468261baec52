use crate::core::config::settings::SourceLinkSettings;
use super::types::SearchResult;

/// Builds download deep links for cited sources.
#[derive(Debug, Clone)]
pub struct SourceLinker {
    base: String,
    database: String,
    collection: String,
}

impl SourceLinker {
    pub fn new(settings: &SourceLinkSettings) -> Self {
        Self {
            base: settings.download_base.trim_end_matches('/').to_string(),
            database: settings.database.clone(),
            collection: settings.collection.clone(),
        }
    }

    /// `{base}/{database}/{collection}/{name}/{file id}/{position}`
    pub fn link(&self, result: &SearchResult) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.base,
            self.database,
            self.collection,
            urlencoding::encode(&result.source_name),
            urlencoding::encode(&result.source_id),
            result.position_hint.unwrap_or(0)
        )
    }

    pub fn markdown(&self, result: &SearchResult) -> String {
        format!("[{}]({})", result.source_name, self.link(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::Channel;

    #[test]
    fn link_encodes_name_and_defaults_position() {
        let linker = SourceLinker::new(&SourceLinkSettings {
            download_base: "http://files.local/api/v1/download/".to_string(),
            database: "docs".to_string(),
            collection: "pages".to_string(),
        });
        let mut result = SearchResult {
            text: "x".to_string(),
            source_id: "f-9".to_string(),
            source_name: "tax law 2024.pdf".to_string(),
            record_id: None,
            channel: Channel::FullText,
            relevance_score: 1.0,
            position_hint: None,
        };

        assert_eq!(
            linker.link(&result),
            "http://files.local/api/v1/download/docs/pages/tax%20law%202024.pdf/f-9/0"
        );

        result.position_hint = Some(12);
        assert_eq!(
            linker.markdown(&result),
            "[tax law 2024.pdf](http://files.local/api/v1/download/docs/pages/tax%20law%202024.pdf/f-9/12)"
        );
    }
}
