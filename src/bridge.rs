//! Pure mapping from an Octopus publication version to the
//! `social.octosphere.publication` record shape.
//!
//! No I/O and no clock access: the same inputs always yield a byte-identical
//! record. When the source carries no timestamps, `created_at`/`updated_at`
//! stay unset and the publisher assigns a creation time at write time — the
//! only nondeterminism the pipeline permits.

use crate::contract::{PublicationRecord, PublicationSummary, PublicationVersion};

fn safe_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build the target record for one publication version.
///
/// Fallback chains: title prefers the version over the publication, status
/// prefers the publication over the version, and plain text falls back to the
/// raw markup when the source derived none.
pub fn build_record(
    summary: &PublicationSummary,
    version: &PublicationVersion,
    canonical_url: &str,
) -> PublicationRecord {
    let content_html = version.content_html.trim().to_string();
    let content_text = match safe_text(Some(version.content_text.as_str())) {
        Some(text) => text,
        None => content_html.clone(),
    };
    PublicationRecord {
        octopus_id: summary.publication_id.clone(),
        version_id: version.version_id.clone(),
        publication_type: version
            .publication_type
            .clone()
            .or_else(|| summary.publication_type.clone())
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        title: safe_text(version.title.as_deref())
            .or_else(|| safe_text(summary.title.as_deref()))
            .unwrap_or_else(|| "Untitled".to_string()),
        status: summary
            .status
            .clone()
            .or_else(|| version.status.clone())
            .unwrap_or_else(|| "LIVE".to_string()),
        content_html,
        content_text,
        citations: version.citations.clone(),
        linked_to: summary.linked_to.clone(),
        linked_from: summary.linked_from.clone(),
        doi: version.doi.clone(),
        owner_orcid: summary.owner_orcid.clone(),
        peer_review_of: version.peer_review_of.clone(),
        canonical_url: Some(canonical_url.to_string()),
        created_at: version
            .created_at
            .clone()
            .or_else(|| summary.created_at.clone()),
        updated_at: version
            .updated_at
            .clone()
            .or_else(|| summary.updated_at.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> PublicationSummary {
        PublicationSummary {
            publication_id: "P1".to_string(),
            title: Some("Publication title".to_string()),
            publication_type: Some("HYPOTHESIS".to_string()),
            status: Some("LIVE".to_string()),
            owner_orcid: Some("0000-0002-1825-0097".to_string()),
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
            updated_at: None,
            linked_to: vec!["P2".to_string()],
            linked_from: vec!["P3".to_string()],
        }
    }

    fn version() -> PublicationVersion {
        PublicationVersion {
            version_id: "v1".to_string(),
            publication_id: "P1".to_string(),
            title: Some("  Version title  ".to_string()),
            content_html: "<p>body</p>".to_string(),
            content_text: "body".to_string(),
            doi: Some("10.1000/x".to_string()),
            publication_type: None,
            status: None,
            citations: vec!["Doe 2001".to_string()],
            peer_review_of: None,
            created_at: Some("2024-02-02T00:00:00Z".to_string()),
            updated_at: Some("2024-02-03T00:00:00Z".to_string()),
        }
    }

    #[test]
    fn repeated_calls_are_byte_identical() {
        let url = "https://octopus.example/publications/P1/versions/v1";
        let first = build_record(&summary(), &version(), url);
        let second = build_record(&summary(), &version(), url);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn version_title_wins_and_is_trimmed() {
        let record = build_record(&summary(), &version(), "u");
        assert_eq!(record.title, "Version title");
        assert_eq!(record.publication_type, "HYPOTHESIS");
    }

    #[test]
    fn empty_text_falls_back_to_markup() {
        let mut v = version();
        v.content_text = "   ".to_string();
        let record = build_record(&summary(), &v, "u");
        assert_eq!(record.content_text, "<p>body</p>");
    }

    #[test]
    fn missing_fields_default_without_clock_access() {
        let mut s = summary();
        let mut v = version();
        s.title = None;
        s.status = None;
        s.publication_type = None;
        s.created_at = None;
        v.title = None;
        v.created_at = None;
        v.updated_at = None;
        let record = build_record(&s, &v, "u");
        assert_eq!(record.title, "Untitled");
        assert_eq!(record.status, "LIVE");
        assert_eq!(record.publication_type, "UNKNOWN");
        assert_eq!(record.created_at, None);
        assert_eq!(record.updated_at, None);
    }

    #[test]
    fn absent_optionals_are_omitted_from_the_wire_shape() {
        let mut v = version();
        v.doi = None;
        v.peer_review_of = None;
        let value = serde_json::to_value(build_record(&summary(), &v, "u")).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("doi"));
        assert!(!object.contains_key("peerReviewOf"));
        assert_eq!(object["octopusId"], "P1");
        assert_eq!(object["linkedTo"], serde_json::json!(["P2"]));
    }
}
