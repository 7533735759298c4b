use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A post, comment or tag revision as the editor sees it.
///
/// New documents have no `id` yet; the parent links say where a new comment
/// will be attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(rename = "postId", default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<DocumentId>,
    #[serde(rename = "tagId", default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<DocumentId>,
    #[serde(rename = "parentCommentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<DocumentId>,
}

impl ForumDocument {
    pub fn existing(id: impl Into<String>) -> Self {
        Self { id: Some(DocumentId::new(id)), ..Self::default() }
    }

    pub fn new_comment_on_post(post_id: impl Into<String>) -> Self {
        Self { post_id: Some(DocumentId::new(post_id)), ..Self::default() }
    }

    pub fn new_comment_on_tag(tag_id: impl Into<String>) -> Self {
        Self { tag_id: Some(DocumentId::new(tag_id)), ..Self::default() }
    }

    pub fn reply_to(parent_comment_id: impl Into<String>) -> Self {
        Self { parent_comment_id: Some(DocumentId::new(parent_comment_id)), ..Self::default() }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

/// Editor flavours. Each one autosaves under its own prefix so a draft is
/// never restored into an editor that speaks a different format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    Ckeditor,
    Markdown,
    Html,
}

impl EditorKind {
    pub fn storage_prefix(self) -> &'static str {
        match self {
            Self::Ckeditor => "ckeditor_",
            Self::Markdown => "markdown_",
            Self::Html => "html_",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown editor kind: {0}")]
pub struct UnknownEditorKind(pub String);

impl FromStr for EditorKind {
    type Err = UnknownEditorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ckeditor" => Ok(Self::Ckeditor),
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            _ => Err(UnknownEditorKind(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_uses_forum_field_names_on_the_wire() {
        let doc = ForumDocument {
            id: None,
            post_id: Some(DocumentId::new("p1")),
            tag_id: None,
            parent_comment_id: Some(DocumentId::new("c9")),
        };

        let json = serde_json::to_value(&doc).expect("serialize document");
        assert_eq!(json, serde_json::json!({ "postId": "p1", "parentCommentId": "c9" }));

        let decoded: ForumDocument =
            serde_json::from_str(r#"{"_id":"abc"}"#).expect("deserialize document");
        assert_eq!(decoded, ForumDocument::existing("abc"));
        assert!(!decoded.is_new());
    }

    #[test]
    fn editor_prefixes_are_distinct() {
        let prefixes: Vec<_> = [EditorKind::Ckeditor, EditorKind::Markdown, EditorKind::Html]
            .into_iter()
            .map(EditorKind::storage_prefix)
            .collect();

        assert_eq!(prefixes, vec!["ckeditor_", "markdown_", "html_"]);
    }

    #[test]
    fn editor_kind_parses_case_insensitively() {
        assert_eq!("Markdown".parse::<EditorKind>(), Ok(EditorKind::Markdown));
        assert_eq!(
            "draftjs".parse::<EditorKind>(),
            Err(UnknownEditorKind("draftjs".to_owned()))
        );
    }
}
