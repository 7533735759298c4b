//! Storage keys and the strategies that derive them.

use std::fmt;
use std::marker::PhantomData;

use doc_model::ForumDocument;

/// What a [`KeyDeriver`] produces for a (document, field) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub id: String,
    /// Restoring a saved value must be confirmed by the user first.
    pub verify: bool,
}

impl KeySpec {
    pub fn new(id: impl Into<String>, verify: bool) -> Self {
        Self { id: id.into(), verify }
    }
}

/// A fully qualified key: caller prefix followed by the derived id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(prefix: &str, id: &str) -> Self {
        let mut key = String::with_capacity(prefix.len() + id.len());
        key.push_str(prefix);
        key.push_str(id);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps a document and field name to a storage id.
///
/// Implementations must be pure: the same inputs always give the same
/// [`KeySpec`].
pub trait KeyDeriver {
    type Doc: ?Sized;

    fn derive(&self, doc: &Self::Doc, name: &str) -> KeySpec;
}

/// Adapts a closure into a [`KeyDeriver`].
pub struct FnDeriver<Doc: ?Sized, F> {
    derive: F,
    _doc: PhantomData<fn(&Doc)>,
}

impl<Doc: ?Sized, F> FnDeriver<Doc, F>
where
    F: Fn(&Doc, &str) -> KeySpec,
{
    pub fn new(derive: F) -> Self {
        Self { derive, _doc: PhantomData }
    }
}

impl<Doc: ?Sized, F> KeyDeriver for FnDeriver<Doc, F>
where
    F: Fn(&Doc, &str) -> KeySpec,
{
    type Doc = Doc;

    fn derive(&self, doc: &Doc, name: &str) -> KeySpec {
        (self.derive)(doc, name)
    }
}

/// Key scheme for editor autosave on forum documents.
///
/// Saved documents key by their own id and need confirmation before a draft
/// overwrites what the server returned. New comments key by where they will
/// be attached, so reopening the same reply box finds the draft again.
#[derive(Debug, Clone, Copy, Default)]
pub struct DraftKeyDeriver;

impl KeyDeriver for DraftKeyDeriver {
    type Doc = ForumDocument;

    fn derive(&self, doc: &ForumDocument, name: &str) -> KeySpec {
        if let Some(id) = &doc.id {
            KeySpec::new(format!("{id}_{name}"), true)
        } else if let Some(parent) = &doc.parent_comment_id {
            KeySpec::new(format!("parent:{parent}"), false)
        } else if let Some(post) = &doc.post_id {
            KeySpec::new(format!("post:{post}"), false)
        } else if let Some(tag) = &doc.tag_id {
            KeySpec::new(format!("tag:{tag}"), false)
        } else {
            KeySpec::new(name, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::DocumentId;

    #[test]
    fn storage_key_is_prefix_then_id() {
        assert_eq!(StorageKey::new("post_draft_", "abc_body").as_str(), "post_draft_abc_body");
        assert_eq!(StorageKey::new("", "body").to_string(), "body");
    }

    #[test]
    fn fn_deriver_calls_the_closure() {
        let deriver =
            FnDeriver::new(|doc: &str, name: &str| KeySpec::new(format!("{doc}/{name}"), false));
        assert_eq!(deriver.derive("d1", "contents"), KeySpec::new("d1/contents", false));
    }

    #[test]
    fn existing_documents_require_verification() {
        let spec = DraftKeyDeriver.derive(&ForumDocument::existing("abc"), "contents");
        assert_eq!(spec, KeySpec::new("abc_contents", true));
    }

    #[test]
    fn new_comments_key_by_attachment_point() {
        let reply = ForumDocument {
            post_id: Some(DocumentId::new("p1")),
            parent_comment_id: Some(DocumentId::new("c1")),
            ..ForumDocument::default()
        };
        assert_eq!(DraftKeyDeriver.derive(&reply, "contents"), KeySpec::new("parent:c1", false));

        let on_post = ForumDocument::new_comment_on_post("p1");
        assert_eq!(DraftKeyDeriver.derive(&on_post, "contents"), KeySpec::new("post:p1", false));

        let on_tag = ForumDocument::new_comment_on_tag("t1");
        assert_eq!(DraftKeyDeriver.derive(&on_tag, "contents"), KeySpec::new("tag:t1", false));
    }

    #[test]
    fn unattached_new_documents_key_by_field_name() {
        let spec = DraftKeyDeriver.derive(&ForumDocument::default(), "moderationGuidelines");
        assert_eq!(spec, KeySpec::new("moderationGuidelines", false));
    }
}
