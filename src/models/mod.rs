pub mod comment;
pub mod indexer;
pub mod post;
pub mod profile;

pub use comment::Comment;
pub use post::Post;
pub use profile::Profile;

/// An entity addressed by a single string key in its collection.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Profile {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Post {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Comment {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Pointer from an indexed entity to its off-chain content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub id: String,
    pub content_uri: Option<String>,
}

impl From<&Post> for ContentRef {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            content_uri: post.content_uri.clone(),
        }
    }
}

impl From<&Comment> for ContentRef {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id.clone(),
            content_uri: comment.content_uri.clone(),
        }
    }
}
