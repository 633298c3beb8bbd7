//! Error types for the Ripple runtime.

use std::rc::Rc;

use crate::reactive::Key;

/// Errors surfaced by reactive objects and the renderer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A write was attempted through a readonly or shallow-readonly view.
    #[error("cannot set key \"{key}\": target is readonly")]
    ReadonlyWrite { key: Key },

    /// The key does not fit the container (an index on a record, a field on a list).
    #[error("key \"{key}\" is not valid for a {container}")]
    InvalidKey { key: Key, container: &'static str },

    /// A list write too far past the end to pad.
    #[error("index {index} is too far past the end of a list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A reactive wrapper was requested for a value that is not an object.
    #[error("expected an object, found {found}")]
    NotAnObject { found: &'static str },

    /// A component produced neither a render function nor a template.
    #[error("component \"{component}\" has no render function")]
    MissingRender { component: Rc<str> },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
