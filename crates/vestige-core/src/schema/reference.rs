//! To-one references and their on-delete policies.

use std::fmt;
use std::sync::Arc;

use crate::models::Value;

/// Produces the value written by `OnDelete::SetDefault`.
#[derive(Clone)]
pub struct DefaultValue(Arc<dyn Fn() -> Value + Send + Sync>);

impl DefaultValue {
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self(Arc::new(move || value.clone()))
    }

    pub fn from_fn(provider: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(provider))
    }

    pub fn resolve(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultValue(..)")
    }
}

/// What happens to referencing rows when the referenced object is soft-deleted.
#[derive(Debug, Clone)]
pub enum OnDelete {
    /// Soft-delete the referencing rows as well.
    Cascade,
    /// Refuse the delete while a current referencing row exists.
    Protect,
    /// Clone the referencing row and clear the reference on the new version.
    SetNull,
    /// Clone the referencing row and point the new version at the default.
    SetDefault(DefaultValue),
    /// Leave the reference dangling.
    NoAction,
}

impl OnDelete {
    pub fn name(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "cascade",
            OnDelete::Protect => "protect",
            OnDelete::SetNull => "set_null",
            OnDelete::SetDefault(_) => "set_default",
            OnDelete::NoAction => "no_action",
        }
    }
}

/// A to-one reference. The column stores the target's identity, so the same
/// stored value resolves to different historical rows depending on query time.
#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub target: String,
    pub required: bool,
    pub on_delete: OnDelete,
    /// Name of the reverse (to-many) accessor on the target.
    pub related_name: Option<String>,
}

impl Reference {
    /// A required reference with cascading delete.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            required: true,
            on_delete: OnDelete::Cascade,
            related_name: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn on_delete(mut self, policy: OnDelete) -> Self {
        self.on_delete = policy;
        self
    }

    pub fn related_name(mut self, name: impl Into<String>) -> Self {
        self.related_name = Some(name.into());
        self
    }
}
