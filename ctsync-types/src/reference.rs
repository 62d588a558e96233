//! References between resources.
//!
//! A reference points either at a platform id (optionally carrying the expanded
//! target object) or at a human key. Resolution turns the former into the latter.

use crate::ids::ResourceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The kind of resource a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceFamily {
    Category,
    Product,
    ProductType,
    Customer,
    CustomerGroup,
    Channel,
    TaxCategory,
    State,
    Type,
    ShoppingList,
    CartDiscount,
    CustomObject,
}

impl ReferenceFamily {
    /// Every family, in declaration order.
    pub const ALL: [ReferenceFamily; 12] = [
        Self::Category,
        Self::Product,
        Self::ProductType,
        Self::Customer,
        Self::CustomerGroup,
        Self::Channel,
        Self::TaxCategory,
        Self::State,
        Self::Type,
        Self::ShoppingList,
        Self::CartDiscount,
        Self::CustomObject,
    ];

    /// The `typeId` the remote store uses for this family.
    #[must_use]
    pub const fn type_id(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
            Self::ProductType => "product-type",
            Self::Customer => "customer",
            Self::CustomerGroup => "customer-group",
            Self::Channel => "channel",
            Self::TaxCategory => "tax-category",
            Self::State => "state",
            Self::Type => "type",
            Self::ShoppingList => "shopping-list",
            Self::CartDiscount => "cart-discount",
            Self::CustomObject => "key-value-document",
        }
    }

    /// The collection name used in key/id queries.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Product => "products",
            Self::ProductType => "productTypes",
            Self::Customer => "customers",
            Self::CustomerGroup => "customerGroups",
            Self::Channel => "channels",
            Self::TaxCategory => "taxCategories",
            Self::State => "states",
            Self::Type => "typeDefinitions",
            Self::ShoppingList => "shoppingLists",
            Self::CartDiscount => "cartDiscounts",
            Self::CustomObject => "customObjects",
        }
    }
}

impl fmt::Display for ReferenceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_id())
    }
}

/// A pointer from one resource to another.
///
/// Equality and hashing ignore the expanded object: two references are the
/// same if they point at the same family and target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "camelCase")]
pub enum Reference {
    /// Points at a platform id. `obj` holds the expanded target, if any.
    Id {
        family: ReferenceFamily,
        id: ResourceId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        obj: Option<Value>,
    },
    /// Points at a human key.
    Key { family: ReferenceFamily, key: String },
}

impl Reference {
    /// Creates an unexpanded id-reference.
    #[must_use]
    pub fn by_id(family: ReferenceFamily, id: impl Into<ResourceId>) -> Self {
        Self::Id {
            family,
            id: id.into(),
            obj: None,
        }
    }

    /// Creates a key-reference.
    #[must_use]
    pub fn by_key(family: ReferenceFamily, key: impl Into<String>) -> Self {
        Self::Key {
            family,
            key: key.into(),
        }
    }

    /// Attaches an expanded target object to an id-reference.
    /// Key-references are returned unchanged.
    #[must_use]
    pub fn with_expansion(self, expanded: Value) -> Self {
        match self {
            Self::Id { family, id, .. } => Self::Id {
                family,
                id,
                obj: Some(expanded),
            },
            key_ref => key_ref,
        }
    }

    /// The family this reference points into.
    #[must_use]
    pub fn family(&self) -> ReferenceFamily {
        match self {
            Self::Id { family, .. } | Self::Key { family, .. } => *family,
        }
    }

    /// The referenced id, if this is an id-reference.
    #[must_use]
    pub fn id(&self) -> Option<&ResourceId> {
        match self {
            Self::Id { id, .. } => Some(id),
            Self::Key { .. } => None,
        }
    }

    /// The referenced key, if this is a key-reference.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Key { key, .. } => Some(key),
            Self::Id { .. } => None,
        }
    }

    /// The id or key this reference targets, whichever it carries.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Id { id, .. } => id.as_str(),
            Self::Key { key, .. } => key,
        }
    }

    /// Whether this reference already points at a key.
    #[must_use]
    pub fn is_key(&self) -> bool {
        matches!(self, Self::Key { .. })
    }

    /// Whether this is an id-reference carrying an expanded object.
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        matches!(self, Self::Id { obj: Some(_), .. })
    }

    /// The non-blank `key` field of the expanded object, if present.
    #[must_use]
    pub fn expanded_key(&self) -> Option<&str> {
        match self {
            Self::Id { obj: Some(obj), .. } => obj
                .get("key")
                .and_then(Value::as_str)
                .filter(|k| !k.trim().is_empty()),
            _ => None,
        }
    }

    /// Rewrites this reference in place to point at `key`.
    pub fn resolve_to(&mut self, key: impl Into<String>) {
        *self = Self::Key {
            family: self.family(),
            key: key.into(),
        };
    }

    /// Reads the `{"typeId", "id"}` / `{"typeId", "key"}` form that references
    /// take inside attribute and custom-field values. Unknown `typeId`s and
    /// blank targets are not references.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let family: ReferenceFamily = fields.get("typeId")?.as_str()?.parse().ok()?;
        let text = |name: &str| {
            fields
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
        };
        if let Some(id) = text("id") {
            return Some(Self::Id {
                family,
                id: ResourceId::new(id),
                obj: fields.get("obj").filter(|obj| obj.is_object()).cloned(),
            });
        }
        text("key").map(|key| Self::by_key(family, key))
    }

    /// The JSON form read by [`Reference::from_json`].
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut fields = serde_json::Map::new();
        fields.insert("typeId".into(), Value::from(self.family().type_id()));
        match self {
            Self::Id { id, obj, .. } => {
                fields.insert("id".into(), Value::from(id.as_str()));
                if let Some(obj) = obj {
                    fields.insert("obj".into(), obj.clone());
                }
            }
            Self::Key { key, .. } => {
                fields.insert("key".into(), Value::from(key.as_str()));
            }
        }
        Value::Object(fields)
    }
}

/// Every reference object inside `value`, in JSON form. Set values (arrays)
/// and nested attributes (objects) are searched recursively; a reference
/// object is returned whole and not searched further.
pub fn nested_references(value: &mut Value) -> Vec<&mut Value> {
    let mut found = Vec::new();
    collect_nested(value, &mut found);
    found
}

fn collect_nested<'a>(value: &'a mut Value, found: &mut Vec<&'a mut Value>) {
    if Reference::from_json(value).is_some() {
        found.push(value);
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect_nested(item, found);
            }
        }
        Value::Object(fields) => {
            for field in fields.values_mut() {
                collect_nested(field, found);
            }
        }
        _ => {}
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Id { family: f1, id: a, .. },
                Self::Id { family: f2, id: b, .. },
            ) => f1 == f2 && a == b,
            (
                Self::Key { family: f1, key: a },
                Self::Key { family: f2, key: b },
            ) => f1 == f2 && a == b,
            _ => false,
        }
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.family().hash(state);
        self.is_key().hash(state);
        self.target().hash(state);
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id { family, id, .. } => write!(f, "{family}(id={id})"),
            Self::Key { family, key } => write!(f, "{family}(key={key})"),
        }
    }
}
