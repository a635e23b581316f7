use serde::{Deserialize, Serialize};

/// Describes a model's name and the relations reconciliation may descend into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    /// Used as the back-reference field when a child is projected without
    /// being persisted.
    pub singular_name: String,
    #[serde(default)]
    pub relations: Vec<RelationDescriptor>,
}

impl ModelSchema {
    /// Creates a schema with no relations. The singular name is derived
    /// from `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            singular_name: singularize(&name),
            name,
            relations: Vec::new(),
        }
    }

    /// Overrides the derived singular name.
    pub fn with_singular_name(mut self, singular: impl Into<String>) -> Self {
        self.singular_name = singular.into();
        self
    }

    /// Adds a relation descriptor.
    pub fn with_relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    /// Looks up a relation by name.
    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relation(name).is_some()
    }

    /// Relations of this schema whose name also exists on `other`, in this
    /// schema's declaration order.
    pub fn matching_relations<'a>(&'a self, other: &ModelSchema) -> Vec<&'a RelationDescriptor> {
        self.relations
            .iter()
            .filter(|r| other.has_relation(&r.name))
            .collect()
    }
}

/// A relation from a parent model to a collection of related records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Relation name as declared on the parent (e.g., "addresses").
    pub name: String,
    /// Singular form, used to route relation-specific hooks (e.g., "address").
    pub singular_name: String,
    pub kind: RelationKind,
    /// Model that holds the related records.
    pub target_model: String,
}

impl RelationDescriptor {
    fn with_kind(name: &str, target_model: &str, kind: RelationKind) -> Self {
        Self {
            name: name.into(),
            singular_name: singularize(name),
            kind,
            target_model: target_model.into(),
        }
    }

    /// Shorthand for a relation whose children the parent owns.
    pub fn owned(name: &str, target_model: &str) -> Self {
        Self::with_kind(name, target_model, RelationKind::Owned)
    }

    /// Shorthand for an association to independently existing records.
    pub fn linked(name: &str, target_model: &str) -> Self {
        Self::with_kind(name, target_model, RelationKind::Linked)
    }

    /// Overrides the derived singular name.
    pub fn with_singular_name(mut self, singular: impl Into<String>) -> Self {
        self.singular_name = singular.into();
        self
    }
}

/// How related records are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// The parent owns its children: they are created, updated and
    /// destroyed along with it.
    Owned,
    /// Many-to-many or belongs-to: related records exist on their own and
    /// are only attached to or detached from the parent.
    Linked,
}

/// Derives a singular name from a plural relation or model name.
///
/// Handles the regular English endings only; irregular names should be set
/// explicitly.
pub fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["ches", "shes", "sses", "xes"] {
        if name.ends_with(suffix) {
            return name[..name.len() - 2].to_string();
        }
    }
    match name.strip_suffix('s') {
        Some(stem) if !stem.is_empty() && !stem.ends_with('s') => stem.to_string(),
        _ => name.to_string(),
    }
}
