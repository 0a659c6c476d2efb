use indexmap::IndexMap;
use serde::Serialize;

use crate::model::{Template, TemplateError, TemplateId};

/// Why a template could not be produced. Lookup misses, transport
/// failures, and invalid content are distinct cases so callers can react
/// differently to each.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
pub enum LibraryError {
    #[error("template `{id}` not found")]
    TemplateNotFound { id: TemplateId },
    #[error("template `{id}` failed to load: {reason}")]
    TemplateLoadError { id: TemplateId, reason: String },
    #[error("template `{id}` is invalid: {source}")]
    TemplateInvalid {
        id: TemplateId,
        #[source]
        source: TemplateError,
    },
}

/// Source of templates for a compilation run. Implementations may read
/// from anywhere; the compiler only sees this interface.
pub trait TemplateLibrary: Sync {
    fn get(&self, id: &TemplateId) -> Result<Template, LibraryError>;

    fn known_ids(&self) -> Vec<TemplateId>;
}

/// Library backed by a plain in-memory map. The default choice for
/// embedding and tests; inserts validate template content up front.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateLibrary {
    templates: IndexMap<TemplateId, Template>,
}

impl InMemoryTemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template, validating its content first.
    pub fn insert(&mut self, template: Template) -> Result<(), LibraryError> {
        template
            .validate()
            .map_err(|source| LibraryError::TemplateInvalid {
                id: template.id.clone(),
                source,
            })?;
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateLibrary for InMemoryTemplateLibrary {
    fn get(&self, id: &TemplateId) -> Result<Template, LibraryError> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::TemplateNotFound { id: id.clone() })
    }

    fn known_ids(&self) -> Vec<TemplateId> {
        self.templates.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::template::{
        BaseTiming, GeometrySpec, PatternParams, Step, TargetToken,
    };
    use crate::model::{Quantize, RepeatContract, TemplateMetadata};
    use indexmap::IndexMap as Map;

    fn template(id: &str) -> Template {
        Template {
            id: id.into(),
            version: 1,
            roles: Map::new(),
            steps: vec![Step {
                id: "a".into(),
                target: TargetToken::All,
                timing: BaseTiming {
                    start_bar: 0.0,
                    duration_bars: 2.0,
                    quantize: Quantize::None,
                    phase_offset: None,
                },
                geometry: GeometrySpec {
                    pattern: "center".into(),
                    params: PatternParams::default(),
                },
                movement: None,
                dimmer: None,
                entry: None,
                exit: None,
                priority: 0,
                blend: Default::default(),
            }],
            repeat: RepeatContract::default(),
            channel_bounds: Map::new(),
            metadata: TemplateMetadata::default(),
        }
    }

    #[test]
    fn lookup_hit_and_miss() {
        let mut lib = InMemoryTemplateLibrary::new();
        lib.insert(template("sweep")).unwrap();
        assert!(lib.get(&"sweep".into()).is_ok());
        assert!(matches!(
            lib.get(&"ghost".into()),
            Err(LibraryError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn insert_rejects_invalid_content() {
        let mut lib = InMemoryTemplateLibrary::new();
        let mut bad = template("bad");
        bad.steps.clear();
        assert!(matches!(
            lib.insert(bad),
            Err(LibraryError::TemplateInvalid { .. })
        ));
        assert!(lib.is_empty());
    }

    #[test]
    fn known_ids_in_insertion_order() {
        let mut lib = InMemoryTemplateLibrary::new();
        lib.insert(template("b")).unwrap();
        lib.insert(template("a")).unwrap();
        let ids: Vec<String> = lib.known_ids().into_iter().map(|t| t.0).collect();
        assert_eq!(ids, vec!["b".to_owned(), "a".to_owned()]);
    }
}
