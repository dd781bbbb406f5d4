//! Template engine
//!
//! Instantiates a master document into an independent copy and fills in a
//! recipient's placeholders with one batched replace call.

use crate::adapters::traits::DocumentBackend;
use crate::config::RetryConfig;
use crate::core::retry::retry_transient;
use crate::domain::{DocumentId, FieldSubstitutionMap, Result, TargetLocation, TemplateId};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Placeholder token shape used by [`TemplateEngine::inspect`]
const PLACEHOLDER_PATTERN: &str = r"\{\{[^{}]+\}\}";

/// Placeholders found in a template, compared with the configured set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateInspection {
    /// Every `{{...}}` token that occurs in the template
    pub present: BTreeSet<String>,

    /// Configured placeholders with no occurrence in the template
    pub missing: Vec<String>,

    /// Template tokens no configured field fills
    pub unmapped: Vec<String>,
}

/// Stateless copy-and-substitute service over a [`DocumentBackend`]
#[derive(Clone)]
pub struct TemplateEngine {
    backend: Arc<dyn DocumentBackend>,
    retry: RetryConfig,
}

impl TemplateEngine {
    pub fn new(backend: Arc<dyn DocumentBackend>, retry: RetryConfig) -> Self {
        Self { backend, retry }
    }

    /// Creates an independent full copy of the template in `target`
    ///
    /// # Errors
    ///
    /// `NotFound` when the template is invalid, `PermissionDenied` when the
    /// credential cannot read it or write to `target`.
    pub async fn instantiate(
        &self,
        template: &TemplateId,
        destination_name: &str,
        target: &TargetLocation,
    ) -> Result<DocumentId> {
        let source = template.as_document();
        let document = retry_transient(&self.retry, "copy_document", || {
            self.backend.copy_document(&source, destination_name, target)
        })
        .await?;

        tracing::debug!(
            template_id = %template,
            document_id = %document,
            name = destination_name,
            "Template instantiated"
        );
        Ok(document)
    }

    /// Replaces every token of `map` in `document` with one backend call
    ///
    /// Tokens that do not occur are a no-op. An empty map makes no call.
    pub async fn substitute(&self, document: &DocumentId, map: &FieldSubstitutionMap) -> Result<()> {
        if map.is_empty() {
            return Ok(());
        }

        let replacements: Vec<(String, String)> = map
            .iter()
            .filter(|(token, _)| !token.is_empty())
            .map(|(token, replacement)| (token.to_string(), replacement.to_string()))
            .collect();

        retry_transient(&self.retry, "batch_replace", || {
            self.backend.batch_replace(document, &replacements)
        })
        .await?;

        tracing::debug!(
            document_id = %document,
            tokens = replacements.len(),
            "Placeholders substituted"
        );
        Ok(())
    }

    /// Reads the template and compares its tokens with `configured`
    pub async fn inspect<'a>(
        &self,
        template: &TemplateId,
        configured: impl IntoIterator<Item = &'a str>,
    ) -> Result<TemplateInspection> {
        let text = self.read_template(template).await?;
        Ok(inspect_text(&text, configured))
    }

    /// Reads the template's text, failing when it is missing or unreadable
    pub async fn read_template(&self, template: &TemplateId) -> Result<String> {
        let source = template.as_document();
        retry_transient(&self.retry, "document_text", || {
            self.backend.document_text(&source)
        })
        .await
    }
}

fn inspect_text<'a>(text: &str, configured: impl IntoIterator<Item = &'a str>) -> TemplateInspection {
    let present: BTreeSet<String> = match Regex::new(PLACEHOLDER_PATTERN) {
        Ok(re) => re.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        Err(_) => BTreeSet::new(),
    };

    let configured: Vec<&str> = configured.into_iter().collect();
    let missing = configured
        .iter()
        .filter(|token| !text.contains(**token))
        .map(|token| token.to_string())
        .collect();
    let unmapped = present
        .iter()
        .filter(|token| !configured.contains(&token.as_str()))
        .cloned()
        .collect();

    TemplateInspection {
        present,
        missing,
        unmapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryWorkspace;

    fn engine(workspace: &Arc<MemoryWorkspace>) -> TemplateEngine {
        TemplateEngine::new(workspace.clone(), RetryConfig::default())
    }

    #[tokio::test]
    async fn test_instantiate_copies_into_target() {
        let workspace = Arc::new(MemoryWorkspace::new());
        workspace.add_document("tmpl", "Hello {{recipient_name}}");
        workspace.add_folder("folder");

        let template = TemplateId::new("tmpl").unwrap();
        let target = TargetLocation::new("folder").unwrap();
        let copy = engine(&workspace)
            .instantiate(&template, "Factuur 1", &target)
            .await
            .unwrap();

        assert_ne!(copy.as_str(), "tmpl");
        assert_eq!(workspace.parent_of(&copy).as_deref(), Some("folder"));
        assert_eq!(workspace.name_of(&copy).as_deref(), Some("Factuur 1"));
    }

    #[tokio::test]
    async fn test_mutating_copy_leaves_template_untouched() {
        let workspace = Arc::new(MemoryWorkspace::new());
        workspace.add_document("tmpl", "Dear {{recipient_name}}");
        workspace.add_folder("folder");

        let engine = engine(&workspace);
        let template = TemplateId::new("tmpl").unwrap();
        let copy = engine
            .instantiate(&template, "copy", &TargetLocation::new("folder").unwrap())
            .await
            .unwrap();
        let map = FieldSubstitutionMap::new().with("{{recipient_name}}", "Ada");
        engine.substitute(&copy, &map).await.unwrap();

        assert_eq!(workspace.text_of(&copy).as_deref(), Some("Dear Ada"));
        assert_eq!(
            workspace.text_of(&template.as_document()).as_deref(),
            Some("Dear {{recipient_name}}")
        );
    }

    #[tokio::test]
    async fn test_substitute_is_one_batched_call() {
        let workspace = Arc::new(MemoryWorkspace::new());
        workspace.add_document("doc", "{{a}} {{b}} {{a}}");

        let map = FieldSubstitutionMap::new().with("{{a}}", "1").with("{{b}}", "2");
        let document = DocumentId::new("doc").unwrap();
        engine(&workspace).substitute(&document, &map).await.unwrap();

        assert_eq!(workspace.counters().batch_replace, 1);
        assert_eq!(workspace.text_of(&document).as_deref(), Some("1 2 1"));
    }

    #[tokio::test]
    async fn test_substitute_without_matches_leaves_body() {
        let workspace = Arc::new(MemoryWorkspace::new());
        workspace.add_document("doc", "Plain boilerplate");

        let map = FieldSubstitutionMap::new().with("{{missing}}", "x");
        let document = DocumentId::new("doc").unwrap();
        engine(&workspace).substitute(&document, &map).await.unwrap();

        assert_eq!(
            workspace.text_of(&document).as_deref(),
            Some("Plain boilerplate")
        );
    }

    #[tokio::test]
    async fn test_instantiate_missing_template() {
        let workspace = Arc::new(MemoryWorkspace::new());
        workspace.add_folder("folder");

        let result = engine(&workspace)
            .instantiate(
                &TemplateId::new("nope").unwrap(),
                "x",
                &TargetLocation::new("folder").unwrap(),
            )
            .await;
        assert!(matches!(
            result,
            Err(crate::domain::InvoicerError::Job(crate::domain::JobError::NotFound(_)))
        ));
    }

    #[test]
    fn test_inspect_text() {
        let inspection = inspect_text(
            "Factuur {{invoice_id}} voor {{recipient_name}}, {{iban}}",
            ["{{invoice_id}}", "{{recipient_name}}", "{{city}}"],
        );
        assert_eq!(inspection.present.len(), 3);
        assert_eq!(inspection.missing, vec!["{{city}}".to_string()]);
        assert_eq!(inspection.unmapped, vec!["{{iban}}".to_string()]);
    }
}
