//! Read-only resource catalog
//!
//! Resources are static documents bundled into the binary: assistant
//! templates, usage docs and worked examples. The catalog never touches a
//! provider.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AssistantsError, Result};

static URI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9+.-]*://[A-Za-z0-9._~-]+(/[A-Za-z0-9._~-]+)*$")
        .unwrap_or_else(|e| panic!("invalid resource URI pattern: {e}"))
});

/// Grouping used when listing resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Templates,
    Docs,
    Examples,
}

/// Produces a resource's text on demand
pub type Resolver = Arc<dyn Fn() -> Option<Cow<'static, str>> + Send + Sync>;

/// What `resources/list` reports for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    pub category: ResourceCategory,
}

/// Resolved resource text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

struct ResourceEntry {
    descriptor: ResourceDescriptor,
    resolver: Resolver,
}

/// Ordered set of resources keyed by URI
#[derive(Default)]
pub struct ResourceCatalog {
    entries: Vec<ResourceEntry>,
}

impl std::fmt::Debug for ResourceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCatalog")
            .field(
                "uris",
                &self.entries.iter().map(|e| e.descriptor.uri.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, rejecting malformed or duplicate URIs
    pub fn register(&mut self, descriptor: ResourceDescriptor, resolver: Resolver) -> Result<()> {
        if !URI_PATTERN.is_match(&descriptor.uri) {
            return Err(AssistantsError::Registration(format!(
                "malformed resource URI '{}'",
                descriptor.uri
            )));
        }
        if self.entries.iter().any(|e| e.descriptor.uri == descriptor.uri) {
            return Err(AssistantsError::Registration(format!(
                "resource '{}' is already registered",
                descriptor.uri
            )));
        }
        self.entries.push(ResourceEntry {
            descriptor,
            resolver,
        });
        Ok(())
    }

    /// Register a fixed text resource
    pub fn with_static(
        mut self,
        uri: &str,
        name: &str,
        description: &str,
        mime_type: &str,
        category: ResourceCategory,
        text: &'static str,
    ) -> Result<Self> {
        self.register(
            ResourceDescriptor {
                uri: uri.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                mime_type: mime_type.to_string(),
                category,
            },
            Arc::new(move || Some(Cow::Borrowed(text))),
        )?;
        Ok(self)
    }

    /// Descriptors in registration order; nothing is resolved
    pub fn list(&self) -> Vec<ResourceDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve one resource by exact URI
    pub fn read(&self, uri: &str) -> Result<ResourceContent> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.uri == uri)
            .ok_or_else(|| AssistantsError::ResourceNotFound(uri.to_string()))?;

        match (entry.resolver)() {
            Some(text) if !text.trim().is_empty() => Ok(ResourceContent {
                uri: entry.descriptor.uri.clone(),
                mime_type: entry.descriptor.mime_type.clone(),
                text: text.into_owned(),
            }),
            _ => Err(AssistantsError::ResourceContentMissing(uri.to_string())),
        }
    }

    /// Resolve every entry once, failing on the first empty one
    pub fn verify(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.descriptor.uri.as_str()) {
                return Err(AssistantsError::Registration(format!(
                    "resource '{}' is registered twice",
                    entry.descriptor.uri
                )));
            }
            self.read(&entry.descriptor.uri)?;
        }
        Ok(())
    }

    /// The bundled templates, docs and examples
    pub fn standard() -> Result<Self> {
        use ResourceCategory::*;

        const JSON: &str = "application/json";
        const MARKDOWN: &str = "text/markdown";

        Self::new()
            .with_static(
                "assistant://templates/coding-assistant",
                "Coding assistant",
                "Assistant configuration for code review and generation",
                JSON,
                Templates,
                include_str!("../assets/templates/coding-assistant.json"),
            )?
            .with_static(
                "assistant://templates/writing-assistant",
                "Writing assistant",
                "Assistant configuration for drafting and editing prose",
                JSON,
                Templates,
                include_str!("../assets/templates/writing-assistant.json"),
            )?
            .with_static(
                "assistant://templates/data-analyst",
                "Data analyst",
                "Assistant configuration with the code interpreter enabled",
                JSON,
                Templates,
                include_str!("../assets/templates/data-analyst.json"),
            )?
            .with_static(
                "assistant://templates/customer-support",
                "Customer support",
                "Assistant configuration with order lookup and escalation functions",
                JSON,
                Templates,
                include_str!("../assets/templates/customer-support.json"),
            )?
            .with_static(
                "docs://getting-started",
                "Getting started",
                "First steps: create an assistant, a thread and a run",
                MARKDOWN,
                Docs,
                include_str!("../assets/docs/getting-started.md"),
            )?
            .with_static(
                "docs://openai-assistants-api",
                "Assistants API overview",
                "Objects, lifecycles and limits of the assistants API",
                MARKDOWN,
                Docs,
                include_str!("../assets/docs/openai-assistants-api.md"),
            )?
            .with_static(
                "docs://best-practices",
                "Best practices",
                "Guidance on instructions, metadata, pagination and cleanup",
                MARKDOWN,
                Docs,
                include_str!("../assets/docs/best-practices.md"),
            )?
            .with_static(
                "docs://troubleshooting/common-issues",
                "Common issues",
                "Error codes and how to resolve them",
                MARKDOWN,
                Docs,
                include_str!("../assets/docs/troubleshooting-common-issues.md"),
            )?
            .with_static(
                "docs://tool-reference",
                "Tool reference",
                "Every tool with its required and optional arguments",
                MARKDOWN,
                Docs,
                include_str!("../assets/docs/tool-reference.md"),
            )?
            .with_static(
                "examples://workflows/basic-conversation",
                "Basic conversation",
                "Create a thread, add a message, run it and read the reply",
                MARKDOWN,
                Examples,
                include_str!("../assets/examples/basic-conversation.md"),
            )?
            .with_static(
                "examples://workflows/batch-processing",
                "Batch processing",
                "Process many inputs with one assistant and paginate the results",
                MARKDOWN,
                Examples,
                include_str!("../assets/examples/batch-processing.md"),
            )?
            .with_static(
                "examples://workflows/code-review",
                "Code review",
                "Review a diff with the coding assistant template",
                MARKDOWN,
                Examples,
                include_str!("../assets/examples/code-review.md"),
            )?
            .with_static(
                "examples://workflows/data-analysis",
                "Data analysis",
                "Answer function calls from a run in requires_action",
                MARKDOWN,
                Examples,
                include_str!("../assets/examples/data-analysis.md"),
            )
    }
}
