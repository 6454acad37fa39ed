// ABOUTME: Static catalog of the Groq-hosted models offered to clients
// ABOUTME: Resolves and validates model identifiers before any upstream call is made
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::Serialize;

use crate::errors::{AppError, AppResult};

/// Model used when neither the request nor the conversation names one
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Catalog entry describing one selectable model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Upstream model identifier
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Short description for the model picker
    pub description: &'static str,
    /// Model author
    pub provider: &'static str,
    /// Context window in tokens
    pub context_window: u32,
    /// Whether this is the default selection
    pub is_default: bool,
}

/// All selectable models
pub const AI_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "llama-3.3-70b-versatile",
        name: "Llama 3.3 70B",
        description: "Best for complex coding tasks with high accuracy",
        provider: "Meta",
        context_window: 128_000,
        is_default: true,
    },
    ModelInfo {
        id: "llama-3.1-70b-versatile",
        name: "Llama 3.1 70B",
        description: "Great balance of speed and quality",
        provider: "Meta",
        context_window: 128_000,
        is_default: false,
    },
    ModelInfo {
        id: "llama-3.1-8b-instant",
        name: "Llama 3.1 8B",
        description: "Fast responses for simple queries",
        provider: "Meta",
        context_window: 128_000,
        is_default: false,
    },
    ModelInfo {
        id: "mixtral-8x7b-32768",
        name: "Mixtral 8x7B",
        description: "Good for diverse coding questions",
        provider: "Mistral AI",
        context_window: 32_768,
        is_default: false,
    },
    ModelInfo {
        id: "gemma2-9b-it",
        name: "Gemma 2 9B",
        description: "Efficient and capable for general tasks",
        provider: "Google",
        context_window: 8_192,
        is_default: false,
    },
];

/// Look up a catalog entry
#[must_use]
pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    AI_MODELS.iter().find(|model| model.id == id)
}

/// Ensure `id` names a catalog model
///
/// # Errors
///
/// Returns `InvalidInput` with `Invalid model ID: <id>` for unknown ids
pub fn validate_model(id: &str) -> AppResult<&'static ModelInfo> {
    find_model(id).ok_or_else(|| AppError::invalid_input(format!("Invalid model ID: {id}")))
}

/// Pick the model for a send: request first, then conversation, then default
///
/// Blank values count as absent.
#[must_use]
pub fn resolve_model<'a>(requested: Option<&'a str>, conversation: Option<&'a str>) -> &'a str {
    requested
        .filter(|m| !m.trim().is_empty())
        .or_else(|| conversation.filter(|m| !m.trim().is_empty()))
        .unwrap_or(DEFAULT_MODEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_default_and_it_matches_constant() {
        let defaults: Vec<_> = AI_MODELS.iter().filter(|m| m.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, DEFAULT_MODEL);
    }

    #[test]
    fn test_validate_model_rejects_unknown_ids() {
        assert!(validate_model("gemma2-9b-it").is_ok());
        let err = validate_model("gpt-5").unwrap_err();
        assert_eq!(err.message, "Invalid model ID: gpt-5");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_resolve_model_precedence() {
        assert_eq!(
            resolve_model(Some("gemma2-9b-it"), Some("llama-3.1-8b-instant")),
            "gemma2-9b-it"
        );
        assert_eq!(
            resolve_model(None, Some("llama-3.1-8b-instant")),
            "llama-3.1-8b-instant"
        );
        assert_eq!(resolve_model(Some("  "), None), DEFAULT_MODEL);
    }
}
