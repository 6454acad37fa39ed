// ABOUTME: System prompts for LLM interactions loaded at compile time
// ABOUTME: Provides the DevGPT coding assistant prompt and the title inference instruction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # System Prompts
//!
//! Prompts are loaded at compile time from markdown files for easy maintenance.

/// `DevGPT` coding assistant system prompt, prepended to every completion
pub const DEVGPT_SYSTEM_PROMPT: &str = include_str!("devgpt_system.md");

/// Instruction used to derive a conversation title from its first message
pub const TITLE_PROMPT: &str = include_str!("title.md");

/// Get the system prompt for the coding assistant
#[must_use]
pub const fn get_devgpt_system_prompt() -> &'static str {
    DEVGPT_SYSTEM_PROMPT
}
