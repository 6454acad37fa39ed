// ABOUTME: Core types and constants for the DevGPT chat relay server
// ABOUTME: Foundation crate with unified error handling and domain constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # `DevGPT` Core
//!
//! Foundation crate providing shared types and constants for the `DevGPT`
//! relay server. This crate changes infrequently, so keeping it separate
//! lets the workspace recompile the server crate without touching it.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError`, `ErrorCode`, and HTTP error bodies
//! - **constants**: Application-wide constants organized by domain

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;
