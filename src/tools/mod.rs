// ABOUTME: Built-in tool families registered alongside the generated plugin tools
// ABOUTME: Currently the system management tools (keys, OAuth, limits, audit)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! Built-in tools exposed under the `system` plugin namespace.

/// System management tools bound to the core singletons
pub mod system;
