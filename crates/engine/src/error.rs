// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the render engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while supervising a render task.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run tar: {0}")]
    Tar(#[source] std::io::Error),
}
