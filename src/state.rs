// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

use std::sync::Arc;

use crate::approval::ApprovalEngine;
use crate::config::Config;
use crate::tokenizer::Tokenizer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<ApprovalEngine>,
    pub tokenizer: Arc<Tokenizer>,
}

impl AppState {
    pub fn new(config: Arc<Config>, engine: Arc<ApprovalEngine>, tokenizer: Arc<Tokenizer>) -> Self {
        Self {
            config,
            engine,
            tokenizer,
        }
    }
}
