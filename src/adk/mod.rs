// SPDX-License-Identifier: MIT

//! Agent development kit: models, tools, memory and agents

pub mod agent;
pub mod error;
pub mod memory;
pub mod model;
pub mod tool;
