// SPDX-License-Identifier: MIT

pub mod tools;
pub mod workflow;
