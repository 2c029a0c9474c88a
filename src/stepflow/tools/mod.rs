// SPDX-License-Identifier: MIT

//! Built-in tools

mod duckduckgo;
mod openmeteo;

pub use duckduckgo::{parse_instant_answer, DuckDuckGoSearchTool, SearchResult};
pub use openmeteo::{OpenMeteoInput, OpenMeteoTool, TemperatureUnit};
