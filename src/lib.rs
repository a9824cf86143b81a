#[macro_use]
extern crate log;

pub mod anilist_api_utils;
pub mod config_utils;
pub mod error;
pub mod github_api_utils;
mod graphql_utils;
pub mod pagination_utils;
