pub mod self_hosted;
pub mod web_search;

pub use self_hosted::{SelfHostedSearchConfig, SelfHostedSearchProvider};
pub use web_search::{WebSearchConfig, WebSearchProvider};
