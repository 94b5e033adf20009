//! GraphQL query construction for the ODP `customer.audiences` lookup.

use std::fmt;

use serde::Serialize;

use super::errors::FetchError;

/// Which audiences the query asks about.
///
/// `All` omits the filter clause entirely; `Subset(vec![])` is an explicit
/// empty subset, which still issues the query but matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubsetFilter {
    All,
    Subset(Vec<String>),
}

impl fmt::Display for SubsetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => Ok(()),
            Self::Subset(names) => {
                let quoted: Vec<String> = names.iter().map(|n| quote(n)).collect();
                write!(f, "(subset:[{}])", quoted.join(","))
            }
        }
    }
}

/// Build the subset filter for an optional list of segment names.
pub fn build_filter(segments_to_check: Option<&[String]>) -> SubsetFilter {
    match segments_to_check {
        None => SubsetFilter::All,
        Some(names) => SubsetFilter::Subset(names.to_vec()),
    }
}

/// The POST body sent to the GraphQL endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueryDocument {
    pub query: String,
}

impl QueryDocument {
    /// Serialize into the JSON request payload.
    pub fn to_body(&self) -> Result<Vec<u8>, FetchError> {
        serde_json::to_vec(self).map_err(|e| FetchError::InvalidQuery(e.to_string()))
    }
}

/// Embed the user identity and filter into a query document.
///
/// `user_key` is placed verbatim as the argument name; checking that the
/// endpoint accepts it is up to the caller.
pub fn build_query_document(
    user_key: &str,
    user_value: &str,
    filter: &SubsetFilter,
) -> QueryDocument {
    QueryDocument {
        query: format!(
            "query {{customer({user_key}: {value}) {{audiences{filter} {{edges {{node {{name is_ready state}}}}}}}}}}",
            value = quote(user_value),
        ),
    }
}

/// Render a GraphQL string literal. JSON string escaping is a valid subset of
/// GraphQL's, so quotes and control characters in names cannot break out.
fn quote(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
