use serde_json::Value;

use crate::error::{AppError, Result};

/// The `data` subtree of one GraphQL response.
///
/// All access goes through [`Node`], which tracks the path walked so far and
/// turns any miss into a `SchemaShape` error naming the full path. A miss
/// means the remote contract drifted, so the error must say exactly where.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    data: Value,
}

impl QueryResponse {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            value: &self.data,
            path: "data".to_string(),
        }
    }
}

/// A cursor into the response tree. Lookups consume the cursor and extend
/// its path, so error messages read like `data.xRanking.currentSeason.id`.
#[derive(Debug, Clone)]
pub struct Node<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Node<'a> {
    pub fn field(&self, name: &str) -> Result<Node<'a>> {
        match self.value.get(name) {
            Some(value) => Ok(Node {
                value,
                path: format!("{}.{name}", self.path),
            }),
            None => Err(self.miss(&format!("field `{name}`"))),
        }
    }

    pub fn index(&self, idx: usize) -> Result<Node<'a>> {
        match self.value.get(idx) {
            Some(value) => Ok(Node {
                value,
                path: format!("{}[{idx}]", self.path),
            }),
            None => Err(self.miss(&format!("index {idx}"))),
        }
    }

    pub fn as_array(&self) -> Result<Vec<Node<'a>>> {
        let items = self
            .value
            .as_array()
            .ok_or_else(|| self.miss("an array"))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, value)| Node {
                value,
                path: format!("{}[{i}]", self.path),
            })
            .collect())
    }

    pub fn as_str(&self) -> Result<&'a str> {
        self.value.as_str().ok_or_else(|| self.miss("a string"))
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.value.as_i64().ok_or_else(|| self.miss("an integer"))
    }

    pub fn as_f64(&self) -> Result<f64> {
        self.value.as_f64().ok_or_else(|| self.miss("a number"))
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.value.as_bool().ok_or_else(|| self.miss("a boolean"))
    }

    /// Nullable string field: JSON null maps to None, anything else must be
    /// a string.
    pub fn as_opt_str(&self) -> Result<Option<&'a str>> {
        if self.value.is_null() {
            return Ok(None);
        }
        self.as_str().map(Some)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    fn miss(&self, expected: &str) -> AppError {
        AppError::SchemaShape(format!("expected {expected} at `{}`", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response() -> QueryResponse {
        QueryResponse::new(json!({
            "xRanking": {
                "currentSeason": { "id": "WFJhbmtpbmdTZWFzb24tcDoy" },
                "edges": [
                    { "node": { "rank": 1 } },
                    { "node": { "rank": 2 } },
                ],
                "endCursor": null,
            }
        }))
    }

    #[test]
    fn walks_nested_fields() {
        let resp = response();
        let id = resp
            .root()
            .field("xRanking")
            .and_then(|n| n.field("currentSeason"))
            .and_then(|n| n.field("id"))
            .and_then(|n| n.as_str().map(str::to_string))
            .unwrap();
        assert_eq!(id, "WFJhbmtpbmdTZWFzb24tcDoy");
    }

    #[test]
    fn missing_field_names_the_full_path() {
        let resp = response();
        let err = resp
            .root()
            .field("xRanking")
            .and_then(|n| n.field("pageInfo"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("field `pageInfo`"), "{msg}");
        assert!(msg.contains("`data.xRanking`"), "{msg}");
    }

    #[test]
    fn array_nodes_carry_indexed_paths() {
        let resp = response();
        let edges = resp
            .root()
            .field("xRanking")
            .and_then(|n| n.field("edges"))
            .and_then(|n| n.as_array())
            .unwrap();
        assert_eq!(edges.len(), 2);

        let err = edges[1].field("missing").unwrap_err();
        assert!(err.to_string().contains("`data.xRanking.edges[1]`"));
    }

    #[test]
    fn nullable_string_maps_null_to_none() {
        let resp = response();
        let cursor = resp
            .root()
            .field("xRanking")
            .and_then(|n| n.field("endCursor"))
            .and_then(|n| n.as_opt_str())
            .unwrap();
        assert_eq!(cursor, None);
    }

    #[test]
    fn wrong_type_is_a_schema_error() {
        let resp = response();
        let err = resp
            .root()
            .field("xRanking")
            .and_then(|n| n.as_str().map(str::to_string))
            .unwrap_err();
        assert!(matches!(err, AppError::SchemaShape(_)));
    }
}
