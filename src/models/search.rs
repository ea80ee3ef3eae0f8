use log::warn;
use serde::{ Deserialize, Deserializer, Serialize };
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

/// Results backing one assistant answer, in the order the provider ranked them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceSet(Vec<SearchResult>);

impl SourceSet {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self(results)
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.0.iter()
    }
}

impl From<Vec<SearchResult>> for SourceSet {
    fn from(results: Vec<SearchResult>) -> Self {
        Self(results)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default, deserialize_with = "usable_results")]
    pub results: SourceSet,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where D: Deserializer<'de>, T: Deserialize<'de> + Default
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Keeps the entries that carry a url; a malformed entry never sinks the rest.
fn usable_results<'de, D>(deserializer: D) -> Result<SourceSet, D::Error> where D: Deserializer<'de> {
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = raw.len();
    let results: Vec<SearchResult> = raw
        .into_iter()
        .filter_map(|v| serde_json::from_value::<SearchResult>(v).ok())
        .filter(|r| !r.url.trim().is_empty())
        .collect();

    if results.len() < total {
        warn!("Skipped {} malformed search result(s) of {}", total - results.len(), total);
    }
    Ok(SourceSet(results))
}
