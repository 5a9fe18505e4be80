use super::GoogleApiClient;
use crate::agent::tools::backends::{Contact, ContactsBackend};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The People API rejects larger page sizes for searchContacts.
const MAX_PAGE_SIZE: usize = 30;
const READ_MASK: &str = "names,emailAddresses,phoneNumbers,organizations";

/// Google People API client for the user's own contacts.
pub struct GoogleContactsClient {
    api: GoogleApiClient,
}

impl GoogleContactsClient {
    pub fn new(api: GoogleApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ContactsBackend for GoogleContactsClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Contact>> {
        let endpoint = format!(
            "people:searchContacts?query={}&pageSize={}&readMask={}",
            urlencoding::encode(query),
            limit.clamp(1, MAX_PAGE_SIZE),
            READ_MASK
        );
        let result = self.api.call(&endpoint, "GET", None).await?;
        Ok(result["results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .map(|r| parse_person(&r["person"]))
                    .take(limit)
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn values(list: &Value, field: &str) -> Vec<String> {
    list.as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v[field].as_str())
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_person(person: &Value) -> Contact {
    Contact {
        name: person["names"][0]["displayName"]
            .as_str()
            .unwrap_or("(unnamed)")
            .to_string(),
        emails: values(&person["emailAddresses"], "value"),
        phones: values(&person["phoneNumbers"], "value"),
        organization: person["organizations"][0]["name"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    }
}
