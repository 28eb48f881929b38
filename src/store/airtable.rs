//! Airtable table backend.
//!
//! Talks to the Airtable REST API with a static personal access token:
//!
//! - `GET  /v0/{base}/{table}` with `offset` paging to read records
//! - `POST /v0/{base}/{table}` to create records, at most 10 per request
//! - `PATCH /v0/{base}/{table}/{record}` to update one field
//! - `GET/POST /v0/meta/bases/{base}/tables[/{table}/fields]` to ensure a field exists

use super::{Repository, RowStore};
use crate::error::StoreError;
use crate::models::{
    ArticleRecord, StoredRow, FIELD_ARTICLE_URL, FIELD_CROPPED_IMAGE_URL, FIELD_IMAGE_URL,
};
use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::{debug, info, instrument};

const API_ROOT: &str = "https://api.airtable.com/v0";

/// Airtable rejects create requests with more than this many records.
pub const MAX_RECORDS_PER_REQUEST: usize = 10;

#[derive(Debug, Deserialize)]
struct ListResponse {
    records: Vec<ListedRecord>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedRecord {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    records: Vec<NewRecord<'a>>,
    typecast: bool,
}

#[derive(Debug, Serialize)]
struct NewRecord<'a> {
    fields: &'a ArticleRecord,
}

#[derive(Debug, Deserialize)]
struct TablesResponse {
    tables: Vec<TableSchema>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    id: String,
    name: String,
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
}

pub struct AirtableStore {
    client: reqwest::Client,
    token: String,
    base_id: String,
    table: String,
    api_root: String,
}

impl fmt::Debug for AirtableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirtableStore")
            .field("base_id", &self.base_id)
            .field("table", &self.table)
            .field("api_root", &self.api_root)
            .finish_non_exhaustive()
    }
}

fn create_requests(records: &[ArticleRecord]) -> Vec<CreateRequest<'_>> {
    records
        .chunks(MAX_RECORDS_PER_REQUEST)
        .map(|chunk| CreateRequest {
            records: chunk.iter().map(|fields| NewRecord { fields }).collect(),
            typecast: true,
        })
        .collect()
}

fn text_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

impl AirtableStore {
    pub fn new(client: reqwest::Client, token: String, base_id: String, table: String) -> Self {
        Self {
            client,
            token,
            base_id,
            table,
            api_root: API_ROOT.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_root(mut self, api_root: String) -> Self {
        self.api_root = api_root;
        self
    }

    fn table_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_root,
            self.base_id,
            urlencoding::encode(&self.table)
        )
    }

    fn meta_url(&self) -> String {
        format!("{}/meta/bases/{}/tables", self.api_root, self.base_id)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body: truncate_for_log(&body, 300),
        })
    }

    /// Every record of the table, restricted to `fields`.
    async fn list_records(&self, fields: &[&str]) -> Result<Vec<ListedRecord>, StoreError> {
        let mut out = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = vec![("pageSize", "100")];
            query.extend(fields.iter().map(|f| ("fields[]", *f)));
            if let Some(ref o) = offset {
                query.push(("offset", o.as_str()));
            }

            let response = self
                .client
                .get(self.table_url())
                .bearer_auth(&self.token)
                .query(&query)
                .send()
                .await?;
            let page: ListResponse = Self::check(response).await?.json().await?;
            debug!(count = page.records.len(), "Listed Airtable page");
            out.extend(page.records);

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(out)
    }
}

impl Repository for AirtableStore {
    #[instrument(level = "info", skip(self), fields(base = %self.base_id, table = %self.table))]
    async fn existing_urls(&self) -> Result<Vec<String>, StoreError> {
        let urls: Vec<String> = self
            .list_records(&[FIELD_ARTICLE_URL])
            .await?
            .iter()
            .filter_map(|r| text_field(&r.fields, FIELD_ARTICLE_URL))
            .collect();
        info!(count = urls.len(), "Read existing article URLs");
        Ok(urls)
    }

    #[instrument(level = "info", skip(self), fields(base = %self.base_id, table = %self.table))]
    async fn ensure_field(&mut self, name: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.meta_url())
            .bearer_auth(&self.token)
            .send()
            .await?;
        let schema: TablesResponse = Self::check(response).await?.json().await?;

        let table = schema
            .tables
            .iter()
            .find(|t| t.id == self.table || t.name == self.table)
            .ok_or_else(|| StoreError::Rejected(format!("table {:?} not found in base", self.table)))?;

        if table.fields.iter().any(|f| f.name == name) {
            debug!(field = name, "Field already present");
            return Ok(());
        }

        let response = self
            .client
            .post(format!("{}/{}/fields", self.meta_url(), table.id))
            .bearer_auth(&self.token)
            .json(&json!({ "name": name, "type": "singleLineText" }))
            .send()
            .await?;
        Self::check(response).await?;
        info!(field = name, "Created field");
        Ok(())
    }

    /// Config validation caps `batch_size` at [`MAX_RECORDS_PER_REQUEST`] for
    /// this backend, so a sink batch is a single create request.
    #[instrument(level = "info", skip_all, fields(base = %self.base_id, table = %self.table, count = records.len()))]
    async fn append(&mut self, records: &[ArticleRecord]) -> Result<(), StoreError> {
        for request in create_requests(records) {
            let response = self
                .client
                .post(self.table_url())
                .bearer_auth(&self.token)
                .json(&request)
                .send()
                .await?;
            Self::check(response).await?;
            debug!(count = request.records.len(), "Created Airtable records");
        }
        Ok(())
    }
}

impl RowStore for AirtableStore {
    async fn rows(&self) -> Result<Vec<StoredRow>, StoreError> {
        Ok(self
            .list_records(&[FIELD_IMAGE_URL, FIELD_CROPPED_IMAGE_URL])
            .await?
            .into_iter()
            .map(|r| StoredRow {
                image_url: text_field(&r.fields, FIELD_IMAGE_URL),
                cropped_image_url: text_field(&r.fields, FIELD_CROPPED_IMAGE_URL),
                id: r.id,
            })
            .collect())
    }

    #[instrument(level = "debug", skip(self, value))]
    async fn write_field(&mut self, row_id: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut fields = Map::new();
        fields.insert(field.to_string(), Value::String(value.to_string()));
        let response = self
            .client
            .patch(format!("{}/{}", self.table_url(), row_id))
            .bearer_auth(&self.token)
            .json(&json!({ "fields": fields, "typecast": true }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleDetails, ListingEntry};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(i: usize) -> ArticleRecord {
        ArticleRecord::from_parts(
            ListingEntry {
                category: "Cat".to_string(),
                title: format!("T{i}"),
                summary: "S".to_string(),
                article_url: format!("https://example.org/{i}"),
                image_url: None,
            },
            ArticleDetails::default(),
        )
    }

    #[test]
    fn test_create_requests_are_chunked_by_ten() {
        let records: Vec<_> = (0..23).map(record).collect();
        let sizes: Vec<usize> = create_requests(&records).iter().map(|r| r.records.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    #[test]
    fn test_create_payload_shape() {
        let records = vec![record(1)];
        let body = serde_json::to_value(&create_requests(&records)[0]).unwrap();
        assert_eq!(body["typecast"], true);
        assert_eq!(body["records"][0]["fields"]["Article URL"], "https://example.org/1");
        assert_eq!(body["records"][0]["fields"]["Title"], "T1");
    }

    #[test]
    fn test_list_response_parsing() {
        let page: ListResponse = serde_json::from_str(
            r#"{"records":[
                {"id":"rec1","createdTime":"2024-01-01T00:00:00.000Z","fields":{"Article URL":"https://example.org/a/"}},
                {"id":"rec2","createdTime":"2024-01-01T00:00:00.000Z","fields":{}}
            ],"offset":"itr123/rec2"}"#,
        )
        .unwrap();
        assert_eq!(page.offset.as_deref(), Some("itr123/rec2"));
        assert_eq!(
            text_field(&page.records[0].fields, FIELD_ARTICLE_URL).as_deref(),
            Some("https://example.org/a/")
        );
        assert_eq!(text_field(&page.records[1].fields, FIELD_ARTICLE_URL), None);
    }

    #[test]
    fn test_table_name_is_encoded_in_url() {
        let store = AirtableStore::new(
            reqwest::Client::new(),
            "pat".to_string(),
            "app123".to_string(),
            "IESE Articles".to_string(),
        );
        assert_eq!(store.table_url(), "https://api.airtable.com/v0/app123/IESE%20Articles");
        assert!(!format!("{store:?}").contains("pat"));
    }

    fn mock_store(server: &MockServer) -> AirtableStore {
        AirtableStore::new(
            reqwest::Client::new(),
            "pat".to_string(),
            "app1".to_string(),
            "Articles".to_string(),
        )
        .with_api_root(server.uri())
    }

    #[tokio::test]
    async fn test_existing_urls_follow_offset_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app1/Articles"))
            .and(header("authorization", "Bearer pat"))
            .and(query_param_is_missing("offset"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [{"id": "rec1", "fields": {"Article URL": "https://example.org/a/"}}],
                "offset": "itr1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/app1/Articles"))
            .and(query_param("offset", "itr1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    {"id": "rec2", "fields": {"Article URL": "https://example.org/b"}},
                    {"id": "rec3", "fields": {}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let urls = mock_store(&server).existing_urls().await.unwrap();
        assert_eq!(urls, vec!["https://example.org/a/", "https://example.org/b"]);
    }

    #[tokio::test]
    async fn test_ensure_field_creates_missing_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta/bases/app1/tables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tables": [{"id": "tbl1", "name": "Articles", "fields": [{"name": "Title"}]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/meta/bases/app1/tables/tbl1/fields"))
            .and(body_partial_json(json!({"name": "Cropped Image URL", "type": "singleLineText"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "fld1"})))
            .expect(1)
            .mount(&server)
            .await;

        mock_store(&server)
            .ensure_field(FIELD_CROPPED_IMAGE_URL)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_field_leaves_existing_field_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta/bases/app1/tables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tables": [{"id": "tbl1", "name": "Articles", "fields": [{"name": "Cropped Image URL"}]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        mock_store(&server)
            .ensure_field(FIELD_CROPPED_IMAGE_URL)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_append_sends_one_request_and_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app1/Articles"))
            .and(body_partial_json(json!({"typecast": true})))
            .respond_with(ResponseTemplate::new(422).set_body_string("INVALID_VALUE_FOR_COLUMN"))
            .expect(1)
            .mount(&server)
            .await;

        let records: Vec<_> = (0..MAX_RECORDS_PER_REQUEST).map(record).collect();
        let err = mock_store(&server).append(&records).await.unwrap_err();

        match err {
            StoreError::Status { status, body } => {
                assert_eq!(status, 422);
                assert!(body.contains("INVALID_VALUE_FOR_COLUMN"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
