use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::store::{
    DocumentRef, FormatRules, Locator, RemoteStore, SheetInfo, StoreError, WriteMode,
};

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// Google Sheets/Drive REST implementation of the remote store contract.
///
/// Takes an already-acquired OAuth bearer token; obtaining and refreshing
/// credentials is the caller's concern.
pub struct SheetsClient {
    http: reqwest::Client,
    token: String,
}

impl SheetsClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: access_token.into(),
        }
    }

    async fn check(&self, response: reqwest::Response) -> Result<Value, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, StoreError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&self.token)
            .send()
            .await?;
        self.check(response).await
    }

    async fn post(&self, url: &str, query: &[(&str, &str)], body: Value) -> Result<Value, StoreError> {
        let response = self
            .http
            .post(url)
            .query(query)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        self.check(response).await
    }

    async fn put(&self, url: &str, query: &[(&str, &str)], body: Value) -> Result<Value, StoreError> {
        let response = self
            .http
            .put(url)
            .query(query)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        self.check(response).await
    }

    async fn sheet_id(&self, doc: &DocumentRef, sheet: &str) -> Result<i64, StoreError> {
        let sheets = self.list_sheets(doc).await?;
        sheets
            .get(sheet)
            .map(|info| info.sheet_id)
            .ok_or_else(|| StoreError::Api {
                status: 404,
                message: format!("sheet '{sheet}' not found in '{}'", doc.title),
            })
    }
}

fn quoted_range(sheet: &str, cells: &str) -> String {
    format!("'{sheet}'!{cells}")
}

impl RemoteStore for SheetsClient {
    async fn locate(&self, locator: &Locator) -> Result<Option<DocumentRef>, StoreError> {
        match locator {
            Locator::ById(id) => {
                let url = format!("{DRIVE_FILES}/{id}");
                match self.get(&url, &[("fields", "id, name")]).await {
                    Ok(body) => Ok(Some(DocumentRef {
                        id: body["id"].as_str().unwrap_or(id).to_string(),
                        title: body["name"].as_str().unwrap_or_default().to_string(),
                    })),
                    Err(StoreError::Api { status: 404, .. }) => {
                        Err(StoreError::NotFound(id.clone()))
                    }
                    Err(e) => Err(e),
                }
            }
            Locator::ByName(name) => {
                let query = format!(
                    "name = '{}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
                    name.replace('\'', "\\'")
                );
                let body = self
                    .get(
                        DRIVE_FILES,
                        &[
                            ("q", query.as_str()),
                            ("spaces", "drive"),
                            ("fields", "files(id, name)"),
                        ],
                    )
                    .await?;
                let files = body["files"].as_array().cloned().unwrap_or_default();
                match files.len() {
                    0 => Ok(None),
                    1 => Ok(Some(DocumentRef {
                        id: files[0]["id"].as_str().unwrap_or_default().to_string(),
                        title: files[0]["name"].as_str().unwrap_or_default().to_string(),
                    })),
                    n => Err(StoreError::AmbiguousName(name.clone(), n)),
                }
            }
        }
    }

    async fn create(&self, title: &str) -> Result<DocumentRef, StoreError> {
        let body = self
            .post(
                SHEETS_BASE,
                &[],
                json!({ "properties": { "title": title } }),
            )
            .await?;
        tracing::info!(title, "created spreadsheet");
        Ok(DocumentRef {
            id: body["spreadsheetId"].as_str().unwrap_or_default().to_string(),
            title: title.to_string(),
        })
    }

    async fn list_sheets(
        &self,
        doc: &DocumentRef,
    ) -> Result<BTreeMap<String, SheetInfo>, StoreError> {
        let url = format!("{SHEETS_BASE}/{}", doc.id);
        let body = self
            .get(&url, &[("fields", "sheets.properties")])
            .await?;

        let mut sheets = BTreeMap::new();
        let mut titles = Vec::new();
        for sheet in body["sheets"].as_array().into_iter().flatten() {
            let props = &sheet["properties"];
            let title = props["title"].as_str().unwrap_or_default().to_string();
            titles.push(title.clone());
            sheets.insert(
                title,
                SheetInfo {
                    sheet_id: props["sheetId"].as_i64().unwrap_or_default(),
                    row_count: 0,
                    header: Vec::new(),
                },
            );
        }
        if titles.is_empty() {
            return Ok(sheets);
        }

        // One batchGet resolves every header signature and row count.
        let url = format!("{SHEETS_BASE}/{}/values:batchGet", doc.id);
        let mut request = self.http.get(&url).bearer_auth(&self.token);
        for title in &titles {
            request = request.query(&[("ranges", quoted_range(title, "A1:Z"))]);
        }
        let body = self.check(request.send().await?).await?;
        for (title, range) in titles
            .iter()
            .zip(body["valueRanges"].as_array().into_iter().flatten())
        {
            let values = range["values"].as_array().cloned().unwrap_or_default();
            if let Some(info) = sheets.get_mut(title) {
                info.row_count = values.len() as u32;
                info.header = values
                    .first()
                    .and_then(Value::as_array)
                    .map(|cells| {
                        cells
                            .iter()
                            .map(|c| c.as_str().unwrap_or_default().to_string())
                            .collect()
                    })
                    .unwrap_or_default();
            }
        }
        Ok(sheets)
    }

    async fn write_rows(
        &self,
        doc: &DocumentRef,
        sheet: &str,
        header: &[String],
        rows: &[Vec<String>],
        mode: WriteMode,
    ) -> Result<u32, StoreError> {
        let existing = self.list_sheets(doc).await?;
        if !existing.contains_key(sheet) {
            let url = format!("{SHEETS_BASE}/{}:batchUpdate", doc.id);
            self.post(
                &url,
                &[],
                json!({
                    "requests": [
                        { "addSheet": { "properties": { "title": sheet } } }
                    ]
                }),
            )
            .await?;
            tracing::info!(sheet, "created sheet");
        }

        match mode {
            WriteMode::Overwrite => {
                // Clear data rows only; the header row is rewritten with the
                // canonical header below.
                let url = format!(
                    "{SHEETS_BASE}/{}/values/{}:clear",
                    doc.id,
                    quoted_range(sheet, "A2:Z")
                );
                self.post(&url, &[], json!({})).await?;

                let mut values = vec![header.to_vec()];
                values.extend(rows.iter().cloned());
                let url = format!(
                    "{SHEETS_BASE}/{}/values/{}",
                    doc.id,
                    quoted_range(sheet, "A1")
                );
                self.put(
                    &url,
                    &[("valueInputOption", "USER_ENTERED")],
                    json!({ "values": values }),
                )
                .await?;
            }
            WriteMode::Append => {
                let url = format!(
                    "{SHEETS_BASE}/{}/values/{}:append",
                    doc.id,
                    quoted_range(sheet, "A1")
                );
                self.post(
                    &url,
                    &[
                        ("valueInputOption", "USER_ENTERED"),
                        ("insertDataOption", "INSERT_ROWS"),
                    ],
                    json!({ "values": rows }),
                )
                .await?;
            }
        }

        tracing::info!(sheet, rows = rows.len(), "wrote rows");
        Ok(rows.len() as u32)
    }

    async fn apply_formatting(
        &self,
        doc: &DocumentRef,
        sheet: &str,
        rules: &FormatRules,
    ) -> Result<(), StoreError> {
        let sheet_id = self.sheet_id(doc, sheet).await?;
        let url = format!("{SHEETS_BASE}/{}:batchUpdate", doc.id);
        self.post(&url, &[], json!({ "requests": format_requests(sheet_id, rules) }))
            .await?;
        Ok(())
    }
}

/// Build the batchUpdate request list for one sheet. Every request sets
/// absolute state, so re-applying the same rules is a no-op visually.
pub(crate) fn format_requests(sheet_id: i64, rules: &FormatRules) -> Vec<Value> {
    let mut requests = vec![
        json!({
            "updateSheetProperties": {
                "properties": {
                    "sheetId": sheet_id,
                    "gridProperties": { "frozenRowCount": 1 }
                },
                "fields": "gridProperties.frozenRowCount"
            }
        }),
        json!({
            "repeatCell": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": 0,
                    "endRowIndex": 1,
                    "startColumnIndex": 0,
                    "endColumnIndex": rules.columns
                },
                "cell": {
                    "userEnteredFormat": { "textFormat": { "bold": true } }
                },
                "fields": "userEnteredFormat.textFormat.bold"
            }
        }),
    ];

    if let Some(col) = rules.date_column {
        requests.push(json!({
            "repeatCell": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": 1,
                    "endRowIndex": rules.data_rows + 1,
                    "startColumnIndex": col,
                    "endColumnIndex": col + 1
                },
                "cell": {
                    "userEnteredFormat": {
                        "numberFormat": { "type": "DATE", "pattern": "yyyy-mm-dd" }
                    }
                },
                "fields": "userEnteredFormat.numberFormat"
            }
        }));
    }

    if let Some(col) = rules.currency_column {
        requests.push(json!({
            "repeatCell": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": 1,
                    "endRowIndex": rules.data_rows + 1,
                    "startColumnIndex": col,
                    "endColumnIndex": col + 1
                },
                "cell": {
                    "userEnteredFormat": {
                        "numberFormat": { "type": "CURRENCY", "pattern": "$#,##0.00" }
                    }
                },
                "fields": "userEnteredFormat.numberFormat"
            }
        }));
    }

    requests.push(json!({
        "autoResizeDimensions": {
            "dimensions": {
                "sheetId": sheet_id,
                "dimension": "COLUMNS",
                "startIndex": 0,
                "endIndex": rules.columns
            }
        }
    }));

    requests
}
